//! # Meshstarter - Provisioning utility for Nebula overlay networks
//!
//! Meshstarter turns a short YAML description of a mesh (one lighthouse and
//! any number of resources) into a working Nebula network: a certificate
//! authority, signed per-node credentials, per-node daemon configuration and,
//! optionally, one running container per node.
//!
//! ## Architecture
//!
//! - `config`: Network description types and validation
//! - `config_loader`: Reading the network description and the node template
//! - `credentials`: CA creation and certificate signing via `nebula-cert`
//! - `node_config`: Rendering per-node daemon configuration from the template
//! - `output_dir`: Preparing the directory generated files are written to
//! - `container`: Starting node containers and the network daemon inside them
//! - `settings`: Resolved paths and program names for one run
//! - `orchestrator`: Running all of the above in order
//! - `utils`: Address helpers, external command lines, operator prompts
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use meshstarter::container::{DockerCli, NebulaLauncher};
//! use meshstarter::credentials::NebulaCert;
//! use meshstarter::orchestrator::{self, Toolchain};
//! use meshstarter::settings::ProvisionSettings;
//! use meshstarter::utils::StdinConfirm;
//!
//! let settings = ProvisionSettings::for_project("/srv/mesh");
//! let report = orchestrator::run(
//!     &settings,
//!     Toolchain {
//!         issuer: &mut NebulaCert::new(&settings.cert_tool, "mesh-ca"),
//!         runtime: &mut DockerCli::default(),
//!         launcher: &mut NebulaLauncher::new("docker", "nebula"),
//!         confirm: &mut StdinConfirm,
//!     },
//! )?;
//! println!("{} containers started", report.containers.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! lighthouse:
//!   name: lighthouse
//!   ip: 192.168.100.1/24
//!   routable_ip: 203.0.113.10
//!   routable_port: 4242
//!
//! resources:
//!   - name: laptop
//!     ip: 192.168.100.2/24
//!     groups: ["laptop", "ssh"]
//!   - name: server
//!     ip: 192.168.100.3/24
//! ```
//!
//! ## Generated Files
//!
//! ```text
//! generated/
//! |-- ca.crt, ca.key                 # Certificate authority
//! |-- <name>.crt, <name>.key         # One pair per node
//! |-- lighthouse-config.yaml         # Lighthouse daemon config
//! \-- <name>-config.yaml             # One per resource
//! ```
//!
//! ## Error Handling
//!
//! Every stage returns its own `thiserror` error; they meet in
//! [`error::MeshError`]. The binary reports it through `color_eyre` and
//! exits with status 1.

pub mod config;
pub mod config_loader;
pub mod container;
pub mod credentials;
pub mod error;
pub mod node_config;
pub mod orchestrator;
pub mod output_dir;
pub mod settings;
pub mod utils;
