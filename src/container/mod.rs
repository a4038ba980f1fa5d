//! # Container Provisioning Module
//!
//! Every node of the mesh runs in its own container. For each node the
//! provisioner:
//!
//! 1. **Starts** a container named after the node, with `NET_ADMIN` and the
//!    project directory mounted
//! 2. **Creates** the TUN character device `/dev/net/tun` and opens up its mode
//! 3. **Creates** the daemon's config directory
//! 4. **Copies** the CA certificate, the node's rendered config, key and
//!    certificate into it under fixed names
//! 5. **Launches** the network daemon, detached
//!
//! The container runtime and the daemon are reached through the
//! [`ContainerRuntime`] and [`DaemonLauncher`] traits; [`docker`] holds the
//! implementations that shell out to the real programs.
//!
//! ## Ordering
//!
//! The lighthouse always comes first, resources follow in declaration order.
//! When the lighthouse is deferred, it is skipped and the operator has to
//! confirm it runs elsewhere before any resource is provisioned.
//!
//! ## Failures
//!
//! Exit statuses are checked. The first failing step of a node abandons that
//! node, the remaining nodes are still provisioned, and the run reports every
//! abandoned node at the end.

pub mod docker;
pub mod provisioner;

use crate::utils::command::CommandError;
use std::fmt;
use std::path::{Path, PathBuf};

pub use docker::{DockerCli, NebulaLauncher};
pub use provisioner::{node_bundles, provision_containers, provision_node, NodeBundle};

/// Errors raised while provisioning containers
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Node \"{node}\": {step} failed: {source}")]
    Step {
        node: String,
        step: ProvisionStep,
        #[source]
        source: CommandError,
    },
    #[error("Provisioning failed for: {}", .failed.join(", "))]
    Incomplete { failed: Vec<String> },
    #[error("Lighthouse was not confirmed as running; resources were not provisioned")]
    LighthouseNotConfirmed,
    #[error("Failed to read operator confirmation: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Steps of provisioning one node, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    StartContainer,
    CreateTunDevice,
    CreateConfigDir,
    CopyFiles,
    StartDaemon,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStep::StartContainer => "starting the container",
            ProvisionStep::CreateTunDevice => "creating the TUN device",
            ProvisionStep::CreateConfigDir => "creating the config directory",
            ProvisionStep::CopyFiles => "copying files",
            ProvisionStep::StartDaemon => "starting the network daemon",
        };
        f.write_str(name)
    }
}

/// What to start a node container with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Extra kernel capabilities, e.g. `NET_ADMIN`
    pub capabilities: Vec<String>,
    /// Host path and its mount point inside the container
    pub volume: Option<(PathBuf, String)>,
}

/// Capability to create and manipulate node containers
pub trait ContainerRuntime {
    /// Create and start a detached container
    fn run(&mut self, spec: &ContainerSpec) -> Result<(), CommandError>;

    /// Run `command` inside `container` and wait for it
    fn exec(&mut self, container: &str, command: &[&str]) -> Result<(), CommandError>;

    /// Copy a host file to `destination` inside `container`
    fn copy_into(&mut self, container: &str, source: &Path, destination: &str) -> Result<(), CommandError>;
}

/// Capability to start the network daemon inside a container
pub trait DaemonLauncher {
    fn launch(&mut self, container: &str, config_path: &str) -> Result<(), CommandError>;
}
