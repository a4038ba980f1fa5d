//! Provisioning orchestrator.
//!
//! This module runs the stages in their fixed order:
//! config validation, output directory preparation, credentials, node
//! configs and, when enabled, containers. Nothing is written before both
//! input documents have been validated.

use crate::config_loader::{load_network_config, load_template};
use crate::container::{provision_containers, ContainerRuntime, DaemonLauncher};
use crate::credentials::{generate_credentials, CredentialIssuer, CredentialOutcome};
use crate::error::Result;
use crate::node_config::{render_all, RenderedConfig};
use crate::output_dir::{prepare_output_dir, OutputDirState};
use crate::settings::ProvisionSettings;
use crate::utils::prompt::Confirm;
use log::info;

/// The external collaborators of a run
pub struct Toolchain<'a> {
    pub issuer: &'a mut dyn CredentialIssuer,
    pub runtime: &'a mut dyn ContainerRuntime,
    pub launcher: &'a mut dyn DaemonLauncher,
    pub confirm: &'a mut dyn Confirm,
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionReport {
    pub output_dir: OutputDirState,
    pub credentials: CredentialOutcome,
    /// Rendered configs, lighthouse first
    pub rendered: Vec<RenderedConfig>,
    /// Fully provisioned containers, in start order
    pub containers: Vec<String>,
}

/// Run a full provisioning pass with the given settings and collaborators
pub fn run(settings: &ProvisionSettings, tools: Toolchain<'_>) -> Result<ProvisionReport> {
    let config = load_network_config(&settings.network_config)?;
    let template = load_template(&settings.template)?;

    let output_dir = prepare_output_dir(&settings.output_dir, settings.keep_existing, tools.confirm)?;

    let credentials = generate_credentials(tools.issuer, &config, &settings.output_dir)?;

    let rendered = render_all(&template, &config, &settings.output_dir)?;

    let containers = if settings.provision_containers {
        provision_containers(tools.runtime, tools.launcher, tools.confirm, settings, &config)?
    } else {
        info!("Skipping container provisioning");
        Vec::new()
    };

    Ok(ProvisionReport {
        output_dir,
        credentials,
        rendered,
        containers,
    })
}
