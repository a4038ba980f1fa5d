use clap::error::ErrorKind;
use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use meshstarter::container::{DockerCli, NebulaLauncher};
use meshstarter::credentials::{CredentialOutcome, NebulaCert};
use meshstarter::orchestrator::{self, Toolchain};
use meshstarter::settings::{ProvisionSettings, DEFAULT_CA_NAME};
use meshstarter::utils::prompt::{AssumeYes, Confirm, StdinConfirm};

/// Instantiate a Nebula network from a configuration file.
///
/// Creates a CA, certificates and keys for every node of the network in the
/// output directory, renders each node's config, and unless --no-containers
/// is given starts one container per node, distributes its files and starts
/// Nebula in it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Do not instantiate containers for the nodes of the network
    #[arg(long)]
    no_containers: bool,

    /// Configuration file for the network [default: <project-dir>/conf/network-config.yaml]
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Default node template [default: <project-dir>/conf/default-config.yaml]
    #[arg(long)]
    template_file: Option<PathBuf>,

    /// Project root
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Directory for generated files [default: <project-dir>/generated]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Certificate tool [default: <project-dir>/bin/nebula-cert]
    #[arg(long)]
    cert_tool: Option<PathBuf>,

    /// Name of the certificate authority
    #[arg(long, default_value = DEFAULT_CA_NAME)]
    ca_name: String,

    /// Container image every node runs
    #[arg(long, default_value = "nebula-node")]
    image: String,

    /// Container runtime CLI
    #[arg(long, default_value = "docker")]
    runtime: String,

    /// Do not start the lighthouse container; wait for confirmation that it runs elsewhere
    #[arg(long)]
    defer_lighthouse: bool,

    /// Keep the contents of a non-empty output directory (reuses an existing CA)
    #[arg(long)]
    keep_existing: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Resolve every path against the project directory
    fn into_settings(self) -> Result<ProvisionSettings> {
        let project_dir = std::path::absolute(&self.project_dir)
            .wrap_err_with(|| format!("Failed to resolve project directory {:?}", self.project_dir))?;

        let mut settings = ProvisionSettings::for_project(project_dir);
        if let Some(path) = self.config_file {
            settings.network_config = std::path::absolute(&path)
                .wrap_err_with(|| format!("Failed to resolve configuration file {:?}", path))?;
        }
        if let Some(path) = self.template_file {
            settings.template = std::path::absolute(&path)
                .wrap_err_with(|| format!("Failed to resolve template file {:?}", path))?;
        }
        if let Some(path) = self.output_dir {
            settings.output_dir = std::path::absolute(&path)
                .wrap_err_with(|| format!("Failed to resolve output directory {:?}", path))?;
        }
        if let Some(path) = self.cert_tool {
            settings.cert_tool = path;
        }

        settings.ca_name = self.ca_name;
        settings.provision_containers = !self.no_containers;
        settings.defer_lighthouse = self.defer_lighthouse;
        settings.keep_existing = self.keep_existing;
        settings.container.image = self.image;
        settings.container.runtime = self.runtime;

        Ok(settings)
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Unknown flags print usage and fail with status 1
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            e.print().ok();
            std::process::exit(1);
        }
    };

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let assume_yes = args.yes;
    let settings = args.into_settings()?;

    info!("Starting meshstarter");
    info!("Network configuration: {:?}", settings.network_config);
    info!("Output directory: {:?}", settings.output_dir);

    let mut issuer = NebulaCert::new(&settings.cert_tool, settings.ca_name.clone());
    let mut runtime = DockerCli::new(settings.container.runtime.clone());
    let mut launcher = NebulaLauncher::new(settings.container.runtime.clone(), settings.container.daemon.clone());
    let mut confirm: Box<dyn Confirm> = if assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinConfirm)
    };

    let report = orchestrator::run(
        &settings,
        Toolchain {
            issuer: &mut issuer,
            runtime: &mut runtime,
            launcher: &mut launcher,
            confirm: confirm.as_mut(),
        },
    )?;

    match &report.credentials {
        CredentialOutcome::Created { signed } => info!("Created CA and {} node certificate(s)", signed.len()),
        CredentialOutcome::Reused => info!("Reused existing CA and node certificates"),
    }
    info!("Rendered {} node configuration(s)", report.rendered.len());
    if settings.provision_containers {
        info!("Started containers: {}", report.containers.join(", "));
    }

    info!("Network provisioning completed successfully");
    Ok(())
}
