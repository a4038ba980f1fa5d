//! Per-node container provisioning sequence.

use super::{ContainerError, ContainerRuntime, ContainerSpec, DaemonLauncher, ProvisionStep};
use crate::config::NetworkConfig;
use crate::credentials::{NodeCredentials, CA_CRT_FILE};
use crate::node_config::{config_file_name, LIGHTHOUSE_CONFIG_FILE};
use crate::settings::ProvisionSettings;
use crate::utils::command::CommandError;
use crate::utils::prompt::Confirm;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Fixed file names inside the container's config directory
const REMOTE_CA_CRT: &str = "ca.crt";
const REMOTE_CONFIG: &str = "config.yaml";
const REMOTE_HOST_CRT: &str = "host.crt";
const REMOTE_HOST_KEY: &str = "host.key";

/// TUN device the daemon opens; major 10, minor 200 on Linux
const TUN_DIR: &str = "/dev/net";
const TUN_DEVICE: &str = "/dev/net/tun";

/// Generated files belonging to one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBundle {
    pub name: String,
    pub is_lighthouse: bool,
    pub config_file: PathBuf,
    pub credentials: NodeCredentials,
    pub ca_crt: PathBuf,
}

/// Bundles for every node, lighthouse first
pub fn node_bundles(config: &NetworkConfig, output_dir: &Path) -> Vec<NodeBundle> {
    let bundle = |name: &str, config_file: String, is_lighthouse: bool| NodeBundle {
        name: name.to_string(),
        is_lighthouse,
        config_file: output_dir.join(config_file),
        credentials: NodeCredentials::for_node(output_dir, name),
        ca_crt: output_dir.join(CA_CRT_FILE),
    };

    std::iter::once(bundle(&config.lighthouse.name, LIGHTHOUSE_CONFIG_FILE.to_string(), true))
        .chain(
            config
                .resources
                .iter()
                .map(|r| bundle(&r.name, config_file_name(&r.name), false)),
        )
        .collect()
}

/// Run the whole sequence for one node, stopping at the first failed step
pub fn provision_node(
    runtime: &mut dyn ContainerRuntime,
    launcher: &mut dyn DaemonLauncher,
    settings: &ProvisionSettings,
    bundle: &NodeBundle,
) -> Result<(), ContainerError> {
    let name = bundle.name.as_str();
    let container = &settings.container;
    let step_err = |step: ProvisionStep| {
        move |source: CommandError| ContainerError::Step {
            node: name.to_string(),
            step,
            source,
        }
    };

    // Start the container
    let (project_dir, mount_point) = settings.mount();
    let spec = ContainerSpec {
        name: name.to_string(),
        image: container.image.clone(),
        capabilities: vec!["NET_ADMIN".to_string()],
        volume: Some((project_dir.to_path_buf(), mount_point.to_string())),
    };
    runtime
        .run(&spec)
        .map_err(step_err(ProvisionStep::StartContainer))?;

    // Create TUN device
    for command in [
        &["mkdir", "-p", TUN_DIR][..],
        &["mknod", TUN_DEVICE, "c", "10", "200"][..],
        &["chmod", "666", TUN_DEVICE][..],
    ] {
        runtime
            .exec(name, command)
            .map_err(step_err(ProvisionStep::CreateTunDevice))?;
    }

    // Create daemon configuration directory
    runtime
        .exec(name, &["mkdir", "-p", container.remote_config_dir.as_str()])
        .map_err(step_err(ProvisionStep::CreateConfigDir))?;

    // Copy the files to the container
    let files = [
        (&bundle.ca_crt, REMOTE_CA_CRT),
        (&bundle.config_file, REMOTE_CONFIG),
        (&bundle.credentials.crt, REMOTE_HOST_CRT),
        (&bundle.credentials.key, REMOTE_HOST_KEY),
    ];
    for (source, remote_name) in files {
        runtime
            .copy_into(name, source, &container.remote_path(remote_name))
            .map_err(step_err(ProvisionStep::CopyFiles))?;
    }

    launcher
        .launch(name, &container.remote_path(REMOTE_CONFIG))
        .map_err(step_err(ProvisionStep::StartDaemon))?;

    info!("Container '{}' is up and running {}", name, container.daemon);
    Ok(())
}

/// Provision every node: lighthouse first (unless deferred), then resources.
///
/// Returns the names of the containers that were fully provisioned.
pub fn provision_containers(
    runtime: &mut dyn ContainerRuntime,
    launcher: &mut dyn DaemonLauncher,
    confirm: &mut dyn Confirm,
    settings: &ProvisionSettings,
    config: &NetworkConfig,
) -> Result<Vec<String>, ContainerError> {
    let bundles = node_bundles(config, &settings.output_dir);
    let mut provisioned = Vec::with_capacity(bundles.len());
    let mut failed = Vec::new();

    for bundle in &bundles {
        if bundle.is_lighthouse && settings.defer_lighthouse {
            info!(
                "Lighthouse '{}' is deferred; start it with the files in {:?} before continuing",
                bundle.name, settings.output_dir
            );
            let question = format!(
                "Is lighthouse '{}' running and reachable at {}?",
                bundle.name,
                config.lighthouse.routable_endpoint()
            );
            if !confirm.confirm(&question)? {
                return Err(ContainerError::LighthouseNotConfirmed);
            }
            continue;
        }

        info!("Provisioning container '{}'", bundle.name);
        match provision_node(runtime, launcher, settings, bundle) {
            Ok(()) => provisioned.push(bundle.name.clone()),
            Err(e) => {
                warn!("{}", e);
                failed.push(bundle.name.clone());
            }
        }
    }

    if !failed.is_empty() {
        return Err(ContainerError::Incomplete { failed });
    }

    Ok(provisioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Lighthouse, NodeAddress, Resource};
    use std::io;

    /// Records every runtime and launcher call as a single line
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_run_for: Option<String>,
    }

    impl ContainerRuntime for Recorder {
        fn run(&mut self, spec: &ContainerSpec) -> Result<(), CommandError> {
            self.calls.push(format!("run {} {}", spec.name, spec.image));
            if self.fail_run_for.as_deref() == Some(spec.name.as_str()) {
                return Err(CommandError::Spawn {
                    command: format!("docker run {}", spec.name),
                    source: io::Error::new(io::ErrorKind::Other, "name already in use"),
                });
            }
            Ok(())
        }

        fn exec(&mut self, container: &str, command: &[&str]) -> Result<(), CommandError> {
            self.calls.push(format!("exec {} {}", container, command.join(" ")));
            Ok(())
        }

        fn copy_into(&mut self, container: &str, source: &Path, destination: &str) -> Result<(), CommandError> {
            self.calls
                .push(format!("cp {} {}:{}", source.display(), container, destination));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Launches(Vec<String>);

    impl DaemonLauncher for Launches {
        fn launch(&mut self, container: &str, config_path: &str) -> Result<(), CommandError> {
            self.0.push(format!("{} {}", container, config_path));
            Ok(())
        }
    }

    struct Answer(bool);

    impl Confirm for Answer {
        fn confirm(&mut self, _question: &str) -> io::Result<bool> {
            Ok(self.0)
        }
    }

    fn network() -> NetworkConfig {
        NetworkConfig {
            lighthouse: Lighthouse {
                name: "beacon".to_string(),
                ip: NodeAddress::parse("beacon", "10.0.0.1/24").unwrap(),
                groups: Vec::new(),
                routable_ip: "203.0.113.10".to_string(),
                routable_port: "4242".to_string(),
            },
            resources: vec![
                Resource {
                    name: "a".to_string(),
                    ip: NodeAddress::parse("a", "10.0.0.2/24").unwrap(),
                    groups: Vec::new(),
                },
                Resource {
                    name: "b".to_string(),
                    ip: NodeAddress::parse("b", "10.0.0.3/24").unwrap(),
                    groups: Vec::new(),
                },
            ],
        }
    }

    fn settings() -> ProvisionSettings {
        ProvisionSettings::for_project("/srv/mesh")
    }

    #[test]
    fn test_bundles_use_lighthouse_config_file() {
        let bundles = node_bundles(&network(), Path::new("/out"));

        assert_eq!(bundles.len(), 3);
        assert!(bundles[0].is_lighthouse);
        assert_eq!(bundles[0].config_file, PathBuf::from("/out/lighthouse-config.yaml"));
        assert_eq!(bundles[0].credentials.key, PathBuf::from("/out/beacon.key"));
        assert_eq!(bundles[1].config_file, PathBuf::from("/out/a-config.yaml"));
        assert_eq!(bundles[2].ca_crt, PathBuf::from("/out/ca.crt"));
    }

    #[test]
    fn test_single_node_sequence() {
        let settings = settings();
        let bundles = node_bundles(&network(), &settings.output_dir);
        let bundle = &bundles[1];
        let mut runtime = Recorder::default();
        let mut launcher = Launches::default();

        provision_node(&mut runtime, &mut launcher, &settings, bundle).unwrap();

        assert_eq!(
            runtime.calls,
            vec![
                "run a nebula-node",
                "exec a mkdir -p /dev/net",
                "exec a mknod /dev/net/tun c 10 200",
                "exec a chmod 666 /dev/net/tun",
                "exec a mkdir -p /etc/nebula",
                "cp /srv/mesh/generated/ca.crt a:/etc/nebula/ca.crt",
                "cp /srv/mesh/generated/a-config.yaml a:/etc/nebula/config.yaml",
                "cp /srv/mesh/generated/a.crt a:/etc/nebula/host.crt",
                "cp /srv/mesh/generated/a.key a:/etc/nebula/host.key",
            ]
        );
        assert_eq!(launcher.0, vec!["a /etc/nebula/config.yaml"]);
    }

    #[test]
    fn test_lighthouse_first() {
        let mut runtime = Recorder::default();
        let mut launcher = Launches::default();

        let provisioned =
            provision_containers(&mut runtime, &mut launcher, &mut Answer(false), &settings(), &network()).unwrap();

        assert_eq!(provisioned, vec!["beacon", "a", "b"]);
        let runs: Vec<_> = runtime.calls.iter().filter(|c| c.starts_with("run ")).collect();
        assert_eq!(runs, vec!["run beacon nebula-node", "run a nebula-node", "run b nebula-node"]);
        assert_eq!(launcher.0.len(), 3);
    }

    #[test]
    fn test_deferred_lighthouse_waits_for_operator() {
        let mut settings = settings();
        settings.defer_lighthouse = true;

        let mut runtime = Recorder::default();
        let mut launcher = Launches::default();
        let provisioned =
            provision_containers(&mut runtime, &mut launcher, &mut Answer(true), &settings, &network()).unwrap();
        assert_eq!(provisioned, vec!["a", "b"]);
        assert!(!runtime.calls.iter().any(|c| c.contains("beacon")));

        let mut runtime = Recorder::default();
        let err = provision_containers(&mut runtime, &mut launcher, &mut Answer(false), &settings, &network())
            .unwrap_err();
        assert!(matches!(err, ContainerError::LighthouseNotConfirmed));
        assert!(runtime.calls.is_empty());
    }

    #[test]
    fn test_failed_node_is_reported_and_others_continue() {
        let mut runtime = Recorder {
            fail_run_for: Some("a".to_string()),
            ..Default::default()
        };
        let mut launcher = Launches::default();

        let err = provision_containers(&mut runtime, &mut launcher, &mut Answer(false), &settings(), &network())
            .unwrap_err();

        match err {
            ContainerError::Incomplete { failed } => assert_eq!(failed, vec!["a"]),
            other => panic!("unexpected error: {other}"),
        }
        // "a" stopped right after the failed start, "b" still went through
        assert!(!runtime.calls.iter().any(|c| c.starts_with("exec a ")));
        assert_eq!(launcher.0, vec!["beacon /etc/nebula/config.yaml", "b /etc/nebula/config.yaml"]);
    }
}
