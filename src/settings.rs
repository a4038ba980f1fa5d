//! Resolved run settings.
//!
//! Every path and program name the run needs is resolved once, up front, and
//! passed explicitly to each stage. Nothing downstream looks at the current
//! working directory.

use std::path::{Path, PathBuf};

/// Default network description, relative to the project directory
pub const DEFAULT_NETWORK_CONFIG: &str = "conf/network-config.yaml";
/// Default node template, relative to the project directory
pub const DEFAULT_TEMPLATE: &str = "conf/default-config.yaml";
/// Default output directory, relative to the project directory
pub const DEFAULT_OUTPUT_DIR: &str = "generated";
/// Default certificate tool, relative to the project directory
pub const DEFAULT_CERT_TOOL: &str = "bin/nebula-cert";
pub const DEFAULT_CA_NAME: &str = "mesh-ca";

/// How node containers are created and what goes inside them
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSettings {
    /// Container runtime CLI
    pub runtime: String,
    pub image: String,
    /// Where the project directory is mounted inside each container
    pub mount_point: String,
    /// Network daemon binary inside the container
    pub daemon: String,
    /// Directory inside the container holding the daemon's files
    pub remote_config_dir: String,
}

impl ContainerSettings {
    /// Absolute path of `file_name` inside the container's config directory
    pub fn remote_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.remote_config_dir.trim_end_matches('/'), file_name)
    }
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "nebula-node".to_string(),
            mount_point: "/home/root/proj".to_string(),
            daemon: "nebula".to_string(),
            remote_config_dir: "/etc/nebula".to_string(),
        }
    }
}

/// Everything one provisioning run needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionSettings {
    pub project_dir: PathBuf,
    pub network_config: PathBuf,
    pub template: PathBuf,
    pub output_dir: PathBuf,
    pub cert_tool: PathBuf,
    pub ca_name: String,
    /// Launch containers after generating files
    pub provision_containers: bool,
    /// Leave the lighthouse to the operator and wait for confirmation
    pub defer_lighthouse: bool,
    /// Reuse a non-empty output directory instead of asking to clear it
    pub keep_existing: bool,
    pub container: ContainerSettings,
}

impl ProvisionSettings {
    /// Default layout rooted at `project_dir`
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            network_config: project_dir.join(DEFAULT_NETWORK_CONFIG),
            template: project_dir.join(DEFAULT_TEMPLATE),
            output_dir: project_dir.join(DEFAULT_OUTPUT_DIR),
            cert_tool: project_dir.join(DEFAULT_CERT_TOOL),
            ca_name: DEFAULT_CA_NAME.to_string(),
            provision_containers: true,
            defer_lighthouse: false,
            keep_existing: false,
            container: ContainerSettings::default(),
            project_dir,
        }
    }

    /// Project directory as seen from inside a container
    pub fn mount(&self) -> (&Path, &str) {
        (self.project_dir.as_path(), self.container.mount_point.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_layout() {
        let settings = ProvisionSettings::for_project("/srv/mesh");

        assert_eq!(settings.network_config, PathBuf::from("/srv/mesh/conf/network-config.yaml"));
        assert_eq!(settings.template, PathBuf::from("/srv/mesh/conf/default-config.yaml"));
        assert_eq!(settings.output_dir, PathBuf::from("/srv/mesh/generated"));
        assert_eq!(settings.cert_tool, PathBuf::from("/srv/mesh/bin/nebula-cert"));
        assert!(settings.provision_containers);
        assert!(!settings.defer_lighthouse);
    }

    #[test]
    fn test_remote_path() {
        let mut container = ContainerSettings::default();
        assert_eq!(container.remote_path("config.yaml"), "/etc/nebula/config.yaml");

        container.remote_config_dir = "/opt/nebula/".to_string();
        assert_eq!(container.remote_path("host.key"), "/opt/nebula/host.key");
    }
}
