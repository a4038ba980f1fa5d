use crate::config::{NetworkConfig, RawNetworkConfig, ValidationError};
use crate::node_config::{NodeTemplate, TemplateError};
use log::info;
use std::path::Path;

/// Load, parse and validate the network description at `config_path`
pub fn load_network_config(config_path: &Path) -> Result<NetworkConfig, ValidationError> {
    info!("Loading network configuration from: {:?}", config_path);

    let content = std::fs::read_to_string(config_path).map_err(|source| ValidationError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;

    let config = parse_network_config(&content)?;

    info!(
        "Configuration file {:?} was parsed: lighthouse '{}' and {} resource(s)",
        config_path,
        config.lighthouse.name,
        config.resources.len()
    );

    Ok(config)
}

/// Parse and validate a network description held in memory
pub fn parse_network_config(content: &str) -> Result<NetworkConfig, ValidationError> {
    // An empty document deserializes to null; treat it like an empty mapping
    let raw: Option<RawNetworkConfig> = serde_yaml::from_str(content)?;
    raw.unwrap_or_default().validate()
}

/// Load the default node template at `template_path`
pub fn load_template(template_path: &Path) -> Result<NodeTemplate, TemplateError> {
    info!("Loading default node template from: {:?}", template_path);

    let content = std::fs::read_to_string(template_path).map_err(|source| TemplateError::Read {
        path: template_path.to_path_buf(),
        source,
    })?;

    let value: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|source| TemplateError::Parse {
        path: template_path.to_path_buf(),
        source,
    })?;

    NodeTemplate::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_network_config() {
        let yaml = r#"
lighthouse:
  name: lighthouse
  ip: 192.168.100.1/24
  routable_ip: 203.0.113.10
  routable_port: 4242
resources:
  - name: web
    ip: 192.168.100.10/24
    groups: ["http"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_network_config(temp_file.path()).unwrap();
        assert_eq!(config.lighthouse.name, "lighthouse");
        assert_eq!(config.resources[0].name, "web");
    }

    #[test]
    fn test_missing_file() {
        let err = load_network_config(Path::new("/nonexistent/network-config.yaml")).unwrap_err();
        assert!(matches!(err, ValidationError::Read { .. }));
    }

    #[test]
    fn test_empty_document() {
        let err = parse_network_config("").unwrap_err();
        assert!(matches!(err, ValidationError::MissingLighthouse));
    }

    #[test]
    fn test_load_template() {
        let yaml = r#"
pki:
  ca: /etc/nebula/ca.crt
lighthouse:
  am_lighthouse: false
  interval: 60
firewall:
  outbound:
    - port: any
      proto: any
      host: any
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        assert!(load_template(temp_file.path()).is_ok());
    }

    #[test]
    fn test_load_template_without_firewall() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "lighthouse:\n  am_lighthouse: false\n").unwrap();

        let err = load_template(temp_file.path()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingSection("firewall")));
    }
}
