//! Per-node daemon configuration rendering.
//!
//! Every node gets its own deep copy of the default template, specialized
//! with the lighthouse endpoint and, for resources, an inbound firewall that
//! allows ICMP from anyone plus everything from each group the resource
//! belongs to. The template itself is never modified.
//!
//! ## Rendered Keys
//!
//! - Lighthouse: `lighthouse.am_lighthouse`, `static_host_map`
//! - Resource: `static_host_map`, `lighthouse.hosts`, `firewall.inbound`
//!
//! Everything else in the template is passed through untouched.

use crate::config::{Lighthouse, NetworkConfig, Resource};
use log::info;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Rendered lighthouse config file name (independent of the lighthouse's name)
pub const LIGHTHOUSE_CONFIG_FILE: &str = "lighthouse-config.yaml";

/// Errors raised while loading the template or rendering node configs
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to read node template {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse node template {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Node template must be a mapping at the top level")]
    NotAMapping,
    #[error("Node template has no '{0}' mapping")]
    MissingSection(&'static str),
    #[error("Failed to serialize node config: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("Failed to write node config {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Default node template, read-only once loaded
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    root: Value,
}

impl NodeTemplate {
    /// Wrap a parsed template, checking the sections the renderer writes into
    pub fn new(root: Value) -> Result<Self, TemplateError> {
        let mapping = root.as_mapping().ok_or(TemplateError::NotAMapping)?;
        for section in ["lighthouse", "firewall"] {
            if !mapping.get(section).map_or(false, Value::is_mapping) {
                return Err(TemplateError::MissingSection(section));
            }
        }
        Ok(Self { root })
    }

    /// Independent deep copy to specialize for one node
    fn instantiate(&self) -> Value {
        self.root.clone()
    }
}

/// One inbound firewall rule in the daemon's format
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct FirewallRule {
    pub port: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub proto: String,
}

impl FirewallRule {
    /// ICMP from any host
    pub fn icmp_from_any() -> Self {
        Self {
            port: "any".to_string(),
            host: Some("any".to_string()),
            group: None,
            proto: "icmp".to_string(),
        }
    }

    /// Every port and protocol from members of `group`
    pub fn allow_group(group: &str) -> Self {
        Self {
            port: "any".to_string(),
            host: None,
            group: Some(group.to_string()),
            proto: "any".to_string(),
        }
    }
}

/// A config file written for one node
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedConfig {
    pub node: String,
    pub path: PathBuf,
}

/// Config file name for a resource
pub fn config_file_name(name: &str) -> String {
    format!("{}-config.yaml", name)
}

/// Inbound rules for a node in `groups`: ICMP first, then one rule per group
pub fn inbound_rules(groups: &[String]) -> Vec<FirewallRule> {
    std::iter::once(FirewallRule::icmp_from_any())
        .chain(groups.iter().map(|g| FirewallRule::allow_group(g)))
        .collect()
}

/// Render the lighthouse's own configuration
pub fn render_lighthouse(template: &NodeTemplate, lighthouse: &Lighthouse) -> Result<Value, TemplateError> {
    let mut config = template.instantiate();

    section_mut(&mut config, "lighthouse")?.insert("am_lighthouse".into(), Value::Bool(true));
    set_key(&mut config, "static_host_map", static_host_map(lighthouse))?;

    Ok(config)
}

/// Render the configuration of one resource
pub fn render_resource(
    template: &NodeTemplate,
    resource: &Resource,
    lighthouse: &Lighthouse,
) -> Result<Value, TemplateError> {
    let mut config = template.instantiate();

    // The resource finds the lighthouse through its static host map
    set_key(&mut config, "static_host_map", static_host_map(lighthouse))?;

    section_mut(&mut config, "lighthouse")?.insert(
        "hosts".into(),
        Value::Sequence(vec![Value::String(lighthouse.ip.address.clone())]),
    );

    let rules = serde_yaml::to_value(inbound_rules(&resource.groups))?;
    section_mut(&mut config, "firewall")?.insert("inbound".into(), rules);

    Ok(config)
}

/// Serialize `config` to `output_dir/file_name`
pub fn write_node_config(output_dir: &Path, file_name: &str, config: &Value) -> Result<PathBuf, TemplateError> {
    let path = output_dir.join(file_name);
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&path, yaml).map_err(|source| TemplateError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Render and write the configs of every node, lighthouse first
pub fn render_all(
    template: &NodeTemplate,
    config: &NetworkConfig,
    output_dir: &Path,
) -> Result<Vec<RenderedConfig>, TemplateError> {
    let mut rendered = Vec::with_capacity(config.resources.len() + 1);

    let lighthouse_config = render_lighthouse(template, &config.lighthouse)?;
    let path = write_node_config(output_dir, LIGHTHOUSE_CONFIG_FILE, &lighthouse_config)?;
    info!("Configuration for lighthouse created - {:?}", path);
    rendered.push(RenderedConfig {
        node: config.lighthouse.name.clone(),
        path,
    });

    for resource in &config.resources {
        let resource_config = render_resource(template, resource, &config.lighthouse)?;
        let path = write_node_config(output_dir, &config_file_name(&resource.name), &resource_config)?;
        info!("Configuration for resource {} created - {:?}", resource.name, path);
        rendered.push(RenderedConfig {
            node: resource.name.clone(),
            path,
        });
    }

    Ok(rendered)
}

/// `{ <lighthouse address>: ["<routable_ip>:<routable_port>"] }`
fn static_host_map(lighthouse: &Lighthouse) -> Value {
    let mut map = Mapping::new();
    map.insert(
        Value::String(lighthouse.ip.address.clone()),
        Value::Sequence(vec![Value::String(lighthouse.routable_endpoint())]),
    );
    Value::Mapping(map)
}

fn set_key(config: &mut Value, key: &str, value: Value) -> Result<(), TemplateError> {
    config
        .as_mapping_mut()
        .ok_or(TemplateError::NotAMapping)?
        .insert(key.into(), value);
    Ok(())
}

fn section_mut<'a>(config: &'a mut Value, section: &'static str) -> Result<&'a mut Mapping, TemplateError> {
    config
        .get_mut(section)
        .and_then(Value::as_mapping_mut)
        .ok_or(TemplateError::MissingSection(section))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeAddress;

    const TEMPLATE: &str = r#"
pki:
  ca: /etc/nebula/ca.crt
  cert: /etc/nebula/host.crt
  key: /etc/nebula/host.key
static_host_map: {}
lighthouse:
  am_lighthouse: false
  interval: 60
  hosts: []
listen:
  host: 0.0.0.0
  port: 4242
firewall:
  outbound:
    - port: any
      proto: any
      host: any
  inbound: []
"#;

    fn template() -> NodeTemplate {
        NodeTemplate::new(serde_yaml::from_str(TEMPLATE).unwrap()).unwrap()
    }

    fn lighthouse() -> Lighthouse {
        Lighthouse {
            name: "lighthouse".to_string(),
            ip: NodeAddress::parse("lighthouse", "10.0.0.1/24").unwrap(),
            groups: Vec::new(),
            routable_ip: "203.0.113.10".to_string(),
            routable_port: "4242".to_string(),
        }
    }

    fn resource(groups: &[&str]) -> Resource {
        Resource {
            name: "laptop".to_string(),
            ip: NodeAddress::parse("laptop", "10.0.0.2/24").unwrap(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_lighthouse_static_host_map() {
        let config = render_lighthouse(&template(), &lighthouse()).unwrap();

        let host_map = config["static_host_map"].as_mapping().unwrap();
        assert_eq!(host_map.len(), 1);
        assert_eq!(
            host_map.get("10.0.0.1").unwrap(),
            &Value::Sequence(vec![Value::String("203.0.113.10:4242".to_string())])
        );
        assert_eq!(config["lighthouse"]["am_lighthouse"], Value::Bool(true));

        // Unrelated template keys survive
        assert_eq!(config["lighthouse"]["interval"], Value::from(60));
        assert_eq!(config["listen"]["port"], Value::from(4242));
    }

    #[test]
    fn test_resource_firewall_groups() {
        let config = render_resource(&template(), &resource(&["a", "b"]), &lighthouse()).unwrap();

        let inbound = config["firewall"]["inbound"].as_sequence().unwrap();
        assert_eq!(inbound.len(), 3);

        assert_eq!(inbound[0]["proto"], Value::from("icmp"));
        assert_eq!(inbound[0]["host"], Value::from("any"));
        assert_eq!(inbound[0]["port"], Value::from("any"));

        assert_eq!(inbound[1]["group"], Value::from("a"));
        assert_eq!(inbound[1]["proto"], Value::from("any"));
        assert!(inbound[1].get("host").is_none());

        assert_eq!(inbound[2]["group"], Value::from("b"));

        // Outbound rules come from the template
        assert_eq!(config["firewall"]["outbound"].as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_resource_points_at_lighthouse() {
        let config = render_resource(&template(), &resource(&[]), &lighthouse()).unwrap();

        assert_eq!(
            config["lighthouse"]["hosts"],
            Value::Sequence(vec![Value::from("10.0.0.1")])
        );
        assert_eq!(config["lighthouse"]["am_lighthouse"], Value::Bool(false));
        assert_eq!(config["static_host_map"]["10.0.0.1"][0], Value::from("203.0.113.10:4242"));
        assert_eq!(config["firewall"]["inbound"].as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_template_not_mutated() {
        let template = template();
        let before = template.root.clone();

        render_lighthouse(&template, &lighthouse()).unwrap();
        render_resource(&template, &resource(&["a"]), &lighthouse()).unwrap();

        assert_eq!(template.root, before);
    }

    #[test]
    fn test_template_requires_sections() {
        let value: Value = serde_yaml::from_str("firewall: {}\n").unwrap();
        assert!(matches!(
            NodeTemplate::new(value).unwrap_err(),
            TemplateError::MissingSection("lighthouse")
        ));

        let value: Value = serde_yaml::from_str("- not\n- a mapping\n").unwrap();
        assert!(matches!(NodeTemplate::new(value).unwrap_err(), TemplateError::NotAMapping));
    }

    #[test]
    fn test_render_all_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let network = NetworkConfig {
            lighthouse: lighthouse(),
            resources: vec![resource(&["ssh"])],
        };

        let rendered = render_all(&template(), &network, dir.path()).unwrap();

        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].node, "lighthouse");
        assert_eq!(rendered[0].path, dir.path().join("lighthouse-config.yaml"));
        assert_eq!(rendered[1].path, dir.path().join("laptop-config.yaml"));

        let written: Value =
            serde_yaml::from_str(&std::fs::read_to_string(&rendered[1].path).unwrap()).unwrap();
        assert_eq!(written["firewall"]["inbound"][1]["group"], Value::from("ssh"));
    }
}
