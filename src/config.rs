//! Network description types and validation.
//!
//! The operator describes the mesh in a YAML document with a `lighthouse`
//! entry and an ordered list of `resources`. The document is deserialized
//! into loose `Raw*` structures first so that every missing field can be
//! reported by name, then checked and turned into [`NetworkConfig`].

use crate::credentials::{NodeCredentials, CA_CRT_FILE};
use crate::node_config::{config_file_name, LIGHTHOUSE_CONFIG_FILE};
use crate::utils::ip_utils::{is_valid_ip, split_cidr};
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Node names end up as file names and container names
const NODE_NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.-]*$";

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Failed to read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Configuration file contains duplicate resource name '{0}'")]
    DuplicateName(String),
    #[error("Configuration file contains duplicate resource IP '{0}'")]
    DuplicateIp(String),
    #[error("Lighthouse information is missing in the configuration file")]
    MissingLighthouse,
    #[error("Not enough information about the lighthouse (missing {})", .missing.join(", "))]
    IncompleteLighthouse { missing: Vec<&'static str> },
    #[error("Not enough information about resource no. {number} (missing {})", .missing.join(", "))]
    IncompleteResource {
        number: usize,
        missing: Vec<&'static str>,
    },
    #[error("IP or subnet length of '{node}' is wrongly specified: '{value}' (expected address/prefix)")]
    InvalidAddress { node: String, value: String },
    #[error("Invalid node name '{0}' (allowed: letters, digits, '_', '.', '-')")]
    InvalidName(String),
    #[error("Lighthouse {field} '{value}' is also used by a resource")]
    LighthouseCollision { field: &'static str, value: String },
    #[error("Node name '{name}' is reserved: it would overwrite the generated '{file}'")]
    ReservedName { name: String, file: &'static str },
}

/// Port number as written in YAML, either `4242` or `"4242"`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    fn is_blank(&self) -> bool {
        matches!(self, PortValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortValue::Number(n) => write!(f, "{}", n),
            PortValue::Text(s) => write!(f, "{}", s.trim()),
        }
    }
}

/// Network description exactly as found in the file
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct RawNetworkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighthouse: Option<RawNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<RawNode>>,
}

/// One node entry as found in the file; every field is optional here
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct RawNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routable_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routable_port: Option<PortValue>,
}

/// Overlay address of a node, kept both as written and split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddress {
    /// Address with prefix length, e.g. `10.0.0.1/24`
    pub cidr: String,
    /// Address without prefix length, e.g. `10.0.0.1`
    pub address: String,
    /// Prefix length, e.g. `24`
    pub prefix: String,
}

impl NodeAddress {
    /// Parse an `address/prefix` string belonging to node `node`
    pub fn parse(node: &str, value: &str) -> Result<Self, ValidationError> {
        let (address, prefix) = split_cidr(value).ok_or_else(|| ValidationError::InvalidAddress {
            node: node.to_string(),
            value: value.to_string(),
        })?;

        if !is_valid_ip(address) {
            warn!("Address '{}' of '{}' does not look like an IP address", address, node);
        }

        Ok(Self {
            cidr: value.to_string(),
            address: address.to_string(),
            prefix: prefix.to_string(),
        })
    }
}

/// The rendezvous node every other node registers with
#[derive(Debug, Clone, PartialEq)]
pub struct Lighthouse {
    pub name: String,
    pub ip: NodeAddress,
    pub groups: Vec<String>,
    /// Publicly reachable address
    pub routable_ip: String,
    /// Publicly reachable port
    pub routable_port: String,
}

impl Lighthouse {
    /// `routable_ip:routable_port`, the endpoint every node dials first
    pub fn routable_endpoint(&self) -> String {
        format!("{}:{}", self.routable_ip, self.routable_port)
    }
}

/// A peer node of the mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub ip: NodeAddress,
    /// Firewall groups, in declaration order
    pub groups: Vec<String>,
}

/// Validated network description
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub lighthouse: Lighthouse,
    pub resources: Vec<Resource>,
}

impl NetworkConfig {
    /// Names of all nodes, lighthouse first, then resources in declaration order
    pub fn node_names(&self) -> Vec<&str> {
        std::iter::once(self.lighthouse.name.as_str())
            .chain(self.resources.iter().map(|r| r.name.as_str()))
            .collect()
    }
}

impl RawNetworkConfig {
    /// Validate the raw document and build the typed configuration
    pub fn validate(self) -> Result<NetworkConfig, ValidationError> {
        let raw_resources = self.resources.unwrap_or_default();

        // Names and IPs must be unique among the resources
        let mut names = HashSet::new();
        for name in raw_resources.iter().filter_map(|r| r.name.as_deref()) {
            if !names.insert(name) {
                return Err(ValidationError::DuplicateName(name.to_string()));
            }
        }

        // Same address with another prefix length is still the same address
        let mut ips = HashSet::new();
        for ip in raw_resources.iter().filter_map(|r| r.ip.as_deref()) {
            if !ips.insert(address_key(ip)) {
                return Err(ValidationError::DuplicateIp(ip.to_string()));
            }
        }

        let raw_lighthouse = self.lighthouse.ok_or(ValidationError::MissingLighthouse)?;
        let lighthouse = validate_lighthouse(raw_lighthouse)?;

        let mut resources = Vec::with_capacity(raw_resources.len());
        for (idx, raw) in raw_resources.into_iter().enumerate() {
            resources.push(validate_resource(idx + 1, raw)?);
        }

        // The lighthouse shares the output directory and container namespace
        if resources.iter().any(|r| r.name == lighthouse.name) {
            return Err(ValidationError::LighthouseCollision {
                field: "name",
                value: lighthouse.name,
            });
        }
        let lighthouse_address = address_key(&lighthouse.ip.address);
        if resources.iter().any(|r| address_key(&r.ip.address) == lighthouse_address) {
            return Err(ValidationError::LighthouseCollision {
                field: "ip",
                value: lighthouse.ip.cidr,
            });
        }

        check_reserved_name(&lighthouse.name, true)?;
        for resource in &resources {
            check_reserved_name(&resource.name, false)?;
        }

        Ok(NetworkConfig {
            lighthouse,
            resources,
        })
    }
}

/// Reject names whose generated files land on the CA pair or the lighthouse config
fn check_reserved_name(name: &str, is_lighthouse: bool) -> Result<(), ValidationError> {
    let reserved = |file: &'static str| -> Result<(), ValidationError> {
        Err(ValidationError::ReservedName {
            name: name.to_string(),
            file,
        })
    };

    if NodeCredentials::for_node(Path::new(""), name) == NodeCredentials::ca(Path::new("")) {
        return reserved(CA_CRT_FILE);
    }
    if !is_lighthouse && config_file_name(name) == LIGHTHOUSE_CONFIG_FILE {
        return reserved(LIGHTHOUSE_CONFIG_FILE);
    }
    Ok(())
}

/// Address part of `address[/prefix]` in canonical form, for uniqueness checks
fn address_key(value: &str) -> String {
    let address = split_cidr(value).map_or(value, |(address, _)| address).trim();
    address
        .parse::<IpAddr>()
        .map_or_else(|_| address.to_string(), |ip| ip.to_string())
}

fn validate_lighthouse(raw: RawNode) -> Result<Lighthouse, ValidationError> {
    let mut missing = Vec::new();
    if is_blank(&raw.name) {
        missing.push("name");
    }
    if is_blank(&raw.ip) {
        missing.push("ip");
    }
    if is_blank(&raw.routable_ip) {
        missing.push("routable_ip");
    }
    if raw.routable_port.as_ref().map_or(true, PortValue::is_blank) {
        missing.push("routable_port");
    }

    let (Some(name), Some(ip), Some(routable_ip), Some(routable_port)) =
        (raw.name, raw.ip, raw.routable_ip, raw.routable_port)
    else {
        return Err(ValidationError::IncompleteLighthouse { missing });
    };
    if !missing.is_empty() {
        return Err(ValidationError::IncompleteLighthouse { missing });
    }

    validate_name(&name)?;
    let ip = NodeAddress::parse(&name, &ip)?;

    Ok(Lighthouse {
        name,
        ip,
        groups: raw.groups.unwrap_or_default(),
        routable_ip: routable_ip.trim().to_string(),
        routable_port: routable_port.to_string(),
    })
}

fn validate_resource(number: usize, raw: RawNode) -> Result<Resource, ValidationError> {
    let mut missing = Vec::new();
    if is_blank(&raw.name) {
        missing.push("name");
    }
    if is_blank(&raw.ip) {
        missing.push("ip");
    }

    let (Some(name), Some(ip)) = (raw.name, raw.ip) else {
        return Err(ValidationError::IncompleteResource { number, missing });
    };
    if !missing.is_empty() {
        return Err(ValidationError::IncompleteResource { number, missing });
    }

    validate_name(&name)?;
    let ip = NodeAddress::parse(&name, &ip)?;

    Ok(Resource {
        name,
        ip,
        groups: raw.groups.unwrap_or_default(),
    })
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| Regex::new(NODE_NAME_PATTERN).expect("node name pattern is valid"));

    if re.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
