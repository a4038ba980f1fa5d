//! Certificate authority and per-node credentials.
//!
//! Credentials are produced by an external certificate tool reached through
//! the [`CredentialIssuer`] trait. The presence of `ca.key` and `ca.crt` in
//! the output directory is the only persisted state: when both exist the CA
//! and every node credential are treated as final and nothing is signed, so
//! re-running never rotates keys that were already distributed.

use crate::config::NetworkConfig;
use crate::utils::command::{CommandError, CommandLine};
use log::info;
use std::path::{Path, PathBuf};

pub const CA_KEY_FILE: &str = "ca.key";
pub const CA_CRT_FILE: &str = "ca.crt";

/// Errors raised while creating the CA or signing node certificates
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Certificate authority could not be created: {0}")]
    CaCreation(#[source] CommandError),
    #[error("Node \"{node}\" could not be signed: {source}")]
    Signing {
        node: String,
        #[source]
        source: CommandError,
    },
}

/// Key and certificate locations of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCredentials {
    pub key: PathBuf,
    pub crt: PathBuf,
}

impl NodeCredentials {
    pub fn for_node(output_dir: &Path, name: &str) -> Self {
        Self {
            key: output_dir.join(format!("{}.key", name)),
            crt: output_dir.join(format!("{}.crt", name)),
        }
    }

    /// CA key and certificate
    pub fn ca(output_dir: &Path) -> Self {
        Self {
            key: output_dir.join(CA_KEY_FILE),
            crt: output_dir.join(CA_CRT_FILE),
        }
    }
}

/// What a node certificate is issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest<'a> {
    pub name: &'a str,
    /// Overlay address with prefix length
    pub ip: &'a str,
    pub groups: &'a [String],
}

/// Capability to create a CA and sign node certificates
pub trait CredentialIssuer {
    fn create_ca(&mut self, output_dir: &Path) -> Result<(), CredentialError>;
    fn sign(&mut self, request: &SignRequest<'_>, output_dir: &Path) -> Result<(), CredentialError>;
}

/// Result of the credential stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOutcome {
    /// A new CA was created and these nodes were signed, in order
    Created { signed: Vec<String> },
    /// CA files were already present; nothing was touched
    Reused,
}

/// `nebula-cert` driven as a subprocess
#[derive(Debug, Clone)]
pub struct NebulaCert {
    program: PathBuf,
    ca_name: String,
}

impl NebulaCert {
    pub fn new(program: impl Into<PathBuf>, ca_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ca_name: ca_name.into(),
        }
    }

    pub fn ca_command(&self, output_dir: &Path) -> CommandLine {
        let ca = NodeCredentials::ca(output_dir);
        CommandLine::new(self.program.display().to_string())
            .args(["ca", "-name", self.ca_name.as_str()])
            .arg("-out-crt")
            .arg(ca.crt.display().to_string())
            .arg("-out-key")
            .arg(ca.key.display().to_string())
    }

    pub fn sign_command(&self, request: &SignRequest<'_>, output_dir: &Path) -> CommandLine {
        let ca = NodeCredentials::ca(output_dir);
        let node = NodeCredentials::for_node(output_dir, request.name);

        let mut cmd = CommandLine::new(self.program.display().to_string())
            .args(["sign", "-name", request.name, "-ip", request.ip]);
        if !request.groups.is_empty() {
            cmd = cmd.arg("-groups").arg(request.groups.join(","));
        }
        cmd.arg("-ca-crt")
            .arg(ca.crt.display().to_string())
            .arg("-ca-key")
            .arg(ca.key.display().to_string())
            .arg("-out-crt")
            .arg(node.crt.display().to_string())
            .arg("-out-key")
            .arg(node.key.display().to_string())
    }
}

impl CredentialIssuer for NebulaCert {
    fn create_ca(&mut self, output_dir: &Path) -> Result<(), CredentialError> {
        self.ca_command(output_dir).run().map_err(CredentialError::CaCreation)
    }

    fn sign(&mut self, request: &SignRequest<'_>, output_dir: &Path) -> Result<(), CredentialError> {
        self.sign_command(request, output_dir)
            .run()
            .map_err(|source| CredentialError::Signing {
                node: request.name.to_string(),
                source,
            })
    }
}

/// Check whether both CA files are already in `output_dir`
pub fn ca_exists(output_dir: &Path) -> bool {
    let ca = NodeCredentials::ca(output_dir);
    ca.key.exists() && ca.crt.exists()
}

/// Create the CA and sign the lighthouse and every resource, unless a CA exists.
///
/// Any failure stops immediately. Nodes signed before the failure are left
/// on disk.
pub fn generate_credentials(
    issuer: &mut dyn CredentialIssuer,
    config: &NetworkConfig,
    output_dir: &Path,
) -> Result<CredentialOutcome, CredentialError> {
    if ca_exists(output_dir) {
        info!("{} & {} already exist", CA_CRT_FILE, CA_KEY_FILE);
        info!("Certificates and keys will not be generated");
        return Ok(CredentialOutcome::Reused);
    }

    info!("Creating new certificate authority");
    issuer.create_ca(output_dir)?;
    info!("Certificate authority successfully created");

    let lighthouse = &config.lighthouse;
    let requests = std::iter::once(SignRequest {
        name: &lighthouse.name,
        ip: &lighthouse.ip.cidr,
        groups: &lighthouse.groups,
    })
    .chain(config.resources.iter().map(|r| SignRequest {
        name: &r.name,
        ip: &r.ip.cidr,
        groups: &r.groups,
    }));

    let mut signed = Vec::with_capacity(config.resources.len() + 1);
    for request in requests {
        issuer.sign(&request, output_dir)?;
        info!("Certificate for \"{}\" created", request.name);
        signed.push(request.name.to_string());
    }

    Ok(CredentialOutcome::Created { signed })
}
