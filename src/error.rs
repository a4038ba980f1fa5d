//! Crate-level error type.
//!
//! Each stage has its own error enum; [`MeshError`] collects them so the
//! binary has one place that decides how a failed run is reported.

use crate::config::ValidationError;
use crate::container::ContainerError;
use crate::credentials::CredentialError;
use crate::node_config::TemplateError;
use crate::output_dir::OutputDirError;

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error(transparent)]
    Config(#[from] ValidationError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    OutputDir(#[from] OutputDirError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Containers(#[from] ContainerError),
}

pub type Result<T> = std::result::Result<T, MeshError>;
