//! Output directory preparation.

use crate::utils::prompt::Confirm;
use log::info;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while preparing the output directory
#[derive(Debug, thiserror::Error)]
pub enum OutputDirError {
    #[error("Failed to prepare output directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Output directory {0:?} is not empty and was not cleared")]
    Declined(PathBuf),
}

/// State the output directory was left in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDirState {
    /// Did not exist and was created
    Created,
    /// Existed and was empty
    Empty,
    /// Had contents which the operator agreed to remove
    Cleared,
    /// Had contents which were kept as they are
    Kept,
}

/// Make sure `dir` exists and holds nothing the operator did not agree to keep
pub fn prepare_output_dir(
    dir: &Path,
    keep_existing: bool,
    confirm: &mut dyn Confirm,
) -> Result<OutputDirState, OutputDirError> {
    let io_err = |source: io::Error| OutputDirError::Io {
        path: dir.to_path_buf(),
        source,
    };

    if !dir.exists() {
        fs::create_dir_all(dir).map_err(io_err)?;
        info!("Created output directory {:?}", dir);
        return Ok(OutputDirState::Created);
    }

    let entries = fs::read_dir(dir)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;

    if entries.is_empty() {
        return Ok(OutputDirState::Empty);
    }

    if keep_existing {
        info!("Keeping {} existing entries in {:?}", entries.len(), dir);
        return Ok(OutputDirState::Kept);
    }

    let question = format!(
        "Directory {} already exists and is not empty. Remove all its contents?",
        dir.display()
    );
    if !confirm.confirm(&question).map_err(io_err)? {
        return Err(OutputDirError::Declined(dir.to_path_buf()));
    }

    for entry in entries {
        let path = entry.path();
        let removed = if entry.file_type().map_err(io_err)?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|source| OutputDirError::Io { path, source })?;
    }
    info!("Cleared output directory {:?}", dir);

    Ok(OutputDirState::Cleared)
}
