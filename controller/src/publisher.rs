use std::{io, path::PathBuf};

use heatd_common::{feed::write_line_atomic, ControllerStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write status file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Replaces the state file with one status record per call.
#[derive(Debug, Clone)]
pub struct StatePublisher {
    path: PathBuf,
}

impl StatePublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn publish(&self, status: &ControllerStatus) -> Result<(), PublishError> {
        write_line_atomic(&self.path, &status.to_record()).map_err(|source| {
            PublishError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }
}
