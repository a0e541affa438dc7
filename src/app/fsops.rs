use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::app::error::BridgeError;

/// Local filesystem collaborator for the transfer protocols: existence
/// checks, recursive file counts for the pre/post sanity comparison, and
/// destination directory creation.
pub trait LocalFs: Send + Sync {
    fn dir_exists(&self, path: &str) -> bool;
    fn count_files(&self, path: &str) -> u64;
    fn ensure_dir(&self, path: &str, trace_id: &str) -> Result<(), BridgeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdFs;

impl LocalFs for StdFs {
    fn dir_exists(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn count_files(&self, path: &str) -> u64 {
        WalkDir::new(path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .count() as u64
    }

    fn ensure_dir(&self, path: &str, trace_id: &str) -> Result<(), BridgeError> {
        fs::create_dir_all(path).map_err(|err| {
            BridgeError::system(
                format!("Failed to create local directory {path}: {err}"),
                trace_id,
            )
        })
    }
}
