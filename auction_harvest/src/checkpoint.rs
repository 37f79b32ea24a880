//! Durable JSON checkpoint of every unit, rewritten after each unit.

use std::path::{Path, PathBuf};

use crate::model::{AuctionUnit, FailedUnit};

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error on {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads and writes the checkpoint file and the failed side list.
///
/// Writes go to a sibling `.tmp` file that is renamed over the target, so a
/// crash mid-write leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    failed_path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let failed_path = default_failed_path(&path);
        Self { path, failed_path }
    }

    pub fn with_failed_path(mut self, failed_path: impl Into<PathBuf>) -> Self {
        self.failed_path = failed_path.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn failed_path(&self) -> &Path {
        &self.failed_path
    }

    /// `Ok(None)` when no checkpoint exists yet.
    pub fn load(&self) -> Result<Option<Vec<AuctionUnit>>, PersistenceError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io(&self.path, source)),
        };
        let units = serde_json::from_str(&raw).map_err(|source| PersistenceError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(Some(units))
    }

    pub fn save(&self, units: &[AuctionUnit]) -> Result<(), PersistenceError> {
        write_json_atomic(&self.path, units)
    }

    pub fn save_failed(&self, failed: &[FailedUnit]) -> Result<(), PersistenceError> {
        write_json_atomic(&self.failed_path, failed)
    }

    fn io(&self, path: &Path, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

fn default_failed_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    path.with_file_name(format!("{}_failed.json", stem))
}

fn write_json_atomic<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    let io = |source| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    };
    let body = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Json {
        path: path.display().to_string(),
        source,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, body).map_err(io)?;
    std::fs::rename(&tmp, path).map_err(io)?;
    Ok(())
}
