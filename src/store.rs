//! Persistent JSON documents
//!
//! The store is passive: it reads and atomically replaces whole documents and knows
//! nothing about their meaning. A reader observes either the previous or the new
//! document, never a truncated one.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    ffi::OsString,
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKey {
    DeviceState,
    NetworkCredentials,
}

#[derive(Clone, Debug)]
pub struct JsonStore {
    state_file: PathBuf,
    wifi_file: PathBuf,
}

impl JsonStore {
    pub fn new(state_file: impl Into<PathBuf>, wifi_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            wifi_file: wifi_file.into(),
        }
    }

    pub fn path(&self, key: DocumentKey) -> &Path {
        match key {
            DocumentKey::DeviceState => &self.state_file,
            DocumentKey::NetworkCredentials => &self.wifi_file,
        }
    }

    /// Read a document, falling back to `default` when it is missing, unreadable or malformed
    pub fn read<T: DeserializeOwned>(&self, key: DocumentKey, default: T) -> T {
        let path = self.path(key);

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{key:?} not found at {path:?}, using default");
                return default;
            }
            Err(e) => {
                warn!("failed to read {key:?} from {path:?}: {e}");
                return default;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(document) => document,
            Err(e) => {
                warn!("failed to parse {key:?} from {path:?}: {e}");
                default
            }
        }
    }

    /// Atomically replace a document
    pub fn write<T: Serialize>(&self, key: DocumentKey, document: &T) -> Result<()> {
        let path = self.path(key);
        let json = serde_json::to_vec_pretty(document)
            .context(format!("failed to serialize {key:?}"))?;

        write_atomic(path, &json)
    }
}

/// Write `contents` next to `path` and rename it into place
///
/// The staging file lives in the same directory so the rename never crosses a
/// filesystem boundary.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(format!("failed to create directory {parent:?}"))?;
    }

    let staging = staging_path(path);

    let mut file =
        File::create(&staging).context(format!("failed to create staging file {staging:?}"))?;
    file.write_all(contents)
        .context(format!("failed to write staging file {staging:?}"))?;
    file.sync_all()
        .context(format!("failed to sync staging file {staging:?}"))?;
    drop(file);

    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(e).context(format!("failed to rename {staging:?} to {path:?}"));
    }

    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(OsString::from(".tmp"));
    PathBuf::from(name)
}
