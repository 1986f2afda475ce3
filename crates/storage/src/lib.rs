//! Preference persistence for docsign
//!
//! Preferences live in `preferences.json` under the platform's local data directory (or
//! an explicit root), wrapped in a versioned envelope. A missing file means defaults.

use directories::ProjectDirs;
use doc_model::Preferences;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SCHEMA_VERSION: u32 = 1;
const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed preferences file: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("preferences schema version {found} is newer than supported version {}", SCHEMA_VERSION)]
    UnsupportedVersion { found: u32 },
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

#[derive(Debug, Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    preferences: &'a Preferences,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    version: u32,
    #[serde(default)]
    preferences: Preferences,
}

impl ConfigStore {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "DocSign", "DocSign").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.root.join(PREFERENCES_FILE)
    }

    pub fn load_preferences(&self) -> Result<Preferences, StorageError> {
        let path = self.preferences_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::debug!("no preferences at {}, using defaults", path.display());
                return Ok(Preferences::default());
            }
            Err(err) => return Err(err.into()),
        };

        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        if envelope.version > SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion { found: envelope.version });
        }

        Ok(envelope.preferences)
    }

    /// Write through a sibling temp file so a crash never leaves a truncated file behind
    pub fn save_preferences(&self, preferences: &Preferences) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let bytes = serde_json::to_vec_pretty(&EnvelopeRef { version: SCHEMA_VERSION, preferences })?;
        let path = self.preferences_path();
        let staging = path.with_extension("json.tmp");

        fs::write(&staging, bytes)?;
        fs::rename(&staging, &path)?;

        log::info!("saved preferences to {}", path.display());
        Ok(())
    }

    /// Remove stored preferences; the next load yields defaults
    pub fn reset_preferences(&self) -> Result<(), StorageError> {
        match fs::remove_file(self.preferences_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
