//! Personal credential file.
//!
//! JSON at `~/.asksql_credentials.json`. The password is base64 encoded,
//! which only keeps it from being read over a shoulder. It is not encryption.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{remove_file, write_file, CredentialStore};
use crate::config::{ConnectionProfile, Secret};
use crate::error::{AskSqlError, Result};

const FILE_NAME: &str = ".asksql_credentials.json";

/// Obfuscated per-user credential store.
#[derive(Debug, Clone)]
pub struct PersonalStore {
    path: PathBuf,
}

impl Default for PersonalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonalStore {
    /// Opens the store in the home directory.
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    /// Opens a store at an explicit path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns `~/.asksql_credentials.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(FILE_NAME)
    }

    /// Returns the file backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ConnectionProfile> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| AskSqlError::persistence(format!("Failed to read credentials: {e}")))?;
        let mut profile: ConnectionProfile = serde_json::from_str(&content)
            .map_err(|e| AskSqlError::persistence(format!("Corrupt credentials file: {e}")))?;

        if let Some(encoded) = profile.password.take() {
            let bytes = STANDARD.decode(encoded.expose()).map_err(|e| {
                AskSqlError::persistence(format!("Corrupt password encoding: {e}"))
            })?;
            let password = String::from_utf8(bytes).map_err(|e| {
                AskSqlError::persistence(format!("Corrupt password encoding: {e}"))
            })?;
            profile.password = Some(Secret::new(password));
        }

        Ok(profile)
    }
}

impl CredentialStore for PersonalStore {
    fn save(&self, profile: &ConnectionProfile) -> Result<()> {
        let mut stored = profile.clone();
        stored.password = profile
            .password
            .as_ref()
            .map(|p| Secret::new(STANDARD.encode(p.expose())));

        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| AskSqlError::persistence(format!("Failed to encode credentials: {e}")))?;
        write_file(&self.path, json.as_bytes())?;

        debug!("Saved personal credentials to {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Option<ConnectionProfile> {
        if !self.exists() {
            return None;
        }
        match self.read() {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Ignoring personal credentials: {e}");
                None
            }
        }
    }

    fn clear(&self) -> Result<()> {
        remove_file(&self.path)
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}
