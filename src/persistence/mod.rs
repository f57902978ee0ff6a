//! Credential persistence for AskSQL.
//!
//! Two independent single-slot stores hold a [`ConnectionProfile`]:
//! a personal file in the home directory with an obfuscated password, and a
//! shared file next to the project, encrypted with a locally generated key.
//! Profiles are not validated on save; validation happens on first use.

mod personal;
mod shared;

pub use personal::PersonalStore;
pub use shared::SharedStore;

use crate::config::ConnectionProfile;
use crate::error::{AskSqlError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A single-slot store for connection settings.
///
/// Failures are returned, never panicked on; `load` reports problems in the
/// log and treats them as "nothing stored".
pub trait CredentialStore: Send + Sync {
    /// Persists `profile`, replacing whatever was stored.
    fn save(&self, profile: &ConnectionProfile) -> Result<()>;

    /// Returns the stored profile, or `None` if absent or unreadable.
    fn load(&self) -> Option<ConnectionProfile>;

    /// Removes the stored profile. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;

    /// Returns true if something is stored.
    fn exists(&self) -> bool;
}

/// Which credential store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Per-user file in the home directory.
    Personal,
    /// Encrypted file shared through the project directory.
    Shared,
}

impl StoreKind {
    /// Returns the store name as used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Shared => "shared",
        }
    }

    /// Opens the store at its default location.
    pub fn open(self) -> Box<dyn CredentialStore> {
        match self {
            Self::Personal => Box::new(PersonalStore::new()),
            Self::Shared => Box::new(SharedStore::new()),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = AskSqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "personal" => Ok(Self::Personal),
            "shared" | "test" => Ok(Self::Shared),
            _ => Err(AskSqlError::config(format!(
                "Unknown credential store '{s}'. Expected 'personal' or 'shared'"
            ))),
        }
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AskSqlError::persistence(format!(
                "Failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    std::fs::write(path, contents).map_err(|e| {
        AskSqlError::persistence(format!("Failed to write {}: {e}", path.display()))
    })
}

fn remove_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AskSqlError::persistence(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_from_str() {
        assert_eq!("personal".parse::<StoreKind>().unwrap(), StoreKind::Personal);
        assert_eq!("Shared".parse::<StoreKind>().unwrap(), StoreKind::Shared);
        assert_eq!("test".parse::<StoreKind>().unwrap(), StoreKind::Shared);
        assert!("keyring".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_file(&dir.path().join("absent.json")).is_ok());
    }
}
