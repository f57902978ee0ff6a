//! Shared (test database) credential file.
//!
//! The profile is serialized to JSON and encrypted with AES-256-GCM. The
//! file holds base64 of `nonce || ciphertext`; the 32-byte key lives
//! base64-encoded in a separate file, generated on first save.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{remove_file, write_file, CredentialStore};
use crate::config::ConnectionProfile;
use crate::error::{AskSqlError, Result};

const CONFIG_DIR: &str = ".config";
const DATA_FILE: &str = "test_db.enc";
const KEY_FILE: &str = "test_db.key";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Encrypted credential store shared through the project directory.
#[derive(Debug, Clone)]
pub struct SharedStore {
    data_path: PathBuf,
    key_path: PathBuf,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore {
    /// Opens the store under `./.config`.
    pub fn new() -> Self {
        Self::in_dir(CONFIG_DIR)
    }

    /// Opens the store with both files inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            data_path: dir.join(DATA_FILE),
            key_path: dir.join(KEY_FILE),
        }
    }

    /// Path of the encrypted profile.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Path of the key file.
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    fn read_key(&self) -> Result<[u8; KEY_LEN]> {
        let encoded = std::fs::read_to_string(&self.key_path)
            .map_err(|e| AskSqlError::persistence(format!("Failed to read key file: {e}")))?;
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AskSqlError::persistence(format!("Corrupt key file: {e}")))?;
        bytes.try_into().map_err(|_| {
            AskSqlError::persistence(format!("Key file must hold {KEY_LEN} bytes"))
        })
    }

    fn key_or_create(&self) -> Result<[u8; KEY_LEN]> {
        if self.key_path.exists() {
            return self.read_key();
        }

        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        write_file(&self.key_path, STANDARD.encode(key).as_bytes())?;
        info!("Generated credential key at {}", self.key_path.display());
        Ok(key)
    }

    fn read(&self) -> Result<ConnectionProfile> {
        let key = self.read_key()?;
        let encoded = std::fs::read_to_string(&self.data_path)
            .map_err(|e| AskSqlError::persistence(format!("Failed to read credentials: {e}")))?;
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AskSqlError::persistence(format!("Corrupt credentials file: {e}")))?;

        let plaintext = decrypt(&key, &data)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| AskSqlError::persistence(format!("Corrupt credentials file: {e}")))
    }
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| AskSqlError::persistence(format!("Encryption failed: {e}")))?;

    let mut out = nonce_bytes.to_vec();
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn decrypt(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(AskSqlError::persistence("Encrypted credentials are truncated"));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| AskSqlError::persistence("Failed to decrypt credentials (wrong key?)"))
}

impl CredentialStore for SharedStore {
    fn save(&self, profile: &ConnectionProfile) -> Result<()> {
        let key = self.key_or_create()?;
        let json = serde_json::to_vec(profile)
            .map_err(|e| AskSqlError::persistence(format!("Failed to encode credentials: {e}")))?;
        let data = encrypt(&key, &json)?;
        write_file(&self.data_path, STANDARD.encode(data).as_bytes())?;

        debug!("Saved shared credentials to {}", self.data_path.display());
        Ok(())
    }

    fn load(&self) -> Option<ConnectionProfile> {
        if !self.exists() {
            return None;
        }
        match self.read() {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Ignoring shared credentials: {e}");
                None
            }
        }
    }

    /// Removes the encrypted profile. The key is kept so later saves stay
    /// readable by whoever already has it.
    fn clear(&self) -> Result<()> {
        remove_file(&self.data_path)
    }

    fn exists(&self) -> bool {
        self.data_path.exists()
    }
}
