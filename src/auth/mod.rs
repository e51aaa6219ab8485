//! Authentication module (encrypted file-based credential storage)
//!
//! Stores Discourse API credentials encrypted with AES-256-GCM in
//! ~/.config/fomio/credentials.enc, keyed by site URL. The encryption key is
//! derived from machine-specific identifiers.

pub mod events;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ApiError, ErrorKind};
use crate::paths;

pub use events::{AuthEvent, AuthEvents, Subscription};

const NONCE_SIZE: usize = 12;

/// Credentials for one Discourse site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiCredentials {
    /// A per-user key granted through the User API key flow
    UserApiKey {
        /// The key
        key: String,
        /// Client id the key was granted to
        #[serde(default)]
        client_id: Option<String>,
    },
    /// An admin-issued key acting as a given user
    ApiKey {
        /// The key
        key: String,
        /// Username the key acts as
        username: String,
    },
}

impl ApiCredentials {
    /// HTTP headers that authenticate a request
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::UserApiKey { key, client_id } => {
                let mut headers = vec![("User-Api-Key", key.clone())];
                if let Some(id) = client_id {
                    headers.push(("User-Api-Client-Id", id.clone()));
                }
                headers
            }
            Self::ApiKey { key, username } => {
                vec![("Api-Key", key.clone()), ("Api-Username", username.clone())]
            }
        }
    }
}

/// Get machine ID for key derivation (cross-platform)
fn get_machine_id() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(id) = fs::read_to_string("/etc/machine-id") {
            return id.trim().to_string();
        }
        if let Ok(id) = fs::read_to_string("/var/lib/dbus/machine-id") {
            return id.trim().to_string();
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(output) = std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
        {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(uuid) = stdout
                .lines()
                .find(|line| line.contains("IOPlatformUUID"))
                .and_then(|line| line.split('"').nth(3))
            {
                return uuid.to_string();
            }
        }
    }

    dirs::home_dir().map_or_else(
        || "fomio-fallback-key".to_string(),
        |p| p.to_string_lossy().to_string(),
    )
}

/// Derive encryption key from machine-specific data
fn derive_key() -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(get_machine_id().as_bytes());
    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
    }
    hasher.update(b"fomio-discourse-client-v1");
    hasher.finalize().into()
}

fn decryption_failed(detail: &str) -> anyhow::Error {
    anyhow::Error::new(ApiError::new(
        ErrorKind::Decryption,
        format!("Failed to decrypt credentials: {detail}"),
    ))
}

/// Load all credentials from an encrypted file
fn load_credentials_at(path: &Path, key: &[u8; 32]) -> Result<HashMap<String, ApiCredentials>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let encrypted = fs::read(path).context("Failed to read credentials file")?;
    if encrypted.len() < NONCE_SIZE {
        return Ok(HashMap::new());
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| anyhow::anyhow!("Invalid key length"))?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| decryption_failed("authentication tag mismatch"))?;
    let json = String::from_utf8(plaintext).map_err(|_| decryption_failed("invalid UTF-8"))?;
    serde_json::from_str(&json).map_err(|e| decryption_failed(&e.to_string()))
}

/// Save all credentials to an encrypted file
fn save_credentials_at(
    path: &Path,
    key: &[u8; 32],
    creds: &HashMap<String, ApiCredentials>,
) -> Result<()> {
    let json = serde_json::to_string(creds)?;
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| anyhow::anyhow!("Invalid key length"))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, json.as_bytes())
        .map_err(|_| anyhow::anyhow!("Failed to encrypt credentials"))?;

    let mut output = nonce_bytes.to_vec();
    output.extend(ciphertext);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create credentials directory")?;
    }
    fs::write(path, output).context("Failed to write credentials file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

fn site_key(site: &str) -> String {
    format!("fomio:{}", site.trim_end_matches('/'))
}

/// Store credentials for a site
pub fn store_credentials(site: &str, credentials: &ApiCredentials) -> Result<()> {
    let path = paths::credentials_path()?;
    let key = derive_key();
    let mut creds = load_credentials_at(&path, &key).unwrap_or_default();
    creds.insert(site_key(site), credentials.clone());
    save_credentials_at(&path, &key, &creds)
}

/// Get credentials for a site
pub fn get_credentials(site: &str) -> Result<Option<ApiCredentials>> {
    let path = paths::credentials_path()?;
    let creds = load_credentials_at(&path, &derive_key())?;
    Ok(creds.get(&site_key(site)).cloned())
}

/// Delete credentials for a site
pub fn delete_credentials(site: &str) -> Result<()> {
    let path = paths::credentials_path()?;
    let key = derive_key();
    let mut creds = load_credentials_at(&path, &key).unwrap_or_default();
    creds.remove(&site_key(site));
    save_credentials_at(&path, &key, &creds)
}

/// Check if credentials exist for a site
pub fn has_credentials(site: &str) -> bool {
    get_credentials(site).is_ok_and(|c| c.is_some())
}
