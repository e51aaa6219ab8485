//! Where Fomio keeps its files
//!
//! Everything lives in one data directory, `~/.config/fomio/` unless the
//! `FOMIO_HOME` environment variable names another one:
//! - config.toml - User configuration
//! - credentials.enc - Encrypted API credentials
//! - fomio.sqlite - Device storage (draft metadata, topic cache)

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable that relocates the data directory
pub const HOME_ENV: &str = "FOMIO_HOME";

const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "fomio.sqlite";
const CREDENTIALS_FILE: &str = "credentials.enc";

/// Pick the data directory from an explicit override or the user's home
fn resolve_dir(override_dir: Option<PathBuf>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    let home = home.context("Could not determine home directory")?;
    Ok(home.join(".config").join("fomio"))
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
    Ok(dir)
}

/// The data directory, created on first use
pub fn fomio_dir() -> Result<PathBuf> {
    let dir = resolve_dir(
        std::env::var_os(HOME_ENV).map(PathBuf::from),
        dirs::home_dir(),
    )?;
    ensure_dir(dir)
}

fn file_in(name: &str) -> Result<PathBuf> {
    Ok(fomio_dir()?.join(name))
}

/// User configuration file
pub fn config_path() -> Result<PathBuf> {
    file_in(CONFIG_FILE)
}

/// `SQLite` device storage
pub fn database_path() -> Result<PathBuf> {
    file_in(DATABASE_FILE)
}

/// Encrypted credentials file
pub fn credentials_path() -> Result<PathBuf> {
    file_in(CREDENTIALS_FILE)
}
