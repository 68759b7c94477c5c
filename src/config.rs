// Process configuration.
//
// Built once from the environment at startup and passed by reference
// into the gateway constructor; nothing in the crate reads environment
// variables after this point. Most fields feed the peripheral surfaces
// (API auth, uploads); the gateway itself only consumes the store
// endpoint and the default exchange rate.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::store::DEFAULT_DB_FILE;

/// Upload types accepted for receipts and photos.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "pdf"];

const DEFAULT_EXCHANGE_RATE: f64 = 1.35;

#[derive(Debug, Clone)]
pub struct Config {
    /// Document store connection string, optionally `sqlite:`-prefixed.
    pub store_endpoint: String,

    /// Session signing secret. Unused by the data layer.
    pub secret_key: String,

    /// Initial USD -> CAD rate; the admin can update it at runtime.
    pub default_exchange_rate: f64,

    pub admin_username: String,

    /// Pre-hashed admin password (hex SHA-256).
    pub admin_password_hash: String,

    /// Receipt/photo upload location.
    pub upload_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_endpoint: DEFAULT_DB_FILE.to_string(),
            secret_key: "qwerty12345678".to_string(),
            default_exchange_rate: DEFAULT_EXCHANGE_RATE,
            admin_username: "admin".to_string(),
            admin_password_hash: password_digest("admin123"),
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl Config {
    /// Read configuration from the environment, creating the upload
    /// directory if missing.
    pub fn from_env() -> Result<Config> {
        let defaults = Config::default();

        let default_exchange_rate = match env::var("DEFAULT_EXCHANGE_RATE") {
            Ok(raw) => raw
                .parse::<f64>()
                .context("DEFAULT_EXCHANGE_RATE must be a number")?,
            Err(_) => defaults.default_exchange_rate,
        };

        let admin_password_hash = env::var("ADMIN_PASSWORD_HASH").unwrap_or_else(|_| {
            password_digest(&env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()))
        });

        let config = Config {
            store_endpoint: env::var("FLEET_DB_URL").unwrap_or(defaults.store_endpoint),
            secret_key: env::var("SECRET_KEY").unwrap_or(defaults.secret_key),
            default_exchange_rate,
            admin_username: env::var("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_password_hash,
            upload_dir: env::var("UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
        };

        fs::create_dir_all(&config.upload_dir).with_context(|| {
            format!("failed to create upload directory {}", config.upload_dir.display())
        })?;

        Ok(config)
    }

    /// Whether a filename carries an accepted upload extension.
    pub fn allows_upload(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| {
                let ext = ext.to_ascii_lowercase();
                ALLOWED_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

/// Hex SHA-256 digest of a raw credential.
pub fn password_digest(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.store_endpoint, DEFAULT_DB_FILE);
        assert!((config.default_exchange_rate - 1.35).abs() < f64::EPSILON);
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.admin_password_hash, password_digest("admin123"));
    }

    #[test]
    fn password_digest_is_stable_hex_sha256() {
        let digest = password_digest("admin123");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, password_digest("admin123"));
        assert_ne!(digest, password_digest("admin124"));
    }

    #[test]
    fn upload_extension_check() {
        let config = Config::default();
        assert!(config.allows_upload("receipt.pdf"));
        assert!(config.allows_upload("photo.JPEG"));
        assert!(!config.allows_upload("script.exe"));
        assert!(!config.allows_upload("no_extension"));
    }
}
