//! Wallet persistence as a versioned JSON document.

use std::fmt;
use std::fs;
use std::path::Path;

use hdledger_consensus::Network;
use hdledger_log::log_info;
use serde::{Deserialize, Serialize};

use crate::config::WalletConfig;
use crate::wallet::Wallet;

pub const WALLET_FILE_VERSION: u32 = 1;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
    UnsupportedVersion(u32),
    NetworkMismatch { expected: Network, found: Network },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "{err}"),
            StoreError::Json(err) => write!(f, "invalid wallet file: {err}"),
            StoreError::UnsupportedVersion(version) => write!(
                f,
                "unsupported wallet file version {version} (expected {WALLET_FILE_VERSION})"
            ),
            StoreError::NetworkMismatch { expected, found } => write!(
                f,
                "wallet network mismatch (expected {}, found {})",
                expected.as_str(),
                found.as_str()
            ),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json(err)
    }
}

#[derive(Serialize)]
struct WalletFileRef<'a> {
    version: u32,
    wallet: &'a Wallet,
}

#[derive(Deserialize)]
struct WalletFile {
    wallet: Wallet,
}

/// `Ok(None)` when there is no file at `path`.
pub fn load_wallet(path: &Path, network: Network) -> Result<Option<Wallet>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let version = value
        .get("version")
        .and_then(|value| value.as_u64())
        .unwrap_or(0) as u32;
    if version != WALLET_FILE_VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }
    let file: WalletFile = serde_json::from_value(value)?;
    if file.wallet.network() != network {
        return Err(StoreError::NetworkMismatch {
            expected: network,
            found: file.wallet.network(),
        });
    }
    Ok(Some(file.wallet))
}

pub fn save_wallet(path: &Path, wallet: &Wallet) -> Result<(), StoreError> {
    let file = WalletFileRef {
        version: WALLET_FILE_VERSION,
        wallet,
    };
    let json = serde_json::to_vec_pretty(&file)?;
    write_file_atomic(path, &json)?;
    log_info!("saved wallet '{}' to {}", wallet.name(), path.display());
    Ok(())
}

/// Loads the wallet named by a config file's `walletfile` and `network`.
pub fn open_wallet(config: &WalletConfig) -> Result<Option<Wallet>, StoreError> {
    load_wallet(&config.wallet_file, config.network)
}

fn write_file_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    if fs::rename(&tmp, path).is_err() {
        let _ = fs::remove_file(path);
        fs::rename(&tmp, path)?;
    }
    Ok(())
}
