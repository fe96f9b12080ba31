//! `wallet.conf`: `key=value` lines, `#`/`;` comments, bare keys mean `1`.
//! The last occurrence of a key wins.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use hdledger_consensus::Network;
use hdledger_log::{Format, Level, LogConfig};

pub const DEFAULT_WALLET_FILE: &str = "wallet.json";
pub const DEFAULT_MIN_CONFIRMATIONS: i32 = 1;
pub const DEFAULT_ADDRESS_BUFFER: u32 = 20;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, err: std::io::Error },
    InvalidValue {
        path: PathBuf,
        key: &'static str,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, err } => write!(f, "failed to read {}: {err}", path.display()),
            ConfigError::InvalidValue { path, key, value } => {
                write!(f, "invalid {key} '{value}' in {}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalletConfig {
    pub network: Network,
    pub wallet_file: PathBuf,
    pub min_confirmations: i32,
    pub address_buffer: u32,
    pub log_level: Level,
    pub log_format: Format,
    pub log_timestamps: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        let log = LogConfig::default();
        Self {
            network: Network::Mainnet,
            wallet_file: PathBuf::from(DEFAULT_WALLET_FILE),
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            address_buffer: DEFAULT_ADDRESS_BUFFER,
            log_level: log.level,
            log_format: log.format,
            log_timestamps: log.timestamps,
        }
    }
}

impl WalletConfig {
    /// Defaults when `path` does not exist. A relative `walletfile` is
    /// resolved against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let Some(entries) = load_conf(path)? else {
            return Ok(config);
        };
        let invalid = |key: &'static str, value: &str| ConfigError::InvalidValue {
            path: path.to_path_buf(),
            key,
            value: value.to_string(),
        };

        if let Some(value) = last(&entries, "network") {
            config.network = Network::parse(value).ok_or_else(|| invalid("network", value))?;
        }
        if let Some(value) = last(&entries, "walletfile") {
            if value.is_empty() {
                return Err(invalid("walletfile", value));
            }
            let file = PathBuf::from(value);
            config.wallet_file = match path.parent() {
                Some(dir) if file.is_relative() => dir.join(file),
                _ => file,
            };
        }
        if let Some(value) = last(&entries, "minconf") {
            config.min_confirmations = value
                .parse::<i32>()
                .ok()
                .filter(|minconf| *minconf >= 0)
                .ok_or_else(|| invalid("minconf", value))?;
        }
        if let Some(value) = last(&entries, "addressbuffer") {
            config.address_buffer = value
                .parse::<u32>()
                .map_err(|_| invalid("addressbuffer", value))?;
        }
        if let Some(value) = last(&entries, "loglevel") {
            config.log_level = Level::parse(value).ok_or_else(|| invalid("loglevel", value))?;
        }
        if let Some(value) = last(&entries, "logformat") {
            config.log_format = Format::parse(value).ok_or_else(|| invalid("logformat", value))?;
        }
        if let Some(value) = last(&entries, "logtimestamps") {
            config.log_timestamps =
                parse_conf_bool(value).ok_or_else(|| invalid("logtimestamps", value))?;
        }
        Ok(config)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            format: self.log_format,
            timestamps: self.log_timestamps,
        }
    }
}

fn last<'a>(entries: &'a HashMap<String, Vec<String>>, key: &str) -> Option<&'a str> {
    entries
        .get(key)
        .and_then(|values| values.last())
        .map(String::as_str)
}

fn load_conf(path: &Path) -> Result<Option<HashMap<String, Vec<String>>>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                err,
            })
        }
    };

    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for raw_line in contents.lines() {
        let mut line = raw_line.trim();
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(idx) = line.find(['#', ';']) {
            line = &line[..idx];
        }
        line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line, "1"),
        };
        if key.is_empty() {
            continue;
        }
        out.entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }
    Ok(Some(out))
}

fn parse_conf_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Some(true);
    }
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_conf(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("wallet.conf");
        fs::write(&path, contents).expect("write conf");
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = WalletConfig::load(&dir.path().join("absent.conf")).expect("load");
        assert_eq!(config, WalletConfig::default());
        assert_eq!(config.address_buffer, 20);
    }

    #[test]
    fn parses_keys_comments_and_last_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_conf(
            &dir,
            "# wallet settings\n\
             network=test\n\
             NETWORK = regtest ; override\n\
             walletfile=hot.json\n\
             minconf=3\n\
             addressbuffer=50\n\
             loglevel=debug\n\
             logformat=json\n\
             logtimestamps=no\n",
        );
        let config = WalletConfig::load(&path).expect("load");
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.wallet_file, dir.path().join("hot.json"));
        assert_eq!(config.min_confirmations, 3);
        assert_eq!(config.address_buffer, 50);
        assert_eq!(
            config.log_config(),
            LogConfig {
                level: Level::Debug,
                format: Format::Json,
                timestamps: false,
            }
        );
    }

    #[test]
    fn bare_key_is_true() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_conf(&dir, "logtimestamps\n");
        assert!(WalletConfig::load(&path).expect("load").log_timestamps);
    }

    #[test]
    fn invalid_value_names_key_and_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_conf(&dir, "minconf=-1\n");
        let err = WalletConfig::load(&path).unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::InvalidValue { key: "minconf", value, .. } if value == "-1"
        ));
        let message = err.to_string();
        assert!(message.contains("minconf"));
        assert!(message.contains("wallet.conf"));

        let path = write_conf(&dir, "network=signet\n");
        assert!(matches!(
            WalletConfig::load(&path),
            Err(ConfigError::InvalidValue { key: "network", .. })
        ));
    }
}
