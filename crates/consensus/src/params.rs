//! Per-network chain parameters used for key and address encoding.

use crate::constants::COINBASE_MATURITY;
use crate::Hash256;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: Network,
    /// SLIP-44 coin type placed at the second level of every BIP44 path.
    pub bip44_coin_type: u32,
    pub coinbase_maturity: i32,
    pub pubkey_address_prefix: &'static [u8],
    pub script_address_prefix: &'static [u8],
    pub secret_key_prefix: u8,
    pub bech32_hrp: &'static str,
    pub ext_public_key_version: [u8; 4],
    pub ext_secret_key_version: [u8; 4],
}

pub fn chain_params(network: Network) -> ChainParams {
    match network {
        Network::Mainnet => ChainParams {
            network,
            bip44_coin_type: 0,
            coinbase_maturity: COINBASE_MATURITY,
            pubkey_address_prefix: &[0x00],
            script_address_prefix: &[0x05],
            secret_key_prefix: 0x80,
            bech32_hrp: "bc",
            ext_public_key_version: [0x04, 0x88, 0xB2, 0x1E],
            ext_secret_key_version: [0x04, 0x88, 0xAD, 0xE4],
        },
        Network::Testnet => ChainParams {
            network,
            bip44_coin_type: 1,
            coinbase_maturity: COINBASE_MATURITY,
            pubkey_address_prefix: &[0x6F],
            script_address_prefix: &[0xC4],
            secret_key_prefix: 0xEF,
            bech32_hrp: "tb",
            ext_public_key_version: [0x04, 0x35, 0x87, 0xCF],
            ext_secret_key_version: [0x04, 0x35, 0x83, 0x94],
        },
        Network::Regtest => ChainParams {
            network,
            bip44_coin_type: 1,
            coinbase_maturity: COINBASE_MATURITY,
            pubkey_address_prefix: &[0x6F],
            script_address_prefix: &[0xC4],
            secret_key_prefix: 0xEF,
            bech32_hrp: "bcrt",
            ext_public_key_version: [0x04, 0x35, 0x87, 0xCF],
            ext_secret_key_version: [0x04, 0x35, 0x83, 0x94],
        },
    }
}

#[derive(Debug)]
pub enum HexError {
    InvalidLength,
    InvalidHex,
}

impl std::fmt::Display for HexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HexError::InvalidLength => write!(f, "invalid hash length"),
            HexError::InvalidHex => write!(f, "invalid hex"),
        }
    }
}

impl std::error::Error for HexError {}

/// Parses a display-order (big-endian) hex hash into internal byte order.
///
/// Short inputs are left-padded with zeros, matching how block and
/// transaction ids are usually abbreviated.
pub fn hash256_from_hex(input: &str) -> Result<Hash256, HexError> {
    let mut hex = input.trim();
    if let Some(stripped) = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")) {
        hex = stripped;
    }
    if hex.is_empty() || hex.len() > 64 {
        return Err(HexError::InvalidLength);
    }

    let padded = format!("{hex:0>64}");
    let decoded = hex::decode(padded).map_err(|_| HexError::InvalidHex)?;
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&decoded);
    bytes.reverse();
    Ok(bytes)
}

/// Renders a hash in display order, the inverse of [`hash256_from_hex`].
pub fn hash256_to_hex(hash: &Hash256) -> String {
    let mut bytes = *hash;
    bytes.reverse();
    hex::encode(bytes)
}
