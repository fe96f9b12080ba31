//! BIP32/BIP44 key derivation and encrypted seed handling for the wallet ledger.

pub mod bip32;
pub mod extended;
pub mod path;
pub mod seed;

use std::fmt;

use hdledger_consensus::Network;
use secp256k1::PublicKey;

pub use bip32::Bip32;
pub use extended::{ExtendedPrivateKey, ExtendedPublicKey};
pub use path::{account_path, address_path, coin_type_of, is_change_path, HdPath};
pub use seed::{generate_seed, EncryptedSeed, KdfParams, PrivateKeyMaterial};

#[derive(Debug, Eq, PartialEq)]
pub enum KeyError {
    InvalidPath(String),
    InvalidSeedLength(usize),
    InvalidKey,
    HardenedFromPublic,
    InvalidEncoding(&'static str),
    NetworkMismatch,
    IncorrectPassword,
    Crypto(&'static str),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::InvalidPath(path) => write!(f, "invalid derivation path '{path}'"),
            KeyError::InvalidSeedLength(len) => {
                write!(f, "seed must be 16 to 64 bytes (got {len})")
            }
            KeyError::InvalidKey => write!(f, "derived key is invalid"),
            KeyError::HardenedFromPublic => {
                write!(f, "cannot derive a hardened child from a public key")
            }
            KeyError::InvalidEncoding(msg) => write!(f, "{msg}"),
            KeyError::NetworkMismatch => write!(f, "extended key belongs to another network"),
            KeyError::IncorrectPassword => write!(f, "incorrect wallet password"),
            KeyError::Crypto(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for KeyError {}

/// Key operations the ledger delegates to.
///
/// Extended keys cross this boundary in their base58check string form so the
/// ledger can store and compare them without touching key material.
pub trait KeyDerivation {
    fn decrypt_seed(
        &self,
        encrypted_seed: &EncryptedSeed,
        password: &str,
        network: Network,
    ) -> Result<PrivateKeyMaterial, KeyError>;

    fn derive_extended_public_key(
        &self,
        key: &PrivateKeyMaterial,
        chain_code: &[u8; 32],
        path: &str,
        network: Network,
    ) -> Result<String, KeyError>;

    fn derive_extended_private_key(
        &self,
        key: &PrivateKeyMaterial,
        chain_code: &[u8; 32],
        path: &str,
        network: Network,
    ) -> Result<String, KeyError>;

    /// Public key at `<xpub>/<0|1>/<address_index>`.
    fn derive_public_key(
        &self,
        extended_public_key: &str,
        address_index: u32,
        is_change: bool,
        network: Network,
    ) -> Result<PublicKey, KeyError>;
}
