//! serde adapters for the byte fields of the persisted wallet.

use hdledger_consensus::{hash256_from_hex, hash256_to_hex, Hash256};
use serde::{Deserialize, Deserializer, Serializer};

/// Transaction and block hashes in display (reversed) order.
pub mod hash {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(value: &Hash256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hash256_to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_hash(&raw).map_err(D::Error::custom)
    }
}

pub mod opt_hash {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(
        value: &Option<Hash256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(hash) => serializer.serialize_some(&hash256_to_hex(hash)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Hash256>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|raw| parse_hash(&raw).map_err(D::Error::custom))
            .transpose()
    }
}

/// Scripts and other raw byte strings, plain hex.
pub mod bytes {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(D::Error::custom)
    }
}

pub mod opt_bytes {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|raw| hex::decode(raw).map_err(D::Error::custom))
            .transpose()
    }
}

pub mod array32 {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let raw = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(raw, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}

fn parse_hash(raw: &str) -> Result<Hash256, String> {
    if raw.len() != 64 {
        return Err(format!("expected 64 hex characters, got {}", raw.len()));
    }
    hash256_from_hex(raw).map_err(|err| err.to_string())
}
