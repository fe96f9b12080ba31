//! BIP44 derivation paths (`m/44'/coin'/account'/change/index`).

use std::fmt;
use std::str::FromStr;

use hdledger_consensus::constants::{BIP44_PURPOSE, HARDENED_KEY_START};

use crate::KeyError;

const CHANGE_DEPTH: usize = 3;
const ADDRESS_DEPTH: usize = 5;

/// Parsed derivation path; child numbers carry the hardened bit.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HdPath(Vec<u32>);

impl HdPath {
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let invalid = || KeyError::InvalidPath(raw.to_string());
        let mut parts = raw.trim().split('/');
        if parts.next() != Some("m") {
            return Err(invalid());
        }
        let mut children = Vec::new();
        for part in parts {
            let (digits, hardened) = match part
                .strip_suffix('\'')
                .or_else(|| part.strip_suffix('h'))
                .or_else(|| part.strip_suffix('H'))
            {
                Some(stripped) => (stripped, true),
                None => (part, false),
            };
            let index: u32 = digits.parse().map_err(|_| invalid())?;
            if index >= HARDENED_KEY_START {
                return Err(invalid());
            }
            children.push(if hardened {
                index | HARDENED_KEY_START
            } else {
                index
            });
        }
        Ok(Self(children))
    }

    pub fn children(&self) -> &[u32] {
        &self.0
    }

    pub fn child(mut self, index: u32) -> Self {
        self.0.push(index);
        self
    }
}

impl FromStr for HdPath {
    type Err = KeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for HdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for child in &self.0 {
            if child & HARDENED_KEY_START != 0 {
                write!(f, "/{}'", child & !HARDENED_KEY_START)?;
            } else {
                write!(f, "/{child}")?;
            }
        }
        Ok(())
    }
}

pub fn account_path(coin_type: u32, account_index: u32) -> String {
    format!("m/{BIP44_PURPOSE}'/{coin_type}'/{account_index}'")
}

pub fn address_path(coin_type: u32, account_index: u32, is_change: bool, address_index: u32) -> String {
    format!(
        "{}/{}/{address_index}",
        account_path(coin_type, account_index),
        u32::from(is_change)
    )
}

/// Coin type from the second level of a BIP44 path.
pub fn coin_type_of(path: &str) -> Result<u32, KeyError> {
    let parsed = HdPath::parse(path)?;
    match parsed.children() {
        [purpose, coin, ..] if *purpose == (BIP44_PURPOSE | HARDENED_KEY_START) => {
            Ok(coin & !HARDENED_KEY_START)
        }
        _ => Err(KeyError::InvalidPath(path.to_string())),
    }
}

/// Whether a full address path sits on the internal (change) branch.
pub fn is_change_path(path: &str) -> Result<bool, KeyError> {
    let parsed = HdPath::parse(path)?;
    if parsed.children().len() != ADDRESS_DEPTH {
        return Err(KeyError::InvalidPath(path.to_string()));
    }
    match parsed.children()[CHANGE_DEPTH] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(KeyError::InvalidPath(path.to_string())),
    }
}
