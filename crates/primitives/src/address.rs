//! Base58Check and bech32 address encoding.

use bech32::Hrp;
use hdledger_consensus::{chain_params, Network};

use crate::hash::sha256d;

#[derive(Debug, Eq, PartialEq)]
pub enum AddressError {
    InvalidLength,
    InvalidCharacter,
    InvalidChecksum,
    InvalidHrp,
    InvalidWitnessProgram,
}

impl std::fmt::Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressError::InvalidLength => write!(f, "invalid address length"),
            AddressError::InvalidCharacter => write!(f, "invalid base58 character"),
            AddressError::InvalidChecksum => write!(f, "invalid address checksum"),
            AddressError::InvalidHrp => write!(f, "invalid bech32 human-readable part"),
            AddressError::InvalidWitnessProgram => write!(f, "invalid witness program"),
        }
    }
}

impl std::error::Error for AddressError {}

/// Legacy pay-to-pubkey-hash address for a 20-byte key hash.
pub fn p2pkh_address(key_hash: &[u8; 20], network: Network) -> String {
    prefixed_address(chain_params(network).pubkey_address_prefix, key_hash)
}

/// Version 0 segwit address for a 20- or 32-byte witness program.
pub fn segwit_v0_address(program: &[u8], network: Network) -> Result<String, AddressError> {
    if program.len() != 20 && program.len() != 32 {
        return Err(AddressError::InvalidWitnessProgram);
    }
    let hrp = Hrp::parse(chain_params(network).bech32_hrp)
        .map_err(|_| AddressError::InvalidHrp)?;
    bech32::segwit::encode_v0(hrp, program).map_err(|_| AddressError::InvalidWitnessProgram)
}

fn prefixed_address(prefix: &[u8], hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(prefix.len() + hash.len());
    payload.extend_from_slice(prefix);
    payload.extend_from_slice(hash);
    base58check_encode(&payload)
}

pub fn base58check_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    let bytes = base58_decode(input)?;
    if bytes.len() < 4 {
        return Err(AddressError::InvalidLength);
    }
    let (payload, checksum) = bytes.split_at(bytes.len() - 4);
    let digest = sha256d(payload);
    if checksum != &digest[..4] {
        return Err(AddressError::InvalidChecksum);
    }
    Ok(payload.to_vec())
}

pub fn base58check_encode(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    let checksum = sha256d(payload);
    data.extend_from_slice(&checksum[..4]);
    base58_encode(&data)
}

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn base58_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    if input.is_empty() {
        return Err(AddressError::InvalidLength);
    }
    let mut bytes = Vec::new();
    for ch in input.bytes() {
        let value = base58_value(ch).ok_or(AddressError::InvalidCharacter)? as u32;
        let mut carry = value;
        for byte in bytes.iter_mut().rev() {
            let val = (*byte as u32) * 58 + carry;
            *byte = (val & 0xff) as u8;
            carry = val >> 8;
        }
        while carry > 0 {
            bytes.insert(0, (carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let leading_zeros = input.bytes().take_while(|b| *b == b'1').count();
    let mut out = vec![0u8; leading_zeros];
    out.extend_from_slice(&bytes);
    Ok(out)
}

fn base58_encode(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    let mut digits = vec![0u8];
    for byte in data {
        let mut carry = *byte as u32;
        for digit in digits.iter_mut().rev() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 58) as u8;
            carry = value / 58;
        }
        while carry > 0 {
            digits.insert(0, (carry % 58) as u8);
            carry /= 58;
        }
    }
    let leading_zeros = data.iter().take_while(|b| **b == 0u8).count();
    let mut out = String::with_capacity(leading_zeros + digits.len());
    for _ in 0..leading_zeros {
        out.push('1');
    }
    // `digits` starts as [0]; skip the leading zero digit it leaves behind.
    let significant = digits.iter().skip_while(|d| **d == 0);
    for digit in significant {
        out.push(BASE58_ALPHABET[*digit as usize] as char);
    }
    out
}

fn base58_value(byte: u8) -> Option<u8> {
    BASE58_ALPHABET
        .iter()
        .position(|value| *value == byte)
        .map(|pos| pos as u8)
}
