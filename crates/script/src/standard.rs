//! Single-key output scripts: building them and recognizing them.

use hdledger_primitives::hash160;

/// Output forms a wallet key can be paid through.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptType {
    P2Pk,
    P2Pkh,
    P2Wpkh,
    /// Anything else, including empty scripts.
    Other,
}

const OP_0: u8 = 0x00;
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const PUSH_20: u8 = 0x14;

/// HASH160 of a serialized public key, the payload of P2PKH and P2WPKH outputs.
pub fn pubkey_hash(pubkey: &[u8]) -> [u8; 20] {
    hash160(pubkey)
}

pub fn p2pkh_script(key_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
    script.extend_from_slice(key_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// Bare pay-to-pubkey: `<pubkey> OP_CHECKSIG`.
pub fn p2pk_script(pubkey: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(pubkey.len() + 2);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(pubkey);
    script.push(OP_CHECKSIG);
    script
}

pub fn p2wpkh_script(key_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.extend_from_slice(&[OP_0, PUSH_20]);
    script.extend_from_slice(key_hash);
    script
}

pub fn classify_script_pubkey(script: &[u8]) -> ScriptType {
    match script {
        [OP_DUP, OP_HASH160, PUSH_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
            if hash.len() == 20 =>
        {
            ScriptType::P2Pkh
        }
        [OP_0, PUSH_20, program @ ..] if program.len() == 20 => ScriptType::P2Wpkh,
        [len @ (33 | 65), key @ .., OP_CHECKSIG] if key.len() == *len as usize => ScriptType::P2Pk,
        _ => ScriptType::Other,
    }
}

/// The 20-byte key hash a P2PKH or P2WPKH script pays.
pub fn key_hash_of(script: &[u8]) -> Option<&[u8]> {
    match classify_script_pubkey(script) {
        ScriptType::P2Pkh => Some(&script[3..23]),
        ScriptType::P2Wpkh => Some(&script[2..]),
        ScriptType::P2Pk | ScriptType::Other => None,
    }
}
