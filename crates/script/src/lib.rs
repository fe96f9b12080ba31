//! Standard output script construction and classification.

pub mod standard;

pub use standard::{
    classify_script_pubkey, key_hash_of, p2pk_script, p2pkh_script, p2wpkh_script, pubkey_hash,
    ScriptType,
};
