//! Hashing, base58/bech32 address encoding and outpoints.

pub mod address;
pub mod hash;
pub mod outpoint;

pub use address::{
    base58check_decode, base58check_encode, p2pkh_address, segwit_v0_address, AddressError,
};
pub use hash::{hash160, hmac_sha512, sha256, sha256d};
pub use outpoint::OutPoint;
