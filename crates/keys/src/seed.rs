//! Password-encrypted master key storage.
//!
//! The wallet keeps only the 32-byte master secret encrypted at rest; the
//! chain code lives next to it in the clear. Keys are stretched with argon2id
//! and sealed with ChaCha20-Poly1305, the network bound in as associated data
//! so a seed cannot be replayed into a wallet for another chain.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm as Argon2Algorithm, Argon2, Params as Argon2Params, Version as Argon2Version};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit};
use hdledger_consensus::Network;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::KeyError;

const SEED_ENCODING_VERSION: u8 = 1;
const SALT_BYTES: usize = 16;
const NONCE_BYTES: usize = 12;
const TAG_BYTES: usize = 16;
const HEADER_LEN: usize = 1 + 4 * 3 + SALT_BYTES + NONCE_BYTES;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KdfParams {
    pub mem_kib: u32,
    pub iters: u32,
    pub parallelism: u32,
}

impl KdfParams {
    pub const INTERACTIVE: KdfParams = KdfParams {
        mem_kib: 64 * 1024,
        iters: 3,
        parallelism: 1,
    };

    /// Cheapest parameters argon2 accepts. Only for tests and throwaway wallets.
    pub const MINIMAL: KdfParams = KdfParams {
        mem_kib: 8,
        iters: 1,
        parallelism: 1,
    };
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::INTERACTIVE
    }
}

/// Decrypted master secret. Wiped on drop.
pub struct PrivateKeyMaterial([u8; 32]);

impl PrivateKeyMaterial {
    pub fn new(secret: [u8; 32]) -> Self {
        Self(secret)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for PrivateKeyMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyMaterial(..)")
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncryptedSeed {
    kdf: KdfParams,
    salt: [u8; SALT_BYTES],
    nonce: [u8; NONCE_BYTES],
    ciphertext: Vec<u8>,
}

impl EncryptedSeed {
    pub fn encrypt(
        secret: &[u8; 32],
        password: &str,
        network: Network,
        kdf: KdfParams,
    ) -> Result<Self, KeyError> {
        let mut salt = [0u8; SALT_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let mut key = derive_seed_key(password, &kdf, &salt)?;
        let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key));
        key.zeroize();
        let aad = seed_aad(network);
        let ciphertext = cipher
            .encrypt(
                chacha20poly1305::Nonce::from_slice(&nonce),
                Payload {
                    msg: secret,
                    aad: &aad,
                },
            )
            .map_err(|_| KeyError::Crypto("seed encryption failed"))?;

        Ok(Self {
            kdf,
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Fails with [`KeyError::IncorrectPassword`] on a wrong password, a
    /// tampered blob, or a seed sealed for another network.
    pub fn decrypt(&self, password: &str, network: Network) -> Result<PrivateKeyMaterial, KeyError> {
        let mut key = derive_seed_key(password, &self.kdf, &self.salt)?;
        let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key));
        key.zeroize();
        let aad = seed_aad(network);
        let mut plaintext = cipher
            .decrypt(
                chacha20poly1305::Nonce::from_slice(&self.nonce),
                Payload {
                    msg: &self.ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| KeyError::IncorrectPassword)?;
        if plaintext.len() != 32 {
            plaintext.zeroize();
            return Err(KeyError::InvalidEncoding("encrypted seed has wrong length"));
        }
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&plaintext);
        plaintext.zeroize();
        Ok(PrivateKeyMaterial(secret))
    }

    pub fn encode(&self) -> String {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.push(SEED_ENCODING_VERSION);
        out.extend_from_slice(&self.kdf.mem_kib.to_le_bytes());
        out.extend_from_slice(&self.kdf.iters.to_le_bytes());
        out.extend_from_slice(&self.kdf.parallelism.to_le_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        BASE64.encode(out)
    }

    pub fn decode(encoded: &str) -> Result<Self, KeyError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| KeyError::InvalidEncoding("encrypted seed is not base64"))?;
        if bytes.len() < HEADER_LEN + TAG_BYTES {
            return Err(KeyError::InvalidEncoding("encrypted seed is truncated"));
        }
        if bytes[0] != SEED_ENCODING_VERSION {
            return Err(KeyError::InvalidEncoding("unsupported encrypted seed version"));
        }
        let read_u32 = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        let kdf = KdfParams {
            mem_kib: read_u32(1),
            iters: read_u32(5),
            parallelism: read_u32(9),
        };
        let mut salt = [0u8; SALT_BYTES];
        salt.copy_from_slice(&bytes[13..13 + SALT_BYTES]);
        let mut nonce = [0u8; NONCE_BYTES];
        nonce.copy_from_slice(&bytes[13 + SALT_BYTES..HEADER_LEN]);
        Ok(Self {
            kdf,
            salt,
            nonce,
            ciphertext: bytes[HEADER_LEN..].to_vec(),
        })
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }
}

impl fmt::Display for EncryptedSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for EncryptedSeed {
    type Err = KeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::decode(raw)
    }
}

impl Serialize for EncryptedSeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for EncryptedSeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}

/// Fresh 64-byte BIP32 seed from the OS RNG.
pub fn generate_seed() -> [u8; 64] {
    let mut seed = [0u8; 64];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    seed
}

fn seed_aad(network: Network) -> Vec<u8> {
    const PREFIX: &[u8] = b"hdledger-wallet-seed-v1:";
    let mut out = Vec::with_capacity(PREFIX.len() + 8);
    out.extend_from_slice(PREFIX);
    out.extend_from_slice(network.as_str().as_bytes());
    out
}

fn derive_seed_key(
    password: &str,
    kdf: &KdfParams,
    salt: &[u8; SALT_BYTES],
) -> Result<[u8; 32], KeyError> {
    let params = Argon2Params::new(kdf.mem_kib, kdf.iters, kdf.parallelism, Some(32))
        .map_err(|_| KeyError::Crypto("invalid seed kdf parameters"))?;
    let argon2 = Argon2::new(Argon2Algorithm::Argon2id, Argon2Version::V0x13, params);
    let mut out = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|_| KeyError::Crypto("seed key derivation failed"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypted_seed_roundtrips() {
        let secret = [0x5au8; 32];
        let sealed =
            EncryptedSeed::encrypt(&secret, "hunter2", Network::Regtest, KdfParams::MINIMAL)
                .expect("encrypt");
        let opened = sealed.decrypt("hunter2", Network::Regtest).expect("decrypt");
        assert_eq!(opened.as_bytes(), &secret);
    }

    #[test]
    fn wrong_password_or_network_is_rejected() {
        let sealed =
            EncryptedSeed::encrypt(&[7u8; 32], "right", Network::Testnet, KdfParams::MINIMAL)
                .expect("encrypt");
        assert_eq!(
            sealed.decrypt("wrong", Network::Testnet).unwrap_err(),
            KeyError::IncorrectPassword
        );
        assert_eq!(
            sealed.decrypt("right", Network::Mainnet).unwrap_err(),
            KeyError::IncorrectPassword
        );
    }

    #[test]
    fn encoding_roundtrips() {
        let sealed =
            EncryptedSeed::encrypt(&[1u8; 32], "pw", Network::Mainnet, KdfParams::MINIMAL)
                .expect("encrypt");
        let decoded: EncryptedSeed = sealed.to_string().parse().expect("decode");
        assert_eq!(decoded, sealed);
        assert_eq!(decoded.kdf(), KdfParams::MINIMAL);
        assert!(EncryptedSeed::decode("AAAA").is_err());
        assert!(EncryptedSeed::decode("not base64!").is_err());
    }
}
