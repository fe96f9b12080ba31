//! BIP32 extended keys over secp256k1.

use std::sync::OnceLock;

use hdledger_consensus::constants::HARDENED_KEY_START;
use hdledger_consensus::{chain_params, Network};
use hdledger_primitives::{base58check_decode, base58check_encode, hash160, hmac_sha512};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use zeroize::Zeroize;

use crate::path::HdPath;
use crate::KeyError;

const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";
const SERIALIZED_LEN: usize = 78;

pub struct ExtendedPrivateKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: [u8; 32],
    secret: SecretKey,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtendedPublicKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: [u8; 32],
    public_key: PublicKey,
}

impl ExtendedPrivateKey {
    pub fn new_master(seed: &[u8]) -> Result<Self, KeyError> {
        if !(16..=64).contains(&seed.len()) {
            return Err(KeyError::InvalidSeedLength(seed.len()));
        }
        let mut digest = hmac_sha512(MASTER_HMAC_KEY, seed);
        let key = Self::from_digest(&digest, 0, [0u8; 4], 0);
        digest.zeroize();
        key
    }

    /// Depth-zero key from a stored secret and chain code.
    pub fn from_parts(secret: &[u8; 32], chain_code: &[u8; 32]) -> Result<Self, KeyError> {
        let secret = SecretKey::from_slice(secret).map_err(|_| KeyError::InvalidKey)?;
        Ok(Self {
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: 0,
            chain_code: *chain_code,
            secret,
        })
    }

    pub fn derive_child(&self, index: u32) -> Result<Self, KeyError> {
        let mut data = Vec::with_capacity(37);
        if index >= HARDENED_KEY_START {
            data.push(0);
            data.extend_from_slice(&self.secret.secret_bytes());
        } else {
            data.extend_from_slice(&self.public_key().serialize());
        }
        data.extend_from_slice(&index.to_be_bytes());
        let mut digest = hmac_sha512(&self.chain_code, &data);
        data.zeroize();

        let tweak = scalar_from(&digest)?;
        let secret = self
            .secret
            .add_tweak(&tweak)
            .map_err(|_| KeyError::InvalidKey)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        digest.zeroize();

        Ok(Self {
            depth: self.depth.checked_add(1).ok_or(KeyError::InvalidKey)?,
            parent_fingerprint: self.fingerprint(),
            child_number: index,
            chain_code,
            secret,
        })
    }

    pub fn derive_path(&self, path: &HdPath) -> Result<Self, KeyError> {
        self.derive_child_chain(path.children())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(secp(), &self.secret)
    }

    pub fn to_extended_public(&self) -> ExtendedPublicKey {
        ExtendedPublicKey {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            public_key: self.public_key(),
        }
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn encode(&self, network: Network) -> String {
        let mut key = [0u8; 33];
        key[1..].copy_from_slice(&self.secret.secret_bytes());
        let mut payload = serialize(
            chain_params(network).ext_secret_key_version,
            self.depth,
            self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
            &key,
        );
        key.zeroize();
        let encoded = base58check_encode(&payload);
        payload.zeroize();
        encoded
    }

    pub fn decode(encoded: &str, network: Network) -> Result<Self, KeyError> {
        let mut payload = base58check_decode(encoded)
            .map_err(|_| KeyError::InvalidEncoding("invalid extended private key"))?;
        let parsed = parse(&payload, chain_params(network).ext_secret_key_version);
        let result = parsed.and_then(|raw| {
            if raw.key[0] != 0 {
                return Err(KeyError::InvalidEncoding("invalid extended private key"));
            }
            let secret = SecretKey::from_slice(&raw.key[1..]).map_err(|_| KeyError::InvalidKey)?;
            Ok(Self {
                depth: raw.depth,
                parent_fingerprint: raw.parent_fingerprint,
                child_number: raw.child_number,
                chain_code: raw.chain_code,
                secret,
            })
        });
        payload.zeroize();
        result
    }

    fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.public_key())
    }

    fn from_digest(
        digest: &[u8; 64],
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_number: u32,
    ) -> Result<Self, KeyError> {
        let secret = SecretKey::from_slice(&digest[..32]).map_err(|_| KeyError::InvalidKey)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        Ok(Self {
            depth,
            parent_fingerprint,
            child_number,
            chain_code,
            secret,
        })
    }

    fn derive_child_chain(&self, children: &[u32]) -> Result<Self, KeyError> {
        let Some((first, rest)) = children.split_first() else {
            return Ok(self.clone_key());
        };
        let mut current = self.derive_child(*first)?;
        for index in rest {
            current = current.derive_child(*index)?;
        }
        Ok(current)
    }

    fn clone_key(&self) -> Self {
        Self {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            secret: self.secret,
        }
    }
}

impl Drop for ExtendedPrivateKey {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
        self.chain_code.zeroize();
    }
}

impl std::fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .finish_non_exhaustive()
    }
}

impl ExtendedPublicKey {
    /// Non-hardened child derivation (CKDpub).
    pub fn derive_child(&self, index: u32) -> Result<Self, KeyError> {
        if index >= HARDENED_KEY_START {
            return Err(KeyError::HardenedFromPublic);
        }
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&self.public_key.serialize());
        data.extend_from_slice(&index.to_be_bytes());
        let digest = hmac_sha512(&self.chain_code, &data);

        let tweak = scalar_from(&digest)?;
        let public_key = self
            .public_key
            .add_exp_tweak(secp(), &tweak)
            .map_err(|_| KeyError::InvalidKey)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);

        Ok(Self {
            depth: self.depth.checked_add(1).ok_or(KeyError::InvalidKey)?,
            parent_fingerprint: fingerprint_of(&self.public_key),
            child_number: index,
            chain_code,
            public_key,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn encode(&self, network: Network) -> String {
        let payload = serialize(
            chain_params(network).ext_public_key_version,
            self.depth,
            self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
            &self.public_key.serialize(),
        );
        base58check_encode(&payload)
    }

    pub fn decode(encoded: &str, network: Network) -> Result<Self, KeyError> {
        let payload = base58check_decode(encoded)
            .map_err(|_| KeyError::InvalidEncoding("invalid extended public key"))?;
        let raw = parse(&payload, chain_params(network).ext_public_key_version)?;
        let public_key = PublicKey::from_slice(&raw.key).map_err(|_| KeyError::InvalidKey)?;
        Ok(Self {
            depth: raw.depth,
            parent_fingerprint: raw.parent_fingerprint,
            child_number: raw.child_number,
            chain_code: raw.chain_code,
            public_key,
        })
    }
}

struct RawExtendedKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: [u8; 32],
    key: [u8; 33],
}

impl Drop for RawExtendedKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn serialize(
    version: [u8; 4],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: &[u8; 32],
    key: &[u8; 33],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(SERIALIZED_LEN);
    out.extend_from_slice(&version);
    out.push(depth);
    out.extend_from_slice(&parent_fingerprint);
    out.extend_from_slice(&child_number.to_be_bytes());
    out.extend_from_slice(chain_code);
    out.extend_from_slice(key);
    out
}

fn parse(payload: &[u8], expected_version: [u8; 4]) -> Result<RawExtendedKey, KeyError> {
    if payload.len() != SERIALIZED_LEN {
        return Err(KeyError::InvalidEncoding("extended key must be 78 bytes"));
    }
    if payload[..4] != expected_version {
        return Err(KeyError::NetworkMismatch);
    }
    let mut raw = RawExtendedKey {
        depth: payload[4],
        parent_fingerprint: [0u8; 4],
        child_number: u32::from_be_bytes([payload[9], payload[10], payload[11], payload[12]]),
        chain_code: [0u8; 32],
        key: [0u8; 33],
    };
    raw.parent_fingerprint.copy_from_slice(&payload[5..9]);
    raw.chain_code.copy_from_slice(&payload[13..45]);
    raw.key.copy_from_slice(&payload[45..78]);
    Ok(raw)
}

fn scalar_from(digest: &[u8; 64]) -> Result<Scalar, KeyError> {
    let mut il = [0u8; 32];
    il.copy_from_slice(&digest[..32]);
    let scalar = Scalar::from_be_bytes(il).map_err(|_| KeyError::InvalidKey);
    il.zeroize();
    scalar
}

fn fingerprint_of(public_key: &PublicKey) -> [u8; 4] {
    let hash = hash160(&public_key.serialize());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn secp() -> &'static Secp256k1<secp256k1::All> {
    static SECP: OnceLock<Secp256k1<secp256k1::All>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::new)
}
