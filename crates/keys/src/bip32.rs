//! The production [`KeyDerivation`] backed by BIP32 over secp256k1.

use hdledger_consensus::Network;
use secp256k1::PublicKey;

use crate::extended::{ExtendedPrivateKey, ExtendedPublicKey};
use crate::path::HdPath;
use crate::seed::{EncryptedSeed, PrivateKeyMaterial};
use crate::{KeyDerivation, KeyError};

#[derive(Clone, Copy, Debug, Default)]
pub struct Bip32;

impl Bip32 {
    fn derive_private(
        key: &PrivateKeyMaterial,
        chain_code: &[u8; 32],
        path: &str,
    ) -> Result<ExtendedPrivateKey, KeyError> {
        let path = HdPath::parse(path)?;
        ExtendedPrivateKey::from_parts(key.as_bytes(), chain_code)?.derive_path(&path)
    }
}

impl KeyDerivation for Bip32 {
    fn decrypt_seed(
        &self,
        encrypted_seed: &EncryptedSeed,
        password: &str,
        network: Network,
    ) -> Result<PrivateKeyMaterial, KeyError> {
        encrypted_seed.decrypt(password, network)
    }

    fn derive_extended_public_key(
        &self,
        key: &PrivateKeyMaterial,
        chain_code: &[u8; 32],
        path: &str,
        network: Network,
    ) -> Result<String, KeyError> {
        let derived = Self::derive_private(key, chain_code, path)?;
        Ok(derived.to_extended_public().encode(network))
    }

    fn derive_extended_private_key(
        &self,
        key: &PrivateKeyMaterial,
        chain_code: &[u8; 32],
        path: &str,
        network: Network,
    ) -> Result<String, KeyError> {
        let derived = Self::derive_private(key, chain_code, path)?;
        Ok(derived.encode(network))
    }

    fn derive_public_key(
        &self,
        extended_public_key: &str,
        address_index: u32,
        is_change: bool,
        network: Network,
    ) -> Result<PublicKey, KeyError> {
        let account = ExtendedPublicKey::decode(extended_public_key, network)?;
        let child = account
            .derive_child(u32::from(is_change))?
            .derive_child(address_index)?;
        Ok(*child.public_key())
    }
}
