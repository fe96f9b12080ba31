//! Accounts of one coin type plus the chain position they are synced to.

use hdledger_consensus::{hash256_to_hex, Hash256, Network};
use hdledger_keys::{
    account_path, ExtendedPublicKey, HdPath, KeyDerivation, PrivateKeyMaterial,
};
use hdledger_log::log_info;
use serde::{Deserialize, Serialize};

use crate::account::{AccountFilter, HdAccount, SPECIAL_PURPOSE_ACCOUNT_INDEX_START};
use crate::serde_hex;
use crate::WalletError;

/// Decrypted secret, chain code and network needed to derive account keys.
pub struct SeedMaterial<'a> {
    pub key: &'a PrivateKeyMaterial,
    pub chain_code: &'a [u8; 32],
    pub network: Network,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AccountRoot {
    coin_type: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_block_synced_height: Option<i32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_hex::opt_hash"
    )]
    last_block_synced_hash: Option<Hash256>,
    #[serde(default)]
    accounts: Vec<HdAccount>,
}

impl AccountRoot {
    pub fn new(coin_type: u32) -> Self {
        Self {
            coin_type,
            last_block_synced_height: None,
            last_block_synced_hash: None,
            accounts: Vec::new(),
        }
    }

    pub fn coin_type(&self) -> u32 {
        self.coin_type
    }

    pub fn last_synced_height(&self) -> Option<i32> {
        self.last_block_synced_height
    }

    pub fn last_synced_hash(&self) -> Option<Hash256> {
        self.last_block_synced_hash
    }

    pub fn set_last_synced_details(&mut self, height: i32, hash: Hash256) {
        self.last_block_synced_height = Some(height);
        self.last_block_synced_hash = Some(hash);
    }

    /// Accounts in creation order.
    pub fn accounts<'a>(
        &'a self,
        filter: AccountFilter<'a>,
    ) -> impl Iterator<Item = &'a HdAccount> + Clone + 'a {
        self.accounts
            .iter()
            .filter(move |account| filter.matches(account))
    }

    pub(crate) fn accounts_mut(&mut self) -> impl Iterator<Item = &mut HdAccount> + '_ {
        self.accounts.iter_mut()
    }

    pub fn account_by_name(&self, name: &str) -> Option<&HdAccount> {
        self.accounts.iter().find(|account| account.name() == name)
    }

    pub(crate) fn account_by_name_mut(&mut self, name: &str) -> Option<&mut HdAccount> {
        self.accounts.iter_mut().find(|account| account.name() == name)
    }

    /// One past the highest normal index, or 0. Special-purpose accounts
    /// do not take part, and the result never enters their range.
    pub fn next_account_index(&self) -> Result<u32, WalletError> {
        let next = self
            .accounts(AccountFilter::NormalOnly)
            .map(HdAccount::index)
            .max()
            .map_or(0, |max| max + 1);
        if next >= SPECIAL_PURPOSE_ACCOUNT_INDEX_START {
            return Err(WalletError::AccountIndexExhausted);
        }
        Ok(next)
    }

    /// Lowest-index normal account without any transactions.
    pub fn first_unused_account(&self) -> Option<&HdAccount> {
        self.accounts(AccountFilter::NormalOnly)
            .filter(|account| !account.has_transactions())
            .min_by_key(|account| account.index())
    }

    /// Creates an account whose xpub is derived from the wallet seed. The
    /// index defaults to the next normal index and the name to
    /// `"account {index}"`.
    pub fn add_account<K: KeyDerivation>(
        &mut self,
        keys: &K,
        seed: &SeedMaterial<'_>,
        creation_time: u64,
        index: Option<u32>,
        name: Option<&str>,
    ) -> Result<&HdAccount, WalletError> {
        let index = match index {
            Some(index) => index,
            None => self.next_account_index()?,
        };
        let name = name.map_or_else(|| format!("account {index}"), str::to_string);
        self.check_unique(index, &name)?;

        let hd_path = account_path(self.coin_type, index);
        let xpub =
            keys.derive_extended_public_key(seed.key, seed.chain_code, &hd_path, seed.network)?;
        log_info!("created account '{name}' at {hd_path}");
        self.accounts.push(HdAccount::new(
            index,
            name,
            hd_path,
            xpub,
            creation_time,
            false,
        ));
        Ok(&self.accounts[self.accounts.len() - 1])
    }

    /// Creates an account from an extended public key alone.
    pub fn add_watch_only_account(
        &mut self,
        extended_pub_key: &str,
        network: Network,
        index: u32,
        name: Option<&str>,
        creation_time: u64,
    ) -> Result<&HdAccount, WalletError> {
        let xpub = ExtendedPublicKey::decode(extended_pub_key, network)?.encode(network);
        let hd_path = account_path(self.coin_type, index);
        HdPath::parse(&hd_path)?;
        let name = name.map_or_else(|| format!("account {index}"), str::to_string);
        self.check_unique(index, &name)?;
        if self
            .accounts
            .iter()
            .any(|account| account.extended_pub_key() == xpub)
        {
            return Err(WalletError::DuplicateEntity(format!(
                "account with extended public key {xpub}"
            )));
        }

        log_info!("created watch-only account '{name}' at {hd_path}");
        self.accounts.push(HdAccount::new(
            index,
            name,
            hd_path,
            xpub,
            creation_time,
            true,
        ));
        Ok(&self.accounts[self.accounts.len() - 1])
    }

    fn check_unique(&self, index: u32, name: &str) -> Result<(), WalletError> {
        if let Some(existing) = self
            .accounts
            .iter()
            .find(|account| account.index() == index || account.name() == name)
        {
            let what = if existing.index() == index {
                format!("account with index {index}")
            } else {
                format!("account named '{name}'")
            };
            return Err(WalletError::DuplicateEntity(what));
        }
        Ok(())
    }
}

impl std::fmt::Display for AccountRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "coin type {} ({} accounts",
            self.coin_type,
            self.accounts.len()
        )?;
        match (self.last_block_synced_height, &self.last_block_synced_hash) {
            (Some(height), Some(hash)) => {
                write!(f, ", synced to {height} {})", hash256_to_hex(hash))
            }
            _ => write!(f, ", never synced)"),
        }
    }
}
