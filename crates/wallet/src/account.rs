//! BIP44 accounts: address branches, spendability and balances.

use std::fmt;

use hdledger_consensus::{Amount, Hash256, Network};
use hdledger_keys::{address_path, coin_type_of, KeyDerivation};
use hdledger_log::log_debug;
use hdledger_primitives::OutPoint;
use serde::{Deserialize, Serialize};

use crate::address::{Balance, HdAddress};
use crate::record::TransactionRecord;
use crate::WalletError;

/// Accounts at or above this index are reserved for special purposes
/// (cold staking and the like) and are never picked automatically.
pub const SPECIAL_PURPOSE_ACCOUNT_INDEX_START: u32 = 100_000_000;

/// Which accounts a wallet-wide query looks at.
#[derive(Clone, Copy, Default)]
pub enum AccountFilter<'a> {
    All,
    #[default]
    NormalOnly,
    SpecialPurposeOnly,
    ByPredicate(&'a dyn Fn(&HdAccount) -> bool),
}

impl AccountFilter<'_> {
    pub fn matches(&self, account: &HdAccount) -> bool {
        match self {
            AccountFilter::All => true,
            AccountFilter::NormalOnly => account.is_normal_account(),
            AccountFilter::SpecialPurposeOnly => !account.is_normal_account(),
            AccountFilter::ByPredicate(predicate) => predicate(account),
        }
    }
}

impl fmt::Debug for AccountFilter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountFilter::All => f.write_str("All"),
            AccountFilter::NormalOnly => f.write_str("NormalOnly"),
            AccountFilter::SpecialPurposeOnly => f.write_str("SpecialPurposeOnly"),
            AccountFilter::ByPredicate(_) => f.write_str("ByPredicate(..)"),
        }
    }
}

/// An output the wallet can spend, joined with the account and address
/// holding it. Lives only as long as the borrow of the wallet.
#[derive(Clone, Copy, Debug)]
pub struct UnspentOutputReference<'a> {
    pub account: &'a HdAccount,
    pub address: &'a HdAddress,
    pub transaction: &'a TransactionRecord,
    pub confirmations: i32,
}

impl UnspentOutputReference<'_> {
    pub fn outpoint(&self) -> OutPoint {
        self.transaction.outpoint()
    }

    pub fn amount(&self) -> Amount {
        self.transaction.amount
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HdAccount {
    index: u32,
    name: String,
    hd_path: String,
    extended_pub_key: String,
    creation_time: u64,
    #[serde(default)]
    external_addresses: Vec<HdAddress>,
    #[serde(default)]
    internal_addresses: Vec<HdAddress>,
    #[serde(default)]
    watch_only: bool,
}

impl HdAccount {
    pub(crate) fn new(
        index: u32,
        name: String,
        hd_path: String,
        extended_pub_key: String,
        creation_time: u64,
        watch_only: bool,
    ) -> Self {
        Self {
            index,
            name,
            hd_path,
            extended_pub_key,
            creation_time,
            external_addresses: Vec::new(),
            internal_addresses: Vec::new(),
            watch_only,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hd_path(&self) -> &str {
        &self.hd_path
    }

    pub fn extended_pub_key(&self) -> &str {
        &self.extended_pub_key
    }

    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn is_watch_only(&self) -> bool {
        self.watch_only
    }

    pub fn is_normal_account(&self) -> bool {
        self.index < SPECIAL_PURPOSE_ACCOUNT_INDEX_START
    }

    pub fn coin_type(&self) -> Result<u32, WalletError> {
        Ok(coin_type_of(&self.hd_path)?)
    }

    pub fn external_addresses(&self) -> &[HdAddress] {
        &self.external_addresses
    }

    pub fn internal_addresses(&self) -> &[HdAddress] {
        &self.internal_addresses
    }

    pub fn addresses(&self, is_change: bool) -> &[HdAddress] {
        if is_change {
            &self.internal_addresses
        } else {
            &self.external_addresses
        }
    }

    fn addresses_mut(&mut self, is_change: bool) -> &mut Vec<HdAddress> {
        if is_change {
            &mut self.internal_addresses
        } else {
            &mut self.external_addresses
        }
    }

    /// External branch first, then internal.
    pub fn combined_addresses(&self) -> impl Iterator<Item = &HdAddress> + Clone + '_ {
        self.external_addresses
            .iter()
            .chain(self.internal_addresses.iter())
    }

    pub(crate) fn combined_addresses_mut(&mut self) -> impl Iterator<Item = &mut HdAddress> + '_ {
        self.external_addresses
            .iter_mut()
            .chain(self.internal_addresses.iter_mut())
    }

    pub fn transactions(&self) -> impl Iterator<Item = &TransactionRecord> + Clone + '_ {
        self.combined_addresses()
            .flat_map(|address| address.transactions().iter())
    }

    pub fn has_transactions(&self) -> bool {
        self.combined_addresses().any(HdAddress::is_used)
    }

    pub fn transactions_by_id<'a>(
        &'a self,
        id: &'a Hash256,
    ) -> impl Iterator<Item = &'a TransactionRecord> + 'a {
        self.transactions().filter(move |tx| tx.id == *id)
    }

    pub fn find_addresses_for_transaction<F>(&self, predicate: F) -> Vec<&HdAddress>
    where
        F: Fn(&TransactionRecord) -> bool,
    {
        self.combined_addresses()
            .filter(|address| address.transactions().iter().any(&predicate))
            .collect()
    }

    /// Derives `count` new addresses on one branch, continuing after the
    /// highest existing index. Nothing is appended if any derivation fails.
    pub fn create_addresses<K: KeyDerivation>(
        &mut self,
        keys: &K,
        network: Network,
        count: u32,
        is_change: bool,
    ) -> Result<&[HdAddress], WalletError> {
        let coin_type = self.coin_type()?;
        let first = self
            .addresses(is_change)
            .iter()
            .map(HdAddress::index)
            .max()
            .map_or(Some(0), |max| max.checked_add(1))
            .ok_or(WalletError::AddressIndexExhausted)?;
        let end = first
            .checked_add(count)
            .ok_or(WalletError::AddressIndexExhausted)?;

        let mut created = Vec::with_capacity(count as usize);
        for index in first..end {
            let public_key =
                keys.derive_public_key(&self.extended_pub_key, index, is_change, network)?;
            let path = address_path(coin_type, self.index, is_change, index);
            created.push(HdAddress::new(index, path, &public_key, network)?);
        }

        log_debug!(
            "account '{}': derived {} {} address(es) from index {}",
            self.name,
            count,
            if is_change { "change" } else { "receive" },
            first
        );
        let branch = self.addresses_mut(is_change);
        let start = branch.len();
        branch.extend(created);
        Ok(&branch[start..])
    }

    /// Tops a branch up so that `buffer` addresses follow the last used one.
    /// Returns how many addresses were created.
    pub fn ensure_unused_addresses<K: KeyDerivation>(
        &mut self,
        keys: &K,
        network: Network,
        buffer: u32,
        is_change: bool,
    ) -> Result<usize, WalletError> {
        let last_used = self.last_used_address(is_change).map(HdAddress::index);
        let fresh = self
            .addresses(is_change)
            .iter()
            .filter(|address| last_used.map_or(true, |last| address.index() > last))
            .count();
        let missing = (buffer as usize).saturating_sub(fresh);
        if missing == 0 {
            return Ok(0);
        }
        let created = self.create_addresses(keys, network, missing as u32, is_change)?;
        Ok(created.len())
    }

    pub fn first_unused_address(&self, is_change: bool) -> Option<&HdAddress> {
        self.addresses(is_change)
            .iter()
            .filter(|address| !address.is_used())
            .min_by_key(|address| address.index())
    }

    pub fn last_used_address(&self, is_change: bool) -> Option<&HdAddress> {
        self.addresses(is_change)
            .iter()
            .filter(|address| address.is_used())
            .max_by_key(|address| address.index())
    }

    pub fn balances(&self) -> Balance {
        Balance::of(self.transactions())
    }

    /// Unspent outputs with at least `min_confirmations`; coinbase and
    /// coinstake outputs additionally need more than `coinbase_maturity`.
    /// Ordered by address (receive branch first), then by insertion.
    pub fn spendable_transactions(
        &self,
        tip: i32,
        coinbase_maturity: i32,
        min_confirmations: i32,
    ) -> Vec<UnspentOutputReference<'_>> {
        let mut out = Vec::new();
        for address in self.combined_addresses() {
            for transaction in address.unspent_transactions() {
                let confirmations = transaction.confirmations(tip);
                if confirmations < min_confirmations {
                    continue;
                }
                if transaction.is_reward() && confirmations <= coinbase_maturity {
                    continue;
                }
                out.push(UnspentOutputReference {
                    account: self,
                    address,
                    transaction,
                    confirmations,
                });
            }
        }
        out
    }

    /// Like [`spendable_transactions`](Self::spendable_transactions) with
    /// maturity ignored.
    pub fn unspent_transactions(
        &self,
        tip: i32,
        min_confirmations: i32,
    ) -> Vec<UnspentOutputReference<'_>> {
        self.spendable_transactions(tip, 0, min_confirmations)
    }
}
