//! The wallet root: one account collection plus the encrypted seed, and the
//! queries that cut across accounts.

use hdledger_consensus::{chain_params, hash256_to_hex, money_range, Amount, Hash256, Network};
use hdledger_keys::{
    generate_seed, EncryptedSeed, ExtendedPrivateKey, KdfParams, KeyDerivation,
};
use hdledger_log::{log_debug, log_info, log_warn};
use hdledger_primitives::OutPoint;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::account::{AccountFilter, HdAccount, UnspentOutputReference};
use crate::address::{Balance, HdAddress};
use crate::config::WalletConfig;
use crate::record::{SpendingRecord, TransactionRecord};
use crate::root::{AccountRoot, SeedMaterial};
use crate::serde_hex;
use crate::WalletError;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    name: String,
    encrypted_seed: EncryptedSeed,
    #[serde(with = "serde_hex::array32")]
    chain_code: [u8; 32],
    #[serde(with = "network_name")]
    network: Network,
    creation_time: u64,
    account_root: AccountRoot,
}

impl Wallet {
    pub fn new(
        name: impl Into<String>,
        encrypted_seed: EncryptedSeed,
        chain_code: [u8; 32],
        network: Network,
        creation_time: u64,
    ) -> Self {
        Self {
            name: name.into(),
            encrypted_seed,
            chain_code,
            network,
            creation_time,
            account_root: AccountRoot::new(chain_params(network).bip44_coin_type),
        }
    }

    /// New wallet from a fresh random seed, its master secret sealed with
    /// `password`.
    pub fn generate(
        name: impl Into<String>,
        password: &str,
        network: Network,
        creation_time: u64,
        kdf: KdfParams,
    ) -> Result<Self, WalletError> {
        let mut seed = generate_seed();
        let master = ExtendedPrivateKey::new_master(&seed);
        seed.zeroize();
        let master = master?;
        let mut secret = master.secret_bytes();
        let sealed = EncryptedSeed::encrypt(&secret, password, network, kdf);
        secret.zeroize();
        let wallet = Self::new(name, sealed?, *master.chain_code(), network, creation_time);
        log_info!("generated wallet '{}' on {}", wallet.name, network.as_str());
        Ok(wallet)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn encrypted_seed(&self) -> &EncryptedSeed {
        &self.encrypted_seed
    }

    pub fn account_root(&self) -> &AccountRoot {
        &self.account_root
    }

    pub fn coin_type(&self) -> u32 {
        self.account_root.coin_type()
    }

    pub fn last_synced_height(&self) -> Option<i32> {
        self.account_root.last_synced_height()
    }

    pub fn last_synced_hash(&self) -> Option<Hash256> {
        self.account_root.last_synced_hash()
    }

    pub fn set_last_synced_details(&mut self, height: i32, hash: Hash256) {
        log_debug!(
            "wallet '{}' synced to {height} {}",
            self.name,
            hash256_to_hex(&hash)
        );
        self.account_root.set_last_synced_details(height, hash);
    }

    pub fn add_new_account<K: KeyDerivation>(
        &mut self,
        keys: &K,
        password: &str,
        creation_time: u64,
        index: Option<u32>,
        name: Option<&str>,
    ) -> Result<&HdAccount, WalletError> {
        let key = keys.decrypt_seed(&self.encrypted_seed, password, self.network)?;
        let seed = SeedMaterial {
            key: &key,
            chain_code: &self.chain_code,
            network: self.network,
        };
        self.account_root
            .add_account(keys, &seed, creation_time, index, name)
    }

    pub fn add_watch_only_account(
        &mut self,
        extended_pub_key: &str,
        index: u32,
        name: Option<&str>,
        creation_time: u64,
    ) -> Result<&HdAccount, WalletError> {
        self.account_root.add_watch_only_account(
            extended_pub_key,
            self.network,
            index,
            name,
            creation_time,
        )
    }

    pub fn accounts<'a>(
        &'a self,
        filter: AccountFilter<'a>,
    ) -> impl Iterator<Item = &'a HdAccount> + Clone + 'a {
        self.account_root.accounts(filter)
    }

    pub fn account(&self, name: &str) -> Option<&HdAccount> {
        self.account_root.account_by_name(name)
    }

    pub fn first_unused_account(&self) -> Option<&HdAccount> {
        self.account_root.first_unused_account()
    }

    pub fn create_addresses<K: KeyDerivation>(
        &mut self,
        keys: &K,
        account_name: &str,
        count: u32,
        is_change: bool,
    ) -> Result<&[HdAddress], WalletError> {
        let network = self.network;
        self.account_root
            .account_by_name_mut(account_name)
            .ok_or_else(|| WalletError::AccountNotFound(account_name.to_string()))?
            .create_addresses(keys, network, count, is_change)
    }

    pub fn ensure_unused_addresses<K: KeyDerivation>(
        &mut self,
        keys: &K,
        account_name: &str,
        buffer: u32,
        is_change: bool,
    ) -> Result<usize, WalletError> {
        let network = self.network;
        self.account_root
            .account_by_name_mut(account_name)
            .ok_or_else(|| WalletError::AccountNotFound(account_name.to_string()))?
            .ensure_unused_addresses(keys, network, buffer, is_change)
    }

    /// Tops both branches of an account up to the configured address buffer.
    pub fn top_up_addresses<K: KeyDerivation>(
        &mut self,
        keys: &K,
        account_name: &str,
        config: &WalletConfig,
    ) -> Result<usize, WalletError> {
        let buffer = config.address_buffer;
        let receive = self.ensure_unused_addresses(keys, account_name, buffer, false)?;
        let change = self.ensure_unused_addresses(keys, account_name, buffer, true)?;
        Ok(receive + change)
    }

    pub fn all_addresses<'a>(
        &'a self,
        filter: AccountFilter<'a>,
    ) -> impl Iterator<Item = &'a HdAddress> + 'a {
        self.accounts(filter)
            .flat_map(|account| account.combined_addresses())
    }

    pub fn all_transactions<'a>(
        &'a self,
        filter: AccountFilter<'a>,
    ) -> impl Iterator<Item = &'a TransactionRecord> + 'a {
        self.all_addresses(filter)
            .flat_map(|address| address.transactions().iter())
    }

    /// P2PK scripts of every address.
    pub fn all_pub_keys<'a>(
        &'a self,
        filter: AccountFilter<'a>,
    ) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.all_addresses(filter).map(HdAddress::pubkey_script)
    }

    /// Spendable outputs under the network's coinbase maturity.
    pub fn all_spendable_transactions<'a>(
        &'a self,
        tip: i32,
        min_confirmations: i32,
        filter: AccountFilter<'a>,
    ) -> Vec<UnspentOutputReference<'a>> {
        let maturity = chain_params(self.network).coinbase_maturity;
        self.accounts(filter)
            .flat_map(|account| account.spendable_transactions(tip, maturity, min_confirmations))
            .collect()
    }

    /// Spendable outputs of normal accounts at the configured `minconf`.
    pub fn spendable_outputs(
        &self,
        tip: i32,
        config: &WalletConfig,
    ) -> Vec<UnspentOutputReference<'_>> {
        self.all_spendable_transactions(tip, config.min_confirmations, AccountFilter::default())
    }

    pub fn all_unspent_transactions<'a>(
        &'a self,
        tip: i32,
        min_confirmations: i32,
        filter: AccountFilter<'a>,
    ) -> Vec<UnspentOutputReference<'a>> {
        self.accounts(filter)
            .flat_map(|account| account.unspent_transactions(tip, min_confirmations))
            .collect()
    }

    /// `None` when no account has that name.
    pub fn spendable_transactions_in_account(
        &self,
        account_name: &str,
        tip: i32,
        min_confirmations: i32,
    ) -> Option<Vec<UnspentOutputReference<'_>>> {
        let maturity = chain_params(self.network).coinbase_maturity;
        self.account(account_name)
            .map(|account| account.spendable_transactions(tip, maturity, min_confirmations))
    }

    pub fn balances(&self, filter: AccountFilter<'_>) -> Balance {
        self.accounts(filter)
            .map(HdAccount::balances)
            .fold(Balance::default(), |sum, balance| sum + balance)
    }

    /// Matches on the base58 address string only.
    pub fn contains_address(&self, address: &str) -> bool {
        self.find_address(address).is_some()
    }

    pub fn find_address(&self, address: &str) -> Option<&HdAddress> {
        self.all_addresses(AccountFilter::All)
            .find(|candidate| candidate.address() == address)
    }

    pub fn find_address_mut(&mut self, address: &str) -> Option<&mut HdAddress> {
        self.account_root
            .accounts_mut()
            .flat_map(|account| account.combined_addresses_mut())
            .find(|candidate| candidate.address() == address)
    }

    /// Owner of an output script seen on chain, in any of its key forms.
    pub fn find_address_by_script(&self, script: &[u8]) -> Option<&HdAddress> {
        self.all_addresses(AccountFilter::All)
            .find(|candidate| candidate.pays_to(script))
    }

    fn find_account_for_address(&self, address: &str) -> Option<(&HdAccount, &HdAddress)> {
        self.accounts(AccountFilter::All).find_map(|account| {
            account
                .combined_addresses()
                .find(|candidate| candidate.address() == address)
                .map(|candidate| (account, candidate))
        })
    }

    pub fn record_transaction(
        &mut self,
        address: &str,
        record: TransactionRecord,
    ) -> Result<(), WalletError> {
        let outpoint = record.outpoint();
        let target = self
            .find_address_mut(address)
            .ok_or_else(|| WalletError::AddressNotFound(address.to_string()))?;
        target.add_transaction(record)?;
        log_debug!("recorded output {outpoint} to {address}");
        Ok(())
    }

    /// Attaches `spending` to the wallet output at `outpoint`.
    ///
    /// Returns `Ok(false)` when the wallet holds no such output. Recording the
    /// same spending transaction again replaces the stored details; a
    /// different spending transaction is rejected.
    pub fn record_spend(
        &mut self,
        outpoint: &OutPoint,
        spending: SpendingRecord,
    ) -> Result<bool, WalletError> {
        if let Some(payment) = spending
            .payments
            .iter()
            .find(|payment| !money_range(payment.amount))
        {
            return Err(WalletError::InvalidAmount(payment.amount));
        }
        let record = self
            .account_root
            .accounts_mut()
            .flat_map(|account| account.combined_addresses_mut())
            .flat_map(|address| address.transactions_mut().iter_mut())
            .find(|tx| tx.outpoint() == *outpoint);
        let Some(record) = record else {
            return Ok(false);
        };
        if let Some(existing) = &record.spending_details {
            if existing.transaction_id != spending.transaction_id {
                log_warn!("output {outpoint} already spent by another transaction");
                return Err(WalletError::ConflictingSpend(*outpoint));
            }
        }
        record.spending_details = Some(spending);
        log_debug!("recorded spend of {outpoint}");
        Ok(true)
    }

    /// Fee paid by a transaction this wallet sent: inputs it spent, less its
    /// payments and any change returned to the wallet.
    pub fn sent_transaction_fee(&self, txid: &Hash256) -> Result<Amount, WalletError> {
        let inputs: Vec<&TransactionRecord> = self
            .all_transactions(AccountFilter::All)
            .filter(|tx| {
                tx.spending_details
                    .as_ref()
                    .and_then(|spending| spending.transaction_id)
                    == Some(*txid)
            })
            .collect();
        let Some(spending) = inputs
            .first()
            .and_then(|tx| tx.spending_details.as_ref())
        else {
            return Err(WalletError::NotSentTransaction(*txid));
        };

        let payment_outputs: Vec<u32> = spending
            .payments
            .iter()
            .filter_map(|payment| payment.output_index)
            .collect();
        let overflow = || WalletError::AmountOverflow(*txid);
        let change = checked_sum(
            self.all_transactions(AccountFilter::All)
                .filter(|tx| tx.id == *txid && !payment_outputs.contains(&tx.output_index))
                .map(|tx| tx.amount),
        )
        .ok_or_else(overflow)?;
        let spent = checked_sum(inputs.iter().map(|tx| tx.amount)).ok_or_else(overflow)?;
        let fee = spending
            .payment_total()
            .and_then(|payments| payments.checked_add(change))
            .and_then(|outgoing| spent.checked_sub(outgoing))
            .ok_or_else(overflow)?;
        if fee < 0 {
            log_warn!(
                "negative fee {fee} computed for {}; wallet records are inconsistent",
                hash256_to_hex(txid)
            );
            return Err(WalletError::NegativeFee { txid: *txid, fee });
        }
        Ok(fee)
    }

    /// Base58 extended private key for a wallet address. Fails before the
    /// seed is touched when the address is unknown.
    pub fn extended_private_key_for_address<K: KeyDerivation>(
        &self,
        keys: &K,
        password: &str,
        address: &str,
    ) -> Result<String, WalletError> {
        let (account, target) = self
            .find_account_for_address(address)
            .ok_or_else(|| WalletError::AddressNotFound(address.to_string()))?;
        if account.is_watch_only() {
            return Err(WalletError::WatchOnlyAccount(account.name().to_string()));
        }
        let key = keys.decrypt_seed(&self.encrypted_seed, password, self.network)?;
        Ok(keys.derive_extended_private_key(
            &key,
            &self.chain_code,
            target.hd_path(),
            self.network,
        )?)
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = Amount>) -> Option<Amount> {
    amounts.try_fold(0, |total: Amount, amount| total.checked_add(amount))
}

mod network_name {
    use hdledger_consensus::Network;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(network: &Network, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(network.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Network, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Network::parse(&raw).ok_or_else(|| D::Error::custom(format!("unknown network '{raw}'")))
    }
}
