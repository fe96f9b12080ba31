use hdledger_consensus::{money_range, Amount, Network};
use hdledger_keys::is_change_path;
use hdledger_primitives::{p2pkh_address, segwit_v0_address};
use hdledger_script::{
    classify_script_pubkey, key_hash_of, p2pk_script, p2pkh_script, pubkey_hash, ScriptType,
};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use crate::record::TransactionRecord;
use crate::serde_hex;
use crate::WalletError;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Balance {
    pub confirmed: Amount,
    pub unconfirmed: Amount,
}

impl Balance {
    pub fn total(&self) -> Amount {
        self.confirmed + self.unconfirmed
    }

    pub(crate) fn of<'a>(records: impl Iterator<Item = &'a TransactionRecord> + Clone) -> Self {
        let confirmed: Amount = records.clone().map(|tx| tx.unspent_amount(true)).sum();
        let total: Amount = records.map(|tx| tx.unspent_amount(false)).sum();
        Self {
            confirmed,
            unconfirmed: total - confirmed,
        }
    }
}

impl std::ops::Add for Balance {
    type Output = Balance;

    fn add(self, other: Balance) -> Balance {
        Balance {
            confirmed: self.confirmed + other.confirmed,
            unconfirmed: self.unconfirmed + other.unconfirmed,
        }
    }
}

/// A derived key on one branch of an account, with the outputs paying it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HdAddress {
    index: u32,
    #[serde(with = "serde_hex::bytes")]
    script_pubkey: Vec<u8>,
    #[serde(with = "serde_hex::bytes")]
    pubkey_script: Vec<u8>,
    bech32_address: String,
    address: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_hex::opt_bytes"
    )]
    redeem_script: Option<Vec<u8>>,
    hd_path: String,
    #[serde(default)]
    transactions: Vec<TransactionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    staking_expiry: Option<u64>,
}

impl HdAddress {
    /// Builds the P2PKH, P2PK and P2WPKH forms of `public_key`.
    pub fn new(
        index: u32,
        hd_path: String,
        public_key: &PublicKey,
        network: Network,
    ) -> Result<Self, WalletError> {
        let pubkey = public_key.serialize();
        let key_hash = pubkey_hash(&pubkey);
        Ok(Self {
            index,
            script_pubkey: p2pkh_script(&key_hash),
            pubkey_script: p2pk_script(&pubkey),
            bech32_address: segwit_v0_address(&key_hash, network)?,
            address: p2pkh_address(&key_hash, network),
            redeem_script: None,
            hd_path,
            transactions: Vec::new(),
            staking_expiry: None,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn script_pubkey(&self) -> &[u8] {
        &self.script_pubkey
    }

    pub fn pubkey_script(&self) -> &[u8] {
        &self.pubkey_script
    }

    pub fn bech32_address(&self) -> &str {
        &self.bech32_address
    }

    /// Base58 P2PKH address; the identity used by address lookups.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn redeem_script(&self) -> Option<&[u8]> {
        self.redeem_script.as_deref()
    }

    pub fn hd_path(&self) -> &str {
        &self.hd_path
    }

    pub fn staking_expiry(&self) -> Option<u64> {
        self.staking_expiry
    }

    pub fn set_staking_expiry(&mut self, expiry: Option<u64>) {
        self.staking_expiry = expiry;
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub(crate) fn transactions_mut(&mut self) -> &mut [TransactionRecord] {
        &mut self.transactions
    }

    /// False for a path that is not a full address path.
    pub fn is_change_address(&self) -> bool {
        is_change_path(&self.hd_path).unwrap_or(false)
    }

    pub fn is_used(&self) -> bool {
        !self.transactions.is_empty()
    }

    pub fn unspent_transactions(&self) -> impl Iterator<Item = &TransactionRecord> + '_ {
        self.transactions.iter().filter(|tx| tx.is_spendable())
    }

    /// Whether `script` is a P2PKH, P2WPKH or P2PK output paying this key.
    pub fn pays_to(&self, script: &[u8]) -> bool {
        match classify_script_pubkey(script) {
            ScriptType::P2Pkh | ScriptType::P2Wpkh => {
                let paid = key_hash_of(script);
                paid.is_some() && paid == key_hash_of(&self.script_pubkey)
            }
            ScriptType::P2Pk => script == self.pubkey_script.as_slice(),
            ScriptType::Other => false,
        }
    }

    /// Records whose script is a single-key form must pay this address;
    /// other scripts are stored as given.
    pub fn add_transaction(&mut self, record: TransactionRecord) -> Result<(), WalletError> {
        if !money_range(record.amount) {
            return Err(WalletError::InvalidAmount(record.amount));
        }
        if classify_script_pubkey(&record.script_pubkey) != ScriptType::Other
            && !self.pays_to(&record.script_pubkey)
        {
            return Err(WalletError::ScriptMismatch(self.address.clone()));
        }
        let outpoint = record.outpoint();
        if self.transactions.iter().any(|tx| tx.outpoint() == outpoint) {
            return Err(WalletError::DuplicateEntity(format!(
                "transaction output {outpoint} on {}",
                self.address
            )));
        }
        self.transactions.push(record);
        Ok(())
    }

    pub fn balances(&self) -> Balance {
        Balance::of(self.transactions.iter())
    }
}
