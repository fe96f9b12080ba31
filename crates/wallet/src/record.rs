//! Wallet-owned outputs and the spends that consume them.

use hdledger_consensus::{Amount, Hash256};
use hdledger_primitives::OutPoint;
use serde::{Deserialize, Serialize};

use crate::serde_hex;

/// One output paying a wallet address.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(with = "serde_hex::hash")]
    pub id: Hash256,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_coinbase: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_coinstake: Option<bool>,
    pub output_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<i32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_hex::opt_hash"
    )]
    pub block_hash: Option<Hash256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_index: Option<u32>,
    pub creation_time: u64,
    /// Serialized partial merkle tree proving inclusion.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_hex::opt_bytes"
    )]
    pub merkle_proof: Option<Vec<u8>>,
    #[serde(with = "serde_hex::bytes")]
    pub script_pubkey: Vec<u8>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_hex::opt_bytes"
    )]
    pub hex: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_propagated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spending_details: Option<SpendingRecord>,
}

impl TransactionRecord {
    /// Unconfirmed, unspent, non-reward output.
    pub fn new(
        id: Hash256,
        output_index: u32,
        amount: Amount,
        script_pubkey: Vec<u8>,
        creation_time: u64,
    ) -> Self {
        Self {
            id,
            amount,
            is_coinbase: None,
            is_coinstake: None,
            output_index,
            block_height: None,
            block_hash: None,
            block_index: None,
            creation_time,
            merkle_proof: None,
            script_pubkey,
            hex: None,
            is_propagated: None,
            spending_details: None,
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.id, self.output_index)
    }

    pub fn is_confirmed(&self) -> bool {
        self.block_height.is_some()
    }

    pub fn is_spent(&self) -> bool {
        self.spending_details.is_some()
    }

    pub fn is_spendable(&self) -> bool {
        !self.is_spent()
    }

    /// A record that never had the flag set counts as propagated.
    pub fn is_propagated(&self) -> bool {
        self.is_propagated.unwrap_or(true)
    }

    /// Coinbase and coinstake outputs are subject to maturity.
    pub fn is_reward(&self) -> bool {
        self.is_coinbase == Some(true) || self.is_coinstake == Some(true)
    }

    pub fn unspent_amount(&self, confirmed_only: bool) -> Amount {
        if self.is_spent() || (confirmed_only && !self.is_confirmed()) {
            return 0;
        }
        self.amount
    }

    /// Depth below `tip`, counting the tip itself. Zero when unconfirmed or
    /// when the recorded height is above the tip.
    pub fn confirmations(&self, tip: i32) -> i32 {
        match self.block_height {
            None => 0,
            Some(height) => tip.saturating_add(1).saturating_sub(height).max(0),
        }
    }
}

/// The transaction that consumed a [`TransactionRecord`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpendingRecord {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_hex::opt_hash"
    )]
    pub transaction_id: Option<Hash256>,
    #[serde(default)]
    pub payments: Vec<PaymentDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_coinstake: Option<bool>,
    pub creation_time: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_hex::opt_bytes"
    )]
    pub hex: Option<Vec<u8>>,
}

impl SpendingRecord {
    pub fn new(transaction_id: Hash256, payments: Vec<PaymentDetail>, creation_time: u64) -> Self {
        Self {
            transaction_id: Some(transaction_id),
            payments,
            creation_time,
            ..Self::default()
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.block_height.is_some()
    }

    /// `None` when the payment amounts overflow.
    pub fn payment_total(&self) -> Option<Amount> {
        self.payments
            .iter()
            .try_fold(0, |total: Amount, payment| total.checked_add(payment.amount))
    }
}

/// One outgoing payment of a spending transaction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetail {
    #[serde(with = "serde_hex::bytes")]
    pub destination_script: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_index: Option<u32>,
    pub amount: Amount,
}
