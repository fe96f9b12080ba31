use std::fmt;

use hdledger_consensus::{hash256_to_hex, Amount, Hash256};
use hdledger_keys::KeyError;
use hdledger_primitives::{AddressError, OutPoint};

#[derive(Debug, Eq, PartialEq)]
pub enum WalletError {
    Key(KeyError),
    Address(AddressError),
    /// Account index, name or xpub, or a transaction record, already present.
    DuplicateEntity(String),
    AccountNotFound(String),
    AddressNotFound(String),
    WatchOnlyAccount(String),
    AccountIndexExhausted,
    AddressIndexExhausted,
    InvalidAmount(Amount),
    /// A standard output script that pays a key other than the address's.
    ScriptMismatch(String),
    NotSentTransaction(Hash256),
    ConflictingSpend(OutPoint),
    NegativeFee { txid: Hash256, fee: Amount },
    AmountOverflow(Hash256),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::Key(err) => write!(f, "{err}"),
            WalletError::Address(err) => write!(f, "{err}"),
            WalletError::DuplicateEntity(what) => write!(f, "{what} already exists"),
            WalletError::AccountNotFound(name) => write!(f, "account '{name}' not found"),
            WalletError::AddressNotFound(address) => {
                write!(f, "address {address} not found in wallet")
            }
            WalletError::WatchOnlyAccount(name) => {
                write!(f, "account '{name}' is watch-only and holds no private keys")
            }
            WalletError::AccountIndexExhausted => {
                write!(f, "no normal account index left below the reserved range")
            }
            WalletError::AddressIndexExhausted => write!(f, "address index space exhausted"),
            WalletError::InvalidAmount(amount) => write!(f, "amount {amount} out of range"),
            WalletError::ScriptMismatch(address) => {
                write!(f, "output script does not pay {address}")
            }
            WalletError::NotSentTransaction(txid) => write!(
                f,
                "transaction {} was not sent by this wallet",
                hash256_to_hex(txid)
            ),
            WalletError::ConflictingSpend(outpoint) => {
                write!(f, "output {outpoint} already spent by another transaction")
            }
            WalletError::NegativeFee { txid, fee } => write!(
                f,
                "computed fee {fee} for transaction {} is negative",
                hash256_to_hex(txid)
            ),
            WalletError::AmountOverflow(txid) => write!(
                f,
                "amounts recorded for transaction {} overflow",
                hash256_to_hex(txid)
            ),
        }
    }
}

impl std::error::Error for WalletError {}

impl From<KeyError> for WalletError {
    fn from(err: KeyError) -> Self {
        WalletError::Key(err)
    }
}

impl From<AddressError> for WalletError {
    fn from(err: AddressError) -> Self {
        WalletError::Address(err)
    }
}
