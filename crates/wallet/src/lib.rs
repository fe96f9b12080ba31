//! In-memory HD wallet ledger: BIP44 accounts, their addresses and the
//! outputs paying them, with balance, spendability and fee queries.

pub mod account;
pub mod address;
pub mod config;
pub mod error;
pub mod record;
pub mod root;
mod serde_hex;
pub mod store;
pub mod wallet;

pub use account::{
    AccountFilter, HdAccount, UnspentOutputReference, SPECIAL_PURPOSE_ACCOUNT_INDEX_START,
};
pub use address::{Balance, HdAddress};
pub use config::{ConfigError, WalletConfig};
pub use error::WalletError;
pub use record::{PaymentDetail, SpendingRecord, TransactionRecord};
pub use root::{AccountRoot, SeedMaterial};
pub use store::{load_wallet, open_wallet, save_wallet, StoreError};
pub use wallet::Wallet;
