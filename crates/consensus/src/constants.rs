//! Consensus-wide constants shared with the wallet.

/// Coinbase and coinstake outputs can only be spent after this number of new blocks.
pub const COINBASE_MATURITY: i32 = 100;
/// BIP44 purpose field used for every account path.
pub const BIP44_PURPOSE: u32 = 44;
/// First child index that is hardened under BIP32.
pub const HARDENED_KEY_START: u32 = 0x8000_0000;
