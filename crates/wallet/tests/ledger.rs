use hdledger_consensus::{Amount, Hash256, Network};
use hdledger_keys::{
    Bip32, EncryptedSeed, ExtendedPrivateKey, KdfParams, KeyError,
};
use hdledger_log::{enable_capture, take_captured, Level};
use hdledger_primitives::{p2pkh_address, OutPoint};
use hdledger_script::{p2pkh_script, p2wpkh_script, pubkey_hash};
use hdledger_wallet::{
    load_wallet, save_wallet, AccountFilter, Balance, HdAccount, PaymentDetail, SpendingRecord,
    TransactionRecord, Wallet, WalletConfig, WalletError, SPECIAL_PURPOSE_ACCOUNT_INDEX_START,
};

const PASSWORD: &str = "correct horse";
const NETWORK: Network = Network::Regtest;

fn wallet() -> Wallet {
    let master = ExtendedPrivateKey::new_master(&[0x5eu8; 32]).expect("master");
    let seed = EncryptedSeed::encrypt(&master.secret_bytes(), PASSWORD, NETWORK, KdfParams::MINIMAL)
        .expect("encrypt");
    Wallet::new("ledger", seed, *master.chain_code(), NETWORK, 1_700_000_000)
}

fn wallet_with_account(receive: u32, change: u32) -> Wallet {
    let mut wallet = wallet();
    wallet
        .add_new_account(&Bip32, PASSWORD, 0, None, None)
        .expect("account");
    if receive > 0 {
        wallet
            .create_addresses(&Bip32, "account 0", receive, false)
            .expect("receive addresses");
    }
    if change > 0 {
        wallet
            .create_addresses(&Bip32, "account 0", change, true)
            .expect("change addresses");
    }
    wallet
}

fn address(wallet: &Wallet, account: &str, is_change: bool, index: usize) -> String {
    wallet
        .account(account)
        .expect("account")
        .addresses(is_change)[index]
        .address()
        .to_string()
}

fn txid(byte: u8) -> Hash256 {
    [byte; 32]
}

fn confirmed(id: Hash256, output_index: u32, amount: Amount, height: i32) -> TransactionRecord {
    let mut record = TransactionRecord::new(id, output_index, amount, Vec::new(), 0);
    record.block_height = Some(height);
    record
}

fn payment(output_index: Option<u32>, amount: Amount) -> PaymentDetail {
    PaymentDetail {
        destination_script: vec![0x51],
        destination_address: None,
        output_index,
        amount,
    }
}

#[test]
fn first_unused_account_is_lowest_empty_normal_account() {
    let mut wallet = wallet();
    for _ in 0..3 {
        wallet
            .add_new_account(&Bip32, PASSWORD, 0, None, None)
            .expect("account");
    }
    wallet
        .add_new_account(&Bip32, PASSWORD, 0, Some(SPECIAL_PURPOSE_ACCOUNT_INDEX_START), None)
        .expect("special");
    for name in ["account 0", "account 2"] {
        wallet
            .create_addresses(&Bip32, name, 1, false)
            .expect("addresses");
        let target = address(&wallet, name, false, 0);
        wallet
            .record_transaction(&target, confirmed(txid(1), 0, 10, 1))
            .expect("record");
    }

    let unused = wallet.first_unused_account().expect("unused account");
    assert_eq!(unused.index(), 1);
    assert!(!unused.has_transactions());

    wallet
        .create_addresses(&Bip32, "account 1", 1, true)
        .expect("addresses");
    let target = address(&wallet, "account 1", true, 0);
    wallet
        .record_transaction(&target, confirmed(txid(2), 0, 10, 1))
        .expect("record");
    // Only the special-purpose account is left empty.
    assert!(wallet.first_unused_account().is_none());
}

#[test]
fn automatic_index_ignores_reserved_accounts() {
    let mut wallet = wallet();
    let special = wallet
        .add_new_account(&Bip32, PASSWORD, 0, Some(100_000_005), Some("cold staking"))
        .expect("special")
        .index();
    assert_eq!(special, 100_000_005);

    let account = wallet
        .add_new_account(&Bip32, PASSWORD, 0, None, None)
        .expect("normal");
    assert_eq!(account.index(), 0);
    assert_eq!(account.hd_path(), "m/44'/1'/0'");

    let specials: Vec<u32> = wallet
        .accounts(AccountFilter::SpecialPurposeOnly)
        .map(HdAccount::index)
        .collect();
    assert_eq!(specials, vec![100_000_005]);
    let normals: Vec<u32> = wallet
        .accounts(AccountFilter::default())
        .map(HdAccount::index)
        .collect();
    assert_eq!(normals, vec![0]);
}

#[test]
fn explicit_index_can_only_be_used_once() {
    let mut wallet = wallet();
    wallet
        .add_new_account(&Bip32, PASSWORD, 0, Some(2), None)
        .expect("first");
    let err = wallet
        .add_new_account(&Bip32, PASSWORD, 0, Some(2), Some("again"))
        .unwrap_err();
    assert!(matches!(err, WalletError::DuplicateEntity(_)));
    assert_eq!(wallet.account("account 2").map(HdAccount::index), Some(2));
    assert!(wallet.account("again").is_none());
}

#[test]
fn wrong_password_creates_nothing() {
    let mut wallet = wallet();
    let err = wallet
        .add_new_account(&Bip32, "guess", 0, None, None)
        .unwrap_err();
    assert_eq!(err, WalletError::Key(KeyError::IncorrectPassword));
    assert_eq!(wallet.accounts(AccountFilter::All).count(), 0);
}

#[test]
fn address_indices_are_contiguous() {
    let mut wallet = wallet_with_account(3, 0);
    let before = wallet.account("account 0").expect("account").external_addresses().len();
    let created: Vec<u32> = wallet
        .create_addresses(&Bip32, "account 0", 4, false)
        .expect("create")
        .iter()
        .map(|address| address.index())
        .collect();
    assert_eq!(created, vec![3, 4, 5, 6]);
    let account = wallet.account("account 0").expect("account");
    assert_eq!(account.external_addresses().len(), before + 4);
    assert!(account.internal_addresses().is_empty());

    assert!(matches!(
        wallet.create_addresses(&Bip32, "missing", 1, false),
        Err(WalletError::AccountNotFound(_))
    ));
}

#[test]
fn change_address_at_index_five_reports_unspent_record() {
    let mut wallet = wallet_with_account(0, 6);
    let target = address(&wallet, "account 0", true, 5);
    wallet
        .record_transaction(&target, confirmed(txid(1), 0, 500, 3))
        .expect("first");
    wallet
        .record_transaction(&target, confirmed(txid(2), 1, 700, 4))
        .expect("second");
    let spent = wallet
        .record_spend(
            &OutPoint::new(txid(1), 0),
            SpendingRecord::new(txid(9), vec![payment(Some(0), 450)], 10),
        )
        .expect("spend");
    assert!(spent);

    let address = wallet.find_address(&target).expect("address");
    assert_eq!(address.index(), 5);
    assert!(address.is_change_address());
    let unspent: Vec<Hash256> = address.unspent_transactions().map(|tx| tx.id).collect();
    assert_eq!(unspent, vec![txid(2)]);
}

#[test]
fn wallet_spendability_uses_network_maturity() {
    let mut wallet = wallet_with_account(1, 0);
    let target = address(&wallet, "account 0", false, 0);
    let mut reward = confirmed(txid(1), 0, 5_000, 100);
    reward.is_coinbase = Some(true);
    wallet.record_transaction(&target, reward).expect("reward");
    wallet
        .record_transaction(&target, confirmed(txid(2), 0, 10, 150))
        .expect("payment");

    // Tip 199: the reward has exactly 100 confirmations.
    let spendable = wallet.all_spendable_transactions(199, 1, AccountFilter::default());
    assert_eq!(spendable.len(), 1);
    assert_eq!(spendable[0].transaction.id, txid(2));

    let spendable = wallet.all_spendable_transactions(200, 1, AccountFilter::default());
    assert_eq!(spendable.len(), 2);
    assert_eq!(spendable[0].confirmations, 101);
    assert_eq!(spendable[0].outpoint(), OutPoint::new(txid(1), 0));
    assert_eq!(spendable[0].account.name(), "account 0");
    assert_eq!(spendable[0].address.address(), target);

    assert_eq!(
        wallet
            .all_unspent_transactions(199, 1, AccountFilter::default())
            .len(),
        2
    );
    assert_eq!(
        wallet
            .spendable_transactions_in_account("account 0", 199, 1)
            .map(|refs| refs.len()),
        Some(1)
    );
    assert!(wallet
        .spendable_transactions_in_account("nobody", 199, 1)
        .is_none());
    assert!(wallet
        .all_spendable_transactions(200, 1, AccountFilter::SpecialPurposeOnly)
        .is_empty());
}

#[test]
fn balances_obey_total_law() {
    let mut wallet = wallet_with_account(2, 1);
    let empty = wallet.balances(AccountFilter::All);
    assert_eq!(empty, Balance::default());
    assert_eq!(empty.total(), empty.confirmed + empty.unconfirmed);

    let receive = address(&wallet, "account 0", false, 1);
    let change = address(&wallet, "account 0", true, 0);
    wallet
        .record_transaction(&receive, confirmed(txid(1), 0, 1_000, 5))
        .expect("confirmed");
    wallet
        .record_transaction(
            &change,
            TransactionRecord::new(txid(2), 1, 250, Vec::new(), 0),
        )
        .expect("pending");

    let balance = wallet.balances(AccountFilter::default());
    assert_eq!(balance.confirmed, 1_000);
    assert_eq!(balance.unconfirmed, 250);
    assert_eq!(balance.total(), balance.confirmed + balance.unconfirmed);
    assert_eq!(wallet.balances(AccountFilter::SpecialPurposeOnly).total(), 0);
}

/// Inputs 600 + 400, one 700 payment out, 250 change back: fee 50.
fn sent_wallet(self_payment: bool) -> Wallet {
    let mut wallet = wallet_with_account(3, 1);
    let first = address(&wallet, "account 0", false, 0);
    let second = address(&wallet, "account 0", false, 1);
    let change = address(&wallet, "account 0", true, 0);
    let sent = txid(0xaa);

    wallet
        .record_transaction(&first, confirmed(txid(1), 0, 600, 10))
        .expect("input");
    wallet
        .record_transaction(&second, confirmed(txid(2), 3, 400, 11))
        .expect("input");
    let spending = SpendingRecord::new(sent, vec![payment(Some(0), 700)], 100);
    for outpoint in [OutPoint::new(txid(1), 0), OutPoint::new(txid(2), 3)] {
        assert!(wallet
            .record_spend(&outpoint, spending.clone())
            .expect("spend"));
    }
    wallet
        .record_transaction(&change, TransactionRecord::new(sent, 1, 250, Vec::new(), 100))
        .expect("change");
    if self_payment {
        let own = address(&wallet, "account 0", false, 2);
        wallet
            .record_transaction(&own, TransactionRecord::new(sent, 0, 700, Vec::new(), 100))
            .expect("self payment");
    }
    wallet
}

#[test]
fn sent_transaction_fee_subtracts_payments_and_change() {
    assert_eq!(sent_wallet(false).sent_transaction_fee(&txid(0xaa)), Ok(50));
}

#[test]
fn self_payment_is_not_counted_as_change() {
    assert_eq!(sent_wallet(true).sent_transaction_fee(&txid(0xaa)), Ok(50));
}

#[test]
fn fee_for_unknown_transaction_is_invalid_state() {
    let wallet = sent_wallet(false);
    assert_eq!(
        wallet.sent_transaction_fee(&txid(0xbb)),
        Err(WalletError::NotSentTransaction(txid(0xbb)))
    );
    // A received-only transaction was not sent either.
    assert_eq!(
        wallet.sent_transaction_fee(&txid(1)),
        Err(WalletError::NotSentTransaction(txid(1)))
    );
}

#[test]
fn negative_fee_is_reported_and_logged() {
    enable_capture(4096);
    let mut wallet = wallet_with_account(1, 0);
    let target = address(&wallet, "account 0", false, 0);
    wallet
        .record_transaction(&target, confirmed(txid(1), 0, 100, 1))
        .expect("input");
    wallet
        .record_spend(
            &OutPoint::new(txid(1), 0),
            SpendingRecord::new(txid(0xcc), vec![payment(None, 200)], 5),
        )
        .expect("spend");

    assert_eq!(
        wallet.sent_transaction_fee(&txid(0xcc)),
        Err(WalletError::NegativeFee {
            txid: txid(0xcc),
            fee: -100
        })
    );
    let warned = take_captured()
        .iter()
        .any(|record| record.level == Level::Warn && record.msg.contains("negative fee"));
    assert!(warned);
}

#[test]
fn spend_with_out_of_range_payment_is_rejected() {
    let mut wallet = wallet_with_account(1, 0);
    let target = address(&wallet, "account 0", false, 0);
    let outpoint = OutPoint::new(txid(1), 0);
    wallet
        .record_transaction(&target, confirmed(txid(1), 0, 1_000, 1))
        .expect("input");

    let spending = SpendingRecord::new(
        txid(0xdd),
        vec![payment(Some(0), Amount::MAX), payment(Some(1), 10)],
        5,
    );
    assert_eq!(
        wallet.record_spend(&outpoint, spending),
        Err(WalletError::InvalidAmount(Amount::MAX))
    );
    assert!(wallet.find_address(&target).expect("address").transactions()[0]
        .spending_details
        .is_none());
}

#[test]
fn overflowing_stored_payments_surface_an_error() {
    let mut wallet = wallet_with_account(1, 0);
    let target = address(&wallet, "account 0", false, 0);
    wallet
        .record_transaction(&target, confirmed(txid(1), 0, 1_000, 1))
        .expect("input");
    let spending = SpendingRecord::new(
        txid(0xdd),
        vec![payment(Some(0), 777_777), payment(Some(1), 10)],
        5,
    );
    wallet
        .record_spend(&OutPoint::new(txid(1), 0), spending)
        .expect("spend");

    // Wallet files are not range-checked on load.
    let json = serde_json::to_string(&wallet)
        .expect("serialize")
        .replace("\"amount\":777777", &format!("\"amount\":{}", Amount::MAX));
    let tampered: Wallet = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(
        tampered.sent_transaction_fee(&txid(0xdd)),
        Err(WalletError::AmountOverflow(txid(0xdd)))
    );
}

#[test]
fn spends_are_idempotent_and_never_overwritten() {
    let mut wallet = wallet_with_account(1, 0);
    let target = address(&wallet, "account 0", false, 0);
    let outpoint = OutPoint::new(txid(1), 0);
    wallet
        .record_transaction(&target, confirmed(txid(1), 0, 100, 1))
        .expect("input");

    assert_eq!(
        wallet.record_spend(&OutPoint::new(txid(1), 1), SpendingRecord::default()),
        Ok(false)
    );
    let spend = SpendingRecord::new(txid(2), Vec::new(), 5);
    assert_eq!(wallet.record_spend(&outpoint, spend.clone()), Ok(true));
    let mut mined = spend;
    mined.block_height = Some(6);
    assert_eq!(wallet.record_spend(&outpoint, mined), Ok(true));
    assert_eq!(
        wallet.record_spend(&outpoint, SpendingRecord::new(txid(3), Vec::new(), 7)),
        Err(WalletError::ConflictingSpend(outpoint))
    );

    let record = &wallet.find_address(&target).expect("address").transactions()[0];
    let details = record.spending_details.as_ref().expect("spent");
    assert_eq!(details.transaction_id, Some(txid(2)));
    assert!(details.is_confirmed());
}

#[test]
fn recording_requires_a_wallet_address() {
    let mut wallet = wallet_with_account(1, 0);
    let err = wallet
        .record_transaction("mzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz", confirmed(txid(1), 0, 1, 1))
        .unwrap_err();
    assert!(matches!(err, WalletError::AddressNotFound(_)));

    let target = address(&wallet, "account 0", false, 0);
    wallet
        .record_transaction(&target, confirmed(txid(1), 0, 1, 1))
        .expect("first");
    assert!(matches!(
        wallet.record_transaction(&target, confirmed(txid(1), 0, 1, 1)),
        Err(WalletError::DuplicateEntity(_))
    ));
}

#[test]
fn output_scripts_resolve_to_their_address() {
    let mut wallet = wallet_with_account(2, 1);
    let target = address(&wallet, "account 0", false, 1);
    let owned = wallet.find_address(&target).expect("address").clone();
    let key_hash: [u8; 20] = owned.script_pubkey()[3..23].try_into().expect("key hash");

    for script in [
        owned.script_pubkey().to_vec(),
        owned.pubkey_script().to_vec(),
        p2wpkh_script(&key_hash),
    ] {
        let found = wallet.find_address_by_script(&script).expect("owned script");
        assert_eq!(found.address(), target);
    }
    assert!(wallet.find_address_by_script(&p2pkh_script(&[0x77; 20])).is_none());

    let other = address(&wallet, "account 0", false, 0);
    let mut record = confirmed(txid(1), 0, 10, 1);
    record.script_pubkey = owned.script_pubkey().to_vec();
    assert_eq!(
        wallet.record_transaction(&other, record.clone()),
        Err(WalletError::ScriptMismatch(other.clone()))
    );
    wallet.record_transaction(&target, record).expect("owner");
    assert!(!wallet.find_address(&other).expect("address").is_used());
}

#[test]
fn private_key_export_checks_address_and_password() {
    let wallet = wallet_with_account(2, 0);
    let target = address(&wallet, "account 0", false, 1);
    assert!(wallet.contains_address(&target));

    let xprv = wallet
        .extended_private_key_for_address(&Bip32, PASSWORD, &target)
        .expect("xprv");
    let key = ExtendedPrivateKey::decode(&xprv, NETWORK).expect("decode");
    let derived = p2pkh_address(&pubkey_hash(&key.public_key().serialize()), NETWORK);
    assert_eq!(derived, target);

    assert_eq!(
        wallet.extended_private_key_for_address(&Bip32, "guess", &target),
        Err(WalletError::Key(KeyError::IncorrectPassword))
    );
    let bech32 = wallet
        .find_address(&target)
        .expect("address")
        .bech32_address()
        .to_string();
    // Lookups go by the base58 string only.
    assert!(!wallet.contains_address(&bech32));
    assert_eq!(
        wallet.extended_private_key_for_address(&Bip32, PASSWORD, &bech32),
        Err(WalletError::AddressNotFound(bech32))
    );
}

#[test]
fn watch_only_account_tracks_but_cannot_export() {
    let mut source = wallet_with_account(0, 0);
    source
        .add_new_account(&Bip32, PASSWORD, 0, None, None)
        .expect("second account");
    let xpub = source
        .account("account 1")
        .expect("account")
        .extended_pub_key()
        .to_string();

    let mut wallet = wallet();
    wallet
        .add_watch_only_account(&xpub, 1, Some("watch"), 0)
        .expect("watch-only");
    assert!(matches!(
        wallet.add_watch_only_account(&xpub, 2, Some("watch 2"), 0),
        Err(WalletError::DuplicateEntity(_))
    ));
    let created = wallet
        .create_addresses(&Bip32, "watch", 1, false)
        .expect("addresses")[0]
        .address()
        .to_string();

    source
        .create_addresses(&Bip32, "account 1", 1, false)
        .expect("addresses");
    assert_eq!(created, address(&source, "account 1", false, 0));
    assert_eq!(
        wallet.extended_private_key_for_address(&Bip32, PASSWORD, &created),
        Err(WalletError::WatchOnlyAccount("watch".to_string()))
    );
}

#[test]
fn iterators_reflect_live_state() {
    let mut wallet = wallet_with_account(2, 2);
    assert_eq!(wallet.all_addresses(AccountFilter::All).count(), 4);
    assert_eq!(wallet.all_pub_keys(AccountFilter::All).count(), 4);
    assert!(wallet
        .all_pub_keys(AccountFilter::All)
        .all(|script| script.len() == 35 && script[34] == 0xac));
    assert_eq!(wallet.all_transactions(AccountFilter::All).count(), 0);

    let target = address(&wallet, "account 0", true, 1);
    wallet
        .record_transaction(&target, confirmed(txid(5), 0, 9, 2))
        .expect("record");
    let ids: Vec<Hash256> = wallet
        .all_transactions(AccountFilter::All)
        .map(|tx| tx.id)
        .collect();
    assert_eq!(ids, vec![txid(5)]);
}

#[test]
fn config_drives_address_buffer_and_minconf() {
    let config = WalletConfig {
        network: NETWORK,
        min_confirmations: 2,
        address_buffer: 3,
        ..WalletConfig::default()
    };
    let mut wallet = wallet_with_account(0, 0);
    assert_eq!(
        wallet
            .top_up_addresses(&Bip32, "account 0", &config)
            .expect("top up"),
        6
    );
    assert_eq!(
        wallet
            .top_up_addresses(&Bip32, "account 0", &config)
            .expect("top up"),
        0
    );

    let receive = address(&wallet, "account 0", false, 0);
    let change = address(&wallet, "account 0", true, 0);
    wallet
        .record_transaction(&receive, confirmed(txid(1), 0, 10, 10))
        .expect("deep");
    wallet
        .record_transaction(&change, confirmed(txid(2), 0, 20, 11))
        .expect("shallow");
    let outputs = wallet.spendable_outputs(11, &config);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].confirmations, 2);
    assert_eq!(outputs[0].amount(), 10);
}

#[test]
fn address_buffer_is_topped_up() {
    let mut wallet = wallet_with_account(0, 0);
    assert_eq!(
        wallet
            .ensure_unused_addresses(&Bip32, "account 0", 20, false)
            .expect("ensure"),
        20
    );
    let target = address(&wallet, "account 0", false, 0);
    wallet
        .record_transaction(&target, confirmed(txid(1), 0, 1, 1))
        .expect("record");
    assert_eq!(
        wallet
            .ensure_unused_addresses(&Bip32, "account 0", 20, false)
            .expect("ensure"),
        1
    );
}

#[test]
fn generated_wallet_roundtrips_through_store() {
    let mut wallet = Wallet::generate("fresh", PASSWORD, NETWORK, 42, KdfParams::MINIMAL)
        .expect("generate");
    wallet
        .add_new_account(&Bip32, PASSWORD, 43, None, None)
        .expect("account");
    wallet
        .create_addresses(&Bip32, "account 0", 2, false)
        .expect("addresses");
    let target = address(&wallet, "account 0", false, 1);
    let mut record = confirmed(txid(3), 2, 77, 8);
    record.block_hash = Some(txid(4));
    record.spending_details = Some(SpendingRecord::new(
        txid(5),
        vec![payment(Some(0), 70)],
        9,
    ));
    wallet.record_transaction(&target, record).expect("record");
    wallet.set_last_synced_details(8, txid(4));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wallet.json");
    save_wallet(&path, &wallet).expect("save");
    let loaded = load_wallet(&path, NETWORK).expect("load").expect("present");
    assert_eq!(loaded, wallet);
    assert_eq!(loaded.last_synced_height(), Some(8));
    assert_eq!(loaded.sent_transaction_fee(&txid(5)), Ok(7));
}
