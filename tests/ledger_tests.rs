// tests/ledger_tests.rs
//
// Леджер: проводки, история, сверка.

use chrono::Utc;

use dice_economy::domain::{EntryKind, Memo, Role, Tokens};
use dice_economy::engine::{EngineError, ErrorKind, LedgerStore};

fn memo(kind: EntryKind, text: &str) -> Memo {
    Memo::new(Role::Player, kind, "20240101000000TEST", text, Utc::now())
}

fn ledger_with(id: &str, starting: u64) -> LedgerStore {
    let mut ledger = LedgerStore::new();
    ledger
        .get_or_create(id, id, Tokens(starting), Utc::now())
        .unwrap();
    ledger
}

#[test]
fn opening_balance_is_booked_as_system_record() {
    let ledger = ledger_with("alice", 1_000);
    assert_eq!(ledger.balance_of("alice").unwrap(), Tokens(1_000));

    let history = ledger.history_of("alice");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::System);
    assert_eq!(history[0].kind, EntryKind::Opening);
    assert_eq!(history[0].points_delta, 1_000);
    ledger.verify().unwrap();
}

#[test]
fn zero_starting_balance_has_no_history() {
    let ledger = ledger_with("bob", 0);
    assert!(ledger.history_of("bob").is_empty());
    ledger.verify().unwrap();
}

#[test]
fn get_or_create_is_idempotent() {
    let mut ledger = ledger_with("alice", 1_000);
    ledger
        .debit("alice", Tokens(300), memo(EntryKind::Stake, "ставка"))
        .unwrap();
    let again = ledger
        .get_or_create("alice", "Другое имя", Tokens(1_000), Utc::now())
        .unwrap();
    assert_eq!(again.balance, Tokens(700));
    assert_eq!(again.display_name, "alice");
}

#[test]
fn balance_equals_sum_of_deltas() {
    let mut ledger = ledger_with("alice", 500);
    let ops: [(bool, u64); 6] = [(true, 10), (false, 200), (true, 7), (false, 300), (true, 1), (false, 18)];

    let mut expected: i64 = 500;
    for (is_credit, amount) in ops {
        let result = if is_credit {
            expected += amount as i64;
            ledger.credit("alice", Tokens(amount), memo(EntryKind::Winnings, "+"))
        } else {
            expected -= amount as i64;
            ledger.debit("alice", Tokens(amount), memo(EntryKind::Stake, "-"))
        };
        assert_eq!(result.unwrap(), Tokens(expected as u64));
    }

    let sum: i64 = ledger.history_of("alice").iter().map(|r| r.points_delta).sum();
    assert_eq!(sum, expected);
    assert_eq!(ledger.history_of("alice").last().unwrap().resulting_balance, Tokens(expected as u64));
    ledger.verify().unwrap();
}

#[test]
fn insufficient_debit_changes_nothing() {
    let mut ledger = ledger_with("alice", 100);
    let err = ledger
        .debit("alice", Tokens(101), memo(EntryKind::Stake, "слишком много"))
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::InsufficientFunds {
            account_id: "alice".into(),
            required: Tokens(101),
            available: Tokens(100),
        }
    );
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(ledger.balance_of("alice").unwrap(), Tokens(100));
    assert_eq!(ledger.history_of("alice").len(), 1);
}

#[test]
fn zero_amount_is_validation_error() {
    let mut ledger = ledger_with("alice", 100);
    let err = ledger
        .credit("alice", Tokens::ZERO, memo(EntryKind::Winnings, "ноль"))
        .unwrap_err();
    assert_eq!(err, EngineError::NonPositiveAmount);
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn unknown_account_is_not_found() {
    let mut ledger = LedgerStore::new();
    let err = ledger
        .credit("ghost", Tokens(1), memo(EntryKind::Winnings, "?"))
        .unwrap_err();
    assert_eq!(err, EngineError::AccountNotFound("ghost".into()));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(ledger.balance_of("ghost").is_err());
    assert!(ledger.history_of("ghost").is_empty());
}

#[test]
fn memo_fields_land_in_history() {
    let mut ledger = ledger_with("alice", 100);
    let m = Memo::new(Role::Player, EntryKind::Stake, "PERIOD1", "ставка BIG", Utc::now())
        .with_bet_amount(Tokens(40));
    ledger.debit("alice", Tokens(40), m).unwrap();

    let record = ledger.history_of("alice").last().unwrap().clone();
    assert_eq!(record.correlation_id, "PERIOD1");
    assert_eq!(record.description, "ставка BIG");
    assert_eq!(record.points_delta, -40);
    assert_eq!(record.resulting_balance, Tokens(60));
    assert_eq!(record.bet_amount, Some(Tokens(40)));
}

#[test]
fn amount_beyond_history_range_is_ledger_corruption() {
    let mut ledger = ledger_with("whale", 10);
    let err = ledger
        .credit("whale", Tokens(u64::MAX), memo(EntryKind::Winnings, "max"))
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(ledger.balance_of("whale").unwrap(), Tokens(10));
    assert_eq!(ledger.history_of("whale").len(), 1);
}

#[test]
fn external_ids_resolve_to_same_account() {
    let mut ledger = LedgerStore::new();
    let first = ledger
        .register_external("chat:42", "Ab3dEf9h".into(), "Вася", Tokens(1_000), Utc::now())
        .unwrap();
    let second = ledger
        .register_external("chat:42", "Zz000000".into(), "Вася", Tokens(1_000), Utc::now())
        .unwrap();

    assert_eq!(first, "Ab3dEf9h");
    assert_eq!(second, first);
    assert_eq!(ledger.lookup_external("chat:42"), Some(&first));
    assert!(!ledger.contains("Zz000000"));
    assert_eq!(ledger.account(&first).unwrap().external_id.as_deref(), Some("chat:42"));
    assert_eq!(ledger.total_supply(), 1_000);
}

#[test]
fn verify_detects_tampered_balance() {
    let ledger = ledger_with("alice", 100);
    let mut accounts = ledger.accounts().clone();
    accounts.get_mut("alice").unwrap().balance = Tokens(5_000);

    let tampered = LedgerStore::from_parts(
        accounts,
        ledger.external_index().clone(),
        ledger.histories().clone(),
    );
    assert!(matches!(tampered.verify(), Err(EngineError::LedgerCorrupted(_))));
}
