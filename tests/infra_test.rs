// tests/infra_test.rs

use std::cell::Cell;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use dice_economy::domain::{BetKind, EntryKind, Memo, Role, Tokens};
use dice_economy::engine::{EngineError, RandomSource};
use dice_economy::infra::ids::period_timestamp;
use dice_economy::infra::{
    ConfigError, DeterministicRng, EconomyConfig, IdGenerator, InMemorySink, JsonFileSink,
    PayoutConfig, PersistenceError, PersistenceSink, PersistenceWorker, ScriptedRng, SystemRng,
};
use dice_economy::{CasinoService, CasinoState, LedgerSnapshot};

//
// ---------- helpers ----------
//

fn temp_file(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "dice-economy-{}-{name}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

/// Медленное хранилище: очередь снапшотов успевает переполниться.
#[derive(Clone, Default)]
struct SlowSink {
    inner: InMemorySink,
}

impl PersistenceSink for SlowSink {
    fn save(&mut self, snapshot: &LedgerSnapshot) -> Result<(), PersistenceError> {
        std::thread::sleep(Duration::from_millis(50));
        self.inner.save(snapshot)
    }
}

//
// ---------- IdGenerator ----------
//

#[test]
fn period_id_has_timestamp_prefix_and_suffix() {
    let mut ids = IdGenerator::from_seed(1);
    let now = Utc.with_ymd_and_hms(2024, 2, 29, 13, 5, 9).unwrap();
    let id = ids.next_period_id(now, |_| false).unwrap();

    assert_eq!(id.len(), 18);
    assert!(id.starts_with("20240229130509"));
    assert!(id[14..]
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
}

#[test]
fn period_id_retries_on_collision() {
    let mut ids = IdGenerator::from_seed(2);
    let attempts = Cell::new(0);
    let id = ids
        .next_period_id(Utc::now(), |_| {
            attempts.set(attempts.get() + 1);
            attempts.get() <= 3
        })
        .unwrap();
    assert_eq!(attempts.get(), 4);
    assert_eq!(id.len(), 18);
}

#[test]
fn id_generation_gives_up_after_bounded_attempts() {
    let mut ids = IdGenerator::from_seed(3).with_max_attempts(5);
    let attempts = Cell::new(0);
    let err = ids
        .next_account_id(|_| {
            attempts.set(attempts.get() + 1);
            true
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::Internal(_)));
    assert_eq!(attempts.get(), 5);
}

#[test]
fn period_timestamp_reads_issue_time() {
    let now = Utc.with_ymd_and_hms(2024, 2, 29, 13, 5, 9).unwrap();
    let id = IdGenerator::from_seed(4).next_period_id(now, |_| false).unwrap();
    assert_eq!(period_timestamp(&id), Some(now));

    assert_eq!(period_timestamp("HOUSE"), None);
    assert_eq!(period_timestamp("20241399000000ABCD"), None);
    assert_eq!(period_timestamp("20240101000000ABCDE"), None);
}

#[test]
fn account_id_is_eight_alphanumerics() {
    let mut ids = IdGenerator::new();
    for _ in 0..100 {
        let id = ids.next_account_id(|_| false).unwrap();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

#[test]
fn same_seed_same_ids() {
    let now = Utc::now();
    let mut a = IdGenerator::from_seed(42);
    let mut b = IdGenerator::from_seed(42);
    assert_eq!(
        a.next_period_id(now, |_| false).unwrap(),
        b.next_period_id(now, |_| false).unwrap()
    );
}

//
// ---------- RNG ----------
//

#[test]
fn deterministic_rng_same_seed_same_sequence() {
    let mut r1 = DeterministicRng::from_seed(123);
    let mut r2 = DeterministicRng::from_seed(123);
    let a: Vec<u8> = (0..30).map(|_| r1.roll_die()).collect();
    let b: Vec<u8> = (0..30).map(|_| r2.roll_die()).collect();
    assert_eq!(a, b);
    assert!(a.iter().all(|d| (1..=6).contains(d)));
}

#[test]
fn system_rng_stays_in_range() {
    let mut rng = SystemRng;
    for _ in 0..500 {
        assert!((1..=6).contains(&rng.roll_die()));
        assert!((10..=20).contains(&rng.range_inclusive(10, 20)));
        assert!(rng.pick_index(3) < 3);
    }
    assert_eq!(rng.range_inclusive(7, 7), 7);
    assert_eq!(rng.pick_index(0), 0);

    let mut v: Vec<u32> = Vec::new();
    rng.shuffle(&mut v);
    assert!(v.is_empty());
}

#[test]
fn scripted_rng_replays_dice_then_falls_back() {
    let mut rng = ScriptedRng::new([4, 4, 3]).with_picks([5]);
    assert_eq!(rng.roll_die(), 4);
    assert_eq!(rng.roll_die(), 4);
    assert_eq!(rng.roll_die(), 3);
    assert_eq!(rng.remaining_dice(), 0);
    assert!((1..=6).contains(&rng.roll_die()));

    // индекс обрезается до длины
    assert_eq!(rng.pick_index(2), 1);

    rng.push_dice([6]);
    assert_eq!(rng.roll_die(), 6);
}

//
// ---------- конфиг ----------
//

#[test]
fn default_config_matches_original_limits() {
    let config = EconomyConfig::default();
    assert_eq!(config.starting_balance, Tokens(1_000));
    assert_eq!(config.max_total_stake, Tokens(1_000_000));
    assert_eq!(config.payout, PayoutConfig::Classic);
    assert!(config.house_bootstrap.is_none());
    config.validate().unwrap();
}

#[test]
fn yaml_config_overrides_fields() {
    let yaml = r#"
starting_balance: 500
max_total_stake: 10000
admins: [root, ops]
house_bootstrap:
  display_name: Казино
  float: 250000
payout:
  preset: odds_weighted
  edge_bps: 300
data_file: /tmp/ledger.json
"#;
    let config = EconomyConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.starting_balance, Tokens(500));
    assert_eq!(config.max_total_stake, Tokens(10_000));
    assert_eq!(config.admins, vec!["root".to_string(), "ops".to_string()]);

    let house = config.house_bootstrap.clone().unwrap();
    assert_eq!(house.account_id, "HOUSE");
    assert_eq!(house.display_name, "Казино");
    assert_eq!(house.float, Tokens(250_000));

    let rules = config.session_rules();
    assert_eq!(rules.max_total_stake, Tokens(10_000));
    assert_eq!(rules.payout.multiplier_for(BetKind::Big).hundredths(), 194);
    assert_eq!(config.data_file, Some(PathBuf::from("/tmp/ledger.json")));
}

#[test]
fn invalid_config_is_rejected() {
    assert!(matches!(
        EconomyConfig::from_yaml_str("max_total_stake: 0"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        EconomyConfig::from_yaml_str("persistence_buffer: 0"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        EconomyConfig::from_yaml_str("starting_balance: [1, 2]"),
        Err(ConfigError::Yaml(_))
    ));
    assert!(matches!(
        EconomyConfig::load("/definitely/not/here.yaml"),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn custom_payout_schema_must_be_complete() {
    let yaml = r#"
payout:
  preset: custom
  schema:
    big: 200
    small: 200
    odd: 200
    even: 200
    big_odd: 400
    big_even: 400
    small_odd: 400
    small_even: 400
    totals: {3: 1000, 4: 500}
"#;
    assert!(matches!(
        EconomyConfig::from_yaml_str(yaml),
        Err(ConfigError::Payout(_))
    ));
}

//
// ---------- хранение ----------
//

#[test]
fn json_sink_missing_file_is_first_start() {
    let sink = JsonFileSink::new(temp_file("missing"));
    assert!(sink.load().unwrap().is_none());
}

#[test]
fn json_sink_round_trip_restores_balances_and_history() {
    let path = temp_file("roundtrip");
    let sink = JsonFileSink::new(&path);

    let config = EconomyConfig {
        house_bootstrap: Some(Default::default()),
        ..EconomyConfig::default()
    };
    let svc = CasinoService::with_sink(
        config.clone(),
        ScriptedRng::new([4, 4, 3]),
        IdGenerator::from_seed(5),
        None,
        sink.clone(),
    )
    .unwrap();

    let alice = svc.resolve_account("chat:alice", "Alice").unwrap();
    svc.ensure_account("bob", "Bob").unwrap();
    svc.open_session(
        &alice,
        vec![dice_economy::domain::Bet::new(BetKind::Big, Tokens(100)).unwrap()],
    )
    .unwrap();
    svc.roll_dice(&alice, 3).unwrap();
    let envelope = svc.create_private_envelope(&alice, "bob", Tokens(10)).unwrap();

    let expected = svc.snapshot();
    svc.shutdown();

    let loaded = sink.load().unwrap().expect("снапшот записан");
    assert_eq!(loaded, expected);
    assert!(loaded.live_ids.contains(&envelope.id));

    // второй запуск из файла: бутстрап банка не повторяется
    let restored = CasinoService::with_sink(
        config,
        ScriptedRng::new(Vec::new()),
        IdGenerator::from_seed(6),
        Some(loaded),
        InMemorySink::new(),
    )
    .unwrap();
    // 1000 - 100 + 197 - 10
    assert_eq!(restored.balance_of(&alice).unwrap(), Tokens(1_087));
    assert_eq!(restored.history_of(&alice).unwrap(), *expected.history[&alice]);
    assert_eq!(restored.resolve_account("chat:alice", "Alice").unwrap(), alice);
    assert_eq!(restored.current_house().as_deref(), Some("HOUSE"));
    assert!(restored.envelope(&envelope.id).is_some());
    restored.verify().unwrap();

    let _ = std::fs::remove_file(&path);
}

#[test]
fn worker_writes_every_submitted_snapshot() {
    let sink = InMemorySink::new();
    let mut worker = PersistenceWorker::spawn(sink.clone(), 16).unwrap();

    let mut state = CasinoState::default();
    state
        .ledger
        .get_or_create("alice", "Alice", Tokens(10), Utc::now())
        .unwrap();
    worker.submit(state.snapshot());
    worker.submit(LedgerSnapshot::default());
    worker.shutdown();

    assert_eq!(sink.count(), 2);
    assert_eq!(sink.latest(), Some(LedgerSnapshot::default()));
}

#[test]
fn service_persists_after_each_successful_mutation() {
    let sink = InMemorySink::new();
    let svc = CasinoService::with_sink(
        EconomyConfig::default(),
        SystemRng,
        IdGenerator::new(),
        None,
        sink.clone(),
    )
    .unwrap();

    svc.ensure_account("alice", "Alice").unwrap();
    svc.ensure_account("bob", "Bob").unwrap();
    // отказ не пишет снапшот
    assert!(svc.designate_house("ghost").is_err());
    svc.designate_house("alice").unwrap();
    svc.shutdown();

    // три изменения + финальный снапшот при остановке
    assert_eq!(sink.count(), 4);
    let last = sink.latest().unwrap();
    assert_eq!(last.house_account_id.as_deref(), Some("alice"));
    assert_eq!(last.accounts.len(), 2);
}

#[test]
fn shutdown_persists_latest_state_when_queue_overflowed() {
    let sink = SlowSink::default();
    let config = EconomyConfig {
        persistence_buffer: 1,
        ..EconomyConfig::default()
    };
    let svc = CasinoService::with_sink(config, SystemRng, IdGenerator::new(), None, sink.clone())
        .unwrap();

    for id in ["a", "b", "c", "d", "e"] {
        svc.ensure_account(id, id).unwrap();
    }
    let expected = svc.snapshot();
    svc.shutdown();

    let last = sink.inner.latest().unwrap();
    assert_eq!(last.accounts.len(), 5);
    assert_eq!(last, expected);
}

#[test]
fn stale_reserved_ids_are_pruned() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let snapshot = LedgerSnapshot {
        live_ids: vec![
            "20240601110000AAAA".into(),
            "20240530120000BBBB".into(),
            "garbage".into(),
        ],
        ..LedgerSnapshot::default()
    };
    let mut state = CasinoState::restore(snapshot, Default::default(), Vec::new()).unwrap();
    assert!(state.is_live_id("20240530120000BBBB"));

    assert_eq!(state.prune_reserved_ids(now), 2);
    assert!(state.is_live_id("20240601110000AAAA"));
    assert!(!state.is_live_id("20240530120000BBBB"));
    assert_eq!(state.live_ids(), vec!["20240601110000AAAA".to_string()]);
}

#[test]
fn snapshot_shares_history_with_ledger() {
    let mut state = CasinoState::default();
    state
        .ledger
        .get_or_create("alice", "Alice", Tokens(10), Utc::now())
        .unwrap();
    let snapshot = state.snapshot();
    assert!(std::sync::Arc::ptr_eq(
        &snapshot.history["alice"],
        &state.ledger.histories()["alice"]
    ));

    // запись после снапшота не меняет уже снятую историю
    let memo = Memo::new(Role::System, EntryKind::Opening, "alice", "бонус", Utc::now());
    state.ledger.credit("alice", Tokens(5), memo).unwrap();
    assert_eq!(snapshot.history["alice"].len(), 1);
    assert_eq!(state.ledger.history_of("alice").len(), 2);
}

#[test]
fn tampered_snapshot_is_refused() {
    let mut state = CasinoState::default();
    state
        .ledger
        .get_or_create("alice", "Alice", Tokens(10), Utc::now())
        .unwrap();
    let mut snapshot = state.snapshot();
    snapshot.accounts.get_mut("alice").unwrap().balance = Tokens(1_000_000);

    let err = CasinoState::restore(snapshot, Default::default(), Vec::new()).unwrap_err();
    assert!(err.is_fatal());

    let orphan_house = LedgerSnapshot {
        house_account_id: Some("ghost".into()),
        ..LedgerSnapshot::default()
    };
    assert!(CasinoState::restore(orphan_house, Default::default(), Vec::new()).is_err());
}

#[test]
fn json_sink_overwrites_atomically() {
    let path = temp_file("overwrite");
    let mut sink = JsonFileSink::new(&path);
    let mut snapshot = LedgerSnapshot::default();
    sink.save(&snapshot).unwrap();
    snapshot.live_ids.push("20240101000000ABCD".into());
    sink.save(&snapshot).unwrap();

    assert_eq!(sink.load().unwrap(), Some(snapshot));
    let mut tmp = path.clone().into_os_string();
    tmp.push(".tmp");
    assert!(!PathBuf::from(tmp).exists());
    let _ = std::fs::remove_file(&path);
}
