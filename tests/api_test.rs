// tests/api_test.rs

use dice_economy::api::{
    build_history_summary, ApiError, BetDto, Command, CommandResponse, EnvelopeCommand,
    OpenSessionCommand, Query, QueryResponse,
};
use dice_economy::domain::{EnvelopeStatus, Tokens};
use dice_economy::engine::{CancelOutcome, EngineError};
use dice_economy::infra::{EconomyConfig, HouseBootstrap, IdGenerator, ScriptedRng};
use dice_economy::CasinoService;

fn service(dice: &[u8]) -> CasinoService<ScriptedRng> {
    let config = EconomyConfig {
        house_bootstrap: Some(HouseBootstrap::default()),
        admins: vec!["admin".into()],
        ..EconomyConfig::default()
    };
    let svc = CasinoService::in_memory(config, ScriptedRng::new(dice.to_vec()), IdGenerator::from_seed(9))
        .unwrap();
    svc.execute(Command::EnsureAccount {
        account_id: "alice".into(),
        display_name: "Alice".into(),
    })
    .unwrap();
    svc
}

fn open(account_id: &str, bets: Vec<BetDto>) -> Command {
    Command::OpenSession(OpenSessionCommand {
        account_id: account_id.into(),
        bets,
    })
}

#[test]
fn engine_errors_map_by_kind() {
    assert!(matches!(ApiError::from(EngineError::ZeroDice), ApiError::BadRequest(_)));
    assert!(matches!(ApiError::from(EngineError::NoHouse), ApiError::Conflict(_)));
    assert!(matches!(
        ApiError::from(EngineError::AccountNotFound("x".into())),
        ApiError::NotFound(_)
    ));
    assert!(matches!(
        ApiError::from(EngineError::NotAdmin("x".into())),
        ApiError::Forbidden(_)
    ));
    assert!(matches!(
        ApiError::from(EngineError::HouseCannotCover {
            required: Tokens(2),
            available: Tokens(1)
        }),
        ApiError::InsufficientFunds(_)
    ));
    let err = ApiError::from(EngineError::LedgerCorrupted("boom".into()));
    assert!(matches!(err, ApiError::Internal(_)));
    assert!(err.message().contains("boom"));
}

#[test]
fn resolve_account_creates_once() {
    let svc = service(&[]);
    let first = svc
        .execute(Command::ResolveAccount {
            external_id: "qq:777".into(),
            display_name: "Гость".into(),
        })
        .unwrap();
    let CommandResponse::Account(first) = first else {
        panic!("ожидали Account");
    };
    assert_eq!(first.account_id.len(), 8);
    assert_eq!(first.balance, Tokens(1_000));
    assert!(!first.is_house);

    let second = svc
        .execute(Command::ResolveAccount {
            external_id: "qq:777".into(),
            display_name: "Гость".into(),
        })
        .unwrap();
    let CommandResponse::Account(second) = second else {
        panic!("ожидали Account");
    };
    assert_eq!(second.account_id, first.account_id);
}

#[test]
fn game_through_commands() {
    let svc = service(&[4, 4, 3]);

    let opened = svc
        .execute(open("alice", vec![BetDto::new("BIG", 100), BetDto::new("total-7", 50)]))
        .unwrap();
    let CommandResponse::SessionOpened(opened) = opened else {
        panic!("ожидали SessionOpened");
    };

    let QueryResponse::Session(Some(session)) = svc
        .query(Query::ActiveSession {
            account_id: "alice".into(),
        })
        .unwrap()
    else {
        panic!("ожидали активную игру");
    };
    assert_eq!(session.correlation_id, opened.correlation_id);
    assert_eq!(session.bets[1].kind, "TOTAL-7");

    let rolled = svc
        .execute(Command::RollDice {
            account_id: "alice".into(),
            count: 3,
        })
        .unwrap();
    let CommandResponse::Rolled(outcome) = rolled else {
        panic!("ожидали Rolled");
    };
    assert_eq!(outcome.settlement.unwrap().total, 11);

    let QueryResponse::Account(account) = svc
        .query(Query::Account {
            account_id: "alice".into(),
        })
        .unwrap()
    else {
        panic!("ожидали Account");
    };
    assert_eq!(account.balance, Tokens(1_047));
}

#[test]
fn unknown_bet_kind_is_bad_request() {
    let svc = service(&[]);
    let err = svc.execute(open("alice", vec![BetDto::new("HUGE", 10)])).unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let err = svc.execute(open("alice", vec![BetDto::new("TOTAL-2", 10)])).unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[test]
fn cancel_through_commands() {
    let svc = service(&[]);
    svc.execute(open("alice", vec![BetDto::new("ODD", 30)])).unwrap();
    let response = svc
        .execute(Command::CancelSession {
            account_id: "alice".into(),
        })
        .unwrap();
    assert!(matches!(
        response,
        CommandResponse::Cancelled(CancelOutcome::Refunded { .. })
    ));
}

#[test]
fn envelope_commands_and_queries() {
    let svc = service(&[]);
    svc.execute(Command::EnsureAccount {
        account_id: "bob".into(),
        display_name: "Bob".into(),
    })
    .unwrap();

    let CommandResponse::EnvelopeCreated(created) = svc
        .execute(Command::Envelope(EnvelopeCommand::CreatePublic {
            sender: "alice".into(),
            total: Tokens(30),
            recipients: 3,
        }))
        .unwrap()
    else {
        panic!("ожидали EnvelopeCreated");
    };
    assert_eq!(created.share_count, 3);
    assert_eq!(created.status, EnvelopeStatus::Pending);
    assert_eq!(created.target, None);

    let CommandResponse::EnvelopesConfirmed { envelope_ids } = svc
        .execute(Command::Envelope(EnvelopeCommand::ConfirmAll {
            sender: "alice".into(),
        }))
        .unwrap()
    else {
        panic!("ожидали EnvelopesConfirmed");
    };
    assert_eq!(envelope_ids, vec![created.envelope_id.clone()]);

    svc.execute(Command::Envelope(EnvelopeCommand::Claim {
        envelope_id: created.envelope_id.clone(),
        claimant: "bob".into(),
    }))
    .unwrap();

    let QueryResponse::Envelope(view) = svc
        .query(Query::Envelope {
            envelope_id: created.envelope_id.clone(),
        })
        .unwrap()
    else {
        panic!("ожидали Envelope");
    };
    assert_eq!(view.claimed_count, 1);
    assert_eq!(view.status, EnvelopeStatus::Sent);

    let err = svc
        .execute(Command::Envelope(EnvelopeCommand::Revoke {
            envelope_id: created.envelope_id,
            requester: "admin".into(),
        }))
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let err = svc
        .query(Query::Envelope {
            envelope_id: "NOPE".into(),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn history_query_respects_limit() {
    let svc = service(&[]);
    svc.execute(open("alice", vec![BetDto::new("BIG", 10), BetDto::new("EVEN", 10)]))
        .unwrap();

    let QueryResponse::History(all) = svc
        .query(Query::History {
            account_id: "alice".into(),
            limit: None,
        })
        .unwrap()
    else {
        panic!("ожидали History");
    };
    assert_eq!(all.len(), 3);

    let QueryResponse::History(last) = svc
        .query(Query::History {
            account_id: "alice".into(),
            limit: Some(2),
        })
        .unwrap()
    else {
        panic!("ожидали History");
    };
    assert_eq!(last, all[1..].to_vec());
}

#[test]
fn house_query() {
    let svc = service(&[]);
    let QueryResponse::House(Some(house)) = svc.query(Query::CurrentHouse).unwrap() else {
        panic!("ожидали банк");
    };
    assert_eq!(house.account_id, "HOUSE");
    assert!(house.is_house);
    assert_eq!(house.balance, Tokens(1_000_000));

    svc.execute(Command::VacateHouse {
        requester: "HOUSE".into(),
    })
    .unwrap();
    assert!(matches!(
        svc.query(Query::CurrentHouse).unwrap(),
        QueryResponse::House(None)
    ));
}

#[test]
fn history_summary_counts_games() {
    // игра 1: [4,4,3] BIG выигрывает; игра 2: [1,1,1] BIG проигрывает; игра 3 отменена
    let svc = service(&[4, 4, 3, 1, 1, 1]);
    for _ in 0..2 {
        svc.execute(open("alice", vec![BetDto::new("BIG", 100)])).unwrap();
        svc.execute(Command::RollDice {
            account_id: "alice".into(),
            count: 3,
        })
        .unwrap();
    }
    svc.execute(open("alice", vec![BetDto::new("SMALL", 40)])).unwrap();
    svc.execute(Command::CancelSession {
        account_id: "alice".into(),
    })
    .unwrap();

    let QueryResponse::HistorySummary(summary) = svc
        .query(Query::HistorySummary {
            account_id: "alice".into(),
        })
        .unwrap()
    else {
        panic!("ожидали HistorySummary");
    };
    assert_eq!(summary.games_played, 2);
    assert_eq!(summary.games_won, 1);
    assert_eq!(summary.games_lost, 1);
    assert_eq!(summary.games_cancelled, 1);
    assert_eq!(summary.total_staked, Tokens(200));
    assert_eq!(summary.total_returned, Tokens(197));
    assert_eq!(summary.net_profit, -3);
    assert!((summary.win_rate - 50.0).abs() < f64::EPSILON);

    let direct = build_history_summary("alice", &svc.history_of("alice").unwrap());
    assert_eq!(direct, summary);
}

#[test]
fn commands_round_trip_through_json() {
    let command = Command::Envelope(EnvelopeCommand::CreatePrivate {
        sender: "alice".into(),
        target: "bob".into(),
        amount: Tokens(5),
    });
    let raw = serde_json::to_string(&command).unwrap();
    let back: Command = serde_json::from_str(&raw).unwrap();
    assert!(matches!(
        back,
        Command::Envelope(EnvelopeCommand::CreatePrivate { amount: Tokens(5), .. })
    ));
}
