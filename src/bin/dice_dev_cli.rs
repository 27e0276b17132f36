// src/bin/dice_dev_cli.rs

use std::env;
use std::process::ExitCode;

use dice_economy::api::{build_history_summary, EnvelopeDto};
use dice_economy::domain::{Bet, BetKind, Tokens};
use dice_economy::engine::{BetResult, EngineError};
use dice_economy::infra::{init_tracing, EconomyConfig, HouseBootstrap, IdGenerator, ScriptedRng};
use dice_economy::CasinoService;

fn main() -> ExitCode {
    init_tracing(tracing::Level::INFO);
    println!("dice_dev_cli: стартуем dev-CLI экономики…");

    // 1. Конфиг: из файла (первый аргумент) или дефолтный с банком.
    let config = match env::args().nth(1) {
        Some(path) => match EconomyConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Ошибка конфига {path}: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => EconomyConfig {
            house_bootstrap: Some(HouseBootstrap::default()),
            admins: vec!["admin".to_string()],
            ..EconomyConfig::default()
        },
    };

    // 2. Кубики заранее: [4, 4, 3] -> сумма 11.
    let rng = ScriptedRng::new([4, 4, 3]);
    let service = match CasinoService::in_memory(config, rng, IdGenerator::new()) {
        Ok(service) => service,
        Err(err) => {
            eprintln!("Не удалось запустить сервис: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = run(&service) {
        eprintln!("Ошибка: {err}");
        return ExitCode::FAILURE;
    }

    service.shutdown();
    ExitCode::SUCCESS
}

fn run(service: &CasinoService<ScriptedRng>) -> Result<(), EngineError> {
    let alice = service.resolve_account("chat:alice", "Alice")?;
    let bob = service.resolve_account("chat:bob", "Bob")?;
    service.ensure_account("admin", "Admin")?;

    println!();
    println!("================ GAME =================");
    println!("Банк: {:?}", service.current_house());

    let bets = vec![
        Bet::new(BetKind::Big, Tokens(100))?,
        Bet::new(BetKind::total(7)?, Tokens(50))?,
    ];
    let opened = service.open_session(&alice, bets)?;
    println!(
        "Alice открыла игру {}: ставка {}, баланс {}",
        opened.correlation_id, opened.total_stake, opened.balance_after
    );

    let first = service.roll_dice(&alice, 1)?;
    println!("Бросок: {:?}", first.new_dice);
    let rest = service.roll_dice(&alice, 2)?;
    println!("Бросок: {:?}", rest.new_dice);

    if let Some(report) = rest.settlement {
        println!("Сумма: {}", report.total);
        for outcome in &report.outcomes {
            let verdict = match &outcome.result {
                BetResult::Won { winnings, .. } => format!("выигрыш {winnings}"),
                BetResult::Lost => "проигрыш".to_string(),
                BetResult::StakeReturned { stake, .. } => format!("возврат {stake}"),
            };
            println!("  {} {} -> {verdict}", outcome.bet.kind, outcome.bet.stake);
        }
        println!(
            "Баланс Alice: {}, банк: {}",
            report.player_balance, report.house_balance
        );
    }

    println!();
    println!("================ ENVELOPE =================");
    let envelope = service.create_public_envelope(&alice, Tokens(100), 3)?;
    service.confirm_envelope(&alice, &envelope.id)?;
    let receipt = service.claim_envelope(&envelope.id, &bob)?;
    println!("Bob получил {} из конверта {}", receipt.amount, envelope.id);
    if let Some(current) = service.envelope(&envelope.id) {
        println!("{:?}", EnvelopeDto::from(&current));
    }

    println!();
    println!("================ SUMMARY =================");
    let history = service.history_of(&alice)?;
    for record in &history {
        println!(
            "  {} {:+} -> {} ({})",
            record.correlation_id, record.points_delta, record.resulting_balance, record.description
        );
    }
    println!("{:?}", build_history_summary(&alice, &history));
    service.verify()?;
    println!("Всего в обороте: {}", service.circulating_total());
    Ok(())
}
