use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::history::{EntryKind, HistoryRecord};
use crate::domain::{AccountId, EnvelopeId, Tokens};

use super::dto::{AccountDto, EnvelopeDto, HistorySummaryDto, SessionDto};

/// Запросы "только чтение".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Query {
    Account { account_id: AccountId },

    /// Последние `limit` записей истории (все, если `None`).
    History {
        account_id: AccountId,
        limit: Option<usize>,
    },

    HistorySummary { account_id: AccountId },

    CurrentHouse,

    Envelope { envelope_id: EnvelopeId },

    ActiveSession { account_id: AccountId },
}

/// Результат запроса "только чтение".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum QueryResponse {
    Account(AccountDto),
    History(Vec<HistoryRecord>),
    HistorySummary(HistorySummaryDto),
    House(Option<AccountDto>),
    Envelope(EnvelopeDto),
    Session(Option<SessionDto>),
}

/// Свести историю счёта в статистику по играм.
///
/// Игра = correlation id, под которым были списаны ставки.
/// Выигранной считается игра, где выигрыши (за вычетом сторно) больше нуля.
pub fn build_history_summary(account_id: &str, records: &[HistoryRecord]) -> HistorySummaryDto {
    #[derive(Default)]
    struct Game {
        staked: u64,
        winnings: i128,
        returned: u64,
        cancelled: bool,
    }

    let mut games: BTreeMap<&str, Game> = BTreeMap::new();
    let staked_ids: BTreeSet<&str> = records
        .iter()
        .filter(|r| r.kind == EntryKind::Stake)
        .map(|r| r.correlation_id.as_str())
        .collect();

    for record in records.iter().filter(|r| staked_ids.contains(r.correlation_id.as_str())) {
        let game = games.entry(record.correlation_id.as_str()).or_default();
        let magnitude = record.points_delta.unsigned_abs();
        match record.kind {
            EntryKind::Stake => game.staked = game.staked.saturating_add(magnitude),
            EntryKind::Cancellation => game.cancelled = true,
            EntryKind::Winnings | EntryKind::Reversal => {
                game.winnings += i128::from(record.points_delta)
            }
            EntryKind::StakeReturn => game.returned = game.returned.saturating_add(magnitude),
            _ => {}
        }
    }

    let mut summary = HistorySummaryDto {
        account_id: account_id.to_string(),
        ..HistorySummaryDto::default()
    };
    let mut staked = 0u64;
    let mut returned = 0u64;

    for game in games.values() {
        if game.cancelled {
            summary.games_cancelled += 1;
            continue;
        }
        summary.games_played += 1;
        if game.winnings > 0 {
            summary.games_won += 1;
        } else {
            summary.games_lost += 1;
        }
        staked = staked.saturating_add(game.staked);
        let won = u64::try_from(game.winnings.max(0)).unwrap_or(u64::MAX);
        returned = returned.saturating_add(won).saturating_add(game.returned);
    }

    summary.total_staked = Tokens(staked);
    summary.total_returned = Tokens(returned);
    summary.net_profit = i64::try_from(i128::from(returned) - i128::from(staked)).unwrap_or(i64::MIN);
    if summary.games_played > 0 {
        summary.win_rate = summary.games_won as f64 * 100.0 / summary.games_played as f64;
    }
    summary
}
