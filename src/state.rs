use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Account, AccountId, Envelope, EnvelopeId};
use crate::engine::{
    EngineError, EnvelopeBook, HouseManager, LedgerStore, SessionBook, SessionRules, SharedHistory,
};
use crate::infra::ids::period_timestamp;

/// Сколько держать в резерве номера периодов из прошлого запуска.
/// Новые номера начинаются с текущего времени, так что старше этого
/// окна столкнуться можно только при сильном откате часов.
pub const RESERVED_ID_RETENTION_HOURS: i64 = 24;

/// Снэпшот леджера, который уходит во внешнее хранилище (JSON-файл).
/// Это «замороженная» экономика: всё, кроме активных игр.
///
/// Ключи — BTreeMap, чтобы файл был стабильным между записями.
/// История делится с леджером через `Arc`: снапшот стоит O(число счетов),
/// а не O(всей истории). Счета и конверты копируются целиком.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub house_account_id: Option<AccountId>,
    #[serde(default)]
    pub accounts: BTreeMap<AccountId, Account>,
    #[serde(default)]
    pub external_index: BTreeMap<String, AccountId>,
    #[serde(default)]
    pub history: BTreeMap<AccountId, SharedHistory>,
    #[serde(default)]
    pub envelopes: BTreeMap<EnvelopeId, Envelope>,
    /// Занятые номера периодов (игры + конверты) на момент записи.
    #[serde(default)]
    pub live_ids: Vec<String>,
}

/// Всё in-memory состояние экономики.
///
/// Движки получают его части по ссылкам; блокировка — снаружи.
#[derive(Clone, Debug, Default)]
pub struct CasinoState {
    pub ledger: LedgerStore,
    pub house: HouseManager,
    pub sessions: SessionBook,
    pub envelopes: EnvelopeBook,
    /// Номера периодов из загруженного снапшота: игры, оборванные
    /// рестартом, остаются в истории, их id повторно не выдаём.
    reserved_ids: BTreeSet<String>,
}

impl CasinoState {
    pub fn new(rules: SessionRules, admins: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            ledger: LedgerStore::new(),
            house: HouseManager::default(),
            sessions: SessionBook::new(rules),
            envelopes: EnvelopeBook::new(admins),
            reserved_ids: BTreeSet::new(),
        }
    }

    /// Занят ли id: активная игра, сохранённый конверт или резерв.
    pub fn is_live_id(&self, id: &str) -> bool {
        self.sessions.contains_correlation(id)
            || self.envelopes.contains(id)
            || self.reserved_ids.contains(id)
    }

    /// Упорядоченный список занятых id.
    pub fn live_ids(&self) -> Vec<String> {
        let mut ids: BTreeSet<String> = self.reserved_ids.clone();
        ids.extend(self.envelopes.iter().map(|e| e.id.clone()));
        ids.extend(self.sessions.correlation_ids());
        ids.into_iter().collect()
    }

    /// Сумма балансов + незабранные доли + ставки в активных играх.
    /// Меняется только при создании счетов со стартовым балансом.
    pub fn circulating_total(&self) -> u128 {
        self.ledger.total_supply() + self.envelopes.unclaimed_total() + self.sessions.escrowed()
    }

    /// Упаковать состояние в снапшот для хранения.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            house_account_id: self.house.current().cloned(),
            accounts: self
                .ledger
                .accounts()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            external_index: self
                .ledger
                .external_index()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            history: self
                .ledger
                .histories()
                .iter()
                .map(|(k, v)| (k.clone(), SharedHistory::clone(v)))
                .collect(),
            envelopes: self
                .envelopes
                .iter()
                .map(|e| (e.id.clone(), e.clone()))
                .collect(),
            live_ids: self.live_ids(),
        }
    }

    /// Снять резерв с номеров периодов, выданных раньше `now` минус окно
    /// хранения (и с тех, в которых не читается время).
    pub fn prune_reserved_ids(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(RESERVED_ID_RETENTION_HOURS);
        let before = self.reserved_ids.len();
        self.reserved_ids
            .retain(|id| period_timestamp(id).is_some_and(|issued| issued >= cutoff));
        let pruned = before - self.reserved_ids.len();
        if pruned > 0 {
            debug!(pruned, kept = self.reserved_ids.len(), "резерв номеров периодов сокращён");
        }
        pruned
    }

    pub fn reserved_ids(&self) -> impl Iterator<Item = &str> {
        self.reserved_ids.iter().map(String::as_str)
    }

    /// Развернуть снапшот обратно. Леджер сверяется, банк должен существовать.
    pub fn restore(
        snapshot: LedgerSnapshot,
        rules: SessionRules,
        admins: impl IntoIterator<Item = AccountId>,
    ) -> Result<Self, EngineError> {
        let ledger = LedgerStore::from_parts(
            snapshot.accounts.into_iter().collect(),
            snapshot.external_index.into_iter().collect(),
            snapshot.history.into_iter().collect(),
        );
        ledger.verify()?;

        if let Some(house) = &snapshot.house_account_id {
            if !ledger.contains(house) {
                return Err(EngineError::LedgerCorrupted(format!(
                    "банк {house} отсутствует среди счетов"
                )));
            }
        }

        for envelope in snapshot.envelopes.values() {
            let sum: u128 = envelope.shares.iter().map(|s| u128::from(s.0)).sum();
            if sum != u128::from(envelope.total_amount.0)
                || envelope.shares.len() != envelope.claimed_by.len()
            {
                return Err(EngineError::LedgerCorrupted(format!(
                    "конверт {} повреждён",
                    envelope.id
                )));
            }
        }

        Ok(Self {
            ledger,
            house: HouseManager::new(snapshot.house_account_id),
            sessions: SessionBook::new(rules),
            envelopes: EnvelopeBook::from_parts(snapshot.envelopes.into_values(), admins),
            reserved_ids: snapshot.live_ids.into_iter().collect(),
        })
    }
}
