use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info};

use crate::api::{
    build_history_summary, AccountDto, ApiError, Command, CommandResponse, EnvelopeCommand,
    EnvelopeDto, HistorySummaryDto, Query, QueryResponse, SessionDto,
};
use crate::domain::history::HistoryRecord;
use crate::domain::{Account, AccountId, Bet, Envelope, EnvelopeId, Tokens};
use crate::engine::{
    CancelOutcome, ClaimReceipt, EngineError, GameSession, OpenedSession, RandomSource,
    RollOutcome,
};
use crate::infra::{
    ConfigError, EconomyConfig, IdGenerator, JsonFileSink, PersistenceError, PersistenceSink,
    PersistenceWorker, SystemRng,
};
use crate::state::{CasinoState, LedgerSnapshot};

/// Ошибки запуска сервиса (до того, как он начал принимать команды).
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("снапшот леджера не прошёл проверку: {0}")]
    Engine(#[from] EngineError),
}

struct Inner<R> {
    state: CasinoState,
    ids: IdGenerator,
    rng: R,
}

/// Фасад экономики: одно состояние под одним мьютексом.
///
/// Каждая операция берёт блокировку один раз и выполняется целиком,
/// так что частично применённых изменений никто не видит.
/// После успешного изменения снапшот уходит в фоновую запись.
pub struct CasinoService<R: RandomSource = SystemRng> {
    inner: Mutex<Inner<R>>,
    persistence: Option<PersistenceWorker>,
    config: EconomyConfig,
}

impl CasinoService<SystemRng> {
    /// Рабочий запуск: загрузить `data_file` (если задан), поднять запись.
    pub fn open(config: EconomyConfig) -> Result<Self, StartupError> {
        match config.data_file.clone() {
            Some(path) => {
                let sink = JsonFileSink::new(path);
                let snapshot = sink.load()?;
                Self::with_sink(config, SystemRng, IdGenerator::new(), snapshot, sink)
            }
            None => Self::in_memory(config, SystemRng, IdGenerator::new()),
        }
    }
}

impl<R: RandomSource> CasinoService<R> {
    /// Без внешнего хранилища (тесты, dev CLI).
    pub fn in_memory(config: EconomyConfig, rng: R, ids: IdGenerator) -> Result<Self, StartupError> {
        Self::build(config, rng, ids, None, None)
    }

    /// С восстановлением из снапшота и записью в `sink`.
    pub fn with_sink<S: PersistenceSink>(
        config: EconomyConfig,
        rng: R,
        ids: IdGenerator,
        snapshot: Option<LedgerSnapshot>,
        sink: S,
    ) -> Result<Self, StartupError> {
        let worker = PersistenceWorker::spawn(sink, config.persistence_buffer)?;
        Self::build(config, rng, ids, snapshot, Some(worker))
    }

    fn build(
        config: EconomyConfig,
        rng: R,
        ids: IdGenerator,
        snapshot: Option<LedgerSnapshot>,
        persistence: Option<PersistenceWorker>,
    ) -> Result<Self, StartupError> {
        config.validate()?;

        let rules = config.session_rules();
        let admins = config.admins.iter().cloned();
        let mut state = match snapshot {
            Some(snapshot) => {
                let restored = CasinoState::restore(snapshot, rules, admins)?;
                info!(
                    accounts = restored.ledger.accounts().len(),
                    envelopes = restored.envelopes.len(),
                    "леджер загружен"
                );
                restored
            }
            None => CasinoState::new(rules, admins),
        };
        state.envelopes.set_max_recipients(config.max_envelope_recipients);
        state.prune_reserved_ids(Utc::now());

        let mut bootstrapped = false;
        if let Some(house) = &config.house_bootstrap {
            if state.house.current().is_none() && !state.ledger.contains(&house.account_id) {
                let CasinoState { ledger, house: manager, .. } = &mut state;
                manager.bootstrap(ledger, &house.account_id, &house.display_name, house.float, Utc::now())?;
                bootstrapped = true;
            }
        }

        if let (true, Some(worker)) = (bootstrapped, &persistence) {
            worker.submit(state.snapshot());
        }

        Ok(Self {
            inner: Mutex::new(Inner { state, ids, rng }),
            persistence,
            config,
        })
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Изменяющая операция под блокировкой.
    ///
    /// Успех -> снапшот в фоновую запись (не блокируя).
    /// `LedgerCorrupted` -> паника: работать дальше с битым леджером нельзя.
    fn mutate<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Inner<R>, DateTime<Utc>) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut inner = self.lock();
        let result = f(&mut inner, Utc::now());

        match &result {
            Ok(_) => {
                if let Some(worker) = &self.persistence {
                    worker.submit(inner.state.snapshot());
                }
            }
            Err(err) if err.is_fatal() => {
                error!(op, %err, "леджер повреждён, останавливаемся");
                panic!("{op}: {err}");
            }
            Err(_) => {}
        }
        result
    }

    // ---------- Счета ----------

    /// Завести счёт по внутреннему id (идемпотентно).
    pub fn ensure_account(&self, account_id: &str, display_name: &str) -> Result<Account, EngineError> {
        let starting = self.config.starting_balance;
        self.mutate("ensure_account", |inner, now| {
            inner.state.ledger.get_or_create(account_id, display_name, starting, now)
        })
    }

    /// Внешний (чат) id -> внутренний id счёта; новый счёт получает стартовый баланс.
    pub fn resolve_account(&self, external_id: &str, display_name: &str) -> Result<AccountId, EngineError> {
        let starting = self.config.starting_balance;
        self.mutate("resolve_account", |inner, now| {
            let Inner { state, ids, .. } = inner;
            if let Some(existing) = state.ledger.lookup_external(external_id) {
                return Ok(existing.clone());
            }
            let account_id = ids.next_account_id(|id| state.ledger.contains(id))?;
            state
                .ledger
                .register_external(external_id, account_id, display_name, starting, now)
        })
    }

    pub fn balance_of(&self, account_id: &str) -> Result<Tokens, EngineError> {
        self.lock().state.ledger.balance_of(account_id)
    }

    pub fn account(&self, account_id: &str) -> Result<Account, EngineError> {
        self.lock()
            .state
            .ledger
            .account(account_id)
            .cloned()
            .ok_or_else(|| EngineError::AccountNotFound(account_id.to_string()))
    }

    pub fn history_of(&self, account_id: &str) -> Result<Vec<HistoryRecord>, EngineError> {
        let inner = self.lock();
        if !inner.state.ledger.contains(account_id) {
            return Err(EngineError::AccountNotFound(account_id.to_string()));
        }
        Ok(inner.state.ledger.history_of(account_id).to_vec())
    }

    pub fn history_summary(&self, account_id: &str) -> Result<HistorySummaryDto, EngineError> {
        let inner = self.lock();
        if !inner.state.ledger.contains(account_id) {
            return Err(EngineError::AccountNotFound(account_id.to_string()));
        }
        Ok(build_history_summary(
            account_id,
            inner.state.ledger.history_of(account_id),
        ))
    }

    // ---------- Банк ----------

    pub fn current_house(&self) -> Option<AccountId> {
        self.lock().state.house.current().cloned()
    }

    pub fn designate_house(&self, account_id: &str) -> Result<(), EngineError> {
        self.mutate("designate_house", |inner, _| {
            let CasinoState { ledger, house, .. } = &mut inner.state;
            house.designate(ledger, account_id)
        })
    }

    pub fn vacate_house(&self, requester: &str) -> Result<AccountId, EngineError> {
        self.mutate("vacate_house", |inner, _| {
            let active = inner.state.sessions.active_count();
            inner.state.house.vacate(requester, active)
        })
    }

    // ---------- Игры ----------

    pub fn open_session(&self, account_id: &str, bets: Vec<Bet>) -> Result<OpenedSession, EngineError> {
        self.mutate("open_session", |inner, now| {
            let Inner { state, ids, .. } = inner;
            if state.sessions.get(account_id).is_some() {
                return Err(EngineError::SessionAlreadyOpen(account_id.to_string()));
            }
            let correlation_id = ids.next_period_id(now, |id| state.is_live_id(id))?;
            let CasinoState { ledger, house, sessions, .. } = state;
            sessions.open(ledger, house, account_id, bets, correlation_id, now)
        })
    }

    pub fn roll_dice(&self, account_id: &str, count: usize) -> Result<RollOutcome, EngineError> {
        self.mutate("roll_dice", |inner, now| {
            let Inner { state, rng, .. } = inner;
            let CasinoState { ledger, house, sessions, .. } = state;
            sessions.roll(ledger, house, rng, account_id, count, now)
        })
    }

    pub fn cancel_session(&self, account_id: &str) -> Result<CancelOutcome, EngineError> {
        self.mutate("cancel_session", |inner, now| {
            let CasinoState { ledger, sessions, .. } = &mut inner.state;
            sessions.cancel(ledger, account_id, now)
        })
    }

    pub fn active_session(&self, account_id: &str) -> Option<GameSession> {
        self.lock().state.sessions.get(account_id).cloned()
    }

    // ---------- Конверты ----------

    pub fn create_public_envelope(
        &self,
        sender: &str,
        total: Tokens,
        recipients: usize,
    ) -> Result<Envelope, EngineError> {
        self.mutate("create_public_envelope", |inner, now| {
            let Inner { state, ids, rng } = inner;
            let envelope_id = ids.next_period_id(now, |id| state.is_live_id(id))?;
            let CasinoState { ledger, envelopes, .. } = state;
            envelopes.create_public(ledger, rng, sender, total, recipients, envelope_id, now)
        })
    }

    pub fn create_private_envelope(
        &self,
        sender: &str,
        target: &str,
        amount: Tokens,
    ) -> Result<Envelope, EngineError> {
        self.mutate("create_private_envelope", |inner, now| {
            let Inner { state, ids, .. } = inner;
            let envelope_id = ids.next_period_id(now, |id| state.is_live_id(id))?;
            let CasinoState { ledger, envelopes, .. } = state;
            envelopes.create_private(ledger, sender, target, amount, envelope_id, now)
        })
    }

    pub fn confirm_envelope(&self, sender: &str, envelope_id: &str) -> Result<(), EngineError> {
        self.mutate("confirm_envelope", |inner, _| {
            inner.state.envelopes.confirm(sender, envelope_id)
        })
    }

    pub fn confirm_all_envelopes(&self, sender: &str) -> Result<Vec<EnvelopeId>, EngineError> {
        self.mutate("confirm_all_envelopes", |inner, _| {
            Ok(inner.state.envelopes.confirm_all(sender))
        })
    }

    pub fn claim_envelope(&self, envelope_id: &str, claimant: &str) -> Result<ClaimReceipt, EngineError> {
        self.mutate("claim_envelope", |inner, now| {
            let Inner { state, rng, .. } = inner;
            let CasinoState { ledger, envelopes, .. } = state;
            envelopes.claim(ledger, rng, envelope_id, claimant, now)
        })
    }

    pub fn revoke_envelope(&self, envelope_id: &str, requester: &str) -> Result<Tokens, EngineError> {
        self.mutate("revoke_envelope", |inner, now| {
            let CasinoState { ledger, envelopes, .. } = &mut inner.state;
            envelopes.revoke(ledger, envelope_id, requester, now)
        })
    }

    pub fn envelope(&self, envelope_id: &str) -> Option<Envelope> {
        self.lock().state.envelopes.get(envelope_id).cloned()
    }

    // ---------- Служебное ----------

    /// Балансы + незабранные доли + ставки в активных играх.
    pub fn circulating_total(&self) -> u128 {
        self.lock().state.circulating_total()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.lock().state.snapshot()
    }

    /// Сверка всего леджера.
    pub fn verify(&self) -> Result<(), EngineError> {
        self.lock().state.ledger.verify()
    }

    /// Дописать очередь снапшотов, записать финальное состояние
    /// и остановить фоновую запись.
    ///
    /// Снапшоты, пропущенные из-за полного канала, перекрывает финальный.
    pub fn shutdown(mut self) {
        if let Some(mut worker) = self.persistence.take() {
            let last = self.lock().state.snapshot();
            worker.finish(last);
        }
        info!("сервис остановлен");
    }

    // ---------- API для диспетчера ----------

    pub fn execute(&self, command: Command) -> Result<CommandResponse, ApiError> {
        let response = match command {
            Command::EnsureAccount {
                account_id,
                display_name,
            } => {
                self.ensure_account(&account_id, &display_name)?;
                CommandResponse::Account(self.account_dto(&account_id)?)
            }
            Command::ResolveAccount {
                external_id,
                display_name,
            } => {
                let account_id = self.resolve_account(&external_id, &display_name)?;
                CommandResponse::Account(self.account_dto(&account_id)?)
            }
            Command::OpenSession(cmd) => {
                let bets = cmd
                    .bets
                    .iter()
                    .map(|b| b.to_bet())
                    .collect::<Result<Vec<_>, _>>()?;
                CommandResponse::SessionOpened(self.open_session(&cmd.account_id, bets)?)
            }
            Command::RollDice { account_id, count } => {
                CommandResponse::Rolled(self.roll_dice(&account_id, count)?)
            }
            Command::CancelSession { account_id } => {
                CommandResponse::Cancelled(self.cancel_session(&account_id)?)
            }
            Command::DesignateHouse { account_id } => {
                self.designate_house(&account_id)?;
                CommandResponse::HouseDesignated { account_id }
            }
            Command::VacateHouse { requester } => CommandResponse::HouseVacated {
                account_id: self.vacate_house(&requester)?,
            },
            Command::Envelope(cmd) => self.execute_envelope(cmd)?,
        };
        Ok(response)
    }

    fn execute_envelope(&self, command: EnvelopeCommand) -> Result<CommandResponse, ApiError> {
        let response = match command {
            EnvelopeCommand::CreatePublic {
                sender,
                total,
                recipients,
            } => {
                let envelope = self.create_public_envelope(&sender, total, recipients)?;
                CommandResponse::EnvelopeCreated(EnvelopeDto::from(&envelope))
            }
            EnvelopeCommand::CreatePrivate {
                sender,
                target,
                amount,
            } => {
                let envelope = self.create_private_envelope(&sender, &target, amount)?;
                CommandResponse::EnvelopeCreated(EnvelopeDto::from(&envelope))
            }
            EnvelopeCommand::Confirm {
                sender,
                envelope_id,
            } => {
                self.confirm_envelope(&sender, &envelope_id)?;
                CommandResponse::EnvelopesConfirmed {
                    envelope_ids: vec![envelope_id],
                }
            }
            EnvelopeCommand::ConfirmAll { sender } => CommandResponse::EnvelopesConfirmed {
                envelope_ids: self.confirm_all_envelopes(&sender)?,
            },
            EnvelopeCommand::Claim {
                envelope_id,
                claimant,
            } => CommandResponse::EnvelopeClaimed(self.claim_envelope(&envelope_id, &claimant)?),
            EnvelopeCommand::Revoke {
                envelope_id,
                requester,
            } => {
                let refunded = self.revoke_envelope(&envelope_id, &requester)?;
                CommandResponse::EnvelopeRevoked {
                    envelope_id,
                    refunded,
                }
            }
        };
        Ok(response)
    }

    pub fn query(&self, query: Query) -> Result<QueryResponse, ApiError> {
        let response = match query {
            Query::Account { account_id } => QueryResponse::Account(self.account_dto(&account_id)?),
            Query::History { account_id, limit } => {
                let mut records = self.history_of(&account_id)?;
                if let Some(limit) = limit {
                    let skip = records.len().saturating_sub(limit);
                    records.drain(..skip);
                }
                QueryResponse::History(records)
            }
            Query::HistorySummary { account_id } => {
                QueryResponse::HistorySummary(self.history_summary(&account_id)?)
            }
            Query::CurrentHouse => {
                let house = match self.current_house() {
                    Some(id) => Some(self.account_dto(&id)?),
                    None => None,
                };
                QueryResponse::House(house)
            }
            Query::Envelope { envelope_id } => {
                let envelope = self
                    .envelope(&envelope_id)
                    .ok_or(EngineError::EnvelopeNotFound(envelope_id))?;
                QueryResponse::Envelope(EnvelopeDto::from(&envelope))
            }
            Query::ActiveSession { account_id } => {
                QueryResponse::Session(self.active_session(&account_id).as_ref().map(SessionDto::from))
            }
        };
        Ok(response)
    }

    fn account_dto(&self, account_id: &str) -> Result<AccountDto, EngineError> {
        let inner = self.lock();
        let account = inner
            .state
            .ledger
            .account(account_id)
            .ok_or_else(|| EngineError::AccountNotFound(account_id.to_string()))?;
        Ok(AccountDto {
            account_id: account.id.clone(),
            display_name: account.display_name.clone(),
            balance: account.balance,
            is_house: inner.state.house.is_house(account_id),
        })
    }
}
