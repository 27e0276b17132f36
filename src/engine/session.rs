use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::history::{EntryKind, Memo, Role};
use crate::domain::{
    total_stake, AccountId, Bet, CorrelationId, Die, PayoutSchema, Tokens, DICE_PER_GAME,
};
use crate::engine::errors::EngineError;
use crate::engine::house::HouseManager;
use crate::engine::ledger::LedgerStore;
use crate::engine::settlement::{settle, SettlementReport};
use crate::engine::RandomSource;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionStatus {
    /// Ставки приняты, кубики ещё не бросали.
    Betting,
    /// Брошен хотя бы один кубик.
    Rolling,
    Settled,
    Cancelled,
}

/// Игра одного игрока: ставки + брошенные кубики.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSession {
    pub owner: AccountId,
    pub bets: Vec<Bet>,
    pub dice_rolls: Vec<Die>,
    pub correlation_id: CorrelationId,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl GameSession {
    pub fn new(
        owner: AccountId,
        bets: Vec<Bet>,
        correlation_id: CorrelationId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner,
            bets,
            dice_rolls: Vec::with_capacity(DICE_PER_GAME),
            correlation_id,
            started_at,
            status: SessionStatus::Betting,
        }
    }

    pub fn remaining_dice(&self) -> usize {
        DICE_PER_GAME.saturating_sub(self.dice_rolls.len())
    }

    pub fn total_stake(&self) -> Tokens {
        self.bets.iter().map(|b| b.stake).sum()
    }
}

/// Правила приёма ставок.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRules {
    pub payout: PayoutSchema,
    pub max_total_stake: Tokens,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            payout: PayoutSchema::classic(),
            max_total_stake: Tokens(1_000_000),
        }
    }
}

/// Ответ на успешное открытие игры.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenedSession {
    pub correlation_id: CorrelationId,
    pub total_stake: Tokens,
    pub balance_after: Tokens,
    /// Худший для банка исход по этим ставкам.
    pub potential_payout: Tokens,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CancelOutcome {
    Refunded {
        correlation_id: CorrelationId,
        refunded: Tokens,
        balance: Tokens,
    },
    /// Кубики уже брошены — отмена невозможна.
    AlreadyRolling { correlation_id: CorrelationId },
    NoSession,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollOutcome {
    pub correlation_id: CorrelationId,
    /// Кубики, брошенные этим вызовом.
    pub new_dice: Vec<Die>,
    /// Все кубики игры на текущий момент.
    pub dice: Vec<Die>,
    /// `Some` — игра завершена и рассчитана.
    pub settlement: Option<SettlementReport>,
}

impl RollOutcome {
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }
}

/// Активные игры: не больше одной на счёт.
///
/// Завершённые и отменённые игры сразу убираются из книги,
/// их след остаётся только в истории леджера.
#[derive(Clone, Debug, Default)]
pub struct SessionBook {
    sessions: HashMap<AccountId, GameSession>,
    rules: SessionRules,
}

impl SessionBook {
    pub fn new(rules: SessionRules) -> Self {
        Self {
            sessions: HashMap::new(),
            rules,
        }
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    pub fn get(&self, account_id: &str) -> Option<&GameSession> {
        self.sessions.get(account_id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains_correlation(&self, correlation_id: &str) -> bool {
        self.sessions
            .values()
            .any(|s| s.correlation_id == correlation_id)
    }

    pub fn correlation_ids(&self) -> impl Iterator<Item = CorrelationId> + '_ {
        self.sessions.values().map(|s| s.correlation_id.clone())
    }

    /// Ставки, удерживаемые активными играми.
    pub fn escrowed(&self) -> u128 {
        self.sessions
            .values()
            .map(|s| u128::from(s.total_stake().0))
            .sum()
    }

    /// Открыть игру: проверить всё, потом списать ставки.
    ///
    /// До первого списания ничего не меняется; порядок проверок:
    /// активная игра, банк, ставки, лимит, баланс игрока, покрытие банка.
    pub fn open(
        &mut self,
        ledger: &mut LedgerStore,
        house: &HouseManager,
        account_id: &str,
        bets: Vec<Bet>,
        correlation_id: CorrelationId,
        now: DateTime<Utc>,
    ) -> Result<OpenedSession, EngineError> {
        if self.sessions.contains_key(account_id) {
            return Err(EngineError::SessionAlreadyOpen(account_id.to_string()));
        }
        let house_id = house.require()?;
        if house_id.as_str() == account_id {
            return Err(EngineError::HouseCannotPlay);
        }

        if bets.is_empty() {
            return Err(EngineError::EmptyBets);
        }
        for bet in &bets {
            bet.validate()?;
        }

        let limit = self.rules.max_total_stake;
        let total = total_stake(&bets).ok_or(EngineError::StakeLimitExceeded {
            total: Tokens(u64::MAX),
            limit,
        })?;
        if total > limit {
            return Err(EngineError::StakeLimitExceeded { total, limit });
        }

        let available = ledger.balance_of(account_id)?;
        if total > available {
            return Err(EngineError::InsufficientFunds {
                account_id: account_id.to_string(),
                required: total,
                available,
            });
        }

        let potential_payout = self.rules.payout.worst_case_payout(&bets);
        let house_balance = ledger.balance_of(house_id)?;
        if potential_payout > house_balance {
            return Err(EngineError::HouseCannotCover {
                required: potential_payout,
                available: house_balance,
            });
        }

        let mut balance_after = available;
        for bet in &bets {
            let memo = Memo::new(
                Role::Player,
                EntryKind::Stake,
                &correlation_id,
                format!("Ставка {} на {}", bet.stake, bet.kind),
                now,
            )
            .with_bet_amount(bet.stake);
            balance_after = ledger.debit(account_id, bet.stake, memo)?;
        }

        info!(
            account_id,
            correlation_id = %correlation_id,
            bets = bets.len(),
            total_stake = %total,
            potential_payout = %potential_payout,
            "игра открыта"
        );

        let session = GameSession::new(account_id.to_string(), bets, correlation_id.clone(), now);
        self.sessions.insert(account_id.to_string(), session);

        Ok(OpenedSession {
            correlation_id,
            total_stake: total,
            balance_after,
            potential_payout,
        })
    }

    /// Отмена до первого броска: все ставки возвращаются.
    pub fn cancel(
        &mut self,
        ledger: &mut LedgerStore,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, EngineError> {
        let Some(session) = self.sessions.get(account_id) else {
            return Ok(CancelOutcome::NoSession);
        };
        if !session.dice_rolls.is_empty() {
            return Ok(CancelOutcome::AlreadyRolling {
                correlation_id: session.correlation_id.clone(),
            });
        }

        let mut session = self
            .sessions
            .remove(account_id)
            .ok_or(EngineError::Internal("игра исчезла при отмене"))?;

        let mut balance = ledger.balance_of(account_id)?;
        for bet in &session.bets {
            let memo = Memo::new(
                Role::Player,
                EntryKind::Cancellation,
                &session.correlation_id,
                format!("Отмена игры, возврат ставки {} на {}", bet.stake, bet.kind),
                now,
            )
            .with_bet_amount(bet.stake);
            balance = ledger.credit(account_id, bet.stake, memo)?;
        }
        session.status = SessionStatus::Cancelled;

        let refunded = session.total_stake();
        info!(
            account_id,
            correlation_id = %session.correlation_id,
            refunded = %refunded,
            "игра отменена"
        );

        Ok(CancelOutcome::Refunded {
            correlation_id: session.correlation_id,
            refunded,
            balance,
        })
    }

    /// Бросить `count` кубиков (обрезается до оставшихся).
    /// Третий кубик запускает расчёт.
    pub fn roll<R: RandomSource>(
        &mut self,
        ledger: &mut LedgerStore,
        house: &HouseManager,
        rng: &mut R,
        account_id: &str,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<RollOutcome, EngineError> {
        if count == 0 {
            return Err(EngineError::ZeroDice);
        }
        let session = self
            .sessions
            .get_mut(account_id)
            .ok_or_else(|| EngineError::NoActiveSession(account_id.to_string()))?;

        let to_roll = count.min(session.remaining_dice());
        if to_roll == 0 {
            return Err(EngineError::Internal("в активной игре не осталось кубиков"));
        }

        let new_dice = (0..to_roll)
            .map(|_| Die::new(rng.roll_die()))
            .collect::<Option<Vec<_>>>()
            .ok_or(EngineError::Internal("RNG вернул грань вне 1..=6"))?;

        session.dice_rolls.extend_from_slice(&new_dice);
        session.status = SessionStatus::Rolling;

        debug!(
            account_id,
            correlation_id = %session.correlation_id,
            new_dice = ?new_dice,
            remaining = session.remaining_dice(),
            "брошены кубики"
        );

        if session.remaining_dice() > 0 {
            return Ok(RollOutcome {
                correlation_id: session.correlation_id.clone(),
                new_dice,
                dice: session.dice_rolls.clone(),
                settlement: None,
            });
        }

        let mut session = self
            .sessions
            .remove(account_id)
            .ok_or(EngineError::Internal("игра исчезла при расчёте"))?;

        let report = settle(&session, ledger, house, &self.rules.payout, now)?;
        session.status = SessionStatus::Settled;

        info!(
            account_id,
            correlation_id = %session.correlation_id,
            total = report.total,
            net = report.net(),
            "игра рассчитана"
        );

        Ok(RollOutcome {
            correlation_id: session.correlation_id,
            new_dice,
            dice: session.dice_rolls,
            settlement: Some(report),
        })
    }
}
