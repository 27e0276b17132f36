use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountId, Bet, BetKind, CorrelationId, Envelope, EnvelopeId, EnvelopeStatus, Tokens,
    Visibility,
};
use crate::engine::{EngineError, GameSession, SessionStatus};

/// Ставка в том виде, в каком её присылает парсер чата: `"BIG"`, `"TOTAL-7"`, ...
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetDto {
    pub kind: String,
    pub stake: Tokens,
}

impl BetDto {
    pub fn new(kind: impl Into<String>, stake: u64) -> Self {
        Self {
            kind: kind.into(),
            stake: Tokens(stake),
        }
    }

    pub fn to_bet(&self) -> Result<Bet, EngineError> {
        let kind: BetKind = self.kind.parse()?;
        Ok(Bet::new(kind, self.stake)?)
    }
}

impl From<&Bet> for BetDto {
    fn from(bet: &Bet) -> Self {
        Self {
            kind: bet.kind.to_string(),
            stake: bet.stake,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountDto {
    pub account_id: AccountId,
    pub display_name: String,
    pub balance: Tokens,
    pub is_house: bool,
}

/// DTO конверта. Размеры долей не раскрываются, только их количество.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvelopeDto {
    pub envelope_id: EnvelopeId,
    pub sender: AccountId,
    pub total_amount: Tokens,
    pub share_count: usize,
    pub claimed_count: usize,
    pub remaining_amount: Tokens,
    pub status: EnvelopeStatus,
    /// Адресат приватного конверта.
    pub target: Option<AccountId>,
}

impl From<&Envelope> for EnvelopeDto {
    fn from(envelope: &Envelope) -> Self {
        let target = match &envelope.visibility {
            Visibility::Public => None,
            Visibility::Private { target } => Some(target.clone()),
        };
        Self {
            envelope_id: envelope.id.clone(),
            sender: envelope.sender.clone(),
            total_amount: envelope.total_amount,
            share_count: envelope.shares.len(),
            claimed_count: envelope.claimed_count(),
            remaining_amount: envelope.unclaimed_amount(),
            status: envelope.status,
            target,
        }
    }
}

/// Активная игра игрока.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDto {
    pub account_id: AccountId,
    pub correlation_id: CorrelationId,
    pub bets: Vec<BetDto>,
    pub dice: Vec<u8>,
    pub status: SessionStatus,
}

impl From<&GameSession> for SessionDto {
    fn from(session: &GameSession) -> Self {
        Self {
            account_id: session.owner.clone(),
            correlation_id: session.correlation_id.clone(),
            bets: session.bets.iter().map(BetDto::from).collect(),
            dice: session.dice_rolls.iter().map(|d| d.face()).collect(),
            status: session.status,
        }
    }
}

/// Сводка по играм счёта (команда «история» в чате).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HistorySummaryDto {
    pub account_id: AccountId,
    /// Сыгранные (не отменённые) игры.
    pub games_played: usize,
    pub games_won: usize,
    pub games_lost: usize,
    pub games_cancelled: usize,
    /// Доля выигранных игр, в процентах.
    pub win_rate: f64,
    pub total_staked: Tokens,
    /// Выигрыши + возвращённые ставки.
    pub total_returned: Tokens,
    pub net_profit: i64,
}
