use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tokens::Tokens;
use crate::domain::{AccountId, CorrelationId};

/// В какой роли счёт участвовал в проводке.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    House,
    System,
}

/// Тип проводки. Описание (`description`) — для людей,
/// а статистика и аудит опираются на этот тег.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Стартовый баланс нового счёта / начальный банк.
    Opening,
    /// Списание ставки при открытии игры.
    Stake,
    /// Возврат ставки при отмене игры до первого броска.
    Cancellation,
    /// Выигрыш игрока.
    Winnings,
    /// Сторно выигрыша, который банк не смог оплатить.
    Reversal,
    /// Возврат ставки вместо неоплаченного выигрыша.
    StakeReturn,
    /// Банк забрал проигравшую ставку.
    HouseCollect,
    /// Банк выплатил выигрыш.
    HousePayout,
    /// Отправитель оплатил красный конверт.
    EnvelopeFunding,
    /// Получатель забрал долю конверта.
    EnvelopeClaim,
    /// Конверт отозван, деньги вернулись отправителю.
    EnvelopeRevoked,
}

/// Одна запись истории. Ровно одна на каждое изменение баланса.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub account_id: AccountId,
    pub description: String,
    /// Положительное значение = зачисление, отрицательное = списание.
    pub points_delta: i64,
    pub resulting_balance: Tokens,
    pub role: Role,
    pub kind: EntryKind,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bet_amount: Option<Tokens>,
}

/// Всё, что сопровождает проводку, кроме счёта и суммы.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memo {
    pub description: String,
    pub role: Role,
    pub kind: EntryKind,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
    pub bet_amount: Option<Tokens>,
}

impl Memo {
    pub fn new(
        role: Role,
        kind: EntryKind,
        correlation_id: impl Into<CorrelationId>,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            description: description.into(),
            role,
            kind,
            correlation_id: correlation_id.into(),
            timestamp,
            bet_amount: None,
        }
    }

    pub fn with_bet_amount(mut self, amount: Tokens) -> Self {
        self.bet_amount = Some(amount);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}
