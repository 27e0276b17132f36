use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::tokens::Tokens;

/// Минимальная сумма трёх кубиков.
pub const MIN_TOTAL: u8 = 3;
/// Максимальная сумма трёх кубиков.
pub const MAX_TOTAL: u8 = 18;

/// Граница "малых" сумм: 3..=10 — малые, 11..=18 — большие.
const SMALL_MAX: u8 = 10;

/// Ошибки построения ставки.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BetError {
    #[error("сумма {0} вне диапазона 3..=18")]
    TotalOutOfRange(u8),

    #[error("ставка должна быть больше нуля")]
    ZeroStake,

    #[error("неизвестный тип ставки: {0}")]
    UnknownKind(String),
}

/// Тип ставки. Закрытый набор: любой тип обязан иметь множитель в схеме.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BetKind {
    Big,
    Small,
    Odd,
    Even,
    BigOdd,
    BigEven,
    SmallOdd,
    SmallEven,
    /// Конкретная сумма трёх кубиков.
    Total(u8),
}

impl BetKind {
    /// Ставка на конкретную сумму с проверкой диапазона.
    pub fn total(value: u8) -> Result<Self, BetError> {
        if (MIN_TOTAL..=MAX_TOTAL).contains(&value) {
            Ok(BetKind::Total(value))
        } else {
            Err(BetError::TotalOutOfRange(value))
        }
    }

    pub fn validate(&self) -> Result<(), BetError> {
        match *self {
            BetKind::Total(value) => BetKind::total(value).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Выигрывает ли ставка при данной сумме кубиков.
    pub fn wins(&self, total: u8) -> bool {
        if !(MIN_TOTAL..=MAX_TOTAL).contains(&total) {
            return false;
        }
        let big = total > SMALL_MAX;
        let odd = total % 2 == 1;

        match *self {
            BetKind::Big => big,
            BetKind::Small => !big,
            BetKind::Odd => odd,
            BetKind::Even => !odd,
            BetKind::BigOdd => big && odd,
            BetKind::BigEven => big && !odd,
            BetKind::SmallOdd => !big && odd,
            BetKind::SmallEven => !big && !odd,
            BetKind::Total(value) => total == value,
        }
    }
}

impl fmt::Display for BetKind {
    /// Формат вида `BIG`, `SMALL-ODD`, `TOTAL-7`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetKind::Big => write!(f, "BIG"),
            BetKind::Small => write!(f, "SMALL"),
            BetKind::Odd => write!(f, "ODD"),
            BetKind::Even => write!(f, "EVEN"),
            BetKind::BigOdd => write!(f, "BIG-ODD"),
            BetKind::BigEven => write!(f, "BIG-EVEN"),
            BetKind::SmallOdd => write!(f, "SMALL-ODD"),
            BetKind::SmallEven => write!(f, "SMALL-EVEN"),
            BetKind::Total(value) => write!(f, "TOTAL-{value}"),
        }
    }
}

/// Парсинг канонических меток (то, что печатает `Display`).
/// Разбор свободного текста из чата живёт снаружи.
impl FromStr for BetKind {
    type Err = BetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let kind = match upper.as_str() {
            "BIG" => BetKind::Big,
            "SMALL" => BetKind::Small,
            "ODD" => BetKind::Odd,
            "EVEN" => BetKind::Even,
            "BIG-ODD" => BetKind::BigOdd,
            "BIG-EVEN" => BetKind::BigEven,
            "SMALL-ODD" => BetKind::SmallOdd,
            "SMALL-EVEN" => BetKind::SmallEven,
            other => {
                let value = other
                    .strip_prefix("TOTAL-")
                    .and_then(|v| v.parse::<u8>().ok())
                    .ok_or_else(|| BetError::UnknownKind(s.to_string()))?;
                BetKind::total(value)?
            }
        };
        Ok(kind)
    }
}

/// Одна ставка игрока.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bet {
    pub kind: BetKind,
    pub stake: Tokens,
}

impl Bet {
    pub fn new(kind: BetKind, stake: Tokens) -> Result<Self, BetError> {
        let bet = Self { kind, stake };
        bet.validate()?;
        Ok(bet)
    }

    /// Поля публичные (ставки приходят и через serde), поэтому
    /// движок перепроверяет их перед приёмом.
    pub fn validate(&self) -> Result<(), BetError> {
        if self.stake.is_zero() {
            return Err(BetError::ZeroStake);
        }
        self.kind.validate()
    }
}

/// Суммарная ставка; `None` при переполнении.
pub fn total_stake(bets: &[Bet]) -> Option<Tokens> {
    bets.iter()
        .try_fold(Tokens::ZERO, |acc, bet| acc.checked_add(bet.stake))
}
