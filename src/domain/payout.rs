use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::bet::{Bet, BetKind, MAX_TOTAL, MIN_TOTAL};
use crate::domain::dice::DIE_FACES;
use crate::domain::tokens::Tokens;

/// Всего исходов у трёх кубиков.
const OUTCOMES: u64 = (DIE_FACES as u64) * (DIE_FACES as u64) * (DIE_FACES as u64);

/// Множитель выплаты в сотых долях: `197` = ×1.97.
///
/// Дробные множители храним целыми, чтобы выигрыш
/// `floor(stake × multiplier)` считался без плавающей точки.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Multiplier(u32);

impl Multiplier {
    pub const ZERO: Multiplier = Multiplier(0);

    pub const fn from_hundredths(hundredths: u32) -> Self {
        Multiplier(hundredths)
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `floor(stake × multiplier)`, с насыщением на u64::MAX.
    pub fn apply(self, stake: Tokens) -> Tokens {
        let raw = u128::from(stake.0) * u128::from(self.0) / 100;
        Tokens(u64::try_from(raw).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayoutSchemaError {
    #[error("в схеме нет множителя для суммы {0}")]
    MissingTotal(u8),

    #[error("нулевой множитель для ставки {0}")]
    ZeroMultiplier(BetKind),

    #[error("лишняя сумма {0} в схеме")]
    UnexpectedTotal(u8),
}

/// Схема множителей. Настраивается конфигом: разные сборки игры
/// использовали то плоскую, то взвешенную по вероятностям таблицу сумм.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutSchema {
    pub big: Multiplier,
    pub small: Multiplier,
    pub odd: Multiplier,
    pub even: Multiplier,
    pub big_odd: Multiplier,
    pub big_even: Multiplier,
    pub small_odd: Multiplier,
    pub small_even: Multiplier,
    /// Множители ставок на конкретную сумму, ключ — сумма 3..=18.
    pub totals: BTreeMap<u8, Multiplier>,
}

impl PayoutSchema {
    /// Таблица, с которой игра работала в чате.
    pub fn classic() -> Self {
        let totals = [
            (3, 500),
            (4, 300),
            (5, 300),
            (6, 300),
            (7, 200),
            (8, 300),
            (9, 300),
            (10, 300),
            (11, 400),
            (12, 300),
            (13, 400),
            (14, 300),
            (15, 400),
            (16, 300),
            (17, 400),
            (18, 300),
        ]
        .into_iter()
        .map(|(total, h)| (total, Multiplier::from_hundredths(h)))
        .collect();

        Self {
            big: Multiplier::from_hundredths(197),
            small: Multiplier::from_hundredths(197),
            odd: Multiplier::from_hundredths(197),
            even: Multiplier::from_hundredths(197),
            big_odd: Multiplier::from_hundredths(390),
            big_even: Multiplier::from_hundredths(390),
            small_odd: Multiplier::from_hundredths(290),
            small_even: Multiplier::from_hundredths(290),
            totals,
        }
    }

    /// Множители из честных вероятностей минус преимущество банка.
    ///
    /// `edge_bps` — преимущество в базисных пунктах (300 = 3%).
    pub fn odds_weighted(edge_bps: u32) -> Self {
        let edge_bps = edge_bps.min(10_000);
        let fair = |kind: BetKind| -> Multiplier {
            let ways = winning_outcomes(kind);
            if ways == 0 {
                return Multiplier::ZERO;
            }
            let h = OUTCOMES * 100 * u64::from(10_000 - edge_bps) / (ways * 10_000);
            Multiplier::from_hundredths(u32::try_from(h).unwrap_or(u32::MAX))
        };

        Self {
            big: fair(BetKind::Big),
            small: fair(BetKind::Small),
            odd: fair(BetKind::Odd),
            even: fair(BetKind::Even),
            big_odd: fair(BetKind::BigOdd),
            big_even: fair(BetKind::BigEven),
            small_odd: fair(BetKind::SmallOdd),
            small_even: fair(BetKind::SmallEven),
            totals: (MIN_TOTAL..=MAX_TOTAL)
                .map(|t| (t, fair(BetKind::Total(t))))
                .collect(),
        }
    }

    /// Полная проверка схемы: у каждого типа ставки есть ненулевой множитель.
    pub fn validate(&self) -> Result<(), PayoutSchemaError> {
        for total in MIN_TOTAL..=MAX_TOTAL {
            match self.totals.get(&total) {
                None => return Err(PayoutSchemaError::MissingTotal(total)),
                Some(m) if m.is_zero() => {
                    return Err(PayoutSchemaError::ZeroMultiplier(BetKind::Total(total)))
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = self
            .totals
            .keys()
            .find(|t| !(MIN_TOTAL..=MAX_TOTAL).contains(*t))
        {
            return Err(PayoutSchemaError::UnexpectedTotal(*extra));
        }

        let named = [
            BetKind::Big,
            BetKind::Small,
            BetKind::Odd,
            BetKind::Even,
            BetKind::BigOdd,
            BetKind::BigEven,
            BetKind::SmallOdd,
            BetKind::SmallEven,
        ];
        match named.into_iter().find(|k| self.multiplier_for(*k).is_zero()) {
            Some(kind) => Err(PayoutSchemaError::ZeroMultiplier(kind)),
            None => Ok(()),
        }
    }

    /// Множитель выигравшей ставки данного типа.
    pub fn multiplier_for(&self, kind: BetKind) -> Multiplier {
        match kind {
            BetKind::Big => self.big,
            BetKind::Small => self.small,
            BetKind::Odd => self.odd,
            BetKind::Even => self.even,
            BetKind::BigOdd => self.big_odd,
            BetKind::BigEven => self.big_even,
            BetKind::SmallOdd => self.small_odd,
            BetKind::SmallEven => self.small_even,
            // Валидная схема содержит все суммы (см. validate).
            BetKind::Total(t) => self.totals.get(&t).copied().unwrap_or(Multiplier::ZERO),
        }
    }

    /// Результат ставки при сумме `total`: `Some((множитель, выигрыш))`,
    /// если ставка сыграла.
    pub fn evaluate(&self, bet: &Bet, total: u8) -> Option<(Multiplier, Tokens)> {
        if !bet.kind.wins(total) {
            return None;
        }
        let multiplier = self.multiplier_for(bet.kind);
        Some((multiplier, multiplier.apply(bet.stake)))
    }

    /// Худший для банка исход: максимум по всем суммам 3..=18
    /// от суммарного выигрыша ставок, сыгравших при этой сумме.
    pub fn worst_case_payout(&self, bets: &[Bet]) -> Tokens {
        (MIN_TOTAL..=MAX_TOTAL)
            .map(|total| {
                bets.iter()
                    .filter_map(|bet| self.evaluate(bet, total))
                    .map(|(_, winnings)| winnings)
                    .sum::<Tokens>()
            })
            .max()
            .unwrap_or(Tokens::ZERO)
    }
}

impl Default for PayoutSchema {
    fn default() -> Self {
        Self::classic()
    }
}

/// Сколько из 216 исходов трёх кубиков выигрывают для данного типа.
pub fn winning_outcomes(kind: BetKind) -> u64 {
    let faces = 1..=DIE_FACES;
    let mut ways = 0;
    for a in faces.clone() {
        for b in faces.clone() {
            for c in faces.clone() {
                if kind.wins(a + b + c) {
                    ways += 1;
                }
            }
        }
    }
    ways
}
