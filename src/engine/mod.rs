//! Движок экономики: леджер, банк, игры в кости, красные конверты.
//!
//! Высокоуровневые объекты:
//!   - `LedgerStore` – балансы и история, единственное место изменения денег
//!   - `HouseManager` – кто сейчас банк, выплаты/сборы
//!   - `SessionBook` – активные игры, броски, расчёт
//!   - `EnvelopeBook` – создание, подтверждение, получение и отзыв конвертов
//!
//! Движок синхронный и не знает о блокировках: атомарность
//! обеспечивает вызывающий (`CasinoService`).

pub mod envelope;
pub mod errors;
pub mod house;
pub mod ledger;
pub mod session;
pub mod settlement;
pub mod split;

pub use envelope::{ClaimReceipt, EnvelopeBook};
pub use errors::{EngineError, ErrorKind};
pub use house::HouseManager;
pub use ledger::{LedgerStore, SharedHistory};
pub use session::{
    CancelOutcome, GameSession, OpenedSession, RollOutcome, SessionBook, SessionRules,
    SessionStatus,
};
pub use settlement::{settle, BetOutcome, BetResult, SettlementReport};
pub use split::split_amount;

use crate::domain::DIE_FACES;

/// RNG интерфейс для engine.
/// Реализации — в `infra::rng` (системная, детерминированная, скриптованная).
pub trait RandomSource {
    fn shuffle<T>(&mut self, slice: &mut [T]);

    /// Равномерно из `[low, high]`, `low <= high`.
    fn range_inclusive(&mut self, low: u64, high: u64) -> u64;

    fn roll_die(&mut self) -> u8 {
        // <= 6, приведение без потерь
        self.range_inclusive(1, u64::from(DIE_FACES)) as u8
    }

    /// Индекс из `[0, len)`; для `len == 0` возвращает 0.
    fn pick_index(&mut self, len: usize) -> usize {
        let high = len.saturating_sub(1) as u64;
        self.range_inclusive(0, high) as usize
    }
}
