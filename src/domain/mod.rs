//! Доменная модель экономики: токены, счета, история, ставки, кубики,
//! схема выплат и красные конверты.

pub mod account;
pub mod bet;
pub mod dice;
pub mod envelope;
pub mod history;
pub mod payout;
pub mod tokens;

// Идентификаторы — строки: внутренние id счетов, "номера периодов" игр и конвертов.
pub type AccountId = String;
pub type EnvelopeId = String;
pub type CorrelationId = String;

pub use account::*;
pub use bet::*;
pub use dice::*;
pub use envelope::*;
pub use history::*;
pub use payout::*;
pub use tokens::*;
