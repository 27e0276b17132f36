//! Экономика игры в кости для чат-бота.
//!
//! Игроки ставят токены на исход броска трёх кубиков, один счёт-банк
//! покрывает все выплаты, красные конверты перераспределяют токены
//! между участниками.
//!
//! Слои:
//! - `domain` – токены, счета, история, ставки, схема выплат, конверты;
//! - `engine` – леджер, банк, игры, расчёт, конверты;
//! - `infra` – RNG, генерация id, конфиг, запись снапшотов, логи;
//! - `api` – команды / запросы / DTO для диспетчера чата;
//! - `service` – фасад под одной блокировкой.

pub mod api;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod service;
pub mod state;

pub use service::{CasinoService, StartupError};
pub use state::{CasinoState, LedgerSnapshot};
