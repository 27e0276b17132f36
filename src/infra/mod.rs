//! Инфраструктурный слой вокруг движка:
//! - генерация ID;
//! - RNG-реализации для движка;
//! - конфиг (YAML);
//! - фоновая запись снапшотов леджера;
//! - настройка логов.

pub mod config;
pub mod ids;
pub mod logging;
pub mod persistence;
pub mod rng;

pub use config::*;
pub use ids::*;
pub use logging::init_tracing;
pub use persistence::*;
pub use rng::*;
