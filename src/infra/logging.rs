use tracing::Level;

/// Поставить fmt-подписчика с фиксированным уровнем.
/// Повторный вызов (например, из нескольких тестов) ничего не делает.
pub fn init_tracing(level: Level) {
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}
