use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, ErrorKind};

/// Ошибки внешнего API (то, что отдаём диспетчеру чата).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApiError {
    /// Неправильные входные данные (битая ставка, ноль кубиков, ...).
    BadRequest(String),

    /// Не хватает токенов у игрока или у банка.
    InsufficientFunds(String),

    /// Команда не может быть выполнена в текущем состоянии.
    Conflict(String),

    /// Счёт, игра или конверт не найдены.
    NotFound(String),

    /// Нет прав на операцию.
    Forbidden(String),

    /// Внутренняя ошибка сервера.
    Internal(String),
}

impl ApiError {
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::InsufficientFunds(m)
            | ApiError::Conflict(m)
            | ApiError::NotFound(m)
            | ApiError::Forbidden(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => ApiError::BadRequest(message),
            ErrorKind::InsufficientFunds => ApiError::InsufficientFunds(message),
            ErrorKind::StateConflict => ApiError::Conflict(message),
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::Forbidden => ApiError::Forbidden(message),
            ErrorKind::Fatal => ApiError::Internal(message),
        }
    }
}
