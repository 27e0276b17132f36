use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::bet::BetError;
use crate::domain::{AccountId, EnvelopeId, Tokens};

/// Класс ошибки — то, по чему диспетчер решает, что ответить пользователю.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    /// Некорректные входные данные, отклонено до любых изменений.
    Validation,
    /// Не хватает токенов (у игрока, у банка, у отправителя).
    InsufficientFunds,
    /// Операция недопустима в текущем состоянии.
    StateConflict,
    /// Счёт / игра / конверт не найдены.
    NotFound,
    /// Нет прав на операцию.
    Forbidden,
    /// Нарушен внутренний инвариант: леджер повреждён.
    Fatal,
}

/// Ошибки движка экономики.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    // --- Validation ---
    #[error("Сумма должна быть больше нуля")]
    NonPositiveAmount,

    #[error("Некорректная ставка: {0}")]
    InvalidBet(#[from] BetError),

    #[error("Не указано ни одной ставки")]
    EmptyBets,

    #[error("Общая ставка {total} превышает лимит {limit}")]
    StakeLimitExceeded { total: Tokens, limit: Tokens },

    #[error("Нужно бросить хотя бы один кубик")]
    ZeroDice,

    #[error("Количество получателей должно быть больше нуля")]
    NoRecipients,

    #[error("Нельзя разделить {total} токенов на {recipients} долей")]
    TooManyRecipients { total: Tokens, recipients: usize },

    #[error("Слишком много получателей: {recipients} (максимум {limit})")]
    RecipientLimitExceeded { recipients: usize, limit: usize },

    #[error("Нельзя отправить личный конверт самому себе")]
    SelfTarget,

    // --- InsufficientFunds ---
    #[error("Недостаточно токенов на счёте {account_id}: нужно {required}, доступно {available}")]
    InsufficientFunds {
        account_id: AccountId,
        required: Tokens,
        available: Tokens,
    },

    #[error("Банк не покроет возможный выигрыш {required} (в банке {available})")]
    HouseCannotCover { required: Tokens, available: Tokens },

    // --- StateConflict ---
    #[error("У игрока {0} уже есть активная игра")]
    SessionAlreadyOpen(AccountId),

    #[error("Банк не назначен")]
    NoHouse,

    #[error("Банк уже назначен: {0}")]
    HouseAlreadyDesignated(AccountId),

    #[error("Нельзя освободить банк: активных игр {0}")]
    SessionsStillActive(usize),

    #[error("Банк не может играть сам с собой")]
    HouseCannotPlay,

    #[error("Конверт {0} уже подтверждён")]
    EnvelopeNotPending(EnvelopeId),

    #[error("Конверт {0} ещё не подтверждён отправителем")]
    EnvelopeNotSent(EnvelopeId),

    #[error("Конверт {0} уже разобран")]
    EnvelopeDepleted(EnvelopeId),

    #[error("Счёт {account_id} уже забрал долю конверта {envelope_id}")]
    AlreadyClaimed {
        envelope_id: EnvelopeId,
        account_id: AccountId,
    },

    #[error("Отправитель не может забрать свой конверт")]
    SenderCannotClaim,

    #[error("Из конверта {0} уже забирали доли, отзыв невозможен")]
    EnvelopePartiallyClaimed(EnvelopeId),

    // --- NotFound ---
    #[error("Счёт {0} не найден")]
    AccountNotFound(AccountId),

    #[error("У игрока {0} нет активной игры")]
    NoActiveSession(AccountId),

    #[error("Конверт {0} не найден")]
    EnvelopeNotFound(EnvelopeId),

    // --- Forbidden ---
    #[error("Счёт {0} не является банком")]
    NotHouse(AccountId),

    #[error("Конверт {envelope_id} адресован другому получателю")]
    NotEnvelopeTarget { envelope_id: EnvelopeId },

    #[error("Только отправитель может подтвердить конверт {0}")]
    NotEnvelopeSender(EnvelopeId),

    #[error("Счёт {0} не администратор")]
    NotAdmin(AccountId),

    // --- Fatal ---
    #[error("Леджер повреждён: {0}")]
    LedgerCorrupted(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(&'static str),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        use EngineError::*;

        match self {
            NonPositiveAmount | InvalidBet(_) | EmptyBets | StakeLimitExceeded { .. } | ZeroDice
            | NoRecipients | TooManyRecipients { .. } | RecipientLimitExceeded { .. } | SelfTarget => {
                ErrorKind::Validation
            }

            InsufficientFunds { .. } | HouseCannotCover { .. } => ErrorKind::InsufficientFunds,

            SessionAlreadyOpen(_) | NoHouse | HouseAlreadyDesignated(_)
            | SessionsStillActive(_) | HouseCannotPlay | EnvelopeNotPending(_)
            | EnvelopeNotSent(_) | EnvelopeDepleted(_) | AlreadyClaimed { .. }
            | SenderCannotClaim | EnvelopePartiallyClaimed(_) => ErrorKind::StateConflict,

            AccountNotFound(_) | NoActiveSession(_) | EnvelopeNotFound(_) => ErrorKind::NotFound,

            NotHouse(_) | NotEnvelopeTarget { .. } | NotEnvelopeSender(_) | NotAdmin(_) => {
                ErrorKind::Forbidden
            }

            LedgerCorrupted(_) | Internal(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}
