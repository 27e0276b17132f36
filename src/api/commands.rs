use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, EnvelopeId, Tokens};
use crate::engine::{CancelOutcome, ClaimReceipt, OpenedSession, RollOutcome};

use super::dto::{AccountDto, BetDto, EnvelopeDto};

/// Команда верхнего уровня: всё, что меняет состояние.
///
/// Диспетчер чата разбирает текст сообщения и присылает одну из них.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Command {
    /// Завести счёт по внутреннему id (или вернуть существующий).
    EnsureAccount {
        account_id: AccountId,
        display_name: String,
    },

    /// Найти / создать счёт пользователя чата.
    ResolveAccount {
        external_id: String,
        display_name: String,
    },

    /// Открыть игру со ставками.
    OpenSession(OpenSessionCommand),

    /// Бросить 1–3 кубика.
    RollDice { account_id: AccountId, count: usize },

    /// Отменить игру до первого броска.
    CancelSession { account_id: AccountId },

    DesignateHouse { account_id: AccountId },

    VacateHouse { requester: AccountId },

    /// Конверты: создание, подтверждение, получение, отзыв.
    Envelope(EnvelopeCommand),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenSessionCommand {
    pub account_id: AccountId,
    pub bets: Vec<BetDto>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EnvelopeCommand {
    CreatePublic {
        sender: AccountId,
        total: Tokens,
        recipients: usize,
    },
    CreatePrivate {
        sender: AccountId,
        target: AccountId,
        amount: Tokens,
    },
    Confirm {
        sender: AccountId,
        envelope_id: EnvelopeId,
    },
    /// Подтвердить все неподтверждённые конверты отправителя.
    ConfirmAll { sender: AccountId },
    Claim {
        envelope_id: EnvelopeId,
        claimant: AccountId,
    },
    Revoke {
        envelope_id: EnvelopeId,
        requester: AccountId,
    },
}

/// Ответ на команду.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CommandResponse {
    Account(AccountDto),
    SessionOpened(OpenedSession),
    Rolled(RollOutcome),
    Cancelled(CancelOutcome),
    HouseDesignated { account_id: AccountId },
    HouseVacated { account_id: AccountId },
    EnvelopeCreated(EnvelopeDto),
    EnvelopesConfirmed { envelope_ids: Vec<EnvelopeId> },
    EnvelopeClaimed(ClaimReceipt),
    EnvelopeRevoked { envelope_id: EnvelopeId, refunded: Tokens },
}
