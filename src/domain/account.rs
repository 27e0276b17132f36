use serde::{Deserialize, Serialize};

use crate::domain::tokens::Tokens;
use crate::domain::AccountId;

/// Счёт участника (или банка) в леджере.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    /// Идентификатор пользователя в чат-платформе.
    /// У системных счетов (банк по умолчанию) его нет.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub display_name: String,
    /// Текущий баланс. Меняется только через проводки леджера.
    pub balance: Tokens,
}

impl Account {
    pub fn new(id: AccountId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            external_id: None,
            display_name: display_name.into(),
            balance: Tokens::ZERO,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn is_system(&self) -> bool {
        self.external_id.is_none()
    }
}
