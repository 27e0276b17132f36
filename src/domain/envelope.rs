use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tokens::Tokens;
use crate::domain::{AccountId, EnvelopeId};

/// Кому адресован конверт.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Visibility {
    /// Любой участник, кроме отправителя.
    Public,
    /// Только указанный получатель.
    Private { target: AccountId },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    /// Деньги списаны, но конверт ещё не подтверждён отправителем.
    Pending,
    /// Подтверждён, доли можно забирать.
    Sent,
}

/// Красный конверт: предоплаченный подарок, разбитый на доли.
///
/// `shares` и `claimed_by` всегда одной длины; сумма долей = `total_amount`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub id: EnvelopeId,
    pub sender: AccountId,
    pub total_amount: Tokens,
    pub shares: Vec<Tokens>,
    pub claimed_by: Vec<Option<AccountId>>,
    pub visibility: Visibility,
    pub status: EnvelopeStatus,
    pub created_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(
        id: EnvelopeId,
        sender: AccountId,
        shares: Vec<Tokens>,
        visibility: Visibility,
        created_at: DateTime<Utc>,
    ) -> Self {
        let total_amount = shares.iter().sum();
        let claimed_by = vec![None; shares.len()];
        Self {
            id,
            sender,
            total_amount,
            shares,
            claimed_by,
            visibility,
            status: EnvelopeStatus::Pending,
            created_at,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self.visibility, Visibility::Private { .. })
    }

    /// Индексы ещё не забранных долей.
    pub fn unclaimed_indices(&self) -> Vec<usize> {
        self.claimed_by
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn unclaimed_count(&self) -> usize {
        self.claimed_by.iter().filter(|c| c.is_none()).count()
    }

    pub fn claimed_count(&self) -> usize {
        self.shares.len() - self.unclaimed_count()
    }

    /// Сколько токенов ещё лежит в конверте.
    pub fn unclaimed_amount(&self) -> Tokens {
        self.shares
            .iter()
            .zip(&self.claimed_by)
            .filter(|(_, c)| c.is_none())
            .map(|(s, _)| *s)
            .sum()
    }

    pub fn is_depleted(&self) -> bool {
        self.unclaimed_count() == 0
    }

    pub fn has_claim_from(&self, account_id: &str) -> bool {
        self.claimed_by
            .iter()
            .any(|c| c.as_deref() == Some(account_id))
    }

    /// Пометить долю забранной. Возвращает её размер.
    pub(crate) fn mark_claimed(&mut self, index: usize, claimant: AccountId) -> Option<Tokens> {
        let slot = self.claimed_by.get_mut(index)?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(claimant);
        self.shares.get(index).copied()
    }
}
