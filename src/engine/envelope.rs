use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::history::{EntryKind, Memo, Role};
use crate::domain::{
    AccountId, Envelope, EnvelopeId, EnvelopeStatus, Tokens, Visibility,
};
use crate::engine::errors::EngineError;
use crate::engine::ledger::LedgerStore;
use crate::engine::split::split_amount;
use crate::engine::RandomSource;

/// Результат успешного получения доли.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub envelope_id: EnvelopeId,
    pub claimant: AccountId,
    pub amount: Tokens,
    pub balance: Tokens,
    pub remaining_shares: usize,
}

/// Лимит получателей публичного конверта по умолчанию.
pub const DEFAULT_MAX_RECIPIENTS: usize = 100;

/// Все красные конверты + список администраторов, которым разрешён отзыв.
///
/// Деньги списываются с отправителя при создании, поэтому
/// сумма балансов + незабранные доли сохраняется.
#[derive(Clone, Debug)]
pub struct EnvelopeBook {
    envelopes: BTreeMap<EnvelopeId, Envelope>,
    admins: BTreeSet<AccountId>,
    max_recipients: usize,
}

impl Default for EnvelopeBook {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl EnvelopeBook {
    pub fn new(admins: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            envelopes: BTreeMap::new(),
            admins: admins.into_iter().collect(),
            max_recipients: DEFAULT_MAX_RECIPIENTS,
        }
    }

    pub fn from_parts(
        envelopes: impl IntoIterator<Item = Envelope>,
        admins: impl IntoIterator<Item = AccountId>,
    ) -> Self {
        Self {
            envelopes: envelopes.into_iter().map(|e| (e.id.clone(), e)).collect(),
            admins: admins.into_iter().collect(),
            max_recipients: DEFAULT_MAX_RECIPIENTS,
        }
    }

    pub fn with_max_recipients(mut self, limit: usize) -> Self {
        self.set_max_recipients(limit);
        self
    }

    pub fn set_max_recipients(&mut self, limit: usize) {
        self.max_recipients = limit.max(1);
    }

    pub fn max_recipients(&self) -> usize {
        self.max_recipients
    }

    pub fn get(&self, envelope_id: &str) -> Option<&Envelope> {
        self.envelopes.get(envelope_id)
    }

    pub fn contains(&self, envelope_id: &str) -> bool {
        self.envelopes.contains_key(envelope_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.envelopes.values()
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    pub fn is_admin(&self, account_id: &str) -> bool {
        self.admins.contains(account_id)
    }

    /// Сколько токенов лежит в незабранных долях.
    pub fn unclaimed_total(&self) -> u128 {
        self.envelopes
            .values()
            .map(|e| u128::from(e.unclaimed_amount().0))
            .sum()
    }

    /// Неподтверждённые конверты отправителя.
    pub fn pending_of(&self, sender: &str) -> Vec<EnvelopeId> {
        self.envelopes
            .values()
            .filter(|e| e.sender == sender && e.status == EnvelopeStatus::Pending)
            .map(|e| e.id.clone())
            .collect()
    }

    /// Публичный конверт: `total` случайно делится на `recipients` долей.
    #[allow(clippy::too_many_arguments)]
    pub fn create_public<R: RandomSource>(
        &mut self,
        ledger: &mut LedgerStore,
        rng: &mut R,
        sender: &str,
        total: Tokens,
        recipients: usize,
        envelope_id: EnvelopeId,
        now: DateTime<Utc>,
    ) -> Result<Envelope, EngineError> {
        // Все дешёвые проверки до деления: оно линейно по числу долей.
        if total.is_zero() {
            return Err(EngineError::NonPositiveAmount);
        }
        if recipients == 0 {
            return Err(EngineError::NoRecipients);
        }
        if recipients > self.max_recipients {
            return Err(EngineError::RecipientLimitExceeded {
                recipients,
                limit: self.max_recipients,
            });
        }
        if u64::try_from(recipients).map_or(true, |n| n > total.0) {
            return Err(EngineError::TooManyRecipients { total, recipients });
        }
        let available = ledger.balance_of(sender)?;
        if total > available {
            return Err(EngineError::InsufficientFunds {
                account_id: sender.to_string(),
                required: total,
                available,
            });
        }
        let shares = split_amount(rng, total, recipients)?;
        let envelope = Envelope::new(envelope_id, sender.to_string(), shares, Visibility::Public, now);
        self.fund(ledger, envelope, now)
    }

    /// Приватный конверт: одна доля для конкретного получателя.
    pub fn create_private(
        &mut self,
        ledger: &mut LedgerStore,
        sender: &str,
        target: &str,
        amount: Tokens,
        envelope_id: EnvelopeId,
        now: DateTime<Utc>,
    ) -> Result<Envelope, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::NonPositiveAmount);
        }
        if sender == target {
            return Err(EngineError::SelfTarget);
        }
        for id in [sender, target] {
            if !ledger.contains(id) {
                return Err(EngineError::AccountNotFound(id.to_string()));
            }
        }
        let visibility = Visibility::Private {
            target: target.to_string(),
        };
        let envelope = Envelope::new(envelope_id, sender.to_string(), vec![amount], visibility, now);
        self.fund(ledger, envelope, now)
    }

    fn fund(
        &mut self,
        ledger: &mut LedgerStore,
        envelope: Envelope,
        now: DateTime<Utc>,
    ) -> Result<Envelope, EngineError> {
        if self.envelopes.contains_key(&envelope.id) {
            return Err(EngineError::Internal("id конверта уже занят"));
        }
        let description = match &envelope.visibility {
            Visibility::Public => format!(
                "Красный конверт на {} ({} долей)",
                envelope.total_amount,
                envelope.shares.len()
            ),
            Visibility::Private { target } => {
                format!("Красный конверт на {} для {target}", envelope.total_amount)
            }
        };
        let memo = Memo::new(
            Role::Player,
            EntryKind::EnvelopeFunding,
            &envelope.id,
            description,
            now,
        );
        ledger.debit(&envelope.sender, envelope.total_amount, memo)?;

        info!(
            envelope_id = %envelope.id,
            sender = %envelope.sender,
            total = %envelope.total_amount,
            shares = envelope.shares.len(),
            private = envelope.is_private(),
            "конверт создан"
        );
        self.envelopes.insert(envelope.id.clone(), envelope.clone());
        Ok(envelope)
    }

    /// Подтвердить отправку одного конверта.
    pub fn confirm(&mut self, sender: &str, envelope_id: &str) -> Result<(), EngineError> {
        let envelope = self
            .envelopes
            .get_mut(envelope_id)
            .ok_or_else(|| EngineError::EnvelopeNotFound(envelope_id.to_string()))?;
        if envelope.sender != sender {
            return Err(EngineError::NotEnvelopeSender(envelope_id.to_string()));
        }
        if envelope.status != EnvelopeStatus::Pending {
            return Err(EngineError::EnvelopeNotPending(envelope_id.to_string()));
        }
        envelope.status = EnvelopeStatus::Sent;
        debug!(envelope_id, sender, "конверт подтверждён");
        Ok(())
    }

    /// Подтвердить все неподтверждённые конверты отправителя.
    pub fn confirm_all(&mut self, sender: &str) -> Vec<EnvelopeId> {
        let confirmed: Vec<EnvelopeId> = self
            .envelopes
            .values_mut()
            .filter(|e| e.sender == sender && e.status == EnvelopeStatus::Pending)
            .map(|e| {
                e.status = EnvelopeStatus::Sent;
                e.id.clone()
            })
            .collect();
        debug!(sender, count = confirmed.len(), "подтверждены все конверты");
        confirmed
    }

    /// Забрать долю. Публичный: случайная из незабранных, одна на счёт.
    /// Приватный: единственная доля, только для адресата.
    pub fn claim<R: RandomSource>(
        &mut self,
        ledger: &mut LedgerStore,
        rng: &mut R,
        envelope_id: &str,
        claimant: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimReceipt, EngineError> {
        let envelope = self
            .envelopes
            .get_mut(envelope_id)
            .ok_or_else(|| EngineError::EnvelopeNotFound(envelope_id.to_string()))?;

        if envelope.status != EnvelopeStatus::Sent {
            return Err(EngineError::EnvelopeNotSent(envelope_id.to_string()));
        }
        if envelope.sender == claimant {
            return Err(EngineError::SenderCannotClaim);
        }
        if let Visibility::Private { target } = &envelope.visibility {
            if target != claimant {
                warn!(envelope_id, claimant, "попытка забрать чужой конверт");
                return Err(EngineError::NotEnvelopeTarget {
                    envelope_id: envelope_id.to_string(),
                });
            }
        }
        if !ledger.contains(claimant) {
            return Err(EngineError::AccountNotFound(claimant.to_string()));
        }
        if envelope.has_claim_from(claimant) {
            return Err(EngineError::AlreadyClaimed {
                envelope_id: envelope_id.to_string(),
                account_id: claimant.to_string(),
            });
        }

        let unclaimed = envelope.unclaimed_indices();
        let index = match (envelope.is_private(), unclaimed.as_slice()) {
            (_, []) => return Err(EngineError::EnvelopeDepleted(envelope_id.to_string())),
            (true, [first, ..]) => *first,
            (false, slots) => slots[rng.pick_index(slots.len()).min(slots.len() - 1)],
        };
        let amount = envelope
            .shares
            .get(index)
            .copied()
            .ok_or(EngineError::Internal("индекс доли вне конверта"))?;

        let memo = Memo::new(
            Role::Player,
            EntryKind::EnvelopeClaim,
            envelope_id,
            format!("Получено {amount} из конверта {envelope_id} от {}", envelope.sender),
            now,
        );
        let balance = ledger.credit(claimant, amount, memo)?;
        envelope
            .mark_claimed(index, claimant.to_string())
            .ok_or(EngineError::Internal("доля уже была забрана"))?;

        let remaining_shares = envelope.unclaimed_count();
        info!(envelope_id, claimant, %amount, remaining_shares, "доля конверта получена");

        Ok(ClaimReceipt {
            envelope_id: envelope_id.to_string(),
            claimant: claimant.to_string(),
            amount,
            balance,
            remaining_shares,
        })
    }

    /// Отзыв администратором: только если ни одна доля не забрана.
    /// Вся сумма возвращается отправителю, конверт удаляется.
    pub fn revoke(
        &mut self,
        ledger: &mut LedgerStore,
        envelope_id: &str,
        requester: &str,
        now: DateTime<Utc>,
    ) -> Result<Tokens, EngineError> {
        if !self.is_admin(requester) {
            return Err(EngineError::NotAdmin(requester.to_string()));
        }
        let envelope = self
            .envelopes
            .get(envelope_id)
            .ok_or_else(|| EngineError::EnvelopeNotFound(envelope_id.to_string()))?;
        if envelope.claimed_count() > 0 {
            return Err(EngineError::EnvelopePartiallyClaimed(envelope_id.to_string()));
        }

        let sender = envelope.sender.clone();
        let total = envelope.total_amount;
        let memo = Memo::new(
            Role::System,
            EntryKind::EnvelopeRevoked,
            envelope_id,
            format!("Конверт {envelope_id} отозван, возврат {total}"),
            now,
        );
        ledger.credit(&sender, total, memo)?;
        self.envelopes.remove(envelope_id);

        info!(envelope_id, requester, sender = %sender, %total, "конверт отозван");
        Ok(total)
    }
}
