use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::history::{EntryKind, HistoryRecord, Memo, Role};
use crate::domain::{Account, AccountId, Tokens};
use crate::engine::errors::EngineError;

/// Направление проводки.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Credit,
    Debit,
}

/// История одного счёта. `Arc`: снапшот делит её с леджером, а запись
/// копирует вектор только если снапшот ещё не записан (`Arc::make_mut`).
pub type SharedHistory = Arc<Vec<HistoryRecord>>;

/// Хранилище счетов: баланс + история на каждый счёт.
///
/// Единственный источник правды о том, у кого сколько токенов.
/// Баланс меняется только вместе с записью в историю — одним шагом.
#[derive(Clone, Debug, Default)]
pub struct LedgerStore {
    accounts: HashMap<AccountId, Account>,
    /// Внешний (чат) id -> внутренний id счёта.
    external_index: HashMap<String, AccountId>,
    history: HashMap<AccountId, SharedHistory>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Собрать леджер из сохранённых частей (загрузка снапшота).
    pub fn from_parts(
        accounts: HashMap<AccountId, Account>,
        external_index: HashMap<String, AccountId>,
        history: HashMap<AccountId, SharedHistory>,
    ) -> Self {
        Self {
            accounts,
            external_index,
            history,
        }
    }

    pub fn accounts(&self) -> &HashMap<AccountId, Account> {
        &self.accounts
    }

    pub fn external_index(&self) -> &HashMap<String, AccountId> {
        &self.external_index
    }

    pub fn histories(&self) -> &HashMap<AccountId, SharedHistory> {
        &self.history
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
    }

    pub fn account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn balance_of(&self, account_id: &str) -> Result<Tokens, EngineError> {
        self.accounts
            .get(account_id)
            .map(|a| a.balance)
            .ok_or_else(|| EngineError::AccountNotFound(account_id.to_string()))
    }

    /// История счёта (пустая, если проводок не было).
    pub fn history_of(&self, account_id: &str) -> &[HistoryRecord] {
        self.history
            .get(account_id)
            .map(|records| records.as_slice())
            .unwrap_or(&[])
    }

    /// Сумма всех балансов.
    pub fn total_supply(&self) -> u128 {
        self.accounts.values().map(|a| u128::from(a.balance.0)).sum()
    }

    pub fn lookup_external(&self, external_id: &str) -> Option<&AccountId> {
        self.external_index.get(external_id)
    }

    /// Идемпотентно: существующий счёт возвращается как есть,
    /// новый создаётся со стартовым балансом (отдельной системной записью).
    pub fn get_or_create(
        &mut self,
        account_id: &str,
        display_name: &str,
        starting_balance: Tokens,
        memo_time: DateTime<Utc>,
    ) -> Result<Account, EngineError> {
        if let Some(existing) = self.accounts.get(account_id) {
            return Ok(existing.clone());
        }

        self.accounts.insert(
            account_id.to_string(),
            Account::new(account_id.to_string(), display_name),
        );
        self.book_opening(account_id, starting_balance, memo_time)?;

        info!(account_id, display_name, %starting_balance, "создан новый счёт");
        self.account(account_id)
            .cloned()
            .ok_or(EngineError::Internal("счёт пропал сразу после создания"))
    }

    /// Привязать внешний id к новому внутреннему счёту.
    ///
    /// `account_id` генерируется снаружи (IdGenerator) и не должен быть занят.
    /// Если внешний id уже известен — возвращается существующий счёт.
    pub fn register_external(
        &mut self,
        external_id: &str,
        account_id: AccountId,
        display_name: &str,
        starting_balance: Tokens,
        memo_time: DateTime<Utc>,
    ) -> Result<AccountId, EngineError> {
        if let Some(existing) = self.external_index.get(external_id) {
            return Ok(existing.clone());
        }
        if self.accounts.contains_key(&account_id) {
            return Err(EngineError::Internal("сгенерированный id счёта уже занят"));
        }

        let account = Account::new(account_id.clone(), display_name).with_external_id(external_id);
        self.accounts.insert(account_id.clone(), account);
        self.external_index
            .insert(external_id.to_string(), account_id.clone());
        self.book_opening(&account_id, starting_balance, memo_time)?;

        info!(%account_id, external_id, display_name, %starting_balance, "создан счёт для пользователя чата");
        Ok(account_id)
    }

    fn book_opening(
        &mut self,
        account_id: &str,
        amount: Tokens,
        memo_time: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if amount.is_zero() {
            return Ok(());
        }
        let memo = Memo::new(
            Role::System,
            EntryKind::Opening,
            account_id,
            format!("Стартовый баланс {amount}"),
            memo_time,
        );
        self.credit(account_id, amount, memo).map(|_| ())
    }

    /// Зачислить токены. Возвращает новый баланс.
    pub fn credit(
        &mut self,
        account_id: &str,
        amount: Tokens,
        memo: Memo,
    ) -> Result<Tokens, EngineError> {
        self.apply(account_id, amount, Direction::Credit, memo)
    }

    /// Списать токены. При нехватке ничего не меняет.
    pub fn debit(
        &mut self,
        account_id: &str,
        amount: Tokens,
        memo: Memo,
    ) -> Result<Tokens, EngineError> {
        self.apply(account_id, amount, Direction::Debit, memo)
    }

    fn apply(
        &mut self,
        account_id: &str,
        amount: Tokens,
        direction: Direction,
        memo: Memo,
    ) -> Result<Tokens, EngineError> {
        if amount.is_zero() {
            return Err(EngineError::NonPositiveAmount);
        }
        let account = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| EngineError::AccountNotFound(account_id.to_string()))?;

        let magnitude = amount.as_delta().ok_or_else(|| {
            EngineError::LedgerCorrupted(format!("сумма {amount} не помещается в i64"))
        })?;

        // Сначала считаем всё, потом мутируем: баланс и запись меняются вместе.
        let (new_balance, delta) = match direction {
            Direction::Credit => {
                let b = account.balance.checked_add(amount).ok_or_else(|| {
                    EngineError::LedgerCorrupted(format!("переполнение баланса {account_id}"))
                })?;
                (b, magnitude)
            }
            Direction::Debit => {
                let b = account.balance.checked_sub(amount).ok_or_else(|| {
                    EngineError::InsufficientFunds {
                        account_id: account_id.to_string(),
                        required: amount,
                        available: account.balance,
                    }
                })?;
                (b, -magnitude)
            }
        };

        account.balance = new_balance;
        let record = HistoryRecord {
            timestamp: memo.timestamp,
            account_id: account_id.to_string(),
            description: memo.description,
            points_delta: delta,
            resulting_balance: new_balance,
            role: memo.role,
            kind: memo.kind,
            correlation_id: memo.correlation_id,
            bet_amount: memo.bet_amount,
        };
        debug!(
            account_id,
            delta,
            balance = %new_balance,
            kind = ?record.kind,
            correlation_id = %record.correlation_id,
            "проводка"
        );
        let records = self.history.entry(account_id.to_string()).or_default();
        Arc::make_mut(records).push(record);

        Ok(new_balance)
    }

    /// Сверка: баланс каждого счёта = сумма дельт его истории
    /// и совпадает с `resulting_balance` последней записи.
    pub fn verify(&self) -> Result<(), EngineError> {
        for (id, account) in &self.accounts {
            let records = self.history_of(id);
            let sum: i128 = records.iter().map(|r| i128::from(r.points_delta)).sum();
            if sum != i128::from(account.balance.0) {
                return Err(EngineError::LedgerCorrupted(format!(
                    "баланс {id} = {}, а сумма истории = {sum}",
                    account.balance
                )));
            }
            if let Some(last) = records.last() {
                if last.resulting_balance != account.balance {
                    return Err(EngineError::LedgerCorrupted(format!(
                        "последняя запись {id} не совпадает с балансом"
                    )));
                }
            }
        }
        if let Some(orphan) = self.history.keys().find(|id| !self.accounts.contains_key(*id)) {
            return Err(EngineError::LedgerCorrupted(format!(
                "история без счёта: {orphan}"
            )));
        }
        Ok(())
    }
}
