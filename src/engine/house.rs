use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::history::{Memo, Role};
use crate::domain::{AccountId, Tokens};
use crate::engine::errors::EngineError;
use crate::engine::ledger::LedgerStore;

/// Менеджер банка: один счёт, который покрывает все выплаты игрокам.
///
/// `None` — банка нет, новые игры не принимаются.
#[derive(Clone, Debug, Default)]
pub struct HouseManager {
    account: Option<AccountId>,
}

impl HouseManager {
    pub fn new(account: Option<AccountId>) -> Self {
        Self { account }
    }

    pub fn current(&self) -> Option<&AccountId> {
        self.account.as_ref()
    }

    pub fn is_house(&self, account_id: &str) -> bool {
        self.account.as_deref() == Some(account_id)
    }

    pub fn require(&self) -> Result<&AccountId, EngineError> {
        self.account.as_ref().ok_or(EngineError::NoHouse)
    }

    pub fn balance(&self, ledger: &LedgerStore) -> Result<Tokens, EngineError> {
        ledger.balance_of(self.require()?)
    }

    /// Назначить банк. Повторное назначение — конфликт, а не замена.
    pub fn designate(&mut self, ledger: &LedgerStore, account_id: &str) -> Result<(), EngineError> {
        if let Some(current) = &self.account {
            return Err(EngineError::HouseAlreadyDesignated(current.clone()));
        }
        if !ledger.contains(account_id) {
            return Err(EngineError::AccountNotFound(account_id.to_string()));
        }
        self.account = Some(account_id.to_string());
        info!(account_id, "назначен банк");
        Ok(())
    }

    /// Освободить банк. Только сам банк и только без активных игр:
    /// открытые игры рассчитываются с текущим банком.
    pub fn vacate(
        &mut self,
        requester: &str,
        active_sessions: usize,
    ) -> Result<AccountId, EngineError> {
        let current = self.require()?;
        if current.as_str() != requester {
            return Err(EngineError::NotHouse(requester.to_string()));
        }
        if active_sessions > 0 {
            warn!(requester, active_sessions, "отказ в освобождении банка");
            return Err(EngineError::SessionsStillActive(active_sessions));
        }
        let vacated = self.account.take().ok_or(EngineError::NoHouse)?;
        info!(account_id = %vacated, "банк освобождён");
        Ok(vacated)
    }

    /// Создать системный счёт банка с начальным резервом и назначить его.
    /// Ничего не делает, если банк уже есть.
    pub fn bootstrap(
        &mut self,
        ledger: &mut LedgerStore,
        account_id: &str,
        display_name: &str,
        float: Tokens,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountId>, EngineError> {
        if self.account.is_some() {
            return Ok(None);
        }
        ledger.get_or_create(account_id, display_name, float, now)?;
        self.designate(ledger, account_id)?;
        Ok(Some(account_id.to_string()))
    }

    /// Выплата из банка. Нехватка средств (`InsufficientFunds`)
    /// пробрасывается наверх — расчёт игры делает компенсацию сам.
    pub fn pay_out(
        &self,
        ledger: &mut LedgerStore,
        amount: Tokens,
        memo: Memo,
    ) -> Result<Tokens, EngineError> {
        let house = self.require()?;
        ledger.debit(house, amount, memo.with_role(Role::House))
    }

    /// Зачисление в банк (проигранные ставки).
    pub fn collect(
        &self,
        ledger: &mut LedgerStore,
        amount: Tokens,
        memo: Memo,
    ) -> Result<Tokens, EngineError> {
        let house = self.require()?;
        ledger.credit(house, amount, memo.with_role(Role::House))
    }
}
