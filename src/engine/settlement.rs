use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::history::{EntryKind, Memo, Role};
use crate::domain::{dice_total, AccountId, Bet, CorrelationId, Die, Multiplier, PayoutSchema, Tokens};
use crate::engine::errors::EngineError;
use crate::engine::house::HouseManager;
use crate::engine::ledger::LedgerStore;
use crate::engine::session::GameSession;

/// Итог одной ставки.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BetResult {
    /// Ставка сыграла, банк выплатил выигрыш и забрал ставку.
    Won {
        multiplier: Multiplier,
        winnings: Tokens,
    },
    /// Ставка не сыграла, ставка ушла в банк.
    Lost,
    /// Ставка сыграла, но банку не хватило на выплату:
    /// выигрыш сторнирован, игроку вернули только ставку.
    StakeReturned {
        stake: Tokens,
        unpaid_winnings: Tokens,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetOutcome {
    pub bet: Bet,
    pub result: BetResult,
}

/// Полный отчёт о расчёте игры — в том порядке, в котором шли ставки.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementReport {
    pub account_id: AccountId,
    pub correlation_id: CorrelationId,
    pub dice: Vec<Die>,
    pub total: u8,
    pub outcomes: Vec<BetOutcome>,
    pub player_balance: Tokens,
    pub house_balance: Tokens,
}

impl SettlementReport {
    pub fn total_staked(&self) -> Tokens {
        self.outcomes.iter().map(|o| o.bet.stake).sum()
    }

    /// Сколько игрок получил назад (выигрыши + возвращённые ставки).
    pub fn total_returned(&self) -> Tokens {
        self.outcomes
            .iter()
            .map(|o| match o.result {
                BetResult::Won { winnings, .. } => winnings,
                BetResult::Lost => Tokens::ZERO,
                BetResult::StakeReturned { stake, .. } => stake,
            })
            .sum()
    }

    /// Результат игры для игрока относительно ставок.
    pub fn net(&self) -> i128 {
        i128::from(self.total_returned().0) - i128::from(self.total_staked().0)
    }
}

/// Расчёт завершённой игры (ровно 3 кубика).
///
/// Выигрыш: зачисляем игроку, банк платит; если банк не смог —
/// сторно выигрыша и возврат одной ставки. Ставка выигравшего пари
/// после успешной выплаты переходит банку, проигравшая — тоже.
/// Все записи идут под correlation id игры.
pub fn settle(
    session: &GameSession,
    ledger: &mut LedgerStore,
    house: &HouseManager,
    schema: &PayoutSchema,
    now: DateTime<Utc>,
) -> Result<SettlementReport, EngineError> {
    let total = dice_total(&session.dice_rolls);
    let player = session.owner.as_str();
    let corr = session.correlation_id.as_str();

    let mut outcomes = Vec::with_capacity(session.bets.len());

    for bet in &session.bets {
        let result = match schema.evaluate(bet, total) {
            Some((multiplier, winnings)) => {
                pay_winner(ledger, house, player, corr, bet, multiplier, winnings, now)?
            }
            None => {
                let memo = Memo::new(
                    Role::House,
                    EntryKind::HouseCollect,
                    corr,
                    format!("Игрок {player} проиграл {}, банк получает {}", bet.kind, bet.stake),
                    now,
                );
                house.collect(ledger, bet.stake, memo)?;
                BetResult::Lost
            }
        };

        info!(
            account_id = player,
            correlation_id = corr,
            kind = %bet.kind,
            stake = %bet.stake,
            total,
            result = ?result,
            "ставка рассчитана"
        );
        outcomes.push(BetOutcome { bet: *bet, result });
    }

    Ok(SettlementReport {
        account_id: session.owner.clone(),
        correlation_id: session.correlation_id.clone(),
        dice: session.dice_rolls.clone(),
        total,
        outcomes,
        player_balance: ledger.balance_of(player)?,
        house_balance: house.balance(ledger)?,
    })
}

#[allow(clippy::too_many_arguments)]
fn pay_winner(
    ledger: &mut LedgerStore,
    house: &HouseManager,
    player: &str,
    corr: &str,
    bet: &Bet,
    multiplier: Multiplier,
    winnings: Tokens,
    now: DateTime<Utc>,
) -> Result<BetResult, EngineError> {
    // Множитель < 1 на копеечной ставке может дать нулевой выигрыш.
    if winnings.is_zero() {
        collect_stake(ledger, house, player, corr, bet, now)?;
        return Ok(BetResult::Won {
            multiplier,
            winnings,
        });
    }

    let credit_memo = Memo::new(
        Role::Player,
        EntryKind::Winnings,
        corr,
        format!("{} выиграла, {multiplier}, выигрыш {winnings}", bet.kind),
        now,
    )
    .with_bet_amount(bet.stake);
    ledger.credit(player, winnings, credit_memo)?;

    let payout_memo = Memo::new(
        Role::House,
        EntryKind::HousePayout,
        corr,
        format!("Игрок {player} выиграл, банк выплачивает {winnings}"),
        now,
    );

    match house.pay_out(ledger, winnings, payout_memo) {
        Ok(_) => {
            collect_stake(ledger, house, player, corr, bet, now)?;
            Ok(BetResult::Won {
                multiplier,
                winnings,
            })
        }
        Err(EngineError::InsufficientFunds { available, .. }) => {
            warn!(
                account_id = player,
                correlation_id = corr,
                %winnings,
                house_balance = %available,
                "банку не хватает на выплату, возвращаем ставку"
            );
            let reversal = Memo::new(
                Role::Player,
                EntryKind::Reversal,
                corr,
                format!("Банку не хватило средств, выигрыш {winnings} отменён"),
                now,
            );
            ledger.debit(player, winnings, reversal)?;

            let refund = Memo::new(
                Role::Player,
                EntryKind::StakeReturn,
                corr,
                format!("Возврат ставки {} из-за нехватки средств банка", bet.stake),
                now,
            )
            .with_bet_amount(bet.stake);
            ledger.credit(player, bet.stake, refund)?;

            Ok(BetResult::StakeReturned {
                stake: bet.stake,
                unpaid_winnings: winnings,
            })
        }
        Err(other) => Err(other),
    }
}

fn collect_stake(
    ledger: &mut LedgerStore,
    house: &HouseManager,
    player: &str,
    corr: &str,
    bet: &Bet,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let memo = Memo::new(
        Role::House,
        EntryKind::HouseCollect,
        corr,
        format!("Ставка {} игрока {player} переходит банку", bet.stake),
        now,
    );
    house.collect(ledger, bet.stake, memo).map(|_| ())
}
