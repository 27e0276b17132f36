use crate::domain::Tokens;
use crate::engine::errors::EngineError;
use crate::engine::RandomSource;

/// Случайное разбиение `total` на `recipients` положительных долей.
///
/// Первые n-1 долей берутся из `[1, min(2·остаток/долей, остаток − (долей − 1))]`,
/// последняя получает остаток, затем порядок перемешивается.
/// Каждая доля >= 1, сумма ровно `total`.
pub fn split_amount<R: RandomSource>(
    rng: &mut R,
    total: Tokens,
    recipients: usize,
) -> Result<Vec<Tokens>, EngineError> {
    if total.is_zero() {
        return Err(EngineError::NonPositiveAmount);
    }
    if recipients == 0 {
        return Err(EngineError::NoRecipients);
    }
    let too_many = EngineError::TooManyRecipients { total, recipients };
    let n = u64::try_from(recipients).map_err(|_| too_many.clone())?;
    if total.0 < n {
        return Err(too_many);
    }

    let mut shares = Vec::with_capacity(recipients);
    let mut remaining = total.0;

    for drawn in 0..(n - 1) {
        // Сколько долей ещё не назначено, включая текущую.
        let left = n - drawn;
        let ceiling = remaining - (left - 1);
        let mean_cap = (remaining.saturating_mul(2) / left).max(1);
        let share = rng.range_inclusive(1, ceiling.min(mean_cap));

        shares.push(Tokens(share));
        remaining -= share;
    }
    shares.push(Tokens(remaining));

    rng.shuffle(&mut shares);
    Ok(shares)
}
