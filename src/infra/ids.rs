use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{AccountId, CorrelationId};
use crate::engine::EngineError;

const PERIOD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ACCOUNT_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const PERIOD_SUFFIX_LEN: usize = 4;
pub const ACCOUNT_ID_LEN: usize = 8;
pub const DEFAULT_MAX_ATTEMPTS: usize = 64;

const PERIOD_TIME_FORMAT: &str = "%Y%m%d%H%M%S";
const PERIOD_TIME_LEN: usize = 14;

/// Время выдачи, зашитое в номер периода. `None`, если это не номер периода.
pub fn period_timestamp(id: &str) -> Option<DateTime<Utc>> {
    if id.len() != PERIOD_TIME_LEN + PERIOD_SUFFIX_LEN || !id.is_ascii() {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&id[..PERIOD_TIME_LEN], PERIOD_TIME_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Генерация идентификаторов.
///
/// - номер периода (игры и конверты): `YYYYMMDDhhmmss` UTC + 4 символа `[A-Z0-9]`;
/// - внутренний id счёта: 8 символов `[A-Za-z0-9]`.
///
/// Коллизии проверяет вызывающий через `is_taken`; число попыток ограничено.
#[derive(Debug)]
pub struct IdGenerator {
    rng: StdRng,
    max_attempts: usize,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Воспроизводимая последовательность — для тестов.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn next_period_id(
        &mut self,
        now: DateTime<Utc>,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<CorrelationId, EngineError> {
        let prefix = now.format(PERIOD_TIME_FORMAT).to_string();
        for _ in 0..self.max_attempts {
            let candidate = format!("{prefix}{}", self.random_string(PERIOD_ALPHABET, PERIOD_SUFFIX_LEN));
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
        }
        Err(EngineError::Internal("не удалось подобрать свободный номер периода"))
    }

    pub fn next_account_id(
        &mut self,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<AccountId, EngineError> {
        for _ in 0..self.max_attempts {
            let candidate = self.random_string(ACCOUNT_ALPHABET, ACCOUNT_ID_LEN);
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
        }
        Err(EngineError::Internal("не удалось подобрать свободный id счёта"))
    }

    fn random_string(&mut self, alphabet: &[u8], len: usize) -> String {
        (0..len)
            .map(|_| char::from(alphabet[self.rng.gen_range(0..alphabet.len())]))
            .collect()
    }
}
