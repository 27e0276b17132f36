use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng, SeedableRng};

use crate::engine::RandomSource;

/// Системный RNG (thread-local, криптостойкий генератор `rand`).
#[derive(Clone, Debug, Default)]
pub struct SystemRng;

impl RandomSource for SystemRng {
    fn shuffle<T>(&mut self, slice: &mut [T]) {
        slice.shuffle(&mut thread_rng());
    }

    fn range_inclusive(&mut self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }
        thread_rng().gen_range(low..=high)
    }
}

/// Детерминированный RNG для тестов и реплея.
/// Один и тот же seed даёт те же кубики и те же разбиения конвертов.
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    inner: StdRng,
}

impl DeterministicRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for DeterministicRng {
    fn shuffle<T>(&mut self, slice: &mut [T]) {
        slice.shuffle(&mut self.inner);
    }

    fn range_inclusive(&mut self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }
        self.inner.gen_range(low..=high)
    }
}

/// RNG с заранее заданными кубиками и выборами долей.
///
/// Пока очередь не пуста — отдаёт из неё, потом падает
/// на детерминированный генератор. Перемешивание не трогает порядок.
#[derive(Clone, Debug)]
pub struct ScriptedRng {
    dice: VecDeque<u8>,
    picks: VecDeque<usize>,
    fallback: DeterministicRng,
}

impl ScriptedRng {
    pub fn new(dice: impl IntoIterator<Item = u8>) -> Self {
        Self {
            dice: dice.into_iter().collect(),
            picks: VecDeque::new(),
            fallback: DeterministicRng::from_seed(0),
        }
    }

    pub fn with_picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks.extend(picks);
        self
    }

    /// Дописать кубики в конец очереди.
    pub fn push_dice(&mut self, dice: impl IntoIterator<Item = u8>) {
        self.dice.extend(dice);
    }

    pub fn remaining_dice(&self) -> usize {
        self.dice.len()
    }
}

impl RandomSource for ScriptedRng {
    fn shuffle<T>(&mut self, _slice: &mut [T]) {}

    fn range_inclusive(&mut self, low: u64, high: u64) -> u64 {
        self.fallback.range_inclusive(low, high)
    }

    fn roll_die(&mut self) -> u8 {
        match self.dice.pop_front() {
            Some(face) => face,
            None => self.fallback.roll_die(),
        }
    }

    fn pick_index(&mut self, len: usize) -> usize {
        match self.picks.pop_front() {
            Some(index) => index.min(len.saturating_sub(1)),
            None => self.fallback.pick_index(len),
        }
    }
}
