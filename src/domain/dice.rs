use core::fmt;

use serde::{Deserialize, Serialize};

/// Сколько кубиков бросается за одну игру.
pub const DICE_PER_GAME: usize = 3;
/// Граней у кубика.
pub const DIE_FACES: u8 = 6;

/// Значение одного кубика, всегда в 1..=6.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct Die(u8);

impl Die {
    pub fn new(face: u8) -> Option<Self> {
        if (1..=DIE_FACES).contains(&face) {
            Some(Die(face))
        } else {
            None
        }
    }

    pub fn face(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Die {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Die::new(value).ok_or_else(|| format!("значение кубика {value} вне 1..=6"))
    }
}

impl From<Die> for u8 {
    fn from(die: Die) -> u8 {
        die.0
    }
}

impl fmt::Display for Die {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Сумма выпавших кубиков.
pub fn dice_total(dice: &[Die]) -> u8 {
    dice.iter().map(|d| d.0).sum()
}
