use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AccountId, PayoutSchema, PayoutSchemaError, Tokens};
use crate::engine::envelope::DEFAULT_MAX_RECIPIENTS;
use crate::engine::SessionRules;

pub const DEFAULT_STARTING_BALANCE: Tokens = Tokens(1_000);
pub const DEFAULT_MAX_TOTAL_STAKE: Tokens = Tokens(1_000_000);
pub const DEFAULT_HOUSE_FLOAT: Tokens = Tokens(1_000_000);
pub const DEFAULT_PERSISTENCE_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать конфиг {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ошибка разбора YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("некорректная схема выплат: {0}")]
    Payout(#[from] PayoutSchemaError),

    #[error("некорректный конфиг: {0}")]
    Invalid(String),
}

/// Какую таблицу множителей использовать.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "preset")]
pub enum PayoutConfig {
    #[default]
    Classic,
    /// Множители из вероятностей с преимуществом банка в базисных пунктах.
    OddsWeighted { edge_bps: u32 },
    Custom { schema: PayoutSchema },
}

impl PayoutConfig {
    pub fn build(&self) -> PayoutSchema {
        match self {
            PayoutConfig::Classic => PayoutSchema::classic(),
            PayoutConfig::OddsWeighted { edge_bps } => PayoutSchema::odds_weighted(*edge_bps),
            PayoutConfig::Custom { schema } => schema.clone(),
        }
    }
}

/// Системный счёт банка, создаваемый на пустом леджере.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HouseBootstrap {
    #[serde(default = "default_house_id")]
    pub account_id: AccountId,
    #[serde(default = "default_house_name")]
    pub display_name: String,
    #[serde(default = "default_house_float")]
    pub float: Tokens,
}

fn default_house_id() -> AccountId {
    "HOUSE".to_string()
}

fn default_house_name() -> String {
    "Банк".to_string()
}

fn default_house_float() -> Tokens {
    DEFAULT_HOUSE_FLOAT
}

impl Default for HouseBootstrap {
    fn default() -> Self {
        Self {
            account_id: default_house_id(),
            display_name: default_house_name(),
            float: DEFAULT_HOUSE_FLOAT,
        }
    }
}

/// Настройки экономики. Все поля необязательны в YAML.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EconomyConfig {
    /// Баланс нового счёта.
    pub starting_balance: Tokens,
    /// Лимит суммы ставок одной игры.
    pub max_total_stake: Tokens,
    pub payout: PayoutConfig,
    /// Максимум долей публичного конверта.
    pub max_envelope_recipients: usize,
    /// Кому разрешён отзыв конвертов.
    pub admins: Vec<AccountId>,
    pub house_bootstrap: Option<HouseBootstrap>,
    /// JSON-файл леджера; `None` — только память.
    pub data_file: Option<PathBuf>,
    pub persistence_buffer: usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_balance: DEFAULT_STARTING_BALANCE,
            max_total_stake: DEFAULT_MAX_TOTAL_STAKE,
            payout: PayoutConfig::default(),
            max_envelope_recipients: DEFAULT_MAX_RECIPIENTS,
            admins: Vec::new(),
            house_bootstrap: None,
            data_file: None,
            persistence_buffer: DEFAULT_PERSISTENCE_BUFFER,
        }
    }
}

impl EconomyConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_total_stake.is_zero() {
            return Err(ConfigError::Invalid("max_total_stake должен быть > 0".into()));
        }
        if self.max_envelope_recipients == 0 {
            return Err(ConfigError::Invalid("max_envelope_recipients должен быть > 0".into()));
        }
        if self.persistence_buffer == 0 {
            return Err(ConfigError::Invalid("persistence_buffer должен быть > 0".into()));
        }
        if let Some(house) = &self.house_bootstrap {
            if house.account_id.is_empty() {
                return Err(ConfigError::Invalid("пустой id счёта банка".into()));
            }
        }
        self.payout.build().validate()?;
        Ok(())
    }

    pub fn session_rules(&self) -> SessionRules {
        SessionRules {
            payout: self.payout.build(),
            max_total_stake: self.max_total_stake,
        }
    }
}
