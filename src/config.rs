//! Genesis deployment configuration, read from TOML.
//!
//! ```toml
//! [token]
//! name = "Mahjong"
//! symbol = "MJ"
//! uri = "https://mahjong.example/{id}.json"
//! admin = "0xadmin"
//!
//! [airdrop]
//! address = "0xairdrop"
//! rule = "single_claim_per_id"
//!
//! [[airdrop.allotments]]
//! id = 1
//! amount = 100
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::airdrop::EligibilityRule;
use crate::dao::{DEFAULT_NAME, DEFAULT_SYMBOL};
use crate::ledger::{Address, Amount, TokenId, ZERO_ADDRESS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub token: TokenSection,
    pub airdrop: AirdropSection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default)]
    pub uri: String,
    pub admin: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AirdropSection {
    pub address: Address,
    /// When unset the airdrop follows whoever currently administers the token.
    #[serde(default)]
    pub admin: Option<Address>,
    #[serde(default)]
    pub rule: EligibilityRule,
    #[serde(default)]
    pub allotments: Vec<Allotment>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allotment {
    pub id: TokenId,
    pub amount: Amount,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_symbol() -> String {
    DEFAULT_SYMBOL.to_string()
}

impl DeploymentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DeploymentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn airdrop_admin(&self) -> &str {
        self.airdrop.admin.as_deref().unwrap_or(&self.token.admin)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("token.admin", self.token.admin.as_str()),
            ("airdrop.address", self.airdrop.address.as_str()),
            ("airdrop.admin", self.airdrop_admin()),
        ] {
            if value.trim().is_empty() || value == ZERO_ADDRESS {
                return Err(ConfigError::Invalid(format!("{field} must be a non-zero address")));
            }
        }
        if self.airdrop.address == self.token.admin {
            return Err(ConfigError::Invalid(
                "airdrop.address must differ from token.admin".into(),
            ));
        }
        if self.token.name.is_empty() || self.token.symbol.is_empty() {
            return Err(ConfigError::Invalid("token name and symbol must be set".into()));
        }
        Ok(())
    }
}
