//! A deployed Mahjong system: the token and its airdrop distributor, with
//! JSON persistence of the whole state between invocations.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::airdrop::{Airdrop, AirdropError};
use crate::config::DeploymentConfig;
use crate::dao::MahjongDao;
use crate::ledger::{Amount, ContractCode, LedgerError, TokenId};
use crate::token::Mahjong;

pub const STATE_VERSION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported state version {found}, expected {expected}")]
    Version { found: u8, expected: u8 },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Airdrop(#[from] AirdropError),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    pub version: u8,
    token: Mahjong,
    airdrop: Airdrop,
}

impl Deployment {
    /// Deploys the token, installs holder code at the airdrop address and applies
    /// the configured allotments.
    pub fn genesis(config: &DeploymentConfig) -> Result<Self, StateError> {
        let dao = MahjongDao::new(
            config.token.name.clone(),
            config.token.symbol.clone(),
            config.token.uri.clone(),
            config.token.admin.clone(),
        );
        let mut token = Mahjong::new(dao);
        token.deploy_contract(&config.airdrop.address, ContractCode::Holder)?;

        let mut airdrop = Airdrop::new(
            config.airdrop.address.clone(),
            config.airdrop.admin.clone(),
            config.airdrop.rule,
        );
        for allotment in &config.airdrop.allotments {
            airdrop.set_airdrop(&token, config.airdrop_admin(), allotment.id, allotment.amount)?;
        }
        info!(
            name = %config.token.name,
            airdrop = %config.airdrop.address,
            rule = ?config.airdrop.rule,
            "deployment created"
        );
        Ok(Self {
            version: STATE_VERSION,
            token,
            airdrop,
        })
    }

    pub fn token(&self) -> &Mahjong {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut Mahjong {
        &mut self.token
    }

    pub fn airdrop(&self) -> &Airdrop {
        &self.airdrop
    }

    pub fn set_airdrop(&mut self, caller: &str, id: TokenId, amount: Amount) -> Result<(), AirdropError> {
        self.airdrop.set_airdrop(&self.token, caller, id, amount)
    }

    pub fn claim(&mut self, caller: &str, id: TokenId) -> Result<Amount, AirdropError> {
        self.airdrop.claim(&mut self.token, caller, id)
    }

    pub fn withdraw(
        &mut self,
        caller: &str,
        id: TokenId,
        amount: Amount,
        to: &str,
    ) -> Result<(), AirdropError> {
        self.airdrop.withdraw(&mut self.token, caller, id, amount, to)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let state: Deployment = serde_json::from_slice(&bytes)?;
        if state.version != STATE_VERSION {
            return Err(StateError::Version {
                found: state.version,
                expected: STATE_VERSION,
            });
        }
        debug!(path = %path.display(), height = state.token.ledger().meta.height, "state loaded");
        Ok(state)
    }

    /// Writes to a sibling temp file first so a failed write never truncates the state.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StateError> {
        let path = path.as_ref();
        let io_err = |source| StateError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        debug!(path = %path.display(), bytes = bytes.len(), "state saved");
        Ok(())
    }
}
