//! Identity and administration for the Mahjong token.
//!
//! The DAO carries the fixed branding of the ledger (name, symbol, metadata
//! URI template) and the single administrative account allowed to mint and to
//! hand administration over.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ledger::{Address, LedgerError, TokenId, ZERO_ADDRESS};

pub const DEFAULT_NAME: &str = "Mahjong";
pub const DEFAULT_SYMBOL: &str = "MJ";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MahjongDao {
    name: String,
    symbol: String,
    uri: String,
    admin: Address,
}

impl MahjongDao {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        uri: impl Into<String>,
        admin: impl Into<Address>,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            uri: uri.into(),
            admin: admin.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn admin(&self) -> &str {
        &self.admin
    }

    /// Metadata URI for `id`; `{id}` is substituted with the 64-digit lowercase hex id.
    pub fn uri(&self, id: TokenId) -> String {
        self.uri.replace("{id}", &format!("{id:064x}"))
    }

    pub fn ensure_admin(&self, caller: &str) -> Result<(), LedgerError> {
        if caller != self.admin {
            return Err(LedgerError::UnauthorizedCaller {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    pub fn transfer_admin(&mut self, caller: &str, new_admin: &str) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if new_admin == ZERO_ADDRESS || new_admin.is_empty() {
            return Err(LedgerError::ZeroAddress);
        }
        info!(old_admin = %self.admin, %new_admin, "dao admin transferred");
        self.admin = new_admin.to_string();
        Ok(())
    }
}
