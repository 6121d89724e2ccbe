//! The Mahjong token: the DAO identity layered over the multi-token ledger.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dao::MahjongDao;
use crate::ledger::{
    Address, Amount, ContractCode, Ledger, LedgerError, LedgerSnapshot, TokenId,
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mahjong {
    dao: MahjongDao,
    ledger: Ledger,
}

impl Mahjong {
    pub fn new(dao: MahjongDao) -> Self {
        Self {
            dao,
            ledger: Ledger::new(),
        }
    }

    pub fn dao(&self) -> &MahjongDao {
        &self.dao
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn name(&self) -> &str {
        self.dao.name()
    }

    pub fn symbol(&self) -> &str {
        self.dao.symbol()
    }

    pub fn uri(&self, id: TokenId) -> String {
        self.dao.uri(id)
    }

    pub fn mint(
        &mut self,
        caller: &str,
        to: &str,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        if let Err(err) = self.dao.ensure_admin(caller) {
            warn!(%caller, id, "mint by non-admin");
            return Err(err);
        }
        self.ledger.mint(caller, to, id, amount, data)
    }

    pub fn balance_of(&self, account: &str, id: TokenId) -> Amount {
        self.ledger.balance_of(account, id)
    }

    pub fn balance_of_batch(
        &self,
        accounts: &[Address],
        ids: &[TokenId],
    ) -> Result<Vec<Amount>, LedgerError> {
        self.ledger.balance_of_batch(accounts, ids)
    }

    pub fn total_supply(&self, id: TokenId) -> Amount {
        self.ledger.total_supply(id)
    }

    pub fn safe_transfer_from(
        &mut self,
        caller: &str,
        from: &str,
        to: &str,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.ledger
            .safe_transfer_from(caller, from, to, id, amount, data)
    }

    /// `caller` grants or revokes `operator` over all of its own balances.
    pub fn set_approval_for_all(
        &mut self,
        caller: &str,
        operator: &str,
        approved: bool,
    ) -> Result<(), LedgerError> {
        self.ledger.set_approval_for_all(caller, operator, approved)
    }

    pub fn is_approved_for_all(&self, owner: &str, operator: &str) -> bool {
        self.ledger.is_approved_for_all(owner, operator)
    }

    pub fn deploy_contract(&mut self, address: &str, code: ContractCode) -> Result<(), LedgerError> {
        self.ledger.deploy_contract(address, code)
    }

    pub fn transfer_admin(&mut self, caller: &str, new_admin: &str) -> Result<(), LedgerError> {
        self.dao.transfer_admin(caller, new_admin)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }
}
