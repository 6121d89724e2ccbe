use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub mod receiver;

pub use receiver::{
    ContractCode, ExternallyOwned, Receipt, Selector, TokenReceiver, ERC1155_ACCEPTED,
};

pub type Address = String;
pub type TokenId = u64;
pub type Amount = u64;

/// Source of minted supply in the event journal; never a valid recipient.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient balance for transfer: {account} holds {available} of token {id}, needs {required}")]
    InsufficientBalance {
        account: Address,
        id: TokenId,
        available: Amount,
        required: Amount,
    },
    #[error("caller {caller} is not owner nor approved")]
    UnauthorizedCaller { caller: Address },
    #[error("non ERC1155Receiver")]
    TransferRejected { to: Address },
    #[error("amount overflows supply of token {id}")]
    Overflow { id: TokenId },
    #[error("transfer to the zero address")]
    ZeroAddress,
    #[error("setting approval status for self")]
    SelfApproval,
    #[error("accounts and ids length mismatch: {accounts} accounts, {ids} ids")]
    LengthMismatch { accounts: usize, ids: usize },
    #[error("contract code already deployed at {address}")]
    CodeExists { address: Address },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapshotMetadata {
    pub height: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub accounts: BTreeMap<Address, BTreeMap<TokenId, Amount>>,
    pub supply: BTreeMap<TokenId, Amount>,
    pub merkle_root: [u8; 32],
}

impl LedgerSnapshot {
    pub fn root_hex(&self) -> String {
        hex::encode(self.merkle_root)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransferSingle {
        operator: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
    ContractDeployed {
        address: Address,
        code: ContractCode,
    },
}

/// Multi-token balance store. Balances are sparse: zero entries are never kept.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Ledger {
    pub meta: SnapshotMetadata,
    accounts: BTreeMap<Address, BTreeMap<TokenId, Amount>>,
    supply: BTreeMap<TokenId, Amount>,
    operators: BTreeMap<Address, BTreeSet<Address>>,
    code: BTreeMap<Address, ContractCode>,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &str, id: TokenId) -> Amount {
        self.accounts
            .get(account)
            .and_then(|tokens| tokens.get(&id))
            .copied()
            .unwrap_or(0)
    }

    pub fn balance_of_batch(
        &self,
        accounts: &[Address],
        ids: &[TokenId],
    ) -> Result<Vec<Amount>, LedgerError> {
        if accounts.len() != ids.len() {
            return Err(LedgerError::LengthMismatch {
                accounts: accounts.len(),
                ids: ids.len(),
            });
        }
        Ok(accounts
            .iter()
            .zip(ids)
            .map(|(account, id)| self.balance_of(account, *id))
            .collect())
    }

    pub fn total_supply(&self, id: TokenId) -> Amount {
        self.supply.get(&id).copied().unwrap_or(0)
    }

    pub fn exists(&self, id: TokenId) -> bool {
        self.total_supply(id) > 0
    }

    pub fn is_approved_for_all(&self, owner: &str, operator: &str) -> bool {
        self.operators
            .get(owner)
            .map_or(false, |set| set.contains(operator))
    }

    pub fn code_at(&self, address: &str) -> Option<ContractCode> {
        self.code.get(address).copied()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn set_approval_for_all(
        &mut self,
        owner: &str,
        operator: &str,
        approved: bool,
    ) -> Result<(), LedgerError> {
        if owner == operator {
            return Err(LedgerError::SelfApproval);
        }
        if approved {
            self.operators
                .entry(owner.to_string())
                .or_default()
                .insert(operator.to_string());
        } else if let Some(set) = self.operators.get_mut(owner) {
            set.remove(operator);
            if set.is_empty() {
                self.operators.remove(owner);
            }
        }
        info!(%owner, %operator, approved, "operator approval updated");
        self.commit(LedgerEvent::ApprovalForAll {
            owner: owner.to_string(),
            operator: operator.to_string(),
            approved,
        });
        Ok(())
    }

    pub fn deploy_contract(&mut self, address: &str, code: ContractCode) -> Result<(), LedgerError> {
        if address == ZERO_ADDRESS {
            return Err(LedgerError::ZeroAddress);
        }
        if self.code.contains_key(address) {
            return Err(LedgerError::CodeExists {
                address: address.to_string(),
            });
        }
        self.code.insert(address.to_string(), code);
        info!(%address, ?code, "contract deployed");
        self.commit(LedgerEvent::ContractDeployed {
            address: address.to_string(),
            code,
        });
        Ok(())
    }

    /// Authorization is the caller's concern.
    pub fn mint(
        &mut self,
        operator: &str,
        to: &str,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        if to == ZERO_ADDRESS {
            return Err(LedgerError::ZeroAddress);
        }
        let supply_before = self.total_supply(id);
        let to_before = self.balance_of(to, id);
        let supply_after = supply_before
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { id })?;
        self.credit_account(to, id, amount)?;
        self.write_supply(id, supply_after);

        let receipt = Receipt {
            operator,
            from: ZERO_ADDRESS,
            id,
            amount,
            data,
        };
        if let Err(err) = self.acceptance_check(to, &receipt) {
            self.write_balance(to, id, to_before);
            self.write_supply(id, supply_before);
            return Err(err);
        }

        info!(%operator, %to, id, amount, supply = supply_after, "minted");
        self.commit(LedgerEvent::TransferSingle {
            operator: operator.to_string(),
            from: ZERO_ADDRESS.to_string(),
            to: to.to_string(),
            id,
            amount,
        });
        Ok(())
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
        if to == ZERO_ADDRESS {
            return Err(LedgerError::ZeroAddress);
        }
        if caller != from && !self.is_approved_for_all(from, caller) {
            warn!(%caller, %from, "transfer by unapproved operator");
            return Err(LedgerError::UnauthorizedCaller {
                caller: caller.to_string(),
            });
        }

        let from_before = self.balance_of(from, id);
        let to_before = self.balance_of(to, id);
        self.debit_account(from, id, amount)?;
        if let Err(err) = self.credit_account(to, id, amount) {
            self.write_balance(from, id, from_before);
            return Err(err);
        }

        let receipt = Receipt {
            operator: caller,
            from,
            id,
            amount,
            data,
        };
        if let Err(err) = self.acceptance_check(to, &receipt) {
            self.write_balance(to, id, to_before);
            self.write_balance(from, id, from_before);
            return Err(err);
        }

        info!(operator = %caller, %from, %to, id, amount, "transfer committed");
        self.commit(LedgerEvent::TransferSingle {
            operator: caller.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            id,
            amount,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            accounts: self.accounts.clone(),
            supply: self.supply.clone(),
            merkle_root: compute_merkle_root(&self.accounts, &self.supply),
        }
    }

    fn receiver(&self, address: &str) -> &dyn TokenReceiver {
        match self.code.get(address) {
            Some(code) => code as &dyn TokenReceiver,
            None => &ExternallyOwned,
        }
    }

    fn acceptance_check(&self, to: &str, receipt: &Receipt<'_>) -> Result<(), LedgerError> {
        if receiver::accepts(self.receiver(to), receipt) {
            debug!(%to, id = receipt.id, "receiver accepted");
            return Ok(());
        }
        warn!(%to, id = receipt.id, amount = receipt.amount, "receiver rejected transfer");
        Err(LedgerError::TransferRejected { to: to.to_string() })
    }

    fn credit_account(&mut self, account: &str, id: TokenId, amount: Amount) -> Result<(), LedgerError> {
        let balance = self
            .balance_of(account, id)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { id })?;
        self.write_balance(account, id, balance);
        Ok(())
    }

    fn debit_account(&mut self, account: &str, id: TokenId, amount: Amount) -> Result<(), LedgerError> {
        let available = self.balance_of(account, id);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account.to_string(),
                id,
                available,
                required: amount,
            });
        }
        self.write_balance(account, id, available - amount);
        Ok(())
    }

    fn write_balance(&mut self, account: &str, id: TokenId, amount: Amount) {
        if amount == 0 {
            if let Some(tokens) = self.accounts.get_mut(account) {
                tokens.remove(&id);
                if tokens.is_empty() {
                    self.accounts.remove(account);
                }
            }
            return;
        }
        self.accounts
            .entry(account.to_string())
            .or_default()
            .insert(id, amount);
    }

    fn write_supply(&mut self, id: TokenId, amount: Amount) {
        if amount == 0 {
            self.supply.remove(&id);
        } else {
            self.supply.insert(id, amount);
        }
    }

    fn commit(&mut self, event: LedgerEvent) {
        self.events.push(event);
        self.meta.height += 1;
    }
}

/// Two-level state root: each token id commits to its supply and to a tree of
/// its holders; the root is the tree over those per-id commitments.
fn compute_merkle_root(
    accounts: &BTreeMap<Address, BTreeMap<TokenId, Amount>>,
    supply: &BTreeMap<TokenId, Amount>,
) -> [u8; 32] {
    let mut holders: BTreeMap<TokenId, Vec<[u8; 32]>> = BTreeMap::new();
    for (account, tokens) in accounts {
        for (id, amount) in tokens {
            let mut hasher = Sha256::new();
            hasher.update(b"mahjong/holding");
            hasher.update((account.len() as u64).to_be_bytes());
            hasher.update(account.as_bytes());
            hasher.update(amount.to_be_bytes());
            holders.entry(*id).or_default().push(hasher.finalize().into());
        }
    }

    let tokens: Vec<[u8; 32]> = supply
        .iter()
        .map(|(id, total)| -> [u8; 32] {
            let mut hasher = Sha256::new();
            hasher.update(b"mahjong/token");
            hasher.update(id.to_be_bytes());
            hasher.update(total.to_be_bytes());
            hasher.update(fold_level(holders.remove(id).unwrap_or_default()));
            hasher.finalize().into()
        })
        .collect();
    fold_level(tokens)
}

fn fold_level(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    if level.is_empty() {
        return [0u8; 32];
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update(b"mahjong/node");
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().into()
                }
                // odd one out moves up unchanged
                _ => pair[0],
            })
            .collect();
    }
    level[0]
}
