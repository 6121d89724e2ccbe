use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::{Address, Amount, LedgerError, TokenId};
use crate::token::Mahjong;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AirdropError {
    #[error("airdrop not exists")]
    NotConfigured { id: TokenId },
    #[error("already claimed")]
    AlreadyClaimed { claimant: Address, id: TokenId },
    #[error("condition not met")]
    ConditionNotMet { claimant: Address, id: TokenId },
    #[error("caller {caller} is not the airdrop admin")]
    Unauthorized { caller: Address },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityRule {
    /// An id closes once it has one recorded claim.
    #[default]
    SingleClaimPerId,
    /// The claimant must not already hold any units of the id.
    ClaimantHoldsNone,
    /// Only the per-account claim flag applies.
    Open,
}

impl EligibilityRule {
    pub fn is_eligible(
        &self,
        token: &Mahjong,
        claims: &ClaimBook,
        claimant: &str,
        id: TokenId,
    ) -> bool {
        match self {
            EligibilityRule::SingleClaimPerId => claims.claims_for(id) == 0,
            EligibilityRule::ClaimantHoldsNone => token.balance_of(claimant, id) == 0,
            EligibilityRule::Open => true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AirdropRegistry {
    amounts: BTreeMap<TokenId, Amount>,
}

impl AirdropRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous amount. Zero clears the entry.
    pub fn set(&mut self, id: TokenId, amount: Amount) -> Option<Amount> {
        if amount == 0 {
            return self.amounts.remove(&id);
        }
        self.amounts.insert(id, amount)
    }

    pub fn amount_per_claim(&self, id: TokenId) -> Option<Amount> {
        self.amounts.get(&id).copied()
    }

    pub fn configured(&self) -> impl Iterator<Item = (TokenId, Amount)> + '_ {
        self.amounts.iter().map(|(id, amount)| (*id, *amount))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClaimBook {
    claimed: BTreeMap<TokenId, BTreeSet<Address>>,
}

impl ClaimBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_claimed(&self, claimant: &str, id: TokenId) -> bool {
        self.claimed
            .get(&id)
            .map_or(false, |set| set.contains(claimant))
    }

    pub fn record(&mut self, claimant: &str, id: TokenId) -> bool {
        self.claimed
            .entry(id)
            .or_default()
            .insert(claimant.to_string())
    }

    pub fn claims_for(&self, id: TokenId) -> usize {
        self.claimed.get(&id).map_or(0, BTreeSet::len)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AirdropEvent {
    AirdropSet {
        id: TokenId,
        amount: Amount,
    },
    Claimed {
        claimant: Address,
        id: TokenId,
        amount: Amount,
    },
    Withdrawn {
        to: Address,
        id: TokenId,
        amount: Amount,
    },
}

/// Custodial distributor. Holds its allotment as an ordinary ledger balance at
/// `address` and pays it out through the token's own transfer path.
///
/// Without a dedicated admin the token's current admin governs the airdrop,
/// so an admin handover on the DAO carries over.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Airdrop {
    address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    admin: Option<Address>,
    #[serde(default)]
    rule: EligibilityRule,
    registry: AirdropRegistry,
    claims: ClaimBook,
    events: Vec<AirdropEvent>,
}

impl Airdrop {
    pub fn new(address: impl Into<Address>, admin: Option<Address>, rule: EligibilityRule) -> Self {
        Self {
            address: address.into(),
            admin,
            rule,
            registry: AirdropRegistry::new(),
            claims: ClaimBook::new(),
            events: Vec::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn admin<'a>(&'a self, token: &'a Mahjong) -> &'a str {
        self.admin.as_deref().unwrap_or_else(|| token.dao().admin())
    }

    pub fn rule(&self) -> EligibilityRule {
        self.rule
    }

    pub fn registry(&self) -> &AirdropRegistry {
        &self.registry
    }

    pub fn amount_per_claim(&self, id: TokenId) -> Option<Amount> {
        self.registry.amount_per_claim(id)
    }

    pub fn has_claimed(&self, claimant: &str, id: TokenId) -> bool {
        self.claims.has_claimed(claimant, id)
    }

    pub fn claims_for(&self, id: TokenId) -> usize {
        self.claims.claims_for(id)
    }

    pub fn events(&self) -> &[AirdropEvent] {
        &self.events
    }

    pub fn set_airdrop(
        &mut self,
        token: &Mahjong,
        caller: &str,
        id: TokenId,
        amount: Amount,
    ) -> Result<(), AirdropError> {
        self.ensure_admin(token, caller)?;
        let previous = self.registry.set(id, amount);
        info!(id, amount, ?previous, "airdrop configured");
        self.events.push(AirdropEvent::AirdropSet { id, amount });
        Ok(())
    }

    /// Pays `amount_per_claim(id)` from custody to `caller`, once per (caller, id).
    ///
    /// Checks run in order: configured, eligibility, claim flag. The claim flag
    /// is only set after the ledger transfer has committed.
    pub fn claim(&mut self, token: &mut Mahjong, caller: &str, id: TokenId) -> Result<Amount, AirdropError> {
        let amount = match self.registry.amount_per_claim(id) {
            Some(amount) => amount,
            None => {
                warn!(%caller, id, "claim against unconfigured airdrop");
                return Err(AirdropError::NotConfigured { id });
            }
        };
        if !self.rule.is_eligible(token, &self.claims, caller, id) {
            warn!(%caller, id, rule = ?self.rule, "claimant not eligible");
            return Err(AirdropError::ConditionNotMet {
                claimant: caller.to_string(),
                id,
            });
        }
        if self.claims.has_claimed(caller, id) {
            warn!(%caller, id, "repeat claim");
            return Err(AirdropError::AlreadyClaimed {
                claimant: caller.to_string(),
                id,
            });
        }

        token.safe_transfer_from(&self.address, &self.address, caller, id, amount, &[])?;
        self.claims.record(caller, id);
        info!(%caller, id, amount, remaining = token.balance_of(&self.address, id), "airdrop claimed");
        self.events.push(AirdropEvent::Claimed {
            claimant: caller.to_string(),
            id,
            amount,
        });
        Ok(amount)
    }

    pub fn withdraw(
        &mut self,
        token: &mut Mahjong,
        caller: &str,
        id: TokenId,
        amount: Amount,
        to: &str,
    ) -> Result<(), AirdropError> {
        self.ensure_admin(token, caller)?;
        token.safe_transfer_from(&self.address, &self.address, to, id, amount, &[])?;
        info!(%to, id, amount, "airdrop custody withdrawn");
        self.events.push(AirdropEvent::Withdrawn {
            to: to.to_string(),
            id,
            amount,
        });
        Ok(())
    }

    fn ensure_admin(&self, token: &Mahjong, caller: &str) -> Result<(), AirdropError> {
        if caller != self.admin(token) {
            warn!(%caller, "airdrop admin call by non-admin");
            return Err(AirdropError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::dao::MahjongDao;
    use crate::ledger::ContractCode;

    const AIRDROP: &str = "airdrop";

    fn setup(rule: EligibilityRule, custody: Amount) -> (Mahjong, Airdrop) {
        let mut token = Mahjong::new(MahjongDao::new("Mahjong", "MJ", "", "admin"));
        token.deploy_contract(AIRDROP, ContractCode::Holder).unwrap();
        if custody > 0 {
            token.mint("admin", AIRDROP, 1, custody, &[]).unwrap();
        }
        (token, Airdrop::new(AIRDROP, None, rule))
    }

    #[test]
    fn claim_requires_configuration() {
        let (mut token, mut airdrop) = setup(EligibilityRule::default(), 1_024);
        let err = airdrop.claim(&mut token, "alice", 1).unwrap_err();
        assert_eq!(err, AirdropError::NotConfigured { id: 1 });
        assert_eq!(err.to_string(), "airdrop not exists");
        assert_eq!(token.balance_of(AIRDROP, 1), 1_024);
        assert!(!airdrop.has_claimed("alice", 1));
    }

    #[test]
    fn successful_claim_moves_funds_and_sets_flag() {
        let (mut token, mut airdrop) = setup(EligibilityRule::default(), 1_024);
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        assert_eq!(airdrop.claim(&mut token, "alice", 1), Ok(100));
        assert_eq!(token.balance_of(AIRDROP, 1), 924);
        assert_eq!(token.balance_of("alice", 1), 100);
        assert!(airdrop.has_claimed("alice", 1));
        assert_eq!(airdrop.claims_for(1), 1);
    }

    #[test]
    fn existing_holder_still_gets_first_claim() {
        let (mut token, mut airdrop) = setup(EligibilityRule::default(), 0);
        token.mint("admin", "alice", 1, 2_048, &[]).unwrap();
        token
            .safe_transfer_from("alice", "alice", AIRDROP, 1, 1_024, &[])
            .unwrap();
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();

        assert_eq!(airdrop.claim(&mut token, "alice", 1), Ok(100));
        assert_eq!(token.balance_of("alice", 1), 1_124);
        assert_eq!(airdrop.claims_for(1), 1);
    }

    #[test]
    fn repeat_claim_is_condition_not_met() {
        let (mut token, mut airdrop) = setup(EligibilityRule::default(), 1_024);
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        airdrop.claim(&mut token, "alice", 1).unwrap();
        let err = airdrop.claim(&mut token, "alice", 1).unwrap_err();
        assert_eq!(err.to_string(), "condition not met");
        assert_eq!(token.balance_of(AIRDROP, 1), 924);
        assert_eq!(token.balance_of("alice", 1), 100);
    }

    #[test]
    fn holds_none_rule_refuses_current_holders() {
        let (mut token, mut airdrop) = setup(EligibilityRule::ClaimantHoldsNone, 1_024);
        token.mint("admin", "bob", 1, 5, &[]).unwrap();
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        assert!(matches!(
            airdrop.claim(&mut token, "bob", 1),
            Err(AirdropError::ConditionNotMet { .. })
        ));
        assert_eq!(airdrop.claim(&mut token, "alice", 1), Ok(100));
    }

    #[test]
    fn repeat_claim_after_spending_is_already_claimed() {
        let (mut token, mut airdrop) = setup(EligibilityRule::ClaimantHoldsNone, 1_024);
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        airdrop.claim(&mut token, "alice", 1).unwrap();
        token
            .safe_transfer_from("alice", "alice", "bob", 1, 100, &[])
            .unwrap();
        let err = airdrop.claim(&mut token, "alice", 1).unwrap_err();
        assert_eq!(
            err,
            AirdropError::AlreadyClaimed {
                claimant: "alice".into(),
                id: 1
            }
        );
        assert_eq!(token.balance_of(AIRDROP, 1), 924);
    }

    #[test]
    fn empty_custody_propagates_insufficient_balance() {
        let (mut token, mut airdrop) = setup(EligibilityRule::default(), 0);
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        let err = airdrop.claim(&mut token, "alice", 1).unwrap_err();
        assert!(matches!(
            err,
            AirdropError::Ledger(LedgerError::InsufficientBalance { available: 0, required: 100, .. })
        ));
        assert!(!airdrop.has_claimed("alice", 1));
        assert_eq!(airdrop.claims_for(1), 0);
    }

    #[test]
    fn single_claim_rule_closes_id_after_first_claim() {
        let (mut token, mut airdrop) = setup(EligibilityRule::SingleClaimPerId, 1_024);
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        airdrop.claim(&mut token, "alice", 1).unwrap();
        let err = airdrop.claim(&mut token, "bob", 1).unwrap_err();
        assert_eq!(
            err,
            AirdropError::ConditionNotMet {
                claimant: "bob".into(),
                id: 1
            }
        );
    }

    #[test]
    fn open_rule_falls_through_to_claim_flag() {
        let (mut token, mut airdrop) = setup(EligibilityRule::Open, 1_024);
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        airdrop.claim(&mut token, "alice", 1).unwrap();
        airdrop.claim(&mut token, "bob", 1).unwrap();
        assert!(matches!(
            airdrop.claim(&mut token, "alice", 1),
            Err(AirdropError::AlreadyClaimed { .. })
        ));
        assert_eq!(token.balance_of(AIRDROP, 1), 824);
    }

    #[test]
    fn claim_into_opaque_contract_is_rolled_back() {
        let (mut token, mut airdrop) = setup(EligibilityRule::default(), 1_024);
        token.deploy_contract("vault", ContractCode::Opaque).unwrap();
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        let err = airdrop.claim(&mut token, "vault", 1).unwrap_err();
        assert_eq!(err.to_string(), "non ERC1155Receiver");
        assert!(!airdrop.has_claimed("vault", 1));
        assert_eq!(token.balance_of(AIRDROP, 1), 1_024);
    }

    #[test]
    fn set_airdrop_is_admin_only_and_zero_clears() {
        let (token, mut airdrop) = setup(EligibilityRule::default(), 0);
        assert_eq!(
            airdrop.set_airdrop(&token, "alice", 1, 100),
            Err(AirdropError::Unauthorized {
                caller: "alice".into()
            })
        );
        airdrop.set_airdrop(&token, "admin", 1, 100).unwrap();
        airdrop.set_airdrop(&token, "admin", 1, 250).unwrap();
        assert_eq!(airdrop.amount_per_claim(1), Some(250));
        airdrop.set_airdrop(&token, "admin", 1, 0).unwrap();
        assert_eq!(airdrop.amount_per_claim(1), None);
    }

    #[test]
    fn admin_handover_on_the_token_moves_airdrop_control() {
        let (mut token, mut airdrop) = setup(EligibilityRule::default(), 1_024);
        token.transfer_admin("admin", "council").unwrap();
        assert_eq!(airdrop.admin(&token), "council");

        assert!(matches!(
            airdrop.set_airdrop(&token, "admin", 1, 100),
            Err(AirdropError::Unauthorized { .. })
        ));
        assert!(matches!(
            airdrop.withdraw(&mut token, "admin", 1, 1_024, "admin"),
            Err(AirdropError::Unauthorized { .. })
        ));
        assert_eq!(token.balance_of(AIRDROP, 1), 1_024);

        airdrop.set_airdrop(&token, "council", 1, 100).unwrap();
        airdrop.withdraw(&mut token, "council", 1, 24, "council").unwrap();
        assert_eq!(token.balance_of(AIRDROP, 1), 1_000);
    }

    #[test]
    fn dedicated_admin_ignores_token_admin() {
        let (token, _) = setup(EligibilityRule::default(), 0);
        let mut airdrop = Airdrop::new(AIRDROP, Some("ops".into()), EligibilityRule::default());
        assert_eq!(airdrop.admin(&token), "ops");
        assert!(airdrop.set_airdrop(&token, "admin", 1, 100).is_err());
        airdrop.set_airdrop(&token, "ops", 1, 100).unwrap();
    }

    #[test]
    fn withdraw_returns_custody_to_admin_choice() {
        let (mut token, mut airdrop) = setup(EligibilityRule::default(), 1_024);
        assert!(airdrop
            .withdraw(&mut token, "alice", 1, 24, "alice")
            .is_err());
        airdrop
            .withdraw(&mut token, "admin", 1, 24, "treasury")
            .unwrap();
        assert_eq!(token.balance_of(AIRDROP, 1), 1_000);
        assert_eq!(token.balance_of("treasury", 1), 24);
        assert_eq!(airdrop.events().len(), 1);
    }

    #[test]
    fn claim_book_is_write_once() {
        let mut book = ClaimBook::new();
        assert!(book.record("alice", 1));
        assert!(!book.record("alice", 1));
        assert!(book.has_claimed("alice", 1));
        assert!(!book.has_claimed("alice", 2));
        assert_eq!(book.claims_for(1), 1);
    }
}
