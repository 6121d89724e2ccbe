//! Mahjong: an ERC1155-style multi-token ledger with a custodial airdrop.
//!
//! [`ledger`] keeps balances per account and id, operator approvals and the
//! receiver check run on every inbound transfer. [`dao`] holds the fixed
//! identity and the admin account, and [`token`] layers it over the ledger.
//! [`airdrop`] pays configured amounts out of custody, once per claimant.
//! A whole deployment and its JSON state file live in [`chain`], seeded from
//! the TOML in [`config`].

pub mod airdrop;
pub mod chain;
pub mod config;
pub mod dao;
pub mod ledger;
pub mod token;

pub use airdrop::{Airdrop, AirdropError, EligibilityRule};
pub use chain::{Deployment, StateError};
pub use ledger::{Address, Amount, Ledger, LedgerError, TokenId};
pub use token::Mahjong;
