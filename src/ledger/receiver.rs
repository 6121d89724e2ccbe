use serde::{Deserialize, Serialize};

use super::{Amount, TokenId};

/// Four-byte value a receiver hook returns to signal acceptance.
pub type Selector = [u8; 4];

/// `bytes4(keccak256("onERC1155Received(address,address,uint256,uint256,bytes)"))`
pub const ERC1155_ACCEPTED: Selector = [0xf2, 0x3a, 0x6e, 0x61];

/// Arguments handed to a receiver hook for a single inbound transfer.
#[derive(Clone, Copy, Debug)]
pub struct Receipt<'a> {
    pub operator: &'a str,
    pub from: &'a str,
    pub id: TokenId,
    pub amount: Amount,
    pub data: &'a [u8],
}

/// Acceptance hook for inbound transfers.
///
/// Returning `None` means the recipient exposes no hook at all. Anything other
/// than [`ERC1155_ACCEPTED`] is treated as a rejection.
pub trait TokenReceiver {
    fn on_erc1155_received(&self, receipt: &Receipt<'_>) -> Option<Selector>;
}

/// Plain accounts take every transfer.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExternallyOwned;

impl TokenReceiver for ExternallyOwned {
    fn on_erc1155_received(&self, _receipt: &Receipt<'_>) -> Option<Selector> {
        Some(ERC1155_ACCEPTED)
    }
}

/// Code deployed at a contract-like address.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContractCode {
    /// Implements the hook and accepts everything (custodial holders such as the airdrop).
    Holder,
    /// A contract without any receiver hook.
    Opaque,
    /// Implements the hook but answers with the wrong selector.
    Rejecting,
}

impl TokenReceiver for ContractCode {
    fn on_erc1155_received(&self, _receipt: &Receipt<'_>) -> Option<Selector> {
        match self {
            ContractCode::Holder => Some(ERC1155_ACCEPTED),
            ContractCode::Opaque => None,
            ContractCode::Rejecting => Some([0u8; 4]),
        }
    }
}

impl std::str::FromStr for ContractCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "holder" => Ok(ContractCode::Holder),
            "opaque" => Ok(ContractCode::Opaque),
            "rejecting" => Ok(ContractCode::Rejecting),
            other => Err(format!("unknown contract code {other:?}")),
        }
    }
}

/// Runs the hook and reports whether the sentinel came back.
pub fn accepts(receiver: &dyn TokenReceiver, receipt: &Receipt<'_>) -> bool {
    receiver.on_erc1155_received(receipt) == Some(ERC1155_ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> Receipt<'static> {
        Receipt {
            operator: "alice",
            from: "alice",
            id: 1,
            amount: 10,
            data: &[],
        }
    }

    #[test]
    fn only_holder_and_plain_accounts_accept() {
        let r = receipt();
        assert!(accepts(&ExternallyOwned, &r));
        assert!(accepts(&ContractCode::Holder, &r));
        assert!(!accepts(&ContractCode::Opaque, &r));
        assert!(!accepts(&ContractCode::Rejecting, &r));
    }

    #[test]
    fn contract_code_parses_from_cli_names() {
        assert_eq!("holder".parse::<ContractCode>(), Ok(ContractCode::Holder));
        assert_eq!("opaque".parse::<ContractCode>(), Ok(ContractCode::Opaque));
        assert!("proxy".parse::<ContractCode>().is_err());
    }
}
