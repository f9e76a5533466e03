use std::collections::BTreeSet;

use lilou_core::{Address, Amount, CoinMetadata, CollectionMetadata, TokenId};
use serde::{Deserialize, Serialize};

/// Account that deploys the ledgers and holds the minter role by default.
pub const DEPLOYER: Address = Address::new([
    0xf3, 0x9f, 0xd6, 0xe5, 0x1a, 0xad, 0x88, 0xf6, 0xf4, 0xce, 0x6a, 0xb8, 0x82, 0x72, 0x79, 0xcf,
    0xff, 0xb9, 0x22, 0x66,
]);

/// Second holder of the initial coin supply.
pub const COIN_HOLDER: Address = Address::new([
    0x29, 0xf2, 0xd6, 0x0b, 0x0e, 0x77, 0xf7, 0x6f, 0x72, 0x08, 0xfa, 0x91, 0x0c, 0x51, 0xef, 0xef,
    0x98, 0x48, 0x05, 0x01,
]);

/// Holder of the genesis collection token.
pub const NFT_HOLDER: Address = Address::new([
    0x73, 0x09, 0x6e, 0xd1, 0x78, 0xc9, 0x6e, 0x70, 0x96, 0xad, 0x33, 0x29, 0xfd, 0x09, 0x2b, 0xe3,
    0xd1, 0x6a, 0x72, 0x5e,
]);

pub const GENESIS_NFT: TokenId = TokenId(424242);

/// 21,000,000.00 LLC at two decimals.
pub const HOLDER_ALLOCATION: Amount = 21_000_000_00;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub holder: Address,
    pub amount: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisToken {
    pub owner: Address,
    pub token_id: TokenId,
}

/// Everything needed to bring both ledgers up: metadata, who may mint, and
/// the initial distribution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    #[serde(default)]
    pub coin: CoinMetadata,
    #[serde(default)]
    pub collection: CollectionMetadata,
    pub minters: Vec<Address>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub nfts: Vec<GenesisToken>,
}

impl Default for Deployment {
    fn default() -> Self {
        Self {
            coin: CoinMetadata::default(),
            collection: CollectionMetadata::default(),
            minters: vec![DEPLOYER],
            allocations: vec![
                Allocation {
                    holder: DEPLOYER,
                    amount: HOLDER_ALLOCATION,
                },
                Allocation {
                    holder: COIN_HOLDER,
                    amount: HOLDER_ALLOCATION,
                },
            ],
            nfts: vec![GenesisToken {
                owner: NFT_HOLDER,
                token_id: GENESIS_NFT,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeploymentError {
    #[error("deployment names no minter")]
    NoMinter,
    #[error("null address listed as minter")]
    NullMinter,
    #[error("genesis token {token_id} listed twice")]
    DuplicateToken { token_id: TokenId },
    #[error("genesis supply overflows")]
    SupplyOverflow,
}

impl Deployment {
    pub fn is_minter(&self, account: &Address) -> bool {
        self.minters.contains(account)
    }

    pub fn genesis_supply(&self) -> Option<Amount> {
        self.allocations
            .iter()
            .try_fold(0 as Amount, |acc, a| acc.checked_add(a.amount))
    }

    /// Reject configurations that cannot produce a usable ledger. Ledger
    /// level rules (null holders and the like) are enforced again at
    /// genesis.
    pub fn validate(&self) -> Result<(), DeploymentError> {
        if self.minters.is_empty() {
            return Err(DeploymentError::NoMinter);
        }
        if self.minters.iter().any(Address::is_null) {
            return Err(DeploymentError::NullMinter);
        }
        if self.genesis_supply().is_none() {
            return Err(DeploymentError::SupplyOverflow);
        }
        let mut seen = BTreeSet::new();
        for token in &self.nfts {
            if !seen.insert(token.token_id) {
                return Err(DeploymentError::DuplicateToken {
                    token_id: token.token_id,
                });
            }
        }
        Ok(())
    }
}
