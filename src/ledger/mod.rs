use lilou_core::{
    Address, Amount, FungibleError, FungibleEvent, FungibleLedger, FungibleSnapshot,
    InvariantViolation, NonFungibleRegistry, RegistryError, RegistryEvent, RegistrySnapshot,
    TokenId,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::contracts::{Deployment, DeploymentError};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("coin: {0}")]
    Coin(#[from] FungibleError),
    #[error("collection: {0}")]
    Collection(#[from] RegistryError),
    #[error("{caller} is not a minter")]
    NotMinter { caller: Address },
    #[error("deployment: {0}")]
    Deployment(#[from] DeploymentError),
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// A mutating operation on one of the two ledgers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Transfer {
        to: Address,
        #[serde(with = "lilou_core::identity::amount")]
        amount: Amount,
    },
    TransferFrom {
        from: Address,
        to: Address,
        #[serde(with = "lilou_core::identity::amount")]
        amount: Amount,
    },
    Approve {
        spender: Address,
        #[serde(with = "lilou_core::identity::amount")]
        amount: Amount,
    },
    Mint {
        to: Address,
        #[serde(with = "lilou_core::identity::amount")]
        amount: Amount,
    },
    Burn {
        from: Address,
        #[serde(with = "lilou_core::identity::amount")]
        amount: Amount,
    },
    NftApprove {
        spender: Address,
        token_id: TokenId,
    },
    SetApprovalForAll {
        operator: Address,
        approved: bool,
    },
    NftTransferFrom {
        from: Address,
        to: Address,
        token_id: TokenId,
    },
    NftMint {
        to: Address,
        token_id: TokenId,
    },
    NftBurn {
        token_id: TokenId,
    },
}

impl Operation {
    /// Operations reserved to the deployment's minters.
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Operation::Mint { .. }
                | Operation::Burn { .. }
                | Operation::NftMint { .. }
                | Operation::NftBurn { .. }
        )
    }
}

/// One line of a call script: who acts, and what they do.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Call {
    pub caller: Address,
    #[serde(flatten)]
    pub op: Operation,
}

/// Read-only lookups. Answering one never changes state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum Query {
    Name,
    Symbol,
    Decimals,
    TotalSupply,
    BalanceOf { account: Address },
    Allowance { owner: Address, spender: Address },
    CollectionName,
    CollectionSymbol,
    NftBalanceOf { owner: Address },
    OwnerOf { token_id: TokenId },
    GetApproved { token_id: TokenId },
    IsApprovedForAll { owner: Address, operator: Address },
}

/// Result of a [`Query`], written to JSON as a bare value.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Answer {
    Amount(Amount),
    Count(u64),
    Address(Address),
    Flag(bool),
    Text(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "ledger", content = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Coin(FungibleEvent),
    Collection(RegistryEvent),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Accepted { events: Vec<LedgerEvent> },
    Rejected { reason: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub height: u64,
    pub caller: Address,
    pub op: Operation,
    pub outcome: Outcome,
}

impl Receipt {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, Outcome::Accepted { .. })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub height: u64,
    pub coin: FungibleSnapshot,
    pub collection: RegistrySnapshot,
    #[serde(with = "crate::ledger::hex_root")]
    pub state_root: [u8; 32],
}

/// Both ledgers plus the host concerns around them: the minter gate, call
/// numbering and the event history.
pub struct ChainState {
    deployment: Deployment,
    coin: FungibleLedger,
    collection: NonFungibleRegistry,
    height: u64,
    events: Vec<LedgerEvent>,
}

impl ChainState {
    /// Bring up both ledgers and apply the genesis distribution. Genesis
    /// mints emit the same events as any other mint.
    pub fn from_deployment(deployment: Deployment) -> Result<Self, HostError> {
        deployment.validate()?;
        let mut coin = FungibleLedger::new(deployment.coin.clone());
        let mut collection = NonFungibleRegistry::new(deployment.collection.clone());
        for allocation in &deployment.allocations {
            coin.mint(allocation.holder, allocation.amount)?;
        }
        for token in &deployment.nfts {
            collection.mint(token.owner, token.token_id)?;
        }

        let mut state = Self {
            deployment,
            coin,
            collection,
            height: 0,
            events: Vec::new(),
        };
        let genesis = state.collect_events();
        state.events.extend(genesis);
        Ok(state)
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn coin(&self) -> &FungibleLedger {
        &self.coin
    }

    pub fn collection(&self) -> &NonFungibleRegistry {
        &self.collection
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Every event emitted since genesis, in order.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Run one call and record its outcome. A rejected call changes nothing
    /// but the height.
    pub fn execute(&mut self, call: &Call) -> Receipt {
        self.height += 1;
        let outcome = match self.dispatch(call) {
            Ok(events) => {
                self.events.extend(events.iter().cloned());
                Outcome::Accepted { events }
            }
            Err(err) => Outcome::Rejected {
                reason: err.to_string(),
            },
        };
        Receipt {
            height: self.height,
            caller: call.caller,
            op: call.op.clone(),
            outcome,
        }
    }

    pub fn execute_all<'a>(&mut self, calls: impl IntoIterator<Item = &'a Call>) -> Vec<Receipt> {
        calls.into_iter().map(|call| self.execute(call)).collect()
    }

    /// Apply `call` and return the events it produced.
    pub fn dispatch(&mut self, call: &Call) -> Result<Vec<LedgerEvent>, HostError> {
        let caller = call.caller;
        if call.op.is_privileged() && !self.deployment.is_minter(&caller) {
            return Err(HostError::NotMinter { caller });
        }
        match call.op {
            Operation::Transfer { to, amount } => self.coin.transfer(caller, to, amount)?,
            Operation::TransferFrom { from, to, amount } => {
                self.coin.transfer_from(caller, from, to, amount)?
            }
            Operation::Approve { spender, amount } => self.coin.approve(caller, spender, amount)?,
            Operation::Mint { to, amount } => self.coin.mint(to, amount)?,
            Operation::Burn { from, amount } => self.coin.burn(from, amount)?,
            Operation::NftApprove { spender, token_id } => {
                self.collection.approve(caller, spender, token_id)?
            }
            Operation::SetApprovalForAll { operator, approved } => {
                self.collection
                    .set_approval_for_all(caller, operator, approved)?
            }
            Operation::NftTransferFrom { from, to, token_id } => {
                self.collection.transfer_from(caller, from, to, token_id)?
            }
            Operation::NftMint { to, token_id } => self.collection.mint(to, token_id)?,
            Operation::NftBurn { token_id } => self.collection.burn(token_id)?,
        }
        Ok(self.collect_events())
    }

    pub fn query(&self, query: &Query) -> Result<Answer, HostError> {
        let answer = match query {
            Query::Name => Answer::Text(self.coin.name().to_string()),
            Query::Symbol => Answer::Text(self.coin.symbol().to_string()),
            Query::Decimals => Answer::Count(self.coin.decimals().into()),
            Query::TotalSupply => Answer::Amount(self.coin.total_supply()),
            Query::BalanceOf { account } => Answer::Amount(self.coin.balance_of(account)),
            Query::Allowance { owner, spender } => {
                Answer::Amount(self.coin.allowance(owner, spender))
            }
            Query::CollectionName => Answer::Text(self.collection.name().to_string()),
            Query::CollectionSymbol => Answer::Text(self.collection.symbol().to_string()),
            Query::NftBalanceOf { owner } => Answer::Count(self.collection.balance_of(owner)?),
            Query::OwnerOf { token_id } => Answer::Address(self.collection.owner_of(token_id)?),
            Query::GetApproved { token_id } => {
                Answer::Address(self.collection.get_approved(token_id)?)
            }
            Query::IsApprovedForAll { owner, operator } => {
                Answer::Flag(self.collection.is_approved_for_all(owner, operator))
            }
        };
        Ok(answer)
    }

    pub fn check_invariants(&self) -> Result<(), HostError> {
        self.coin.check_invariants()?;
        self.collection.check_invariants()?;
        Ok(())
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        let coin = self.coin.snapshot();
        let collection = self.collection.snapshot();
        let state_root = compute_state_root(&coin, &collection);
        ChainSnapshot {
            height: self.height,
            coin,
            collection,
            state_root,
        }
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(&self.coin.snapshot(), &self.collection.snapshot())
    }

    fn collect_events(&mut self) -> Vec<LedgerEvent> {
        let mut events: Vec<LedgerEvent> = self
            .coin
            .drain_events()
            .into_iter()
            .map(LedgerEvent::Coin)
            .collect();
        events.extend(
            self.collection
                .drain_events()
                .into_iter()
                .map(LedgerEvent::Collection),
        );
        events
    }
}

fn compute_state_root(coin: &FungibleSnapshot, collection: &RegistrySnapshot) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();

    let mut hasher = Sha256::new();
    hasher.update(b"coin");
    hash_str(&mut hasher, &coin.metadata.name);
    hash_str(&mut hasher, &coin.metadata.symbol);
    hasher.update([coin.metadata.decimals]);
    hasher.update(coin.total_supply.to_le_bytes());
    leaves.push(hasher.finalize().into());

    for (account, balance) in &coin.balances {
        let mut hasher = Sha256::new();
        hasher.update(b"balance");
        hasher.update(account.as_bytes());
        hasher.update(balance.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for entry in &coin.allowances {
        let mut hasher = Sha256::new();
        hasher.update(b"allowance");
        hasher.update(entry.owner.as_bytes());
        hasher.update(entry.spender.as_bytes());
        hasher.update(entry.amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }

    let mut hasher = Sha256::new();
    hasher.update(b"collection");
    hash_str(&mut hasher, &collection.metadata.name);
    hash_str(&mut hasher, &collection.metadata.symbol);
    leaves.push(hasher.finalize().into());

    for token in &collection.tokens {
        let mut hasher = Sha256::new();
        hasher.update(b"token");
        hasher.update(token.token_id.0.to_le_bytes());
        hasher.update(token.owner.as_bytes());
        hasher.update(token.approved.as_bytes());
        leaves.push(hasher.finalize().into());
    }
    for entry in &collection.operators {
        let mut hasher = Sha256::new();
        hasher.update(b"operator");
        hasher.update(entry.owner.as_bytes());
        hasher.update(entry.operator.as_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

// Length prefix keeps ("ab", "c") and ("a", "bc") apart.
fn hash_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"lilou-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

pub(crate) mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("state root must be 32 bytes"))
    }
}
