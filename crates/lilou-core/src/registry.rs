use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{InvariantViolation, RegistryError};
use crate::event::{EventLog, RegistryEvent};
use crate::guard::{AccessGuard, Grant, Scope};
use crate::identity::{Address, TokenId};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionMetadata {
    pub name: String,
    pub symbol: String,
}

impl Default for CollectionMetadata {
    fn default() -> Self {
        Self {
            name: "Lilou Face".into(),
            symbol: "LLF".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenEntry {
    pub token_id: TokenId,
    pub owner: Address,
    /// `Address::NULL` when nobody is approved.
    pub approved: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorEntry {
    pub owner: Address,
    pub operator: Address,
}

/// Canonical view of the registry, ordered by token id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub metadata: CollectionMetadata,
    pub tokens: Vec<TokenEntry>,
    pub operators: Vec<OperatorEntry>,
}

/// Ownership and approval bookkeeping for non-fungible tokens.
///
/// A token exists exactly when it has an owner. Per-owner counts are kept
/// next to the ownership map and updated in the same step.
#[derive(Clone, Debug, Default)]
pub struct NonFungibleRegistry {
    metadata: CollectionMetadata,
    owners: BTreeMap<TokenId, Address>,
    balances: BTreeMap<Address, u64>,
    token_approvals: BTreeMap<TokenId, Address>,
    operators: BTreeSet<(Address, Address)>,
    events: EventLog<RegistryEvent>,
}

impl NonFungibleRegistry {
    pub fn new(metadata: CollectionMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn metadata(&self) -> &CollectionMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn total_tokens(&self) -> usize {
        self.owners.len()
    }

    /// Number of tokens held by `owner`.
    ///
    /// Unlike the fungible ledger, asking about the null address is an
    /// error rather than zero.
    pub fn balance_of(&self, owner: &Address) -> Result<u64, RegistryError> {
        if owner.is_null() {
            return Err(RegistryError::InvalidAddress { address: *owner });
        }
        Ok(self.balances.get(owner).copied().unwrap_or_default())
    }

    pub fn owner_of(&self, token_id: &TokenId) -> Result<Address, RegistryError> {
        self.owners
            .get(token_id)
            .copied()
            .ok_or(RegistryError::InvalidNft {
                token_id: *token_id,
            })
    }

    pub fn get_approved(&self, token_id: &TokenId) -> Result<Address, RegistryError> {
        self.owner_of(token_id)?;
        Ok(self
            .token_approvals
            .get(token_id)
            .copied()
            .unwrap_or(Address::NULL))
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operators.contains(&(*owner, *operator))
    }

    pub fn events(&self) -> &[RegistryEvent] {
        self.events.as_slice()
    }

    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        self.events.drain()
    }

    fn guard(&self) -> AccessGuard<'_> {
        AccessGuard::new(&self.token_approvals, &self.operators)
    }

    /// Approve `spender` to move `token_id`. `Address::NULL` clears the
    /// approval.
    pub fn approve(
        &mut self,
        caller: Address,
        spender: Address,
        token_id: TokenId,
    ) -> Result<(), RegistryError> {
        let owner = self.owner_of(&token_id)?;
        let grant = self.guard().authorize(Scope::Approve, &caller, &owner, &token_id)?;
        // A token-level approval must never be able to re-delegate itself.
        debug_assert_ne!(grant, Grant::TokenApproval);

        if spender.is_null() {
            self.token_approvals.remove(&token_id);
        } else {
            self.token_approvals.insert(token_id, spender);
        }
        self.events.push(RegistryEvent::Approval {
            owner,
            approved: spender,
            token_id,
        });
        Ok(())
    }

    pub fn set_approval_for_all(
        &mut self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<(), RegistryError> {
        if operator.is_null() {
            return Err(RegistryError::InvalidAddress { address: operator });
        }
        if approved {
            self.operators.insert((caller, operator));
        } else {
            self.operators.remove(&(caller, operator));
        }
        self.events.push(RegistryEvent::ApprovalForAll {
            owner: caller,
            operator,
            approved,
        });
        Ok(())
    }

    /// Move `token_id` from `from` to `to`.
    ///
    /// Checks run in order: existence, ownership by `from`, authorization of
    /// `caller`, then the receiver. The token's approval never survives a
    /// successful transfer.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        token_id: TokenId,
    ) -> Result<(), RegistryError> {
        let owner = self.owner_of(&token_id)?;
        if owner != from {
            return Err(RegistryError::WrongOwner {
                caller,
                from,
                token_id,
            });
        }
        self.guard().authorize(Scope::Transfer, &caller, &owner, &token_id)?;
        if to.is_null() {
            return Err(RegistryError::InvalidAddress { address: to });
        }

        self.token_approvals.remove(&token_id);
        self.owners.insert(token_id, to);
        self.decrement_balance(from);
        self.increment_balance(to);
        self.events.push(RegistryEvent::Transfer { from, to, token_id });
        Ok(())
    }

    /// Create `token_id` owned by `to`. Privileged.
    pub fn mint(&mut self, to: Address, token_id: TokenId) -> Result<(), RegistryError> {
        if to.is_null() {
            return Err(RegistryError::InvalidAddress { address: to });
        }
        if self.owners.contains_key(&token_id) {
            return Err(RegistryError::TokenExists { token_id });
        }

        self.owners.insert(token_id, to);
        self.increment_balance(to);
        self.events.push(RegistryEvent::Transfer {
            from: Address::NULL,
            to,
            token_id,
        });
        Ok(())
    }

    /// Destroy `token_id`, clearing its owner and approval together.
    /// Privileged.
    pub fn burn(&mut self, token_id: TokenId) -> Result<(), RegistryError> {
        let owner = self.owner_of(&token_id)?;

        self.token_approvals.remove(&token_id);
        self.owners.remove(&token_id);
        self.decrement_balance(owner);
        self.events.push(RegistryEvent::Transfer {
            from: owner,
            to: Address::NULL,
            token_id,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            metadata: self.metadata.clone(),
            tokens: self
                .owners
                .iter()
                .map(|(&token_id, &owner)| TokenEntry {
                    token_id,
                    owner,
                    approved: self
                        .token_approvals
                        .get(&token_id)
                        .copied()
                        .unwrap_or(Address::NULL),
                })
                .collect(),
            operators: self
                .operators
                .iter()
                .map(|&(owner, operator)| OperatorEntry { owner, operator })
                .collect(),
        }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut counted: BTreeMap<Address, u64> = BTreeMap::new();
        for owner in self.owners.values() {
            if owner.is_null() {
                return Err(InvariantViolation::NullEntry { role: "token owner" });
            }
            *counted.entry(*owner).or_default() += 1;
        }
        for (owner, recorded) in &self.balances {
            let actual = counted.get(owner).copied().unwrap_or_default();
            if *recorded != actual {
                return Err(InvariantViolation::CountMismatch {
                    owner: *owner,
                    recorded: *recorded,
                    actual,
                });
            }
        }
        for (owner, actual) in &counted {
            if !self.balances.contains_key(owner) {
                return Err(InvariantViolation::CountMismatch {
                    owner: *owner,
                    recorded: 0,
                    actual: *actual,
                });
            }
        }
        for (token_id, approved) in &self.token_approvals {
            if !self.owners.contains_key(token_id) {
                return Err(InvariantViolation::OrphanApproval {
                    token_id: *token_id,
                });
            }
            if approved.is_null() {
                return Err(InvariantViolation::NullEntry { role: "token approval" });
            }
        }
        if self.operators.iter().any(|(_, operator)| operator.is_null()) {
            return Err(InvariantViolation::NullEntry { role: "operator" });
        }
        Ok(())
    }

    fn increment_balance(&mut self, owner: Address) {
        *self.balances.entry(owner).or_default() += 1;
    }

    fn decrement_balance(&mut self, owner: Address) {
        if let Some(count) = self.balances.get_mut(&owner) {
            *count -= 1;
            if *count == 0 {
                self.balances.remove(&owner);
            }
        }
    }
}
