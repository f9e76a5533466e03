use serde::{Deserialize, Serialize};

use crate::identity::{Address, Amount, TokenId};

/// Record emitted by the fungible ledger.
///
/// Mints are `Transfer` from [`Address::NULL`], burns are `Transfer` to it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum FungibleEvent {
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "crate::identity::amount")]
        amount: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "crate::identity::amount")]
        amount: Amount,
    },
}

/// Record emitted by the non-fungible registry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RegistryEvent {
    Transfer {
        from: Address,
        to: Address,
        token_id: TokenId,
    },
    Approval {
        owner: Address,
        approved: Address,
        token_id: TokenId,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
}

/// Ordered, append-only sink of events for external observers.
///
/// The ledgers only ever push here; reading is left to whoever drains it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventLog<E> {
    entries: Vec<E>,
}

impl<E> Default for EventLog<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E> EventLog<E> {
    pub(crate) fn push(&mut self, event: E) {
        self.entries.push(event);
    }

    pub fn as_slice(&self) -> &[E] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand every pending event to the caller, oldest first.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.entries)
    }
}
