use std::collections::{BTreeMap, BTreeSet};

use crate::error::RegistryError;
use crate::identity::{Address, TokenId};

/// Which operation an authorization check is made for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Moving a token. Owner, the token's approved address and the owner's
    /// operators all qualify.
    Transfer,
    /// Setting a token's approval. The approved address itself does not
    /// qualify, so a per-token approval cannot be re-delegated.
    Approve,
}

/// The path through which a caller was authorized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant {
    Owner,
    TokenApproval,
    Operator,
}

/// Authorization predicate over a registry's approval tables.
///
/// Borrowed fresh for every check; it holds no state of its own.
pub struct AccessGuard<'a> {
    token_approvals: &'a BTreeMap<TokenId, Address>,
    operators: &'a BTreeSet<(Address, Address)>,
}

impl<'a> AccessGuard<'a> {
    pub fn new(
        token_approvals: &'a BTreeMap<TokenId, Address>,
        operators: &'a BTreeSet<(Address, Address)>,
    ) -> Self {
        Self {
            token_approvals,
            operators,
        }
    }

    pub fn check(
        &self,
        scope: Scope,
        caller: &Address,
        owner: &Address,
        token_id: &TokenId,
    ) -> Option<Grant> {
        if caller.is_null() {
            return None;
        }
        if caller == owner {
            return Some(Grant::Owner);
        }
        if scope == Scope::Transfer && self.token_approvals.get(token_id) == Some(caller) {
            return Some(Grant::TokenApproval);
        }
        if self.operators.contains(&(*owner, *caller)) {
            return Some(Grant::Operator);
        }
        None
    }

    /// Like [`check`](Self::check), but a refusal becomes
    /// [`RegistryError::UnauthorizedAddress`].
    pub fn authorize(
        &self,
        scope: Scope,
        caller: &Address,
        owner: &Address,
        token_id: &TokenId,
    ) -> Result<Grant, RegistryError> {
        self.check(scope, caller, owner, token_id)
            .ok_or(RegistryError::UnauthorizedAddress {
                owner: *owner,
                caller: *caller,
                token_id: *token_id,
            })
    }
}
