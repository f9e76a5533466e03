use thiserror::Error;

use crate::identity::{Address, Amount, TokenId};

/// Failures of the fungible ledger. Each variant carries the identities and
/// amounts involved so a rejection is self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FungibleError {
    /// The null address cannot be the origin of a transfer or burn.
    #[error("invalid sender {sender}")]
    InvalidSender { sender: Address },

    /// The null address cannot receive a transfer or mint.
    #[error("invalid receiver {receiver}")]
    InvalidReceiver { receiver: Address },

    /// The null address cannot grant an allowance.
    #[error("invalid approver {approver}")]
    InvalidApprover { approver: Address },

    /// The null address cannot be granted an allowance.
    #[error("invalid spender {spender}")]
    InvalidSpender { spender: Address },

    #[error("insufficient funds: {sender} holds {balance}, requested {requested}")]
    InsufficientFunds {
        sender: Address,
        balance: Amount,
        requested: Amount,
    },

    /// Burn of more than the holder's balance.
    #[error("insufficient balance: {sender} holds {balance}, requested {requested}")]
    InsufficientBalance {
        sender: Address,
        balance: Amount,
        requested: Amount,
    },

    #[error("{spender} may spend {allowance} of {owner}'s funds, requested {requested}")]
    NotAllowed {
        spender: Address,
        owner: Address,
        allowance: Amount,
        requested: Amount,
    },

    #[error("minting {requested} would overflow the supply")]
    SupplyOverflow { requested: Amount },
}

/// Failures of the non-fungible registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid address {address}")]
    InvalidAddress { address: Address },

    /// The token has no recorded owner.
    #[error("token {token_id} does not exist")]
    InvalidNft { token_id: TokenId },

    #[error("{from} does not own token {token_id} (requested by {caller})")]
    WrongOwner {
        caller: Address,
        from: Address,
        token_id: TokenId,
    },

    #[error("{caller} is not authorized over token {token_id} owned by {owner}")]
    UnauthorizedAddress {
        owner: Address,
        caller: Address,
        token_id: TokenId,
    },

    #[error("token {token_id} already exists")]
    TokenExists { token_id: TokenId },
}

/// A ledger whose stored state no longer satisfies its conservation rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("total supply {total_supply} differs from the sum of balances {sum}")]
    SupplyMismatch { total_supply: Amount, sum: Amount },

    #[error("zero entry stored for {address}")]
    ZeroEntry { address: Address },

    #[error("null address recorded as {role}")]
    NullEntry { role: &'static str },

    #[error("{owner} is recorded with {recorded} tokens but owns {actual}")]
    CountMismatch {
        owner: Address,
        recorded: u64,
        actual: u64,
    },

    #[error("approval recorded for nonexistent token {token_id}")]
    OrphanApproval { token_id: TokenId },
}
