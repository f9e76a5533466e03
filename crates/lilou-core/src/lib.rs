//! Core accounting for the Lilou ledgers.
//!
//! This crate exposes the two ledgers and the pieces they share:
//!
//! * [`identity`]: fixed-width account addresses, token ids and amounts.
//! * [`fungible`]: balance/allowance bookkeeping with supply conservation.
//! * [`registry`]: non-fungible ownership with per-token and per-operator
//!   delegation.
//! * [`guard`]: the owner / approved / operator authorization predicate
//!   consulted by the registry.
//! * [`event`]: the append-only event records both ledgers emit.
//! * [`shared`]: a single-writer wrapper for serving a ledger to several
//!   threads.
//!
//! Every mutating call takes the acting identity explicitly and is applied
//! check-then-apply: a call that fails leaves the ledger untouched.

pub mod event;
pub mod fungible;
pub mod guard;
pub mod identity;
pub mod registry;
pub mod shared;

mod error;

pub use error::{FungibleError, InvariantViolation, RegistryError};
pub use event::{EventLog, FungibleEvent, RegistryEvent};
pub use fungible::{CoinMetadata, FungibleLedger, FungibleSnapshot};
pub use guard::{AccessGuard, Grant, Scope};
pub use identity::{Address, Amount, ParseAddressError, TokenId};
pub use registry::{CollectionMetadata, NonFungibleRegistry, RegistrySnapshot};
pub use shared::Shared;
