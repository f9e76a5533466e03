//! Host side of the Lilou ledgers: deployment configuration, the call
//! dispatcher with its minter gate and receipts, and a seeded simulator.

pub mod contracts;
pub mod ledger;
pub mod simulate;
