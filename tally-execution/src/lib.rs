pub mod access;
pub mod hooks;
pub mod ledger;
pub mod nonces;
pub mod numeric;
pub mod search;
pub mod snapshot;
pub mod token;
pub mod votes;

#[cfg(test)]
mod tests;

pub use access::{AccessPolicy, Administrator};
pub use hooks::{HookView, Mutation, MutationHook};
pub use ledger::Ledger;
pub use nonces::ReplayGuard;
pub use snapshot::SnapshotStore;
pub use token::Token;
pub use votes::VotingLedger;

use serde::{Deserialize, Serialize};
use tally_types::Clock;

/// What the host environment tells the token about the current call.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Logical clock (block height). Must never decrease between calls.
    pub height: Clock,
    /// Wall-clock seconds, compared against signature deadlines.
    pub timestamp: u64,
    /// Live chain identity used for domain separation.
    pub chain_id: u64,
}

impl ExecutionContext {
    pub fn new(height: Clock, timestamp: u64, chain_id: u64) -> Self {
        Self {
            height,
            timestamp,
            chain_id,
        }
    }

    /// Same chain, next block.
    pub fn advance(&self, blocks: u64, seconds: u64) -> Self {
        Self {
            height: self.height.saturating_add(blocks),
            timestamp: self.timestamp.saturating_add(seconds),
            chain_id: self.chain_id,
        }
    }
}
