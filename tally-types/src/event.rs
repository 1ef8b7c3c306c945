use serde::{Deserialize, Serialize};

use crate::{Address, Amount, SnapshotId};

/// Durable record of a completed state transition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Mints carry `from == ZERO`, burns carry `to == ZERO`.
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    Snapshot {
        id: SnapshotId,
    },
    DelegateChanged {
        delegator: Address,
        from_delegate: Address,
        to_delegate: Address,
    },
    DelegateVotesChanged {
        delegate: Address,
        previous_votes: Amount,
        new_votes: Amount,
    },
}
