use crate::{Address, Amount, Clock, Nonce, SnapshotId};

/// Every way a token call can fail. A call that returns one of these has
/// left no trace in token state and emitted no records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("zero address not allowed")]
    ZeroAddress,
    #[error("insufficient balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        required: Amount,
    },
    #[error("insufficient allowance from {owner} to {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        available: Amount,
        required: Amount,
    },
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    #[error("arithmetic underflow")]
    ArithmeticUnderflow,
    #[error("invalid snapshot id {0}")]
    InvalidSnapshotId(SnapshotId),
    #[error("clock {requested} not yet elapsed (current {current})")]
    ClockNotYetElapsed { requested: Clock, current: Clock },
    #[error("invalid nonce for {owner}: expected {expected}, got {provided}")]
    InvalidNonce {
        owner: Address,
        expected: Nonce,
        provided: Nonce,
    },
    #[error("signature expired at {deadline} (now {now})")]
    Expired { deadline: u64, now: u64 },
    #[error("invalid signature length {0}")]
    InvalidSignatureLength(usize),
    #[error("invalid signature 's' value")]
    InvalidSignatureS,
    #[error("invalid signature 'v' value {0}")]
    InvalidSignatureV(u8),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("total supply {total} exceeds vote cap {cap}")]
    SupplyCapExceeded { total: Amount, cap: Amount },
    #[error("caller {0} is not authorized")]
    Unauthorized(Address),
    #[error("clock went backwards: last {last}, now {now}")]
    ClockWentBackwards { last: Clock, now: Clock },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
