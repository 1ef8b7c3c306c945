pub mod address;
pub mod config;
pub mod error;
pub mod event;
pub mod state;

pub use address::Address;
pub use config::TokenConfig;
pub use error::TokenError;
pub use event::LedgerEvent;
pub use state::GlobalState;

/// Token quantity. Balances, allowances and total supply all use this width.
pub type Amount = u128;

/// Identifier of a balance snapshot. `0` means no snapshot has been taken.
pub type SnapshotId = u64;

/// Per-principal replay counter for signed messages.
pub type Nonce = u64;

/// Reading of the host's monotonic logical clock (block height).
pub type Clock = u64;
