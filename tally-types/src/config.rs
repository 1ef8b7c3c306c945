use serde::{Deserialize, Serialize};

use crate::{Address, Amount, TokenError};

pub const DEFAULT_VOTE_BITS: u32 = 96;

fn default_vote_bits() -> u32 {
    DEFAULT_VOTE_BITS
}

fn default_decimals() -> u8 {
    18
}

fn default_version() -> String {
    "1".to_string()
}

/// Static token parameters. `name` and `version` feed domain separation only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default = "default_version")]
    pub version: String,
    pub verifying_contract: Address,
    /// Width of checkpointed vote amounts, in bits.
    #[serde(default = "default_vote_bits")]
    pub vote_bits: u32,
    /// Principal allowed to mint and take snapshots.
    pub administrator: Address,
}

impl TokenConfig {
    pub fn new(name: &str, symbol: &str, verifying_contract: Address, administrator: Address) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals: default_decimals(),
            version: default_version(),
            verifying_contract,
            vote_bits: DEFAULT_VOTE_BITS,
            administrator,
        }
    }

    pub fn validate(&self) -> Result<(), TokenError> {
        if self.name.is_empty() {
            return Err(TokenError::InvalidConfig("name must not be empty".into()));
        }
        if self.version.is_empty() {
            return Err(TokenError::InvalidConfig("version must not be empty".into()));
        }
        if self.vote_bits == 0 || self.vote_bits > Amount::BITS {
            return Err(TokenError::InvalidConfig(format!(
                "vote_bits must be in 1..={}, got {}",
                Amount::BITS,
                self.vote_bits
            )));
        }
        Ok(())
    }

    /// Largest vote amount a checkpoint may hold.
    pub fn max_votes(&self) -> Amount {
        max_for_bits(self.vote_bits)
    }
}

pub fn max_for_bits(bits: u32) -> Amount {
    if bits >= Amount::BITS {
        Amount::MAX
    } else {
        (1u128 << bits) - 1
    }
}
