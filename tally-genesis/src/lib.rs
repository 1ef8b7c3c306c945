use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tally_execution::{AccessPolicy, Administrator, ExecutionContext, Token};
use tally_types::{Address, Amount, TokenConfig};
use tracing::info;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub account: Address,
    pub amount: Amount,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub delegator: Address,
    pub delegatee: Address,
}

/// Initial token parameters, balances and delegations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenesisConfig {
    pub chain_id: u64,
    pub token: TokenConfig,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub delegations: Vec<Delegation>,
}

/// Genesis mints bypass the administrator check.
struct GenesisMinter;

impl AccessPolicy for GenesisMinter {
    fn is_authorized(&self, _caller: &Address) -> bool {
        true
    }
}

pub fn load_genesis_config(path: impl AsRef<Path>) -> Result<GenesisConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let config: GenesisConfig =
        serde_json::from_str(&raw).with_context(|| format!("invalid genesis file {}", path.display()))?;
    Ok(config)
}

/// Builds the token, credits every allocation, then applies delegations, all
/// at `ctx.height`. Fails on the first rejected step.
pub fn create_genesis_token(genesis: &GenesisConfig, ctx: &ExecutionContext) -> Result<Token> {
    let mut token = Token::new(genesis.token.clone(), genesis.chain_id)
        .context("invalid token config")?
        .with_access_policy(GenesisMinter);

    for (i, allocation) in genesis.allocations.iter().enumerate() {
        token
            .mint(ctx, Address::ZERO, allocation.account, allocation.amount)
            .with_context(|| format!("allocation #{} to {}", i, allocation.account))?;
    }
    for delegation in &genesis.delegations {
        token
            .delegate(ctx, delegation.delegator, delegation.delegatee)
            .with_context(|| format!("delegation from {}", delegation.delegator))?;
    }

    info!(
        name = %genesis.token.name,
        supply = token.total_supply(),
        allocations = genesis.allocations.len(),
        delegations = genesis.delegations.len(),
        "genesis token created"
    );
    Ok(token.with_access_policy(Administrator(genesis.token.administrator)))
}
