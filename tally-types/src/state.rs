use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::max_for_bits;
use crate::{Address, Amount, Clock, Nonce, SnapshotId, TokenError};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub balances: BTreeMap<Address, Amount>,
    pub allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    pub total_supply: Amount,
}

impl LedgerState {
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|row| row.get(spender))
            .copied()
            .unwrap_or(0)
    }
}

/// Sparse history of one value: `values[i]` is what the value was when
/// snapshot `ids[i]` was taken.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshots {
    pub ids: Vec<SnapshotId>,
    pub values: Vec<Amount>,
}

impl Snapshots {
    pub fn last_id(&self) -> SnapshotId {
        self.ids.last().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotState {
    pub current_id: SnapshotId,
    pub accounts: BTreeMap<Address, Snapshots>,
    pub total_supply: Snapshots,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub at_clock: u32,
    pub votes: Amount,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VotingState {
    pub delegates: BTreeMap<Address, Address>,
    pub checkpoints: BTreeMap<Address, Vec<Checkpoint>>,
    pub total_supply_checkpoints: Vec<Checkpoint>,
}

impl VotingState {
    pub fn delegate_of(&self, account: &Address) -> Address {
        self.delegates.get(account).copied().unwrap_or(Address::ZERO)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NonceState {
    pub nonces: BTreeMap<Address, Nonce>,
}

/// Everything a token instance owns, in persisted form.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalState {
    pub ledger: LedgerState,
    pub snapshots: SnapshotState,
    pub voting: VotingState,
    pub nonces: NonceState,
    /// Highest logical clock reading a mutation has observed.
    pub last_clock: Clock,
}

fn invalid(msg: impl Into<String>) -> TokenError {
    TokenError::InvalidState(msg.into())
}

impl GlobalState {
    /// Checks every structural invariant a loaded state must satisfy.
    /// Nothing is repaired or re-sorted: any violation is an error.
    pub fn validate(&self, vote_bits: u32) -> Result<(), TokenError> {
        self.validate_ledger()?;
        self.validate_snapshots()?;
        self.validate_voting(max_for_bits(vote_bits))
    }

    fn validate_ledger(&self) -> Result<(), TokenError> {
        let mut sum: Amount = 0;
        for balance in self.ledger.balances.values() {
            sum = sum
                .checked_add(*balance)
                .ok_or_else(|| invalid("balance sum overflows"))?;
        }
        if sum != self.ledger.total_supply {
            return Err(invalid(format!(
                "balances sum to {sum}, total supply is {}",
                self.ledger.total_supply
            )));
        }
        if self.ledger.balances.get(&Address::ZERO).copied().unwrap_or(0) != 0 {
            return Err(invalid("zero address holds a balance"));
        }
        Ok(())
    }

    fn validate_snapshots(&self) -> Result<(), TokenError> {
        let current = self.snapshots.current_id;
        let check = |label: &str, series: &Snapshots| -> Result<(), TokenError> {
            if series.ids.len() != series.values.len() {
                return Err(invalid(format!("{label}: ids and values differ in length")));
            }
            let mut previous: SnapshotId = 0;
            for id in &series.ids {
                if *id <= previous || *id > current {
                    return Err(invalid(format!(
                        "{label}: snapshot id {id} out of order or beyond {current}"
                    )));
                }
                previous = *id;
            }
            Ok(())
        };
        check("total supply snapshots", &self.snapshots.total_supply)?;
        for (account, series) in &self.snapshots.accounts {
            check(&format!("snapshots of {account}"), series)?;
        }
        Ok(())
    }

    fn validate_voting(&self, max_votes: Amount) -> Result<(), TokenError> {
        let last_clock = self.last_clock;
        let check = |label: &str, series: &[Checkpoint]| -> Result<(), TokenError> {
            let mut previous: Option<u32> = None;
            for ckpt in series {
                if previous.is_some_and(|p| ckpt.at_clock <= p) {
                    return Err(invalid(format!("{label}: checkpoint clocks not ascending")));
                }
                if Clock::from(ckpt.at_clock) > last_clock {
                    return Err(invalid(format!("{label}: checkpoint ahead of clock {last_clock}")));
                }
                if ckpt.votes > max_votes {
                    return Err(invalid(format!("{label}: votes exceed declared width")));
                }
                previous = Some(ckpt.at_clock);
            }
            Ok(())
        };

        check("total supply checkpoints", &self.voting.total_supply_checkpoints)?;
        let latest_supply = self
            .voting
            .total_supply_checkpoints
            .last()
            .map(|c| c.votes)
            .unwrap_or(0);
        if latest_supply != self.ledger.total_supply {
            return Err(invalid("total supply checkpoint disagrees with total supply"));
        }

        let mut expected: BTreeMap<Address, Amount> = BTreeMap::new();
        for (delegator, delegate) in &self.voting.delegates {
            if delegate.is_zero() {
                continue;
            }
            let slot = expected.entry(*delegate).or_insert(0);
            *slot = slot
                .checked_add(self.ledger.balance_of(delegator))
                .ok_or_else(|| invalid("delegated votes overflow"))?;
        }

        for (account, series) in &self.voting.checkpoints {
            check(&format!("checkpoints of {account}"), series)?;
            let latest = series.last().map(|c| c.votes).unwrap_or(0);
            let want = expected.remove(account).unwrap_or(0);
            if latest != want {
                return Err(invalid(format!(
                    "votes of {account} are {latest}, delegated balance is {want}"
                )));
            }
        }
        if let Some((account, _)) = expected.iter().find(|(_, votes)| **votes > 0) {
            return Err(invalid(format!("{account} has delegated balance but no checkpoints")));
        }
        Ok(())
    }
}
