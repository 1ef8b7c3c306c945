//! Point-in-time balances and total supply.
//!
//! Series are written lazily: the first mutation touching an account after
//! a snapshot records the value the account had when the snapshot was taken.
//! Later mutations within the same snapshot epoch leave the series alone.

use tally_types::state::{LedgerState, SnapshotState, Snapshots};
use tally_types::{Address, Amount, LedgerEvent, SnapshotId, TokenError};

use crate::hooks::{HookView, Mutation, MutationHook};
use crate::search::upper_bound;

#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    state: SnapshotState,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: SnapshotState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SnapshotState {
        &self.state
    }

    pub fn current_id(&self) -> SnapshotId {
        self.state.current_id
    }

    pub fn take_snapshot(&mut self, events: &mut Vec<LedgerEvent>) -> Result<SnapshotId, TokenError> {
        let id = self
            .state
            .current_id
            .checked_add(1)
            .ok_or(TokenError::ArithmeticOverflow)?;
        self.state.current_id = id;
        events.push(LedgerEvent::Snapshot { id });
        Ok(id)
    }

    pub fn balance_at(
        &self,
        ledger: &LedgerState,
        account: &Address,
        id: SnapshotId,
    ) -> Result<Amount, TokenError> {
        let recorded = self.value_at(self.state.accounts.get(account), id)?;
        Ok(recorded.unwrap_or_else(|| ledger.balance_of(account)))
    }

    pub fn total_supply_at(&self, ledger: &LedgerState, id: SnapshotId) -> Result<Amount, TokenError> {
        let recorded = self.value_at(Some(&self.state.total_supply), id)?;
        Ok(recorded.unwrap_or(ledger.total_supply))
    }

    /// `None` means the series has not changed since `id`, so the live value
    /// is the answer.
    fn value_at(&self, series: Option<&Snapshots>, id: SnapshotId) -> Result<Option<Amount>, TokenError> {
        if id == 0 || id > self.state.current_id {
            return Err(TokenError::InvalidSnapshotId(id));
        }
        let Some(series) = series else {
            return Ok(None);
        };
        let index = upper_bound(&series.ids, id);
        Ok(series.values.get(index).copied())
    }

    fn record(series: &mut Snapshots, current_id: SnapshotId, value: Amount) {
        if series.last_id() < current_id {
            series.ids.push(current_id);
            series.values.push(value);
        }
    }

    fn update_account(&mut self, ledger: &LedgerState, account: Address) {
        let current_id = self.state.current_id;
        if current_id == 0 {
            return;
        }
        let series = self.state.accounts.entry(account).or_default();
        Self::record(series, current_id, ledger.balance_of(&account));
    }

    fn update_total_supply(&mut self, ledger: &LedgerState) {
        let current_id = self.state.current_id;
        Self::record(&mut self.state.total_supply, current_id, ledger.total_supply);
    }
}

impl MutationHook for SnapshotStore {
    fn before_mutate(&mut self, view: &HookView<'_>, mutation: &Mutation) -> Result<(), TokenError> {
        if mutation.is_mint() {
            self.update_account(view.ledger, mutation.to);
            self.update_total_supply(view.ledger);
        } else if mutation.is_burn() {
            self.update_account(view.ledger, mutation.from);
            self.update_total_supply(view.ledger);
        } else {
            self.update_account(view.ledger, mutation.from);
            self.update_account(view.ledger, mutation.to);
        }
        Ok(())
    }
}
