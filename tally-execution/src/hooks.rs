use tally_types::state::LedgerState;
use tally_types::{Address, Amount, Clock, LedgerEvent, TokenError};

/// A balance change as the ledger is about to apply it. Mints have a zero
/// `from`, burns a zero `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutation {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

impl Mutation {
    pub fn is_mint(&self) -> bool {
        self.from.is_zero()
    }

    pub fn is_burn(&self) -> bool {
        self.to.is_zero()
    }
}

/// Read-only view handed to hooks.
pub struct HookView<'a> {
    pub ledger: &'a LedgerState,
    pub clock: Clock,
}

/// Extension point bracketing every balance mutation.
///
/// `check` runs for every hook before any of them mutates anything; a hook
/// whose `check` passes must not fail in `before_mutate`/`after_mutate` for
/// the same mutation. In `check` and `before_mutate` the view shows balances
/// before the change, in `after_mutate` after it.
pub trait MutationHook {
    fn check(&self, _view: &HookView<'_>, _mutation: &Mutation) -> Result<(), TokenError> {
        Ok(())
    }

    fn before_mutate(&mut self, _view: &HookView<'_>, _mutation: &Mutation) -> Result<(), TokenError> {
        Ok(())
    }

    fn after_mutate(
        &mut self,
        _view: &HookView<'_>,
        _mutation: &Mutation,
        _events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        Ok(())
    }
}
