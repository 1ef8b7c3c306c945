use tally_types::state::LedgerState;
use tally_types::{Address, Amount, Clock, LedgerEvent, TokenError};

use crate::hooks::{HookView, Mutation, MutationHook};
use crate::numeric;

/// Post-mutation values computed up front so a mutation either applies in
/// full or not at all.
#[derive(Debug, Clone, Copy)]
struct Staged {
    from_balance: Option<Amount>,
    to_balance: Option<Amount>,
    total_supply: Amount,
}

/// Balances, allowances and total supply.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    state: LedgerState,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: LedgerState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn total_supply(&self) -> Amount {
        self.state.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state.allowance(owner, spender)
    }

    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
        clock: Clock,
        hooks: &mut [&mut dyn MutationHook],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        if from.is_zero() || to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let mutation = Mutation { from, to, amount };
        let staged = self.stage(&mutation)?;
        self.apply(mutation, staged, clock, hooks, events)
    }

    pub fn mint(
        &mut self,
        to: Address,
        amount: Amount,
        clock: Clock,
        hooks: &mut [&mut dyn MutationHook],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let mutation = Mutation {
            from: Address::ZERO,
            to,
            amount,
        };
        let staged = self.stage(&mutation)?;
        self.apply(mutation, staged, clock, hooks, events)
    }

    pub fn burn(
        &mut self,
        from: Address,
        amount: Amount,
        clock: Clock,
        hooks: &mut [&mut dyn MutationHook],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        if from.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let mutation = Mutation {
            from,
            to: Address::ZERO,
            amount,
        };
        let staged = self.stage(&mutation)?;
        self.apply(mutation, staged, clock, hooks, events)
    }

    /// Sets the allowance to `amount`; not a delta.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        if owner.is_zero() || spender.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        self.write_allowance(owner, spender, amount, events);
        Ok(())
    }

    pub fn increase_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        added: Amount,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        let next = numeric::add(self.allowance(&owner, &spender), added)?;
        self.approve(owner, spender, next, events)
    }

    pub fn decrease_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        subtracted: Amount,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        let next = self.remaining_allowance(owner, spender, subtracted)?;
        self.approve(owner, spender, next, events)
    }

    /// Moves `amount` from `from` to `to` on behalf of `caller`, then charges
    /// the allowance `from` granted to `caller`.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
        clock: Clock,
        hooks: &mut [&mut dyn MutationHook],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        if from.is_zero() || to.is_zero() || caller.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let mutation = Mutation { from, to, amount };
        let staged = self.stage(&mutation)?;
        let remaining = self.remaining_allowance(from, caller, amount)?;
        self.apply(mutation, staged, clock, hooks, events)?;
        // Approval is re-emitted with the remaining allowance.
        self.write_allowance(from, caller, remaining, events);
        Ok(())
    }

    /// Burns `amount` of `account`'s balance on behalf of `caller`, charging
    /// the allowance first.
    pub fn burn_from(
        &mut self,
        caller: Address,
        account: Address,
        amount: Amount,
        clock: Clock,
        hooks: &mut [&mut dyn MutationHook],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        if account.is_zero() || caller.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let remaining = self.remaining_allowance(account, caller, amount)?;
        let mutation = Mutation {
            from: account,
            to: Address::ZERO,
            amount,
        };
        let staged = self.stage(&mutation)?;
        // Dry run the hooks before the allowance moves.
        Self::check_hooks(&self.state, clock, &mutation, hooks)?;
        self.write_allowance(account, caller, remaining, events);
        self.apply(mutation, staged, clock, hooks, events)
    }

    fn remaining_allowance(
        &self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<Amount, TokenError> {
        let available = self.allowance(&owner, &spender);
        available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance {
                owner,
                spender,
                available,
                required: amount,
            })
    }

    fn write_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
        events: &mut Vec<LedgerEvent>,
    ) {
        self.state
            .allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
        events.push(LedgerEvent::Approval {
            owner,
            spender,
            amount,
        });
    }

    fn stage(&self, mutation: &Mutation) -> Result<Staged, TokenError> {
        let Mutation { from, to, amount } = *mutation;

        let from_balance = if from.is_zero() {
            None
        } else {
            let available = self.balance_of(&from);
            let left = available
                .checked_sub(amount)
                .ok_or(TokenError::InsufficientBalance {
                    account: from,
                    available,
                    required: amount,
                })?;
            Some(left)
        };

        let to_balance = if to.is_zero() {
            None
        } else {
            let base = match from_balance {
                Some(left) if from == to => left,
                _ => self.balance_of(&to),
            };
            Some(numeric::add(base, amount)?)
        };

        let total_supply = if mutation.is_mint() {
            numeric::add(self.state.total_supply, amount)?
        } else if mutation.is_burn() {
            numeric::sub(self.state.total_supply, amount)?
        } else {
            self.state.total_supply
        };

        Ok(Staged {
            from_balance,
            to_balance,
            total_supply,
        })
    }

    fn check_hooks(
        state: &LedgerState,
        clock: Clock,
        mutation: &Mutation,
        hooks: &[&mut dyn MutationHook],
    ) -> Result<(), TokenError> {
        let view = HookView { ledger: state, clock };
        for hook in hooks.iter() {
            hook.check(&view, mutation)?;
        }
        Ok(())
    }

    fn apply(
        &mut self,
        mutation: Mutation,
        staged: Staged,
        clock: Clock,
        hooks: &mut [&mut dyn MutationHook],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        Self::check_hooks(&self.state, clock, &mutation, hooks)?;
        {
            let view = HookView {
                ledger: &self.state,
                clock,
            };
            for hook in hooks.iter_mut() {
                hook.before_mutate(&view, &mutation)?;
            }
        }

        if let Some(balance) = staged.from_balance {
            self.state.balances.insert(mutation.from, balance);
        }
        if let Some(balance) = staged.to_balance {
            self.state.balances.insert(mutation.to, balance);
        }
        self.state.total_supply = staged.total_supply;
        events.push(LedgerEvent::Transfer {
            from: mutation.from,
            to: mutation.to,
            amount: mutation.amount,
        });

        let view = HookView {
            ledger: &self.state,
            clock,
        };
        for hook in hooks.iter_mut() {
            hook.after_mutate(&view, &mutation, events)?;
        }
        Ok(())
    }
}
