//! Delegated voting power, checkpointed against the logical clock.
//!
//! Balances count towards nobody until their holder delegates. Each
//! delegate carries an append-only list of `(clock, votes)` checkpoints with
//! at most one entry per clock value.

use tally_types::state::{Checkpoint, VotingState};
use tally_types::{Address, Amount, Clock, LedgerEvent, TokenError};

use crate::hooks::{HookView, Mutation, MutationHook};
use crate::numeric::{self, average, sqrt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Series {
    Account(Address),
    TotalSupply,
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    series: Series,
    previous: Amount,
    votes: Amount,
}

/// Checkpoint writes that have passed every check and only need storing.
#[derive(Debug, Default)]
struct Plan {
    writes: Vec<PendingWrite>,
}

#[derive(Debug, Clone)]
pub struct VotingLedger {
    state: VotingState,
    vote_bits: u32,
}

impl VotingLedger {
    pub fn new(vote_bits: u32) -> Self {
        Self::from_state(VotingState::default(), vote_bits)
    }

    pub fn from_state(state: VotingState, vote_bits: u32) -> Self {
        Self { state, vote_bits }
    }

    pub fn state(&self) -> &VotingState {
        &self.state
    }

    pub fn max_votes(&self) -> Amount {
        tally_types::config::max_for_bits(self.vote_bits)
    }

    pub fn delegates(&self, account: &Address) -> Address {
        self.state.delegate_of(account)
    }

    pub fn num_checkpoints(&self, account: &Address) -> usize {
        self.state.checkpoints.get(account).map_or(0, Vec::len)
    }

    pub fn checkpoint_at(&self, account: &Address, pos: usize) -> Option<Checkpoint> {
        self.state
            .checkpoints
            .get(account)
            .and_then(|series| series.get(pos))
            .copied()
    }

    pub fn get_votes(&self, account: &Address) -> Amount {
        self.state
            .checkpoints
            .get(account)
            .and_then(|series| series.last())
            .map_or(0, |c| c.votes)
    }

    pub fn get_past_votes(&self, account: &Address, at: Clock, now: Clock) -> Result<Amount, TokenError> {
        ensure_elapsed(at, now)?;
        Ok(self
            .state
            .checkpoints
            .get(account)
            .map_or(0, |series| lookup(series, at)))
    }

    pub fn get_past_total_supply(&self, at: Clock, now: Clock) -> Result<Amount, TokenError> {
        ensure_elapsed(at, now)?;
        Ok(lookup(&self.state.total_supply_checkpoints, at))
    }

    /// Points `delegator` at `delegatee` and moves the delegator's balance
    /// from the old delegate to the new one.
    pub fn delegate(
        &mut self,
        delegator: Address,
        delegatee: Address,
        balance: Amount,
        clock: Clock,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        if delegator.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let current = self.delegates(&delegator);
        let mut plan = Plan::default();
        self.plan_move(&mut plan, current, delegatee, balance)?;
        let at_clock = self.plan_clock(&plan, clock)?;

        if delegatee.is_zero() {
            self.state.delegates.remove(&delegator);
        } else {
            self.state.delegates.insert(delegator, delegatee);
        }
        events.push(LedgerEvent::DelegateChanged {
            delegator,
            from_delegate: current,
            to_delegate: delegatee,
        });
        self.commit(plan, at_clock, events);
        Ok(())
    }

    fn latest(&self, series: Series) -> Amount {
        match series {
            Series::Account(account) => self.get_votes(&account),
            Series::TotalSupply => self.state.total_supply_checkpoints.last().map_or(0, |c| c.votes),
        }
    }

    fn plan_move(
        &self,
        plan: &mut Plan,
        source: Address,
        destination: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if source == destination || amount == 0 {
            return Ok(());
        }
        if !source.is_zero() {
            let series = Series::Account(source);
            let previous = self.latest(series);
            let votes = numeric::sub(previous, amount)?;
            plan.writes.push(PendingWrite {
                series,
                previous,
                votes,
            });
        }
        if !destination.is_zero() {
            let series = Series::Account(destination);
            let previous = self.latest(series);
            let votes = numeric::fit_bits(numeric::add(previous, amount)?, self.vote_bits)?;
            plan.writes.push(PendingWrite {
                series,
                previous,
                votes,
            });
        }
        Ok(())
    }

    /// Everything `mutation` does to checkpoints. `total_after` is the total
    /// supply once the mutation has been applied.
    fn plan_mutation(&self, mutation: &Mutation, total_after: Amount) -> Result<Plan, TokenError> {
        let mut plan = Plan::default();

        if mutation.is_mint() {
            let cap = self.max_votes();
            if total_after > cap {
                return Err(TokenError::SupplyCapExceeded {
                    total: total_after,
                    cap,
                });
            }
        }
        if mutation.is_mint() || mutation.is_burn() {
            let previous = self.latest(Series::TotalSupply);
            let votes = if mutation.is_mint() {
                numeric::fit_bits(numeric::add(previous, mutation.amount)?, self.vote_bits)?
            } else {
                numeric::sub(previous, mutation.amount)?
            };
            plan.writes.push(PendingWrite {
                series: Series::TotalSupply,
                previous,
                votes,
            });
        }

        self.plan_move(
            &mut plan,
            self.delegates(&mutation.from),
            self.delegates(&mutation.to),
            mutation.amount,
        )?;
        Ok(plan)
    }

    fn plan_clock(&self, plan: &Plan, clock: Clock) -> Result<u32, TokenError> {
        if plan.writes.is_empty() {
            return Ok(0);
        }
        numeric::to_u32(clock)
    }

    fn commit(&mut self, plan: Plan, at_clock: u32, events: &mut Vec<LedgerEvent>) {
        for write in plan.writes {
            let series = match write.series {
                Series::Account(account) => self.state.checkpoints.entry(account).or_default(),
                Series::TotalSupply => &mut self.state.total_supply_checkpoints,
            };
            write_checkpoint(series, at_clock, write.votes);
            if let Series::Account(delegate) = write.series {
                events.push(LedgerEvent::DelegateVotesChanged {
                    delegate,
                    previous_votes: write.previous,
                    new_votes: write.votes,
                });
            }
        }
    }
}

impl MutationHook for VotingLedger {
    fn check(&self, view: &HookView<'_>, mutation: &Mutation) -> Result<(), TokenError> {
        let total_after = if mutation.is_mint() {
            numeric::add(view.ledger.total_supply, mutation.amount)?
        } else if mutation.is_burn() {
            numeric::sub(view.ledger.total_supply, mutation.amount)?
        } else {
            view.ledger.total_supply
        };
        let plan = self.plan_mutation(mutation, total_after)?;
        self.plan_clock(&plan, view.clock)?;
        Ok(())
    }

    fn after_mutate(
        &mut self,
        view: &HookView<'_>,
        mutation: &Mutation,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), TokenError> {
        let plan = self.plan_mutation(mutation, view.ledger.total_supply)?;
        let at_clock = self.plan_clock(&plan, view.clock)?;
        self.commit(plan, at_clock, events);
        Ok(())
    }
}

fn ensure_elapsed(at: Clock, now: Clock) -> Result<(), TokenError> {
    if at >= now {
        return Err(TokenError::ClockNotYetElapsed {
            requested: at,
            current: now,
        });
    }
    Ok(())
}

/// Same-clock updates overwrite the last entry; otherwise append.
fn write_checkpoint(series: &mut Vec<Checkpoint>, at_clock: u32, votes: Amount) {
    match series.last_mut() {
        Some(last) if last.at_clock == at_clock => last.votes = votes,
        _ => series.push(Checkpoint { at_clock, votes }),
    }
}

/// Votes of the last checkpoint with `at_clock <= at`, or 0.
///
/// Long series probe `len - sqrt(len)` first since most queries ask about
/// recent history.
fn lookup(series: &[Checkpoint], at: Clock) -> Amount {
    let len = series.len();
    let mut low = 0usize;
    let mut high = len;

    if len > 5 {
        let mid = len - sqrt(len as u64) as usize;
        if Clock::from(series[mid].at_clock) > at {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    while low < high {
        let mid = average(low as u64, high as u64) as usize;
        if Clock::from(series[mid].at_clock) > at {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    if high == 0 {
        0
    } else {
        series[high - 1].votes
    }
}
