use tally_crypto::typed_data::{delegation_struct_hash, permit_struct_hash};
use tally_crypto::{Digest32, SignatureAuthority};
use tally_types::state::{Checkpoint, GlobalState};
use tally_types::{Address, Amount, Clock, LedgerEvent, Nonce, SnapshotId, TokenConfig, TokenError};
use tracing::{debug, warn};

use crate::access::{AccessPolicy, Administrator};
use crate::hooks::MutationHook;
use crate::ledger::Ledger;
use crate::nonces::ReplayGuard;
use crate::snapshot::SnapshotStore;
use crate::votes::VotingLedger;
use crate::ExecutionContext;

pub const CLOCK_MODE: &str = "mode=blocknumber&from=default";

/// A fungible token with snapshots, delegated votes and signed approvals.
///
/// Every mutating call either applies completely and appends its records to
/// the event log, or fails and leaves the token untouched.
pub struct Token {
    config: TokenConfig,
    ledger: Ledger,
    snapshots: SnapshotStore,
    voting: VotingLedger,
    nonces: ReplayGuard,
    authority: SignatureAuthority,
    access: Box<dyn AccessPolicy>,
    last_clock: Clock,
    /// Records of applied calls, oldest first. Grows until the host drains
    /// it with `take_events`.
    events: Vec<LedgerEvent>,
}

impl Token {
    pub fn new(config: TokenConfig, chain_id: u64) -> Result<Self, TokenError> {
        Self::from_state(config, chain_id, GlobalState::default())
    }

    /// Restores a token from persisted state, refusing state that violates
    /// any ordering, width or accounting invariant.
    pub fn from_state(config: TokenConfig, chain_id: u64, state: GlobalState) -> Result<Self, TokenError> {
        config.validate()?;
        state.validate(config.vote_bits)?;
        let authority = SignatureAuthority::new(
            &config.name,
            &config.version,
            config.verifying_contract,
            chain_id,
        );
        let GlobalState {
            ledger,
            snapshots,
            voting,
            nonces,
            last_clock,
        } = state;
        Ok(Self {
            access: Box::new(Administrator(config.administrator)),
            ledger: Ledger::from_state(ledger),
            snapshots: SnapshotStore::from_state(snapshots),
            voting: VotingLedger::from_state(voting, config.vote_bits),
            nonces: ReplayGuard::from_state(nonces),
            authority,
            last_clock,
            events: Vec::new(),
            config,
        })
    }

    pub fn with_access_policy(mut self, policy: impl AccessPolicy + 'static) -> Self {
        self.access = Box::new(policy);
        self
    }

    pub fn export_state(&self) -> GlobalState {
        GlobalState {
            ledger: self.ledger.state().clone(),
            snapshots: self.snapshots.state().clone(),
            voting: self.voting.state().clone(),
            nonces: self.nonces.state().clone(),
            last_clock: self.last_clock,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.config.decimals
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- balances ----

    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.ledger.balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.ledger.allowance(owner, spender)
    }

    pub fn transfer(
        &mut self,
        ctx: &ExecutionContext,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.run(ctx, "transfer", |token, now, events| {
            let (ledger, mut hooks) = token.parts();
            ledger.transfer(caller, to, amount, now, &mut hooks, events)
        })
    }

    pub fn transfer_from(
        &mut self,
        ctx: &ExecutionContext,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.run(ctx, "transfer_from", |token, now, events| {
            let (ledger, mut hooks) = token.parts();
            ledger.transfer_from(caller, from, to, amount, now, &mut hooks, events)
        })
    }

    pub fn approve(
        &mut self,
        ctx: &ExecutionContext,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.run(ctx, "approve", |token, _, events| {
            token.ledger.approve(owner, spender, amount, events)
        })
    }

    pub fn increase_allowance(
        &mut self,
        ctx: &ExecutionContext,
        owner: Address,
        spender: Address,
        added: Amount,
    ) -> Result<(), TokenError> {
        self.run(ctx, "increase_allowance", |token, _, events| {
            token.ledger.increase_allowance(owner, spender, added, events)
        })
    }

    pub fn decrease_allowance(
        &mut self,
        ctx: &ExecutionContext,
        owner: Address,
        spender: Address,
        subtracted: Amount,
    ) -> Result<(), TokenError> {
        self.run(ctx, "decrease_allowance", |token, _, events| {
            token.ledger.decrease_allowance(owner, spender, subtracted, events)
        })
    }

    pub fn mint(
        &mut self,
        ctx: &ExecutionContext,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.authorize(&caller)?;
        self.run(ctx, "mint", |token, now, events| {
            let (ledger, mut hooks) = token.parts();
            ledger.mint(to, amount, now, &mut hooks, events)
        })
    }

    pub fn burn(&mut self, ctx: &ExecutionContext, caller: Address, amount: Amount) -> Result<(), TokenError> {
        self.run(ctx, "burn", |token, now, events| {
            let (ledger, mut hooks) = token.parts();
            ledger.burn(caller, amount, now, &mut hooks, events)
        })
    }

    pub fn burn_from(
        &mut self,
        ctx: &ExecutionContext,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.run(ctx, "burn_from", |token, now, events| {
            let (ledger, mut hooks) = token.parts();
            ledger.burn_from(caller, account, amount, now, &mut hooks, events)
        })
    }

    // ---- snapshots ----

    pub fn snapshot(&mut self, caller: Address) -> Result<SnapshotId, TokenError> {
        self.authorize(&caller)?;
        let mut pending = Vec::new();
        let id = self.snapshots.take_snapshot(&mut pending)?;
        debug!(id, "snapshot taken");
        self.events.append(&mut pending);
        Ok(id)
    }

    pub fn current_snapshot_id(&self) -> SnapshotId {
        self.snapshots.current_id()
    }

    pub fn balance_at(&self, account: &Address, id: SnapshotId) -> Result<Amount, TokenError> {
        self.snapshots.balance_at(self.ledger.state(), account, id)
    }

    pub fn total_supply_at(&self, id: SnapshotId) -> Result<Amount, TokenError> {
        self.snapshots.total_supply_at(self.ledger.state(), id)
    }

    // ---- votes ----

    pub fn clock(&self, ctx: &ExecutionContext) -> Result<Clock, TokenError> {
        if ctx.height < self.last_clock {
            return Err(TokenError::ClockWentBackwards {
                last: self.last_clock,
                now: ctx.height,
            });
        }
        Ok(ctx.height)
    }

    pub fn clock_mode(&self) -> &'static str {
        CLOCK_MODE
    }

    pub fn delegates(&self, account: &Address) -> Address {
        self.voting.delegates(account)
    }

    pub fn num_checkpoints(&self, account: &Address) -> usize {
        self.voting.num_checkpoints(account)
    }

    pub fn checkpoint_at(&self, account: &Address, pos: usize) -> Option<Checkpoint> {
        self.voting.checkpoint_at(account, pos)
    }

    pub fn get_votes(&self, account: &Address) -> Amount {
        self.voting.get_votes(account)
    }

    pub fn get_past_votes(&self, ctx: &ExecutionContext, account: &Address, at: Clock) -> Result<Amount, TokenError> {
        let now = self.clock(ctx)?;
        self.voting.get_past_votes(account, at, now)
    }

    pub fn get_past_total_supply(&self, ctx: &ExecutionContext, at: Clock) -> Result<Amount, TokenError> {
        let now = self.clock(ctx)?;
        self.voting.get_past_total_supply(at, now)
    }

    pub fn delegate(&mut self, ctx: &ExecutionContext, caller: Address, delegatee: Address) -> Result<(), TokenError> {
        self.run(ctx, "delegate", |token, now, events| {
            let balance = token.ledger.balance_of(&caller);
            token.voting.delegate(caller, delegatee, balance, now, events)
        })
    }

    /// Delegates on behalf of whoever signed `Delegation(delegatee, nonce,
    /// expiry)`. Returns the recovered signer.
    pub fn delegate_by_sig(
        &mut self,
        ctx: &ExecutionContext,
        delegatee: Address,
        nonce: Nonce,
        expiry: u64,
        signature: &[u8],
    ) -> Result<Address, TokenError> {
        let result = self.run(ctx, "delegate_by_sig", |token, now, events| {
            if ctx.timestamp > expiry {
                return Err(TokenError::Expired {
                    deadline: expiry,
                    now: ctx.timestamp,
                });
            }
            let digest = token.digest(ctx, &delegation_struct_hash(&delegatee, nonce, expiry));
            let signer = token.authority.recover_signer(&digest, signature)?;
            token.nonces.verify(&signer, nonce)?;
            let balance = token.ledger.balance_of(&signer);
            token.voting.delegate(signer, delegatee, balance, now, events)?;
            token.nonces.consume(&signer)?;
            Ok(signer)
        });
        if let Err(err) = &result {
            warn!(%delegatee, nonce, error = %err, "signed delegation rejected");
        }
        result
    }

    // ---- signed approvals ----

    pub fn nonces(&self, owner: &Address) -> Nonce {
        self.nonces.current(owner)
    }

    pub fn domain_separator(&self, chain_id: u64) -> Digest32 {
        self.authority.domain_separator(chain_id)
    }

    /// Sets `owner`'s allowance for `spender` from an off-line signature over
    /// `Permit(owner, spender, value, nonce, deadline)`.
    #[allow(clippy::too_many_arguments)]
    pub fn permit(
        &mut self,
        ctx: &ExecutionContext,
        owner: Address,
        spender: Address,
        value: Amount,
        nonce: Nonce,
        deadline: u64,
        signature: &[u8],
    ) -> Result<(), TokenError> {
        let result = self.run(ctx, "permit", |token, _, events| {
            if ctx.timestamp > deadline {
                return Err(TokenError::Expired {
                    deadline,
                    now: ctx.timestamp,
                });
            }
            let struct_hash = permit_struct_hash(&owner, &spender, value, nonce, deadline);
            let digest = token.digest(ctx, &struct_hash);
            let signer = token.authority.recover_signer(&digest, signature)?;
            if signer != owner {
                return Err(TokenError::InvalidSignature);
            }
            token.nonces.verify(&owner, nonce)?;
            token.ledger.approve(owner, spender, value, events)?;
            token.nonces.consume(&owner)?;
            Ok(())
        });
        if let Err(err) = &result {
            warn!(%owner, %spender, nonce, error = %err, "permit rejected");
        }
        result
    }

    /// Typed-data digest the token expects signatures over.
    pub fn digest(&self, ctx: &ExecutionContext, struct_hash: &Digest32) -> Digest32 {
        self.authority.build_digest(ctx.chain_id, struct_hash)
    }

    // ---- plumbing ----

    fn authorize(&self, caller: &Address) -> Result<(), TokenError> {
        if self.access.is_authorized(caller) {
            Ok(())
        } else {
            Err(TokenError::Unauthorized(*caller))
        }
    }

    /// Snapshot store first so history records pre-change values; voting
    /// second so it sees post-change balances.
    fn parts(&mut self) -> (&mut Ledger, [&mut dyn MutationHook; 2]) {
        (&mut self.ledger, [&mut self.snapshots, &mut self.voting])
    }

    fn run<T>(
        &mut self,
        ctx: &ExecutionContext,
        op: &'static str,
        call: impl FnOnce(&mut Self, Clock, &mut Vec<LedgerEvent>) -> Result<T, TokenError>,
    ) -> Result<T, TokenError> {
        let now = self.clock(ctx)?;
        let mut pending = Vec::new();
        match call(self, now, &mut pending) {
            Ok(out) => {
                debug!(op, clock = now, records = pending.len(), "call applied");
                self.last_clock = now;
                self.events.append(&mut pending);
                Ok(out)
            }
            Err(err) => {
                debug!(op, clock = now, error = %err, "call rejected");
                Err(err)
            }
        }
    }
}
