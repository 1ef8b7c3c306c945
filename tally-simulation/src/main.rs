use anyhow::{ensure, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::BTreeMap;
use std::time::Instant;
use tally_crypto::signatures::{sign_digest, signer_address, signing_key_from_bytes, SigningKey};
use tally_crypto::typed_data::{delegation_struct_hash, permit_struct_hash};
use tally_execution::{numeric, ExecutionContext, Token};
use tally_genesis::{create_genesis_token, Allocation, GenesisConfig};
use tally_types::{Address, Amount, TokenConfig};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

const CHAIN_ID: u64 = 1;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tally ledger workload simulation")]
struct Args {
    /// Number of wallets created for the simulation.
    #[arg(long, default_value_t = 50)]
    wallets: usize,
    /// Number of random operations to execute.
    #[arg(long, default_value_t = 5_000)]
    operations: usize,
    /// Starting balance airdropped to each wallet.
    #[arg(long, default_value_t = 10_000)]
    airdrop: u128,
    /// RNG seed; the same seed replays the same workload.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(short, long)]
    verbose: bool,
}

struct SimWallet {
    key: SigningKey,
    address: Address,
}

#[derive(Default, Debug)]
struct Tally {
    attempted: BTreeMap<&'static str, u64>,
    applied: BTreeMap<&'static str, u64>,
    events: u64,
}

impl Tally {
    fn record(&mut self, op: &'static str, ok: bool) {
        *self.attempted.entry(op).or_default() += 1;
        if ok {
            *self.applied.entry(op).or_default() += 1;
        }
    }
}

fn build_wallets(rng: &mut StdRng, count: usize) -> Result<Vec<SimWallet>> {
    (0..count)
        .map(|_| {
            let mut secret = [0u8; 32];
            rng.fill_bytes(&mut secret);
            let key = signing_key_from_bytes(&secret)?;
            Ok(SimWallet {
                address: signer_address(&key),
                key,
            })
        })
        .collect()
}

fn administrator() -> Address {
    Address([0xad; 20])
}

fn bootstrap(wallets: &[SimWallet], airdrop: Amount) -> Result<Token> {
    let genesis = GenesisConfig {
        chain_id: CHAIN_ID,
        token: TokenConfig::new("Simulated", "SIM", Address([0x51; 20]), administrator()),
        allocations: wallets
            .iter()
            .map(|w| Allocation {
                account: w.address,
                amount: airdrop,
            })
            .collect(),
        delegations: Vec::new(),
    };
    create_genesis_token(&genesis, &ExecutionContext::new(1, 1_700_000_000, CHAIN_ID))
}

/// Balances sum to supply and every delegate's votes equal what is
/// delegated to it.
fn check_invariants(token: &Token, wallets: &[SimWallet]) -> Result<()> {
    let sum: Amount = wallets.iter().map(|w| token.balance_of(&w.address)).sum();
    ensure!(
        sum == token.total_supply(),
        "balance sum {} != total supply {}",
        sum,
        token.total_supply()
    );

    let mut delegated: BTreeMap<Address, Amount> = BTreeMap::new();
    for w in wallets {
        let delegate = token.delegates(&w.address);
        if !delegate.is_zero() {
            *delegated.entry(delegate).or_default() += token.balance_of(&w.address);
        }
    }
    for w in wallets {
        let expected = delegated.get(&w.address).copied().unwrap_or(0);
        let votes = token.get_votes(&w.address);
        ensure!(votes == expected, "{} has {} votes, expected {}", w.address, votes, expected);
    }
    Ok(())
}

fn step(
    token: &mut Token,
    wallets: &[SimWallet],
    rng: &mut StdRng,
    ctx: &ExecutionContext,
    tally: &mut Tally,
) -> Result<()> {
    let a = &wallets[rng.gen_range(0..wallets.len())];
    let b = &wallets[rng.gen_range(0..wallets.len())];
    let balance = token.balance_of(&a.address);
    // Mostly affordable amounts, sometimes more than the sender holds.
    let amount = rng.gen_range(0..=numeric::ceil_div(balance, 4)?.saturating_add(10));

    let (op, ok) = match rng.gen_range(0..100) {
        0..=39 => ("transfer", token.transfer(ctx, a.address, b.address, amount).is_ok()),
        40..=49 => ("burn", token.burn(ctx, a.address, numeric::min(amount, 50)).is_ok()),
        50..=54 => ("mint", token.mint(ctx, administrator(), a.address, amount).is_ok()),
        55..=59 => ("snapshot", token.snapshot(administrator()).is_ok()),
        60..=74 => ("delegate", token.delegate(ctx, a.address, b.address).is_ok()),
        75..=84 => {
            let nonce = token.nonces(&a.address);
            let expiry = ctx.timestamp + rng.gen_range(0..30);
            let digest = token.digest(ctx, &delegation_struct_hash(&b.address, nonce, expiry));
            let sig = sign_digest(&a.key, &digest)?;
            ("delegate_by_sig", token.delegate_by_sig(ctx, b.address, nonce, expiry, &sig).is_ok())
        }
        _ => {
            let nonce = token.nonces(&a.address);
            let deadline = ctx.timestamp + 60;
            let digest = token.digest(
                ctx,
                &permit_struct_hash(&a.address, &b.address, amount, nonce, deadline),
            );
            let sig = sign_digest(&a.key, &digest)?;
            let permitted = token
                .permit(ctx, a.address, b.address, amount, nonce, deadline, &sig)
                .is_ok();
            let spent = permitted && token.transfer_from(ctx, b.address, a.address, b.address, amount).is_ok();
            tally.record("transfer_from", spent);
            ("permit", permitted)
        }
    };
    debug!(op, ok, height = ctx.height, "step");
    tally.record(op, ok);
    Ok(())
}

fn run_simulation(args: &Args) -> Result<Tally> {
    ensure!(args.wallets >= 2, "need at least two wallets");
    let mut rng = StdRng::seed_from_u64(args.seed);
    let wallets = build_wallets(&mut rng, args.wallets)?;
    let mut token = bootstrap(&wallets, args.airdrop)?;
    token.take_events();
    let mut ctx = ExecutionContext::new(2, 1_700_000_012, CHAIN_ID);
    let mut tally = Tally::default();

    let start = Instant::now();
    for i in 0..args.operations {
        step(&mut token, &wallets, &mut rng, &ctx, &mut tally)?;
        check_invariants(&token, &wallets)?;
        tally.events += token.take_events().len() as u64;
        if rng.gen_bool(0.3) {
            ctx = ctx.advance(1, 12);
        }
        if (i + 1) % 1_000 == 0 {
            info!(done = i + 1, height = ctx.height, supply = token.total_supply(), "progress");
        }
    }
    let elapsed = start.elapsed();

    let final_height = ExecutionContext::new(ctx.height + 1, ctx.timestamp, CHAIN_ID);
    let past_supply = token.get_past_total_supply(&final_height, ctx.height)?;
    ensure!(past_supply == token.total_supply(), "past total supply diverged");

    println!("=== Tally Simulation ===");
    println!("Wallets: {}", wallets.len());
    println!("Operations: {}", args.operations);
    for (op, attempted) in &tally.attempted {
        let applied = tally.applied.get(op).copied().unwrap_or(0);
        println!("  {:<16} {:>7} attempted {:>7} applied", op, attempted, applied);
    }
    println!("Final height: {}", ctx.height);
    println!("Snapshots taken: {}", token.current_snapshot_id());
    println!("Total supply: {}", token.total_supply());
    println!("Events recorded: {}", tally.events);
    println!("Elapsed: {:.2?}", elapsed);

    Ok(tally)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(seed = args.seed, wallets = args.wallets, "starting simulation");
    run_simulation(&args)?;
    Ok(())
}
