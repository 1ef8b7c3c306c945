#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tally_execution::{ExecutionContext, Token};
use tally_types::{Address, TokenConfig};

#[derive(Arbitrary, Debug)]
enum Step {
    Mint { to: u8, amount: u128 },
    Transfer { from: u8, to: u8, amount: u128 },
    Approve { owner: u8, spender: u8, amount: u128 },
    TransferFrom { spender: u8, from: u8, to: u8, amount: u128 },
    Burn { from: u8, amount: u128 },
    Snapshot,
}

fn account(k: u8) -> Address {
    // Multiples of five map to the zero address.
    if k % 5 == 0 {
        Address::ZERO
    } else {
        Address([k % 5; 20])
    }
}

fuzz_target!(|steps: Vec<Step>| {
    let admin = Address([0xad; 20]);
    let Ok(mut token) = Token::new(TokenConfig::new("Fuzz", "FZ", Address([0xcc; 20]), admin), 1) else {
        return;
    };
    let ctx = ExecutionContext::new(1, 1, 1);

    for step in steps.iter().take(64) {
        let before = token.export_state();
        let events = token.events().len();
        let result = match *step {
            Step::Mint { to, amount } => token.mint(&ctx, admin, account(to), amount),
            Step::Transfer { from, to, amount } => token.transfer(&ctx, account(from), account(to), amount),
            Step::Approve { owner, spender, amount } => token.approve(&ctx, account(owner), account(spender), amount),
            Step::TransferFrom { spender, from, to, amount } => {
                token.transfer_from(&ctx, account(spender), account(from), account(to), amount)
            }
            Step::Burn { from, amount } => token.burn(&ctx, account(from), amount),
            Step::Snapshot => token.snapshot(admin).map(|_| ()),
        };
        if result.is_err() {
            assert_eq!(token.export_state(), before);
            assert_eq!(token.events().len(), events);
        }
        let sum: u128 = (1..5u8).map(|k| token.balance_of(&account(k))).sum();
        assert_eq!(sum, token.total_supply());
    }
});
