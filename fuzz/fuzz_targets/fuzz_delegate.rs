#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tally_execution::{ExecutionContext, Token};
use tally_types::{Address, TokenConfig};

#[derive(Arbitrary, Debug)]
enum Step {
    Mint { to: u8, amount: u64 },
    Transfer { from: u8, to: u8, amount: u64 },
    Burn { from: u8, amount: u64 },
    Delegate { from: u8, to: u8 },
    Advance { blocks: u8 },
}

fn account(k: u8) -> Address {
    Address([k % 4 + 1; 20])
}

/// Like `account`, but a delegator may also be the zero address.
fn delegator(k: u8) -> Address {
    if k % 5 == 4 {
        Address::ZERO
    } else {
        account(k)
    }
}

fuzz_target!(|steps: Vec<Step>| {
    let admin = Address([0xad; 20]);
    let mut config = TokenConfig::new("Fuzz", "FZ", Address([0xcc; 20]), admin);
    config.vote_bits = 64;
    let Ok(mut token) = Token::new(config, 1) else {
        return;
    };
    let mut ctx = ExecutionContext::new(1, 1, 1);

    for step in steps.iter().take(64) {
        let _ = match *step {
            Step::Mint { to, amount } => token.mint(&ctx, admin, account(to), amount.into()),
            Step::Transfer { from, to, amount } => token.transfer(&ctx, account(from), account(to), amount.into()),
            Step::Burn { from, amount } => token.burn(&ctx, account(from), amount.into()),
            Step::Delegate { from, to } => token.delegate(&ctx, delegator(from), account(to)),
            Step::Advance { blocks } => {
                ctx = ctx.advance(u64::from(blocks), 12);
                Ok(())
            }
        };

        assert!(token.delegates(&Address::ZERO).is_zero());
        for k in 0..4u8 {
            let who = account(k);
            let delegated: u128 = (0..4u8)
                .map(account)
                .filter(|a| token.delegates(a) == who)
                .map(|a| token.balance_of(&a))
                .sum();
            assert_eq!(token.get_votes(&who), delegated);
        }
    }
    assert!(token.export_state().validate(64).is_ok());
});
