use super::*;
use tally_crypto::signatures::{sign_digest, signer_address, signing_key_from_bytes, to_compact};
use tally_crypto::typed_data::{delegation_struct_hash, permit_struct_hash};
use tally_crypto::SigningKey;
use tally_types::{Address, LedgerEvent, TokenConfig, TokenError};

const CHAIN_ID: u64 = 31_337;

fn admin() -> Address {
    Address([0xad; 20])
}

fn addr(b: u8) -> Address {
    Address([b; 20])
}

fn config() -> TokenConfig {
    TokenConfig::new("Tally", "TLY", Address([0xcc; 20]), admin())
}

fn new_token() -> Token {
    Token::new(config(), CHAIN_ID).unwrap()
}

fn ctx(height: u64) -> ExecutionContext {
    ExecutionContext::new(height, 1_700_000_000 + height, CHAIN_ID)
}

fn key(seed: u8) -> (Address, SigningKey) {
    let k = signing_key_from_bytes(&[seed; 32]).unwrap();
    (signer_address(&k), k)
}

fn sign_delegation(
    token: &Token,
    at: &ExecutionContext,
    k: &SigningKey,
    delegatee: Address,
    nonce: u64,
    expiry: u64,
) -> Vec<u8> {
    let digest = token.digest(at, &delegation_struct_hash(&delegatee, nonce, expiry));
    sign_digest(k, &digest).unwrap()
}

#[allow(clippy::too_many_arguments)]
fn sign_permit(
    token: &Token,
    at: &ExecutionContext,
    k: &SigningKey,
    owner: Address,
    spender: Address,
    value: u128,
    nonce: u64,
    deadline: u64,
) -> Vec<u8> {
    let digest = token.digest(at, &permit_struct_hash(&owner, &spender, value, nonce, deadline));
    sign_digest(k, &digest).unwrap()
}

#[test]
fn test_walkthrough_scenarios() {
    let mut token = new_token();
    let a = addr(1);
    let b = addr(2);

    // Scenario 1
    token.mint(&ctx(1), admin(), a, 1_000).unwrap();
    assert_eq!(token.balance_of(&a), 1_000);
    assert_eq!(token.total_supply(), 1_000);

    // Scenario 2
    token.transfer(&ctx(2), a, b, 300).unwrap();
    assert_eq!(token.balance_of(&a), 700);
    assert_eq!(token.balance_of(&b), 300);

    // Scenario 3
    let id = token.snapshot(admin()).unwrap();
    assert_eq!(id, 1);
    token.transfer(&ctx(3), a, b, 200).unwrap();
    assert_eq!(token.balance_at(&a, 1), Ok(700));
    assert_eq!(token.balance_of(&a), 500);

    // Scenario 4
    token.delegate(&ctx(4), a, a).unwrap();
    assert_eq!(token.get_votes(&a), 500);
    token.transfer(&ctx(5), a, b, 100).unwrap();
    assert_eq!(token.get_votes(&a), 400);
    assert_eq!(token.get_votes(&b), 0);

    // Scenario 5
    token.burn(&ctx(6), a, 50).unwrap();
    assert_eq!(token.balance_of(&a), 350);
    let before = token.export_state();
    let events_before = token.events().len();
    assert!(matches!(
        token.burn(&ctx(7), a, 1_000),
        Err(TokenError::InsufficientBalance { .. })
    ));
    assert_eq!(token.export_state(), before);
    assert_eq!(token.events().len(), events_before);

    // Scenario 6
    let now = ctx(7);
    assert_eq!(
        token.get_past_votes(&now, &a, 7),
        Err(TokenError::ClockNotYetElapsed {
            requested: 7,
            current: 7
        })
    );
    assert!(token.get_past_votes(&now, &a, 100).is_err());
    assert_eq!(token.get_past_votes(&now, &a, 4), Ok(500));
    assert_eq!(token.get_past_votes(&now, &a, 6), Ok(350));
}

#[test]
fn test_mint_requires_administrator() {
    let mut token = new_token();
    assert_eq!(
        token.mint(&ctx(1), addr(5), addr(5), 10),
        Err(TokenError::Unauthorized(addr(5)))
    );
    assert_eq!(token.snapshot(addr(5)), Err(TokenError::Unauthorized(addr(5))));
    assert_eq!(token.total_supply(), 0);
    assert!(token.events().is_empty());
}

#[test]
fn test_zero_delegator_is_rejected() {
    let mut token = new_token();
    token.mint(&ctx(1), admin(), addr(1), 100).unwrap();
    token.delegate(&ctx(1), addr(1), addr(1)).unwrap();
    token.take_events();

    assert_eq!(
        token.delegate(&ctx(2), Address::ZERO, addr(1)),
        Err(TokenError::ZeroAddress)
    );
    assert_eq!(token.delegates(&Address::ZERO), Address::ZERO);
    assert!(token.events().is_empty());

    // Mints and burns keep treating the zero address as "no delegate".
    token.mint(&ctx(3), admin(), addr(2), 40).unwrap();
    token.burn(&ctx(4), addr(1), 10).unwrap();
    assert_eq!(token.get_votes(&addr(1)), 90);
    token.export_state().validate(token.config().vote_bits).unwrap();
}

#[test]
fn test_transfer_from_zero_spender_is_rejected() {
    let mut token = new_token();
    token.mint(&ctx(1), admin(), addr(1), 10).unwrap();
    token.take_events();
    assert_eq!(
        token.transfer_from(&ctx(2), Address::ZERO, addr(1), addr(2), 0),
        Err(TokenError::ZeroAddress)
    );
    assert!(token.events().is_empty());
    assert!(token.export_state().ledger.allowances.is_empty());
}

#[test]
fn test_custom_access_policy() {
    struct Anyone;
    impl AccessPolicy for Anyone {
        fn is_authorized(&self, _caller: &Address) -> bool {
            true
        }
    }
    let mut token = new_token().with_access_policy(Anyone);
    token.mint(&ctx(1), addr(5), addr(5), 10).unwrap();
    assert_eq!(token.balance_of(&addr(5)), 10);
}

#[test]
fn test_event_order_for_delegated_transfer() {
    let mut token = new_token();
    token.mint(&ctx(1), admin(), addr(1), 100).unwrap();
    token.delegate(&ctx(1), addr(1), addr(1)).unwrap();
    token.delegate(&ctx(1), addr(2), addr(2)).unwrap();
    token.take_events();

    token.transfer(&ctx(2), addr(1), addr(2), 40).unwrap();
    assert_eq!(
        token.take_events(),
        vec![
            LedgerEvent::Transfer {
                from: addr(1),
                to: addr(2),
                amount: 40
            },
            LedgerEvent::DelegateVotesChanged {
                delegate: addr(1),
                previous_votes: 100,
                new_votes: 60
            },
            LedgerEvent::DelegateVotesChanged {
                delegate: addr(2),
                previous_votes: 0,
                new_votes: 40
            },
        ]
    );
}

#[test]
fn test_supply_cap_rolls_back_whole_mint() {
    let mut cfg = config();
    cfg.vote_bits = 10;
    let mut token = Token::new(cfg, CHAIN_ID).unwrap();
    token.mint(&ctx(1), admin(), addr(1), 1_000).unwrap();
    token.snapshot(admin()).unwrap();
    let before = token.export_state();

    let err = token.mint(&ctx(2), admin(), addr(1), 24).unwrap_err();
    assert_eq!(err, TokenError::SupplyCapExceeded { total: 1_024, cap: 1_023 });
    assert_eq!(token.export_state(), before);
    token.mint(&ctx(2), admin(), addr(1), 23).unwrap();
}

#[test]
fn test_delegate_by_sig_and_replay() {
    let mut token = new_token();
    let (signer, k) = key(11);
    let delegatee = addr(9);
    token.mint(&ctx(1), admin(), signer, 250).unwrap();

    let at = ctx(2);
    let expiry = at.timestamp + 60;
    let sig = sign_delegation(&token, &at, &k, delegatee, 0, expiry);
    assert_eq!(token.delegate_by_sig(&at, delegatee, 0, expiry, &sig), Ok(signer));
    assert_eq!(token.delegates(&signer), delegatee);
    assert_eq!(token.get_votes(&delegatee), 250);
    assert_eq!(token.nonces(&signer), 1);

    // Same signature again: the nonce is spent.
    assert_eq!(
        token.delegate_by_sig(&ctx(3), delegatee, 0, expiry, &sig),
        Err(TokenError::InvalidNonce {
            owner: signer,
            expected: 1,
            provided: 0
        })
    );
    // A fresh signature over the old nonce fails the same way.
    let fresh = sign_delegation(&token, &ctx(3), &k, addr(8), 0, expiry);
    assert!(matches!(
        token.delegate_by_sig(&ctx(3), addr(8), 0, expiry, &fresh),
        Err(TokenError::InvalidNonce { .. })
    ));
    assert_eq!(token.delegates(&signer), delegatee);
}

#[test]
fn test_delegate_by_sig_accepts_compact_signatures() {
    let mut token = new_token();
    let (signer, k) = key(12);
    let at = ctx(1);
    let sig = sign_delegation(&token, &at, &k, signer, 0, at.timestamp);
    let compact = to_compact(&sig).unwrap();
    assert_eq!(token.delegate_by_sig(&at, signer, 0, at.timestamp, &compact), Ok(signer));
}

#[test]
fn test_delegate_by_sig_expired() {
    let mut token = new_token();
    let (_, k) = key(13);
    let at = ctx(5);
    let expiry = at.timestamp - 1;
    let sig = sign_delegation(&token, &at, &k, addr(1), 0, expiry);
    assert_eq!(
        token.delegate_by_sig(&at, addr(1), 0, expiry, &sig),
        Err(TokenError::Expired {
            deadline: expiry,
            now: at.timestamp
        })
    );
}

#[test]
fn test_delegate_by_sig_rejects_other_chain() {
    let mut token = new_token();
    let (signer, k) = key(14);
    let home = ctx(1);
    let sig = sign_delegation(&token, &home, &k, addr(3), 0, home.timestamp + 10);

    // Same height, forked chain identity: the digest changes, so the
    // signature recovers to someone else whose nonce is still 0.
    let forked = ExecutionContext::new(1, home.timestamp, CHAIN_ID + 1);
    let recovered = token
        .delegate_by_sig(&forked, addr(3), 0, home.timestamp + 10, &sig)
        .unwrap();
    assert_ne!(recovered, signer);
    assert_eq!(token.nonces(&signer), 0);
    assert_ne!(token.domain_separator(CHAIN_ID), token.domain_separator(CHAIN_ID + 1));
}

#[test]
fn test_permit_sets_allowance_once() {
    let mut token = new_token();
    let (owner, k) = key(21);
    let spender = addr(7);
    token.mint(&ctx(1), admin(), owner, 500).unwrap();

    let at = ctx(2);
    let deadline = at.timestamp + 100;
    let sig = sign_permit(&token, &at, &k, owner, spender, 300, 0, deadline);
    token.permit(&at, owner, spender, 300, 0, deadline, &sig).unwrap();
    assert_eq!(token.allowance(&owner, &spender), 300);
    assert_eq!(token.nonces(&owner), 1);

    token.transfer_from(&ctx(3), spender, owner, addr(8), 120).unwrap();
    assert_eq!(token.allowance(&owner, &spender), 180);

    assert!(matches!(
        token.permit(&ctx(3), owner, spender, 300, 0, deadline, &sig),
        Err(TokenError::InvalidNonce { .. })
    ));
    let fresh = sign_permit(&token, &ctx(3), &k, owner, spender, 999, 0, deadline);
    assert!(matches!(
        token.permit(&ctx(3), owner, spender, 999, 0, deadline, &fresh),
        Err(TokenError::InvalidNonce { .. })
    ));
    assert_eq!(token.allowance(&owner, &spender), 180);
}

#[test]
fn test_permit_rejects_wrong_signer_and_expiry() {
    let mut token = new_token();
    let (owner, _) = key(22);
    let (_, mallory) = key(23);
    let at = ctx(1);
    let deadline = at.timestamp + 5;

    let forged = sign_permit(&token, &at, &mallory, owner, addr(4), 10, 0, deadline);
    assert_eq!(
        token.permit(&at, owner, addr(4), 10, 0, deadline, &forged),
        Err(TokenError::InvalidSignature)
    );

    let late = ctx(100);
    assert!(matches!(
        token.permit(&late, owner, addr(4), 10, 0, deadline, &forged),
        Err(TokenError::Expired { .. })
    ));
    assert_eq!(token.nonces(&owner), 0);
}

#[test]
fn test_permit_to_zero_spender_keeps_nonce() {
    let mut token = new_token();
    let (owner, k) = key(24);
    let at = ctx(1);
    let sig = sign_permit(&token, &at, &k, owner, Address::ZERO, 1, 0, at.timestamp);
    assert_eq!(
        token.permit(&at, owner, Address::ZERO, 1, 0, at.timestamp, &sig),
        Err(TokenError::ZeroAddress)
    );
    assert_eq!(token.nonces(&owner), 0);
}

#[test]
fn test_clock_must_not_go_backwards() {
    let mut token = new_token();
    token.mint(&ctx(10), admin(), addr(1), 5).unwrap();
    assert_eq!(
        token.transfer(&ctx(9), addr(1), addr(2), 1),
        Err(TokenError::ClockWentBackwards { last: 10, now: 9 })
    );
    token.transfer(&ctx(10), addr(1), addr(2), 1).unwrap();
}

#[test]
fn test_export_and_restore_round_trip() {
    let mut token = new_token();
    token.mint(&ctx(1), admin(), addr(1), 1_000).unwrap();
    token.delegate(&ctx(2), addr(1), addr(3)).unwrap();
    token.snapshot(admin()).unwrap();
    token.transfer(&ctx(3), addr(1), addr(2), 10).unwrap();

    let restored = Token::from_state(config(), CHAIN_ID, token.export_state()).unwrap();
    assert_eq!(restored.export_state(), token.export_state());
    assert_eq!(restored.get_votes(&addr(3)), 990);
    assert_eq!(restored.balance_at(&addr(1), 1), Ok(1_000));
}

#[test]
fn test_restore_rejects_corrupt_state() {
    let mut token = new_token();
    token.mint(&ctx(1), admin(), addr(1), 1_000).unwrap();
    let mut state = token.export_state();
    state.ledger.total_supply += 1;
    assert!(matches!(
        Token::from_state(config(), CHAIN_ID, state),
        Err(TokenError::InvalidState(_))
    ));
}

#[test]
fn test_metadata_and_clock_mode() {
    let token = new_token();
    assert_eq!(token.name(), "Tally");
    assert_eq!(token.symbol(), "TLY");
    assert_eq!(token.decimals(), 18);
    assert_eq!(token.clock_mode(), "mode=blocknumber&from=default");
    assert_eq!(token.clock(&ctx(4)), Ok(4));
}

#[test]
fn test_burn_from_and_allowance_records() {
    let mut token = new_token();
    token.mint(&ctx(1), admin(), addr(1), 100).unwrap();
    token.approve(&ctx(1), addr(1), addr(2), 30).unwrap();
    token.increase_allowance(&ctx(1), addr(1), addr(2), 10).unwrap();
    token.decrease_allowance(&ctx(1), addr(1), addr(2), 5).unwrap();
    token.take_events();

    token.burn_from(&ctx(2), addr(2), addr(1), 35).unwrap();
    assert_eq!(token.balance_of(&addr(1)), 65);
    assert_eq!(token.allowance(&addr(1), &addr(2)), 0);
    assert_eq!(
        token.take_events(),
        vec![
            LedgerEvent::Approval {
                owner: addr(1),
                spender: addr(2),
                amount: 0
            },
            LedgerEvent::Transfer {
                from: addr(1),
                to: Address::ZERO,
                amount: 35
            },
        ]
    );
}
