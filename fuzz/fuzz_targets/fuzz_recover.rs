#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tally_crypto::recover_signer;

#[derive(Arbitrary, Debug)]
struct RecoverInput {
    digest: [u8; 32],
    signature: Vec<u8>,
}

fuzz_target!(|data: RecoverInput| {
    // Must never panic; a success must never yield the zero address.
    if let Ok(signer) = recover_signer(&data.digest, &data.signature) {
        assert!(!signer.is_zero());
        assert!(data.signature.len() == 65 || data.signature.len() == 64);
    }
});
