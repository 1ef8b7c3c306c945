use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tally_types::state::GlobalState;

pub const FORMAT_VERSION: u32 = 1;

/// On-disk wrapper around a bincode-encoded `GlobalState`.
#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: [u8; 32],
    payload: Vec<u8>,
}

pub fn encode_state(state: &GlobalState) -> Result<Vec<u8>> {
    let payload = bincode::serialize(state).map_err(|e| anyhow!("Serialization error: {}", e))?;
    let envelope = Envelope {
        version: FORMAT_VERSION,
        checksum: *blake3::hash(&payload).as_bytes(),
        payload,
    };
    bincode::serialize(&envelope).map_err(|e| anyhow!("Serialization error: {}", e))
}

/// Decodes and validates persisted state. Anything that does not check out
/// is an error; nothing is repaired.
pub fn decode_state(bytes: &[u8], vote_bits: u32) -> Result<GlobalState> {
    let envelope: Envelope =
        bincode::deserialize(bytes).map_err(|e| anyhow!("Deserialization error: {}", e))?;
    if envelope.version != FORMAT_VERSION {
        bail!(
            "unsupported state format version {} (expected {})",
            envelope.version,
            FORMAT_VERSION
        );
    }
    let actual = blake3::hash(&envelope.payload);
    if actual.as_bytes() != &envelope.checksum {
        bail!(
            "state checksum mismatch: stored {}, computed {}",
            hex::encode(envelope.checksum),
            actual.to_hex()
        );
    }
    let state: GlobalState = bincode::deserialize(&envelope.payload)
        .map_err(|e| anyhow!("Deserialization error: {}", e))?;
    state.validate(vote_bits).context("persisted state failed validation")?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_execution::{ExecutionContext, Token};
    use tally_types::{Address, TokenConfig};

    fn populated() -> GlobalState {
        let admin = Address([9; 20]);
        let config = TokenConfig::new("Stored", "STO", Address([3; 20]), admin);
        let mut token = Token::new(config, 1).unwrap();
        let ctx = ExecutionContext::new(5, 100, 1);
        token.mint(&ctx, admin, Address([1; 20]), 800).unwrap();
        token.delegate(&ctx, Address([1; 20]), Address([2; 20])).unwrap();
        token.snapshot(admin).unwrap();
        token.transfer(&ctx.advance(1, 12), Address([1; 20]), Address([4; 20]), 300).unwrap();
        token.export_state()
    }

    #[test]
    fn test_decode_restores_encoded_state() {
        let state = populated();
        let bytes = encode_state(&state).unwrap();
        assert_eq!(decode_state(&bytes, 96).unwrap(), state);
    }

    #[test]
    fn test_flipped_bit_is_rejected() {
        let mut bytes = encode_state(&populated()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let err = decode_state(&bytes, 96).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_inconsistent_state_is_rejected() {
        let mut state = populated();
        state.ledger.total_supply += 1;
        let bytes = encode_state(&state).unwrap();
        assert!(decode_state(&bytes, 96).is_err());
    }

    #[test]
    fn test_narrower_vote_width_is_rejected() {
        let bytes = encode_state(&populated()).unwrap();
        assert!(decode_state(&bytes, 8).is_err());
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let bytes = encode_state(&populated()).unwrap();
        assert!(decode_state(&bytes[..bytes.len() / 2], 96).is_err());
    }
}
