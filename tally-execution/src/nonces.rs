use tally_types::state::NonceState;
use tally_types::{Address, Nonce, TokenError};

/// Per-principal counters for signed messages. Counters only move forward.
#[derive(Debug, Clone, Default)]
pub struct ReplayGuard {
    state: NonceState,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: NonceState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &NonceState {
        &self.state
    }

    pub fn current(&self, principal: &Address) -> Nonce {
        self.state.nonces.get(principal).copied().unwrap_or(0)
    }

    /// Succeeds iff `provided` is the next unused nonce of `principal`.
    /// Does not consume it.
    pub fn verify(&self, principal: &Address, provided: Nonce) -> Result<(), TokenError> {
        let expected = self.current(principal);
        if provided != expected {
            return Err(TokenError::InvalidNonce {
                owner: *principal,
                expected,
                provided,
            });
        }
        if expected == Nonce::MAX {
            return Err(TokenError::ArithmeticOverflow);
        }
        Ok(())
    }

    /// Returns the current nonce and advances the counter.
    pub fn consume(&mut self, principal: &Address) -> Result<Nonce, TokenError> {
        let slot = self.state.nonces.entry(*principal).or_insert(0);
        let used = *slot;
        *slot = used.checked_add(1).ok_or(TokenError::ArithmeticOverflow)?;
        Ok(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_returns_pre_increment_value() {
        let mut guard = ReplayGuard::new();
        let who = Address([1; 20]);
        assert_eq!(guard.current(&who), 0);
        assert_eq!(guard.consume(&who), Ok(0));
        assert_eq!(guard.consume(&who), Ok(1));
        assert_eq!(guard.current(&who), 2);
    }

    #[test]
    fn stale_nonce_is_rejected_without_side_effects() {
        let mut guard = ReplayGuard::new();
        let who = Address([2; 20]);
        guard.verify(&who, 0).unwrap();
        guard.consume(&who).unwrap();
        let err = guard.verify(&who, 0).unwrap_err();
        assert_eq!(
            err,
            TokenError::InvalidNonce {
                owner: who,
                expected: 1,
                provided: 0
            }
        );
        assert_eq!(guard.current(&who), 1);
    }

    #[test]
    fn principals_are_independent() {
        let mut guard = ReplayGuard::new();
        guard.consume(&Address([3; 20])).unwrap();
        assert_eq!(guard.current(&Address([4; 20])), 0);
    }
}
