use tally_types::Address;

/// Decides whether a caller may use privileged entry points (mint, snapshot).
pub trait AccessPolicy {
    fn is_authorized(&self, caller: &Address) -> bool;
}

/// Single administrator. A zero administrator authorizes nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Administrator(pub Address);

impl AccessPolicy for Administrator {
    fn is_authorized(&self, caller: &Address) -> bool {
        !self.0.is_zero() && *caller == self.0
    }
}
