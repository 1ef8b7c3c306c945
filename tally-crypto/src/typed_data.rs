//! Domain-separated hashing of structured messages.
//!
//! A digest is `keccak256(0x19 0x01 || domain_separator || struct_hash)`. The
//! domain separator binds the token's name, version, chain identity and
//! verifying contract so a signature for one deployment cannot be replayed
//! against another.

use tally_types::{Address, Amount, Nonce, TokenError};
use tracing::debug;

use crate::signatures::recover_signer;
use crate::{keccak256, uint_word, Digest32};

pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
pub const PERMIT_TYPE: &str =
    "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";
pub const DELEGATION_TYPE: &str = "Delegation(address delegatee,uint256 nonce,uint256 expiry)";

fn hash_words(words: &[[u8; 32]]) -> Digest32 {
    let mut buf = Vec::with_capacity(words.len() * 32);
    for word in words {
        buf.extend_from_slice(word);
    }
    keccak256(&buf)
}

pub fn permit_struct_hash(
    owner: &Address,
    spender: &Address,
    value: Amount,
    nonce: Nonce,
    deadline: u64,
) -> Digest32 {
    hash_words(&[
        keccak256(PERMIT_TYPE.as_bytes()),
        owner.to_word(),
        spender.to_word(),
        uint_word(value),
        uint_word(nonce.into()),
        uint_word(deadline.into()),
    ])
}

pub fn delegation_struct_hash(delegatee: &Address, nonce: Nonce, expiry: u64) -> Digest32 {
    hash_words(&[
        keccak256(DELEGATION_TYPE.as_bytes()),
        delegatee.to_word(),
        uint_word(nonce.into()),
        uint_word(expiry.into()),
    ])
}

/// Builds typed-data digests for one token deployment and recovers their
/// signers.
#[derive(Debug, Clone)]
pub struct SignatureAuthority {
    hashed_name: Digest32,
    hashed_version: Digest32,
    type_hash: Digest32,
    verifying_contract: Address,
    cached_chain_id: u64,
    cached_separator: Digest32,
}

impl SignatureAuthority {
    pub fn new(name: &str, version: &str, verifying_contract: Address, chain_id: u64) -> Self {
        let hashed_name = keccak256(name.as_bytes());
        let hashed_version = keccak256(version.as_bytes());
        let type_hash = keccak256(DOMAIN_TYPE.as_bytes());
        let cached_separator = build_separator(
            &type_hash,
            &hashed_name,
            &hashed_version,
            chain_id,
            &verifying_contract,
        );
        Self {
            hashed_name,
            hashed_version,
            type_hash,
            verifying_contract,
            cached_chain_id: chain_id,
            cached_separator,
        }
    }

    pub fn cached_chain_id(&self) -> u64 {
        self.cached_chain_id
    }

    /// Domain separator for the live chain identity. Served from the cache
    /// unless the chain identity has changed since construction.
    pub fn domain_separator(&self, chain_id: u64) -> Digest32 {
        if chain_id == self.cached_chain_id {
            return self.cached_separator;
        }
        debug!(
            cached = self.cached_chain_id,
            live = chain_id,
            "chain identity changed, rebuilding domain separator"
        );
        build_separator(
            &self.type_hash,
            &self.hashed_name,
            &self.hashed_version,
            chain_id,
            &self.verifying_contract,
        )
    }

    pub fn build_digest(&self, chain_id: u64, struct_hash: &Digest32) -> Digest32 {
        let mut buf = [0u8; 66];
        buf[0] = 0x19;
        buf[1] = 0x01;
        buf[2..34].copy_from_slice(&self.domain_separator(chain_id));
        buf[34..].copy_from_slice(struct_hash);
        keccak256(&buf)
    }

    pub fn recover_signer(&self, digest: &Digest32, signature: &[u8]) -> Result<Address, TokenError> {
        recover_signer(digest, signature)
    }
}

fn build_separator(
    type_hash: &Digest32,
    hashed_name: &Digest32,
    hashed_version: &Digest32,
    chain_id: u64,
    verifying_contract: &Address,
) -> Digest32 {
    hash_words(&[
        *type_hash,
        *hashed_name,
        *hashed_version,
        uint_word(chain_id.into()),
        verifying_contract.to_word(),
    ])
}
