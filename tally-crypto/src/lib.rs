pub mod signatures;
pub mod typed_data;

pub use signatures::{
    address_of, generate_keypair, recover_signer, sign_digest, signer_address, to_compact, SigningKey,
};
pub use typed_data::SignatureAuthority;

use sha3::{Digest, Keccak256};

pub type Digest32 = [u8; 32];

pub fn keccak256(data: &[u8]) -> Digest32 {
    Keccak256::digest(data).into()
}

/// Big-endian 32-byte word for an unsigned integer field.
pub fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}
