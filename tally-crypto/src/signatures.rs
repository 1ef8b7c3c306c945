pub use k256::ecdsa::SigningKey;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use rand::rngs::OsRng;
use tally_types::{Address, TokenError};

use crate::{keccak256, Digest32};

/// secp256k1 group order divided by two. Any `s` above this is the
/// malleable twin of a valid low-`s` signature.
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

pub fn generate_keypair() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

pub fn signing_key_from_bytes(secret: &[u8]) -> Result<SigningKey, TokenError> {
    SigningKey::from_slice(secret).map_err(|_| TokenError::InvalidSignature)
}

pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address(out)
}

pub fn signer_address(key: &SigningKey) -> Address {
    address_of(key.verifying_key())
}

/// Signs a prehashed digest, returning the 65-byte `r || s || v` form with
/// `v` in {27, 28} and `s` in the lower half of the order.
pub fn sign_digest(key: &SigningKey, digest: &Digest32) -> Result<Vec<u8>, TokenError> {
    let (mut sig, mut recid) = key
        .sign_prehash_recoverable(digest)
        .map_err(|_| TokenError::InvalidSignature)?;
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recid = RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced());
    }
    let mut out = sig.to_bytes().to_vec();
    out.push(27 + recid.to_byte());
    Ok(out)
}

/// Packs a 65-byte signature into the 64-byte `r || yParity·s` form.
pub fn to_compact(signature: &[u8]) -> Result<[u8; 64], TokenError> {
    if signature.len() != 65 {
        return Err(TokenError::InvalidSignatureLength(signature.len()));
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&signature[..64]);
    if signature[64] == 28 {
        out[32] |= 0x80;
    }
    Ok(out)
}

fn split(signature: &[u8]) -> Result<([u8; 32], [u8; 32], u8), TokenError> {
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    match signature.len() {
        65 => {
            r.copy_from_slice(&signature[..32]);
            s.copy_from_slice(&signature[32..64]);
            Ok((r, s, signature[64]))
        }
        64 => {
            r.copy_from_slice(&signature[..32]);
            s.copy_from_slice(&signature[32..]);
            let v = 27 + (s[0] >> 7);
            s[0] &= 0x7f;
            Ok((r, s, v))
        }
        other => Err(TokenError::InvalidSignatureLength(other)),
    }
}

/// Recovers the principal that signed `digest`.
pub fn recover_signer(digest: &Digest32, signature: &[u8]) -> Result<Address, TokenError> {
    let (r, s, v) = split(signature)?;
    if s > HALF_ORDER {
        return Err(TokenError::InvalidSignatureS);
    }
    if v != 27 && v != 28 {
        return Err(TokenError::InvalidSignatureV(v));
    }

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&r);
    rs[32..].copy_from_slice(&s);
    let sig = Signature::from_slice(&rs).map_err(|_| TokenError::InvalidSignature)?;
    let recid = RecoveryId::from_byte(v - 27).ok_or(TokenError::InvalidSignature)?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recid)
        .map_err(|_| TokenError::InvalidSignature)?;

    let signer = address_of(&key);
    if signer.is_zero() {
        return Err(TokenError::InvalidSignature);
    }
    Ok(signer)
}
