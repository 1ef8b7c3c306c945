//! Checked integer helpers. Nothing here wraps: narrowing and subtraction
//! report overflow or underflow instead.

use tally_types::{config::max_for_bits, Amount, TokenError};

pub fn to_u32(value: u64) -> Result<u32, TokenError> {
    u32::try_from(value).map_err(|_| TokenError::ArithmeticOverflow)
}

/// Rejects `value` unless it fits in an unsigned integer of `bits` width.
pub fn fit_bits(value: Amount, bits: u32) -> Result<Amount, TokenError> {
    if value > max_for_bits(bits) {
        return Err(TokenError::ArithmeticOverflow);
    }
    Ok(value)
}

pub fn add(a: Amount, b: Amount) -> Result<Amount, TokenError> {
    a.checked_add(b).ok_or(TokenError::ArithmeticOverflow)
}

pub fn sub(a: Amount, b: Amount) -> Result<Amount, TokenError> {
    a.checked_sub(b).ok_or(TokenError::ArithmeticUnderflow)
}

pub fn min<T: Ord>(a: T, b: T) -> T {
    std::cmp::min(a, b)
}

pub fn max<T: Ord>(a: T, b: T) -> T {
    std::cmp::max(a, b)
}

/// Mean of two values rounded towards zero, without overflowing.
pub fn average(a: u64, b: u64) -> u64 {
    (a & b) + ((a ^ b) >> 1)
}

/// Division rounding up. Division by zero is reported as overflow.
pub fn ceil_div(a: u128, b: u128) -> Result<u128, TokenError> {
    if b == 0 {
        return Err(TokenError::ArithmeticOverflow);
    }
    if a == 0 {
        Ok(0)
    } else {
        Ok((a - 1) / b + 1)
    }
}

/// Floor of the square root.
pub fn sqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Newton iteration from an upper bound; converges monotonically down.
    let mut x = 1u64 << ((64 - n.leading_zeros()).div_ceil(2));
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}
