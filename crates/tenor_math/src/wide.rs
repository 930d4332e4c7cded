//! 512-bit intermediates
//!
//! Axes are bounded by 112 bits, so x·y·z needs up to 336 bits and the
//! neutral-point solve multiplies that by another axis. Every helper here
//! is checked; a result that does not fit its target type is `RangeOverflow`.

use crate::{CurveError, Result};

// Expanded apart from the crate's `Result` alias, which the macro body
// would otherwise pick up.
mod repr {
    uint::construct_uint! {
        /// Unsigned 512-bit integer for products and cross-multiplication.
        pub struct U512(8);
    }
}

pub use repr::U512;

#[inline]
pub fn wide(v: u128) -> U512 {
    U512::from(v)
}

/// Convert back to u128, failing instead of truncating
#[inline]
pub fn narrow(v: U512) -> Result<u128> {
    if v > U512::from(u128::MAX) {
        Err(CurveError::RangeOverflow)
    } else {
        Ok(v.as_u128())
    }
}

#[inline]
pub fn mul(a: U512, b: U512) -> Result<U512> {
    a.checked_mul(b).ok_or(CurveError::RangeOverflow)
}

#[inline]
pub fn add(a: U512, b: U512) -> Result<U512> {
    a.checked_add(b).ok_or(CurveError::RangeOverflow)
}

/// Floor division
#[inline]
pub fn div_down(n: U512, d: U512) -> Result<U512> {
    if d.is_zero() {
        return Err(CurveError::RangeOverflow);
    }
    Ok(n / d)
}

/// Ceiling division
#[inline]
pub fn div_up(n: U512, d: U512) -> Result<U512> {
    if d.is_zero() {
        return Err(CurveError::RangeOverflow);
    }
    let q = n / d;
    if (q * d) == n {
        Ok(q)
    } else {
        add(q, U512::one())
    }
}

/// floor(a * b / d)
pub fn mul_div_down(a: u128, b: u128, d: u128) -> Result<u128> {
    narrow(div_down(mul(wide(a), wide(b))?, wide(d))?)
}

/// ceil(a * b / d)
pub fn mul_div_up(a: u128, b: u128, d: u128) -> Result<u128> {
    narrow(div_up(mul(wide(a), wide(b))?, wide(d))?)
}

/// floor(v * duration / 2^shift)
pub fn scale_down(v: u128, duration: u64, shift: u32) -> Result<u128> {
    let n = mul(wide(v), U512::from(duration))?;
    narrow(n >> shift as usize)
}

/// ceil(v * duration / 2^shift)
pub fn scale_up(v: u128, duration: u64, shift: u32) -> Result<u128> {
    let n = mul(wide(v), U512::from(duration))?;
    let q = n >> shift as usize;
    if (q << shift as usize) == n {
        narrow(q)
    } else {
        narrow(add(q, U512::one())?)
    }
}

/// x·y·z, exact (three u128 factors fit in 384 bits)
#[inline]
pub fn product3(x: u128, y: u128, z: u128) -> U512 {
    wide(x) * wide(y) * wide(z)
}

/// Largest r with r² <= v (Newton iteration)
pub fn isqrt(v: U512) -> U512 {
    if v.is_zero() {
        return U512::zero();
    }
    let mut x0 = v;
    let mut x1 = (v >> 1) + U512::one();
    while x1 < x0 {
        x0 = x1;
        x1 = (x1 + v / x1) >> 1;
    }
    x0
}

/// Smallest r with r² >= v
pub fn sqrt_up(v: U512) -> Result<U512> {
    let r = isqrt(v);
    if r * r == v {
        Ok(r)
    } else {
        add(r, U512::one())
    }
}
