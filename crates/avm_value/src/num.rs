//! 256-bit arithmetic helpers.
//!
//! Machine integers are unsigned 256-bit words; the signed opcodes
//! (`SDIV`, `SMOD`, `SLT`, `SGT`, `SIGNEXTEND`) reinterpret them as
//! two's-complement and map results back to unsigned. Division by zero
//! is rejected by the interpreter before these helpers run.

use ethereum_types::{U256, U512};

/// Two's-complement sign bit.
pub fn is_neg(x: U256) -> bool {
    x.bit(255)
}

/// Wrapping two's-complement negation.
pub fn neg(x: U256) -> U256 {
    (!x).overflowing_add(U256::one()).0
}

fn magnitude(x: U256) -> U256 {
    if is_neg(x) {
        neg(x)
    } else {
        x
    }
}

/// Signed division. `b` must be nonzero. `i256::MIN / -1` wraps to
/// `i256::MIN`, matching two's-complement overflow.
pub fn sdiv(a: U256, b: U256) -> U256 {
    let q = magnitude(a) / magnitude(b);
    if is_neg(a) != is_neg(b) {
        neg(q)
    } else {
        q
    }
}

/// Signed modulus. The result takes the sign of the dividend.
pub fn smod(a: U256, b: U256) -> U256 {
    let r = magnitude(a) % magnitude(b);
    if !r.is_zero() && is_neg(a) {
        neg(r)
    } else {
        r
    }
}

pub fn slt(a: U256, b: U256) -> bool {
    match (is_neg(a), is_neg(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

pub fn sgt(a: U256, b: U256) -> bool {
    slt(b, a)
}

/// Extend the signed value held in the low `k + 1` bytes of `x` to the
/// full 256-bit width. `k >= 31` leaves `x` unchanged.
pub fn sign_extend(x: U256, k: U256) -> U256 {
    if k >= U256::from(31u8) {
        return x;
    }
    let bit = k.low_u64() as usize * 8 + 7;
    let mask = (U256::one() << (bit + 1)) - U256::one();
    if x.bit(bit) {
        x | !mask
    } else {
        x & mask
    }
}

/// Byte `n` of the big-endian encoding of `x` (0 = most significant),
/// zero for `n >= 32`.
pub fn byte_of(x: U256, n: U256) -> U256 {
    if n >= U256::from(32u8) {
        return U256::zero();
    }
    U256::from(x.byte(31 - n.low_u64() as usize))
}

/// `(a + b) % n` with the intermediate sum held at full precision.
/// `n` must be nonzero.
pub fn add_mod(a: U256, b: U256, n: U256) -> U256 {
    u512_low((U512::from(a) + U512::from(b)) % U512::from(n))
}

/// `(a * b) % n` with the intermediate product held at full precision.
/// `n` must be nonzero.
pub fn mul_mod(a: U256, b: U256, n: U256) -> U256 {
    u512_low(a.full_mul(b) % U512::from(n))
}

fn u512_low(x: U512) -> U256 {
    U256([x.0[0], x.0[1], x.0[2], x.0[3]])
}
