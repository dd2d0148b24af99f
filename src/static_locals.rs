//! The always-visible bindings every hint sees, as free functions parameterized by [`PRIME`]
//! rather than a process-wide dictionary (see the crate's design notes on global state).

use num_bigint::BigUint;
use num_traits::Zero;
use starknet_types_core::felt::Felt;

/// The prime defining the finite field the VM operates over.
///
/// The Starknet field prime: `2^251 + 17 * 2^192 + 1`. Unlike the reference implementation, this
/// crate does not generalize over the field; a program whose declared prime does not match this
/// constant is rejected at load time with [`crate::error::Error::PrimeMismatch`].
pub const PRIME: Felt = Felt::from_hex_unchecked(
    "0x800000000000011000000000000000000000000000000000000000000001",
);

/// Field addition, `a + b mod PRIME`.
pub fn fadd(a: &Felt, b: &Felt) -> Felt {
    a + b
}

/// Field subtraction, `a - b mod PRIME`.
pub fn fsub(a: &Felt, b: &Felt) -> Felt {
    a - b
}

/// Field multiplication, `a * b mod PRIME`.
pub fn fmul(a: &Felt, b: &Felt) -> Felt {
    a * b
}

/// Field division, `a / b mod PRIME`, via `b`'s modular inverse. Returns `None` if `b` is zero.
pub fn fdiv(a: &Felt, b: &Felt) -> Option<Felt> {
    if *b == Felt::ZERO {
        None
    } else {
        Some(a.field_div(&b.try_into().ok()?))
    }
}

/// Field exponentiation, `base^exponent mod PRIME`, computed by repeated squaring.
pub fn fpow(base: &Felt, exponent: u128) -> Felt {
    let mut result = Felt::ONE;
    let mut base = *base;
    let mut exponent = exponent;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result * base;
        }
        base = base * base;
        exponent >>= 1;
    }
    result
}

/// Returns whether `value` is a quadratic residue modulo [`PRIME`], i.e. whether [`fsqrt`] would
/// succeed.
pub fn fis_quad_residue(value: &Felt) -> bool {
    fsqrt(value).is_some()
}

/// Computes a modular square root of `value`, if one exists.
pub fn fsqrt(value: &Felt) -> Option<Felt> {
    value.sqrt()
}

/// Divides `a` by `b` as ordinary (non-modular) integers, requiring the division to be exact.
///
/// Unlike [`fdiv`], this is not field division: `a` and `b` are taken at their canonical integer
/// representatives in `[0, PRIME)`, and the division must have zero remainder, matching the
/// reference implementation's `safe_div` (`assert x % y == 0; return x // y`), used by hints to
/// recover a genuine integer quotient (e.g. when sizing a builtin segment) rather than a field
/// inverse. Returns `None` if `b` is zero or the division is not exact.
pub fn safe_div(a: &Felt, b: &Felt) -> Option<Felt> {
    let a_int = BigUint::from_bytes_be(&a.to_bytes_be());
    let b_int = BigUint::from_bytes_be(&b.to_bytes_be());
    if b_int.is_zero() {
        return None;
    }

    let quotient = &a_int / &b_int;
    let remainder = &a_int % &b_int;
    if !remainder.is_zero() {
        return None;
    }

    let digits = quotient.to_bytes_be();
    let mut bytes = [0u8; 32];
    bytes[32 - digits.len()..].copy_from_slice(&digits);
    Some(Felt::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fadd_fsub_are_inverses() {
        let a = Felt::from(7);
        let b = Felt::from(3);
        assert_eq!(fsub(&fadd(&a, &b), &b), a);
    }

    #[test]
    fn fdiv_by_zero_is_none() {
        assert_eq!(fdiv(&Felt::from(1), &Felt::ZERO), None);
    }

    #[test]
    fn fpow_matches_repeated_multiplication() {
        let base = Felt::from(3);
        assert_eq!(fpow(&base, 4), base * base * base * base);
    }

    #[test]
    fn safe_div_recovers_exact_quotient() {
        let quotient = Felt::from(6);
        let divisor = Felt::from(3);
        let dividend = quotient * divisor;
        assert_eq!(safe_div(&dividend, &divisor), Some(quotient));
    }

    #[test]
    fn safe_div_rejects_inexact_division() {
        // 7 is not evenly divisible by 3: a field division would still happily return the
        // modular inverse product, which is exactly what safe_div must not do.
        assert_eq!(safe_div(&Felt::from(7), &Felt::from(3)), None);
    }

    #[test]
    fn safe_div_rejects_zero_divisor() {
        assert_eq!(safe_div(&Felt::from(7), &Felt::ZERO), None);
    }
}
