//! Fixed-point helpers over `U256` / `I256`.
//!
//! Amounts, rates and prices stay in 18-decimal integer form for every
//! computation. The `f64` conversions here exist for message text only.

use alloy::primitives::{I256, U256};

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Decimals of the fixed-point representation.
pub const WAD_DECIMALS: u8 = 18;

/// Power of 10 as U256.
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Rescale a value with `decimals` decimals to 18 decimals.
///
/// Returns `None` on overflow. Scaling down truncates.
#[inline(always)]
pub fn scale_to_wad(value: U256, decimals: u8) -> Option<U256> {
    if decimals <= WAD_DECIMALS {
        value.checked_mul(pow10(WAD_DECIMALS - decimals))
    } else {
        Some(value / pow10(decimals - WAD_DECIMALS))
    }
}

/// `a * b / denom` with truncation; `None` on overflow or zero denominator.
#[inline(always)]
pub fn checked_mul_div(a: U256, b: U256, denom: U256) -> Option<U256> {
    if denom.is_zero() {
        return None;
    }
    Some(a.checked_mul(b)? / denom)
}

/// Multiply two WAD values: (a * b) / WAD
#[inline(always)]
pub fn wad_mul(a: U256, b: U256) -> Option<U256> {
    checked_mul_div(a, b, WAD)
}

/// Non-negative `I256` to `U256`; `None` for negative values.
#[inline(always)]
pub fn to_unsigned(value: I256) -> Option<U256> {
    if value.is_negative() {
        None
    } else {
        Some(value.into_raw())
    }
}

/// `U256` to `I256`, saturating at `I256::MAX`.
#[inline(always)]
pub fn to_signed(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}

/// Convert WAD (18 decimals) to f64.
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let whole = wad
            .as_limbs()
            .iter()
            .rev()
            .fold(0.0f64, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64);
        whole / 1e18
    }
}

/// Signed WAD to f64 (display only).
#[inline(always)]
pub fn signed_wad_to_f64(wad: I256) -> f64 {
    let magnitude = wad_to_f64(wad.unsigned_abs());
    if wad.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow10() {
        assert_eq!(pow10(0), U256::from(1u64));
        assert_eq!(pow10(8), U256::from(100_000_000u64));
        assert_eq!(pow10(18), WAD);
    }

    #[test]
    fn test_scale_to_wad() {
        // $2000.00 with 8 decimals
        let answer = U256::from(200_000_000_000u64);
        assert_eq!(scale_to_wad(answer, 8), Some(U256::from(2000u64) * WAD));
        assert_eq!(scale_to_wad(WAD, 18), Some(WAD));
        assert_eq!(scale_to_wad(U256::from(1234u64), 21), Some(U256::from(1u64)));
        assert_eq!(scale_to_wad(U256::MAX, 0), None);
    }

    #[test]
    fn test_checked_mul_div() {
        let a = U256::from(3u64) * WAD;
        let b = U256::from(2u64) * WAD;
        assert_eq!(wad_mul(a, b), Some(U256::from(6u64) * WAD));
        assert_eq!(checked_mul_div(a, WAD, b), Some(WAD + WAD / U256::from(2u64)));
        assert_eq!(checked_mul_div(a, WAD, U256::ZERO), None);
        assert_eq!(wad_mul(U256::MAX, b), None);
    }

    #[test]
    fn test_sign_conversions() {
        let minus_one = I256::try_from(-1i64).unwrap();
        assert_eq!(to_unsigned(minus_one), None);
        assert_eq!(to_unsigned(I256::try_from(5i64).unwrap()), Some(U256::from(5u64)));
        assert_eq!(to_signed(U256::from(7u64)), I256::try_from(7i64).unwrap());
        assert_eq!(to_signed(U256::MAX), I256::MAX);
    }

    #[test]
    fn test_wad_to_f64() {
        let wad = U256::from(1000u64) * WAD;
        assert!((wad_to_f64(wad) - 1000.0).abs() < 0.001);

        let large = U256::from(u128::MAX) * U256::from(4u64);
        let expected = u128::MAX as f64 * 4.0 / 1e18;
        assert!((wad_to_f64(large) / expected - 1.0).abs() < 1e-9);

        let negative = I256::ZERO - I256::try_from(WAD).unwrap();
        assert!((signed_wad_to_f64(negative) + 1.0).abs() < 1e-12);
    }
}
