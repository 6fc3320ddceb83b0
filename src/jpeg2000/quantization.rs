//! Scalar quantization (C4, §4.5): derives per-sub-band step sizes from
//! QCD/QCC's (exponent, mantissa) pairs and applies the reversible 5/3
//! integer shift or the irreversible 9/7 dead-zone scalar quantizer.

use crate::constants::qcd_style;

/// The dynamic range exponent `R_b` for a sub-band: the original
/// component bit depth plus a per-orientation gain (Table E.1), used to
/// derive the step size from (expn, mant) per Annex E.1.
pub fn subband_gain_bits(orientation: crate::jpeg2000::image::SubbandOrientation) -> u32 {
    use crate::jpeg2000::image::SubbandOrientation::*;
    match orientation {
        LL => 0,
        HL | LH => 1,
        HH => 2,
    }
}

/// Converts one QCD/QCC (expn, mant) pair plus the sub-band's dynamic
/// range into a floating-point step size (Annex E.1, eq. E-3):
/// `delta = 2^(R_b - expn) * (1 + mant / 2^11)`.
pub fn step_size_from_expn_mant(expn: u8, mant: u16, dynamic_range_bits: u32) -> f32 {
    let base = 2f32.powi(dynamic_range_bits as i32 - expn as i32);
    base * (1.0 + mant as f32 / 2048.0)
}

/// Derives an expounded QCD step size for sub-band `band_index` (0 = LL)
/// from the LL entry when `style == SCALAR_DERIVED` (Annex E.1, eq. E-5):
/// each additional decomposition level away from LL adds one to the
/// effective exponent.
pub fn derive_expounded_step(ll_expn: u8, ll_mant: u16, levels_from_ll: u8) -> (u8, u16) {
    (ll_expn.saturating_add(levels_from_ll), ll_mant)
}

/// Dead-zone scalar quantization for the irreversible (9/7) path:
/// `q = sign(x) * floor(|x| / delta)`.
pub fn quantize_scalar(coeff: f32, step_size: f32) -> i32 {
    if step_size <= 0.0 {
        return coeff as i32;
    }
    let sign = if coeff >= 0.0 { 1.0 } else { -1.0 };
    (sign * (coeff.abs() / step_size).floor()) as i32
}

/// Reconstructs a dequantized coefficient; `q == 0` decodes to exactly
/// `0.0` (dead zone), otherwise the bin midpoint is used (Annex E.1, eq.
/// E-6, `N_b = 0` truncation-free case).
pub fn dequantize_scalar(q: i32, step_size: f32) -> f32 {
    if q == 0 {
        return 0.0;
    }
    let sign = if q > 0 { 1.0 } else { -1.0 };
    let mag = q.unsigned_abs() as f32;
    (mag + 0.5) * step_size * sign
}

/// Reversible (5/3) path quantization: an implicit identity (step size 1),
/// since the 5/3 wavelet already produces integer coefficients (§4.5) —
/// an optional guard-bit left shift is applied by the caller on encode and
/// reversed on decode, not by this function.
pub fn quantize_reversible(coeff: i32) -> i32 {
    coeff
}

pub fn dequantize_reversible(q: i32) -> i32 {
    q
}

/// Undoes the RGN "max shift" scaling (Annex J.2): the encoder left-shifts
/// every ROI coefficient by `roi_shift` bits so it occupies higher
/// bit-planes than any background coefficient, without transmitting the
/// region's shape. The decoder needs no shape either — any dequantized
/// magnitude that still reaches the shifted range is the ROI, so it is
/// shifted back down; smaller magnitudes are genuine background values and
/// are left alone.
pub fn apply_roi_unshift(value: i32, roi_shift: u8) -> i32 {
    if roi_shift == 0 {
        return value;
    }
    let threshold = 1i32 << roi_shift;
    let mag = value.unsigned_abs() as i32;
    if mag >= threshold {
        let sign = if value < 0 { -1 } else { 1 };
        sign * (mag >> roi_shift)
    } else {
        value
    }
}

/// Returns `true` when `style` calls for explicit per-sub-band step sizes
/// (SCALAR_EXPOUNDED) rather than deriving every non-LL step from LL's.
pub fn is_expounded(style: u8) -> bool {
    style == qcd_style::SCALAR_EXPOUNDED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantization_roundtrip() {
        let val = 10.5;
        let step = 2.0;
        let q = quantize_scalar(val, step);
        assert_eq!(q, 5);

        let recon = dequantize_scalar(q, step);
        assert!((val - recon).abs() <= step);
    }

    #[test]
    fn zero_quantizes_and_dequantizes_to_zero() {
        assert_eq!(quantize_scalar(0.0, 2.0), 0);
        assert_eq!(dequantize_scalar(0, 2.0), 0.0);
    }

    #[test]
    fn derived_step_adds_one_exponent_per_level() {
        let (expn, mant) = derive_expounded_step(4, 100, 2);
        assert_eq!((expn, mant), (6, 100));
    }

    #[test]
    fn reversible_quantization_is_identity() {
        assert_eq!(quantize_reversible(42), 42);
        assert_eq!(dequantize_reversible(42), 42);
    }

    #[test]
    fn roi_unshift_only_touches_values_above_threshold() {
        assert_eq!(apply_roi_unshift(0, 0), 0);
        // Below 2^3: a background value, left untouched.
        assert_eq!(apply_roi_unshift(5, 3), 5);
        // At/above 2^3: an ROI value, shifted back down.
        assert_eq!(apply_roi_unshift(40, 3), 5);
        assert_eq!(apply_roi_unshift(-40, 3), -5);
    }
}
