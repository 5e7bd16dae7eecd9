//! Tolerance-band bucketing
//!
//! A band is the half-open interval `[k*w, (k+1)*w)`; values are replaced by
//! the lower edge of their band.

use rust_decimal::Decimal;

/// Guards against `0.95 * 100.0` landing just under an edge
const FLOAT_EDGE_SLACK: f64 = 1e-9;

/// Floor a decimal to the lower edge of its band. A non-positive width
/// disables bucketing.
pub fn bucket_decimal(value: Decimal, width: Decimal) -> Decimal {
    if width <= Decimal::ZERO {
        return value.normalize();
    }
    ((value / width).floor() * width).normalize()
}

/// Bucket a probability in `[0, 1]` to a band expressed in percentage points.
/// Returns `None` for non-finite input.
pub fn bucket_probability_pp(probability: f64, band_pp: f64) -> Option<f64> {
    if !probability.is_finite() {
        return None;
    }
    let pp = probability.clamp(0.0, 1.0) * 100.0;
    if band_pp <= 0.0 {
        return Some(pp);
    }
    Some((pp / band_pp + FLOAT_EDGE_SLACK).floor() * band_pp)
}
