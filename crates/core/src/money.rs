//! Amount helpers.
//!
//! Amounts are stored as `f64` in the currency's major unit, matching the
//! numeric columns of the record store. Comparisons go through [`approx_eq`].

/// Tolerance used when comparing derived totals with persisted ones.
pub const AMOUNT_EPSILON: f64 = 1e-6;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= AMOUNT_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Round to two decimal places for display fields.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_eq_scales_with_magnitude() {
        assert!(approx_eq(0.1 + 0.2, 0.3));
        assert!(approx_eq(1_000_000.000_000_1, 1_000_000.0));
        assert!(!approx_eq(10.0, 10.01));
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_currency(10.005_1), 10.01);
        assert_eq!(round_currency(83.099_999), 83.1);
    }
}
