//! Percentage <-> fraction conversion for rate fields.
//!
//! Rates (ctr, conversion rate, connect rate) are stored as percentages in
//! the 0-100 range and handled as fractions in the 0-1 range while deriving
//! metrics.

/// Convert a percentage (e.g. `2.5`) to a fraction (`0.025`).
pub fn to_fraction(pct: f64) -> f64 {
    pct / 100.0
}

/// Convert a fraction (e.g. `0.025`) to a percentage (`2.5`).
pub fn to_percent(frac: f64) -> f64 {
    frac * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_to_fraction() {
        assert_eq!(to_fraction(50.0), 0.5);
        assert_eq!(to_fraction(0.0), 0.0);
        assert_eq!(to_fraction(100.0), 1.0);
    }

    #[test]
    fn fraction_to_percent() {
        assert_eq!(to_percent(0.5), 50.0);
        assert_eq!(to_percent(1.0), 100.0);
    }

    #[test]
    fn conversions_are_inverse_within_tolerance() {
        for pct in [0.8, 2.0, 7.0, 33.3, 99.9] {
            assert!((to_percent(to_fraction(pct)) - pct).abs() < 1e-9);
        }
    }
}
