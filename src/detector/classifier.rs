use crate::config::THRESHOLD_TOLERANCE_PCT;
use crate::types::{is_valid_price, Direction, ExclusionReason};

/// How one key present on both dates is treated by the comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairClass {
    /// Percentage change is undefined for this pair.
    Excluded(ExclusionReason),
    /// Moved less than the threshold (or not at all).
    Below { change_pct: f64 },
    Alert { change_pct: f64, direction: Direction },
}

/// Signed percentage change from `previous` to `current`.
/// None when either side is not a usable quote.
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if !is_valid_price(previous) || !is_valid_price(current) {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

/// Classify a matched pair against `threshold_pct`.
pub fn classify(previous: f64, current: f64, threshold_pct: f64) -> PairClass {
    if !is_valid_price(previous) {
        return PairClass::Excluded(ExclusionReason::InvalidBaselinePrice);
    }
    let Some(change_pct) = percent_change(previous, current) else {
        return PairClass::Excluded(ExclusionReason::InvalidCurrentPrice);
    };

    if change_pct == 0.0 || change_pct.abs() + THRESHOLD_TOLERANCE_PCT < threshold_pct {
        return PairClass::Below { change_pct };
    }

    let direction = if change_pct > 0.0 {
        Direction::Drift
    } else {
        Direction::Shorten
    };
    PairClass::Alert {
        change_pct,
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengthening_price_is_a_drift() {
        match classify(2.0, 2.5, 10.0) {
            PairClass::Alert { change_pct, direction } => {
                assert!((change_pct - 25.0).abs() < 1e-9);
                assert_eq!(direction, Direction::Drift);
            }
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[test]
    fn shortening_price_is_negative() {
        match classify(4.0, 3.0, 10.0) {
            PairClass::Alert { change_pct, direction } => {
                assert!((change_pct + 25.0).abs() < 1e-9);
                assert_eq!(direction, Direction::Shorten);
            }
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[test]
    fn small_move_stays_below() {
        assert!(matches!(classify(2.0, 2.1, 10.0), PairClass::Below { .. }));
    }

    #[test]
    fn exact_threshold_qualifies_despite_float_error() {
        // (1.8 - 2.0) / 2.0 * 100 is slightly off -10.0 in binary floating point.
        assert!(matches!(
            classify(2.0, 1.8, 10.0),
            PairClass::Alert { direction: Direction::Shorten, .. }
        ));
    }

    #[test]
    fn zero_threshold_still_ignores_unchanged_prices() {
        assert!(matches!(classify(3.0, 3.0, 0.0), PairClass::Below { change_pct } if change_pct == 0.0));
        assert!(matches!(classify(3.0, 3.3, 0.0), PairClass::Alert { .. }));
    }

    #[test]
    fn unusable_prices_are_excluded() {
        assert_eq!(
            classify(0.0, 2.0, 10.0),
            PairClass::Excluded(ExclusionReason::InvalidBaselinePrice)
        );
        assert_eq!(
            classify(1.0, 2.0, 10.0),
            PairClass::Excluded(ExclusionReason::InvalidBaselinePrice)
        );
        assert_eq!(
            classify(2.0, f64::NAN, 10.0),
            PairClass::Excluded(ExclusionReason::InvalidCurrentPrice)
        );
        assert_eq!(
            classify(2.0, 1.0, 10.0),
            PairClass::Excluded(ExclusionReason::InvalidCurrentPrice)
        );
        assert_eq!(percent_change(f64::INFINITY, 2.0), None);
    }
}
