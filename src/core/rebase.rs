//! Converts provider-native rates into rates relative to a chosen base

use crate::core::error::RebaseError;
use crate::core::rates::{RateMap, RebasedRates};

/// Divides every rate by the rate of `base`.
///
/// `rates` holds units of each currency per one unit of the provider's
/// native base. The result holds units per one unit of `base`, so
/// `result[base]` is always 1.0. Fails if `base` is not in `rates` or its
/// rate is not a positive finite number.
pub fn rebase(rates: &RateMap, base: &str) -> Result<RebasedRates, RebaseError> {
    let base_rate = *rates
        .get(base)
        .ok_or_else(|| RebaseError::MissingBase(base.to_string()))?;
    if base_rate <= 0.0 || !base_rate.is_finite() {
        return Err(RebaseError::InvalidBaseRate {
            currency: base.to_string(),
            rate: base_rate,
        });
    }

    Ok(rates
        .iter()
        .map(|(currency, rate)| (currency.clone(), rate / base_rate))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(pairs: &[(&str, f64)]) -> RateMap {
        pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect()
    }

    #[test]
    fn test_rebase_to_native_base_is_unchanged() {
        let original = rates(&[("EUR", 1.0), ("USD", 1.1), ("CAD", 1.5)]);
        let rebased = rebase(&original, "EUR").unwrap();
        assert_eq!(rebased, original);
    }

    #[test]
    fn test_rebase_to_other_base() {
        let original = rates(&[("EUR", 1.0), ("USD", 1.1), ("CAD", 1.5)]);
        let rebased = rebase(&original, "USD").unwrap();

        assert_eq!(rebased.len(), 3);
        assert!((rebased["EUR"] - 0.909_090_909).abs() < 1e-6);
        assert!((rebased["USD"] - 1.0).abs() < f64::EPSILON);
        assert!((rebased["CAD"] - 1.363_636_363).abs() < 1e-6);
    }

    #[test]
    fn test_rebase_keeps_base_entry_at_one() {
        let original = rates(&[("EUR", 1.0), ("JPY", 157.3), ("GBP", 0.86)]);
        for base in ["EUR", "JPY", "GBP"] {
            let rebased = rebase(&original, base).unwrap();
            assert!((rebased[base] - 1.0).abs() < f64::EPSILON, "base {base}");
        }
    }

    #[test]
    fn test_rebase_is_idempotent() {
        let original = rates(&[("EUR", 1.0), ("USD", 1.0832), ("CAD", 1.4721)]);
        let once = rebase(&original, "CAD").unwrap();
        let twice = rebase(&once, "CAD").unwrap();

        assert_eq!(once.keys().collect::<Vec<_>>(), twice.keys().collect::<Vec<_>>());
        for (currency, value) in &once {
            assert!((value - twice[currency]).abs() < 1e-12, "{currency}");
        }
    }

    #[test]
    fn test_rebase_fails_only_when_base_missing() {
        let original = rates(&[("EUR", 1.0), ("USD", 1.1)]);
        assert_eq!(
            rebase(&original, "CAD"),
            Err(RebaseError::MissingBase("CAD".to_string()))
        );
        assert!(rebase(&original, "USD").is_ok());
        assert!(rebase(&RateMap::new(), "USD").is_err());
    }

    #[test]
    fn test_rebase_rejects_unusable_base_rate() {
        for bad in [0.0, -1.1, f64::INFINITY] {
            let original = rates(&[("EUR", 1.0), ("USD", bad)]);
            assert_eq!(
                rebase(&original, "USD"),
                Err(RebaseError::InvalidBaseRate {
                    currency: "USD".to_string(),
                    rate: bad,
                })
            );
        }
        let original = rates(&[("EUR", 1.0), ("USD", f64::NAN)]);
        assert!(matches!(
            rebase(&original, "USD"),
            Err(RebaseError::InvalidBaseRate { .. })
        ));
    }

    #[test]
    fn test_rebase_keys_are_subset_of_input() {
        let original = rates(&[("AUD", 1.62), ("EUR", 1.0), ("NZD", 1.77)]);
        let rebased = rebase(&original, "AUD").unwrap();
        assert!(rebased.keys().all(|k| original.contains_key(k)));
    }
}
