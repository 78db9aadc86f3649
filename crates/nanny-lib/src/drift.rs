//! Drift detection between applied and estimated resources
//!
//! A resource is only rewritten when the applied value is outside the tolerance band of
//! both the expected and the acceptable estimate. Values sitting inside the hysteresis band
//! (between expected and acceptable) never trigger a resize.

use crate::models::{resource_names, RequirementField, ResourceList, ResourceRequirements};
use crate::quantity::Quantity;
use rust_decimal::Decimal;
use serde::Serialize;

/// First resource found out of band, with the values that were compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub resource: &'static str,
    pub field: RequirementField,
    pub actual: Option<Quantity>,
    pub expected: Option<Quantity>,
    pub acceptable: Option<Quantity>,
}

impl std::fmt::Display for Drift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: actual {}, expected {}, acceptable {}",
            self.resource,
            self.field,
            display_opt(&self.actual),
            display_opt(&self.expected),
            display_opt(&self.acceptable)
        )
    }
}

fn display_opt(quantity: &Option<Quantity>) -> String {
    quantity
        .map(|q| q.to_string())
        .unwrap_or_else(|| "<unset>".to_string())
}

/// Whether `actual` is outside `threshold` percent of `reference`
///
/// The ratio `actual / reference` is rounded down to two decimals before comparing with
/// `[(100 - threshold) / 100, (100 + threshold) / 100]`. A resource present on one side only
/// is out of band; a resource absent on both sides is not.
pub fn is_out_of_band(threshold: u32, actual: Option<&Quantity>, reference: Option<&Quantity>) -> bool {
    match (actual, reference) {
        (None, None) => false,
        (Some(_), None) | (None, Some(_)) => true,
        (Some(actual), Some(reference)) => ratio_out_of_band(threshold, actual, reference),
    }
}

fn ratio_out_of_band(threshold: u32, actual: &Quantity, reference: &Quantity) -> bool {
    if reference.is_zero() {
        return !actual.is_zero();
    }

    let threshold = i64::from(threshold);
    let lower = 100 - threshold;
    let upper = 100 + threshold;

    // floor(100a/r) < lower  <=>  100a < lower*r
    // floor(100a/r) > upper  <=>  100a >= (upper+1)*r
    let scaled = actual.amount().checked_mul(Decimal::ONE_HUNDRED);
    let below = Decimal::from(lower).checked_mul(reference.amount());
    let above = Decimal::from(upper + 1).checked_mul(reference.amount());

    match (scaled, below, above) {
        (Some(scaled), Some(below), Some(above)) => {
            (lower > 0 && scaled < below) || scaled >= above
        }
        _ => match actual.ratio(reference) {
            Some(ratio) => {
                ratio < Decimal::new(lower, 2) || ratio > Decimal::new(upper, 2)
            }
            None => true,
        },
    }
}

/// Whether `actual` lies between `expected` and `acceptable`, inclusive
fn within_hysteresis(actual: &Quantity, expected: &Quantity, acceptable: &Quantity) -> bool {
    let (low, high) = if expected <= acceptable {
        (expected, acceptable)
    } else {
        (acceptable, expected)
    };
    actual >= low && actual <= high
}

fn dimension_drifted(
    threshold: u32,
    actual: Option<&Quantity>,
    expected: Option<&Quantity>,
    acceptable: Option<&Quantity>,
) -> bool {
    if let (Some(a), Some(e), Some(acc)) = (actual, expected, acceptable) {
        if within_hysteresis(a, e, acc) {
            return false;
        }
    }
    is_out_of_band(threshold, actual, expected) && is_out_of_band(threshold, actual, acceptable)
}

/// Comparison of one resource field against the estimate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionCheck {
    pub resource: &'static str,
    pub field: RequirementField,
    pub actual: Option<Quantity>,
    pub expected: Option<Quantity>,
    pub acceptable: Option<Quantity>,
    pub drifted: bool,
}

impl From<DimensionCheck> for Drift {
    fn from(check: DimensionCheck) -> Self {
        Self {
            resource: check.resource,
            field: check.field,
            actual: check.actual,
            expected: check.expected,
            acceptable: check.acceptable,
        }
    }
}

/// cpu, memory, storage in order, requests before limits
fn dimensions<'a>(
    threshold: u32,
    actual: &'a ResourceRequirements,
    expected: &'a ResourceRequirements,
    acceptable: &'a ResourceRequirements,
) -> impl Iterator<Item = DimensionCheck> + 'a {
    resource_names::CANONICAL.into_iter().flat_map(move |resource| {
        RequirementField::ALL.into_iter().map(move |field| {
            let lookup = |list: &ResourceList| list.get(resource).copied();
            let actual_value = lookup(actual.list(field));
            let expected_value = lookup(expected.list(field));
            let acceptable_value = lookup(acceptable.list(field));

            DimensionCheck {
                resource,
                field,
                drifted: dimension_drifted(
                    threshold,
                    actual_value.as_ref(),
                    expected_value.as_ref(),
                    acceptable_value.as_ref(),
                ),
                actual: actual_value,
                expected: expected_value,
                acceptable: acceptable_value,
            }
        })
    })
}

/// Every cpu/memory/storage field present on at least one side
pub fn check_dimensions(
    threshold: u32,
    actual: &ResourceRequirements,
    expected: &ResourceRequirements,
    acceptable: &ResourceRequirements,
) -> Vec<DimensionCheck> {
    dimensions(threshold, actual, expected, acceptable)
        .filter(|c| c.actual.is_some() || c.expected.is_some() || c.acceptable.is_some())
        .collect()
}

/// Find the first cpu/memory/storage value that has drifted
///
/// Requests are checked before limits for each resource. Resources outside the canonical
/// set are never compared.
pub fn find_drift(
    threshold: u32,
    actual: &ResourceRequirements,
    expected: &ResourceRequirements,
    acceptable: &ResourceRequirements,
) -> Option<Drift> {
    dimensions(threshold, actual, expected, acceptable)
        .find(|c| c.drifted)
        .map(Drift::from)
}

/// Whether the applied resources must be replaced by the expected ones
pub fn should_overwrite(
    threshold: u32,
    actual: &ResourceRequirements,
    expected: &ResourceRequirements,
    acceptable: &ResourceRequirements,
) -> bool {
    find_drift(threshold, actual, expected, acceptable).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resource_names::{CPU, MEMORY, STORAGE};

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn reqs(entries: &[(&str, &str)]) -> ResourceRequirements {
        ResourceRequirements::uniform(
            entries
                .iter()
                .map(|(name, value)| (name.to_string(), q(value)))
                .collect(),
        )
    }

    #[test]
    fn test_out_of_band_presence() {
        assert!(!is_out_of_band(10, None, None));
        assert!(is_out_of_band(10, Some(&q("1")), None));
        assert!(is_out_of_band(10, None, Some(&q("1"))));
    }

    #[test]
    fn test_out_of_band_ratio_edges() {
        let reference = q("100");
        // 0.90 and 1.10 are inside a 10% band
        assert!(!is_out_of_band(10, Some(&q("90")), Some(&reference)));
        assert!(!is_out_of_band(10, Some(&q("110")), Some(&reference)));
        assert!(is_out_of_band(10, Some(&q("89.99")), Some(&reference)));
        // 1.1099 rounds down to 1.10
        assert!(!is_out_of_band(10, Some(&q("110.99")), Some(&reference)));
        assert!(is_out_of_band(10, Some(&q("111")), Some(&reference)));
    }

    #[test]
    fn test_zero_threshold_requires_equality_to_two_decimals() {
        let reference = q("1");
        assert!(!is_out_of_band(0, Some(&q("1")), Some(&reference)));
        assert!(!is_out_of_band(0, Some(&q("1.009")), Some(&reference)));
        assert!(is_out_of_band(0, Some(&q("1.01")), Some(&reference)));
        assert!(is_out_of_band(0, Some(&q("0.999")), Some(&reference)));
    }

    #[test]
    fn test_zero_reference() {
        assert!(!is_out_of_band(10, Some(&q("0")), Some(&q("0"))));
        assert!(is_out_of_band(10, Some(&q("1m")), Some(&q("0"))));
    }

    #[test]
    fn test_full_threshold_never_under() {
        assert!(!is_out_of_band(100, Some(&q("0")), Some(&q("5"))));
        assert!(is_out_of_band(100, Some(&q("10.05")), Some(&q("5"))));
    }

    #[test]
    fn test_overwrite_when_below_both() {
        let actual = reqs(&[(CPU, "1.0")]);
        let expected = reqs(&[(CPU, "1.3")]);
        let acceptable = reqs(&[(CPU, "1.4")]);

        let drift = find_drift(10, &actual, &expected, &acceptable).unwrap();
        assert_eq!(drift.resource, CPU);
        assert_eq!(drift.field, RequirementField::Requests);
        assert_eq!(drift.actual, Some(q("1")));
        assert!(should_overwrite(10, &actual, &expected, &acceptable));
    }

    #[test]
    fn test_no_overwrite_within_band_of_expected() {
        let actual = reqs(&[(CPU, "1.35")]);
        let expected = reqs(&[(CPU, "1.3")]);
        for acceptable in [reqs(&[(CPU, "1.4")]), reqs(&[(CPU, "50")])] {
            assert!(!should_overwrite(10, &actual, &expected, &acceptable));
        }
    }

    #[test]
    fn test_no_overwrite_when_equal() {
        let expected = reqs(&[(CPU, "3.3"), (MEMORY, "33Mi"), (STORAGE, "33Gi")]);
        let acceptable = reqs(&[(CPU, "4.3"), (MEMORY, "34Mi"), (STORAGE, "34Gi")]);
        for threshold in [0, 5, 10, 100] {
            assert!(!should_overwrite(threshold, &expected, &expected, &acceptable));
        }
    }

    #[test]
    fn test_no_overwrite_inside_hysteresis_band() {
        let expected = reqs(&[(CPU, "16.3"), (MEMORY, "46Mi"), (STORAGE, "46Gi")]);
        let acceptable = reqs(&[(CPU, "24.3"), (MEMORY, "54Mi"), (STORAGE, "54Gi")]);
        let actual = reqs(&[(CPU, "20"), (MEMORY, "50Mi"), (STORAGE, "50Gi")]);
        assert!(!should_overwrite(0, &actual, &expected, &acceptable));
        assert!(!should_overwrite(10, &actual, &expected, &acceptable));
    }

    #[test]
    fn test_overwrite_when_dimension_missing() {
        let expected = reqs(&[(CPU, "3.3"), (MEMORY, "33Mi")]);
        let acceptable = reqs(&[(CPU, "4.3"), (MEMORY, "34Mi")]);
        let actual = reqs(&[(CPU, "3.3")]);

        let drift = find_drift(10, &actual, &expected, &acceptable).unwrap();
        assert_eq!(drift.resource, MEMORY);
        assert_eq!(drift.actual, None);
    }

    #[test]
    fn test_overwrite_when_unexpected_dimension_present() {
        let expected = reqs(&[(CPU, "3.3")]);
        let acceptable = reqs(&[(CPU, "4.3")]);
        let actual = reqs(&[(CPU, "3.3"), (STORAGE, "10Gi")]);
        assert!(should_overwrite(10, &actual, &expected, &acceptable));
    }

    #[test]
    fn test_limits_checked_when_requests_match() {
        let expected = reqs(&[(CPU, "1")]);
        let acceptable = reqs(&[(CPU, "2")]);
        let mut actual = expected.clone();
        actual.limits.insert(CPU.to_string(), q("5"));

        let drift = find_drift(10, &actual, &expected, &acceptable).unwrap();
        assert_eq!(drift.field, RequirementField::Limits);
    }

    #[test]
    fn test_non_canonical_resources_ignored() {
        let expected = reqs(&[(CPU, "1"), ("ephemeral-storage", "1Gi")]);
        let acceptable = reqs(&[(CPU, "2"), ("ephemeral-storage", "2Gi")]);
        let actual = reqs(&[(CPU, "1")]);
        assert!(!should_overwrite(10, &actual, &expected, &acceptable));
    }

    #[test]
    fn test_check_dimensions_reports_each_present_field() {
        let expected = reqs(&[(CPU, "1.3"), (MEMORY, "33Mi")]);
        let acceptable = reqs(&[(CPU, "1.4"), (MEMORY, "34Mi")]);
        let actual = reqs(&[(CPU, "1.3"), (MEMORY, "100Mi")]);

        let checks = check_dimensions(10, &actual, &expected, &acceptable);
        assert_eq!(checks.len(), 4);
        assert_eq!(
            checks
                .iter()
                .map(|c| (c.resource, c.field, c.drifted))
                .collect::<Vec<_>>(),
            vec![
                (CPU, RequirementField::Requests, false),
                (CPU, RequirementField::Limits, false),
                (MEMORY, RequirementField::Requests, true),
                (MEMORY, RequirementField::Limits, true),
            ]
        );
    }

    #[test]
    fn test_drift_display() {
        let drift = Drift {
            resource: CPU,
            field: RequirementField::Limits,
            actual: None,
            expected: Some(q("1.3")),
            acceptable: Some(q("1.4")),
        };
        assert_eq!(
            drift.to_string(),
            "cpu limits: actual <unset>, expected 1300m, acceptable 1400m"
        );
    }
}
