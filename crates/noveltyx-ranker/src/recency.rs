//! Recency signal from publication count and oldest-publication age.
//!
//! f(x) = sigmoid(k · (x / max − 0.5)), sigmoid(x) = 1 / (1 + eˣ)
//!
//! The sigmoid is the decreasing variant: more or older literature gives a
//! lower value.

use crate::params::RecencyParams;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + x.exp())
}

fn saturate(x: f64, max: f64, steepness: f64) -> f64 {
    sigmoid(steepness * (x / max - 0.5))
}

/// Product of the defined factors, `None` when neither input is defined.
pub fn recency(count: Option<f64>, age: Option<f64>, params: &RecencyParams) -> Option<f64> {
    let count = count.map(|c| saturate(c, params.max_count, params.count_steepness));
    let age = age.map(|a| saturate(a, params.max_age, params.age_steepness));
    match (count, age) {
        (Some(c), Some(a)) => Some(c * a),
        (Some(c), None) => Some(c),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> RecencyParams {
        RecencyParams::default()
    }

    #[test]
    fn test_undefined_without_inputs() {
        assert_eq!(recency(None, None, &p()), None);
    }

    #[test]
    fn test_decreasing_in_count_and_age() {
        let fresh = recency(Some(0.0), Some(0.0), &p()).unwrap();
        let stale = recency(Some(100.0), Some(50.0), &p()).unwrap();
        assert!(fresh > stale);

        let few = recency(Some(5.0), None, &p()).unwrap();
        let many = recency(Some(80.0), None, &p()).unwrap();
        assert!(few > many);

        let young = recency(None, Some(2.0), &p()).unwrap();
        let old = recency(None, Some(40.0), &p()).unwrap();
        assert!(young > old);
    }

    #[test]
    fn test_midpoint_and_product() {
        // x = max / 2 sits on the sigmoid midpoint
        assert!((recency(Some(50.0), None, &p()).unwrap() - 0.5).abs() < 1e-12);
        assert!((recency(None, Some(25.0), &p()).unwrap() - 0.5).abs() < 1e-12);
        assert!((recency(Some(50.0), Some(25.0), &p()).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_exact_values() {
        let expected = 1.0 / (1.0 + (-5.0f64).exp());
        assert!((recency(Some(0.0), None, &p()).unwrap() - expected).abs() < 1e-12);
        let expected = 1.0 / (1.0 + (-2.0f64).exp());
        assert!((recency(None, Some(0.0), &p()).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_bounded() {
        for count in [0.0, 1.0, 10.0, 100.0, 1000.0] {
            for age in [0.0, 5.0, 50.0, 200.0] {
                let r = recency(Some(count), Some(age), &p()).unwrap();
                assert!((0.0..=1.0).contains(&r));
            }
        }
    }
}
