//! Gross weight → weight class mapping.

use rand::Rng;

use crate::types::WeightClass;

/// Lower bound in tons of each band. Band `k` covers `[lower_k, lower_k+1)`;
/// band 8 is open upwards.
const BAND_LOWER_BOUNDS: [f64; 8] = [0.0, 19.0, 23.5, 25.5, 26.7, 28.5, 30.1, 31.1];

/// Maps gross weights onto the eight ordinal bands.
#[derive(Clone, Copy, Debug, Default)]
pub struct WeightClassifier;

impl WeightClassifier {
    /// Classifies an optional gross weight.
    ///
    /// A missing weight yields a band drawn uniformly from `1..=8`. Callers that
    /// need reproducible plans must supply the weight or seed `rng`.
    pub fn classify<R: Rng + ?Sized>(&self, weight: Option<f64>, rng: &mut R) -> WeightClass {
        match weight {
            Some(tons) => self.classify_known(tons),
            None => WeightClass::new(rng.random_range(1..=8)).unwrap_or(WeightClass::HEAVIEST),
        }
    }

    /// Classifies a known gross weight.
    ///
    /// Bands are contiguous, so a weight between two listed limits (18.95 t)
    /// belongs to the lower band. Everything from 31.1 t up, including weights
    /// above 50 t, is band 8. A negative or NaN weight matches no band and is
    /// reported as band 8 as well.
    ///
    /// # Examples
    /// ```
    /// use yard_planner::weight::WeightClassifier;
    ///
    /// let classifier = WeightClassifier;
    /// assert_eq!(classifier.classify_known(18.9).get(), 1);
    /// assert_eq!(classifier.classify_known(19.0).get(), 2);
    /// assert_eq!(classifier.classify_known(60.0).get(), 8);
    /// ```
    pub fn classify_known(&self, tons: f64) -> WeightClass {
        BAND_LOWER_BOUNDS
            .iter()
            .rposition(|lower| *lower <= tons)
            .and_then(|idx| WeightClass::new(idx as u8 + 1))
            .unwrap_or(WeightClass::HEAVIEST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn band_boundaries() {
        let classifier = WeightClassifier;
        assert_eq!(classifier.classify_known(0.0).get(), 1);
        assert_eq!(classifier.classify_known(18.9).get(), 1);
        assert_eq!(classifier.classify_known(19.0).get(), 2);
        assert_eq!(classifier.classify_known(23.4).get(), 2);
        assert_eq!(classifier.classify_known(23.5).get(), 3);
        assert_eq!(classifier.classify_known(26.6).get(), 4);
        assert_eq!(classifier.classify_known(26.7).get(), 5);
        assert_eq!(classifier.classify_known(30.0).get(), 6);
        assert_eq!(classifier.classify_known(30.1).get(), 7);
        assert_eq!(classifier.classify_known(31.0).get(), 7);
        assert_eq!(classifier.classify_known(31.1).get(), 8);
        assert_eq!(classifier.classify_known(50.0).get(), 8);
    }

    #[test]
    fn weights_between_listed_limits_stay_in_lower_band() {
        let classifier = WeightClassifier;
        let cases = [
            (18.95, 1),
            (23.45, 2),
            (25.45, 3),
            (26.65, 4),
            (28.45, 5),
            (30.05, 6),
            (31.05, 7),
        ];
        for (tons, band) in cases {
            assert_eq!(classifier.classify_known(tons).get(), band, "{tons} t");
        }
    }

    #[test]
    fn out_of_band_weights_fall_back_to_heaviest() {
        let classifier = WeightClassifier;
        assert_eq!(classifier.classify_known(60.0), WeightClass::HEAVIEST);
        assert_eq!(classifier.classify_known(f64::NAN), WeightClass::HEAVIEST);
        assert_eq!(classifier.classify_known(-1.0), WeightClass::HEAVIEST);
    }

    #[test]
    fn known_weight_ignores_rng() {
        let classifier = WeightClassifier;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(classifier.classify(Some(24.0), &mut rng).get(), 3);
        }
    }

    #[test]
    fn missing_weight_draws_from_all_bands() {
        let classifier = WeightClassifier;
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = [false; 8];
        for _ in 0..500 {
            let class = classifier.classify(None, &mut rng);
            seen[(class.get() - 1) as usize] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn missing_weight_is_reproducible_with_same_seed() {
        let classifier = WeightClassifier;
        let mut first = StdRng::seed_from_u64(99);
        let mut second = StdRng::seed_from_u64(99);
        let a: Vec<_> = (0..10).map(|_| classifier.classify(None, &mut first)).collect();
        let b: Vec<_> = (0..10).map(|_| classifier.classify(None, &mut second)).collect();
        assert_eq!(a, b);
    }
}
