//! Synthetic training data.
//!
//! Features are drawn from fixed normal distributions and clipped to their
//! domains; labels come from a fixed linear risk formula. Everything is driven
//! by an injected [`RandomSource`] so a seed reproduces the set bit for bit.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::config::TrainingConfig;
use crate::error::{RiskError, RiskResult};
use crate::models::{RiskLevel, TrainingSample, FEATURE_COUNT};

pub trait RandomSource {
    /// Uniform draw from `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform draw from `0..bound`.
    fn next_index(&mut self, bound: usize) -> usize;

    /// Draw from the standard normal distribution.
    fn next_normal(&mut self) -> f64;
}

/// ChaCha8-backed source; the stream is stable across platforms.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn next_index(&mut self, bound: usize) -> usize {
        self.rng.random_range(0..bound.max(1))
    }

    fn next_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

#[derive(Debug, Clone, Copy)]
struct FeatureDistribution {
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
}

const BASE_DISTRIBUTIONS: [FeatureDistribution; FEATURE_COUNT] = [
    FeatureDistribution { mean: 75.0, std_dev: 15.0, min: 0.0, max: 100.0 },
    FeatureDistribution { mean: 6.5, std_dev: 1.5, min: 0.0, max: 10.0 },
    FeatureDistribution { mean: 6.0, std_dev: 2.0, min: 1.0, max: 10.0 },
    FeatureDistribution { mean: 5.0, std_dev: 2.0, min: 1.0, max: 10.0 },
    FeatureDistribution { mean: 50_000.0, std_dev: 20_000.0, min: 10_000.0, max: 200_000.0 },
];

/// Uniform boxes over the favourable and adverse corners of the domain.
const LOW_TIER_BOX: [(f64, f64); FEATURE_COUNT] = [
    (85.0, 100.0),
    (7.5, 10.0),
    (7.0, 10.0),
    (1.0, 4.0),
    (60_000.0, 200_000.0),
];

const HIGH_TIER_BOX: [(f64, f64); FEATURE_COUNT] = [
    (0.0, 60.0),
    (0.0, 5.0),
    (1.0, 5.0),
    (1.0, 10.0),
    (10_000.0, 50_000.0),
];

const COVERAGE_BUDGET_FACTOR: usize = 20;

/// Continuous 0-100 risk used only to label synthetic samples.
pub fn synthetic_risk_score(features: &[f64; FEATURE_COUNT]) -> f64 {
    let [attendance, gpa, participation, stress, family_income] = *features;
    let score = 0.3 * (100.0 - attendance)
        + 2.5 * (10.0 - gpa)
        + 2.0 * (10.0 - participation)
        + 1.5 * stress
        + 0.1 * (100_000.0 - family_income) / 1000.0;
    score.clamp(0.0, 100.0)
}

pub fn label_for_score(score: f64) -> RiskLevel {
    if score < 30.0 {
        RiskLevel::Low
    } else if score < 70.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

pub fn label(features: &[f64; FEATURE_COUNT]) -> RiskLevel {
    label_for_score(synthetic_risk_score(features))
}

/// Draw `count` labelled samples from the base distributions.
pub fn synthesize<R: RandomSource + ?Sized>(
    rng: &mut R,
    count: usize,
) -> RiskResult<Vec<TrainingSample>> {
    (0..count).map(|_| base_sample(rng)).collect()
}

/// Top up tiers holding fewer than `min_per_tier` samples with draws from
/// that tier's coverage profile. Only draws the formula labels with the
/// deficient tier are kept. Returns the number of samples added.
pub fn cover_tiers<R: RandomSource + ?Sized>(
    rng: &mut R,
    samples: &mut Vec<TrainingSample>,
    min_per_tier: usize,
) -> RiskResult<usize> {
    let mut counts = [0usize; 3];
    for sample in samples.iter() {
        counts[sample.label.index()] += 1;
    }

    let before = samples.len();
    for level in RiskLevel::ALL {
        let budget = min_per_tier * COVERAGE_BUDGET_FACTOR;
        let mut draws = 0;
        while counts[level.index()] < min_per_tier {
            if draws == budget {
                return Err(RiskError::ModelUnavailable(format!(
                    "only {} of {} {} samples after {} coverage draws",
                    counts[level.index()],
                    min_per_tier,
                    level,
                    budget
                )));
            }
            let sample = match level {
                RiskLevel::Low => box_sample(rng, &LOW_TIER_BOX)?,
                RiskLevel::Medium => base_sample(rng)?,
                RiskLevel::High => box_sample(rng, &HIGH_TIER_BOX)?,
            };
            draws += 1;
            if sample.label == level {
                counts[level.index()] += 1;
                samples.push(sample);
            }
        }
    }

    let added = samples.len() - before;
    if added > 0 {
        debug!(added, ?counts, "added tier coverage samples");
    }
    Ok(added)
}

/// Full training set for a config: base draws plus tier coverage.
pub fn training_set(config: &TrainingConfig) -> RiskResult<Vec<TrainingSample>> {
    if config.samples == 0 {
        return Err(RiskError::ModelUnavailable(
            "training requires at least one sample".to_string(),
        ));
    }
    let mut rng = SeededRandom::new(config.seed);
    let mut samples = synthesize(&mut rng, config.samples)?;
    cover_tiers(&mut rng, &mut samples, config.min_tier_samples)?;
    Ok(samples)
}

fn base_sample<R: RandomSource + ?Sized>(rng: &mut R) -> RiskResult<TrainingSample> {
    let mut features = [0.0; FEATURE_COUNT];
    for (slot, dist) in features.iter_mut().zip(BASE_DISTRIBUTIONS.iter()) {
        let value = dist.mean + dist.std_dev * rng.next_normal();
        *slot = finite(value)?.clamp(dist.min, dist.max);
    }
    Ok(TrainingSample {
        label: label(&features),
        features,
    })
}

fn box_sample<R: RandomSource + ?Sized>(
    rng: &mut R,
    bounds: &[(f64, f64); FEATURE_COUNT],
) -> RiskResult<TrainingSample> {
    let mut features = [0.0; FEATURE_COUNT];
    for (slot, &(min, max)) in features.iter_mut().zip(bounds.iter()) {
        let value = min + (max - min) * rng.next_f64();
        *slot = finite(value)?.clamp(min, max);
    }
    Ok(TrainingSample {
        label: label(&features),
        features,
    })
}

fn finite(value: f64) -> RiskResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RiskError::ModelUnavailable(
            "random source produced a non-finite draw".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f64);

    impl RandomSource for Constant {
        fn next_f64(&mut self) -> f64 {
            self.0
        }

        fn next_index(&mut self, _bound: usize) -> usize {
            0
        }

        fn next_normal(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn same_seed_reproduces_identical_samples() {
        let first = synthesize(&mut SeededRandom::new(42), 1000).unwrap();
        let second = synthesize(&mut SeededRandom::new(42), 1000).unwrap();
        assert_eq!(first.len(), 1000);
        for (a, b) in first.iter().zip(second.iter()) {
            for (x, y) in a.features.iter().zip(b.features.iter()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
            assert_eq!(a.label, b.label);
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let first = synthesize(&mut SeededRandom::new(1), 10).unwrap();
        let second = synthesize(&mut SeededRandom::new(2), 10).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn samples_stay_inside_feature_domains() {
        let samples = synthesize(&mut SeededRandom::new(7), 2000).unwrap();
        for sample in &samples {
            for (value, dist) in sample.features.iter().zip(BASE_DISTRIBUTIONS.iter()) {
                assert!(*value >= dist.min && *value <= dist.max);
            }
            assert_eq!(sample.label, label(&sample.features));
        }
    }

    #[test]
    fn score_formula_matches_weights() {
        let low = [90.0, 8.5, 8.0, 3.0, 60_000.0];
        assert!((synthetic_risk_score(&low) - 19.25).abs() < 1e-9);
        assert_eq!(label(&low), RiskLevel::Low);

        let worst = [0.0, 0.0, 1.0, 1.0, 10_000.0];
        assert!((synthetic_risk_score(&worst) - 83.5).abs() < 1e-9);
        assert_eq!(label(&worst), RiskLevel::High);

        let struggling = [40.0, 4.0, 2.0, 9.0, 15_000.0];
        assert!((synthetic_risk_score(&struggling) - 71.0).abs() < 1e-9);
        assert_eq!(label(&struggling), RiskLevel::High);
    }

    #[test]
    fn score_is_clipped_to_percentage_range() {
        assert_eq!(synthetic_risk_score(&[100.0, 10.0, 10.0, 1.0, 200_000.0]), 0.0);
    }

    #[test]
    fn thresholds_split_three_tiers() {
        assert_eq!(label_for_score(29.999), RiskLevel::Low);
        assert_eq!(label_for_score(30.0), RiskLevel::Medium);
        assert_eq!(label_for_score(69.999), RiskLevel::Medium);
        assert_eq!(label_for_score(70.0), RiskLevel::High);
    }

    #[test]
    fn coverage_fills_every_tier() {
        let config = TrainingConfig::default();
        let samples = training_set(&config).unwrap();
        assert!(samples.len() >= config.samples);
        for level in RiskLevel::ALL {
            let count = samples.iter().filter(|s| s.label == level).count();
            assert!(count >= config.min_tier_samples, "{level} has {count}");
        }
        assert_eq!(training_set(&config).unwrap(), samples);
    }

    #[test]
    fn coverage_adds_only_the_missing_tier() {
        let mut samples = synthesize(&mut SeededRandom::new(42), 1000).unwrap();
        let base = samples.clone();
        let high_before = base.iter().filter(|s| s.label == RiskLevel::High).count();
        assert!(high_before < 50);

        let added = cover_tiers(&mut SeededRandom::new(9), &mut samples, 50).unwrap();
        assert_eq!(&samples[..base.len()], &base[..]);
        assert_eq!(added, 50 - high_before);
        assert!(samples[base.len()..]
            .iter()
            .all(|s| s.label == RiskLevel::High && s.label == label(&s.features)));
    }

    #[test]
    fn coverage_disabled_keeps_exact_count() {
        let config = TrainingConfig {
            min_tier_samples: 0,
            ..TrainingConfig::default()
        };
        assert_eq!(training_set(&config).unwrap().len(), config.samples);
    }

    #[test]
    fn degenerate_source_is_reported() {
        let err = synthesize(&mut Constant(f64::NAN), 5).unwrap_err();
        assert!(matches!(err, RiskError::ModelUnavailable(_)));

        let err = synthesize(&mut Constant(f64::INFINITY), 5).unwrap_err();
        assert!(matches!(err, RiskError::ModelUnavailable(_)));

        let mut samples = Vec::new();
        let err = cover_tiers(&mut Constant(f64::NAN), &mut samples, 1).unwrap_err();
        assert!(matches!(err, RiskError::ModelUnavailable(_)));
    }

    #[test]
    fn exhausted_coverage_budget_fails() {
        // The centre of the adverse box scores 69, one short of High.
        let mut samples = Vec::new();
        let err = cover_tiers(&mut Constant(0.5), &mut samples, 3).unwrap_err();
        assert!(matches!(err, RiskError::ModelUnavailable(_)));
    }
}
