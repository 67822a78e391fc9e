use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{AuditError, Result},
    util::round2,
};

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TaskMetrics {
    pub input_size: u64,
    pub compute_intensity: u8,
    pub output_size: u64,
    pub time_sensitivity: u8,
    pub resource_dependencies: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Trivial,
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

impl ComplexityLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 20.0 {
            ComplexityLevel::Trivial
        } else if score < 40.0 {
            ComplexityLevel::Simple
        } else if score < 60.0 {
            ComplexityLevel::Moderate
        } else if score < 80.0 {
            ComplexityLevel::Complex
        } else {
            ComplexityLevel::VeryComplex
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComplexityLevel::Trivial => "trivial",
            ComplexityLevel::Simple => "simple",
            ComplexityLevel::Moderate => "moderate",
            ComplexityLevel::Complex => "complex",
            ComplexityLevel::VeryComplex => "very_complex",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexityResult {
    pub score: f64,
    pub level: ComplexityLevel,
    pub breakdown: BTreeMap<&'static str, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    pub input: f64,
    pub compute: f64,
    pub output: f64,
    pub time: f64,
    pub resource: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            input: 0.25,
            compute: 0.30,
            output: 0.20,
            time: 0.15,
            resource: 0.10,
        }
    }
}

impl Weights {
    pub const FACTORS: [&'static str; 5] = ["input", "compute", "output", "time", "resource"];

    /// Builds a weight table from named factors. Factors that are not named
    /// weigh nothing.
    pub fn from_map(weights: &HashMap<String, f64>) -> Result<Self> {
        let mut table = Weights {
            input: 0.0,
            compute: 0.0,
            output: 0.0,
            time: 0.0,
            resource: 0.0,
        };

        for (name, &weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AuditError::Config(format!(
                    "Weight '{}' must be a non-negative number, got {}",
                    name, weight
                )));
            }
            let slot = match name.as_str() {
                "input" => &mut table.input,
                "compute" => &mut table.compute,
                "output" => &mut table.output,
                "time" => &mut table.time,
                "resource" => &mut table.resource,
                other => {
                    return Err(AuditError::Config(format!(
                        "Unknown weight '{}', expected one of: {}",
                        other,
                        Self::FACTORS.join(", ")
                    )));
                }
            };
            *slot = weight;
        }

        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AuditError::Config(format!(
                "Weights must sum to 1.0 (got {:.3})",
                sum
            )));
        }

        Ok(table)
    }

    fn pairs(&self) -> [(&'static str, f64); 5] {
        [
            ("input", self.input),
            ("compute", self.compute),
            ("output", self.output),
            ("time", self.time),
            ("resource", self.resource),
        ]
    }
}

/// Weighted five-factor complexity score.
///
/// A scorer is an immutable value: changing weights produces a new scorer, so
/// a scorer shared between threads never observes a partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplexityScorer {
    weights: Weights,
}

impl ComplexityScorer {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn update_weights(&self, weights: &HashMap<String, f64>) -> Result<Self> {
        let weights = Weights::from_map(weights)?;
        debug!("Using complexity weights {:?}", weights);
        Ok(Self::new(weights))
    }

    pub fn score(&self, metrics: &TaskMetrics) -> ComplexityResult {
        let factors = factor_scores(metrics);

        let mut total = 0.0;
        let mut breakdown = BTreeMap::new();
        for ((name, weight), factor) in self.weights.pairs().into_iter().zip(factors) {
            let contribution = factor * weight;
            total += contribution;
            breakdown.insert(name, round2(contribution * 10.0));
        }

        let score = round2((total * 10.0).clamp(0.0, 100.0));

        ComplexityResult {
            score,
            level: ComplexityLevel::from_score(score),
            breakdown,
        }
    }
}

fn size_score(size: u64) -> f64 {
    ((size as f64 / 100.0).sqrt() * 10.0).min(10.0)
}

/// Per-factor scores on a 0-10 scale, in `Weights::FACTORS` order.
fn factor_scores(metrics: &TaskMetrics) -> [f64; 5] {
    [
        size_score(metrics.input_size),
        f64::from(metrics.compute_intensity),
        size_score(metrics.output_size),
        f64::from(metrics.time_sensitivity),
        (f64::from(metrics.resource_dependencies) * 2.0).min(10.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(input: u64, compute: u8, output: u64, time: u8, resources: u32) -> TaskMetrics {
        TaskMetrics {
            input_size: input,
            compute_intensity: compute,
            output_size: output,
            time_sensitivity: time,
            resource_dependencies: resources,
        }
    }

    fn weight_map(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_reference_metrics_with_default_weights() {
        let result = ComplexityScorer::default().score(&metrics(100, 5, 100, 5, 2));

        // 10 * (10*0.25 + 5*0.30 + 10*0.20 + 5*0.15 + 4*0.10)
        assert_eq!(result.score, 71.5);
        assert_eq!(result.level, ComplexityLevel::Complex);
        assert_eq!(result.breakdown["input"], 25.0);
        assert_eq!(result.breakdown["compute"], 15.0);
        assert_eq!(result.breakdown["output"], 20.0);
        assert_eq!(result.breakdown["time"], 7.5);
        assert_eq!(result.breakdown["resource"], 4.0);
    }

    #[test]
    fn test_size_and_resource_factors_saturate() {
        let result = ComplexityScorer::default().score(&metrics(1_000_000, 10, 1_000_000, 10, 50));
        assert_eq!(result.score, 100.0);
        assert_eq!(result.level, ComplexityLevel::VeryComplex);

        let small = ComplexityScorer::default().score(&metrics(25, 1, 0, 1, 0));
        // input: sqrt(0.25) * 10 = 5 -> 5 * 0.25 * 10 = 12.5
        assert_eq!(small.breakdown["input"], 12.5);
        assert_eq!(small.breakdown["output"], 0.0);
        assert_eq!(small.score, 12.5 + 3.0 + 1.5);
        assert_eq!(small.level, ComplexityLevel::Trivial);
    }

    #[test]
    fn test_level_boundaries_are_half_open() {
        assert_eq!(ComplexityLevel::from_score(0.0), ComplexityLevel::Trivial);
        assert_eq!(ComplexityLevel::from_score(19.99), ComplexityLevel::Trivial);
        assert_eq!(ComplexityLevel::from_score(20.0), ComplexityLevel::Simple);
        assert_eq!(ComplexityLevel::from_score(40.0), ComplexityLevel::Moderate);
        assert_eq!(ComplexityLevel::from_score(60.0), ComplexityLevel::Complex);
        assert_eq!(ComplexityLevel::from_score(79.99), ComplexityLevel::Complex);
        assert_eq!(ComplexityLevel::from_score(80.0), ComplexityLevel::VeryComplex);
        assert_eq!(ComplexityLevel::VeryComplex.to_string(), "very_complex");
    }

    #[test]
    fn test_rejected_weights_leave_scorer_unchanged() {
        let scorer = ComplexityScorer::default();
        let bad = weight_map(&[("input", 0.2), ("compute", 0.2), ("output", 0.2), ("time", 0.1), ("resource", 0.1)]);

        let err = scorer.update_weights(&bad).unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
        assert_eq!(scorer.weights(), &Weights::default());
        assert_eq!(scorer.score(&metrics(100, 5, 100, 5, 2)).score, 71.5);
    }

    #[test]
    fn test_accepted_weights_apply_to_new_scorer() {
        let scorer = ComplexityScorer::default();
        let compute_only = weight_map(&[("compute", 1.0)]);

        let updated = scorer.update_weights(&compute_only).unwrap();
        let result = updated.score(&metrics(100, 5, 100, 5, 2));
        assert_eq!(result.score, 50.0);
        assert_eq!(result.level, ComplexityLevel::Moderate);
        assert_eq!(result.breakdown["input"], 0.0);

        let near_one = weight_map(&[("input", 0.5), ("time", 0.505)]);
        assert!(scorer.update_weights(&near_one).is_ok());
    }

    #[test]
    fn test_unknown_or_negative_weights_are_rejected() {
        let scorer = ComplexityScorer::default();
        assert!(scorer.update_weights(&weight_map(&[("memory", 1.0)])).is_err());
        assert!(
            scorer
                .update_weights(&weight_map(&[("input", 1.5), ("compute", -0.5)]))
                .is_err()
        );
    }
}
