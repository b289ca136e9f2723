//! Acquisition functions for a minimized objective.

use serde::{Deserialize, Serialize};

/// Scores a surrogate prediction; larger scores are more worth evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcquisitionFunction {
    /// Expected improvement over the best observation, shifted by `xi`.
    ExpectedImprovement { xi: f64 },
    /// Probability of improving on the best observation by at least `xi`.
    ProbabilityOfImprovement { xi: f64 },
    /// Negated lower confidence bound `mu - kappa * sigma`.
    LowerConfidenceBound { kappa: f64 },
}

impl Default for AcquisitionFunction {
    fn default() -> Self {
        Self::ExpectedImprovement { xi: 0.01 }
    }
}

const MIN_SIGMA: f64 = 1e-12;

impl AcquisitionFunction {
    pub fn score(&self, mu: f64, sigma: f64, best: f64) -> f64 {
        match *self {
            Self::ExpectedImprovement { xi } => {
                let improvement = best - mu - xi;
                if sigma < MIN_SIGMA {
                    return improvement.max(0.0);
                }
                let z = improvement / sigma;
                (improvement * normal_cdf(z) + sigma * normal_pdf(z)).max(0.0)
            }
            Self::ProbabilityOfImprovement { xi } => {
                let improvement = best - mu - xi;
                if sigma < MIN_SIGMA {
                    return if improvement > 0.0 { 1.0 } else { 0.0 };
                }
                normal_cdf(improvement / sigma)
            }
            Self::LowerConfidenceBound { kappa } => -(mu - kappa * sigma),
        }
    }
}

pub fn normal_pdf(z: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * z * z).exp()
}

/// Abramowitz & Stegun 7.1.26, absolute error below 1.5e-7.
pub fn normal_cdf(z: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let x = z.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + P * x);
    let erf = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    if z < 0.0 {
        0.5 * (1.0 - erf)
    } else {
        0.5 * (1.0 + erf)
    }
}
