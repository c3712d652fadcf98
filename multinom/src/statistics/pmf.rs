use serde::{Deserialize, Serialize};
use statrs::function::factorial::ln_factorial;

use crate::{
    error::{Error, PrecisionWarning, Result},
    estimator::ProbabilityMapping,
    observation::Observation,
};

/// Outcome of evaluating the multinomial PMF for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Total number of trials, `n`.
    pub trials: u64,
    pub ln_probability: f64,
    pub probability: f64,
    pub warning: Option<PrecisionWarning>,
}

/// Total number of trials, `n`, failing instead of wrapping past `u64::MAX`.
pub fn trial_count(counts: &[u64]) -> Result<u64> {
    counts
        .iter()
        .try_fold(0u64, |n, &x| n.checked_add(x))
        .ok_or(Error::TrialOverflow)
}

/// `ln(n! / (x_1! ... x_k!))` with `n` the sum of `counts`.
pub fn ln_multinomial_coefficient(counts: &[u64]) -> Result<f64> {
    let n = trial_count(counts)?;
    Ok(counts
        .iter()
        .fold(ln_factorial(n), |acc, &x| acc - ln_factorial(x)))
}

/// Natural log of the multinomial PMF.
///
/// A category with zero probability contributes nothing when it was not
/// observed, and makes the result negative infinity when it was.
pub fn multinomial_ln_pmf(counts: &[u64], probabilities: &[f64]) -> Result<f64> {
    if counts.len() != probabilities.len() {
        return Err(Error::LengthMismatch {
            counts: counts.len(),
            probabilities: probabilities.len(),
        });
    }
    for (index, &value) in probabilities.iter().enumerate() {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidProbability { index, value });
        }
    }

    let mut ln_p = ln_multinomial_coefficient(counts)?;
    for (&x, &p) in counts.iter().zip(probabilities) {
        if x == 0 {
            continue;
        }
        if p == 0.0 {
            return Ok(f64::NEG_INFINITY);
        }
        ln_p += x as f64 * p.ln();
    }
    Ok(ln_p)
}

/// Probability of observing exactly `counts` given per-category `probabilities`.
///
/// Computed in log space and exponentiated once. A result that leaves `[0, 1]`
/// is clamped and reported as a [`PrecisionWarning`].
pub fn multinomial_probability(counts: &[u64], probabilities: &[f64]) -> Result<Evaluation> {
    let ln_probability = multinomial_ln_pmf(counts, probabilities)?;
    let trials = trial_count(counts)?;
    if trials == 0 {
        return Ok(Evaluation {
            trials,
            ln_probability: 0.0,
            probability: 1.0,
            warning: None,
        });
    }

    let raw = ln_probability.exp();
    let probability = raw.clamp(0.0, 1.0);
    let warning = if probability != raw {
        let warning = PrecisionWarning {
            raw,
            clamped: probability,
        };
        log::warn!("Precision loss in multinomial pmf: {warning}");
        Some(warning)
    } else {
        None
    };

    Ok(Evaluation {
        trials,
        ln_probability,
        probability,
        warning,
    })
}

/// Evaluates the multinomial PMF of `observation` under `probabilities`.
///
/// The observation must cover exactly the words of the mapping, and a
/// non-empty mapping must pass [`ProbabilityMapping::validate`], so that a
/// clamped result only ever reflects floating-point error.
pub fn evaluate(
    observation: &Observation,
    probabilities: &ProbabilityMapping,
) -> Result<Evaluation> {
    if !probabilities.is_empty() {
        probabilities.validate(probabilities.len())?;
    }
    let counts = observation.aligned_counts(probabilities)?;
    let evaluation = multinomial_probability(&counts, &probabilities.probabilities())?;
    log::debug!(
        "P(X = x) over {} categories and {} trials: {}",
        counts.len(),
        evaluation.trials,
        evaluation.probability
    );
    Ok(evaluation)
}

/// `P(X_1 = x_1, ..., X_k = x_k)`.
pub fn pmf(observation: &Observation, probabilities: &ProbabilityMapping) -> Result<f64> {
    evaluate(observation, probabilities).map(|evaluation| evaluation.probability)
}
