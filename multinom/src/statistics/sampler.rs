use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Binomial, Distribution};

use crate::{
    error::{Error, Result},
    estimator::ProbabilityMapping,
    observation::Observation,
};

/// Draws random observations from an estimated distribution.
#[derive(Debug)]
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let rng = StdRng::from_os_rng();
        Sampler { rng }
    }

    pub fn from_seed(seed: u64) -> Self {
        let rng = StdRng::seed_from_u64(seed);
        Sampler { rng }
    }

    /// Draws the counts of `trials` independent draws over the mapping's words.
    ///
    /// Each category is drawn from a binomial conditioned on the trials and
    /// probability mass left by the categories before it; the last category
    /// takes whatever remains.
    pub fn sample(&mut self, mapping: &ProbabilityMapping, trials: u64) -> Result<Observation> {
        let mut observation = Observation::new();
        let mut remaining = trials;
        let mut remaining_mass = 1.0;
        let last = mapping.len().saturating_sub(1);

        for (index, entry) in mapping.iter().enumerate() {
            let count = if index == last {
                remaining
            } else if remaining == 0 || remaining_mass <= 0.0 {
                0
            } else {
                let p = (entry.probability / remaining_mass).clamp(0.0, 1.0);
                Binomial::new(remaining, p)
                    .map_err(|_| Error::InvalidProbability { index, value: p })?
                    .sample(&mut self.rng)
            };
            observation.insert(entry.token.clone(), count);
            remaining -= count;
            remaining_mass -= entry.probability;
        }

        Ok(observation)
    }

    #[cfg(test)]
    pub fn test_sampler() -> Self {
        Self::from_seed(42)
    }
}
