//! Maximum-likelihood estimation of a multinomial distribution over the most
//! frequent words of a corpus, and evaluation of its probability mass function.

pub mod corpus;
pub mod error;
pub mod estimator;
pub mod observation;
pub mod statistics;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::{
        corpus::{StopwordSet, Token, tokenize},
        error::{Error, MismatchKind, PrecisionWarning, Result},
        estimator::{
            DEFAULT_SUPPORT_SIZE, FrequencyTable, ProbabilityMapping, SUM_TOLERANCE,
            WordProbability, estimate,
        },
        observation::{Observation, parse_count, parse_sample},
        statistics::{
            pmf::{Evaluation, evaluate, multinomial_ln_pmf, multinomial_probability, pmf},
            sampler::Sampler,
        },
    };
}
