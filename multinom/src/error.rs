use serde::{Deserialize, Serialize};

use crate::corpus::Token;

/// How an observation's key set disagrees with the probability mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchKind {
    /// The observation names a word outside the mapping's support.
    Unknown,
    /// A word of the mapping's support has no observed count.
    Missing,
}

impl std::fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MismatchKind::Unknown => write!(f, "not part of the estimated support"),
            MismatchKind::Missing => write!(f, "missing from the observation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("support size must be positive, got {0}")]
    InvalidSupportSize(usize),

    #[error(
        "requested the top {requested} words but only {available} distinct non-stopwords exist"
    )]
    InsufficientVocabulary { requested: usize, available: usize },

    #[error("invalid count for '{token}': {value:?} is not a non-negative integer")]
    InvalidObservation { token: Token, value: String },

    #[error("word '{token}' is {kind}")]
    VocabularyMismatch { token: Token, kind: MismatchKind },

    #[error("probability #{index} is {value}, expected a finite value in [0, 1]")]
    InvalidProbability { index: usize, value: f64 },

    #[error("observed counts sum past u64::MAX trials")]
    TrialOverflow,

    #[error("got {counts} counts for {probabilities} probabilities")]
    LengthMismatch { counts: usize, probabilities: usize },

    #[error("malformed sample: {0}")]
    InvalidSample(String),

    #[error("probability mapping invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A PMF value that left `[0, 1]` through floating-point error and was clamped.
///
/// Not fatal: it is logged and carried alongside the clamped result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("pmf evaluated to {raw:e}, clamped to {clamped}")]
pub struct PrecisionWarning {
    pub raw: f64,
    pub clamped: f64,
}
