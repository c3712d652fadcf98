use nom::{
    IResult, Parser,
    bytes::complete::take_till1,
    character::complete::{char, multispace0},
    combinator::all_consuming,
    multi::separated_list0,
    sequence::{delimited, separated_pair},
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    corpus::Token,
    error::{Error, MismatchKind, Result},
    estimator::ProbabilityMapping,
};

/// Observed counts per word, kept in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<(Token, u64)>", try_from = "Vec<(Token, u64)>")]
pub struct Observation {
    counts: Vec<(Token, u64)>,
    index: FxHashMap<Token, usize>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the count of `token`, returning the previous count if it had one.
    pub fn insert(&mut self, token: impl Into<Token>, count: u64) -> Option<u64> {
        let token = token.into();
        match self.index.get(token.as_str()) {
            Some(&i) => Some(std::mem::replace(&mut self.counts[i].1, count)),
            None => {
                self.index.insert(token.clone(), self.counts.len());
                self.counts.push((token, count));
                None
            }
        }
    }

    /// Like [`Observation::insert`], but rejects negative counts.
    pub fn insert_signed(&mut self, token: impl Into<Token>, count: i64) -> Result<Option<u64>> {
        let token = token.into();
        match u64::try_from(count) {
            Ok(count) => Ok(self.insert(token, count)),
            Err(_) => Err(Error::InvalidObservation {
                token,
                value: count.to_string(),
            }),
        }
    }

    pub fn get(&self, token: &str) -> Option<u64> {
        self.index.get(token).map(|&i| self.counts[i].1)
    }

    /// Total number of trials, `n`.
    pub fn total(&self) -> Result<u64> {
        self.counts
            .iter()
            .try_fold(0u64, |n, (_, count)| n.checked_add(*count))
            .ok_or(Error::TrialOverflow)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, u64)> {
        self.counts.iter().map(|(token, count)| (token, *count))
    }

    /// Returns the counts in the mapping's order.
    ///
    /// The observation must cover exactly the mapping's words.
    pub fn aligned_counts(&self, mapping: &ProbabilityMapping) -> Result<Vec<u64>> {
        let mut aligned: Vec<Option<u64>> = vec![None; mapping.len()];
        for (token, count) in self.iter() {
            let i = mapping
                .position(token)
                .ok_or_else(|| Error::VocabularyMismatch {
                    token: token.clone(),
                    kind: MismatchKind::Unknown,
                })?;
            aligned[i] = Some(count);
        }

        mapping
            .tokens()
            .zip(aligned)
            .map(|(token, count)| {
                count.ok_or_else(|| Error::VocabularyMismatch {
                    token: token.clone(),
                    kind: MismatchKind::Missing,
                })
            })
            .collect()
    }
}

impl TryFrom<Vec<(Token, u64)>> for Observation {
    type Error = Error;

    fn try_from(counts: Vec<(Token, u64)>) -> Result<Self> {
        let mut observation = Self::new();
        for (token, count) in counts {
            if observation.insert(token.clone(), count).is_some() {
                return Err(Error::InvalidSample(format!(
                    "word '{token}' is given more than once"
                )));
            }
        }
        Ok(observation)
    }
}

impl From<Observation> for Vec<(Token, u64)> {
    fn from(observation: Observation) -> Self {
        observation.counts
    }
}

impl<T: Into<Token>> FromIterator<(T, u64)> for Observation {
    fn from_iter<I: IntoIterator<Item = (T, u64)>>(iter: I) -> Self {
        let mut observation = Self::new();
        for (token, count) in iter {
            observation.insert(token, count);
        }
        observation
    }
}

/// Parses a single observed count for `token`.
///
/// Accepts a non-negative integer, surrounding whitespace allowed.
pub fn parse_count(token: &Token, input: &str) -> Result<u64> {
    input
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::InvalidObservation {
            token: token.clone(),
            value: input.trim().to_string(),
        })
}

/// Parses a sample written as `word=count` pairs separated by commas,
/// e.g. `"cat=2, dog=0"`. Words are lower-cased.
pub fn parse_sample(input: &str) -> Result<Observation> {
    let (_, pairs) = all_consuming(sample).parse(input).map_err(|_| {
        Error::InvalidSample(format!("expected word=count pairs, got {input:?}"))
    })?;

    let mut observation = Observation::new();
    for (word, value) in pairs {
        let token = Token::new(word.to_lowercase());
        let count = parse_count(&token, value)?;
        if observation.insert(token.clone(), count).is_some() {
            return Err(Error::InvalidSample(format!(
                "word '{token}' is given more than once"
            )));
        }
    }
    Ok(observation)
}

fn sample(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    delimited(
        multispace0,
        separated_list0(delimited(multispace0, char(','), multispace0), entry),
        multispace0,
    )
    .parse(input)
}

fn entry(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(word, delimited(multispace0, char('='), multispace0), value).parse(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == '=' || c == ',' || c.is_whitespace()).parse(input)
}

fn value(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == ',' || c.is_whitespace()).parse(input)
}
