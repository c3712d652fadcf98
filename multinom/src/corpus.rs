use std::borrow::Borrow;

use derive_more::{Deref, Display, From, Into};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A case-normalized word. Equality is exact string match.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    From,
    Into,
    Deref,
)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(word: impl Into<String>) -> Self {
        Self(word.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(word: &str) -> Self {
        Self(word.to_string())
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lower-cases `text` and splits it on whitespace.
pub fn tokenize(text: &str) -> Vec<Token> {
    text.to_lowercase()
        .split_whitespace()
        .map(Token::from)
        .collect()
}

/// Words excluded from counting.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StopwordSet {
    words: FxHashSet<Token>,
}

impl StopwordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from whitespace-delimited text, lower-casing it first.
    pub fn from_text(text: &str) -> Self {
        tokenize(text).into_iter().collect()
    }

    pub fn insert(&mut self, word: impl Into<Token>) -> bool {
        self.words.insert(word.into())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl FromIterator<Token> for StopwordSet {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self {
            words: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for StopwordSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(Token::from).collect()
    }
}
