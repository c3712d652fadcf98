use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

use crate::{
    corpus::{StopwordSet, Token},
    error::{Error, Result},
};

/// Number of most frequent words kept when no support size is given.
pub const DEFAULT_SUPPORT_SIZE: usize = 10;

/// How far the estimated probabilities may sum away from one.
pub const SUM_TOLERANCE: f64 = 1e-12;

/// Occurrence counts of every non-stopword token, in first-occurrence order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<(Token, u64)>,
    index: FxHashMap<Token, usize>,
}

impl FrequencyTable {
    /// Counts every token of `tokens` that is not a stopword.
    pub fn count<'a, I>(tokens: I, stopwords: &StopwordSet) -> Self
    where
        I: IntoIterator<Item = &'a Token>,
    {
        tokens
            .into_iter()
            .filter(|token| !stopwords.contains(token))
            .fold(Self::default(), Self::record)
    }

    fn record(mut self, token: &Token) -> Self {
        match self.index.get(token.as_str()) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(token.clone(), self.entries.len());
                self.entries.push((token.clone(), 1));
            }
        }
        self
    }

    pub fn get(&self, token: &str) -> Option<u64> {
        self.index.get(token).map(|&i| self.entries[i].1)
    }

    /// Number of tokens counted.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Number of distinct tokens counted.
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, u64)> {
        self.entries.iter().map(|(token, count)| (token, *count))
    }

    /// Selects the `k` most frequent tokens, most frequent first.
    ///
    /// Ties are broken by a stable ascending sort on count followed by taking
    /// entries from the back, so among equal counts the token that first
    /// appeared later in the corpus is selected first.
    pub fn top_k(&self, k: usize) -> Result<Vec<(Token, u64)>> {
        if k == 0 {
            return Err(Error::InvalidSupportSize(k));
        }
        if self.distinct() < k {
            return Err(Error::InsufficientVocabulary {
                requested: k,
                available: self.distinct(),
            });
        }

        let mut ranked: Vec<&(Token, u64)> = self.entries.iter().collect();
        ranked.sort_by_key(|(_, count)| *count);

        Ok(ranked.into_iter().rev().take(k).cloned().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordProbability {
    pub token: Token,
    pub probability: f64,
}

/// An ordered, immutable mapping from the selected words to their probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<WordProbability>", try_from = "Vec<WordProbability>")]
pub struct ProbabilityMapping {
    entries: Vec<WordProbability>,
    index: FxHashMap<Token, usize>,
}

impl ProbabilityMapping {
    /// Normalizes `selected` counts by their own total.
    ///
    /// Unselected words are outside the support, so they do not contribute to
    /// the denominator.
    pub fn from_counts(selected: Vec<(Token, u64)>) -> Self {
        let total: u64 = selected.iter().map(|(_, count)| count).sum();
        let entries = selected
            .into_iter()
            .map(|(token, count)| WordProbability {
                token,
                probability: if total > 0 {
                    count as f64 / total as f64
                } else {
                    0.0
                },
            })
            .collect();
        Self::with_index(entries)
    }

    /// Builds a mapping from explicit probabilities, in the given order.
    ///
    /// Each probability must be finite and within `[0, 1]`, and no word may
    /// repeat. The sum is not checked here; see [`ProbabilityMapping::validate`].
    pub fn from_probabilities<I, T>(probabilities: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, f64)>,
        T: Into<Token>,
    {
        let entries = probabilities
            .into_iter()
            .map(|(token, probability)| WordProbability {
                token: token.into(),
                probability,
            })
            .collect::<Vec<_>>();
        Self::try_from(entries)
    }

    fn with_index(entries: Vec<WordProbability>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.token.clone(), i))
            .collect();
        Self { entries, index }
    }

    pub fn get(&self, token: &str) -> Option<f64> {
        self.index.get(token).map(|&i| self.entries[i].probability)
    }

    /// Position of `token` in selection order.
    pub fn position(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WordProbability> {
        self.entries.iter()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.entries.iter().map(|entry| &entry.token)
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.entries.iter().map(|entry| entry.probability).collect()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|entry| entry.probability).sum()
    }

    /// Checks that the mapping has exactly `k` entries, no negative
    /// probabilities, and sums to one within [`SUM_TOLERANCE`].
    pub fn validate(&self, k: usize) -> Result<()> {
        if self.len() != k {
            return Err(Error::InvariantViolation(format!(
                "expected {k} probabilities, found {}",
                self.len()
            )));
        }
        if let Some(entry) = self.entries.iter().find(|entry| entry.probability < 0.0) {
            return Err(Error::InvariantViolation(format!(
                "probability of '{}' is negative ({})",
                entry.token, entry.probability
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(Error::InvariantViolation(format!(
                "probabilities sum to {sum}, not 1"
            )));
        }
        Ok(())
    }

    /// Writes one `p_i  word  probability` line per entry, probabilities to
    /// five decimal places.
    pub fn pretty_print(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        let word_cells = self
            .tokens()
            .map(|token| token.as_str().width())
            .max()
            .unwrap_or(0);
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(
                f,
                "p_{}\t{}\t{:.5}",
                i + 1,
                pad_cells(entry.token.as_str(), word_cells),
                entry.probability
            )?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ProbabilityMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.pretty_print(f)
    }
}

impl TryFrom<Vec<WordProbability>> for ProbabilityMapping {
    type Error = Error;

    fn try_from(entries: Vec<WordProbability>) -> Result<Self> {
        for (index, entry) in entries.iter().enumerate() {
            let value = entry.probability;
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidProbability { index, value });
            }
        }
        let mapping = Self::with_index(entries);
        if mapping.index.len() != mapping.entries.len() {
            return Err(Error::InvariantViolation(
                "a word appears more than once".to_string(),
            ));
        }
        Ok(mapping)
    }
}

impl From<ProbabilityMapping> for Vec<WordProbability> {
    fn from(mapping: ProbabilityMapping) -> Self {
        mapping.entries
    }
}

fn pad_cells(s: &str, field_cells: usize) -> String {
    let pad = field_cells.saturating_sub(s.width());
    format!("{s}{}", " ".repeat(pad))
}

/// Estimates a multinomial distribution over the `k` most frequent
/// non-stopword tokens by maximum likelihood.
pub fn estimate<'a, I>(
    tokens: I,
    stopwords: &StopwordSet,
    k: usize,
) -> Result<ProbabilityMapping>
where
    I: IntoIterator<Item = &'a Token>,
{
    if k == 0 {
        return Err(Error::InvalidSupportSize(k));
    }
    let table = FrequencyTable::count(tokens, stopwords);
    log::debug!(
        "Counted {} tokens over {} distinct words",
        table.total(),
        table.distinct()
    );

    let selected = table.top_k(k)?;
    log::debug!(
        "Selected {} words covering {} occurrences",
        selected.len(),
        selected.iter().map(|(_, count)| count).sum::<u64>()
    );

    Ok(ProbabilityMapping::from_counts(selected))
}

#[cfg(test)]
mod tests {
    use statrs::assert_almost_eq;

    use super::*;
    use crate::corpus::tokenize;

    const CORPUS: &str = "the cat sat on the mat the cat ran \
                          a dog sat on a log and the dog ran far";

    fn stopwords() -> StopwordSet {
        StopwordSet::from_text("the a on and")
    }

    #[test]
    fn test_frequency_table() {
        let tokens = tokenize(CORPUS);
        let table = FrequencyTable::count(&tokens, &stopwords());

        assert_eq!(table.get("cat"), Some(2));
        assert_eq!(table.get("sat"), Some(2));
        assert_eq!(table.get("far"), Some(1));
        assert_eq!(table.get("the"), None);
        assert_eq!(table.distinct(), 7);

        let eligible = tokens
            .iter()
            .filter(|token| !stopwords().contains(token))
            .count() as u64;
        assert_eq!(table.total(), eligible);

        let first_seen: Vec<&str> = table.iter().map(|(token, _)| token.as_str()).collect();
        assert_eq!(
            first_seen,
            vec!["cat", "sat", "mat", "ran", "dog", "log", "far"]
        );
    }

    #[test]
    fn test_top_k_tie_break() -> anyhow::Result<()> {
        // counts: b=3, a=2, c=2, d=1; "c" first appears after "a"
        let tokens = tokenize("a b c b a b c d");
        let table = FrequencyTable::count(&tokens, &StopwordSet::new());

        let top = table.top_k(3)?;
        let words: Vec<&str> = top.iter().map(|(token, _)| token.as_str()).collect();
        assert_eq!(words, vec!["b", "c", "a"]);
        assert_eq!(top.iter().map(|(_, c)| *c).collect::<Vec<_>>(), vec![3, 2, 2]);

        let top = table.top_k(2)?;
        let words: Vec<&str> = top.iter().map(|(token, _)| token.as_str()).collect();
        assert_eq!(words, vec!["b", "c"]);
        Ok(())
    }

    #[test]
    fn test_top_k_errors() {
        let tokens = tokenize("x y z x");
        let table = FrequencyTable::count(&tokens, &StopwordSet::new());
        assert_eq!(table.top_k(0), Err(Error::InvalidSupportSize(0)));
        assert_eq!(
            table.top_k(4),
            Err(Error::InsufficientVocabulary {
                requested: 4,
                available: 3
            })
        );
        assert!(table.top_k(3).is_ok());
    }

    #[test]
    fn test_estimate() -> anyhow::Result<()> {
        let tokens = tokenize(CORPUS);
        let mapping = estimate(&tokens, &stopwords(), 4)?;

        mapping.validate(4)?;
        assert_eq!(mapping.len(), 4);
        // cat, sat, ran and dog all occur twice; later first occurrence wins
        let words: Vec<&str> = mapping.tokens().map(Token::as_str).collect();
        assert_eq!(words, vec!["dog", "ran", "sat", "cat"]);
        for entry in mapping.iter() {
            assert_almost_eq!(entry.probability, 0.25, 1e-15);
        }
        assert!(!mapping.contains("mat"));
        Ok(())
    }

    #[test]
    fn test_estimate_normalizes_over_selection() -> anyhow::Result<()> {
        let tokens = tokenize("a a a b b c");
        let mapping = estimate(&tokens, &StopwordSet::new(), 2)?;
        assert_almost_eq!(mapping.get("a").unwrap(), 0.6, 1e-15);
        assert_almost_eq!(mapping.get("b").unwrap(), 0.4, 1e-15);
        assert_eq!(mapping.get("c"), None);
        assert_eq!(mapping.position("a"), Some(0));
        mapping.validate(2)?;
        Ok(())
    }

    #[test]
    fn test_estimate_sums_to_one() -> anyhow::Result<()> {
        let text: String = (1..=40)
            .flat_map(|i| std::iter::repeat_n(format!("w{i}"), i * 7 % 13 + 1))
            .collect::<Vec<_>>()
            .join(" ");
        let tokens = tokenize(&text);
        for k in [1, 3, 10, 17, 40] {
            let mapping = estimate(&tokens, &StopwordSet::new(), k)?;
            assert_eq!(mapping.len(), k);
            assert!(mapping.iter().all(|entry| entry.probability >= 0.0));
            assert!((mapping.sum() - 1.0).abs() <= SUM_TOLERANCE);
        }
        Ok(())
    }

    #[test]
    fn test_estimate_monotonic() -> anyhow::Result<()> {
        let tokens = tokenize("e d d c c c b b b b a a a a a f");
        let table = FrequencyTable::count(&tokens, &StopwordSet::new());
        let mapping = estimate(&tokens, &StopwordSet::new(), 5)?;
        for x in mapping.iter() {
            for y in mapping.iter() {
                if table.get(&x.token) > table.get(&y.token) {
                    assert!(x.probability >= y.probability);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_estimate_excludes_stopwords() -> anyhow::Result<()> {
        let tokens = tokenize("the the the the cat the dog the");
        let stopwords = StopwordSet::from_text("the");
        let mapping = estimate(&tokens, &stopwords, 2)?;
        assert!(!mapping.contains("the"));
        assert_eq!(
            estimate(&tokens, &stopwords, 3),
            Err(Error::InsufficientVocabulary {
                requested: 3,
                available: 2
            })
        );
        Ok(())
    }

    #[test]
    fn test_estimate_errors() {
        let tokens = tokenize("only words here");
        assert_eq!(
            estimate(&tokens, &StopwordSet::new(), 0),
            Err(Error::InvalidSupportSize(0))
        );
        assert_eq!(
            estimate(&Vec::new(), &StopwordSet::new(), 1),
            Err(Error::InsufficientVocabulary {
                requested: 1,
                available: 0
            })
        );
    }

    #[test]
    fn test_estimate_deterministic() -> anyhow::Result<()> {
        let tokens = tokenize(CORPUS);
        let first = estimate(&tokens, &stopwords(), 6)?;
        let second = estimate(&tokens, &stopwords(), 6)?;
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_validate() -> anyhow::Result<()> {
        let mapping = ProbabilityMapping::from_probabilities([("a", 0.5), ("b", 0.5)])?;
        assert!(mapping.validate(2).is_ok());
        assert!(matches!(
            mapping.validate(3),
            Err(Error::InvariantViolation(_))
        ));

        let mapping = ProbabilityMapping::from_probabilities([("a", 0.5), ("b", 0.4)])?;
        assert!(matches!(
            mapping.validate(2),
            Err(Error::InvariantViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_from_probabilities_rejects_invalid() {
        assert_eq!(
            ProbabilityMapping::from_probabilities([("a", 0.5), ("b", -0.1)]),
            Err(Error::InvalidProbability {
                index: 1,
                value: -0.1
            })
        );
        assert!(matches!(
            ProbabilityMapping::from_probabilities([("a", f64::NAN)]),
            Err(Error::InvalidProbability { index: 0, .. })
        ));
        assert!(matches!(
            ProbabilityMapping::from_probabilities([("a", 0.5), ("a", 0.5)]),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_pretty_print() -> anyhow::Result<()> {
        let mapping =
            ProbabilityMapping::from_probabilities([("cat", 0.625), ("mouse", 0.375)])?;
        assert_eq!(
            mapping.to_string(),
            "p_1\tcat  \t0.62500\np_2\tmouse\t0.37500\n"
        );
        Ok(())
    }

    #[test]
    fn test_serde_roundtrip_keeps_lookup() -> anyhow::Result<()> {
        let tokens = tokenize(CORPUS);
        let mapping = estimate(&tokens, &stopwords(), 3)?;
        let json = serde_json::to_string(&mapping)?;
        let restored: ProbabilityMapping = serde_json::from_str(&json)?;
        assert_eq!(restored, mapping);
        assert_eq!(restored.get("dog"), mapping.get("dog"));

        let bad = r#"[{"token":"a","probability":1.5}]"#;
        assert!(serde_json::from_str::<ProbabilityMapping>(bad).is_err());
        Ok(())
    }
}
