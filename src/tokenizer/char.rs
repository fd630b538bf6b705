//! Character-level tokenizer implementation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::{Result, TokenizerError};
use super::traits::{TokenId, Tokenizer};

/// Character-level tokenizer
///
/// Ids are assigned by descending frequency, ties broken by code point, so a
/// corpus always yields the same vocabulary. Characters outside the
/// vocabulary are skipped when encoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharTokenizer {
    max_vocab: Option<usize>,
    lowercase: bool,
    vocab: HashMap<char, TokenId>,
    id_to_char: Vec<char>,
}

impl CharTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_vocab` of the most frequent characters
    pub fn with_max_vocab(mut self, max_vocab: usize) -> Self {
        self.max_vocab = Some(max_vocab);
        self
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    fn normalize(&self, text: &str) -> String {
        if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        }
    }
}

impl Tokenizer for CharTokenizer {
    fn train(&mut self, corpus: &[&str]) -> Result<()> {
        let mut counts: HashMap<char, usize> = HashMap::new();
        for text in corpus {
            for c in self.normalize(text).chars() {
                *counts.entry(c).or_insert(0) += 1;
            }
        }
        if counts.is_empty() {
            return Err(TokenizerError::Training("corpus contains no characters".into()));
        }

        let mut chars: Vec<(char, usize)> = counts.into_iter().collect();
        chars.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        chars.truncate(self.max_vocab.unwrap_or(usize::MAX));

        self.id_to_char = chars.into_iter().map(|(c, _)| c).collect();
        self.vocab = self
            .id_to_char
            .iter()
            .enumerate()
            .map(|(id, &c)| (c, id as TokenId))
            .collect();
        Ok(())
    }

    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        if !self.is_trained() {
            return Err(TokenizerError::NotTrained);
        }
        Ok(self
            .normalize(text)
            .chars()
            .filter_map(|c| self.vocab.get(&c).copied())
            .collect())
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String> {
        if !self.is_trained() {
            return Err(TokenizerError::NotTrained);
        }
        ids.iter()
            .map(|&id| {
                self.id_to_char
                    .get(id as usize)
                    .copied()
                    .ok_or(TokenizerError::InvalidTokenId(id))
            })
            .collect()
    }

    fn vocab_size(&self) -> usize {
        self.id_to_char.len()
    }

    fn is_trained(&self) -> bool {
        !self.id_to_char.is_empty()
    }
}
