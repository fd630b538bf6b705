//! GPT-2 byte-level BPE tokenizer loaded from pretrained vocabulary files
//!
//! Text is split with the GPT-2 pre-tokenization rules, every byte of a piece
//! is mapped to a printable character through [`bytes_to_unicode`], and the
//! ranked merges are applied lowest rank first. Ids therefore match the
//! embedding rows of a pretrained GPT-2 checkpoint.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::error::{Result, TokenizerError};
use super::traits::{TokenId, Tokenizer};

/// End-of-text marker shared by every GPT-2 checkpoint
pub const END_OF_TEXT: &str = "<|endoftext|>";

/// Byte to printable character table used by GPT-2 vocabularies
///
/// Printable Latin-1 bytes map to themselves. The other 68 bytes are shifted
/// to `U+0100` onwards in byte order, so a space becomes `Ġ` and a newline `Ċ`.
pub fn bytes_to_unicode() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut shifted = 0u32;
    for b in 0..=255u8 {
        let printable = matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF);
        table[b as usize] = if printable {
            char::from(b)
        } else {
            let c = char::from_u32(256 + shifted).unwrap_or(char::REPLACEMENT_CHARACTER);
            shifted += 1;
            c
        };
    }
    table
}

/// `tokenizer.json` as written by HuggingFace `tokenizers`
#[derive(Debug, Deserialize)]
struct TokenizerFile {
    model: BpeModelFile,
    #[serde(default)]
    added_tokens: Vec<AddedToken>,
}

#[derive(Debug, Deserialize)]
struct BpeModelFile {
    vocab: HashMap<String, TokenId>,
    #[serde(default)]
    merges: Vec<MergeEntry>,
}

/// Older files join a merge with a space, newer ones store a pair
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MergeEntry {
    Joined(String),
    Pair(String, String),
}

#[derive(Debug, Deserialize)]
struct AddedToken {
    id: TokenId,
    content: String,
}

fn split_merge(line: &str, lineno: usize) -> Result<(String, String)> {
    line.split_once(' ')
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .ok_or_else(|| {
            TokenizerError::Serialization(format!("merge {lineno} is not a token pair: {line:?}"))
        })
}

/// Byte-level BPE with a fixed pretrained vocabulary
#[derive(Debug, Clone)]
pub struct BpeTokenizer {
    encoder: HashMap<String, TokenId>,
    decoder: HashMap<TokenId, String>,
    merge_ranks: HashMap<(String, String), usize>,
    /// Matched verbatim before pre-tokenization, longest first
    special_tokens: Vec<(String, TokenId)>,
    byte_encoder: [char; 256],
    byte_decoder: HashMap<char, u8>,
}

impl BpeTokenizer {
    /// Build from a token→id map and merges in rank order
    ///
    /// [`END_OF_TEXT`] is treated as a special token when the vocabulary has it.
    pub fn from_parts(vocab: HashMap<String, TokenId>, merges: Vec<(String, String)>) -> Self {
        let byte_encoder = bytes_to_unicode();
        let byte_decoder = byte_encoder
            .iter()
            .enumerate()
            .map(|(b, &c)| (c, b as u8))
            .collect();
        let decoder = vocab.iter().map(|(t, &id)| (id, t.clone())).collect();
        let merge_ranks = merges.into_iter().enumerate().map(|(rank, pair)| (pair, rank)).collect();

        let mut tokenizer = Self {
            encoder: vocab,
            decoder,
            merge_ranks,
            special_tokens: Vec::new(),
            byte_encoder,
            byte_decoder,
        };
        if let Some(id) = tokenizer.token_to_id(END_OF_TEXT) {
            tokenizer.add_special_token(END_OF_TEXT, id);
        }
        tokenizer
    }

    /// Load the `vocab.json` and `merges.txt` pair shipped with GPT-2 checkpoints
    ///
    /// # Errors
    /// IO failures, malformed JSON and merge lines that are not a token pair.
    pub fn from_files(vocab_path: impl AsRef<Path>, merges_path: impl AsRef<Path>) -> Result<Self> {
        let vocab_json = fs::read_to_string(vocab_path.as_ref())?;
        let vocab: HashMap<String, TokenId> = serde_json::from_str(&vocab_json)
            .map_err(|e| TokenizerError::Serialization(format!("Failed to parse vocab JSON: {e}")))?;

        let merges_txt = fs::read_to_string(merges_path.as_ref())?;
        let merges = merges_txt
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.is_empty() && !line.starts_with("#version"))
            .map(|(i, line)| split_merge(line, i + 1))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_parts(vocab, merges))
    }

    /// Load a HuggingFace `tokenizer.json` file
    ///
    /// # Errors
    /// IO failures and files that do not describe a BPE model.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Parse HuggingFace `tokenizer.json` content
    ///
    /// Every entry of `added_tokens` joins the vocabulary as a special token.
    ///
    /// # Errors
    /// [`TokenizerError::Serialization`] when parsing fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: TokenizerFile = serde_json::from_str(json).map_err(|e| {
            TokenizerError::Serialization(format!("Failed to parse tokenizer JSON: {e}"))
        })?;

        let merges = file
            .model
            .merges
            .into_iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                MergeEntry::Joined(line) => split_merge(&line, i + 1),
                MergeEntry::Pair(a, b) => Ok((a, b)),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut tokenizer = Self::from_parts(file.model.vocab, merges);
        for added in file.added_tokens {
            tokenizer.encoder.insert(added.content.clone(), added.id);
            tokenizer.decoder.insert(added.id, added.content.clone());
            tokenizer.add_special_token(&added.content, added.id);
        }
        Ok(tokenizer)
    }

    /// Load from a checkpoint directory
    ///
    /// `tokenizer.json` is preferred over `vocab.json` with `merges.txt`.
    ///
    /// # Errors
    /// [`TokenizerError::MissingFiles`] when neither layout is present.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let tokenizer_json = dir.join("tokenizer.json");
        if tokenizer_json.is_file() {
            return Self::from_file(tokenizer_json);
        }
        let (vocab, merges) = (dir.join("vocab.json"), dir.join("merges.txt"));
        if vocab.is_file() && merges.is_file() {
            return Self::from_files(vocab, merges);
        }
        Err(TokenizerError::MissingFiles(dir.display().to_string()))
    }

    fn add_special_token(&mut self, token: &str, id: TokenId) {
        if token.is_empty() || self.special_tokens.iter().any(|(t, _)| t == token) {
            return;
        }
        self.special_tokens.push((token.to_string(), id));
        self.special_tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    pub fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.encoder.get(token).copied()
    }

    pub fn id_to_token(&self, id: TokenId) -> Option<&str> {
        self.decoder.get(&id).map(String::as_str)
    }

    /// Id of [`END_OF_TEXT`], if the vocabulary has it
    pub fn eos_id(&self) -> Option<TokenId> {
        self.token_to_id(END_OF_TEXT)
    }

    /// Apply merges to one byte-mapped piece until no ranked pair remains
    fn bpe(&self, piece: &str) -> Vec<String> {
        let mut parts: Vec<String> = piece.chars().map(String::from).collect();
        while parts.len() > 1 {
            let best = parts
                .windows(2)
                .filter_map(|w| self.merge_ranks.get(&(w[0].clone(), w[1].clone())))
                .min()
                .copied();
            let Some(rank) = best else { break };

            let mut merged = Vec::with_capacity(parts.len());
            let mut iter = std::mem::take(&mut parts).into_iter().peekable();
            while let Some(left) = iter.next() {
                let joins = iter
                    .peek()
                    .is_some_and(|right| self.merge_ranks.get(&(left.clone(), right.clone())) == Some(&rank));
                match iter.next_if(|_| joins) {
                    Some(right) => merged.push(left + &right),
                    None => merged.push(left),
                }
            }
            parts = merged;
        }
        parts
    }

    fn encode_text(&self, text: &str, ids: &mut Vec<TokenId>) -> Result<()> {
        for piece in pre_tokenize(text) {
            let mapped: String = piece.bytes().map(|b| self.byte_encoder[b as usize]).collect();
            for token in self.bpe(&mapped) {
                match self.encoder.get(&token) {
                    Some(&id) => ids.push(id),
                    None => return Err(TokenizerError::UnknownToken(token)),
                }
            }
        }
        Ok(())
    }
}

impl Tokenizer for BpeTokenizer {
    /// The vocabulary is fixed by the checkpoint, so training does nothing
    fn train(&mut self, _corpus: &[&str]) -> Result<()> {
        Ok(())
    }

    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let mut ids = Vec::new();
        let mut rest = text;
        // Earliest special token wins; on a tie the longer one, since the list is longest first
        while let Some((pos, token, id)) = self
            .special_tokens
            .iter()
            .filter_map(|(t, id)| rest.find(t.as_str()).map(|pos| (pos, t, *id)))
            .min_by_key(|(pos, _, _)| *pos)
        {
            self.encode_text(&rest[..pos], &mut ids)?;
            ids.push(id);
            rest = &rest[pos + token.len()..];
        }
        self.encode_text(rest, &mut ids)?;
        Ok(ids)
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String> {
        let mut bytes = Vec::new();
        for &id in ids {
            let token = self.decoder.get(&id).ok_or(TokenizerError::InvalidTokenId(id))?;
            for c in token.chars() {
                match self.byte_decoder.get(&c) {
                    Some(&b) => bytes.push(b),
                    None => bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
                }
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn vocab_size(&self) -> usize {
        self.encoder.len()
    }

    fn is_trained(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Letter,
    Number,
    Other,
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_alphabetic() {
            Self::Letter
        } else if c.is_numeric() {
            Self::Number
        } else {
            Self::Other
        }
    }
}

/// Length in chars of an English contraction suffix after an apostrophe
fn contraction_len(after: &[(usize, char)]) -> Option<usize> {
    let next = |i: usize| after.get(i).map(|&(_, c)| c);
    match (next(0), next(1)) {
        (Some('r'), Some('e')) | (Some('v'), Some('e')) | (Some('l'), Some('l')) => Some(2),
        (Some('s' | 't' | 'm' | 'd'), _) => Some(1),
        _ => None,
    }
}

/// Split text the way GPT-2's pre-tokenization pattern does
///
/// Pieces are contractions (`'s`, `'t`, `'re`, `'ve`, `'m`, `'ll`, `'d`), runs
/// of letters, digits or other symbols with at most one leading space, and
/// whitespace runs. A whitespace run followed by text leaves its last
/// character to lead the next piece.
fn pre_tokenize(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let offset = |i: usize| chars.get(i).map_or(text.len(), |&(pos, _)| pos);
    let is_space_at = |i: usize| chars.get(i).is_some_and(|&(_, c)| c.is_whitespace());

    let mut pieces = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let start = i;
        let c = chars[i].1;

        if c == '\'' {
            if let Some(len) = contraction_len(&chars[i + 1..]) {
                i += 1 + len;
                pieces.push(&text[offset(start)..offset(i)]);
                continue;
            }
        }

        let leads_word = c == ' ' && i + 1 < chars.len() && !is_space_at(i + 1);
        if leads_word || !c.is_whitespace() {
            let first = if leads_word { i + 1 } else { i };
            let class = CharClass::of(chars[first].1);
            i = first + 1;
            while i < chars.len() && !is_space_at(i) && CharClass::of(chars[i].1) == class {
                i += 1;
            }
        } else {
            while is_space_at(i) {
                i += 1;
            }
            if i < chars.len() && i - start > 1 {
                i -= 1;
            }
        }
        pieces.push(&text[offset(start)..offset(i)]);
    }
    pieces
}
