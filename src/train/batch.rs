//! Token batches for causal language modeling

use crate::error::{Error, Result};

/// `batch_size` sequences of `seq_len` token ids, row-major
///
/// The batch is its own label: targets are the inputs shifted by one position
/// inside the loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBatch {
    input_ids: Vec<u32>,
    batch_size: usize,
    seq_len: usize,
}

impl TokenBatch {
    /// Create a batch from flat ids
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if `input_ids.len() != batch_size * seq_len`
    /// or either dimension is zero.
    pub fn new(input_ids: Vec<u32>, batch_size: usize, seq_len: usize) -> Result<Self> {
        if batch_size == 0 || seq_len == 0 {
            return Err(Error::InvalidArgument(format!(
                "batch dimensions must be positive, got {batch_size}x{seq_len}"
            )));
        }
        if input_ids.len() != batch_size * seq_len {
            return Err(Error::InvalidArgument(format!(
                "{} token ids do not form a {batch_size}x{seq_len} batch",
                input_ids.len()
            )));
        }
        Ok(Self {
            input_ids,
            batch_size,
            seq_len,
        })
    }

    /// Stack equal-length sequences
    pub fn from_sequences(sequences: &[Vec<u32>]) -> Result<Self> {
        let seq_len = sequences.first().map_or(0, Vec::len);
        if let Some(bad) = sequences.iter().find(|s| s.len() != seq_len) {
            return Err(Error::InvalidArgument(format!(
                "sequence of length {} in a batch of length {seq_len}",
                bad.len()
            )));
        }
        Self::new(sequences.concat(), sequences.len(), seq_len)
    }

    /// Cut a token stream into non-overlapping windows of `seq_len` and group
    /// them `batch_size` at a time
    ///
    /// The trailing partial window is dropped; the last batch may hold fewer
    /// than `batch_size` sequences.
    pub fn chunk_stream(tokens: &[u32], seq_len: usize, batch_size: usize) -> Result<Vec<Self>> {
        if seq_len == 0 || batch_size == 0 {
            return Err(Error::InvalidArgument(
                "seq_len and batch_size must be positive".into(),
            ));
        }
        let windows: Vec<Vec<u32>> = tokens.chunks_exact(seq_len).map(<[u32]>::to_vec).collect();
        windows.chunks(batch_size).map(Self::from_sequences).collect()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn input_ids(&self) -> &[u32] {
        &self.input_ids
    }

    /// Total token count
    pub fn num_tokens(&self) -> usize {
        self.input_ids.len()
    }
}
