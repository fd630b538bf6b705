//! Tokenization for text corpora
//!
//! [`CharTokenizer`] fits a vocabulary to the training text for randomly
//! initialized models. [`BpeTokenizer`] loads the GPT-2 vocabulary that
//! pretrained weights were trained with.
//!
//! # Example
//!
//! ```
//! use rango::tokenizer::{CharTokenizer, Tokenizer};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tokenizer = CharTokenizer::new().with_max_vocab(64);
//!     tokenizer.train(&["hello world", "hello there"])?;
//!
//!     let tokens = tokenizer.encode("hello world")?;
//!     assert_eq!(tokenizer.decode(&tokens)?, "hello world");
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

mod bpe;
mod char;
mod error;
mod traits;

pub use bpe::{bytes_to_unicode, BpeTokenizer, END_OF_TEXT};
pub use char::CharTokenizer;
pub use error::{Result, TokenizerError};
pub use traits::{TokenId, Tokenizer};
