//! Terms, words and postings addresses.

use serde::{Deserialize, Serialize};

/// Location of one postings block inside a segment's postings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Byte offset of the block within the postings file.
    pub offset: u64,
    /// Length of the block in bytes, header included.
    pub length: u32,
}

impl BlockInfo {
    /// Create a new block address.
    pub fn new(offset: u64, length: u32) -> Self {
        BlockInfo { offset, length }
    }

    /// Exclusive end offset of the block.
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }
}

/// The address a dictionary entry resolves to.
pub type PostingsAddress = BlockInfo;

/// A dictionary token, with its postings address once a lookup has resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word {
    /// The token text.
    pub value: String,
    /// Set only by a successful dictionary lookup.
    pub postings_address: Option<PostingsAddress>,
}

impl Word {
    /// A bare token that has not been looked up.
    pub fn new<S: Into<String>>(value: S) -> Self {
        Word {
            value: value.into(),
            postings_address: None,
        }
    }

    /// A token resolved to a postings block.
    pub fn resolved<S: Into<String>>(value: S, address: PostingsAddress) -> Self {
        Word {
            value: value.into(),
            postings_address: Some(address),
        }
    }
}

/// A `(field, word)` pair identifying one dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    /// Field the word was indexed under.
    pub field: String,
    /// The word itself.
    pub word: Word,
}

impl Term {
    /// Create a new term.
    pub fn new<F: Into<String>>(field: F, word: Word) -> Self {
        Term {
            field: field.into(),
            word,
        }
    }
}
