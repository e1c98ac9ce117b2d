//! Per-field term dictionary.
//!
//! Tokens are stored in an [`fst::Map`], a minimized prefix trie, whose value
//! for each token indexes an address table of postings [`BlockInfo`]s.
//!
//! ## File layout
//!
//! ```text
//! [u32 magic][u32 format][u32 n][n * (u64 offset, u32 length)][fst bytes]
//! ```

use std::collections::BTreeMap;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use fst::automaton::{Automaton, Levenshtein, Str};
use fst::{IntoStreamer, Map, MapBuilder, Streamer};

use crate::error::{Result, TesseraError};
use crate::lexical::core::term::{BlockInfo, Word};

const TRIE_MAGIC: u32 = 0x4952_5454; // "TTRI"
const TRIE_FORMAT: u32 = 1;
const HEADER_LEN: usize = 12;
const ADDRESS_LEN: usize = 12;
/// Largest edit automaton built before falling back to a dictionary scan.
const LEVENSHTEIN_STATE_LIMIT: usize = 100_000;

/// Read-only term dictionary for one field of one segment.
pub struct TermTrie {
    map: Map<Vec<u8>>,
    addresses: Vec<BlockInfo>,
}

impl std::fmt::Debug for TermTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermTrie")
            .field("terms", &self.map.len())
            .finish()
    }
}

impl TermTrie {
    /// Parse a dictionary from its serialized bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(TesseraError::index("term dictionary truncated"));
        }
        if LittleEndian::read_u32(&bytes[0..4]) != TRIE_MAGIC {
            return Err(TesseraError::index("not a term dictionary"));
        }
        let format = LittleEndian::read_u32(&bytes[4..8]);
        if format != TRIE_FORMAT {
            return Err(TesseraError::index(format!(
                "unsupported term dictionary format {format}"
            )));
        }

        let count = LittleEndian::read_u32(&bytes[8..12]) as usize;
        let table_end = HEADER_LEN + count * ADDRESS_LEN;
        if bytes.len() < table_end {
            return Err(TesseraError::index("term dictionary address table truncated"));
        }

        let addresses = bytes[HEADER_LEN..table_end]
            .chunks_exact(ADDRESS_LEN)
            .map(|chunk| {
                BlockInfo::new(
                    LittleEndian::read_u64(&chunk[0..8]),
                    LittleEndian::read_u32(&chunk[8..12]),
                )
            })
            .collect();

        let map = Map::new(bytes[table_end..].to_vec())?;
        Ok(TermTrie { map, addresses })
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the dictionary holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Exact lookup.
    pub fn is_word(&self, token: &str) -> Result<Option<Word>> {
        match self.map.get(token) {
            Some(index) => Ok(Some(Word::resolved(token, self.address(index)?))),
            None => Ok(None),
        }
    }

    /// Every token that begins with `prefix`, in dictionary order.
    pub fn starts_with(&self, prefix: &str) -> Result<Vec<Word>> {
        let automaton = Str::new(prefix).starts_with();
        self.collect(self.map.search(automaton).into_stream())
    }

    /// Every token within `max_edits` Levenshtein edits of `token`.
    ///
    /// Budgets whose automaton would grow past [`LEVENSHTEIN_STATE_LIMIT`]
    /// states are answered by scanning the dictionary instead.
    pub fn semantically_near(&self, token: &str, max_edits: u32) -> Result<Vec<Word>> {
        match Levenshtein::new_with_limit(token, max_edits, LEVENSHTEIN_STATE_LIMIT) {
            Ok(automaton) => self.collect(self.map.search(automaton).into_stream()),
            Err(e) => {
                log::debug!(
                    target: "tessera",
                    "scanning dictionary for '{token}' at distance {max_edits}: {e}"
                );
                self.scan_near(token, max_edits)
            }
        }
    }

    fn scan_near(&self, token: &str, max_edits: u32) -> Result<Vec<Word>> {
        let query: Vec<char> = token.chars().collect();
        let mut stream = self.map.stream();
        let mut words = Vec::new();
        while let Some((key, index)) = stream.next() {
            let value = std::str::from_utf8(key)
                .map_err(|_| TesseraError::index("non UTF-8 token in term dictionary"))?;
            if within_edits(&query, value, max_edits as usize) {
                words.push(Word::resolved(value, self.address(index)?));
            }
        }
        Ok(words)
    }

    fn collect<S>(&self, mut stream: S) -> Result<Vec<Word>>
    where
        S: for<'a> Streamer<'a, Item = (&'a [u8], u64)>,
    {
        let mut words = Vec::new();
        while let Some((key, index)) = stream.next() {
            let value = std::str::from_utf8(key)
                .map_err(|_| TesseraError::index("non UTF-8 token in term dictionary"))?;
            words.push(Word::resolved(value, self.address(index)?));
        }
        Ok(words)
    }

    fn address(&self, index: u64) -> Result<BlockInfo> {
        self.addresses
            .get(index as usize)
            .copied()
            .ok_or_else(|| TesseraError::index(format!("address {index} missing from dictionary")))
    }
}

/// Whether `candidate` is at most `max_edits` character insertions,
/// deletions or substitutions away from `query`.
fn within_edits(query: &[char], candidate: &str, max_edits: usize) -> bool {
    let candidate: Vec<char> = candidate.chars().collect();
    if query.len().abs_diff(candidate.len()) > max_edits {
        return false;
    }

    let mut previous: Vec<usize> = (0..=candidate.len()).collect();
    let mut current = vec![0; candidate.len() + 1];
    for (i, q) in query.iter().enumerate() {
        current[0] = i + 1;
        for (j, c) in candidate.iter().enumerate() {
            let substitution = previous[j] + usize::from(q != c);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        if current.iter().all(|&d| d > max_edits) {
            return false;
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[candidate.len()] <= max_edits
}

/// Collects `(token, address)` pairs and serializes them as a [`TermTrie`].
#[derive(Debug, Default)]
pub struct TermTrieBuilder {
    terms: BTreeMap<String, BlockInfo>,
}

impl TermTrieBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        TermTrieBuilder::default()
    }

    /// Register a token. A token inserted twice keeps the last address.
    pub fn insert<S: Into<String>>(&mut self, token: S, address: BlockInfo) {
        self.terms.insert(token.into(), address);
    }

    /// Serialize the dictionary.
    pub fn build(self) -> Result<Vec<u8>> {
        let count = u32::try_from(self.terms.len())
            .map_err(|_| TesseraError::invalid_argument("too many terms for one dictionary"))?;

        let mut out = Vec::with_capacity(HEADER_LEN + self.terms.len() * ADDRESS_LEN);
        out.write_u32::<LittleEndian>(TRIE_MAGIC)?;
        out.write_u32::<LittleEndian>(TRIE_FORMAT)?;
        out.write_u32::<LittleEndian>(count)?;

        let mut builder = MapBuilder::memory();
        for (index, (token, address)) in self.terms.into_iter().enumerate() {
            out.write_u64::<LittleEndian>(address.offset)?;
            out.write_u32::<LittleEndian>(address.length)?;
            builder.insert(token.as_bytes(), index as u64)?;
        }

        out.extend_from_slice(&builder.into_inner()?);
        Ok(out)
    }
}
