//! Vocabulary of the review corpus.
//!
//! Words are identified by their frequency rank in the corpus, starting
//! at 1. Before a rank is fed to a model, [`INDEX_FROM`] is added to it,
//! so that the lowest indices are available for special tokens.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::SentimentError;

/// Index of the padding token.
pub const PAD_INDEX: i64 = 0;

/// Index of the token that marks the start of a review.
pub const START_INDEX: i64 = 1;

/// Index of out-of-vocabulary words.
pub const OOV_INDEX: i64 = 2;

/// Offset that is added to word ranks to obtain model indices.
pub const INDEX_FROM: i64 = 3;

/// Mapping between words and their ranks.
///
/// The forward mapping maps words to ranks, the reverse mapping ranks
/// to words. Both are constructed once and cannot be modified afterwards.
/// Construction guarantees that the reverse mapping is a true inverse of
/// the forward mapping and that no word uses the reserved rank 0.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(
    try_from = "HashMap<String, usize>",
    into = "HashMap<String, usize>"
)]
pub struct WordIndex {
    forward: HashMap<String, usize>,
    reverse: HashMap<usize, String>,
}

impl WordIndex {
    /// Construct a word index from a word to rank mapping.
    pub fn new(forward: HashMap<String, usize>) -> Result<Self, SentimentError> {
        let mut reverse = HashMap::with_capacity(forward.len());

        for (word, &rank) in &forward {
            if rank == 0 {
                return Err(SentimentError::ReservedRank(word.clone()));
            }

            if let Some(other) = reverse.insert(rank, word.clone()) {
                return Err(SentimentError::DuplicateRank {
                    rank,
                    first: other,
                    second: word.clone(),
                });
            }
        }

        Ok(WordIndex { forward, reverse })
    }

    /// Build a word index from a corpus.
    ///
    /// The most frequent word gets rank 1. Words with the same frequency
    /// are ranked in lexicographic order.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for word in words {
            let word = word.as_ref();
            match counts.get_mut(word) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(word.to_owned(), 1);
                }
            }
        }

        let forward: HashMap<_, _> = counts
            .into_iter()
            .sorted_by(|(word1, count1), (word2, count2)| {
                count2.cmp(count1).then_with(|| word1.cmp(word2))
            })
            .enumerate()
            .map(|(idx, (word, _))| (word, idx + 1))
            .collect();

        let reverse = forward
            .iter()
            .map(|(word, &rank)| (rank, word.clone()))
            .collect();

        WordIndex { forward, reverse }
    }

    /// Read a word index from a JSON object of words and ranks.
    pub fn from_json_read(read: impl Read) -> Result<Self, SentimentError> {
        let forward: HashMap<String, usize> = serde_json::from_reader(read).map_err(|err| {
            SentimentError::JSonSerialization("Cannot deserialize word index".to_string(), err)
        })?;
        Self::new(forward)
    }

    /// Open a JSON word index file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SentimentError> {
        let f = File::open(path)?;
        Self::from_json_read(BufReader::new(f))
    }

    /// Get the word to rank mapping.
    pub fn forward(&self) -> &HashMap<String, usize> {
        &self.forward
    }

    /// Get the rank to word mapping.
    pub fn reverse(&self) -> &HashMap<usize, String> {
        &self.reverse
    }

    pub fn rank(&self, word: &str) -> Option<usize> {
        self.forward.get(word).copied()
    }

    pub fn word(&self, rank: usize) -> Option<&str> {
        self.reverse.get(&rank).map(String::as_str)
    }

    /// The number of words in the index.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Encode words as model indices.
    ///
    /// The sequence starts with [`START_INDEX`]. Words that are not in the
    /// index or whose model index is not smaller than `vocabulary_size` are
    /// encoded as [`OOV_INDEX`].
    pub fn encode<I, S>(&self, words: I, vocabulary_size: Option<usize>) -> Vec<i64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let limit = vocabulary_size
            .and_then(|size| i64::try_from(size).ok())
            .unwrap_or(i64::MAX);

        let mut indices = vec![START_INDEX];
        indices.extend(words.into_iter().map(|word| {
            self.rank(word.as_ref())
                .and_then(rank_to_index)
                .filter(|&idx| idx < limit)
                .unwrap_or(OOV_INDEX)
        }));

        indices
    }

    /// Decode model indices for display.
    ///
    /// Reserved indices are rendered as `<pad>`, `<start>`, and `<unk>`.
    /// Indices that are not in the vocabulary are rendered as `<unk>`.
    pub fn decode_lossy(&self, indices: &[i64]) -> Vec<&str> {
        indices
            .iter()
            .map(|&idx| match idx {
                PAD_INDEX => "<pad>",
                START_INDEX => "<start>",
                OOV_INDEX => "<unk>",
                idx => index_to_rank(idx)
                    .and_then(|rank| self.word(rank))
                    .unwrap_or("<unk>"),
            })
            .collect()
    }
}

impl TryFrom<HashMap<String, usize>> for WordIndex {
    type Error = SentimentError;

    fn try_from(forward: HashMap<String, usize>) -> Result<Self, Self::Error> {
        WordIndex::new(forward)
    }
}

impl From<WordIndex> for HashMap<String, usize> {
    fn from(word_index: WordIndex) -> Self {
        word_index.forward
    }
}

/// Convert model indices to words.
///
/// Every index is shifted back by [`INDEX_FROM`] and looked up in the
/// `reverse` (rank to word) mapping. Fails on the first index that does
/// not correspond to a word.
pub fn indices_to_words<'a>(
    reverse: &'a HashMap<usize, String>,
    indices: &[i64],
) -> Result<Vec<&'a str>, SentimentError> {
    indices
        .iter()
        .map(|&idx| {
            index_to_rank(idx)
                .and_then(|rank| reverse.get(&rank))
                .map(String::as_str)
                .ok_or(SentimentError::UnknownIndex(idx))
        })
        .collect()
}

fn rank_to_index(rank: usize) -> Option<i64> {
    i64::try_from(rank).ok()?.checked_add(INDEX_FROM)
}

fn index_to_rank(idx: i64) -> Option<usize> {
    usize::try_from(idx.checked_sub(INDEX_FROM)?).ok()
}
