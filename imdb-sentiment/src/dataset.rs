//! IMDB movie review corpus.
//!
//! The corpus is expected in the layout of the Large Movie Review
//! Dataset, where every review is stored in its own text file:
//!
//! ```text
//! <root>/train/pos/*.txt
//! <root>/train/neg/*.txt
//! <root>/test/pos/*.txt
//! <root>/test/neg/*.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use ndarray::Array1;

use crate::error::SentimentError;
use crate::tensor::{LabeledSequences, SequenceBuilder};
use crate::text::text_to_words;
use crate::vocab::WordIndex;

/// Data set split.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

/// Review sentiment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sentiment {
    Negative,
    Positive,
}

impl Sentiment {
    fn dir_name(self) -> &'static str {
        match self {
            Sentiment::Negative => "neg",
            Sentiment::Positive => "pos",
        }
    }

    /// The label that is used for training.
    pub fn label(self) -> i64 {
        match self {
            Sentiment::Negative => 0,
            Sentiment::Positive => 1,
        }
    }
}

/// A movie review.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Review {
    pub sentiment: Sentiment,
    pub text: String,
}

/// The training and test reviews of the corpus.
pub struct ImdbDataSet {
    train: Vec<Review>,
    test: Vec<Review>,
}

impl ImdbDataSet {
    /// Read the corpus from the `root` directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, SentimentError> {
        let root = root.as_ref();

        let train = read_split(root, Split::Train)?;
        let test = read_split(root, Split::Test)?;

        log::info!(
            "Read {} training and {} test reviews from {}",
            train.len(),
            test.len(),
            root.display()
        );

        Ok(ImdbDataSet { train, test })
    }

    pub fn reviews(&self, split: Split) -> &[Review] {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }

    /// Build a word index from the training reviews.
    pub fn word_index(&self) -> WordIndex {
        WordIndex::from_words(
            self.train
                .iter()
                .flat_map(|review| text_to_words(&review.text)),
        )
    }

    /// Encode the reviews of a split.
    pub fn encode(
        &self,
        split: Split,
        word_index: &WordIndex,
        vocabulary_size: usize,
        max_len: usize,
    ) -> Result<LabeledSequences, SentimentError> {
        encode_reviews(self.reviews(split), word_index, vocabulary_size, max_len)
    }
}

/// Encode reviews as fixed-length index sequences.
pub fn encode_reviews(
    reviews: &[Review],
    word_index: &WordIndex,
    vocabulary_size: usize,
    max_len: usize,
) -> Result<LabeledSequences, SentimentError> {
    let mut builder = SequenceBuilder::new(reviews.len(), max_len);
    for review in reviews {
        let indices = word_index.encode(text_to_words(&review.text), Some(vocabulary_size));
        builder.add(Array1::from(indices).view());
    }

    let labels = reviews
        .iter()
        .map(|review| review.sentiment.label())
        .collect();

    LabeledSequences::new(builder.into_sequences(), labels)
}

/// Read the reviews of a split, negative reviews first.
pub fn read_split(root: &Path, split: Split) -> Result<Vec<Review>, SentimentError> {
    let mut reviews = Vec::new();
    for sentiment in [Sentiment::Negative, Sentiment::Positive] {
        let dir = root.join(split.dir_name()).join(sentiment.dir_name());
        for path in review_paths(&dir)? {
            reviews.push(Review {
                sentiment,
                text: fs::read_to_string(&path)?,
            });
        }
    }

    Ok(reviews)
}

fn review_paths(dir: &Path) -> Result<Vec<PathBuf>, SentimentError> {
    let paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(paths
        .into_iter()
        .filter(|path| path.extension().map(|ext| ext == "txt").unwrap_or(false))
        .sorted()
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use ndarray::array;
    use tempfile::TempDir;

    use super::{ImdbDataSet, Sentiment, Split};
    use crate::error::SentimentError;
    use crate::vocab::{OOV_INDEX, START_INDEX};

    fn write_review(root: &Path, split: &str, sentiment: &str, name: &str, text: &str) {
        let dir = root.join(split).join(sentiment);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), text).unwrap();
    }

    fn corpus() -> TempDir {
        let tmp_dir = TempDir::new().unwrap();
        let root = tmp_dir.path();
        write_review(root, "train", "pos", "1_9.txt", "A great movie, great cast!");
        write_review(root, "train", "pos", "0_10.txt", "Great.");
        write_review(root, "train", "neg", "2_1.txt", "A bad movie.");
        write_review(root, "train", "neg", "README", "ignored");
        write_review(root, "test", "pos", "3_8.txt", "Great fun");
        write_review(root, "test", "neg", "4_2.txt", "Bad, bad, bad...");
        tmp_dir
    }

    #[test]
    fn reviews_are_read_per_split() {
        let tmp_dir = corpus();
        let data_set = ImdbDataSet::open(tmp_dir.path()).unwrap();

        let train = data_set.reviews(Split::Train);
        assert_eq!(train.len(), 3);
        assert_eq!(train[0].sentiment, Sentiment::Negative);
        assert_eq!(train[0].text, "A bad movie.");
        // Sorted by file name.
        assert_eq!(train[1].text, "Great.");
        assert_eq!(train[2].text, "A great movie, great cast!");

        assert_eq!(data_set.reviews(Split::Test).len(), 2);
    }

    #[test]
    fn missing_split_is_an_error() {
        let tmp_dir = TempDir::new().unwrap();
        write_review(tmp_dir.path(), "train", "pos", "1_9.txt", "Great");
        assert!(matches!(
            ImdbDataSet::open(tmp_dir.path()),
            Err(SentimentError::IoError(_))
        ));
    }

    #[test]
    fn word_index_is_built_from_training_reviews() {
        let tmp_dir = corpus();
        let data_set = ImdbDataSet::open(tmp_dir.path()).unwrap();
        let word_index = data_set.word_index();

        assert_eq!(word_index.rank("great"), Some(1));
        assert_eq!(word_index.rank("a"), Some(2));
        assert_eq!(word_index.rank("movie"), Some(3));
        // Only in the test split.
        assert_eq!(word_index.rank("fun"), None);
    }

    #[test]
    fn reviews_are_encoded() {
        let tmp_dir = corpus();
        let data_set = ImdbDataSet::open(tmp_dir.path()).unwrap();
        let word_index = data_set.word_index();

        // great: 4, a: 5, movie: 6, bad: 7, cast: 8
        let test = data_set.encode(Split::Test, &word_index, 7, 4).unwrap();
        assert_eq!(
            test.sequences(),
            &array![
                [START_INDEX, OOV_INDEX, OOV_INDEX, OOV_INDEX],
                [0, START_INDEX, 4, OOV_INDEX]
            ]
        );
        assert_eq!(test.labels(), &array![0, 1]);
    }
}
