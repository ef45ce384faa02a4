pub mod artifacts;

pub mod config;

pub mod dataset;

pub mod error;
pub use error::SentimentError;

pub mod model;

pub mod tensor;

pub mod text;

pub mod train;
pub use train::{train_model, TrainedModel};

pub mod vocab;
pub use vocab::{indices_to_words, WordIndex, INDEX_FROM};
