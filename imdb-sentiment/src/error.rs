use std::io;

use ndarray::ShapeError;
use tch::TchError;
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("Word index assigns rank {rank} to both `{first}` and `{second}`")]
    DuplicateRank {
        rank: usize,
        first: String,
        second: String,
    },

    #[error("Illegal configuration: {0}")]
    IllegalConfigurationError(String),

    #[error("Invalid model type: '{0}'")]
    InvalidModelType(String),

    #[error(transparent)]
    IoError(#[from] io::Error),

    #[error("{0}: {1}")]
    JSonSerialization(String, serde_json::Error),

    #[error("Word `{0}` uses the reserved rank 0")]
    ReservedRank(String),

    #[error(transparent)]
    ShapeError(#[from] ShapeError),

    #[error(transparent)]
    Tch(#[from] TchError),

    #[error(transparent)]
    TomlDeserializationError(#[from] toml::de::Error),

    #[error("Index {0} is not in the vocabulary")]
    UnknownIndex(i64),
}
