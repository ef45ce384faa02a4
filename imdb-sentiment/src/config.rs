use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::SentimentError;

/// Model hyperparameters.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Dimensionality of the word embeddings.
    #[serde(default = "default_embedding_size")]
    pub embedding_size: i64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            embedding_size: default_embedding_size(),
        }
    }
}

fn default_embedding_size() -> i64 {
    128
}

/// Optimization hyperparameters.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Number of passes over the training data.
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Adam learning rate.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Seed for parameter initialization and shuffling.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
        }
    }
}

fn default_epochs() -> usize {
    5
}

fn default_batch_size() -> usize {
    128
}

fn default_learning_rate() -> f64 {
    1e-3
}

fn default_seed() -> u64 {
    42
}

/// Input encoding.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Indices at or above this size are encoded as out-of-vocabulary.
    #[serde(default = "default_vocabulary_size")]
    pub vocabulary_size: usize,

    /// Reviews are padded or truncated to this number of indices.
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            vocabulary_size: default_vocabulary_size(),
            max_len: default_max_len(),
        }
    }
}

fn default_vocabulary_size() -> usize {
    10000
}

fn default_max_len() -> usize {
    100
}

/// Sentiment classifier training configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub data: DataConfig,
}

impl TrainConfig {
    /// Check that the configuration can be used for training.
    pub fn validate(&self) -> Result<(), SentimentError> {
        if self.model.embedding_size <= 0 {
            return Err(SentimentError::IllegalConfigurationError(
                "embedding size must be positive".to_string(),
            ));
        }

        if self.training.batch_size == 0 {
            return Err(SentimentError::IllegalConfigurationError(
                "batch size must be positive".to_string(),
            ));
        }

        if self.data.max_len == 0 {
            return Err(SentimentError::IllegalConfigurationError(
                "maximum length must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

pub trait TomlRead
where
    Self: Sized,
{
    fn from_toml_read(read: impl Read) -> Result<Self, SentimentError>;
}

impl TomlRead for TrainConfig {
    fn from_toml_read(mut read: impl Read) -> Result<Self, SentimentError> {
        let mut data = String::new();
        read.read_to_string(&mut data)?;
        let config: TrainConfig = toml::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{DataConfig, ModelConfig, TomlRead, TrainConfig, TrainingConfig};
    use crate::error::SentimentError;

    #[test]
    fn config() {
        let config =
            TrainConfig::from_toml_read(include_bytes!("../testdata/train.conf").as_ref())
                .unwrap();

        assert_eq!(
            config,
            TrainConfig {
                model: ModelConfig { embedding_size: 32 },
                training: TrainingConfig {
                    epochs: 2,
                    batch_size: 64,
                    learning_rate: 0.002,
                    seed: 7,
                },
                data: DataConfig {
                    vocabulary_size: 5000,
                    max_len: 200,
                },
            }
        );
    }

    #[test]
    fn missing_values_use_defaults() {
        let config = TrainConfig::from_toml_read("[training]\nepochs = 1\n".as_bytes()).unwrap();
        assert_eq!(config.training.epochs, 1);
        assert_eq!(config.training.batch_size, 128);
        assert_eq!(config.model, ModelConfig::default());
        assert_eq!(config.data.vocabulary_size, 10000);
        assert_eq!(config.data.max_len, 100);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            TrainConfig::from_toml_read("[model]\nlayers = 3\n".as_bytes()),
            Err(SentimentError::TomlDeserializationError(_))
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            TrainConfig::from_toml_read("[training]\nbatch_size = 0\n".as_bytes()),
            Err(SentimentError::IllegalConfigurationError(_))
        ));
    }
}
