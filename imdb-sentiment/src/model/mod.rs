//! Sentiment classifiers.
//!
//! Every classifier embeds the input indices, encodes the embeddings
//! into a fixed-size representation, and predicts the probability of
//! positive sentiment from that representation.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tch::nn::{Init, Linear, Module, Path};
use tch::{nn, Kind, Reduction, Tensor};

use crate::error::SentimentError;

mod encoder;
use encoder::SequenceEncoder;

pub mod layers;
use layers::{Embedding, FallibleModuleT};

/// Classifier architecture.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Bidirectional LSTM over the embeddings.
    BidirectionalLstm,

    /// Convolution with global max pooling over the embeddings.
    Cnn,

    /// LSTM over the embeddings.
    Lstm,
}

impl ModelType {
    pub fn name(self) -> &'static str {
        match self {
            ModelType::BidirectionalLstm => "bidirectional_lstm",
            ModelType::Cnn => "cnn",
            ModelType::Lstm => "lstm",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelType {
    type Err = SentimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bidirectional_lstm" => Ok(ModelType::BidirectionalLstm),
            "cnn" => Ok(ModelType::Cnn),
            "lstm" => Ok(ModelType::Lstm),
            unknown => Err(SentimentError::InvalidModelType(unknown.to_string())),
        }
    }
}

/// Description of a model layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    Conv1D { filters: i64, kernel_size: i64 },
    Dense { input_size: i64, output_size: i64 },
    Dropout { p: f64 },
    Embedding { vocabulary_size: i64, embedding_size: i64 },
    GlobalMaxPooling1D,
    Lstm { hidden_size: i64, bidirectional: bool },
    Relu,
    Sigmoid,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Layer::Conv1D {
                filters,
                kernel_size,
            } => write!(f, "conv1d(filters: {}, kernel: {})", filters, kernel_size),
            Layer::Dense {
                input_size,
                output_size,
            } => write!(f, "dense({} -> {})", input_size, output_size),
            Layer::Dropout { p } => write!(f, "dropout(p: {})", p),
            Layer::Embedding {
                vocabulary_size,
                embedding_size,
            } => write!(f, "embedding({} x {})", vocabulary_size, embedding_size),
            Layer::GlobalMaxPooling1D => f.write_str("global_max_pooling1d"),
            Layer::Lstm {
                hidden_size,
                bidirectional,
            } => {
                if *bidirectional {
                    write!(f, "bidirectional_lstm(hidden: {})", hidden_size)
                } else {
                    write!(f, "lstm(hidden: {})", hidden_size)
                }
            }
            Layer::Relu => f.write_str("relu"),
            Layer::Sigmoid => f.write_str("sigmoid"),
        }
    }
}

/// Binary cross-entropy loss and accuracy of a batch.
pub struct ModelLoss {
    pub loss: Tensor,
    pub accuracy: Tensor,
}

/// Sentiment classification model.
#[derive(Debug)]
pub struct SentimentModel {
    model_type: ModelType,
    embeddings: Embedding,
    encoder: SequenceEncoder,
    output: Linear,
    output_input_size: i64,
}

impl SentimentModel {
    /// Construct a model of the given type.
    ///
    /// The model parameters are stored in `vs`.
    pub fn new<'a>(
        vs: impl Borrow<Path<'a>>,
        model_type: ModelType,
        vocabulary_size: i64,
        embedding_size: i64,
    ) -> Result<Self, SentimentError> {
        if vocabulary_size <= 0 || embedding_size <= 0 {
            return Err(SentimentError::IllegalConfigurationError(format!(
                "vocabulary size ({}) and embedding size ({}) must be positive",
                vocabulary_size, embedding_size
            )));
        }

        let vs = vs.borrow();

        let embeddings = Embedding::new(
            vs.sub("embeddings"),
            "embeddings",
            vocabulary_size,
            embedding_size,
            Init::Uniform {
                lo: -0.05,
                up: 0.05,
            },
        )?;

        let encoder = SequenceEncoder::new(vs.sub("encoder"), model_type, embedding_size)?;

        let output_input_size = encoder.output_size();
        let output = nn::linear(
            vs.sub("output"),
            output_input_size,
            1,
            Default::default(),
        );

        Ok(SentimentModel {
            model_type,
            embeddings,
            encoder,
            output,
            output_input_size,
        })
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    /// The layers of the model, from input to output.
    pub fn layers(&self) -> Vec<Layer> {
        let mut layers = vec![Layer::Embedding {
            vocabulary_size: self.embeddings.num_embeddings(),
            embedding_size: self.embeddings.embedding_dim(),
        }];
        layers.extend(self.encoder.layers());
        layers.push(Layer::Dense {
            input_size: self.output_input_size,
            output_size: 1,
        });
        layers.push(Layer::Sigmoid);
        layers
    }

    /// Compute the logits of positive sentiment.
    ///
    /// `inputs` has the shape `[batch_size, time_steps]`, or `[batch_size]`
    /// for single-index inputs. The returned logits have shape
    /// `[batch_size]`.
    pub fn logits(&self, inputs: &Tensor, train: bool) -> Result<Tensor, SentimentError> {
        let inputs = if inputs.dim() == 1 {
            inputs.f_unsqueeze(1)?
        } else {
            inputs.shallow_clone()
        };

        let embeddings = self.embeddings.forward_t(&inputs, train)?;
        let encoded = self.encoder.forward_t(&embeddings, train)?;
        Ok(self.output.forward(&encoded).f_squeeze_dim(-1)?)
    }

    /// Predict the probability of positive sentiment.
    pub fn predict(&self, inputs: &Tensor) -> Result<Tensor, SentimentError> {
        tch::no_grad(|| -> Result<Tensor, SentimentError> {
            Ok(self.logits(inputs, false)?.f_sigmoid()?)
        })
    }

    /// Compute the loss and accuracy for the given 0/1 `labels`.
    pub fn loss(
        &self,
        inputs: &Tensor,
        labels: &Tensor,
        train: bool,
    ) -> Result<ModelLoss, SentimentError> {
        let logits = self.logits(inputs, train)?;
        let labels = labels.f_to_kind(Kind::Float)?;

        let loss = logits.f_binary_cross_entropy_with_logits::<Tensor>(
            &labels,
            None,
            None,
            Reduction::Mean,
        )?;

        let accuracy = tch::no_grad(|| -> Result<Tensor, SentimentError> {
            Ok(logits
                .f_ge(0.)?
                .f_to_kind(Kind::Float)?
                .f_eq_tensor(&labels)?
                .f_to_kind(Kind::Float)?
                .f_mean(Kind::Float)?)
        })?;

        Ok(ModelLoss { loss, accuracy })
    }
}

#[cfg(test)]
mod tests {
    use tch::nn::VarStore;
    use tch::{Device, Kind, Tensor};

    use super::{Layer, ModelType, SentimentModel};
    use crate::error::SentimentError;

    #[test]
    fn model_types_are_parsed() {
        assert_eq!("lstm".parse::<ModelType>().unwrap(), ModelType::Lstm);
        assert_eq!("cnn".parse::<ModelType>().unwrap(), ModelType::Cnn);
        assert_eq!(
            "bidirectional_lstm".parse::<ModelType>().unwrap(),
            ModelType::BidirectionalLstm
        );

        for model_type in &[ModelType::BidirectionalLstm, ModelType::Cnn, ModelType::Lstm] {
            assert_eq!(model_type.to_string().parse::<ModelType>().unwrap(), *model_type);
        }
    }

    #[test]
    fn unknown_model_type_is_invalid() {
        assert!(matches!(
            "nonsensical_model_type".parse::<ModelType>(),
            Err(SentimentError::InvalidModelType(name)) if name == "nonsensical_model_type"
        ));
        assert!("LSTM".parse::<ModelType>().is_err());
    }

    #[test]
    fn logits_have_one_value_per_instance() {
        for model_type in &[ModelType::BidirectionalLstm, ModelType::Cnn, ModelType::Lstm] {
            let vs = VarStore::new(Device::Cpu);
            let model = SentimentModel::new(vs.root(), *model_type, 20, 8).unwrap();

            let inputs = Tensor::randint(20, &[3, 7], (Kind::Int64, Device::Cpu));
            assert_eq!(model.logits(&inputs, true).unwrap().size(), &[3]);

            // Single index per instance.
            let inputs = Tensor::from_slice(&[1i64, 2, 3, 4]);
            assert_eq!(model.logits(&inputs, false).unwrap().size(), &[4]);
        }
    }

    #[test]
    fn predictions_are_probabilities() {
        let vs = VarStore::new(Device::Cpu);
        let model = SentimentModel::new(vs.root(), ModelType::Lstm, 20, 8).unwrap();
        let inputs = Tensor::randint(20, &[5, 4], (Kind::Int64, Device::Cpu));

        let probs = Vec::<f32>::try_from(&model.predict(&inputs).unwrap()).unwrap();
        assert_eq!(probs.len(), 5);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn lstm_layers() {
        let vs = VarStore::new(Device::Cpu);
        let model = SentimentModel::new(vs.root(), ModelType::Lstm, 100, 32).unwrap();

        assert_eq!(
            model.layers(),
            vec![
                Layer::Embedding {
                    vocabulary_size: 100,
                    embedding_size: 32
                },
                Layer::Dropout { p: 0.2 },
                Layer::Lstm {
                    hidden_size: 32,
                    bidirectional: false
                },
                Layer::Dense {
                    input_size: 32,
                    output_size: 1
                },
                Layer::Sigmoid,
            ]
        );
    }

    #[test]
    fn bidirectional_lstm_concatenates_directions() {
        let vs = VarStore::new(Device::Cpu);
        let model = SentimentModel::new(vs.root(), ModelType::BidirectionalLstm, 100, 32).unwrap();

        assert!(model.layers().contains(&Layer::Dense {
            input_size: 128,
            output_size: 1
        }));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let vs = VarStore::new(Device::Cpu);
        assert!(matches!(
            SentimentModel::new(vs.root(), ModelType::Cnn, 0, 32),
            Err(SentimentError::IllegalConfigurationError(_))
        ));
    }
}
