use std::borrow::Borrow;

use tch::nn::{self, Linear, Module, ModuleT, Path, RNNConfig, LSTM, RNN};
use tch::Tensor;

use super::layers::{global_max_pool_1d, Conv1D, Dropout, FallibleModuleT};
use super::{Layer, ModelType};
use crate::error::SentimentError;

const INPUT_DROPOUT: f64 = 0.2;

const BIDIRECTIONAL_HIDDEN_SIZE: i64 = 64;

const CNN_FILTERS: i64 = 250;
const CNN_KERNEL_SIZE: i64 = 3;
const CNN_HIDDEN_SIZE: i64 = 250;

/// Encoder of embedding sequences into fixed-size representations.
#[derive(Debug)]
pub enum SequenceEncoder {
    Cnn(CnnEncoder),
    Lstm(LstmEncoder),
}

impl SequenceEncoder {
    pub fn new<'a>(
        vs: impl Borrow<Path<'a>>,
        model_type: ModelType,
        embedding_size: i64,
    ) -> Result<Self, SentimentError> {
        let vs = vs.borrow();

        Ok(match model_type {
            ModelType::BidirectionalLstm => SequenceEncoder::Lstm(LstmEncoder::new(
                vs.sub("bilstm"),
                embedding_size,
                BIDIRECTIONAL_HIDDEN_SIZE,
                true,
            )),
            ModelType::Cnn => SequenceEncoder::Cnn(CnnEncoder::new(vs.sub("cnn"), embedding_size)?),
            ModelType::Lstm => SequenceEncoder::Lstm(LstmEncoder::new(
                vs.sub("lstm"),
                embedding_size,
                embedding_size,
                false,
            )),
        })
    }

    /// Size of the encoder representations.
    pub fn output_size(&self) -> i64 {
        match self {
            SequenceEncoder::Cnn(encoder) => encoder.output_size(),
            SequenceEncoder::Lstm(encoder) => encoder.output_size(),
        }
    }

    pub fn layers(&self) -> Vec<Layer> {
        match self {
            SequenceEncoder::Cnn(encoder) => encoder.layers(),
            SequenceEncoder::Lstm(encoder) => encoder.layers(),
        }
    }
}

impl FallibleModuleT for SequenceEncoder {
    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor, SentimentError> {
        match self {
            SequenceEncoder::Cnn(encoder) => encoder.forward_t(input, train),
            SequenceEncoder::Lstm(encoder) => encoder.forward_t(input, train),
        }
    }
}

/// Convolutional encoder.
///
/// Applies a convolution with ReLU activation over the time steps,
/// followed by global max pooling and a hidden layer.
#[derive(Debug)]
pub struct CnnEncoder {
    input_dropout: Dropout,
    conv: Conv1D,
    hidden: Linear,
    hidden_dropout: Dropout,
}

impl CnnEncoder {
    fn new<'a>(vs: impl Borrow<Path<'a>>, embedding_size: i64) -> Result<Self, SentimentError> {
        let vs = vs.borrow();

        Ok(CnnEncoder {
            input_dropout: Dropout::new(INPUT_DROPOUT),
            conv: Conv1D::new(
                vs.sub("conv"),
                embedding_size,
                CNN_FILTERS,
                CNN_KERNEL_SIZE,
            )?,
            hidden: nn::linear(
                vs.sub("hidden"),
                CNN_FILTERS,
                CNN_HIDDEN_SIZE,
                Default::default(),
            ),
            hidden_dropout: Dropout::new(INPUT_DROPOUT),
        })
    }

    fn output_size(&self) -> i64 {
        CNN_HIDDEN_SIZE
    }

    fn layers(&self) -> Vec<Layer> {
        vec![
            Layer::Dropout {
                p: self.input_dropout.p(),
            },
            Layer::Conv1D {
                filters: self.conv.out_features(),
                kernel_size: self.conv.kernel_size(),
            },
            Layer::Relu,
            Layer::GlobalMaxPooling1D,
            Layer::Dense {
                input_size: CNN_FILTERS,
                output_size: CNN_HIDDEN_SIZE,
            },
            Layer::Dropout {
                p: self.hidden_dropout.p(),
            },
            Layer::Relu,
        ]
    }
}

impl FallibleModuleT for CnnEncoder {
    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor, SentimentError> {
        // [batch_size, time_steps, embedding_size] -> [batch_size, embedding_size, time_steps]
        let input = self
            .input_dropout
            .forward_t(input, train)
            .f_transpose(1, 2)?;

        let convolved = self.conv.forward_t(&input, train)?.f_relu()?;
        let pooled = global_max_pool_1d(&convolved)?;

        let hidden = self.hidden.forward(&pooled);
        Ok(self.hidden_dropout.forward_t(&hidden, train).f_relu()?)
    }
}

/// LSTM encoder.
///
/// The representation is the final hidden state of the LSTM. In the
/// bidirectional case, the final hidden states of both directions are
/// concatenated.
#[derive(Debug)]
pub struct LstmEncoder {
    input_dropout: Dropout,
    lstm: LSTM,
    hidden_size: i64,
    bidirectional: bool,
}

impl LstmEncoder {
    fn new<'a>(
        vs: impl Borrow<Path<'a>>,
        input_size: i64,
        hidden_size: i64,
        bidirectional: bool,
    ) -> Self {
        let lstm = nn::lstm(
            vs,
            input_size,
            hidden_size,
            RNNConfig {
                batch_first: true,
                bidirectional,
                ..Default::default()
            },
        );

        LstmEncoder {
            input_dropout: Dropout::new(INPUT_DROPOUT),
            lstm,
            hidden_size,
            bidirectional,
        }
    }

    fn n_directions(&self) -> i64 {
        if self.bidirectional {
            2
        } else {
            1
        }
    }

    fn output_size(&self) -> i64 {
        self.n_directions() * self.hidden_size
    }

    fn layers(&self) -> Vec<Layer> {
        vec![
            Layer::Dropout {
                p: self.input_dropout.p(),
            },
            Layer::Lstm {
                hidden_size: self.hidden_size,
                bidirectional: self.bidirectional,
            },
        ]
    }
}

impl FallibleModuleT for LstmEncoder {
    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor, SentimentError> {
        let (batch_size, time_steps, _) = input.size3()?;

        // The LSTM bindings panic rather than fail on empty sequences.
        if time_steps == 0 {
            return Err(SentimentError::IllegalConfigurationError(
                "LSTM input must have at least one time step".to_string(),
            ));
        }

        let input = self.input_dropout.forward_t(input, train);
        let (_, state) = self.lstm.seq(&input);

        // [n_directions, batch_size, hidden_size] -> [batch_size, n_directions * hidden_size]
        Ok(state
            .h()
            .f_transpose(0, 1)?
            .f_reshape(&[batch_size, self.output_size()])?)
    }
}

#[cfg(test)]
mod tests {
    use tch::nn::VarStore;
    use tch::{Device, Kind, Tensor};

    use super::SequenceEncoder;
    use crate::error::SentimentError;
    use crate::model::layers::FallibleModuleT;
    use crate::model::{Layer, ModelType};

    fn embeddings(time_steps: i64) -> Tensor {
        Tensor::randn(&[4, time_steps, 16], (Kind::Float, Device::Cpu))
    }

    #[test]
    fn lstm_encodes_final_state() {
        let vs = VarStore::new(Device::Cpu);
        let encoder = SequenceEncoder::new(vs.root(), ModelType::Lstm, 16).unwrap();
        assert_eq!(encoder.output_size(), 16);
        assert_eq!(
            encoder.forward_t(&embeddings(9), true).unwrap().size(),
            &[4, 16]
        );
    }

    #[test]
    fn bidirectional_lstm_encodes_both_directions() {
        let vs = VarStore::new(Device::Cpu);
        let encoder = SequenceEncoder::new(vs.root(), ModelType::BidirectionalLstm, 16).unwrap();
        assert_eq!(encoder.output_size(), 128);
        assert_eq!(
            encoder.forward_t(&embeddings(9), false).unwrap().size(),
            &[4, 128]
        );
    }

    #[test]
    fn lstm_rejects_empty_sequences() {
        let vs = VarStore::new(Device::Cpu);
        let encoder = SequenceEncoder::new(vs.root(), ModelType::Lstm, 16).unwrap();
        assert!(matches!(
            encoder.forward_t(&embeddings(0), false),
            Err(SentimentError::IllegalConfigurationError(_))
        ));
        assert!(matches!(
            encoder.forward_t(&Tensor::zeros(&[4, 16], (Kind::Float, Device::Cpu)), false),
            Err(SentimentError::Tch(_))
        ));
    }

    #[test]
    fn cnn_handles_sequences_shorter_than_kernel() {
        let vs = VarStore::new(Device::Cpu);
        let encoder = SequenceEncoder::new(vs.root(), ModelType::Cnn, 16).unwrap();
        assert_eq!(
            encoder.forward_t(&embeddings(1), false).unwrap().size(),
            &[4, 250]
        );
        assert_eq!(
            encoder.forward_t(&embeddings(20), true).unwrap().size(),
            &[4, 250]
        );
    }

    #[test]
    fn cnn_layers() {
        let vs = VarStore::new(Device::Cpu);
        let encoder = SequenceEncoder::new(vs.root(), ModelType::Cnn, 16).unwrap();
        assert_eq!(
            encoder.layers()[1],
            Layer::Conv1D {
                filters: 250,
                kernel_size: 3
            }
        );
        assert_eq!(encoder.layers().len(), 7);
    }
}
