//! Basic neural network modules.
//!
//! These are modules that are not provided by the Torch binding, or where
//! different behavior is required from the modules.

use std::borrow::Borrow;

use tch::nn::{ConvConfig, Init, ModuleT, Path};
use tch::{self, Tensor};

use crate::error::SentimentError;

/// Module for which a computation can fail.
pub trait FallibleModuleT {
    /// Apply the module.
    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor, SentimentError>;
}

/// 1-D convolution without padding.
#[derive(Debug)]
pub struct Conv1D {
    ws: Tensor,
    bs: Option<Tensor>,
    config: ConvConfig,
    kernel_size: i64,
}

impl Conv1D {
    pub fn new<'a>(
        vs: impl Borrow<Path<'a>>,
        in_features: i64,
        out_features: i64,
        kernel_size: i64,
    ) -> Result<Self, SentimentError> {
        let vs = vs.borrow();

        let config = ConvConfig::default();

        let bs = if config.bias {
            Some(vs.f_var("bias", &[out_features], config.bs_init)?)
        } else {
            None
        };

        let ws = vs.f_var(
            "weight",
            &[out_features, in_features, kernel_size],
            config.ws_init,
        )?;

        Ok(Conv1D {
            ws,
            bs,
            config,
            kernel_size,
        })
    }

    pub fn kernel_size(&self) -> i64 {
        self.kernel_size
    }

    pub fn out_features(&self) -> i64 {
        self.ws.size()[0]
    }
}

impl FallibleModuleT for Conv1D {
    /// Apply the convolution to an input of shape
    /// `[batch_size, in_features, time_steps]`.
    ///
    /// Inputs with fewer time steps than the kernel size are padded with
    /// zeros at the front.
    fn forward_t(&self, input: &Tensor, _train: bool) -> Result<Tensor, SentimentError> {
        let (batch_size, in_features, time_steps) = input.size3()?;

        let input = if time_steps < self.kernel_size {
            let padding = Tensor::f_zeros(
                &[batch_size, in_features, self.kernel_size - time_steps],
                (input.kind(), input.device()),
            )?;
            Tensor::f_cat(&[&padding, input], 2)?
        } else {
            input.shallow_clone()
        };

        Ok(Tensor::f_conv1d(
            &input,
            &self.ws,
            self.bs.as_ref(),
            &[self.config.stride],
            &[self.config.padding],
            &[self.config.dilation],
            self.config.groups,
        )?)
    }
}

/// Dropout layer.
///
/// This layer zeros out random elements of a tensor with probability
/// *p*. Dropout is a form of regularization and prevents
/// co-adaptation of neurons.
#[derive(Debug)]
pub struct Dropout {
    p: f64,
}

impl Dropout {
    /// Drop out elements with probability *p*.
    pub fn new(p: f64) -> Self {
        Dropout { p }
    }

    pub fn p(&self) -> f64 {
        self.p
    }
}

impl ModuleT for Dropout {
    fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        input.dropout(self.p, train)
    }
}

/// Embedding lookup layer.
#[derive(Debug)]
pub struct Embedding(Tensor);

impl Embedding {
    pub fn new<'a>(
        vs: impl Borrow<Path<'a>>,
        name: &str,
        num_embeddings: i64,
        embedding_dim: i64,
        init: Init,
    ) -> Result<Self, SentimentError> {
        Ok(Embedding(vs.borrow().f_var(
            name,
            &[num_embeddings, embedding_dim],
            init,
        )?))
    }

    pub fn num_embeddings(&self) -> i64 {
        self.0.size()[0]
    }

    pub fn embedding_dim(&self) -> i64 {
        self.0.size()[1]
    }
}

impl FallibleModuleT for Embedding {
    /// Look up the embeddings of the indices in `input`.
    ///
    /// Fails when an index is not smaller than the number of embeddings.
    fn forward_t(&self, input: &Tensor, _train: bool) -> Result<Tensor, SentimentError> {
        Ok(Tensor::f_embedding(&self.0, input, -1, false, false)?)
    }
}

/// Max pooling over the time steps of `[batch_size, features, time_steps]`.
pub fn global_max_pool_1d(input: &Tensor) -> Result<Tensor, SentimentError> {
    let (pooled, _) = input.f_max_dim(2, false)?;
    Ok(pooled)
}
