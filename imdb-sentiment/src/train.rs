//! Training of sentiment classifiers.

use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tch::nn::{self, OptimizerConfig, VarStore};
use tch::{Device, Tensor};

use crate::config::TrainConfig;
use crate::error::SentimentError;
use crate::model::{Layer, ModelType, SentimentModel};
use crate::tensor::{LabeledSequences, Tensors};

/// Loss and accuracy after an epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub validation_loss: f32,
    pub validation_accuracy: f32,
}

/// Observer of training progress.
pub trait TrainHook {
    /// Called after an optimizer step on a batch.
    fn batch_completed(&mut self, _epoch: usize, _batch: usize, _n_batches: usize, _loss: f32) {}

    /// Called after an epoch was trained and validated.
    fn epoch_completed(&mut self, _stats: &EpochStats) {}
}

/// Hook that ignores all progress.
pub struct NoopHook;

impl TrainHook for NoopHook {}

/// A trained sentiment classifier.
pub struct TrainedModel {
    history: Vec<EpochStats>,
    model: SentimentModel,
    vs: VarStore,
}

impl TrainedModel {
    pub(crate) fn new(model: SentimentModel, vs: VarStore, history: Vec<EpochStats>) -> Self {
        TrainedModel { history, model, vs }
    }

    pub fn model(&self) -> &SentimentModel {
        &self.model
    }

    pub fn model_type(&self) -> ModelType {
        self.model.model_type()
    }

    /// The layers of the model, from input to output.
    pub fn layers(&self) -> Vec<Layer> {
        self.model.layers()
    }

    /// Statistics of each training epoch.
    pub fn history(&self) -> &[EpochStats] {
        &self.history
    }

    /// The variable store with the model parameters.
    pub fn var_store(&self) -> &VarStore {
        &self.vs
    }

    /// Predict the probability of positive sentiment of each sequence.
    pub fn predict(&self, inputs: &Tensor) -> Result<Tensor, SentimentError> {
        self.model.predict(&inputs.to_device(self.vs.device()))
    }

    /// Compute the loss and accuracy on labeled data.
    pub fn evaluate(
        &self,
        data: &LabeledSequences,
        batch_size: usize,
    ) -> Result<(f32, f32), SentimentError> {
        check_batches(data, batch_size)?;
        let tensors = Tensors::try_from(data)?.to_device(self.vs.device());
        evaluate(&self.model, &tensors, batch_size)
    }
}

/// Trainer for sentiment classifiers.
///
/// Models are trained with Adam on the binary cross-entropy loss. After
/// every epoch, the model is evaluated on the validation data.
#[derive(Clone, Debug)]
pub struct Trainer {
    batch_size: usize,
    device: Device,
    epochs: usize,
    learning_rate: f64,
    seed: u64,
}

impl Trainer {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        Trainer {
            batch_size,
            device: Device::Cpu,
            epochs,
            learning_rate: 1e-3,
            seed: 42,
        }
    }

    /// Construct a trainer from the training configuration.
    pub fn from_config(config: &TrainConfig) -> Self {
        Trainer::new(config.training.epochs, config.training.batch_size)
            .learning_rate(config.training.learning_rate)
            .seed(config.training.seed)
    }

    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Seed of parameter initialization and shuffling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Construct a model of type `model_type` and train it.
    ///
    /// Fails with [`SentimentError::InvalidModelType`] if `model_type` is
    /// not the name of a [`ModelType`]. In that case, no model is
    /// constructed.
    pub fn train(
        &self,
        model_type: &str,
        vocabulary_size: i64,
        embedding_size: i64,
        train: &LabeledSequences,
        validation: &LabeledSequences,
        hook: &mut dyn TrainHook,
    ) -> Result<TrainedModel, SentimentError> {
        let model_type: ModelType = model_type.parse()?;

        self.check_data(vocabulary_size, train)?;
        self.check_data(vocabulary_size, validation)?;

        tch::manual_seed(self.seed as i64);
        let mut rng = XorShiftRng::seed_from_u64(self.seed);

        let vs = VarStore::new(self.device);
        let model = SentimentModel::new(vs.root(), model_type, vocabulary_size, embedding_size)?;

        log::info!("Model: {}", model_type);
        for layer in model.layers() {
            log::info!("  {}", layer);
        }

        let mut optimizer = nn::Adam::default().build(&vs, self.learning_rate)?;

        let train = Tensors::try_from(train)?.to_device(self.device);
        let validation = Tensors::try_from(validation)?.to_device(self.device);

        let mut history = Vec::with_capacity(self.epochs);
        for epoch in 0..self.epochs {
            let (train_loss, train_accuracy) =
                self.train_epoch(&model, &train, &mut optimizer, &mut rng, epoch, hook)?;
            log::info!(
                "Epoch {} (train): loss: {:.4}, acc: {:.4}",
                epoch,
                train_loss,
                train_accuracy
            );

            let (validation_loss, validation_accuracy) =
                evaluate(&model, &validation, self.batch_size)?;
            log::info!(
                "Epoch {} (validation): loss: {:.4}, acc: {:.4}",
                epoch,
                validation_loss,
                validation_accuracy
            );

            let stats = EpochStats {
                epoch,
                train_loss,
                train_accuracy,
                validation_loss,
                validation_accuracy,
            };
            hook.epoch_completed(&stats);
            history.push(stats);
        }

        Ok(TrainedModel::new(model, vs, history))
    }

    fn check_data(
        &self,
        vocabulary_size: i64,
        data: &LabeledSequences,
    ) -> Result<(), SentimentError> {
        check_batches(data, self.batch_size)?;

        if let Some(max_index) = data.max_index() {
            if max_index >= vocabulary_size {
                return Err(SentimentError::IllegalConfigurationError(format!(
                    "index {} does not fit in vocabulary of size {}",
                    max_index, vocabulary_size
                )));
            }
        }

        Ok(())
    }

    fn train_epoch(
        &self,
        model: &SentimentModel,
        train: &Tensors,
        optimizer: &mut nn::Optimizer,
        rng: &mut XorShiftRng,
        epoch: usize,
        hook: &mut dyn TrainHook,
    ) -> Result<(f32, f32), SentimentError> {
        let mut summed_loss = 0f32;
        let mut summed_accuracy = 0f32;
        let mut n_instances = 0;

        let batches = train.batches(self.batch_size, Some(rng));
        let n_batches = batches.n_batches();
        for (batch_idx, batch) in batches.enumerate() {
            let batch = batch?;

            let model_loss = model.loss(&batch.inputs, &batch.labels, true)?;
            optimizer.backward_step(&model_loss.loss);

            let loss = f32::try_from(&model_loss.loss)?;
            summed_loss += loss * batch.len() as f32;
            summed_accuracy += f32::try_from(&model_loss.accuracy)? * batch.len() as f32;
            n_instances += batch.len();

            hook.batch_completed(epoch, batch_idx, n_batches, loss);
        }

        Ok((
            summed_loss / n_instances as f32,
            summed_accuracy / n_instances as f32,
        ))
    }
}

/// Check that `data` can be split in non-empty batches of `batch_size`.
fn check_batches(data: &LabeledSequences, batch_size: usize) -> Result<(), SentimentError> {
    if batch_size == 0 {
        return Err(SentimentError::IllegalConfigurationError(
            "batch size must be positive".to_string(),
        ));
    }

    if data.is_empty() {
        return Err(SentimentError::IllegalConfigurationError(
            "data set is empty".to_string(),
        ));
    }

    if data.sequences().ncols() == 0 {
        return Err(SentimentError::IllegalConfigurationError(
            "sequences must have at least one time step".to_string(),
        ));
    }

    Ok(())
}

/// Compute the loss and accuracy of a model without updating it.
fn evaluate(
    model: &SentimentModel,
    data: &Tensors,
    batch_size: usize,
) -> Result<(f32, f32), SentimentError> {
    tch::no_grad(|| -> Result<(f32, f32), SentimentError> {
        let mut summed_loss = 0f32;
        let mut summed_accuracy = 0f32;
        let mut n_instances = 0;

        for batch in data.batches(batch_size, None::<&mut XorShiftRng>) {
            let batch = batch?;
            let model_loss = model.loss(&batch.inputs, &batch.labels, false)?;

            summed_loss += f32::try_from(&model_loss.loss)? * batch.len() as f32;
            summed_accuracy += f32::try_from(&model_loss.accuracy)? * batch.len() as f32;
            n_instances += batch.len();
        }

        Ok((
            summed_loss / n_instances as f32,
            summed_accuracy / n_instances as f32,
        ))
    })
}

/// Construct a model of type `model_type` and train it.
///
/// The model is trained on `train` for `epochs` epochs with the given
/// batch size and validated on `test` after each epoch. Fails with
/// [`SentimentError::InvalidModelType`] when `model_type` does not name
/// a known architecture.
pub fn train_model(
    model_type: &str,
    vocabulary_size: i64,
    embedding_size: i64,
    train: &LabeledSequences,
    test: &LabeledSequences,
    epochs: usize,
    batch_size: usize,
) -> Result<TrainedModel, SentimentError> {
    Trainer::new(epochs, batch_size).train(
        model_type,
        vocabulary_size,
        embedding_size,
        train,
        test,
        &mut NoopHook,
    )
}
