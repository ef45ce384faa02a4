use std::fs::File;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use imdb_sentiment::artifacts::{save_artifacts, ModelMetadata};
use imdb_sentiment::config::{TomlRead, TrainConfig};
use imdb_sentiment::dataset::{ImdbDataSet, Split};
use imdb_sentiment::train::Trainer;
use imdb_sentiment::{WordIndex, INDEX_FROM};
use tch::Device;

use crate::progress::TrainProgress;
use crate::traits::SentimentApp;

const ARTIFACTS_DIR: &str = "ARTIFACTS_DIR";
const BATCH_SIZE: &str = "BATCH_SIZE";
const CONFIG: &str = "CONFIG";
const DATA_DIR: &str = "DATA_DIR";
const EPOCHS: &str = "EPOCHS";
const GPU: &str = "GPU";
const MODEL_TYPE: &str = "MODEL_TYPE";
const WORD_INDEX: &str = "WORD_INDEX";

pub struct TrainApp {
    artifacts_dir: String,
    config: TrainConfig,
    data_dir: String,
    device: Device,
    model_type: String,
    word_index: Option<String>,
}

impl TrainApp {
    fn load_config(path: Option<&String>) -> Result<TrainConfig> {
        match path {
            Some(path) => {
                let f = File::open(path)
                    .context(format!("Cannot open configuration file: {}", path))?;
                TrainConfig::from_toml_read(f)
                    .context(format!("Cannot read configuration file: {}", path))
            }
            None => Ok(TrainConfig::default()),
        }
    }

    fn word_index(&self, data_set: &ImdbDataSet) -> Result<WordIndex> {
        match &self.word_index {
            Some(path) => {
                WordIndex::open(path).context(format!("Cannot read word index: {}", path))
            }
            None => Ok(data_set.word_index()),
        }
    }
}

impl SentimentApp for TrainApp {
    fn app() -> Command {
        Command::new("train")
            .arg_required_else_help(true)
            .about("Train a sentiment classifier")
            .arg(
                Arg::new(MODEL_TYPE)
                    .help("Model type (bidirectional_lstm, cnn or lstm)")
                    .index(1)
                    .required(true),
            )
            .arg(
                Arg::new(DATA_DIR)
                    .help("IMDB review corpus directory")
                    .index(2)
                    .required(true),
            )
            .arg(
                Arg::new(ARTIFACTS_DIR)
                    .help("Output directory for the trained model")
                    .index(3)
                    .required(true),
            )
            .arg(
                Arg::new(CONFIG)
                    .long("config")
                    .value_name("FILE")
                    .num_args(1)
                    .help("Training configuration file"),
            )
            .arg(
                Arg::new(BATCH_SIZE)
                    .long("batch-size")
                    .value_name("N")
                    .num_args(1)
                    .help("Batch size (overrides the configuration)"),
            )
            .arg(
                Arg::new(EPOCHS)
                    .long("epochs")
                    .value_name("N")
                    .num_args(1)
                    .help("Number of training epochs (overrides the configuration)"),
            )
            .arg(
                Arg::new(GPU)
                    .long("gpu")
                    .num_args(1)
                    .help("Use the GPU with the given identifier"),
            )
            .arg(
                Arg::new(WORD_INDEX)
                    .long("word-index")
                    .value_name("FILE")
                    .num_args(1)
                    .help("Use this word index rather than building one from the corpus"),
            )
    }

    fn parse(matches: &ArgMatches) -> Result<Self> {
        let model_type = matches.get_one::<String>(MODEL_TYPE).unwrap().to_owned();
        let data_dir = matches.get_one::<String>(DATA_DIR).unwrap().to_owned();
        let artifacts_dir = matches.get_one::<String>(ARTIFACTS_DIR).unwrap().to_owned();

        let mut config = Self::load_config(matches.get_one::<String>(CONFIG))?;
        if let Some(batch_size) = matches.get_one::<String>(BATCH_SIZE) {
            config.training.batch_size = batch_size
                .parse()
                .context(format!("Cannot parse batch size: {}", batch_size))?;
        }
        if let Some(epochs) = matches.get_one::<String>(EPOCHS) {
            config.training.epochs = epochs
                .parse()
                .context(format!("Cannot parse number of epochs: {}", epochs))?;
        }
        config.validate().context("Invalid training configuration")?;

        let device = match matches.get_one::<String>(GPU) {
            Some(gpu) => Device::Cuda(
                gpu.parse()
                    .context(format!("Cannot parse GPU number ({})", gpu))?,
            ),
            None => Device::Cpu,
        };

        let word_index = matches.get_one::<String>(WORD_INDEX).map(ToOwned::to_owned);

        Ok(TrainApp {
            artifacts_dir,
            config,
            data_dir,
            device,
            model_type,
            word_index,
        })
    }

    fn run(&self) -> Result<()> {
        // Fail early, before reading the corpus.
        let model_type = self.model_type.parse()?;

        let data_set = ImdbDataSet::open(&self.data_dir)
            .context(format!("Cannot read IMDB corpus from {}", self.data_dir))?;
        let word_index = self.word_index(&data_set)?;
        log::info!("Word index contains {} words", word_index.len());

        let data_config = &self.config.data;
        let train = data_set
            .encode(
                Split::Train,
                &word_index,
                data_config.vocabulary_size,
                data_config.max_len,
            )
            .context("Cannot encode training reviews")?;
        let test = data_set
            .encode(
                Split::Test,
                &word_index,
                data_config.vocabulary_size,
                data_config.max_len,
            )
            .context("Cannot encode test reviews")?;

        let vocabulary_size = data_config.vocabulary_size as i64;
        let mut progress = TrainProgress::new()?;
        let model = Trainer::from_config(&self.config)
            .device(self.device)
            .train(
                &self.model_type,
                vocabulary_size,
                self.config.model.embedding_size,
                &train,
                &test,
                &mut progress,
            )
            .context("Cannot train model")?;

        if let Some(stats) = model.history().last() {
            log::info!(
                "Final validation loss: {:.4}, acc: {:.4}",
                stats.validation_loss,
                stats.validation_accuracy
            );
        }

        let metadata = ModelMetadata {
            model_type,
            vocabulary_size,
            embedding_size: self.config.model.embedding_size,
            max_len: data_config.max_len,
            epochs: self.config.training.epochs,
            index_from: INDEX_FROM,
            word_index,
        };

        save_artifacts(&self.artifacts_dir, &model, &metadata).context(format!(
            "Cannot write model artifacts to {}",
            self.artifacts_dir
        ))
    }
}
