//! Storage of trained models.
//!
//! A trained model is stored in a directory with two files: the model
//! parameters in `model.ot` and the metadata that is needed to rebuild
//! the model in `metadata.json`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tch::nn::VarStore;
use tch::Device;

use crate::error::SentimentError;
use crate::model::{ModelType, SentimentModel};
use crate::train::TrainedModel;
use crate::vocab::WordIndex;

/// File name of the model parameters.
pub const PARAMETERS_FILE: &str = "model.ot";

/// File name of the model metadata.
pub const METADATA_FILE: &str = "metadata.json";

/// Hyperparameters and vocabulary of a trained model.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelMetadata {
    pub model_type: ModelType,
    pub vocabulary_size: i64,
    pub embedding_size: i64,
    pub max_len: usize,
    pub epochs: usize,
    pub index_from: i64,
    pub word_index: WordIndex,
}

impl ModelMetadata {
    /// Read the metadata from an artifact directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, SentimentError> {
        let path = dir.as_ref().join(METADATA_FILE);
        let read = BufReader::new(File::open(&path)?);
        serde_json::from_reader(read)
            .map_err(|err| SentimentError::JSonSerialization(path.display().to_string(), err))
    }

    fn write(&self, path: &Path) -> Result<(), SentimentError> {
        let mut write = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut write, self)
            .map_err(|err| SentimentError::JSonSerialization(path.display().to_string(), err))?;
        write.flush()?;
        Ok(())
    }
}

/// Write the parameters and metadata of `model` to `dir`.
///
/// The directory is created when it does not exist.
pub fn save_artifacts(
    dir: impl AsRef<Path>,
    model: &TrainedModel,
    metadata: &ModelMetadata,
) -> Result<(), SentimentError> {
    let dir = dir.as_ref();

    if metadata.model_type != model.model_type() {
        return Err(SentimentError::IllegalConfigurationError(format!(
            "metadata is for model type {}, model has type {}",
            metadata.model_type,
            model.model_type()
        )));
    }

    fs::create_dir_all(dir)?;

    model.var_store().save(dir.join(PARAMETERS_FILE))?;
    metadata.write(&dir.join(METADATA_FILE))?;

    log::info!("Saved {} model to {}", metadata.model_type, dir.display());

    Ok(())
}

/// Load a model from an artifact directory.
pub fn load_artifacts(
    dir: impl AsRef<Path>,
    device: Device,
) -> Result<(ModelMetadata, TrainedModel), SentimentError> {
    let dir = dir.as_ref();
    let metadata = ModelMetadata::load(dir)?;

    let mut vs = VarStore::new(device);
    let model = SentimentModel::new(
        vs.root(),
        metadata.model_type,
        metadata.vocabulary_size,
        metadata.embedding_size,
    )?;
    vs.load(dir.join(PARAMETERS_FILE))?;

    Ok((metadata, TrainedModel::new(model, vs, Vec::new())))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use approx::assert_abs_diff_eq;
    use maplit::hashmap;
    use ndarray::{array, Array1};
    use tch::{Device, Tensor};
    use tempfile::TempDir;

    use super::{load_artifacts, save_artifacts, ModelMetadata, METADATA_FILE, PARAMETERS_FILE};
    use crate::error::SentimentError;
    use crate::model::ModelType;
    use crate::tensor::LabeledSequences;
    use crate::train::train_model;
    use crate::vocab::{WordIndex, INDEX_FROM};

    fn metadata(model_type: ModelType) -> ModelMetadata {
        ModelMetadata {
            model_type,
            vocabulary_size: 10,
            embedding_size: 4,
            max_len: 3,
            epochs: 1,
            index_from: INDEX_FROM,
            word_index: WordIndex::new(hashmap! {
                "good".to_string() => 1,
                "bad".to_string() => 2,
            })
            .unwrap(),
        }
    }

    fn data() -> LabeledSequences {
        LabeledSequences::new(
            array![[1, 4, 5], [0, 1, 5], [1, 2, 4], [0, 0, 1]],
            Array1::from(vec![1, 0, 1, 0]),
        )
        .unwrap()
    }

    #[test]
    fn artifacts_are_saved_and_loaded() {
        let tmp_dir = TempDir::new().unwrap();
        let dir = tmp_dir.path().join("artifacts");

        let model = train_model("cnn", 10, 4, &data(), &data(), 1, 2).unwrap();
        save_artifacts(&dir, &model, &metadata(ModelType::Cnn)).unwrap();

        assert!(dir.join(PARAMETERS_FILE).is_file());
        assert!(dir.join(METADATA_FILE).is_file());

        let (loaded_metadata, loaded) = load_artifacts(&dir, Device::Cpu).unwrap();
        assert_eq!(loaded_metadata, metadata(ModelType::Cnn));
        assert_eq!(loaded.layers(), model.layers());
        assert!(loaded.history().is_empty());

        let inputs = Tensor::try_from(data().sequences().clone()).unwrap();
        let original = Vec::<f32>::try_from(&model.predict(&inputs).unwrap()).unwrap();
        let restored = Vec::<f32>::try_from(&loaded.predict(&inputs).unwrap()).unwrap();
        assert_abs_diff_eq!(
            Array1::from(original),
            Array1::from(restored),
            epsilon = 1e-6
        );
    }

    #[test]
    fn metadata_must_match_model() {
        let tmp_dir = TempDir::new().unwrap();
        let model = train_model("lstm", 10, 4, &data(), &data(), 1, 4).unwrap();
        assert!(matches!(
            save_artifacts(tmp_dir.path(), &model, &metadata(ModelType::Cnn)),
            Err(SentimentError::IllegalConfigurationError(_))
        ));
    }

    #[test]
    fn metadata_with_unknown_model_type_is_rejected() {
        let tmp_dir = TempDir::new().unwrap();
        fs::write(
            tmp_dir.path().join(METADATA_FILE),
            r#"{"model_type": "gru", "vocabulary_size": 10, "embedding_size": 4,
                "max_len": 3, "epochs": 1, "index_from": 3, "word_index": {}}"#,
        )
        .unwrap();

        assert!(matches!(
            ModelMetadata::load(tmp_dir.path()),
            Err(SentimentError::JSonSerialization(_, _))
        ));
    }
}
