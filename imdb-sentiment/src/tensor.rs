use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use tch::{Device, Kind, Tensor};

use crate::error::SentimentError;
use crate::vocab::PAD_INDEX;

/// Build a fixed-length sequence matrix from variable-length sequences.
///
/// Sequences that are shorter than the maximum length are padded with
/// [`PAD_INDEX`] at the front. Longer sequences are truncated at the
/// front, so that the last indices of a sequence are preserved.
pub struct SequenceBuilder {
    current_sequence: usize,
    sequences: Array2<i64>,
}

impl SequenceBuilder {
    pub fn new(n_sequences: usize, max_len: usize) -> Self {
        SequenceBuilder {
            current_sequence: 0,
            sequences: Array2::from_elem((n_sequences, max_len), PAD_INDEX),
        }
    }

    /// Add a sequence.
    pub fn add(&mut self, sequence: ArrayView1<i64>) {
        assert!(
            self.current_sequence < self.sequences.nrows(),
            "SequenceBuilder is already filled."
        );

        let max_len = self.sequences.ncols();
        let len = sequence.len().min(max_len);

        self.sequences
            .row_mut(self.current_sequence)
            .slice_mut(s![max_len - len..])
            .assign(&sequence.slice(s![sequence.len() - len..]));

        self.current_sequence += 1;
    }

    /// Get the sequence matrix of the sequences added so far.
    pub fn into_sequences(self) -> Array2<i64> {
        let n_sequences = self.current_sequence;
        self.sequences.slice_move(s![..n_sequences, ..])
    }
}

/// Pad or truncate sequences to `max_len`.
pub fn pad_sequences<S>(sequences: &[S], max_len: usize) -> Array2<i64>
where
    S: AsRef<[i64]>,
{
    let mut builder = SequenceBuilder::new(sequences.len(), max_len);
    for sequence in sequences {
        builder.add(ArrayView1::from(sequence.as_ref()));
    }
    builder.into_sequences()
}

/// Sequences with their sentiment labels.
///
/// Label `1` marks a positive review, label `0` a negative review.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabeledSequences {
    sequences: Array2<i64>,
    labels: Array1<i64>,
}

impl LabeledSequences {
    /// Construct labeled sequences from a `samples x time steps` matrix.
    pub fn new(sequences: Array2<i64>, labels: Array1<i64>) -> Result<Self, SentimentError> {
        if sequences.nrows() != labels.len() {
            return Err(SentimentError::IllegalConfigurationError(format!(
                "number of sequences ({}) and labels ({}) differ",
                sequences.nrows(),
                labels.len()
            )));
        }

        Ok(LabeledSequences { sequences, labels })
    }

    /// Construct labeled sequences with a single index per sample.
    pub fn from_indices(indices: Array1<i64>, labels: Array1<i64>) -> Result<Self, SentimentError> {
        Self::new(indices.insert_axis(Axis(1)), labels)
    }

    pub fn sequences(&self) -> &Array2<i64> {
        &self.sequences
    }

    pub fn labels(&self) -> &Array1<i64> {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The largest index in the sequences.
    pub fn max_index(&self) -> Option<i64> {
        self.sequences.iter().copied().max()
    }
}

/// Input and label tensors.
#[derive(Debug, PartialEq)]
pub struct Tensors {
    /// Indices, shape `[batch_size, time_steps]`.
    pub inputs: Tensor,

    /// Labels as floats, shape `[batch_size]`.
    pub labels: Tensor,
}

impl Tensors {
    /// The number of instances.
    pub fn len(&self) -> usize {
        self.labels.size()[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_device(&self, device: Device) -> Self {
        Tensors {
            inputs: self.inputs.to_device(device),
            labels: self.labels.to_device(device),
        }
    }

    /// Iterate over batches of the instances.
    ///
    /// If `rng` is provided, the instances are shuffled before batching.
    pub fn batches<R>(&self, batch_size: usize, rng: Option<&mut R>) -> Batches
    where
        R: Rng,
    {
        assert!(batch_size > 0, "Batch size must be positive");

        let mut order: Vec<i64> = (0..self.len() as i64).collect();
        if let Some(rng) = rng {
            order.shuffle(rng);
        }

        Batches {
            batch_size,
            offset: 0,
            order,
            tensors: self,
        }
    }
}

impl TryFrom<&LabeledSequences> for Tensors {
    type Error = SentimentError;

    fn try_from(sequences: &LabeledSequences) -> Result<Self, Self::Error> {
        Ok(Tensors {
            inputs: Tensor::try_from(sequences.sequences.clone())?,
            labels: Tensor::try_from(sequences.labels.clone())?.f_to_kind(Kind::Float)?,
        })
    }
}

/// Iterator over batches.
pub struct Batches<'a> {
    batch_size: usize,
    offset: usize,
    order: Vec<i64>,
    tensors: &'a Tensors,
}

impl<'a> Batches<'a> {
    /// The total number of batches.
    pub fn n_batches(&self) -> usize {
        (self.order.len() + self.batch_size - 1) / self.batch_size
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = Result<Tensors, SentimentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.order.len() {
            return None;
        }

        let end = (self.offset + self.batch_size).min(self.order.len());
        let indices = Tensor::from_slice(&self.order[self.offset..end])
            .to_device(self.tensors.inputs.device());
        self.offset = end;

        let batch = self
            .tensors
            .inputs
            .f_index_select(0, &indices)
            .and_then(|inputs| {
                Ok(Tensors {
                    inputs,
                    labels: self.tensors.labels.f_index_select(0, &indices)?,
                })
            })
            .map_err(SentimentError::from);

        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;
    use tch::{Kind, Tensor};

    use super::{pad_sequences, LabeledSequences, SequenceBuilder, Tensors};
    use crate::error::SentimentError;

    #[test]
    fn sequences_are_padded_and_truncated_at_the_front() {
        let sequences = vec![vec![1, 2], vec![3, 4, 5], vec![6, 7, 8, 9]];
        assert_eq!(
            pad_sequences(&sequences, 3),
            array![[0, 1, 2], [3, 4, 5], [7, 8, 9]]
        );
    }

    #[test]
    fn builder_returns_added_sequences() {
        let mut builder = SequenceBuilder::new(3, 2);
        builder.add(array![5].view());
        assert_eq!(builder.into_sequences(), array![[0, 5]]);
    }

    #[should_panic]
    #[test]
    fn panics_when_too_many_sequences_added() {
        let mut builder = SequenceBuilder::new(1, 2);
        builder.add(array![1, 2].view());
        builder.add(array![3, 4].view());
    }

    #[test]
    fn label_count_must_match_sequences() {
        assert!(matches!(
            LabeledSequences::new(Array2::zeros((3, 2)), array![0, 1]),
            Err(SentimentError::IllegalConfigurationError(_))
        ));
    }

    #[test]
    fn indices_become_single_step_sequences() {
        let sequences = LabeledSequences::from_indices(array![4, 8, 15], array![1, 0, 1]).unwrap();
        assert_eq!(sequences.sequences(), &array![[4], [8], [15]]);
        assert_eq!(sequences.max_index(), Some(15));
    }

    #[test]
    fn tensors_from_labeled_sequences() {
        let sequences =
            LabeledSequences::new(array![[1, 2, 3], [4, 5, 6]], array![1, 0]).unwrap();
        let tensors = Tensors::try_from(&sequences).unwrap();

        assert_eq!(
            tensors.inputs,
            Tensor::from_slice(&[1i64, 2, 3, 4, 5, 6]).reshape(&[2, 3])
        );
        assert_eq!(tensors.labels, Tensor::from_slice(&[1f32, 0.]));
        assert_eq!(tensors.labels.kind(), Kind::Float);
    }

    #[test]
    fn batches_cover_all_instances() {
        let sequences = LabeledSequences::new(
            array![[1, 1], [2, 2], [3, 3], [4, 4], [5, 5]],
            array![1, 0, 1, 0, 1],
        )
        .unwrap();
        let tensors = Tensors::try_from(&sequences).unwrap();

        let batches = tensors.batches(2, None::<&mut XorShiftRng>);
        assert_eq!(batches.n_batches(), 3);

        let batches = batches.collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(
            batches.iter().map(Tensors::len).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert_eq!(
            batches[2].inputs,
            Tensor::from_slice(&[5i64, 5]).reshape(&[1, 2])
        );
    }

    #[test]
    fn shuffled_batches_keep_inputs_and_labels_aligned() {
        let sequences = LabeledSequences::new(
            array![[0, 10], [1, 11], [0, 12], [1, 13]],
            array![0, 1, 0, 1],
        )
        .unwrap();
        let tensors = Tensors::try_from(&sequences).unwrap();

        let mut rng = XorShiftRng::seed_from_u64(42);
        let mut seen = Vec::new();
        for batch in tensors.batches(3, Some(&mut rng)) {
            let batch = batch.unwrap();
            let first_column = batch.inputs.select(1, 0).to_kind(Kind::Float);
            assert_eq!(first_column, batch.labels);
            seen.extend(Vec::<i64>::try_from(&batch.inputs.select(1, 1).contiguous()).unwrap());
        }

        seen.sort_unstable();
        assert_eq!(seen, vec![10, 11, 12, 13]);
    }
}
