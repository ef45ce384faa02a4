use anyhow::Result;
use imdb_sentiment::train::{EpochStats, TrainHook};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for training epochs.
///
/// A new progress bar is shown for every epoch. The bar is finished
/// with the validation results when the epoch is completed.
pub struct TrainProgress {
    progress_bar: Option<ProgressBar>,
    style: ProgressStyle,
}

impl TrainProgress {
    pub fn new() -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("[Time: {elapsed_precise}, ETA: {eta_precise}] {bar} {percent}% {msg}")?;

        Ok(TrainProgress {
            progress_bar: None,
            style,
        })
    }
}

impl TrainHook for TrainProgress {
    fn batch_completed(&mut self, epoch: usize, batch: usize, n_batches: usize, loss: f32) {
        let style = &self.style;
        let progress_bar = self.progress_bar.get_or_insert_with(|| {
            let progress_bar = ProgressBar::new(n_batches as u64);
            progress_bar.set_style(style.clone());
            progress_bar
        });

        progress_bar.set_position(batch as u64 + 1);
        progress_bar.set_message(format!("epoch: {}, loss: {:.4}", epoch, loss));
    }

    fn epoch_completed(&mut self, stats: &EpochStats) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_with_message(format!(
                "epoch: {}, validation loss: {:.4}, validation acc: {:.4}",
                stats.epoch, stats.validation_loss, stats.validation_accuracy
            ));
        }
    }
}
