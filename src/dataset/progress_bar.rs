//! Progress reporting for the dataset build (feature `progress`).
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::constants::SequenceId;

const TEMPLATE: &str = "{bar:40.cyan/blue} {pos}/{len} files ({percent:>3}%) \
     | {per_sec} | {elapsed_precise} / ETA {eta_precise} | {msg}";

/// Progress bar over the files of a dataset build.
pub struct FileProgress {
    bar: ProgressBar,
}

impl FileProgress {
    pub fn new(num_files: usize) -> Self {
        let bar = ProgressBar::new(num_files as u64);
        let style =
            ProgressStyle::with_template(TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(200));
        FileProgress { bar }
    }

    /// Mark one file as processed.
    pub fn file_done(&self, sequence_id: SequenceId, windows: usize) {
        self.bar
            .set_message(format!("{sequence_id}: {windows} windows"));
        self.bar.inc(1);
    }

    pub fn finish(self) {
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }
}
