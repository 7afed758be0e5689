use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICK: Duration = Duration::from_millis(80);

/// Spinner for a single backend call of unknown length.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Counts stored files; the message shows the one being saved.
pub fn create_file_progress(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:30.green/dim}] {pos}/{len} {wide_msg}")
            .unwrap()
            .progress_chars("#- "),
    );
    pb.set_prefix("Storing");
    pb.enable_steady_tick(TICK);
    pb
}
