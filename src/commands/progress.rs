// src/commands/progress.rs
//! Terminal progress bar fed by a completion tree

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use zif::ProgressObserver;

/// Progress bar showing the root percentage, with the active
/// sub-operation's percentage in the message
pub struct BarProgress {
    bar: ProgressBar,
    label: String,
}

impl BarProgress {
    /// Create a visible bar labelled with the operation name
    pub fn new(label: &str) -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:24} [{bar:40.green/dim}] {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Arc::new(Self {
            bar,
            label: label.to_string(),
        })
    }

    /// A bar that never draws, for `--quiet` and `--json`
    pub fn hidden(label: &str) -> Arc<Self> {
        Arc::new(Self {
            bar: ProgressBar::hidden(),
            label: label.to_string(),
        })
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for BarProgress {
    fn percentage_changed(&self, percentage: u32) {
        self.bar.set_position(u64::from(percentage));
        if percentage == 100 {
            self.bar.set_message(self.label.clone());
        }
    }

    fn subpercentage_changed(&self, percentage: u32) {
        self.bar.set_message(format!("{} ({}%)", self.label, percentage));
    }
}
