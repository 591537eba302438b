use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// A progress bar over a known number of items, drawn on stderr.
pub struct ItemProgress {
    pb: ProgressBar,
}

impl ItemProgress {
    pub fn new(total: u64, message: impl Into<String>) -> Self {
        let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr())
            .with_style(Self::bar_style())
            .with_message(message.into());
        Self { pb }
    }

    /// Advances by one item and shows `current` next to the bar.
    pub fn step(&self, current: &str) {
        self.pb.set_message(current.to_string());
        self.pb.inc(1);
    }

    /// Prints a line above the bar.
    pub fn println(&self, line: impl AsRef<str>) {
        self.pb.println(line.as_ref());
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.pb.finish_with_message(message.into());
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<30} [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("Failed to create bar style template")
            .progress_chars("##-")
    }
}
