//! Rendering surface for the binder.

use indicatif::{ProgressBar, ProgressStyle};

use crate::storage::store::ObjectSummary;

/// Everything the binder shows to the user.
pub trait View: Send + Sync + 'static {
    fn greet(&self, name: &str);
    /// Upload progress, 0-100.
    fn progress(&self, percent: u8);
    /// Reset the progress bar to 0.
    fn clear_progress(&self);
    /// Append a preview URL of an uploaded photo.
    fn add_preview(&self, url: &str);
    fn show_files(&self, files: &[ObjectSummary]);
    /// Free-form status line.
    fn notify(&self, message: &str);
}

/// Greeting line for `name`.
pub fn greeting(name: &str) -> String {
    format!("Hello, {name}!")
}

/// Console view with an `indicatif` progress bar.
pub struct TerminalView {
    bar: ProgressBar,
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalView {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template("[{bar:40.cyan/blue}] {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }

    fn print(&self, line: &str) {
        self.bar.suspend(|| println!("{line}"));
    }
}

impl View for TerminalView {
    fn greet(&self, name: &str) {
        self.print(&greeting(name));
    }

    fn progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(format!("uploading ... {percent}%"));
    }

    fn clear_progress(&self) {
        self.bar.set_position(0);
        self.bar.set_message("0%");
        self.bar.finish_and_clear();
        self.bar.reset();
    }

    fn add_preview(&self, url: &str) {
        self.print(&format!("preview: {url}"));
    }

    fn show_files(&self, files: &[ObjectSummary]) {
        if files.is_empty() {
            self.print("(no files)");
            return;
        }
        for file in files {
            self.print(&format!("{:>10}  {}", file.size, file.name));
        }
    }

    fn notify(&self, message: &str) {
        self.print(message);
    }
}
