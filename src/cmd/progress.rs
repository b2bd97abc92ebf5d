//! Spinners for long-running command steps

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn finish_with(spinner: &ProgressBar, template: &str, prefix: &'static str, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(prefix);
    spinner.finish_with_message(message.to_string());
}

pub fn finish_spinner_success(spinner: &ProgressBar, message: &str) {
    finish_with(spinner, "{prefix:.green} {msg}", "✓", message);
}

/// Finished, but with a degraded result (e.g. sample data)
pub fn finish_spinner_warning(spinner: &ProgressBar, message: &str) {
    finish_with(spinner, "{prefix:.yellow} {msg}", "!", message);
}

pub fn finish_spinner_error(spinner: &ProgressBar, message: &str) {
    finish_with(spinner, "{prefix:.red} {msg}", "✗", message);
}
