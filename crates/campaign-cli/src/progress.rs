//! Progress indicators for long-running commands
//!
//! Bars draw to stderr and stay hidden when stderr is not a terminal.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

/// Progress bar over `total` sources
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Spinner for steps of unknown length, such as reading a TAR index
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse() {
        assert!(ProgressStyle::with_template(BAR_TEMPLATE).is_ok());
        assert!(ProgressStyle::with_template(SPINNER_TEMPLATE).is_ok());
    }

    #[test]
    fn test_create_progress_bar() {
        let pb = create_progress_bar(3, "Ingesting");
        pb.inc(2);
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.length(), Some(3));
        pb.finish_and_clear();
    }

    #[test]
    fn test_create_spinner() {
        let pb = create_spinner("Reading TAR index");
        assert_eq!(pb.message(), "Reading TAR index");
        pb.finish_and_clear();
    }
}
