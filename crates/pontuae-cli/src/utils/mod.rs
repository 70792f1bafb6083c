//! Utility functions for terminal output.

pub mod format;

pub use format::{format_date, format_score, progress_bar, truncate_string};
