//! Utility functions for string formatting and manipulation.

pub mod format;

pub use format::{format_optional, truncate_string};
