//! Shared helpers for rendering `FilterError` values.

use std::fmt::Write as _;

use filter_errors::{FilterError, FilterResult};

/// Convenient alias for filter results used across the crate.
pub type Result<T> = FilterResult<T>;

/// Render an error with its code, context, and cause chain on one line.
///
/// Build scripts usually end in `panic!("{}", render_error(&err))`, so the
/// whole story has to fit in the single message Cargo prints.
pub fn render_error(err: &FilterError) -> String {
    let mut message = err.to_string();
    if let Some(source) = err.source_ref() {
        let _ = write!(&mut message, ": caused by {}", source);
    }
    message
}
