//! Helpers for printing the content of trees and buffers.

/// Formats at most `max_len` values as a list, adding an ellipsis if some are omitted.
pub(crate) fn fmt_truncated<T, F>(values: &[T], max_len: usize, fmt_value: F) -> String
where
    F: Fn(&T) -> String,
{
    let shown = values
        .iter()
        .take(max_len)
        .map(|v| fmt_value(v))
        .collect::<Vec<_>>()
        .join(", ");

    if values.len() <= max_len {
        format!("[{}]", shown)
    } else if max_len == 0 {
        "[...]".to_string()
    } else {
        format!("[{} ...]", shown)
    }
}

/// Formats the levels of a tree, each truncated to `max_len` nodes.
pub(crate) fn fmt_levels<T, F>(levels: &[Vec<T>], max_len: usize, fmt_value: F) -> String
where
    F: Fn(&T) -> String + Copy,
{
    let levels = levels
        .iter()
        .map(|level| fmt_truncated(level, max_len, fmt_value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", levels)
}
