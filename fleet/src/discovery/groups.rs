//! Group list parsing

/// Split a comma-separated group list, keeping the written order.
///
/// Entries are trimmed and empty entries dropped. Duplicates are kept, each
/// one is processed as written.
pub fn resolve_groups(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(str::to_string)
        .collect()
}
