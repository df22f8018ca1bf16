//! Field name sanitization.
//!
//! Indexing backends interpret `.` in a field name as a path separator, so a
//! label such as `com.docker.compose.service` or a category such as
//! `memory.stat.rss` would be expanded into nested objects. With dedot enabled,
//! every `.` in such a name is replaced with `_`.
//!
//! Rewriting can make two names collide (`a.b` and `a_b`). The entry processed
//! last wins and the other one is dropped.

/// Character treated as a path separator by the destination index.
pub const SEPARATOR: char = '.';
/// Replacement for [`SEPARATOR`].
pub const SUBSTITUTE: char = '_';

/// Replaces every [`SEPARATOR`] in `key` with [`SUBSTITUTE`].
///
/// ```
/// assert_eq!(docker_memory_monitor::dedot::dedot("memory.stat.rss"), "memory_stat_rss");
/// ```
pub fn dedot(key: &str) -> String {
    key.chars()
        .map(|c| if c == SEPARATOR { SUBSTITUTE } else { c })
        .collect()
}

/// Applies [`dedot`] to every key of `fields` if `enabled` is set, otherwise
/// returns `fields` untouched.
pub fn apply<M, V>(fields: M, enabled: bool) -> M
where
    M: IntoIterator<Item = (String, V)> + FromIterator<(String, V)>,
{
    if !enabled {
        return fields;
    }

    fields
        .into_iter()
        .map(|(key, value)| {
            if key.contains(SEPARATOR) {
                (dedot(&key), value)
            } else {
                (key, value)
            }
        })
        .collect()
}
