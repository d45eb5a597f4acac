//! Key naming shared with deployments that already hold data.

use std::ops::Range;

/// Set of observer identities mirrored from the in-memory registry.
pub const OBSERVERS_SET: &str = "observers";

/// Set of every investor id ever created.
pub const INVESTORS_SET: &str = "investors";

pub fn price_key(symbol: &str) -> String {
    format!("stock:{symbol}")
}

pub fn history_key(symbol: &str) -> String {
    format!("history:{symbol}")
}

pub fn investor_key(id: &str) -> String {
    format!("investor:{id}")
}

/// Maps an inclusive, possibly negative `[start, end]` pair onto a slice range
/// of a list with `len` items. `None` means the selection is empty.
pub fn resolve_range(len: usize, start: i64, end: i64) -> Option<Range<usize>> {
    let len_i = len as i64;
    let norm = |i: i64| if i < 0 { len_i + i } else { i };

    let start = norm(start).max(0);
    let end = norm(end).min(len_i - 1);

    if len == 0 || start > end {
        return None;
    }

    Some(start as usize..end as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_naming_contract() {
        assert_eq!(price_key("ACME"), "stock:ACME");
        assert_eq!(history_key("ACME"), "history:ACME");
        assert_eq!(investor_key("123456"), "investor:123456");
    }

    #[test]
    fn full_range_covers_everything() {
        assert_eq!(resolve_range(4, 0, -1), Some(0..4));
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        assert_eq!(resolve_range(5, -2, -1), Some(3..5));
        assert_eq!(resolve_range(5, 1, -2), Some(1..4));
    }

    #[test]
    fn out_of_bounds_is_clamped() {
        assert_eq!(resolve_range(3, -10, 10), Some(0..3));
        assert_eq!(resolve_range(3, 5, 10), None);
    }

    #[test]
    fn empty_or_inverted_selection_is_none() {
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(4, 3, 1), None);
    }
}
