//! Query string construction for the listing endpoint.

use crate::filters::{AppliedFilters, SortOrder};

const BYTES_PER_KB: i64 = 1024;

/// Map applied filters to query pairs in wire order.
///
/// Empty fields are skipped. Size fields hold kilobytes and are sent as
/// bytes; text with no leading integer is left out rather than reported.
pub fn serialize(applied: &AppliedFilters) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    if !applied.search_term().is_empty() {
        params.push(("search", applied.search_term().to_string()));
    }
    if !applied.file_type().is_empty() {
        params.push(("file_type", applied.file_type().to_string()));
    }
    if let Some(bytes) = kilobytes_to_bytes(applied.min_size()) {
        params.push(("min_size", bytes.to_string()));
    }
    if let Some(bytes) = kilobytes_to_bytes(applied.max_size()) {
        params.push(("max_size", bytes.to_string()));
    }
    // Descending is the server default and is never sent.
    if applied.ordering() == SortOrder::Asc {
        params.push(("sort", SortOrder::Asc.as_str().to_string()));
    }

    params
}

/// Form-encoded query string, empty when no parameter applies.
pub fn to_query_string(applied: &AppliedFilters) -> String {
    serde_urlencoded::to_string(serialize(applied)).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to encode listing query");
        String::new()
    })
}

/// Convert kilobyte text to bytes using its leading integer, so `"4.5"`
/// reads as 4 and `"10kb"` as 10. `None` when there are no leading digits
/// or the product overflows.
pub(crate) fn kilobytes_to_bytes(text: &str) -> Option<i64> {
    let text = text.trim();
    let sign = usize::from(text.starts_with(['+', '-']));
    let digits = text[sign..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    text[..sign + digits].parse::<i64>().ok()?.checked_mul(BYTES_PER_KB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_only() {
        let applied = AppliedFilters::new("invoice", "", "", "", SortOrder::Desc);
        assert_eq!(serialize(&applied), vec![("search", "invoice".to_string())]);
        assert_eq!(to_query_string(&applied), "search=invoice");
    }

    #[test]
    fn test_size_conversion_and_sort() {
        let applied = AppliedFilters::new("a", "", "10", "", SortOrder::Asc);
        assert_eq!(to_query_string(&applied), "search=a&min_size=10240&sort=asc");
    }

    #[test]
    fn test_full_parameter_order() {
        let applied = AppliedFilters::new("q", "text/plain", "1", "2", SortOrder::Asc);
        let keys: Vec<&str> = serialize(&applied).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["search", "file_type", "min_size", "max_size", "sort"]);
    }

    #[test]
    fn test_defaults_produce_empty_query() {
        assert!(serialize(&AppliedFilters::default()).is_empty());
        assert_eq!(to_query_string(&AppliedFilters::default()), "");
    }

    #[test]
    fn test_non_numeric_sizes_are_omitted() {
        let applied = AppliedFilters::new("", "", "ten", "kb10", SortOrder::Desc);
        assert!(applied.is_filtering());
        assert!(serialize(&applied).is_empty());

        let signs_only = AppliedFilters::new("", "", "-", "+.5", SortOrder::Desc);
        assert!(serialize(&signs_only).is_empty());
    }

    #[test]
    fn test_decimal_size_uses_integer_part() {
        let applied = AppliedFilters::new("", "", "", "4.5", SortOrder::Desc);
        assert!(applied.is_filtering());
        assert_eq!(to_query_string(&applied), "max_size=4096");
    }

    #[test]
    fn test_size_parsing_edges() {
        let applied = AppliedFilters::new("", "", " 2 ", "-1", SortOrder::Desc);
        assert_eq!(
            serialize(&applied),
            vec![
                ("min_size", "2048".to_string()),
                ("max_size", "-1024".to_string()),
            ]
        );

        let suffixed = AppliedFilters::new("", "", "10kb", "+3", SortOrder::Desc);
        assert_eq!(to_query_string(&suffixed), "min_size=10240&max_size=3072");
        assert_eq!(kilobytes_to_bytes("1e3"), Some(1024));

        let overflow = AppliedFilters::new("", "", &i64::MAX.to_string(), "", SortOrder::Desc);
        assert!(serialize(&overflow).is_empty());
    }

    #[test]
    fn test_values_are_form_encoded() {
        let applied = AppliedFilters::new("annual report", "application/pdf", "", "", SortOrder::Desc);
        assert_eq!(
            to_query_string(&applied),
            "search=annual+report&file_type=application%2Fpdf"
        );
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let applied = AppliedFilters::new("x&y", "image/png", "7", "8", SortOrder::Asc);
        assert_eq!(serialize(&applied), serialize(&applied));
        assert_eq!(to_query_string(&applied), to_query_string(&applied));
    }
}
