//! Path normalization for per-endpoint aggregation.
//!
//! Variable segments are replaced so that every request to the same route
//! lands on one endpoint key (and one Prometheus label value).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{ID_PLACEHOLDER, MIN_TOKEN_SEGMENT_LEN, TOKEN_PLACEHOLDER};

// UUID pattern: 8-4-4-4-12 hex chars
static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("UUID segment pattern is a valid regex")
});

/// Normalize a request path.
///
/// - UUID segments and all-digit segments become `:id`
/// - alphanumeric segments of at least 20 characters become `:token`
///
/// The id rules are checked first, so a long numeric segment is an `:id`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(normalize_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_segment(segment: &str) -> &str {
    if is_id_segment(segment) {
        ID_PLACEHOLDER
    } else if is_token_segment(segment) {
        TOKEN_PLACEHOLDER
    } else {
        segment
    }
}

fn is_id_segment(segment: &str) -> bool {
    let numeric = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
    numeric || UUID_SEGMENT.is_match(segment)
}

fn is_token_segment(segment: &str) -> bool {
    segment.len() >= MIN_TOKEN_SEGMENT_LEN && segment.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/cars/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/cars/:id");
    }

    #[test]
    fn test_normalize_path_numeric_id() {
        assert_eq!(normalize_path("/api/bookings/12345"), "/api/bookings/:id");
    }

    #[test]
    fn test_normalize_path_token() {
        let path = "/api/verify/a8Fk29dLq0ZxPq1mN7tBv3";
        assert_eq!(normalize_path(path), "/api/verify/:token");
    }

    #[test]
    fn test_normalize_path_short_alphanumeric_kept() {
        assert_eq!(normalize_path("/api/cars/category/suv"), "/api/cars/category/suv");
        // 19 characters, one short of a token
        assert_eq!(
            normalize_path("/api/verify/abcdefghij123456789"),
            "/api/verify/abcdefghij123456789"
        );
    }

    #[test]
    fn test_normalize_path_long_number_is_id() {
        assert_eq!(
            normalize_path("/api/orders/123456789012345678901234"),
            "/api/orders/:id"
        );
    }

    #[test]
    fn test_normalize_path_mixed() {
        let path = "/api/auctions/550e8400-e29b-41d4-a716-446655440000/bids/42";
        assert_eq!(normalize_path(path), "/api/auctions/:id/bids/:id");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/health/ping"), "/health/ping");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_hyphenated_words_not_tokens() {
        assert_eq!(
            normalize_path("/api/services/category/full-service-and-mot-check"),
            "/api/services/category/full-service-and-mot-check"
        );
    }
}
