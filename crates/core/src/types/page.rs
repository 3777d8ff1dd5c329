//! Paginated collection envelope returned by every list endpoint.

use serde::{Deserialize, Serialize};

/// One page of a remote collection.
///
/// Missing fields default to an empty page so that partially-shaped
/// responses still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    /// Total number of items across all pages.
    #[serde(default)]
    pub count: u64,
    /// Absolute URL of the next page.
    #[serde(default)]
    pub next: Option<String>,
    /// Absolute URL of the previous page.
    #[serde(default)]
    pub previous: Option<String>,
}

impl<T> Page<T> {
    /// A single page holding every item, with no neighbours.
    #[must_use]
    pub fn single(results: Vec<T>) -> Self {
        let count = results.len() as u64;
        Self {
            results,
            count,
            next: None,
            previous: None,
        }
    }

    /// Whether a following page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Whether a preceding page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            count: 0,
            next: None,
            previous: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let page: Page<i64> = serde_json::from_str("{}").unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.count, 0);
        assert!(!page.has_next());
    }

    #[test]
    fn test_full_envelope() {
        let page: Page<i64> = serde_json::from_str(
            r#"{"results": [1, 2], "count": 42, "next": "http://api/x/?page=2", "previous": null}"#,
        )
        .unwrap();
        assert_eq!(page.results, vec![1, 2]);
        assert_eq!(page.count, 42);
        assert!(page.has_next());
        assert!(!page.has_previous());
    }
}
