//! Target path parsing
//!
//! A target path says where a value lands in the output record:
//!
//! ```text
//! customer.name          → { "customer": { "name": v } }
//! items[].sku            → { "items": [ { "sku": v } ] }
//! order.lines[0].qty     → { "order": { "lines": [ { "qty": v } ] } }
//! ```
//!
//! Every column of a row that targets the same array root name shares one
//! element. A numeric index is accepted but does not pick an element.

use once_cell::sync::Lazy;
use regex::Regex;

/// `[]` or `[N]` anywhere in the path.
static ARRAY_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d*\]").unwrap());

/// `word[]` or `word[N]` inside one segment.
static ARRAY_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\[(\d*)\]").unwrap());

/// A parsed target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPath {
    /// Plain object nesting. All segments but the last are objects; the last
    /// one is the key assigned.
    Scalar { segments: Vec<String> },

    /// A value inside the row's element of an array.
    Array {
        /// Objects leading to the object holding the array
        prefix: Vec<String>,
        /// Name of the array
        root: String,
        /// Index written in the path, if any
        index: Option<usize>,
        /// Key path inside the element
        inner: Vec<String>,
    },
}

impl TargetPath {
    pub fn is_array(&self) -> bool {
        matches!(self, TargetPath::Array { .. })
    }
}

/// Parse a target path. Returns `None` when the path cannot be written to:
/// blank, or bracketed without a name in front of the brackets.
pub fn resolve(target: &str) -> Option<TargetPath> {
    let path = target.trim();
    if path.is_empty() {
        return None;
    }

    if !ARRAY_MARKER.is_match(path) {
        return Some(TargetPath::Scalar {
            segments: split_segments(path),
        });
    }

    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let Some(caps) = ARRAY_SEGMENT.captures(segment) else {
            continue;
        };
        let (Some(whole), Some(root)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let index = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());

        let mut inner: Vec<String> = Vec::new();
        let rest = &segment[whole.end()..];
        if !rest.is_empty() {
            inner.push(rest.to_string());
        }
        inner.extend(segments[i + 1..].iter().map(|s| s.to_string()));
        if inner.is_empty() {
            inner.push(String::new());
        }

        return Some(TargetPath::Array {
            prefix: segments[..i].iter().map(|s| s.to_string()).collect(),
            root: root.as_str().to_string(),
            index,
            inner,
        });
    }

    None
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scalar_paths() {
        assert_eq!(
            resolve(" customer.address.city "),
            Some(TargetPath::Scalar {
                segments: segs(&["customer", "address", "city"])
            })
        );
        assert_eq!(
            resolve("name"),
            Some(TargetPath::Scalar {
                segments: segs(&["name"])
            })
        );
        assert_eq!(
            resolve("a..b"),
            Some(TargetPath::Scalar {
                segments: segs(&["a", "", "b"])
            })
        );
    }

    #[test]
    fn test_blank_path() {
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("   "), None);
    }

    #[test]
    fn test_array_paths() {
        assert_eq!(
            resolve("items[].id"),
            Some(TargetPath::Array {
                prefix: vec![],
                root: "items".into(),
                index: None,
                inner: segs(&["id"]),
            })
        );
        assert_eq!(
            resolve("order.lines[2].product.sku"),
            Some(TargetPath::Array {
                prefix: segs(&["order"]),
                root: "lines".into(),
                index: Some(2),
                inner: segs(&["product", "sku"]),
            })
        );
    }

    #[test]
    fn test_array_segment_remainder_joins_inner_path() {
        assert_eq!(
            resolve("items[]extra.id"),
            Some(TargetPath::Array {
                prefix: vec![],
                root: "items".into(),
                index: None,
                inner: segs(&["extra", "id"]),
            })
        );
    }

    #[test]
    fn test_array_without_inner_key() {
        assert_eq!(
            resolve("tags[]"),
            Some(TargetPath::Array {
                prefix: vec![],
                root: "tags".into(),
                index: None,
                inner: segs(&[""]),
            })
        );
    }

    #[test]
    fn test_marker_without_name_is_unwritable() {
        assert_eq!(resolve("[]"), None);
        assert_eq!(resolve("a.[0]"), None);
    }

    #[test]
    fn test_non_numeric_brackets_are_plain_keys() {
        assert_eq!(
            resolve("a[x].b"),
            Some(TargetPath::Scalar {
                segments: segs(&["a[x]", "b"])
            })
        );
    }

    #[test]
    fn test_unicode_root_name_kept_whole() {
        assert_eq!(
            resolve("données[].valeur"),
            Some(TargetPath::Array {
                prefix: vec![],
                root: "données".into(),
                index: None,
                inner: segs(&["valeur"]),
            })
        );
    }
}
