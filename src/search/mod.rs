//! Accent-insensitive text matching for client-side search.
//!
//! The store cannot index normalized substrings, so search runs over already-fetched
//! records: both the term and the field are folded to lowercase ASCII words before a
//! substring comparison.

/// Fold text to lowercase ASCII words joined by single dashes.
///
/// "Cây Hoa Hồng" becomes "cay-hoa-hong"; "đ" folds to "d".
pub fn normalize(text: &str) -> String {
    slug::slugify(text)
}

/// A search term normalized once for repeated matching. An empty term matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    raw: String,
    normalized: String,
}

impl SearchTerm {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.trim().to_string(),
            normalized: normalize(raw),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn matches(&self, haystack: &str) -> bool {
        self.normalized.is_empty() || normalize(haystack).contains(&self.normalized)
    }
}
