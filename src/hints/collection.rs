//! Hint values and the indexed, immutable hint collection.

use std::collections::HashMap;
use std::sync::Arc;

use crate::a11y::Element;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::Point;

/// A label drawn over one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Hint {
    label: String,
    element: Arc<Element>,
    position: Point,
    matched_prefix: usize,
}

impl Hint {
    /// Creates a hint positioned at the element's center. The label must be
    /// non-empty and uppercase.
    pub fn new(label: impl Into<String>, element: Arc<Element>) -> Result<Self> {
        let label = label.into();
        if label.is_empty() {
            return Err(Error::new(ErrorCode::InvalidInput, "hint label cannot be empty"));
        }
        if label != label.to_uppercase() {
            return Err(Error::new(ErrorCode::InvalidInput, "hint label must be uppercase")
                .with_context("label", &label));
        }
        let position = element.center();
        Ok(Self {
            label,
            element,
            position,
            matched_prefix: 0,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn element(&self) -> &Arc<Element> {
        &self.element
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Number of leading label characters already typed.
    pub fn matched_prefix(&self) -> usize {
        self.matched_prefix
    }

    /// Copy of this hint tagged with a new typed-prefix length.
    pub fn with_matched_prefix(&self, len: usize) -> Self {
        Self {
            matched_prefix: len.min(self.label.chars().count()),
            ..self.clone()
        }
    }

    /// Splits the label into its typed and untyped parts.
    pub fn split_label(&self) -> (&str, &str) {
        let at = self
            .label
            .char_indices()
            .nth(self.matched_prefix)
            .map(|(i, _)| i)
            .unwrap_or(self.label.len());
        self.label.split_at(at)
    }
}

/// Immutable hint set with O(1) label lookup and 1-/2-char prefix buckets.
#[derive(Debug, Clone, Default)]
pub struct HintCollection {
    hints: Vec<Hint>,
    by_label: HashMap<String, usize>,
    by_one: HashMap<String, Vec<usize>>,
    by_two: HashMap<String, Vec<usize>>,
}

impl HintCollection {
    /// Indexes `hints`, rejecting duplicate labels and labels that prefix
    /// another label.
    pub fn new(hints: Vec<Hint>) -> Result<Self> {
        let mut sorted: Vec<&str> = hints.iter().map(|h| h.label()).collect();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            if pair[1].starts_with(pair[0]) {
                let problem = if pair[0] == pair[1] {
                    "duplicate hint label"
                } else {
                    "hint labels are not prefix-free"
                };
                return Err(Error::new(ErrorCode::HintGenerationFailed, problem)
                    .with_context("label", pair[0])
                    .with_context("conflict", pair[1]));
            }
        }

        let mut by_label = HashMap::with_capacity(hints.len());
        let mut by_one: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_two: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, hint) in hints.iter().enumerate() {
            by_label.insert(hint.label.clone(), i);
            let mut chars = hint.label.chars();
            if let Some(first) = chars.next() {
                by_one.entry(first.to_string()).or_default().push(i);
                if let Some(second) = chars.next() {
                    by_two.entry([first, second].iter().collect()).or_default().push(i);
                }
            }
        }

        Ok(Self {
            hints,
            by_label,
            by_one,
            by_two,
        })
    }

    pub fn find(&self, label: &str) -> Option<&Hint> {
        self.by_label
            .get(&label.to_uppercase())
            .map(|&i| &self.hints[i])
    }

    /// Hints whose label starts with `prefix`, in collection order.
    pub fn filter_by_prefix(&self, prefix: &str) -> Vec<&Hint> {
        let prefix = prefix.to_uppercase();
        let bucket = match prefix.chars().count() {
            0 => return self.hints.iter().collect(),
            1 => self.by_one.get(&prefix),
            2 => self.by_two.get(&prefix),
            _ => {
                return self
                    .hints
                    .iter()
                    .filter(|h| h.label.starts_with(&prefix))
                    .collect()
            }
        };
        bucket
            .map(|indices| indices.iter().map(|&i| &self.hints[i]).collect())
            .unwrap_or_default()
    }

    pub fn all(&self) -> &[Hint] {
        &self.hints
    }

    pub fn count(&self) -> usize {
        self.hints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::{ElementId, Role};
    use crate::geometry::Rect;

    fn hint(label: &str) -> Hint {
        let element = Element::new(
            ElementId::new(format!("el-{}", label)),
            Rect::new(0, 0, 20, 10),
            Role::Link,
            true,
            "",
            "",
        )
        .unwrap();
        Hint::new(label, Arc::new(element)).unwrap()
    }

    fn collection(labels: &[&str]) -> HintCollection {
        HintCollection::new(labels.iter().map(|l| hint(l)).collect()).unwrap()
    }

    fn labels(hints: Vec<&Hint>) -> Vec<&str> {
        hints.into_iter().map(|h| h.label()).collect()
    }

    #[test]
    fn hint_position_is_element_center() {
        assert_eq!(hint("A").position(), Point::new(10, 5));
    }

    #[test]
    fn rejects_lowercase_and_empty_labels() {
        let element = Arc::new(
            Element::new(ElementId::new("el"), Rect::new(0, 0, 1, 1), Role::Link, true, "", "")
                .unwrap(),
        );
        assert!(Hint::new("a", element.clone()).is_err());
        assert!(Hint::new("", element).is_err());
    }

    #[test]
    fn rejects_duplicates_and_prefixes() {
        let dup = HintCollection::new(vec![hint("A"), hint("A")]).unwrap_err();
        assert_eq!(dup.code(), ErrorCode::HintGenerationFailed);
        assert!(HintCollection::new(vec![hint("A"), hint("AS")]).is_err());
        assert!(HintCollection::new(vec![hint("SA"), hint("SAD"), hint("D")]).is_err());
    }

    #[test]
    fn bucketed_prefix_lookup_matches_scan() {
        let c = collection(&["A", "S", "DA", "DS", "DDA", "DDS"]);
        for prefix in ["", "A", "D", "DD", "DDA", "DDX", "X", "dd"] {
            let expected: Vec<&str> = c
                .all()
                .iter()
                .map(|h| h.label())
                .filter(|l| l.starts_with(&prefix.to_uppercase()))
                .collect();
            assert_eq!(labels(c.filter_by_prefix(prefix)), expected, "prefix {:?}", prefix);
        }
    }

    #[test]
    fn find_is_case_insensitive() {
        let c = collection(&["A", "SD"]);
        assert_eq!(c.find("sd").map(|h| h.label()), Some("SD"));
        assert!(c.find("S").is_none());
        assert_eq!(c.count(), 2);
        assert!(!c.is_empty());
        assert!(HintCollection::default().is_empty());
    }

    #[test]
    fn split_label_follows_matched_prefix() {
        let h = hint("DDA").with_matched_prefix(2);
        assert_eq!(h.split_label(), ("DD", "A"));
        assert_eq!(hint("DDA").with_matched_prefix(9).matched_prefix(), 3);
    }
}
