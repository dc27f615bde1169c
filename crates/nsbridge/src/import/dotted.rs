//! Dotted module names

use std::fmt;
use std::sync::Arc;

use crate::reflect::NAMESPACE_SEPARATOR;

/// A dotted module name split into its segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedName {
    full_name: Arc<str>,
    parts: Vec<Arc<str>>,
}

impl DottedName {
    /// Parse a dotted name
    ///
    /// Returns `None` for the empty name and for names with an empty segment
    /// (`.Acme`, `Acme..Widgets`, `Acme.`).
    pub fn parse(name: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }

        let parts: Vec<Arc<str>> = name.split(NAMESPACE_SEPARATOR).map(Arc::from).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return None;
        }

        Some(Self {
            full_name: Arc::from(name),
            parts,
        })
    }

    /// The full dotted name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Every segment, in order
    pub fn parts(&self) -> &[Arc<str>] {
        &self.parts
    }

    /// First segment
    pub fn top_level(&self) -> &str {
        &self.parts[0]
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// Check if there is only one segment
    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }

    /// Name made of the first `depth` segments
    ///
    /// `Acme.Widgets.Gear` at depth 2 is `Acme.Widgets`.
    pub fn name_at_depth(&self, depth: usize) -> String {
        let depth = depth.min(self.parts.len());
        self.parts[..depth]
            .iter()
            .map(|part| part.as_ref())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let name = DottedName::parse("Acme.Widgets.Gear").unwrap();
        assert_eq!(name.depth(), 3);
        assert_eq!(name.top_level(), "Acme");
        assert!(!name.is_simple());
        assert_eq!(name.to_string(), "Acme.Widgets.Gear");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(DottedName::parse("").is_none());
        assert!(DottedName::parse(".Acme").is_none());
        assert!(DottedName::parse("Acme..Widgets").is_none());
        assert!(DottedName::parse("Acme.").is_none());
    }

    #[test]
    fn test_name_at_depth() {
        let name = DottedName::parse("Acme.Widgets.Gear").unwrap();
        assert_eq!(name.name_at_depth(1), "Acme");
        assert_eq!(name.name_at_depth(2), "Acme.Widgets");
        assert_eq!(name.name_at_depth(9), "Acme.Widgets.Gear");
    }
}
