//! Recognizer patterns derived from one resolved query.
//!
//! Patterns are built from names only; label identifiers are resolved to
//! names before this module is involved. Every identifier is escaped before
//! being embedded, so names containing regex metacharacters match literally.

use regex::Regex;

/// The recognizers for one query, built once and applied to every attribute
/// value the finder inspects.
pub struct PatternSet {
    /// Matches the qualified expression form `document#object[.property]`.
    fully_qualified: Regex,
    /// Matches `object.property` or bare `property`. Only applied inside the
    /// query's own document, where expressions omit the document qualifier.
    same_document: Option<Regex>,
}

impl PatternSet {
    /// Build recognizers from resolved (label-free) identifiers.
    ///
    /// With no property, only the object-level qualified pattern exists:
    /// it matches any property reference to the object, and there is no
    /// unqualified same-document form.
    ///
    /// # Panics
    ///
    /// Panics if the assembled regex is invalid, which cannot happen for
    /// escaped identifiers (compile-time invariant).
    pub fn build(document: &str, object: &str, property: Option<&str>) -> Self {
        let fully_qualified = match property {
            None => format!(
                r"\b{}#{}\b",
                regex::escape(document),
                regex::escape(object)
            ),
            Some(property) => format!(
                r"\b{}#{}\.{}\b",
                regex::escape(document),
                regex::escape(object),
                regex::escape(property)
            ),
        };

        let same_document = property.map(|property| {
            let pattern = format!(
                r"\b(?:{}\.)?{}\b",
                regex::escape(object),
                regex::escape(property)
            );
            return Regex::new(&pattern).expect("valid regex");
        });

        return Self {
            fully_qualified: Regex::new(&fully_qualified).expect("valid regex"),
            same_document,
        };
    }

    /// The qualified `document#object[.property]` recognizer.
    pub fn fully_qualified(&self) -> &Regex {
        return &self.fully_qualified;
    }

    /// The unqualified same-document recognizer, when the query names a
    /// property.
    pub fn same_document(&self) -> Option<&Regex> {
        return self.same_document.as_ref();
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn fully_qualified_matches_exact_identity() {
        let patterns = PatternSet::build("Main", "Spreadsheet", Some("Value"));
        let m = patterns
            .fully_qualified()
            .find("=Main#Spreadsheet.Value * 2")
            .unwrap();
        assert_eq!(m.as_str(), "Main#Spreadsheet.Value");
    }

    #[test]
    fn fully_qualified_does_not_match_longer_property_names() {
        let patterns = PatternSet::build("Main", "Spreadsheet", Some("Value"));
        assert!(patterns.fully_qualified().find("=Main#Spreadsheet.Value2").is_none());
        assert!(patterns.fully_qualified().find("=XMain#Spreadsheet.Value").is_none());
    }

    #[test]
    fn object_level_query_matches_any_property_reference() {
        let patterns = PatternSet::build("Main", "Spreadsheet", None);
        let m = patterns
            .fully_qualified()
            .find("=Main#Spreadsheet.Whatever + 1")
            .unwrap();
        assert_eq!(m.as_str(), "Main#Spreadsheet");
        assert!(patterns.same_document().is_none());
    }

    #[test]
    fn same_document_matches_qualified_and_bare_forms() {
        let patterns = PatternSet::build("Main", "Spreadsheet", Some("Value"));
        let same_document = patterns.same_document().unwrap();

        let qualified = same_document.find("=Spreadsheet.Value + 1").unwrap();
        assert_eq!(qualified.as_str(), "Spreadsheet.Value");

        let bare = same_document.find("=Value * 3").unwrap();
        assert_eq!(bare.as_str(), "Value");

        assert!(same_document.find("=RenamedValue").is_none());
    }

    #[test]
    fn escapes_special_characters_in_identifiers() {
        let patterns = PatternSet::build("My Doc", "Obj (v1)", Some("Value"));
        assert!(
            patterns
                .fully_qualified()
                .find("My Doc#Obj (v1).Value")
                .is_some()
        );
    }
}
