/// Core domain types for cross-document reference queries and results.
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::tree::Locator;

/// Identifies what is being searched for: an object, or one property of an
/// object, referencable from expressions in other documents.
///
/// `document` and `object` may each be given as a name or as a label
/// (a name wrapped in `<<` `>>`); labels are resolved to names against the
/// owner document before any pattern is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Document name or label.
    pub document: String,
    /// Object name or label.
    pub object: String,
    /// Property name; absent for an object-level query that matches any
    /// property reference to the object.
    pub property: Option<String>,
}

impl Query {
    /// Create a query from raw identifier strings.
    pub fn new(document: &str, object: &str, property: Option<&str>) -> Self {
        return Self {
            document: document.to_string(),
            object: object.to_string(),
            property: property.map(str::to_string),
        };
    }
}

impl fmt::Display for Query {
    /// Render in the fully qualified expression form,
    /// `Document#Object.Property` or `Document#Object`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document, self.object)?;
        if let Some(property) = &self.property {
            write!(f, ".{property}")?;
        }
        return Ok(());
    }
}

/// One found cross-document reference. Produced fresh by each finder
/// invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Path of the document containing the reference.
    pub document_path: PathBuf,
    /// Entire attribute value the match was found in, for context.
    pub full_content: String,
    /// Per-entry address: a spreadsheet cell address or an expression path.
    pub location: String,
    /// Structural path to the referencing element, for in-place rewriting.
    pub locator: Locator,
    /// Exact substring recognized as the reference.
    pub matched_text: String,
    /// Name of the object owning the referencing property.
    pub object_name: String,
    /// Name of the attribute-bearing property (e.g. `cells`).
    pub property_name: String,
    /// Which attribute held the matched text.
    pub reference_attribute: String,
    /// Byte range of `matched_text` within `full_content`. Guarantees each
    /// textual span is counted, and later rewritten, at most once.
    pub span: Range<usize>,
}

impl fmt::Display for Reference {
    /// Short human-readable form: document, object.location, attribute.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(
            f,
            "{} {}.{} {}",
            document_name(&self.document_path),
            self.object_name,
            self.location,
            self.reference_attribute,
        );
    }
}

/// Name of the document stored at a path: the file stem of the archive.
pub fn document_name(path: &Path) -> String {
    return path
        .file_stem()
        .map(|stem| return stem.to_string_lossy().into_owned())
        .unwrap_or_default();
}

/// Whether an identifier is written in label form (`<<Label>>`).
pub fn is_label(identifier: &str) -> bool {
    return identifier.starts_with("<<") && identifier.ends_with(">>") && identifier.len() >= 4;
}

/// Strip the label marker, returning the inner label text.
/// Identifiers not in label form are returned unchanged.
pub fn strip_label(identifier: &str) -> &str {
    if !is_label(identifier) {
        return identifier;
    }
    let inner = identifier.get(2..identifier.len().saturating_sub(2));
    return inner.unwrap_or(identifier);
}
