/// Crate-level error types for fcx operations.
use std::path::PathBuf;

/// All errors in fcx carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the document, locator, or reason
/// for failure.
#[allow(clippy::error_impl_error, reason = "crate-internal error type")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A document archive could not be read or written.
    #[error("archive {}: {reason}", path.display())]
    Archive {
        /// Path to the archive that failed.
        path: PathBuf,
        /// Description of the archive failure.
        reason: String,
    },

    /// A document expected to be in the enumerated scope is missing.
    #[error("document not in scope: {}", path.display())]
    DocumentNotFound {
        /// Path of the missing document.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization failed.
    #[error("json serialize: {0}")]
    Json(
        /// The wrapped JSON serialization error.
        #[from]
        serde_json::Error,
    ),

    /// A link table's bookkeeping attributes disagree with its entries.
    /// Nothing is persisted for the affected document.
    #[error("link table corrupt in {}: {reason}", path.display())]
    LinkTableCorrupt {
        /// Document containing the corrupt table.
        path: PathBuf,
        /// Description of the violated invariant.
        reason: String,
    },

    /// A reference locator no longer resolves to an element in its tree.
    #[error("locator `{locator}` does not resolve in {}", path.display())]
    LocatorNotFound {
        /// Display form of the locator that failed to resolve.
        locator: String,
        /// Document whose tree was searched.
        path: PathBuf,
    },

    /// A document tree is missing required structural containers.
    #[error("malformed document {}: {reason}", path.display())]
    MalformedDocument {
        /// Document with the unexpected tree shape.
        path: PathBuf,
        /// Description of what is missing or wrong.
        reason: String,
    },

    /// The text at a planned rewrite span no longer matches what was found.
    /// The attribute is left untouched rather than partially rewritten.
    #[error("stale rewrite in {}: expected `{expected}` at bytes {start}..{end}", path.display())]
    RewriteConflict {
        /// End of the stale byte span.
        end: usize,
        /// Text the span was expected to contain.
        expected: String,
        /// Document whose attribute changed between find and rewrite.
        path: PathBuf,
        /// Start of the stale byte span.
        start: usize,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// A document's XML member could not be parsed.
    #[error("xml parse {}: {reason}", path.display())]
    XmlParse {
        /// Document whose XML failed to parse.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A document tree could not be serialized back to XML.
    #[error("xml write: {reason}")]
    XmlWrite {
        /// Description of the serialization failure.
        reason: String,
    },
}
