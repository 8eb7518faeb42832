use crate::error::Error;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
    return;
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened, why, and how to fix it.
/// Designed to be readable by both humans and LLM agents.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::Archive { path, reason } => format!("\
# Error: Archive Unreadable

`{}` could not be read or written: {reason}

## Fix

Check that the file is a document archive and not open elsewhere.
", path.display()),

        Error::DocumentNotFound { path } => format!("\
# Error: Document Not Found

`{}` is not in the enumerated scope.
", path.display()),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),

        Error::Json(e) => format!("\
# Error: JSON Serialization

{e}
"),

        Error::LinkTableCorrupt { path, reason } => format!("\
# Error: Link Table Corrupt

In `{}`: {reason}

A table whose bookkeeping disagrees with its entries is never written back;
the document on disk is untouched. Repair the document in the editor that
produced it before retrying.
", path.display()),

        Error::LocatorNotFound { locator, path } => format!("\
# Error: Reference Vanished

`{locator}` no longer resolves in `{}`.

The document tree changed between finding the reference and rewriting it.
Nothing was written. Re-run the command against the current documents.
", path.display()),

        Error::MalformedDocument { path, reason } => format!("\
# Error: Malformed Document

`{}`: {reason}

The document's tree is missing structure every document is expected to
have, so it was not processed at all.
", path.display()),

        Error::RewriteConflict { end, expected, path, start } => format!("\
# Error: Stale Rewrite

In `{}`: expected `{expected}` at bytes {start}..{end}.

The attribute text changed between finding the reference and rewriting it.
Nothing was written. Re-run the command against the current documents.
", path.display()),

        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

{e}

## Fix

Check the syntax of `.fcx.toml`.
"),

        Error::XmlParse { path, reason } => format!("\
# Error: XML Parse Failed

Could not parse the XML member of `{}`: {reason}
", path.display()),

        Error::XmlWrite { reason } => format!("\
# Error: XML Serialization Failed

{reason}
"),
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn renders_link_table_corruption_with_context() {
        let e = Error::LinkTableCorrupt {
            path: PathBuf::from("Example.FCStd"),
            reason: "count is 3 but table has 2 entries".to_string(),
        };
        let md = render_error(&e);
        assert!(md.contains("# Error: Link Table Corrupt"));
        assert!(md.contains("Example.FCStd"));
        assert!(md.contains("count is 3"));
    }

    #[test]
    fn renders_stale_rewrite_with_span() {
        let e = Error::RewriteConflict {
            end: 23,
            expected: "Main#Spreadsheet.Value".to_string(),
            path: PathBuf::from("Part.FCStd"),
            start: 1,
        };
        let md = render_error(&e);
        assert!(md.contains("bytes 1..23"));
        assert!(md.contains("Nothing was written."));
    }
}
