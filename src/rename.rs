//! Rename engine: rewrites every direct textual reference to a property,
//! plus the property's own alias definition via the owner-document renamer.
//!
//! All mutations are first collected into a rewrite plan against the
//! pristine trees, deduplicated so one textual span is rewritten at most
//! once, then applied span-exactly to clone-on-first-write copies. Spans in
//! the same attribute are applied back to front so earlier offsets stay
//! valid.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::finder;
use crate::owner;
use crate::store::DocumentStore;
use crate::tree::{Element, Locator};
use crate::types::{Query, Reference};
use crate::workset::WorkSet;

/// What a planned rewrite does to its attribute.
pub(crate) enum Action {
    /// Replace an exact byte span, verified against the text found there.
    ReplaceSpan {
        /// Text the span must still contain when the rewrite is applied.
        expected: String,
        /// Text the span is replaced with.
        replacement: String,
        /// Byte range inside the attribute value.
        span: Range<usize>,
    },
    /// Overwrite the attribute value wholesale (alias definitions).
    SetValue {
        /// The new attribute value.
        value: String,
    },
}

/// One planned mutation of one attribute in one document.
pub(crate) struct Rewrite {
    /// What to do to the attribute.
    pub(crate) action: Action,
    /// Name of the attribute being rewritten.
    pub(crate) attribute: String,
    /// Document the rewrite applies to.
    pub(crate) document_path: PathBuf,
    /// Structural path to the element carrying the attribute.
    pub(crate) locator: Locator,
}

/// Rename every direct reference to `document#object.from_property` across
/// the store's documents, returning the mutated trees keyed by path.
/// Documents with no matching reference are absent from the result.
///
/// # Errors
///
/// Returns enumeration errors from the store, `Error::MalformedDocument` for
/// unexpected tree shapes, and `Error::LocatorNotFound` or
/// `Error::RewriteConflict` when a tree changed between find and rewrite.
pub fn rename<S: DocumentStore>(
    store: &S,
    document: &str,
    object: &str,
    from_property: &str,
    to_property: &str,
) -> Result<BTreeMap<PathBuf, Element>, Error> {
    let documents = store.enumerate(None)?;
    return rename_in_documents(&documents, document, object, from_property, to_property);
}

/// Rename across already-parsed documents. See [`rename`].
///
/// # Errors
///
/// As [`rename`], minus store enumeration errors.
pub fn rename_in_documents(
    documents: &[(PathBuf, Element)],
    document: &str,
    object: &str,
    from_property: &str,
    to_property: &str,
) -> Result<BTreeMap<PathBuf, Element>, Error> {
    let from_query = Query::new(document, object, Some(from_property));
    let Some(resolved) = finder::resolve_query(documents, &from_query) else {
        return Ok(BTreeMap::new());
    };

    let references = finder::search_direct(documents, &resolved)?;
    let mut plan: Vec<Rewrite> = references
        .iter()
        .map(|r| return plan_reference(r, &resolved.document, &resolved.object, to_property))
        .collect();

    owner::plan_alias_rename(documents, &resolved, to_property, &mut plan)?;
    discard_overlapping(&mut plan);
    return apply(documents, plan);
}

/// Apply a deduplicated plan to clone-on-first-write copies.
///
/// # Errors
///
/// Returns `Error::LocatorNotFound`, `Error::RewriteConflict`, or
/// `Error::MalformedDocument` when the tree no longer matches the plan.
fn apply(
    documents: &[(PathBuf, Element)],
    plan: Vec<Rewrite>,
) -> Result<BTreeMap<PathBuf, Element>, Error> {
    let mut by_document: BTreeMap<PathBuf, Vec<Rewrite>> = BTreeMap::new();
    for rewrite in plan {
        let document_path = rewrite.document_path.clone();
        by_document.entry(document_path).or_default().push(rewrite);
    }

    let mut workset = WorkSet::new(documents);
    for (path, mut rewrites) in by_document {
        // Back-to-front keeps earlier spans valid within one attribute.
        rewrites.sort_by_key(|r| return std::cmp::Reverse(span_start(r)));
        let root = workset.copy_mut(&path)?;
        for rewrite in &rewrites {
            apply_rewrite(&path, root, rewrite)?;
        }
    }
    return Ok(workset.into_mutated());
}

/// Apply one rewrite to one working copy.
///
/// # Errors
///
/// Returns `Error::LocatorNotFound` when the locator no longer resolves,
/// `Error::MalformedDocument` when the attribute vanished, and
/// `Error::RewriteConflict` when the span's text changed; the attribute is
/// never partially written.
fn apply_rewrite(path: &Path, root: &mut Element, rewrite: &Rewrite) -> Result<(), Error> {
    let Some(element) = rewrite.locator.resolve_mut(root) else {
        return Err(Error::LocatorNotFound {
            locator: rewrite.locator.to_string(),
            path: path.to_path_buf(),
        });
    };

    match &rewrite.action {
        Action::SetValue { value } => {
            element.set_attribute(&rewrite.attribute, value);
        },
        Action::ReplaceSpan { expected, replacement, span } => {
            let current = element.attribute(&rewrite.attribute).ok_or_else(|| {
                return Error::MalformedDocument {
                    path: path.to_path_buf(),
                    reason: format!("attribute `{}` vanished", rewrite.attribute),
                };
            })?;
            let stale = || {
                return Error::RewriteConflict {
                    end: span.end,
                    expected: expected.clone(),
                    path: path.to_path_buf(),
                    start: span.start,
                };
            };
            let found = current.get(span.clone()).ok_or_else(|| return stale())?;
            if found != expected {
                return Err(stale());
            }
            let prefix = current.get(..span.start).ok_or_else(|| return stale())?;
            let suffix = current.get(span.end..).ok_or_else(|| return stale())?;
            let value = format!("{prefix}{replacement}{suffix}");
            element.set_attribute(&rewrite.attribute, &value);
        },
    }
    return Ok(());
}

/// Drop every span replacement that overlaps an earlier-planned one on the
/// same attribute of the same element, so one textual span is rewritten at
/// most once no matter how many passes found it.
fn discard_overlapping(plan: &mut Vec<Rewrite>) {
    let mut kept: Vec<Rewrite> = Vec::new();
    for rewrite in plan.drain(..) {
        let conflicts = kept.iter().any(|k| return rewrites_conflict(k, &rewrite));
        if !conflicts {
            kept.push(rewrite);
        }
    }
    *plan = kept;
    return;
}

/// Plan the span rewrite for one found reference, preserving the
/// qualification level of the matched text: fully qualified text stays fully
/// qualified, object-qualified text keeps its object qualifier, and a bare
/// alias stays bare.
pub(crate) fn plan_reference(
    reference: &Reference,
    to_document: &str,
    to_object: &str,
    to_property: &str,
) -> Rewrite {
    let matched = reference.matched_text.as_str();
    let replacement = if matched.contains('#') {
        format!("{to_document}#{to_object}.{to_property}")
    } else if matched.contains('.') {
        format!("{to_object}.{to_property}")
    } else {
        to_property.to_string()
    };

    return Rewrite {
        action: Action::ReplaceSpan {
            expected: reference.matched_text.clone(),
            replacement,
            span: reference.span.clone(),
        },
        attribute: reference.reference_attribute.clone(),
        document_path: reference.document_path.clone(),
        locator: reference.locator.clone(),
    };
}

/// Whether two planned rewrites would touch the same textual span.
fn rewrites_conflict(a: &Rewrite, b: &Rewrite) -> bool {
    if a.document_path != b.document_path || a.locator != b.locator || a.attribute != b.attribute {
        return false;
    }
    return match (&a.action, &b.action) {
        (
            Action::ReplaceSpan { span: span_a, .. },
            Action::ReplaceSpan { span: span_b, .. },
        ) => finder::spans_overlap(span_a, span_b),
        // Alias definitions live on their own attribute, disjoint from
        // reference attributes.
        _ => false,
    };
}

/// Sort key: span start for replacements, zero for wholesale sets.
fn span_start(rewrite: &Rewrite) -> usize {
    return match &rewrite.action {
        Action::ReplaceSpan { span, .. } => span.start,
        Action::SetValue { .. } => 0,
    };
}
