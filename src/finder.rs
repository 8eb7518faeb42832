//! Reference finder: walks every document in scope and emits a `Reference`
//! for each attribute value whose text denotes the queried entity.
//!
//! Three addressing modes are recognized: fully qualified
//! (`Document#Object.Property`), same-document qualified (`Object.Property`),
//! and bare alias (`Property`), the latter two only inside the query's own
//! document. Alias indirection is driven by an explicit work list with a
//! visited set, so alias chains terminate even when they form a cycle.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::kinds;
use crate::patterns::PatternSet;
use crate::store::DocumentStore;
use crate::tree::{Element, Locator};
use crate::types::{Query, Reference, document_name, is_label, strip_label};

/// A reference found in one document, plus the alias carried by the matched
/// entry when alias indirection applies to it.
pub(crate) struct Found {
    /// Alias defined on the matched entry, if any.
    pub(crate) alias: Option<String>,
    /// The found reference.
    pub(crate) reference: Reference,
}

/// A query whose label identifiers have been resolved to names, ready for
/// pattern construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    /// Document name.
    pub document: String,
    /// Object name.
    pub object: String,
    /// Property name, if the query targets one property.
    pub property: Option<String>,
}

/// Find every reference to the queried entity across the store's documents.
///
/// # Errors
///
/// Returns enumeration errors from the store, or `Error::MalformedDocument`
/// when a document's tree is missing required structure.
pub fn find<S: DocumentStore>(store: &S, query: &Query) -> Result<Vec<Reference>, Error> {
    let documents = store.enumerate(None)?;
    return find_in_documents(&documents, query);
}

/// Find every reference to the queried entity across already-parsed
/// documents. A query whose labels resolve to nothing yields an empty list.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` when a document's tree is missing
/// required structure.
pub fn find_in_documents(
    documents: &[(PathBuf, Element)],
    query: &Query,
) -> Result<Vec<Reference>, Error> {
    let Some(resolved) = resolve_query(documents, query) else {
        return Ok(Vec::new());
    };
    return search(documents, &resolved);
}

/// Group references by the document they were found in, preserving the
/// within-document order.
pub fn group_by_document(references: Vec<Reference>) -> BTreeMap<PathBuf, Vec<Reference>> {
    let mut grouped: BTreeMap<PathBuf, Vec<Reference>> = BTreeMap::new();
    for reference in references {
        let document_path = reference.document_path.clone();
        grouped.entry(document_path).or_default().push(reference);
    }
    return grouped;
}

/// Resolve a query's label identifiers to names against the scope.
///
/// Returns `None`, after a debug log, when a label matches no document or no
/// object; a label matching several documents resolves to the first in
/// enumeration order with a warning.
pub fn resolve_query(documents: &[(PathBuf, Element)], query: &Query) -> Option<ResolvedQuery> {
    let document = if is_label(&query.document) {
        let label = strip_label(&query.document);
        let (path, _) = find_document_by_label(documents, label)?;
        document_name(path)
    } else {
        query.document.clone()
    };

    let object = if is_label(&query.object) {
        let label = strip_label(&query.object);
        let owner = documents
            .iter()
            .find(|(path, _)| return document_name(path) == document);
        let Some((_, root)) = owner else {
            log::debug!("no document named `{document}` in scope");
            return None;
        };
        find_object_name_by_label(root, label)?.to_string()
    } else {
        query.object.clone()
    };

    return Some(ResolvedQuery {
        document,
        object,
        property: query.property.clone(),
    });
}

/// Search already-parsed documents for a resolved query, following alias
/// indirection through a work list until no new alias queries appear.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` when a document's tree is missing
/// required structure.
pub fn search(
    documents: &[(PathBuf, Element)],
    query: &ResolvedQuery,
) -> Result<Vec<Reference>, Error> {
    let mut pending: VecDeque<ResolvedQuery> = VecDeque::new();
    let mut visited: HashSet<(String, String, String)> = HashSet::new();
    visited.insert(visit_key(query));
    pending.push_back(query.clone());

    let mut references: Vec<Reference> = Vec::new();
    while let Some(current) = pending.pop_front() {
        let patterns =
            PatternSet::build(&current.document, &current.object, current.property.as_deref());
        for (path, root) in documents {
            let own_document = document_name(path) == current.document;
            for item in search_document(path, root, &patterns, own_document)? {
                if let Some(alias) = item.alias {
                    let derived = ResolvedQuery {
                        document: document_name(path),
                        object: item.reference.object_name.clone(),
                        property: Some(alias),
                    };
                    if visited.insert(visit_key(&derived)) {
                        pending.push_back(derived);
                    }
                }
                if !references.contains(&item.reference) {
                    references.push(item.reference);
                }
            }
        }
    }
    return Ok(references);
}

/// Label assigned to an element that owns a `Properties` child
/// (the document root, or one object element).
fn container_label(container: &Element) -> Option<&str> {
    let properties = container.child("Properties")?;
    let label_property = properties
        .children_named("Property")
        .find(|p| return p.attribute("name") == Some("Label"))?;
    let value_child = label_property
        .children
        .iter()
        .find(|c| return c.attribute("value").is_some())?;
    return value_child.attribute("value");
}

/// First document whose document-level label equals `label`.
/// Warns when several documents carry the label.
fn find_document_by_label<'a>(
    documents: &'a [(PathBuf, Element)],
    label: &str,
) -> Option<&'a (PathBuf, Element)> {
    let mut matching = documents
        .iter()
        .filter(|(_, root)| return container_label(root) == Some(label));
    let first = matching.next();
    match first {
        None => log::debug!("no document labeled `{label}` in scope"),
        Some((path, _)) => {
            if matching.next().is_some() {
                log::warn!(
                    "more than one document labeled `{label}`; picking first: {}",
                    path.display()
                );
            }
        },
    }
    return first;
}

/// Name of the first object in a document whose label equals `label`.
fn find_object_name_by_label<'a>(root: &'a Element, label: &str) -> Option<&'a str> {
    let object_data = root.child("ObjectData")?;
    let object = object_data
        .children_named("Object")
        .find(|o| return container_label(o) == Some(label));
    let Some(object) = object else {
        log::debug!("no object labeled `{label}`");
        return None;
    };
    return object.attribute("name");
}

/// Build a malformed-document error for a path.
fn malformed(path: &Path, reason: &str) -> Error {
    return Error::MalformedDocument {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
}

/// Scan one attribute value: the fully qualified pattern first, then the
/// same-document pattern, keeping at most one match per pattern and
/// discarding any match whose span overlaps a span already counted, so one
/// textual span is never counted twice.
fn match_attribute(
    patterns: &PatternSet,
    own_document: bool,
    content: &str,
) -> Vec<(Range<usize>, String)> {
    let mut matches: Vec<(Range<usize>, String)> = Vec::new();

    if let Some(found) = patterns.fully_qualified().find(content) {
        matches.push((found.range(), found.as_str().to_string()));
    }

    if own_document {
        if let Some(same_document) = patterns.same_document() {
            for found in same_document.find_iter(content) {
                let range = found.range();
                let overlapping = matches
                    .iter()
                    .any(|(span, _)| return spans_overlap(span, &range));
                if !overlapping {
                    matches.push((range, found.as_str().to_string()));
                    break;
                }
            }
        }
    }

    return matches;
}

/// Single-pass search for one resolved query, without alias indirection.
/// The rename engine rewrites exactly these direct matches: a reference
/// reached through an alias denotes the alias, not the queried property, and
/// must keep its own text.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` when a document's tree is missing
/// required structure.
pub(crate) fn search_direct(
    documents: &[(PathBuf, Element)],
    query: &ResolvedQuery,
) -> Result<Vec<Reference>, Error> {
    let patterns = PatternSet::build(&query.document, &query.object, query.property.as_deref());
    let mut references = Vec::new();
    for (path, root) in documents {
        let own_document = document_name(path) == query.document;
        for item in search_document(path, root, &patterns, own_document)? {
            references.push(item.reference);
        }
    }
    return Ok(references);
}

/// Walk one document's object/property tree and collect matches against the
/// current pattern set.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` when required containers or attributes
/// are missing; the document is not partially processed.
pub(crate) fn search_document(
    path: &Path,
    root: &Element,
    patterns: &PatternSet,
    own_document: bool,
) -> Result<Vec<Found>, Error> {
    let object_data = root
        .child("ObjectData")
        .ok_or_else(|| return malformed(path, "missing ObjectData"))?;

    let mut found = Vec::new();
    for object in object_data.children_named("Object") {
        let object_name = object
            .attribute("name")
            .ok_or_else(|| return malformed(path, "Object without name attribute"))?;
        let properties = object
            .child("Properties")
            .ok_or_else(|| return malformed(path, "Object without Properties container"))?;

        for property in properties.children_named("Property") {
            let property_name = property
                .attribute("name")
                .ok_or_else(|| return malformed(path, "Property without name attribute"))?;
            let Some(kind) = kinds::spec_for_property(property_name) else {
                continue;
            };
            let container = property.child(kind.nested_tag).ok_or_else(|| {
                return malformed(path, "reference-bearing property without its container");
            })?;

            for entry in container.children_named(kind.entry_tag) {
                let location = entry.attribute(kind.location_attribute).ok_or_else(|| {
                    return malformed(path, "entry without location attribute");
                })?;

                for reference_attribute in kind.reference_attributes {
                    let Some(content) = entry.attribute(reference_attribute) else {
                        continue;
                    };
                    for (span, matched_text) in match_attribute(patterns, own_document, content) {
                        let locator = Locator::default()
                            .child("ObjectData")
                            .child_where("Object", "name", object_name)
                            .child("Properties")
                            .child_where("Property", "name", property_name)
                            .child(kind.nested_tag)
                            .child_where(kind.entry_tag, kind.location_attribute, location);
                        let alias = kind
                            .alias_attribute
                            .and_then(|a| return entry.attribute(a))
                            .map(str::to_string);
                        found.push(Found {
                            alias,
                            reference: Reference {
                                document_path: path.to_path_buf(),
                                full_content: content.to_string(),
                                location: location.to_string(),
                                locator,
                                matched_text,
                                object_name: object_name.to_string(),
                                property_name: property_name.to_string(),
                                reference_attribute: (*reference_attribute).to_string(),
                                span,
                            },
                        });
                    }
                }
            }
        }
    }
    return Ok(found);
}

/// Whether two byte spans intersect.
pub(crate) fn spans_overlap(a: &Range<usize>, b: &Range<usize>) -> bool {
    return a.start < b.end && b.start < a.end;
}

/// Visited-set key for alias-indirection termination.
fn visit_key(query: &ResolvedQuery) -> (String, String, String) {
    return (
        query.document.clone(),
        query.object.clone(),
        query.property.clone().unwrap_or_default(),
    );
}
