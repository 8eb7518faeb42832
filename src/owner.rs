//! Owner-document renamer: renames the defining alias itself.
//!
//! Pure text substitution cannot rename a property's definition, because the
//! definition is structural (an alias attribute on a tabular entry), not a
//! textual expression. This module locates the owning document and object,
//! rewrites the alias definition, and re-resolves same-document references
//! to the old name. Its output is contributed to the rename engine's shared
//! plan so every textual span is still rewritten at most once.

use std::path::PathBuf;

use crate::error::Error;
use crate::finder;
use crate::finder::ResolvedQuery;
use crate::kinds;
use crate::rename::{Action, Rewrite, plan_reference};
use crate::tree::{Element, Locator};
use crate::types::document_name;

/// Contribute the owner-document rewrites for a rename to the shared plan:
/// the alias-definition rewrite, plus span rewrites for same-document
/// references to the old name.
///
/// Finding no owner document, no matching object, or no matching alias is
/// not an error; the plan is simply left as it was.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` when the owner document's tree is
/// missing required structure.
pub(crate) fn plan_alias_rename(
    documents: &[(PathBuf, Element)],
    query: &ResolvedQuery,
    to_property: &str,
    plan: &mut Vec<Rewrite>,
) -> Result<(), Error> {
    let Some(from_property) = query.property.as_deref() else {
        return Ok(());
    };

    let mut matching = documents
        .iter()
        .filter(|(path, _)| return document_name(path) == query.document);
    let owner = matching.next();
    let Some(owner) = owner else {
        log::debug!("no document named `{}` in scope", query.document);
        return Ok(());
    };
    let (path, root) = owner;
    if matching.next().is_some() {
        log::warn!(
            "more than one document named `{}`; picking first: {}",
            query.document,
            path.display()
        );
    }

    let object = find_object(root, &query.object);
    let Some(object) = object else {
        log::debug!("no object named `{}` in `{}`", query.object, query.document);
        return Ok(());
    };

    let Some((kind, location)) = find_alias_definition(object, from_property) else {
        return Ok(());
    };

    let Some(alias_attribute) = kind.alias_attribute else {
        return Ok(());
    };
    let locator = Locator::default()
        .child("ObjectData")
        .child_where("Object", "name", &query.object)
        .child("Properties")
        .child_where("Property", "name", kind.property_name)
        .child(kind.nested_tag)
        .child_where(kind.entry_tag, kind.location_attribute, &location);
    plan.push(Rewrite {
        action: Action::SetValue { value: to_property.to_string() },
        attribute: alias_attribute.to_string(),
        document_path: path.clone(),
        locator,
    });

    // Re-resolve the old name inside the owner document; expressions there
    // may reference the alias without any qualifier. Overlaps with the
    // rename engine's own findings are discarded by the shared plan.
    let references = finder::search_direct(std::slice::from_ref(owner), query)?;
    for reference in &references {
        plan.push(plan_reference(reference, &query.document, &query.object, to_property));
    }
    return Ok(());
}

/// The entry defining `alias` on one of the object's alias-bearing
/// properties, as the kind descriptor plus the entry's location key.
fn find_alias_definition(
    object: &Element,
    alias: &str,
) -> Option<(&'static kinds::KindSpec, String)> {
    let properties = object.child("Properties")?;
    for kind in kinds::KINDS.iter().filter(|k| return k.alias_attribute.is_some()) {
        let alias_attribute = kind.alias_attribute?;
        let property = properties
            .children_named("Property")
            .find(|p| return p.attribute("name") == Some(kind.property_name));
        let Some(property) = property else {
            continue;
        };
        let Some(container) = property.child(kind.nested_tag) else {
            continue;
        };
        let entry = container
            .children_named(kind.entry_tag)
            .find(|e| return e.attribute(alias_attribute) == Some(alias));
        let Some(entry) = entry else {
            continue;
        };
        let location = entry.attribute(kind.location_attribute)?;
        return Some((kind, location.to_string()));
    }
    return None;
}

/// Object element with the given (already label-resolved) name.
fn find_object<'a>(root: &'a Element, object_name: &str) -> Option<&'a Element> {
    let object_data = root.child("ObjectData")?;
    return object_data
        .children_named("Object")
        .find(|o| return o.attribute("name") == Some(object_name));
}
