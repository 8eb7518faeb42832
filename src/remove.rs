//! Link-table compactor: removes every link to one document.
//!
//! Each link-bearing container holds an `XLinks` table: `DocMap` entries
//! mapping a referenced document to the start of its contiguous run of
//! `XLink` descriptor entries. Purging a document removes its run and DocMap
//! entry, then recomputes the surviving DocMap indices positionally from the
//! compacted descriptor sequence, so the table stays contiguous and its
//! `count`/`docs` bookkeeping stays exact. A table whose only DocMap entry
//! matched is cleared outright, in the shape the document format itself
//! writes for an empty table of that kind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::kinds;
use crate::kinds::PropertyKind;
use crate::store::DocumentStore;
use crate::tree::Element;
use crate::workset::WorkSet;

/// Tag of a link table inside a link-bearing container.
const TABLE_TAG: &str = "XLinks";

/// Tag of one descriptor entry in a link table.
const DESCRIPTOR_TAG: &str = "XLink";

/// Tag of one referenced-document index entry in a link table.
const DOC_MAP_TAG: &str = "DocMap";

/// Remove every link table run referencing `document` across the store's
/// documents. Only documents with at least one modified table appear in the
/// result.
///
/// # Errors
///
/// Returns enumeration errors from the store, or `Error::LinkTableCorrupt`
/// when a table's bookkeeping disagrees with its entries; nothing is
/// returned for a document that fails mid-compaction.
pub fn remove_document<S: DocumentStore>(
    store: &S,
    document: &str,
) -> Result<BTreeMap<PathBuf, Element>, Error> {
    let documents = store.enumerate(None)?;
    return remove_document_in_documents(&documents, document);
}

/// Remove link-table references across already-parsed documents.
/// See [`remove_document`].
///
/// # Errors
///
/// As [`remove_document`], minus store enumeration errors.
pub fn remove_document_in_documents(
    documents: &[(PathBuf, Element)],
    document: &str,
) -> Result<BTreeMap<PathBuf, Element>, Error> {
    let mut workset = WorkSet::new(documents);
    for (path, root) in documents {
        if !tree_references_document(root, document) {
            continue;
        }
        let copy = workset.copy_mut(path)?;
        purge_tree(path, copy, document)?;
    }
    return Ok(workset.into_mutated());
}

/// Compact a multi-entry link table: drop the matched run and DocMap entry,
/// then renumber the survivors positionally and refresh `count`/`docs`.
///
/// # Errors
///
/// Returns `Error::LinkTableCorrupt` when bookkeeping disagrees with the
/// entries, a computed run is negative, or an index cannot be recomputed.
fn compact_table(path: &Path, table: &mut Element, document: &str) -> Result<(), Error> {
    let total = table.children_named(DESCRIPTOR_TAG).count();
    let declared_count = parse_index(path, table.attribute("count"), "count")?;
    if declared_count != total {
        return Err(corrupt(
            path,
            format!("count is {declared_count} but table has {total} entries"),
        ));
    }

    let mut starts: Vec<usize> = Vec::new();
    for doc_map in table.children_named(DOC_MAP_TAG) {
        starts.push(parse_index(path, doc_map.attribute("index"), "index")?);
    }
    starts.sort_unstable();

    let matched = table
        .children_named(DOC_MAP_TAG)
        .find(|d| return d.attribute("name") == Some(document))
        .ok_or_else(|| return corrupt(path, "matched DocMap entry disappeared".to_string()))?;
    let run_start = parse_index(path, matched.attribute("index"), "index")?;

    let position = starts
        .binary_search(&run_start)
        .map_err(|_| return corrupt(path, format!("run start {run_start} not in table")))?;
    let run_end = starts
        .get(position.saturating_add(1))
        .copied()
        .unwrap_or(total);
    if run_end < run_start {
        return Err(corrupt(
            path,
            format!("negative run length for start {run_start}"),
        ));
    }

    // Descriptor ordinals that survive the removal, in order. A surviving
    // DocMap's new index is the position of its old start in this list.
    let surviving: Vec<usize> = (0..total)
        .filter(|ordinal| return !(run_start..run_end).contains(ordinal))
        .collect();

    let old_children = std::mem::take(&mut table.children);
    let mut kept: Vec<Element> = Vec::with_capacity(old_children.len());
    let mut ordinal = 0_usize;
    let mut doc_map_removed = false;
    for child in old_children {
        if child.tag == DESCRIPTOR_TAG {
            let current = ordinal;
            ordinal = ordinal.saturating_add(1);
            if (run_start..run_end).contains(&current) {
                continue;
            }
        } else if child.tag == DOC_MAP_TAG
            && !doc_map_removed
            && child.attribute("name") == Some(document)
        {
            doc_map_removed = true;
            continue;
        }
        kept.push(child);
    }
    table.children = kept;

    for child in &mut table.children {
        if child.tag != DOC_MAP_TAG {
            continue;
        }
        let old = parse_index(path, child.attribute("index"), "index")?;
        let new = surviving
            .iter()
            .position(|&o| return o == old)
            .ok_or_else(|| {
                return corrupt(path, format!("index {old} not found after removal"));
            })?;
        child.set_attribute("index", &new.to_string());
    }

    let new_count = table.children_named(DESCRIPTOR_TAG).count();
    let new_docs = table.children_named(DOC_MAP_TAG).count();
    table.set_attribute("count", &new_count.to_string());
    table.set_attribute("docs", &new_docs.to_string());
    return validate_table(path, table);
}

/// Build a link-table-corrupt error for a path.
fn corrupt(path: &Path, reason: String) -> Error {
    return Error::LinkTableCorrupt { path: path.to_path_buf(), reason };
}

/// Whether a link table holds a DocMap entry naming the document.
fn has_doc_map(table: &Element, document: &str) -> bool {
    return table
        .children_named(DOC_MAP_TAG)
        .any(|d| return d.attribute("name") == Some(document));
}

/// Parse a table bookkeeping attribute as an index.
///
/// # Errors
///
/// Returns `Error::LinkTableCorrupt` when the attribute is missing or not a
/// number.
fn parse_index(path: &Path, value: Option<&str>, attribute: &str) -> Result<usize, Error> {
    let Some(value) = value else {
        return Err(corrupt(path, format!("missing {attribute} attribute")));
    };
    return value.parse::<usize>().map_err(|_| {
        return corrupt(path, format!("{attribute} is not a number: `{value}`"));
    });
}

/// Process every link table directly under one container element.
///
/// # Errors
///
/// Returns `Error::LinkTableCorrupt` on bookkeeping violations.
fn purge_container(path: &Path, container: &mut Element, document: &str) -> Result<(), Error> {
    let Some(kind) = kinds::spec_for_container(&container.tag) else {
        return Ok(());
    };

    let mut index = 0_usize;
    while index < container.children.len() {
        let matches = container
            .children
            .get(index)
            .is_some_and(|child| return child.tag == TABLE_TAG && has_doc_map(child, document));
        if !matches {
            index = index.saturating_add(1);
            continue;
        }

        let doc_count = container
            .children
            .get(index)
            .map(|child| return child.children_named(DOC_MAP_TAG).count())
            .unwrap_or_default();

        if doc_count == 1 {
            // The purged document was the only one referenced: clear the
            // whole table, in the empty shape this kind of container uses.
            match kind.kind {
                PropertyKind::Expression => {
                    container.remove_attribute("xlink");
                    container.children.remove(index);
                    continue;
                },
                PropertyKind::Tabular => {
                    let Some(table) = container.children.get_mut(index) else {
                        return Err(corrupt(path, "table disappeared".to_string()));
                    };
                    table.set_attribute("count", "0");
                    table.remove_attribute("docs");
                    table.children.clear();
                },
            }
        } else {
            let Some(table) = container.children.get_mut(index) else {
                return Err(corrupt(path, "table disappeared".to_string()));
            };
            compact_table(path, table, document)?;
        }
        index = index.saturating_add(1);
    }
    return Ok(());
}

/// Walk a working copy and purge every link table referencing the document.
///
/// # Errors
///
/// Returns `Error::LinkTableCorrupt` on bookkeeping violations.
fn purge_tree(path: &Path, element: &mut Element, document: &str) -> Result<(), Error> {
    purge_container(path, element, document)?;
    for child in &mut element.children {
        purge_tree(path, child, document)?;
    }
    return Ok(());
}

/// Whether any link table in the tree references the document.
fn tree_references_document(element: &Element, document: &str) -> bool {
    if kinds::spec_for_container(&element.tag).is_some() {
        let referenced = element
            .children_named(TABLE_TAG)
            .any(|table| return has_doc_map(table, document));
        if referenced {
            return true;
        }
    }
    return element
        .children
        .iter()
        .any(|child| return tree_references_document(child, document));
}

/// Check the compacted table against its invariants: `count` and `docs`
/// match the entries, and the DocMap run starts partition `[0, count)`.
///
/// # Errors
///
/// Returns `Error::LinkTableCorrupt` when an invariant does not hold.
fn validate_table(path: &Path, table: &Element) -> Result<(), Error> {
    let total = table.children_named(DESCRIPTOR_TAG).count();
    let declared_count = parse_index(path, table.attribute("count"), "count")?;
    if declared_count != total {
        return Err(corrupt(
            path,
            format!("count is {declared_count} but table has {total} entries"),
        ));
    }

    let doc_maps = table.children_named(DOC_MAP_TAG).count();
    match table.attribute("docs") {
        None => {
            if doc_maps > 0 {
                return Err(corrupt(path, "docs attribute missing".to_string()));
            }
        },
        Some(_) => {
            let declared_docs = parse_index(path, table.attribute("docs"), "docs")?;
            if declared_docs != doc_maps {
                return Err(corrupt(
                    path,
                    format!("docs is {declared_docs} but table has {doc_maps} DocMap entries"),
                ));
            }
        },
    }

    let mut starts: Vec<usize> = Vec::new();
    for doc_map in table.children_named(DOC_MAP_TAG) {
        starts.push(parse_index(path, doc_map.attribute("index"), "index")?);
    }
    starts.sort_unstable();
    for (position, start) in starts.iter().enumerate() {
        if position == 0 && *start != 0 {
            return Err(corrupt(path, "first run does not start at 0".to_string()));
        }
        if *start >= total {
            return Err(corrupt(path, format!("run start {start} beyond {total} entries")));
        }
        let previous = position.checked_sub(1).and_then(|p| return starts.get(p));
        if previous == Some(start) {
            return Err(corrupt(path, format!("duplicate run start {start}")));
        }
    }
    return Ok(());
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    fn parse_table(xml: &str) -> Element {
        return parse_document(Path::new("Example.FCStd"), xml).unwrap();
    }

    fn compacted(xml: &str, document: &str) -> Element {
        let mut table = parse_table(xml);
        compact_table(Path::new("Example.FCStd"), &mut table, document).unwrap();
        return table;
    }

    #[test]
    fn removes_run_when_doc_map_index_is_last() {
        let table = compacted(
            r#"<XLinks count="2" docs="2">
                <DocMap name="Master" label="Master" index="1"/>
                <DocMap name="Cube" label="Cube" index="0"/>
                <XLink file="Cube.FCStd" stamp="2021-07-25T20:03:03Z" name="Box"/>
                <XLink file="Master.FCStd" stamp="2021-07-25T18:40:15Z" name="Spreadsheet"/>
            </XLinks>"#,
            "Master",
        );
        assert_eq!(
            table.to_xml().unwrap(),
            r#"<XLinks count="1" docs="1"><DocMap name="Cube" label="Cube" index="0"/><XLink file="Cube.FCStd" stamp="2021-07-25T20:03:03Z" name="Box"/></XLinks>"#
        );
    }

    #[test]
    fn removes_run_when_doc_map_index_is_zero() {
        let table = compacted(
            r#"<XLinks count="2" docs="2">
                <DocMap name="Master" label="Master" index="0"/>
                <DocMap name="Cube" label="Cube" index="1"/>
                <XLink file="Master.FCStd" stamp="2021-07-25T18:40:15Z" name="Spreadsheet"/>
                <XLink file="Cube.FCStd" stamp="2021-07-25T20:03:03Z" name="Box"/>
            </XLinks>"#,
            "Master",
        );
        assert_eq!(
            table.to_xml().unwrap(),
            r#"<XLinks count="1" docs="1"><DocMap name="Cube" label="Cube" index="0"/><XLink file="Cube.FCStd" stamp="2021-07-25T20:03:03Z" name="Box"/></XLinks>"#
        );
    }

    #[test]
    fn removes_multi_entry_run_at_the_front() {
        let table = compacted(
            r#"<XLinks count="5" docs="2">
                <DocMap name="Master" label="Master" index="0"/>
                <DocMap name="Cube" label="Cube" index="3"/>
                <XLink file="Master.FCStd" name="Spreadsheet1"/>
                <XLink file="Master.FCStd" name="Spreadsheet2"/>
                <XLink file="Master.FCStd" name="Spreadsheet3"/>
                <XLink file="Cube.FCStd" name="Box1"/>
                <XLink file="Cube.FCStd" name="Box2"/>
            </XLinks>"#,
            "Master",
        );
        assert_eq!(
            table.to_xml().unwrap(),
            r#"<XLinks count="2" docs="1"><DocMap name="Cube" label="Cube" index="0"/><XLink file="Cube.FCStd" name="Box1"/><XLink file="Cube.FCStd" name="Box2"/></XLinks>"#
        );
    }

    #[test]
    fn removes_multi_entry_run_at_the_back() {
        let table = compacted(
            r#"<XLinks count="5" docs="2">
                <DocMap name="Master" label="Master" index="2"/>
                <DocMap name="Cube" label="Cube" index="0"/>
                <XLink file="Cube.FCStd" name="Box1"/>
                <XLink file="Cube.FCStd" name="Box2"/>
                <XLink file="Master.FCStd" name="Spreadsheet1"/>
                <XLink file="Master.FCStd" name="Spreadsheet2"/>
                <XLink file="Master.FCStd" name="Spreadsheet3"/>
            </XLinks>"#,
            "Master",
        );
        assert_eq!(
            table.to_xml().unwrap(),
            r#"<XLinks count="2" docs="1"><DocMap name="Cube" label="Cube" index="0"/><XLink file="Cube.FCStd" name="Box1"/><XLink file="Cube.FCStd" name="Box2"/></XLinks>"#
        );
    }

    #[test]
    fn removes_two_entry_run_and_renumbers_the_survivor() {
        let table = compacted(
            r#"<XLinks count="4" docs="2">
                <DocMap name="A" label="A" index="0"/>
                <DocMap name="B" label="B" index="2"/>
                <XLink file="A.FCStd" name="One"/>
                <XLink file="A.FCStd" name="Two"/>
                <XLink file="B.FCStd" name="Three"/>
                <XLink file="B.FCStd" name="Four"/>
            </XLinks>"#,
            "A",
        );
        assert_eq!(table.attribute("count"), Some("2"));
        assert_eq!(table.attribute("docs"), Some("1"));
        let doc_maps: Vec<&Element> = table.children_named(DOC_MAP_TAG).collect();
        assert_eq!(doc_maps.len(), 1);
        let survivor = doc_maps.first().unwrap();
        assert_eq!(survivor.attribute("name"), Some("B"));
        assert_eq!(survivor.attribute("index"), Some("0"));
    }

    #[test]
    fn middle_run_removal_shifts_later_starts_down() {
        let table = compacted(
            r#"<XLinks count="4" docs="3">
                <DocMap name="A" label="A" index="0"/>
                <DocMap name="B" label="B" index="1"/>
                <DocMap name="C" label="C" index="3"/>
                <XLink file="A.FCStd" name="One"/>
                <XLink file="B.FCStd" name="Two"/>
                <XLink file="B.FCStd" name="Three"/>
                <XLink file="C.FCStd" name="Four"/>
            </XLinks>"#,
            "B",
        );
        assert_eq!(
            table.to_xml().unwrap(),
            r#"<XLinks count="2" docs="2"><DocMap name="A" label="A" index="0"/><DocMap name="C" label="C" index="1"/><XLink file="A.FCStd" name="One"/><XLink file="C.FCStd" name="Four"/></XLinks>"#
        );
    }

    #[test]
    fn corrupt_count_is_fatal() {
        let mut table = parse_table(
            r#"<XLinks count="7" docs="2">
                <DocMap name="Master" index="0"/>
                <DocMap name="Cube" index="1"/>
                <XLink file="Master.FCStd" name="S"/>
                <XLink file="Cube.FCStd" name="B"/>
            </XLinks>"#,
        );
        let result = compact_table(Path::new("Example.FCStd"), &mut table, "Master");
        assert!(matches!(result, Err(Error::LinkTableCorrupt { .. })));
    }

    #[test]
    fn run_start_beyond_entries_is_fatal() {
        let mut table = parse_table(
            r#"<XLinks count="2" docs="2">
                <DocMap name="Master" index="5"/>
                <DocMap name="Cube" index="0"/>
                <XLink file="Cube.FCStd" name="B1"/>
                <XLink file="Cube.FCStd" name="B2"/>
            </XLinks>"#,
        );
        let result = compact_table(Path::new("Example.FCStd"), &mut table, "Master");
        assert!(matches!(result, Err(Error::LinkTableCorrupt { .. })));
    }

    const SINGLE_TABULAR_XML: &str = r#"<Document>
        <ObjectData>
            <Object name="Spreadsheet">
                <Properties Count="1">
                    <Property name="cells" type="Spreadsheet::PropertySheet">
                        <Cells Count="4" xlink="1">
                            <XLinks count="1" docs="1">
                                <DocMap name="Master" label="Master" index="0"/>
                                <XLink file="Master.FCStd" name="Spreadsheet"/>
                            </XLinks>
                            <Cell address="A1" content="Value"/>
                            <Cell address="B1" content="=Master#Spreadsheet.Value" alias="Value1"/>
                        </Cells>
                    </Property>
                </Properties>
            </Object>
        </ObjectData>
    </Document>"#;

    const SINGLE_EXPRESSION_XML: &str = r#"<Document>
        <ObjectData>
            <Object name="Cylinder">
                <Properties Count="1">
                    <Property name="ExpressionEngine" type="App::PropertyExpressionEngine">
                        <ExpressionEngine count="1" xlink="1">
                            <XLinks count="1" docs="1">
                                <DocMap name="Master" label="Master" index="0"/>
                                <XLink file="Master.FCStd" name="Spreadsheet"/>
                            </XLinks>
                            <Expression path="Radius" expression="Master#Spreadsheet.Value"/>
                        </ExpressionEngine>
                    </Property>
                </Properties>
            </Object>
        </ObjectData>
    </Document>"#;

    #[test]
    fn clears_single_entry_tabular_table_but_keeps_the_empty_table() {
        let root = parse_document(Path::new("Example.FCStd"), SINGLE_TABULAR_XML).unwrap();
        let documents = vec![(PathBuf::from("Example.FCStd"), root)];
        let removed = remove_document_in_documents(&documents, "Master").unwrap();

        let copy = removed.get(Path::new("Example.FCStd")).unwrap();
        let cells = copy
            .child("ObjectData").unwrap()
            .child("Object").unwrap()
            .child("Properties").unwrap()
            .child("Property").unwrap()
            .child("Cells").unwrap();
        // The tabular container keeps its marker and an empty table.
        assert_eq!(cells.attribute("xlink"), Some("1"));
        let table = cells.child("XLinks").unwrap();
        assert_eq!(table.attribute("count"), Some("0"));
        assert_eq!(table.attribute("docs"), None);
        assert!(table.children.is_empty());
        // Sibling cells are untouched.
        let aliased = cells
            .children_named("Cell")
            .find(|c| return c.attribute("address") == Some("B1"))
            .unwrap();
        assert_eq!(aliased.attribute("content"), Some("=Master#Spreadsheet.Value"));
        assert_eq!(aliased.attribute("alias"), Some("Value1"));
    }

    #[test]
    fn clears_single_entry_expression_table_and_drops_the_marker() {
        let root = parse_document(Path::new("Example.FCStd"), SINGLE_EXPRESSION_XML).unwrap();
        let documents = vec![(PathBuf::from("Example.FCStd"), root)];
        let removed = remove_document_in_documents(&documents, "Master").unwrap();

        let copy = removed.get(Path::new("Example.FCStd")).unwrap();
        let engine = copy
            .child("ObjectData").unwrap()
            .child("Object").unwrap()
            .child("Properties").unwrap()
            .child("Property").unwrap()
            .child("ExpressionEngine").unwrap();
        assert_eq!(engine.attribute("xlink"), None);
        assert!(engine.child("XLinks").is_none());
        let expression = engine.child("Expression").unwrap();
        assert_eq!(expression.attribute("expression"), Some("Master#Spreadsheet.Value"));
    }

    #[test]
    fn untouched_documents_are_absent_from_the_result() {
        let touched = parse_document(Path::new("Touched.FCStd"), SINGLE_EXPRESSION_XML).unwrap();
        let untouched = parse_document(
            Path::new("Untouched.FCStd"),
            "<Document><ObjectData/></Document>",
        )
        .unwrap();
        let documents = vec![
            (PathBuf::from("Touched.FCStd"), touched),
            (PathBuf::from("Untouched.FCStd"), untouched),
        ];

        let removed = remove_document_in_documents(&documents, "Master").unwrap();
        assert_eq!(removed.len(), 1);
        assert!(removed.contains_key(Path::new("Touched.FCStd")));
    }

    #[test]
    fn removing_an_unreferenced_document_changes_nothing() {
        let root = parse_document(Path::new("Example.FCStd"), SINGLE_TABULAR_XML).unwrap();
        let documents = vec![(PathBuf::from("Example.FCStd"), root)];
        let removed = remove_document_in_documents(&documents, "SomethingElse").unwrap();
        assert!(removed.is_empty());
    }
}
