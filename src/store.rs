//! Document store collaborator: enumerates document archives in a base
//! directory and persists mutated trees back into them.
//!
//! A document is a zip archive whose `Document.xml` member holds the XML
//! tree. Persisting rewrites only that member; every other member of the
//! archive is copied through byte-for-byte. The core operations never touch
//! storage themselves — they take a store, and hand mutated trees back to
//! the caller for an explicit persist step.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Error;
use crate::tree;
use crate::tree::Element;
use crate::types::document_name;

/// Extension of document archives.
const DOCUMENT_EXTENSION: &str = "FCStd";

/// Archive member holding the document's XML tree.
const DOCUMENT_MEMBER: &str = "Document.xml";

/// Source of parsed documents and sink for mutated ones.
pub trait DocumentStore {
    /// Enumerate documents in scope in a stable order, parsed to trees.
    /// With a name pattern, only documents with that exact name are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns errors from discovery, archive reading, or XML parsing.
    fn enumerate(&self, name_pattern: Option<&str>) -> Result<Vec<(PathBuf, Element)>, Error>;

    /// Persist mutated trees back to their documents. All other document
    /// contents are preserved byte-for-byte.
    ///
    /// # Errors
    ///
    /// Returns errors from serialization or archive writing.
    fn persist(&self, mutated: &BTreeMap<PathBuf, Element>) -> Result<(), Error>;
}

/// Store over document archives found under a base directory.
pub struct ArchiveStore {
    /// Base directory searched recursively for document archives.
    base: PathBuf,
    /// Include/exclude filters applied to relative document paths.
    config: Config,
}

impl ArchiveStore {
    /// Create a store rooted at a base directory.
    pub fn new(base: &Path, config: Config) -> Self {
        return Self { base: base.to_path_buf(), config };
    }
}

impl DocumentStore for ArchiveStore {
    fn enumerate(&self, name_pattern: Option<&str>) -> Result<Vec<(PathBuf, Element)>, Error> {
        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.base)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| {
                return e.path().extension().is_some_and(|ext| return ext == DOCUMENT_EXTENSION);
            })
        {
            let path = entry.path();
            let relative = path.strip_prefix(&self.base).unwrap_or(path);
            if !self.config.should_scan(&relative.to_string_lossy()) {
                continue;
            }
            if let Some(pattern) = name_pattern {
                if document_name(path) != pattern {
                    continue;
                }
            }
            let xml = read_document_member(path)?;
            let root = tree::parse_document(path, &xml)?;
            documents.push((path.to_path_buf(), root));
        }
        return Ok(documents);
    }

    fn persist(&self, mutated: &BTreeMap<PathBuf, Element>) -> Result<(), Error> {
        for (path, root) in mutated {
            let xml = root.to_xml()?;
            write_document_member(path, &xml)?;
        }
        return Ok(());
    }
}

/// In-memory store for tests and embedding. Enumeration clones the held
/// trees; persisted trees are recorded and can be read back.
pub struct MemoryStore {
    /// The documents the store enumerates.
    documents: Vec<(PathBuf, Element)>,
    /// Trees handed to `persist`, by path.
    persisted: RefCell<BTreeMap<PathBuf, Element>>,
}

impl MemoryStore {
    /// Create a store over already-parsed documents.
    pub fn new(documents: Vec<(PathBuf, Element)>) -> Self {
        return Self { documents, persisted: RefCell::new(BTreeMap::new()) };
    }

    /// Trees handed to `persist` so far.
    pub fn persisted(&self) -> BTreeMap<PathBuf, Element> {
        return self.persisted.borrow().clone();
    }
}

impl DocumentStore for MemoryStore {
    fn enumerate(&self, name_pattern: Option<&str>) -> Result<Vec<(PathBuf, Element)>, Error> {
        let documents = self
            .documents
            .iter()
            .filter(|(path, _)| {
                return match name_pattern {
                    None => true,
                    Some(pattern) => document_name(path) == pattern,
                };
            })
            .cloned()
            .collect();
        return Ok(documents);
    }

    fn persist(&self, mutated: &BTreeMap<PathBuf, Element>) -> Result<(), Error> {
        self.persisted.borrow_mut().extend(
            mutated
                .iter()
                .map(|(path, root)| return (path.clone(), root.clone())),
        );
        return Ok(());
    }
}

/// Build an archive error for a path.
fn archive_error(path: &Path, reason: &dyn std::fmt::Display) -> Error {
    return Error::Archive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
}

/// Read the XML member out of one document archive.
///
/// # Errors
///
/// Returns `Error::Archive` when the archive or its XML member is unreadable.
fn read_document_member(path: &Path) -> Result<String, Error> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| return archive_error(path, &e))?;
    let mut member = archive
        .by_name(DOCUMENT_MEMBER)
        .map_err(|e| return archive_error(path, &e))?;
    let mut xml = String::new();
    member
        .read_to_string(&mut xml)
        .map_err(|e| return archive_error(path, &e))?;
    return Ok(xml);
}

/// Rewrite one archive with a new XML member, copying every other member
/// through untouched.
///
/// # Errors
///
/// Returns `Error::Archive` on any archive read/write failure, or
/// `Error::Io` when the rewritten archive cannot be saved.
fn write_document_member(path: &Path, xml: &str) -> Result<(), Error> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| return archive_error(path, &e))?;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for index in 0..archive.len() {
        let member = archive
            .by_index_raw(index)
            .map_err(|e| return archive_error(path, &e))?;
        if member.name() == DOCUMENT_MEMBER {
            continue;
        }
        writer
            .raw_copy_file(member)
            .map_err(|e| return archive_error(path, &e))?;
    }

    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    writer
        .start_file(DOCUMENT_MEMBER, options)
        .map_err(|e| return archive_error(path, &e))?;
    writer
        .write_all(xml.as_bytes())
        .map_err(|e| return archive_error(path, &e))?;
    let cursor = writer.finish().map_err(|e| return archive_error(path, &e))?;

    std::fs::write(path, cursor.into_inner())?;
    return Ok(());
}
