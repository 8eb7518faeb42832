//! Clone-on-first-write working copies of document trees.
//!
//! Mutating operations never touch the trees they were handed. The working
//! set hands out a private copy of a document's tree on first write, tracked
//! by document path, and at the end yields exactly the copies that were
//! written to. Documents that were never written stay out of the result, so
//! callers persist only what actually changed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::tree::Element;

/// Working copies keyed by document path, backed by the enumerated originals.
pub struct WorkSet<'a> {
    /// Copies made so far, keyed by document path.
    copies: BTreeMap<PathBuf, Element>,
    /// The enumerated scope the copies are cloned from.
    originals: &'a [(PathBuf, Element)],
}

impl<'a> WorkSet<'a> {
    /// Create a working set over an enumerated scope.
    pub fn new(originals: &'a [(PathBuf, Element)]) -> Self {
        return Self { copies: BTreeMap::new(), originals };
    }

    /// Mutable working copy for a document, cloned from the original on
    /// first access.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` if the path is not in the scope.
    pub fn copy_mut(&mut self, path: &Path) -> Result<&mut Element, Error> {
        if !self.copies.contains_key(path) {
            let original = self
                .originals
                .iter()
                .find(|(candidate, _)| return candidate == path)
                .map(|(_, root)| return root.clone());
            let Some(original) = original else {
                return Err(Error::DocumentNotFound { path: path.to_path_buf() });
            };
            self.copies.insert(path.to_path_buf(), original);
        }
        let Some(copy) = self.copies.get_mut(path) else {
            return Err(Error::DocumentNotFound { path: path.to_path_buf() });
        };
        return Ok(copy);
    }

    /// Consume the working set, yielding every document that was written to.
    pub fn into_mutated(self) -> BTreeMap<PathBuf, Element> {
        return self.copies;
    }
}
