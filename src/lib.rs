//! Find, rename, and safely remove cross-document references across a
//! forest of FreeCAD documents.
//!
//! References are small expression strings (`Main#Spreadsheet.Value`)
//! stored as attribute values inside each document's XML tree. The library
//! recognizes them fully qualified, same-document qualified, or as bare
//! aliases resolved through an indirection chain; rewrites them while
//! preserving their qualification level; and compacts the per-document link
//! tables that index external references.
//!
//! Nothing here performs I/O on its own: operations take a
//! [`store::DocumentStore`], work on private copies of the parsed trees,
//! and return only the trees that actually changed for the caller to
//! persist explicitly.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod finder;
pub mod kinds;
mod owner;
pub mod patterns;
pub mod remove;
pub mod rename;
pub mod store;
pub mod tree;
pub mod types;
pub mod workset;
