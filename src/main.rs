//! fcx CLI: find, rename, and remove cross-document references.
//!
//! A thin adapter over the library: parse arguments, run one operation,
//! show what would change, confirm, persist. No reference logic lives here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use fcx::config::Config;
use fcx::diagnostics;
use fcx::error::Error;
use fcx::finder;
use fcx::remove;
use fcx::rename;
use fcx::store::{ArchiveStore, DocumentStore as _};
use fcx::tree::Element;
use fcx::types::Query;

#[derive(Parser)]
#[command(
    name = "fcx",
    version,
    about = "Manage cross-document references between FreeCAD documents",
    after_help = "Surround arguments containing special characters in quotes (e.g. \"<<My Label>>\")."
)]
struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find cross-document references to an object or property
    Find {
        /// Document name or label.
        document: String,
        /// Object name or label.
        object: String,
        /// Property name; omit to match any property of the object.
        property: Option<String>,
        /// Print references as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Remove link tables referencing a document
    Remove {
        /// Document name whose links are removed.
        document: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Rename cross-document references to a property
    Rename {
        /// Document name or label of the reference to rename.
        document: String,
        /// Object name or label of the reference to rename.
        object: String,
        /// Property name before renaming.
        from_property: String,
        /// Property name after renaming.
        to_property: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = match cli.command {
        Commands::Find { document, object, property, json } => {
            cmd_find(&document, &object, property.as_deref(), json)
        },
        Commands::Remove { document, yes } => cmd_remove(&document, yes),
        Commands::Rename { document, object, from_property, to_property, yes } => {
            cmd_rename(&document, &object, &from_property, &to_property, yes)
        },
    };

    return match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
    };
}

/// Find references and print them, one per line, marked direct when the
/// matched text is the query's own fully qualified form and indirect
/// otherwise.
///
/// # Errors
///
/// Returns errors from enumeration or the search itself.
fn cmd_find(document: &str, object: &str, property: Option<&str>, json: bool) -> Result<(), Error> {
    let (store, _) = open_store()?;
    let query = Query::new(document, object, property);
    let references = finder::find(&store, &query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&references)?);
        return Ok(());
    }

    if references.is_empty() {
        println!("No references to {query} found.");
        return Ok(());
    }
    for reference in &references {
        let word = if query.to_string() == reference.matched_text { "direct" } else { "indirect" };
        println!("{reference} {word}");
    }
    return Ok(());
}

/// Remove link tables referencing a document, after showing the affected
/// documents and confirming.
///
/// # Errors
///
/// Returns errors from enumeration, compaction, or persistence.
fn cmd_remove(document: &str, yes: bool) -> Result<(), Error> {
    let (store, root) = open_store()?;
    let removed = remove::remove_document(&store, document)?;

    if removed.is_empty() {
        println!("No documents contain links to {document}.");
        return Ok(());
    }

    println!(
        "The following {} document(s) contain links to {document}:",
        removed.len()
    );
    print_document_paths(&root, &removed);
    let question =
        format!("Do you wish to remove links to {document}? (this will break document linking)");
    if !yes && !confirm(&question)? {
        return Ok(());
    }

    store.persist(&removed)?;
    println!("{} document(s) updated.", removed.len());
    return Ok(());
}

/// Rename references to a property, after showing the affected documents
/// and confirming.
///
/// # Errors
///
/// Returns errors from enumeration, the rename itself, or persistence.
fn cmd_rename(
    document: &str,
    object: &str,
    from_property: &str,
    to_property: &str,
    yes: bool,
) -> Result<(), Error> {
    let (store, root) = open_store()?;
    let renamed = rename::rename(&store, document, object, from_property, to_property)?;

    let from = Query::new(document, object, Some(from_property));
    if renamed.is_empty() {
        println!("No documents contain references to {from}.");
        return Ok(());
    }

    let to = Query::new(document, object, Some(to_property));
    println!(
        "The following {} document(s) reference {from}:",
        renamed.len()
    );
    print_document_paths(&root, &renamed);
    if !yes && !confirm(&format!("Do you wish to rename references to {to}?"))? {
        return Ok(());
    }

    store.persist(&renamed)?;
    println!("{} document(s) updated.", renamed.len());
    return Ok(());
}

/// Ask a yes/no question on stdin. The default answer is no.
///
/// # Errors
///
/// Returns `Error::Io` if stdin cannot be read.
fn confirm(question: &str) -> Result<bool, Error> {
    loop {
        println!("{question} [y/N] ");
        let mut answer = String::new();
        let read = std::io::stdin().read_line(&mut answer)?;
        if read == 0 {
            return Ok(false);
        }
        match answer.trim().to_lowercase().as_str() {
            "" | "n" | "no" => return Ok(false),
            "y" | "ye" | "yes" => return Ok(true),
            _ => println!("Please respond with \"yes\" or \"no\" (or \"y\" or \"n\")."),
        }
    }
}

/// Route warnings to stderr; `--debug` also shows the resolution steps.
fn init_logging(debug: bool) {
    let level = if debug { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    env_logger::Builder::from_default_env().filter_level(level).init();
    return;
}

/// Store over the current working directory, honoring `.fcx.toml`.
///
/// # Errors
///
/// Returns `Error::Io` or config errors.
fn open_store() -> Result<(ArchiveStore, PathBuf), Error> {
    let root = std::env::current_dir()?;
    let config = Config::load(&root)?;
    return Ok((ArchiveStore::new(&root, config), root));
}

/// Print affected document paths, indented, relative to the search root.
fn print_document_paths(root: &Path, documents: &BTreeMap<PathBuf, Element>) {
    for path in documents.keys() {
        let display = path.strip_prefix(root).unwrap_or(path);
        println!("  {}", display.display());
    }
    println!();
    return;
}
