/// Project configuration loaded from `.fcx.toml`.
use std::path::Path;

use crate::error::Error;

/// Include/exclude patterns are path prefixes applied to document archive
/// paths relative to the search root. An empty config scans everything.
#[derive(Default)]
pub struct Config {
    /// Relative path prefixes excluded from scanning.
    exclude: Vec<String>,
    /// Relative path prefixes included in scanning; empty means all.
    include: Vec<String>,
}

/// Raw TOML structure for `.fcx.toml`.
#[derive(serde::Deserialize)]
struct FcxTomlConfig {
    /// Relative path prefixes excluded from scanning.
    #[serde(default)]
    exclude: Vec<String>,
    /// Relative path prefixes included in scanning.
    #[serde(default)]
    include: Vec<String>,
}

impl Config {
    /// Load config from `.fcx.toml` in the given root directory.
    /// Returns a default that scans everything if the file doesn't exist.
    /// Returns an error if the file exists but is malformed — never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(".fcx.toml");
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        let raw: FcxTomlConfig = toml::from_str(&content)?;
        return Ok(Self {
            exclude: raw.exclude,
            include: raw.include,
        });
    }

    /// Check whether a document at a relative path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude
    /// pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self
                .include
                .iter()
                .any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self
            .exclude
            .iter()
            .any(|p| return relative_path.starts_with(p.as_str()));
    }
}
