//! Transpiler diagnostics.
//!
//! A [`Report`] collects the warnings and fatal errors a transpiler finds in
//! a source document. Entries carry the dotted key path they refer to
//! (e.g. `passwd.users[0].ssh_keys`) when one is known.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a diagnostic or of a failed transpilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The document is usable but something looks wrong.
    Warning,
    /// The document cannot be transpiled.
    Fatal,
}

impl Severity {
    /// Returns the lowercase label used in logs and messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Fatal => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Severity of this diagnostic.
    pub kind: Severity,
    /// Human-readable message.
    pub message: String,
    /// Key path inside the source document, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} at {}: {}", self.kind, path, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Ordered collection of diagnostics.
///
/// # Example
///
/// ```
/// use kindle_core::{Report, Severity};
///
/// let mut report = Report::new();
/// report.warn("permissions unset, defaulting to 0644", Some("storage.files[0]"));
/// assert!(!report.is_fatal());
/// assert_eq!(report.severity(), Some(Severity::Warning));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    entries: Vec<Entry>,
}

impl Report {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning.
    pub fn warn(&mut self, message: impl Into<String>, path: Option<&str>) {
        self.push(Severity::Warning, message, path);
    }

    /// Records a fatal error.
    pub fn fatal(&mut self, message: impl Into<String>, path: Option<&str>) {
        self.push(Severity::Fatal, message, path);
    }

    fn push(&mut self, kind: Severity, message: impl Into<String>, path: Option<&str>) {
        self.entries.push(Entry {
            kind,
            message: message.into(),
            path: path.map(ToString::to_string),
        });
    }

    /// Appends every entry of `other`.
    pub fn merge(&mut self, other: Report) {
        self.entries.extend(other.entries);
    }

    /// Returns all entries in the order they were recorded.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if at least one fatal error was recorded.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.entries.iter().any(|e| e.kind == Severity::Fatal)
    }

    /// Returns the most severe classification, or `None` for a clean report.
    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        if self.is_fatal() {
            Some(Severity::Fatal)
        } else if self.is_empty() {
            None
        } else {
            Some(Severity::Warning)
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}
