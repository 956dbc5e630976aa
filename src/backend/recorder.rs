//! Offline execution recorder for the reserved `"test"` backend.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::statements::StatementKind;
use crate::variables::{VarBindings, VarSet};

/// Appends one human-readable block per executed statement to an append-only
/// artifact, instead of talking to any backend. Used for offline
/// verification of the statement flow.
#[derive(Debug, Clone)]
pub struct TestRecorder {
    path: PathBuf,
}

impl TestRecorder {
    pub const DEFAULT_PATH: &'static str = "database_dump";

    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> TestRecorder {
        TestRecorder { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one block: the statement kind, then `name: value` for each
    /// requested variable in ascending id order, then a blank line.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`io::Error`] when the artifact cannot be
    /// opened or written.
    pub fn record(
        &self,
        kind: StatementKind,
        bindings: &VarBindings,
        requested: VarSet,
    ) -> io::Result<()> {
        let mut block = String::new();
        let _ = writeln!(block, "Variables for statement {}:", kind.name());
        for var in requested.iter() {
            let value = bindings.get(var).unwrap_or("");
            let _ = writeln!(block, "{}: {value}", var.name());
        }
        block.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())
    }
}
