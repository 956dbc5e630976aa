//! The backend client interface.
//!
//! The database client library is an external collaborator: this module
//! defines the capability surface the rest of the crate needs from it, plus
//! the taxonomy of responses a result fetch can produce. The reserved
//! `"test"` backend name never reaches these traits; it is served by
//! [`recorder::TestRecorder`] instead.

use std::time::Duration;

use thiserror::Error;

use crate::config::TlsMode;

pub mod recorder;

/// How serious an option-setting failure is, as reported by the client
/// library. Fatal failures abort the connect; transient ones are logged and
/// skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Transient,
    Fatal,
}

/// An error reported by the client library or the backend server.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    /// Backend-native error code, when one exists.
    pub code: Option<i32>,
    pub message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> BackendError {
        BackendError {
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(code: i32, message: impl Into<String>) -> BackendError {
        BackendError {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Failure to apply a connection option, tagged with its severity.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct OptionError {
    pub severity: Severity,
    pub message: String,
}

impl OptionError {
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> OptionError {
        OptionError {
            severity: Severity::Fatal,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transient(message: impl Into<String>) -> OptionError {
        OptionError {
            severity: Severity::Transient,
            message: message.into(),
        }
    }
}

impl From<OptionError> for BackendError {
    fn from(err: OptionError) -> BackendError {
        BackendError::new(err.message)
    }
}

/// A connection option, applied between connect and credential bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnOption {
    Tls(TlsMode),
    MultiStatements(bool),
    PagedResults(i64),
    Compress(bool),
    Mode(String),
}

/// One fetched result subset. A single command may legitimately yield
/// several subsets when it encodes more than one underlying operation.
pub enum Fetched {
    /// No more result subsets for the current command.
    Done,
    /// A modifying operation; carries the affected-row count.
    NoRows { affected: u64 },
    /// A row-bearing subset, consumed through its cursor.
    Rows(Box<dyn RowStream>),
    /// The backend did not produce the next subset in time. The command is
    /// not cancelled; the result must still be drained later.
    Timeout,
    /// A response shape the protocol does not define.
    Unexpected(i32),
}

/// Cursor over the rows of one result subset.
pub trait RowStream {
    /// Advance to the next row; `false` once exhausted.
    fn next_row(&mut self) -> bool;
    /// Column count of the current row.
    fn column_count(&self) -> usize;
    /// Text of one column of the current row; `None` for SQL NULL.
    fn column_text(&self, index: usize) -> Option<&str>;
}

/// The escaping capability of a connection, split out so rendering can be
/// exercised without a live session.
pub trait Escape {
    /// Backend-quoted form of `raw`. By convention every input byte expands
    /// to at most two output bytes; render budgets rely on that bound.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the client library rejects the value.
    fn escape(&mut self, raw: &str) -> Result<String, BackendError>;
}

/// A live backend connection. Strictly synchronous: one command in flight,
/// every call blocks the caller up to the supplied timeout.
pub trait Connection: Escape {
    /// Apply one option. Must be called before [`Connection::bind`].
    ///
    /// # Errors
    ///
    /// Returns [`OptionError`]; its severity decides whether the connect
    /// sequence continues.
    fn set_option(&mut self, option: &ConnOption) -> Result<(), OptionError>;

    /// Bind credentials and select the database.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when authentication or selection fails.
    fn bind(
        &mut self,
        database: Option<&str>,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), BackendError>;

    /// Submit one command for execution.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend rejects the command.
    fn submit(&mut self, command: &str) -> Result<(), BackendError>;

    /// Fetch the next result subset, blocking up to `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] for a negative backend response; timeouts
    /// are not errors at this level, they are [`Fetched::Timeout`].
    fn fetch_result(&mut self, timeout: Duration) -> Result<Fetched, BackendError>;

    /// Unbind and release the handle.
    fn close(&mut self);
}

/// Entry point of the client library: turns a backend name and endpoint
/// into a connection handle.
pub trait Driver {
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend kind is unknown or the
    /// endpoint is unreachable.
    fn connect(
        &self,
        kind: &str,
        host: Option<&str>,
        port: Option<&str>,
    ) -> Result<Box<dyn Connection>, BackendError>;
}
