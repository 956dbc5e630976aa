//! Command execution and scalar extraction.
//!
//! A rendered command is submitted once, then every result subset it yields
//! is fetched and classified until the backend reports no more. Statements
//! are designed to return at most a single value, so the first column of the
//! first row of the first result-bearing subset is authoritative; everything
//! after it is drained and warned about.

use std::time::Duration;

use tracing::{error, warn};

use crate::backend::{Connection, Fetched};
use crate::error::DbError;
use crate::pending::PendingResult;

/// What one statement execution produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A result-bearing row was seen; its first column may still be NULL.
    Captured(Option<String>),
    /// The command completed without any result-bearing row.
    Empty,
}

impl Outcome {
    /// The captured text, when there is one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::Captured(text) => text.as_deref(),
            Outcome::Empty => None,
        }
    }
}

/// Submit `command` and drain every result subset it yields.
///
/// The pending-result state is checked first: an undrained result from an
/// earlier timeout gets one bounded drain attempt, and the call is refused
/// while it remains outstanding.
///
/// # Errors
///
/// Returns [`DbError::ResultPending`] when the connection is still blocked,
/// [`DbError::Timeout`] when a fetch times out (the pending state is set),
/// [`DbError::Backend`] for a backend failure, or [`DbError::Protocol`] for
/// a response shape the protocol does not define. All are logged here.
pub fn run_command(
    conn: &mut dyn Connection,
    pending: &mut PendingResult,
    command: &str,
    timeout: Duration,
) -> Result<Outcome, DbError> {
    if !pending.recover(&mut *conn, timeout) {
        return Err(DbError::ResultPending);
    }

    conn.submit(command).map_err(|err| {
        error!(%err, command, "backend rejected the command");
        DbError::from(err)
    })?;

    let mut outcome = Outcome::Empty;
    let mut bearing_subsets = 0u32;
    let mut subset = 0u32;
    loop {
        subset += 1;
        match conn.fetch_result(timeout) {
            Ok(Fetched::Done) => break,
            Ok(Fetched::NoRows { affected }) => {
                if affected > 1 {
                    warn!(subset, affected, command, "statement affected more than one row");
                }
            }
            Ok(Fetched::Rows(mut rows)) => {
                let mut rows_seen = 0u64;
                let mut bearing = false;
                while rows.next_row() {
                    rows_seen += 1;
                    if rows.column_count() > 0 {
                        bearing = true;
                        if outcome == Outcome::Empty {
                            outcome = Outcome::Captured(rows.column_text(0).map(str::to_owned));
                        }
                    }
                }
                if rows_seen > 1 {
                    warn!(subset, rows = rows_seen, command, "query part returned more than one row");
                }
                if bearing {
                    bearing_subsets += 1;
                    if bearing_subsets > 1 {
                        warn!(subset, command, "query yielded more than one result-bearing part");
                    }
                }
            }
            Ok(Fetched::Timeout) => {
                error!(
                    subset,
                    timeout_secs = timeout.as_secs(),
                    command,
                    "backend result timed out; is the timeout too low?"
                );
                pending.mark_pending();
                return Err(DbError::Timeout);
            }
            Ok(Fetched::Unexpected(code)) => {
                error!(code, subset, command, "unexpected result code from the backend");
                return Err(DbError::Protocol(format!("unexpected result code {code}")));
            }
            Err(err) => {
                error!(%err, subset, command, "backend error while fetching results");
                return Err(err.into());
            }
        }
    }

    Ok(outcome)
}

/// Numeric interpretation of a captured scalar.
///
/// Accepts a non-negative integer up to `i32::MAX`; anything else falls back
/// to a truthy conversion (non-empty and not all-zero digits becomes 1) with
/// a warning. `context` names the statement for the log line.
#[must_use]
pub fn scalar_to_int(field: &str, context: &str) -> i64 {
    match field.parse::<i64>() {
        Ok(value) if (0..=i64::from(i32::MAX)).contains(&value) => value,
        _ => {
            let truthy = i64::from(!is_zero_looking(field));
            warn!(
                field,
                converted = truthy,
                statement = context,
                "query returned a non-number"
            );
            truthy
        }
    }
}

fn is_zero_looking(field: &str) -> bool {
    field.is_empty() || field.bytes().all(|b| b == b'0')
}
