//! Convenient imports for common functionality.

pub use crate::backend::recorder::TestRecorder;
pub use crate::backend::{
    BackendError, ConnOption, Connection, Driver, Escape, Fetched, OptionError, RowStream,
    Severity,
};
pub use crate::config::{DbConfig, TEST_BACKEND, TlsMode, Toggle};
pub use crate::error::DbError;
pub use crate::pending::PendingResult;
pub use crate::processor::{Outcome, run_command, scalar_to_int};
pub use crate::render::render;
pub use crate::session::{DomainAuth, MessageStats, Session};
pub use crate::statements::{StatementKind, StatementStore};
pub use crate::template::{CompileError, CompiledStatement, compile};
pub use crate::variables::{VarBindings, VarSet, Variable};
