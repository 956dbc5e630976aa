//! Configuration consumed from the external loader.
//!
//! The loader itself (file format, parsing) lives outside this crate; it
//! fills a [`DbConfig`] and hands it over. Raw template strings are compiled
//! from here exactly once, at configuration wrap-up.

use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::statements::StatementKind;

/// Backend name that disables real connectivity: executions are appended to
/// the diagnostic artifact instead (see [`crate::backend::recorder`]).
pub const TEST_BACKEND: &str = "test";

/// TLS preference for the backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TlsMode {
    Always,
    Try,
    Never,
}

impl TlsMode {
    /// Parse the configured preference. Case-insensitive; only the first
    /// letter is significant, so `"a"`, `"ALWAYS"`, and `"always"` agree.
    #[must_use]
    pub fn parse(raw: &str) -> Option<TlsMode> {
        match raw.as_bytes().first() {
            Some(b'a' | b'A') => Some(TlsMode::Always),
            Some(b't' | b'T') => Some(TlsMode::Try),
            Some(b'n' | b'N') => Some(TlsMode::Never),
            _ => None,
        }
    }
}

/// Tri-state toggle: an unset toggle leaves the backend's default alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "Option<bool>")]
pub enum Toggle {
    #[default]
    Unset,
    Disable,
    Enable,
}

impl From<Option<bool>> for Toggle {
    fn from(value: Option<bool>) -> Toggle {
        match value {
            None => Toggle::Unset,
            Some(false) => Toggle::Disable,
            Some(true) => Toggle::Enable,
        }
    }
}

impl Toggle {
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Toggle::Unset => None,
            Toggle::Disable => Some(false),
            Toggle::Enable => Some(true),
        }
    }
}

/// Everything the external loader supplies: one raw template per statement
/// kind, connection parameters, option toggles, and the result timeout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Backend name understood by the driver, or [`TEST_BACKEND`].
    pub backend: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,

    /// TLS preference; parsed by [`TlsMode::parse`] at connect time so an
    /// invalid value degrades to a warning, not a load failure.
    pub tls: Option<String>,
    pub compress: Toggle,
    pub multi_statements: Toggle,
    pub paged_results: Option<i64>,
    /// Backend-specific mode string, passed through verbatim.
    pub mode: Option<String>,

    /// Per-result-fetch timeout in seconds; non-positive or unset values
    /// fall back to the 2-second default.
    pub timeout_secs: Option<i64>,

    /// Artifact path for the `"test"` backend; defaults to
    /// [`crate::backend::recorder::TestRecorder::DEFAULT_PATH`].
    pub test_dump: Option<String>,

    pub sql_whitelisted: Option<String>,
    pub sql_select_domain: Option<String>,
    pub sql_update_domain: Option<String>,
    pub sql_insert_domain: Option<String>,
    pub sql_insert_msg_ref: Option<String>,
    pub sql_insert_message: Option<String>,
}

impl DbConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    /// The raw template configured for `kind`, if any.
    #[must_use]
    pub fn template_for(&self, kind: StatementKind) -> Option<&str> {
        let raw = match kind {
            StatementKind::Whitelisted => &self.sql_whitelisted,
            StatementKind::SelectDomain => &self.sql_select_domain,
            StatementKind::UpdateDomain => &self.sql_update_domain,
            StatementKind::InsertDomain => &self.sql_insert_domain,
            StatementKind::InsertMsgRef => &self.sql_insert_msg_ref,
            StatementKind::InsertMessage => &self.sql_insert_message,
        };
        raw.as_deref()
    }

    /// Effective per-fetch timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            Some(secs) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
            _ => DbConfig::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn is_test_backend(&self) -> bool {
        self.backend.as_deref() == Some(TEST_BACKEND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_mode_first_letter_wins() {
        assert_eq!(TlsMode::parse("always"), Some(TlsMode::Always));
        assert_eq!(TlsMode::parse("ALWAYS"), Some(TlsMode::Always));
        assert_eq!(TlsMode::parse("t"), Some(TlsMode::Try));
        assert_eq!(TlsMode::parse("Never"), Some(TlsMode::Never));
        assert_eq!(TlsMode::parse("yes"), None);
        assert_eq!(TlsMode::parse(""), None);
    }

    #[test]
    fn toggle_tri_state() {
        assert_eq!(Toggle::from(None), Toggle::Unset);
        assert_eq!(Toggle::from(Some(true)), Toggle::Enable);
        assert_eq!(Toggle::from(Some(false)), Toggle::Disable);
        assert_eq!(Toggle::Unset.as_bool(), None);
    }

    #[test]
    fn timeout_defaults_when_unset_or_non_positive() {
        let mut config = DbConfig::default();
        assert_eq!(config.timeout(), DbConfig::DEFAULT_TIMEOUT);
        config.timeout_secs = Some(0);
        assert_eq!(config.timeout(), DbConfig::DEFAULT_TIMEOUT);
        config.timeout_secs = Some(-4);
        assert_eq!(config.timeout(), DbConfig::DEFAULT_TIMEOUT);
        config.timeout_secs = Some(7);
        assert_eq!(config.timeout(), Duration::from_secs(7));
    }
}
