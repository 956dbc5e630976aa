//! The high-level feature surface.
//!
//! A [`Session`] owns the compiled statement set, the backend connection (or
//! the offline recorder when the reserved `"test"` backend is configured),
//! and the pending-result state. It is strictly single-threaded: every
//! operation takes `&mut self` and blocks up to the configured timeout.

use std::time::Duration;

use tracing::{error, warn};

use crate::backend::recorder::TestRecorder;
use crate::backend::{ConnOption, Connection, Driver, Severity};
use crate::config::{DbConfig, TEST_BACKEND, TlsMode};
use crate::error::DbError;
use crate::pending::PendingResult;
use crate::processor::{Outcome, run_command, scalar_to_int};
use crate::render::render;
use crate::statements::{StatementKind, StatementStore};
use crate::variables::{VarBindings, VarSet, Variable};

mod stats;

pub use stats::{DomainAuth, MessageStats};

enum Mode {
    /// Reserved `"test"` backend: record executions, touch no network.
    Offline(TestRecorder),
    Live(Box<dyn Connection>),
}

/// One backend session and its compiled statements.
pub struct Session {
    config: DbConfig,
    statements: StatementStore,
    mode: Option<Mode>,
    pending: PendingResult,
    timeout: Duration,
    client_ip: Option<String>,
}

impl Session {
    /// Configuration wrap-up: compile every configured template. Rejected
    /// templates are logged and left unconfigured; how many statements made
    /// it is available via [`StatementStore::configured`].
    #[must_use]
    pub fn new(config: DbConfig) -> Session {
        let statements = StatementStore::from_config(&config);
        let timeout = config.timeout();
        Session {
            config,
            statements,
            mode: None,
            pending: PendingResult::default(),
            timeout,
            client_ip: None,
        }
    }

    #[must_use]
    pub fn statements(&self) -> &StatementStore {
        &self.statements
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.mode.is_some()
    }

    pub(crate) fn is_offline(&self) -> bool {
        matches!(self.mode, Some(Mode::Offline(_)))
    }

    /// Connect to the configured backend, applying options in order and
    /// binding credentials. The reserved `"test"` backend name skips the
    /// driver entirely and arms the offline recorder.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingBackend`] when no backend is configured, or
    /// [`DbError::Backend`] for a driver failure, a fatal option error, or a
    /// credential bind failure. All are logged here.
    pub fn connect(&mut self, driver: &dyn Driver) -> Result<(), DbError> {
        let Some(backend) = self.config.backend.as_deref() else {
            error!("missing backend name: cannot connect");
            return Err(DbError::MissingBackend);
        };

        if backend == TEST_BACKEND {
            let path = self
                .config
                .test_dump
                .clone()
                .unwrap_or_else(|| TestRecorder::DEFAULT_PATH.to_owned());
            self.mode = Some(Mode::Offline(TestRecorder::new(path)));
            return Ok(());
        }

        let mut conn = driver
            .connect(backend, self.config.host.as_deref(), self.config.port.as_deref())
            .map_err(|err| {
                error!(
                    backend,
                    host = self.config.host.as_deref().unwrap_or("<unset>"),
                    port = self.config.port.as_deref().unwrap_or("<unset>"),
                    %err,
                    "unable to initialize the backend driver"
                );
                DbError::from(err)
            })?;

        if let Some(raw) = self.config.tls.as_deref() {
            match TlsMode::parse(raw) {
                Some(mode) => apply_option(conn.as_mut(), &ConnOption::Tls(mode), "tls")?,
                None => warn!(
                    value = raw,
                    "invalid tls preference: use \"always\", \"try\", or \"never\""
                ),
            }
        }
        if let Some(enable) = self.config.multi_statements.as_bool() {
            apply_option(
                conn.as_mut(),
                &ConnOption::MultiStatements(enable),
                "multi_statements",
            )?;
        }
        if let Some(pages) = self.config.paged_results {
            apply_option(conn.as_mut(), &ConnOption::PagedResults(pages), "paged_results")?;
        }
        if let Some(enable) = self.config.compress.as_bool() {
            apply_option(conn.as_mut(), &ConnOption::Compress(enable), "compress")?;
        }
        if let Some(mode) = self.config.mode.as_deref() {
            apply_option(conn.as_mut(), &ConnOption::Mode(mode.to_owned()), "mode")?;
        }

        if let Err(err) = conn.bind(
            self.config.database.as_deref(),
            self.config.user.as_deref(),
            self.config.password.as_deref(),
        ) {
            error!(
                database = self.config.database.as_deref().unwrap_or("<unset>"),
                user = self.config.user.as_deref().unwrap_or("<unset>"),
                password = password_hint(self.config.password.as_deref()),
                %err,
                "cannot bind to the database"
            );
            conn.close();
            return Err(err.into());
        }

        self.mode = Some(Mode::Live(conn));
        Ok(())
    }

    /// Unbind and drop the connection (or disarm the recorder).
    pub fn close(&mut self) {
        if let Some(Mode::Live(mut conn)) = self.mode.take() {
            conn.close();
        }
        self.pending = PendingResult::default();
    }

    /// Run one configured statement with per-call bindings.
    ///
    /// `requested` names the bound variables meaningful for this invocation;
    /// placeholders outside it render as empty text. In offline mode the
    /// execution is appended to the diagnostic artifact and reports
    /// [`Outcome::Empty`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotConnected`], [`DbError::NoStatement`], or any
    /// render/execution failure from [`render`] and [`run_command`].
    pub fn run(
        &mut self,
        kind: StatementKind,
        bindings: &VarBindings,
        requested: VarSet,
    ) -> Result<Outcome, DbError> {
        match self.mode.as_mut() {
            None => Err(DbError::NotConnected),
            Some(Mode::Offline(recorder)) => {
                if let Err(err) = recorder.record(kind, bindings, requested) {
                    warn!(
                        path = %recorder.path().display(),
                        %err,
                        "cannot append to the diagnostic artifact"
                    );
                }
                Ok(Outcome::Empty)
            }
            Some(Mode::Live(conn)) => {
                let Some(stmt) = self.statements.get(kind) else {
                    return Err(DbError::NoStatement(kind.name()));
                };
                let command = render(stmt, bindings, requested, conn.as_mut())?;
                run_command(conn.as_mut(), &mut self.pending, &command, self.timeout)
            }
        }
    }

    /// Whitelist score for `domain`: 1 or more when the domain is known
    /// (greater than 1 implies some trust), 0 when unknown or on any
    /// failure. Failures were already logged where they occurred.
    pub fn is_whitelisted(&mut self, domain: &str) -> i64 {
        if self.is_offline() {
            return self.offline_whitelisted(domain);
        }
        if !self.statements.is_configured(StatementKind::Whitelisted) {
            return 0;
        }

        let mut bindings = VarBindings::new();
        bindings.set(Variable::Domain, domain);
        let requested = VarSet::of(&[Variable::Domain]);

        match self.run(StatementKind::Whitelisted, &bindings, requested) {
            Ok(Outcome::Captured(Some(field))) => {
                scalar_to_int(&field, StatementKind::Whitelisted.name())
            }
            Ok(_) | Err(_) => 0,
        }
    }

    /// Offline fixture shortcut: the raw whitelist template text is scanned
    /// for `domain`, optionally followed by `:` and a score.
    fn offline_whitelisted(&self, domain: &str) -> i64 {
        let Some(raw) = self.config.sql_whitelisted.as_deref() else {
            return 0;
        };
        let Some(at) = raw.find(domain) else {
            return 0;
        };
        let mut rest = &raw[at + domain.len()..];
        if let Some(stripped) = rest.strip_prefix(':') {
            rest = stripped;
        }
        leading_int(rest)
    }
}

/// Parse a leading (optionally negative) decimal integer; 0 when absent.
fn leading_int(text: &str) -> i64 {
    let bytes = text.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    text[..end].parse().unwrap_or(0)
}

fn apply_option(conn: &mut dyn Connection, option: &ConnOption, name: &str) -> Result<(), DbError> {
    match conn.set_option(option) {
        Ok(()) => Ok(()),
        Err(err) if err.severity == Severity::Fatal => {
            error!(option = name, %err, "fatal error applying connection option");
            conn.close();
            Err(DbError::Backend(err.into()))
        }
        Err(err) => {
            warn!(option = name, %err, "transient error applying connection option");
            Ok(())
        }
    }
}

/// Never log the password itself.
fn password_hint(password: Option<&str>) -> &'static str {
    match password {
        None => "using password: no",
        Some("") => "using empty password",
        Some(_) => "using password: yes",
    }
}
