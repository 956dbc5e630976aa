//! Statement kinds, their allow-sets, and the compiled-statement store.

use clap::ValueEnum;
use tracing::error;

use crate::config::DbConfig;
use crate::template::{CompileError, CompiledStatement, compile};
use crate::variables::{VarSet, Variable};

/// Variables any message-level statement may reference.
const MESSAGE_VARS: VarSet = VarSet::of(&[
    Variable::Ino,
    Variable::Mtime,
    Variable::Pid,
    Variable::Ip,
    Variable::Date,
    Variable::MessageId,
    Variable::ContentType,
    Variable::ContentEncoding,
    Variable::ReceivedCount,
    Variable::SignaturesCount,
    Variable::MailingList,
]);

/// The fixed categories of query this crate issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum StatementKind {
    /// Whitelist lookup for one domain.
    Whitelisted,
    /// Fetch the reference of a known domain.
    SelectDomain,
    /// Refresh counters of a known domain.
    UpdateDomain,
    /// First sighting of a domain.
    InsertDomain,
    /// Associate a recorded message with a domain.
    InsertMsgRef,
    /// Record one incoming message.
    InsertMessage,
}

impl StatementKind {
    pub const ALL: [StatementKind; 6] = [
        StatementKind::Whitelisted,
        StatementKind::SelectDomain,
        StatementKind::UpdateDomain,
        StatementKind::InsertDomain,
        StatementKind::InsertMsgRef,
        StatementKind::InsertMessage,
    ];

    pub(crate) const COUNT: usize = StatementKind::ALL.len();

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            StatementKind::Whitelisted => "whitelisted",
            StatementKind::SelectDomain => "select_domain",
            StatementKind::UpdateDomain => "update_domain",
            StatementKind::InsertDomain => "insert_domain",
            StatementKind::InsertMsgRef => "insert_msg_ref",
            StatementKind::InsertMessage => "insert_message",
        }
    }

    /// The variables a template for this kind may reference. References
    /// outside this set are compile errors.
    #[must_use]
    pub const fn allow_set(self) -> VarSet {
        match self {
            StatementKind::Whitelisted => VarSet::of(&[Variable::Domain]),
            StatementKind::SelectDomain | StatementKind::InsertDomain => {
                VarSet::of(&[Variable::Domain, Variable::AuthType]).union(MESSAGE_VARS)
            }
            StatementKind::UpdateDomain => {
                VarSet::of(&[Variable::Domain, Variable::AuthType, Variable::DomainRef])
                    .union(MESSAGE_VARS)
            }
            StatementKind::InsertMsgRef => VarSet::of(&[
                Variable::Domain,
                Variable::AuthType,
                Variable::DomainRef,
                Variable::MessageRef,
            ])
            .union(MESSAGE_VARS),
            StatementKind::InsertMessage => MESSAGE_VARS,
        }
    }
}

/// One compiled statement per kind, filled at configuration wrap-up and
/// immutable for the life of the process.
#[derive(Debug, Default)]
pub struct StatementStore {
    slots: [Option<CompiledStatement>; StatementKind::COUNT],
    configured: usize,
}

impl StatementStore {
    #[must_use]
    pub fn empty() -> StatementStore {
        StatementStore::default()
    }

    /// Compile every configured template against its kind's allow-set.
    ///
    /// A template that fails to compile is logged and its kind left
    /// unconfigured; the rest of the configuration still loads. Whether an
    /// unconfigured kind matters is the caller's decision.
    #[must_use]
    pub fn from_config(config: &DbConfig) -> StatementStore {
        let mut store = StatementStore::empty();
        for kind in StatementKind::ALL {
            let Some(raw) = config.template_for(kind) else {
                continue;
            };
            if let Err(err) = store.configure(kind, raw) {
                error!(statement = kind.name(), %err, "statement template rejected");
            }
        }
        store
    }

    /// Compile one template into the slot for `kind`. Returns whether a
    /// statement is now configured for that kind (an empty template clears
    /// the slot without error).
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] and leaves the slot unconfigured.
    pub fn configure(&mut self, kind: StatementKind, template: &str) -> Result<bool, CompileError> {
        let slot = &mut self.slots[kind as usize];
        if slot.take().is_some() {
            self.configured -= 1;
        }
        match compile(template, kind.allow_set()) {
            Ok(Some(stmt)) => {
                *slot = Some(stmt);
                self.configured += 1;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[must_use]
    pub fn get(&self, kind: StatementKind) -> Option<&CompiledStatement> {
        self.slots[kind as usize].as_ref()
    }

    #[must_use]
    pub fn is_configured(&self, kind: StatementKind) -> bool {
        self.get(kind).is_some()
    }

    /// Number of statement kinds with a compiled statement.
    #[must_use]
    pub fn configured(&self) -> usize {
        self.configured
    }
}
