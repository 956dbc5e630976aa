//! Message-statistics recording.
//!
//! One call records a message and every domain that authenticated it:
//! `insert_message` first (its scalar, when present, becomes the
//! `message_ref` variable), then per domain a select, an insert when the
//! domain is new, an update when it is not, and finally the
//! message/domain association. A failure on one domain does not stop the
//! others.

use tracing::error;

use crate::processor::Outcome;
use crate::session::Session;
use crate::statements::StatementKind;
use crate::variables::{VarBindings, VarSet, Variable};

/// Authentication evidence for one domain of a message.
#[derive(Debug, Clone, Default)]
pub struct DomainAuth {
    pub name: String,
    /// The domain appears in the author (From) header.
    pub is_author: bool,
    /// SPF-authenticated HELO identity.
    pub is_spf_helo: bool,
    /// SPF-authenticated MAIL FROM identity.
    pub is_spf: bool,
    /// A verified signature covers the message.
    pub has_valid_signature: bool,
    /// A trusted voucher confirmed the domain.
    pub has_valid_vbr: bool,
}

impl DomainAuth {
    #[must_use]
    pub fn new(name: impl Into<String>) -> DomainAuth {
        DomainAuth {
            name: name.into(),
            ..DomainAuth::default()
        }
    }

    /// Comma-joined token list bound to `auth_type`.
    fn auth_token(&self) -> String {
        let mut tokens = String::new();
        let mut push = |token: &str| {
            if !tokens.is_empty() {
                tokens.push(',');
            }
            tokens.push_str(token);
        };
        if self.is_author {
            push("author");
        }
        if self.is_spf_helo {
            push("spf_helo");
        }
        if self.is_spf {
            push("spf");
        }
        if self.has_valid_signature {
            push("dkim");
        }
        if self.has_valid_vbr {
            push("vbr");
        }
        tokens
    }
}

/// Per-message statistics handed over by the verification layer.
#[derive(Debug, Clone, Default)]
pub struct MessageStats {
    /// Dotted `ino.mtime.pid` identifier of the local queue file.
    pub ino_mtime_pid: String,
    pub date: String,
    pub message_id: String,
    pub content_type: String,
    pub content_encoding: String,
    pub received_count: u32,
    pub signatures_count: u32,
    pub mailing_list: bool,
    /// Domains that authenticated the message, with their evidence.
    pub domains: Vec<DomainAuth>,
}

impl Session {
    /// Canonical textual key for the client address, used by subsequent
    /// [`Session::record_message`] calls. Producing the key from an IP is
    /// the caller's concern.
    pub fn set_client_ip(&mut self, key: impl Into<String>) {
        self.client_ip = Some(key.into());
    }

    /// Record one message and its authenticated domains. Failures are
    /// logged; the flow gives up on the message when the insert fails and
    /// on a single domain when that domain's statements fail.
    pub fn record_message(&mut self, stats: &MessageStats) {
        if stats.domains.is_empty() {
            error!(
                id = %stats.ino_mtime_pid,
                "no authenticated domains for message; statistics not recorded"
            );
            return;
        }

        let mut bindings = VarBindings::new();
        let mut requested = VarSet::EMPTY;

        match split_ino_mtime_pid(&stats.ino_mtime_pid) {
            Some((ino, mtime, pid)) => {
                bindings.set(Variable::Ino, ino);
                bindings.set(Variable::Mtime, mtime);
                bindings.set(Variable::Pid, pid);
                requested.insert(Variable::Ino);
                requested.insert(Variable::Mtime);
                requested.insert(Variable::Pid);
            }
            // Offline harnesses may omit the identifier; a live recording
            // without it is unusable.
            None if self.is_offline() => {}
            None => {
                error!(
                    id = %stats.ino_mtime_pid,
                    "malformed message identifier; statistics not recorded"
                );
                return;
            }
        }

        if let Some(ip) = self.client_ip.clone() {
            bindings.set(Variable::Ip, ip);
            requested.insert(Variable::Ip);
        }

        bindings.set(Variable::Date, stats.date.as_str());
        bindings.set(Variable::MessageId, stats.message_id.as_str());
        bindings.set(Variable::ContentType, stats.content_type.as_str());
        bindings.set(Variable::ContentEncoding, stats.content_encoding.as_str());
        bindings.set(Variable::ReceivedCount, stats.received_count.to_string());
        bindings.set(Variable::SignaturesCount, stats.signatures_count.to_string());
        bindings.set(Variable::MailingList, u32::from(stats.mailing_list).to_string());
        for var in [
            Variable::Date,
            Variable::MessageId,
            Variable::ContentType,
            Variable::ContentEncoding,
            Variable::ReceivedCount,
            Variable::SignaturesCount,
            Variable::MailingList,
        ] {
            requested.insert(var);
        }

        let message_ref = match self.run(StatementKind::InsertMessage, &bindings, requested) {
            Ok(Outcome::Captured(Some(reference))) => Some(reference),
            Ok(_) => None,
            Err(_) => return,
        };
        if let Some(reference) = message_ref {
            bindings.set(Variable::MessageRef, reference);
            requested.insert(Variable::MessageRef);
        }

        for domain in &stats.domains {
            bindings.set(Variable::Domain, domain.name.as_str());
            bindings.set(Variable::AuthType, domain.auth_token());
            requested.insert(Variable::Domain);
            requested.insert(Variable::AuthType);
            requested.remove(Variable::DomainRef);

            let mut preexisting = true;
            let mut domain_ref = match self.run(StatementKind::SelectDomain, &bindings, requested) {
                Ok(outcome) => outcome.text().map(str::to_owned),
                Err(_) => continue,
            };

            if domain_ref.is_none() {
                preexisting = false;
                domain_ref = match self.run(StatementKind::InsertDomain, &bindings, requested) {
                    Ok(outcome) => outcome.text().map(str::to_owned),
                    Err(_) => continue,
                };
                if domain_ref.is_none() {
                    // Insert returned no reference (no multi-statement
                    // SELECT LAST_INSERT_ID); one more select settles it.
                    domain_ref = self
                        .run(StatementKind::SelectDomain, &bindings, requested)
                        .map(|outcome| outcome.text().map(str::to_owned))
                        .unwrap_or(None);
                }
            }

            if let Some(reference) = domain_ref {
                bindings.set(Variable::DomainRef, reference);
                requested.insert(Variable::DomainRef);
            }

            if preexisting {
                let _ = self.run(StatementKind::UpdateDomain, &bindings, requested);
            }
            let _ = self.run(StatementKind::InsertMsgRef, &bindings, requested);
        }
    }
}

/// Split the dotted `ino.mtime.pid` identifier; all three components must be
/// present and non-empty.
fn split_ino_mtime_pid(id: &str) -> Option<(&str, &str, &str)> {
    let (ino, rest) = id.split_once('.')?;
    let (mtime, pid) = rest.split_once('.')?;
    if ino.is_empty() || mtime.is_empty() || pid.is_empty() {
        return None;
    }
    Some((ino, mtime, pid))
}
