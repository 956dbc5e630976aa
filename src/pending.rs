//! Recovery for results the backend delivered late or not at all.
//!
//! The wire protocol requires every result to be consumed in order; an
//! abandoned result leaks backend resources and desynchronizes the session.
//! When a fetch times out, the undrained result is tracked here and every
//! subsequent call first attempts one bounded drain before it is allowed to
//! touch the connection.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::backend::{Connection, Fetched};

/// At most one undrained result is tracked per connection; the stuck-report
/// is logged once per episode, however many calls get refused meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingResult {
    #[default]
    Clear,
    Pending {
        since: DateTime<Utc>,
        warned: bool,
    },
}

impl PendingResult {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, PendingResult::Pending { .. })
    }

    /// Record a fetch timeout observed while draining results.
    pub fn mark_pending(&mut self) {
        *self = PendingResult::Pending {
            since: Utc::now(),
            warned: false,
        };
    }

    /// One bounded attempt to drain the outstanding result. Returns whether
    /// the connection is clear and the new call may proceed.
    pub fn recover(&mut self, conn: &mut dyn Connection, timeout: Duration) -> bool {
        let PendingResult::Pending { since, warned } = *self else {
            return true;
        };

        match conn.fetch_result(timeout) {
            Ok(Fetched::Timeout) | Err(_) => {
                if !warned {
                    error!(
                        elapsed_secs = elapsed_secs(since),
                        "backend appears stuck; refusing calls until its result is drained"
                    );
                    *self = PendingResult::Pending {
                        since,
                        warned: true,
                    };
                }
                false
            }
            Ok(_drained) => {
                info!(
                    elapsed_secs = elapsed_secs(since),
                    "late backend result discarded"
                );
                *self = PendingResult::Clear;
                true
            }
        }
    }
}

fn elapsed_secs(since: DateTime<Utc>) -> i64 {
    (Utc::now() - since).num_seconds()
}
