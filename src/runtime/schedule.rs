//! # Schedule
//!
//! Per-resource record of when the next pass is due.
//!
//! Every status write produces a watch event for the same resource. Without
//! this gate each event would run a full issuance, mint a new token, write
//! status again and loop. Events that carry no spec or lifecycle change are
//! therefore deferred until the pass the reconciler asked for is due.

use crate::controller::reconciler::Requeue;
use crate::crd::InstallationAccessToken;
use crate::store::ObjectKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Passes due within this window run immediately
const DUE_TOLERANCE: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
pub struct ReconcileSchedule {
    due: Mutex<HashMap<ObjectKey, Instant>>,
}

/// Whether the event carries a change the reconciler must see right away
pub fn requires_immediate_pass(iat: &InstallationAccessToken) -> bool {
    let observed_generation = iat.status.as_ref().and_then(|s| s.observed_generation);
    iat.is_deleting()
        || !iat.has_finalizer()
        || observed_generation.is_none()
        || iat.metadata.generation != observed_generation
}

impl ReconcileSchedule {
    /// Time left until the next pass for `key`, `None` if it is due now
    pub fn remaining(&self, key: &ObjectKey, now: Instant) -> Option<Duration> {
        let due = match self.due.lock() {
            Ok(due) => due.get(key).copied()?,
            Err(e) => {
                warn!("Failed to lock reconcile schedule: {}, treating pass as due", e);
                return None;
            }
        };
        let remaining = due.checked_duration_since(now)?;
        (remaining > DUE_TOLERANCE).then_some(remaining)
    }

    /// Remember when the reconciler wants to run again
    pub fn record(&self, key: &ObjectKey, requeue: Requeue, now: Instant) {
        let Ok(mut due) = self.due.lock() else {
            warn!("Failed to lock reconcile schedule, not recording next pass for {}", key);
            return;
        };
        match requeue {
            Requeue::After(delay) => {
                due.insert(key.clone(), now + delay);
            }
            Requeue::Never => {
                due.remove(key);
            }
        }
    }

    pub fn forget(&self, key: &ObjectKey) {
        if let Ok(mut due) = self.due.lock() {
            due.remove(key);
        }
    }
}
