//! Vocabulary shared by every lifecycle transition: who performed it and
//! how it ended.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Actor string recorded for transitions performed by background sweeps
pub const SYSTEM_ACTOR: &str = "system";

/// The party performing a lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// A background sweep
    System,
    /// An end user acting on their own data
    User { id: Uuid, email: String },
    /// An operator authenticated against the admin API
    Admin { username: String },
}

impl Actor {
    /// Identifier persisted in `soft_deleted_by` and audit `actor_id`
    pub fn id(&self) -> String {
        match self {
            Actor::System => SYSTEM_ACTOR.to_string(),
            Actor::User { id, .. } => id.to_string(),
            Actor::Admin { username } => format!("admin:{}", username),
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Actor::User { email, .. } => Some(email),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Result of applying a transition to a single entity.
///
/// Only `Applied` changes state. The other variants are successful
/// no-ops: sweeps and explicit actions race, so re-invoking a transition
/// on an entity that already moved (or vanished) must never be an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied,
    /// The entity is already in the target state
    AlreadyApplied,
    /// The entity no longer exists
    NotFound,
    /// The entity exists but is not (yet) due for this transition
    NotEligible,
}

impl TransitionOutcome {
    pub fn is_applied(self) -> bool {
        self == TransitionOutcome::Applied
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionOutcome::Applied => "applied",
            TransitionOutcome::AlreadyApplied => "already_applied",
            TransitionOutcome::NotFound => "not_found",
            TransitionOutcome::NotEligible => "not_eligible",
        }
    }
}

impl fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tally of one sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SweepReport {
    /// Candidates the sweep looked at
    pub examined: u64,
    /// Candidates that actually transitioned
    pub applied: u64,
    /// Candidates that were already handled or no longer due
    pub skipped: u64,
    /// Candidates left for the next run after a store failure
    pub failed: u64,
}

impl SweepReport {
    pub fn record(&mut self, outcome: TransitionOutcome) {
        self.examined += 1;
        if outcome.is_applied() {
            self.applied += 1;
        } else {
            self.skipped += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.examined += 1;
        self.failed += 1;
    }

    pub fn merge(self, other: SweepReport) -> SweepReport {
        SweepReport {
            examined: self.examined + other.examined,
            applied: self.applied + other.applied,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
        }
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined={} applied={} skipped={} failed={}",
            self.examined, self.applied, self.skipped, self.failed
        )
    }
}
