//! Call-session lifecycle and the billability classifier.
//!
//! ```text
//! queued ──► ringing ──► answered ──► completed
//!    │          │           │
//!    └──────────┴───────────┴──────► failed
//! ```
//!
//! `completed` and `failed` are terminal. Transitions are driven only by
//! provider status events; nothing here originates one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CallStatus {
  Queued,
  Ringing,
  Answered,
  Completed,
  Failed,
}

impl CallStatus {
  /// Parse the provider's status string.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownCallStatus(s.to_owned()))
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed)
  }

  /// Position along the happy path. `failed` has no rank of its own; it can
  /// be entered from any non-terminal state.
  fn rank(self) -> u8 {
    match self {
      Self::Queued => 0,
      Self::Ringing => 1,
      Self::Answered => 2,
      Self::Completed => 3,
      Self::Failed => 3,
    }
  }

  /// Whether a session currently in `self` moves to `next` on receipt of an
  /// event reporting `next`.
  ///
  /// Forward skips are accepted because the provider may drop or reorder
  /// intermediate events. Backward moves, repeats, and anything leaving a
  /// terminal state are not.
  pub fn can_advance_to(self, next: CallStatus) -> bool {
    if self.is_terminal() {
      return false;
    }
    if next == Self::Failed {
      return true;
    }
    next.rank() > self.rank()
  }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

/// A call is billable iff it reports `completed`, or `answered` with a
/// strictly positive duration.
pub fn is_billable(status: CallStatus, duration_seconds: Option<i64>) -> bool {
  match status {
    CallStatus::Completed => true,
    CallStatus::Answered => duration_seconds.is_some_and(|d| d > 0),
    CallStatus::Queued | CallStatus::Ringing | CallStatus::Failed => false,
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// One outbound call placed on behalf of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
  pub call_session_id:       Uuid,
  pub campaign_id:           Uuid,
  pub status:                CallStatus,
  /// `None` until the provider reports one.
  pub call_duration_seconds: Option<i64>,
  /// Set in the same transaction as the session's single debit.
  pub billed:                bool,
  pub created_at:            DateTime<Utc>,
  pub updated_at:            DateTime<Utc>,
}

/// Result of feeding one status event to a session.
#[derive(Debug, Clone)]
pub struct StatusChange {
  /// The session as stored after the event.
  pub session:  CallSession,
  /// Status before the event.
  pub previous: CallStatus,
  /// `false` when the event was stale or the session was already terminal.
  pub applied:  bool,
}
