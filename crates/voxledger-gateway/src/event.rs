//! Inbound provider events, parsed at the boundary before any component sees
//! them.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;
use voxledger_core::call::CallStatus;

use crate::error::Error;

/// `{call_session_id, status, duration}`
#[derive(Debug, Clone, Deserialize)]
pub struct CallStatusEvent {
  /// Kept as a string: an id that does not parse names no session and is
  /// reported as not found, not as a malformed payload.
  pub call_session_id: String,
  pub status:          CallStatus,
  #[serde(default)]
  pub duration:        Option<i64>,
}

/// Provider-side context attached to a response. All advisory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
  #[serde(default)]
  pub session_id:            Option<Uuid>,
  #[serde(default)]
  pub hospital_id:           Option<Uuid>,
  #[serde(default)]
  pub campaign_id:           Option<Uuid>,
  #[serde(default)]
  pub call_duration_seconds: Option<i64>,
}

/// `{template_id, question_count, answers[], metadata{…}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEvent {
  pub template_id:    Uuid,
  pub question_count: usize,
  /// Left untyped here; the template validator owns the per-answer
  /// structural check so that a bad answer is reported as such.
  pub answers:        Vec<Value>,
  #[serde(default)]
  pub metadata:       ResponseMetadata,
}

/// Envelope accepted on the combined webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundEvent {
  CallStatus(CallStatusEvent),
  Response(ResponseEvent),
}

/// Parse a JSON body into `T`, reporting any mismatch as a malformed payload.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
  serde_json::from_slice(body).map_err(|e| Error::MalformedPayload(e.to_string()))
}

impl CallStatusEvent {
  pub fn check(&self) -> Result<(), Error> {
    match self.duration {
      Some(d) if d < 0 => Err(Error::MalformedPayload(format!(
        "duration must not be negative, got {d}"
      ))),
      _ => Ok(()),
    }
  }
}
