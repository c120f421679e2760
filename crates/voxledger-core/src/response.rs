//! Stored template responses and the content fingerprint used to deduplicate
//! retried deliveries.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::template::Answer;

/// A genuinely distinct answer submission. `response_hash` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateResponse {
  pub response_id:     Uuid,
  pub template_id:     Uuid,
  pub hospital_id:     Uuid,
  pub session_id:      Option<Uuid>,
  pub answers:         Vec<Answer>,
  pub response_hash:   String,
  pub completion_rate: f64,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::BillingStore::record_response`].
#[derive(Debug, Clone)]
pub struct NewTemplateResponse {
  pub template_id:     Uuid,
  pub hospital_id:     Uuid,
  pub session_id:      Option<Uuid>,
  pub answers:         Vec<Answer>,
  pub response_hash:   String,
  pub completion_rate: f64,
}

impl NewTemplateResponse {
  /// Build a row from validated answers, computing the fingerprint and the
  /// completion rate.
  pub fn new(
    template_id: Uuid,
    hospital_id: Uuid,
    session_id: Option<Uuid>,
    answers: Vec<Answer>,
    total_questions: usize,
  ) -> Self {
    let response_hash = fingerprint(template_id, session_id, &answers);
    let completion_rate = completion_rate(&answers, total_questions);
    Self {
      template_id,
      hospital_id,
      session_id,
      answers,
      response_hash,
      completion_rate,
    }
  }
}

/// Result of [`crate::store::BillingStore::record_response`].
#[derive(Debug, Clone)]
pub enum RecordOutcome {
  Inserted(TemplateResponse),
  /// A row with the same fingerprint already exists; nothing was written.
  Duplicate { completion_rate: f64 },
}

/// SHA-256 over the template id, the session id (empty when absent), and the
/// ordered `(question_id, response, order)` triples, hex-encoded.
///
/// Every field is length-prefixed so that no two distinct inputs share a byte
/// stream. Confidence is excluded: a re-transcription with a different score
/// is still the same answer set.
pub fn fingerprint(
  template_id: Uuid,
  session_id: Option<Uuid>,
  answers: &[Answer],
) -> String {
  let mut hasher = Sha256::new();
  feed(&mut hasher, template_id.as_bytes());
  match session_id {
    Some(id) => feed(&mut hasher, id.as_bytes()),
    None => feed(&mut hasher, b""),
  }
  hasher.update((answers.len() as u64).to_le_bytes());
  for a in answers {
    feed(&mut hasher, a.question_id.as_bytes());
    feed(&mut hasher, a.response.as_bytes());
    hasher.update(a.order.to_le_bytes());
  }
  hex::encode(hasher.finalize())
}

fn feed(hasher: &mut Sha256, bytes: &[u8]) {
  hasher.update((bytes.len() as u64).to_le_bytes());
  hasher.update(bytes);
}

/// Distinct answered questions over the template's question count.
pub fn completion_rate(answers: &[Answer], total_questions: usize) -> f64 {
  if total_questions == 0 {
    return 0.0;
  }
  let answered: HashSet<&str> =
    answers.iter().map(|a| a.question_id.as_str()).collect();
  answered.len() as f64 / total_questions as f64
}
