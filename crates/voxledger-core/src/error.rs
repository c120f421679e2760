//! Error types for `voxledger-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no published version for template {0}")]
  TemplateNotFound(Uuid),

  #[error(
    "question count mismatch: submission declares {submitted}, published \
     template has {expected}"
  )]
  QuestionCountMismatch { submitted: usize, expected: usize },

  #[error("malformed answer at index {index}: {reason}")]
  MalformedAnswer { index: usize, reason: String },

  #[error(
    "answers out of order at index {index}: question_order {found} follows \
     {previous}"
  )]
  UnorderedAnswers {
    index:    usize,
    previous: i64,
    found:    i64,
  },

  #[error("unknown question id: {0:?}")]
  UnknownQuestion(String),

  #[error("unknown call status: {0:?}")]
  UnknownCallStatus(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
