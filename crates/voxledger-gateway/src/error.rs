//! Boundary error taxonomy and axum `IntoResponse` implementation.
//!
//! Every failure leaves the gateway as
//! `{"success": false, "error": {"kind": "...", "message": "..."}}` with a
//! status code chosen so the provider retries only what a retry can fix.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("authentication failed: {0}")]
  Auth(String),

  #[error("tenant context: {0}")]
  TenantContext(String),

  #[error("malformed payload: {0}")]
  MalformedPayload(String),

  #[error("not found: {0}")]
  NotFound(String),

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

  #[error("ledger unavailable: {0}")]
  LedgerConflict(#[source] BoxError),

  #[error("internal fault: {0}")]
  Internal(#[source] BoxError),
}

impl Error {
  pub fn internal(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Internal(Box::new(e))
  }

  pub fn ledger(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::LedgerConflict(Box::new(e))
  }

  /// Machine-readable error kind, stable across releases.
  pub fn kind(&self) -> &'static str {
    match self {
      Error::Auth(_) => "AuthError",
      Error::TenantContext(_) => "TenantContextError",
      Error::MalformedPayload(_) => "MalformedPayloadError",
      Error::NotFound(_) => "NotFoundError",
      Error::TemplateNotFound(_) => "TemplateNotFoundError",
      Error::QuestionCountMismatch { .. } => "QuestionCountMismatchError",
      Error::MalformedAnswer { .. } => "MalformedAnswerError",
      Error::UnorderedAnswers { .. } => "UnorderedAnswersError",
      Error::UnknownQuestion(_) => "UnknownQuestionError",
      Error::LedgerConflict(_) => "LedgerConflictError",
      Error::Internal(_) => "InternalFault",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Error::Auth(_) => StatusCode::UNAUTHORIZED,
      Error::TenantContext(_) => StatusCode::FORBIDDEN,
      Error::NotFound(_) | Error::TemplateNotFound(_) => StatusCode::NOT_FOUND,
      Error::MalformedPayload(_)
      | Error::QuestionCountMismatch { .. }
      | Error::MalformedAnswer { .. }
      | Error::UnorderedAnswers { .. }
      | Error::UnknownQuestion(_) => StatusCode::BAD_REQUEST,
      Error::LedgerConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
      Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<voxledger_core::Error> for Error {
  fn from(e: voxledger_core::Error) -> Self {
    use voxledger_core::Error as Core;
    match e {
      Core::TemplateNotFound(id) => Error::TemplateNotFound(id),
      Core::QuestionCountMismatch { submitted, expected } => {
        Error::QuestionCountMismatch { submitted, expected }
      }
      Core::MalformedAnswer { index, reason } => {
        Error::MalformedAnswer { index, reason }
      }
      Core::UnorderedAnswers { index, previous, found } => {
        Error::UnorderedAnswers { index, previous, found }
      }
      Core::UnknownQuestion(id) => Error::UnknownQuestion(id),
      Core::UnknownCallStatus(s) => {
        Error::MalformedPayload(format!("unknown call status: {s:?}"))
      }
      other @ Core::Serialization(_) => Error::internal(other),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    let kind = self.kind();

    // Server-side faults are logged in full and reported generically.
    let message = if status.is_server_error() {
      tracing::error!(kind, error = %self, "request failed");
      match self {
        Error::LedgerConflict(_) => "ledger temporarily unavailable".to_owned(),
        _ => "internal fault".to_owned(),
      }
    } else {
      tracing::warn!(kind, error = %self, "request rejected");
      self.to_string()
    };

    let body = json!({
      "success": false,
      "error": { "kind": kind, "message": message },
    });
    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"voxledger\""),
      );
    }
    res
  }
}
