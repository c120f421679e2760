//! Error type for `voxledger-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] voxledger_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unrecognised column value: {0}")]
  Decode(String),

  #[error("hospital not found: {0}")]
  HospitalNotFound(uuid::Uuid),

  #[error("campaign not found: {0}")]
  CampaignNotFound(uuid::Uuid),

  #[error("amount must be positive, got {0}")]
  NonPositiveAmount(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
