//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Enums are stored as their snake_case names.
//! Question and answer lists are stored as compact JSON.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use voxledger_core::{
  call::{CallSession, CallStatus},
  ledger::{Transaction, TransactionType},
  response::TemplateResponse,
  template::{Answer, Question, TemplateVersion},
  tenant::{ContractStatus, Hospital},
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn decode_enum<T: FromStr>(column: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("{column}: {s:?}")))
}

// ─── Raw row types ───────────────────────────────────────────────────────────

pub struct RawHospital {
  pub hospital_id:     String,
  pub name:            String,
  pub token_balance:   i64,
  pub contract_status: String,
  pub created_at:      String,
}

impl RawHospital {
  pub const COLUMNS: &'static str =
    "hospital_id, name, token_balance, contract_status, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      hospital_id:     row.get(0)?,
      name:            row.get(1)?,
      token_balance:   row.get(2)?,
      contract_status: row.get(3)?,
      created_at:      row.get(4)?,
    })
  }

  pub fn into_hospital(self) -> Result<Hospital> {
    Ok(Hospital {
      hospital_id:     decode_uuid(&self.hospital_id)?,
      name:            self.name,
      token_balance:   self.token_balance,
      contract_status: decode_enum::<ContractStatus>(
        "contract_status",
        &self.contract_status,
      )?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawCallSession {
  pub call_session_id:       String,
  pub campaign_id:           String,
  pub status:                String,
  pub call_duration_seconds: Option<i64>,
  pub billed:                bool,
  pub created_at:            String,
  pub updated_at:            String,
}

impl RawCallSession {
  pub const COLUMNS: &'static str = "call_session_id, campaign_id, status, \
                                     call_duration_seconds, billed, \
                                     created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      call_session_id:       row.get(0)?,
      campaign_id:           row.get(1)?,
      status:                row.get(2)?,
      call_duration_seconds: row.get(3)?,
      billed:                row.get(4)?,
      created_at:            row.get(5)?,
      updated_at:            row.get(6)?,
    })
  }

  /// Status only, for use inside a transaction before the full decode.
  pub fn status(&self) -> Result<CallStatus> {
    decode_enum("status", &self.status)
  }

  pub fn into_session(self) -> Result<CallSession> {
    Ok(CallSession {
      status:                self.status()?,
      call_session_id:       decode_uuid(&self.call_session_id)?,
      campaign_id:           decode_uuid(&self.campaign_id)?,
      call_duration_seconds: self.call_duration_seconds,
      billed:                self.billed,
      created_at:            decode_dt(&self.created_at)?,
      updated_at:            decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawTransaction {
  pub transaction_id:   String,
  pub hospital_id:      String,
  pub amount:           i64,
  pub transaction_type: String,
  pub reference_id:     Option<String>,
  pub created_at:       String,
}

impl RawTransaction {
  pub const COLUMNS: &'static str = "transaction_id, hospital_id, amount, \
                                     transaction_type, reference_id, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transaction_id:   row.get(0)?,
      hospital_id:      row.get(1)?,
      amount:           row.get(2)?,
      transaction_type: row.get(3)?,
      reference_id:     row.get(4)?,
      created_at:       row.get(5)?,
    })
  }

  pub fn into_transaction(self) -> Result<Transaction> {
    Ok(Transaction {
      transaction_id:   decode_uuid(&self.transaction_id)?,
      hospital_id:      decode_uuid(&self.hospital_id)?,
      amount:           self.amount,
      transaction_type: decode_enum::<TransactionType>(
        "transaction_type",
        &self.transaction_type,
      )?,
      reference_id:     self.reference_id,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawTemplateVersion {
  pub template_version_id: String,
  pub template_id:         String,
  pub version:             i64,
  pub questions_json:      String,
  pub is_published:        bool,
  pub created_at:          String,
}

impl RawTemplateVersion {
  pub const COLUMNS: &'static str = "template_version_id, template_id, \
                                     version, questions_json, is_published, \
                                     created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      template_version_id: row.get(0)?,
      template_id:         row.get(1)?,
      version:             row.get(2)?,
      questions_json:      row.get(3)?,
      is_published:        row.get(4)?,
      created_at:          row.get(5)?,
    })
  }

  pub fn into_template(self) -> Result<TemplateVersion> {
    let questions: Vec<Question> = serde_json::from_str(&self.questions_json)?;
    Ok(TemplateVersion {
      template_version_id: decode_uuid(&self.template_version_id)?,
      template_id: decode_uuid(&self.template_id)?,
      version: self.version,
      questions,
      is_published: self.is_published,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawTemplateResponse {
  pub response_id:     String,
  pub template_id:     String,
  pub hospital_id:     String,
  pub session_id:      Option<String>,
  pub answers_json:    String,
  pub response_hash:   String,
  pub completion_rate: f64,
  pub created_at:      String,
}

impl RawTemplateResponse {
  pub const COLUMNS: &'static str = "response_id, template_id, hospital_id, \
                                     session_id, answers_json, response_hash, \
                                     completion_rate, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      response_id:     row.get(0)?,
      template_id:     row.get(1)?,
      hospital_id:     row.get(2)?,
      session_id:      row.get(3)?,
      answers_json:    row.get(4)?,
      response_hash:   row.get(5)?,
      completion_rate: row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_response(self) -> Result<TemplateResponse> {
    let answers: Vec<Answer> = serde_json::from_str(&self.answers_json)?;
    Ok(TemplateResponse {
      response_id: decode_uuid(&self.response_id)?,
      template_id: decode_uuid(&self.template_id)?,
      hospital_id: decode_uuid(&self.hospital_id)?,
      session_id: decode_opt_uuid(self.session_id)?,
      answers,
      response_hash: self.response_hash,
      completion_rate: self.completion_rate,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
