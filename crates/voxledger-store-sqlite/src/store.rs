//! [`SqliteStore`], the SQLite implementation of [`BillingStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use voxledger_core::{
  call::{CallSession, CallStatus, StatusChange},
  ledger::{DebitOutcome, Transaction, TransactionType},
  response::{NewTemplateResponse, RecordOutcome, TemplateResponse},
  store::BillingStore,
  template::{Question, TemplateVersion},
  tenant::{Campaign, ContractStatus, Hospital},
};

use crate::{
  Error, Result,
  encode::{
    RawCallSession, RawHospital, RawTemplateResponse, RawTemplateVersion,
    RawTransaction, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A voxledger billing store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Carry a decode failure out of a `Connection::call` closure.
fn other(e: impl Into<Error>) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e.into()))
}

/// What the debit transaction found.
enum DebitRow {
  NoHospital,
  Recorded(RawTransaction),
  Replayed(RawTransaction),
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── BillingStore impl ───────────────────────────────────────────────────────

impl BillingStore for SqliteStore {
  type Error = Error;

  // ── Tenants & campaigns ───────────────────────────────────────────────────

  async fn add_hospital(
    &self,
    name: String,
    opening_balance: i64,
    contract_status: ContractStatus,
  ) -> Result<Hospital> {
    let hospital = Hospital {
      hospital_id: Uuid::new_v4(),
      name,
      token_balance: opening_balance,
      contract_status,
      created_at: Utc::now(),
    };

    let id_str     = encode_uuid(hospital.hospital_id);
    let name       = hospital.name.clone();
    let status_str = contract_status.as_ref().to_owned();
    let at_str     = encode_dt(hospital.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO hospitals (hospital_id, name, token_balance, contract_status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, opening_balance, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(hospital)
  }

  async fn get_hospital(&self, hospital_id: Uuid) -> Result<Option<Hospital>> {
    let id_str = encode_uuid(hospital_id);

    let raw: Option<RawHospital> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM hospitals WHERE hospital_id = ?1",
                RawHospital::COLUMNS
              ),
              rusqlite::params![id_str],
              RawHospital::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawHospital::into_hospital).transpose()
  }

  async fn add_campaign(&self, hospital_id: Uuid) -> Result<Campaign> {
    if self.get_hospital(hospital_id).await?.is_none() {
      return Err(Error::HospitalNotFound(hospital_id));
    }

    let campaign = Campaign {
      campaign_id: Uuid::new_v4(),
      hospital_id,
      created_at: Utc::now(),
    };

    let id_str       = encode_uuid(campaign.campaign_id);
    let hospital_str = encode_uuid(hospital_id);
    let at_str       = encode_dt(campaign.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO campaigns (campaign_id, hospital_id, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, hospital_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(campaign)
  }

  async fn campaign_hospital(&self, campaign_id: Uuid) -> Result<Option<Uuid>> {
    let id_str = encode_uuid(campaign_id);

    let hospital: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT hospital_id FROM campaigns WHERE campaign_id = ?1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    hospital
      .map(|s| Uuid::parse_str(&s))
      .transpose()
      .map_err(Error::Uuid)
  }

  // ── Call sessions ─────────────────────────────────────────────────────────

  async fn create_call_session(&self, campaign_id: Uuid) -> Result<CallSession> {
    if self.campaign_hospital(campaign_id).await?.is_none() {
      return Err(Error::CampaignNotFound(campaign_id));
    }

    let now = Utc::now();
    let session = CallSession {
      call_session_id:       Uuid::new_v4(),
      campaign_id,
      status:                CallStatus::Queued,
      call_duration_seconds: None,
      billed:                false,
      created_at:            now,
      updated_at:            now,
    };

    let id_str       = encode_uuid(session.call_session_id);
    let campaign_str = encode_uuid(campaign_id);
    let status_str   = session.status.as_ref().to_owned();
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO call_sessions (
             call_session_id, campaign_id, status, billed, created_at, updated_at
           ) VALUES (?1, ?2, ?3, 0, ?4, ?4)",
          rusqlite::params![id_str, campaign_str, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  async fn get_call_session(&self, call_session_id: Uuid) -> Result<Option<CallSession>> {
    let id_str = encode_uuid(call_session_id);

    let raw: Option<RawCallSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM call_sessions WHERE call_session_id = ?1",
                RawCallSession::COLUMNS
              ),
              rusqlite::params![id_str],
              RawCallSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCallSession::into_session).transpose()
  }

  async fn advance_call_session(
    &self,
    call_session_id:  Uuid,
    status:           CallStatus,
    duration_seconds: Option<i64>,
  ) -> Result<Option<StatusChange>> {
    let id_str = encode_uuid(call_session_id);
    let now    = encode_dt(Utc::now());

    let found: Option<(RawCallSession, CallStatus, bool)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw = tx
          .query_row(
            &format!(
              "SELECT {} FROM call_sessions WHERE call_session_id = ?1",
              RawCallSession::COLUMNS
            ),
            rusqlite::params![id_str],
            RawCallSession::from_row,
          )
          .optional()?;

        let Some(mut raw) = raw else {
          return Ok(None);
        };

        let previous = raw.status().map_err(other)?;
        let applied  = previous.can_advance_to(status);

        if applied {
          raw.status = status.as_ref().to_owned();
          if duration_seconds.is_some() {
            raw.call_duration_seconds = duration_seconds;
          }
          raw.updated_at = now;
          tx.execute(
            "UPDATE call_sessions
                SET status = ?2, call_duration_seconds = ?3, updated_at = ?4
              WHERE call_session_id = ?1",
            rusqlite::params![
              raw.call_session_id,
              raw.status,
              raw.call_duration_seconds,
              raw.updated_at,
            ],
          )?;
        }

        tx.commit()?;
        Ok(Some((raw, previous, applied)))
      })
      .await?;

    let Some((raw, previous, applied)) = found else {
      return Ok(None);
    };

    Ok(Some(StatusChange {
      session: raw.into_session()?,
      previous,
      applied,
    }))
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  async fn debit(
    &self,
    hospital_id:     Uuid,
    call_session_id: Uuid,
    amount:          i64,
  ) -> Result<DebitOutcome> {
    if amount <= 0 {
      return Err(Error::NonPositiveAmount(amount));
    }

    let candidate = RawTransaction {
      transaction_id:   encode_uuid(Uuid::new_v4()),
      hospital_id:      encode_uuid(hospital_id),
      amount:           -amount,
      transaction_type: TransactionType::CallUsage.as_ref().to_owned(),
      reference_id:     Some(encode_uuid(call_session_id)),
      created_at:       encode_dt(Utc::now()),
    };

    // Conditional insert, balance update, and billed flag commit together or
    // not at all. The partial unique index decides whether this delivery is
    // the first.
    let row = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let hospital_exists = tx
          .query_row(
            "SELECT 1 FROM hospitals WHERE hospital_id = ?1",
            rusqlite::params![candidate.hospital_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !hospital_exists {
          return Ok(DebitRow::NoHospital);
        }

        let inserted = tx.execute(
          "INSERT INTO transactions (
             transaction_id, hospital_id, amount, transaction_type, reference_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            candidate.transaction_id,
            candidate.hospital_id,
            candidate.amount,
            candidate.transaction_type,
            candidate.reference_id,
            candidate.created_at,
          ],
        )?;

        let row = if inserted == 1 {
          tx.execute(
            "UPDATE hospitals SET token_balance = token_balance + ?2 WHERE hospital_id = ?1",
            rusqlite::params![candidate.hospital_id, candidate.amount],
          )?;
          tx.execute(
            "UPDATE call_sessions SET billed = 1 WHERE call_session_id = ?1",
            rusqlite::params![candidate.reference_id],
          )?;
          DebitRow::Recorded(candidate)
        } else {
          let existing = tx.query_row(
            &format!(
              "SELECT {} FROM transactions
                WHERE reference_id = ?1 AND transaction_type = ?2",
              RawTransaction::COLUMNS
            ),
            rusqlite::params![candidate.reference_id, candidate.transaction_type],
            RawTransaction::from_row,
          )?;
          DebitRow::Replayed(existing)
        };

        tx.commit()?;
        Ok(row)
      })
      .await?;

    match row {
      DebitRow::NoHospital => Err(Error::HospitalNotFound(hospital_id)),
      DebitRow::Recorded(raw) => Ok(DebitOutcome {
        transaction: raw.into_transaction()?,
        replayed:    false,
      }),
      DebitRow::Replayed(raw) => {
        tracing::debug!(%call_session_id, "debit already recorded for session");
        Ok(DebitOutcome {
          transaction: raw.into_transaction()?,
          replayed:    true,
        })
      }
    }
  }

  async fn credit(
    &self,
    hospital_id: Uuid,
    amount:      i64,
    reference:   Option<String>,
  ) -> Result<Transaction> {
    if amount <= 0 {
      return Err(Error::NonPositiveAmount(amount));
    }

    let transaction = Transaction {
      transaction_id:   Uuid::new_v4(),
      hospital_id,
      amount,
      transaction_type: TransactionType::Recharge,
      reference_id:     reference,
      created_at:       Utc::now(),
    };

    let txn_id_str   = encode_uuid(transaction.transaction_id);
    let hospital_str = encode_uuid(hospital_id);
    let type_str     = transaction.transaction_type.as_ref().to_owned();
    let reference    = transaction.reference_id.clone();
    let at_str       = encode_dt(transaction.created_at);

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = tx.execute(
          "UPDATE hospitals SET token_balance = token_balance + ?2 WHERE hospital_id = ?1",
          rusqlite::params![hospital_str, amount],
        )?;
        if updated == 0 {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO transactions (
             transaction_id, hospital_id, amount, transaction_type, reference_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![txn_id_str, hospital_str, amount, type_str, reference, at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !updated {
      return Err(Error::HospitalNotFound(hospital_id));
    }
    Ok(transaction)
  }

  async fn list_transactions(&self, hospital_id: Uuid) -> Result<Vec<Transaction>> {
    let id_str = encode_uuid(hospital_id);

    let raws: Vec<RawTransaction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM transactions WHERE hospital_id = ?1 ORDER BY created_at, rowid",
          RawTransaction::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawTransaction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransaction::into_transaction).collect()
  }

  // ── Templates ─────────────────────────────────────────────────────────────

  async fn publish_template_version(
    &self,
    template_id: Uuid,
    questions:   Vec<Question>,
  ) -> Result<TemplateVersion> {
    let version_id     = Uuid::new_v4();
    let created_at     = Utc::now();
    let version_id_str = encode_uuid(version_id);
    let template_str   = encode_uuid(template_id);
    let questions_json = serde_json::to_string(&questions)?;
    let at_str         = encode_dt(created_at);

    let version: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let version: i64 = tx.query_row(
          "SELECT COALESCE(MAX(version), 0) + 1 FROM template_versions WHERE template_id = ?1",
          rusqlite::params![template_str],
          |row| row.get(0),
        )?;
        tx.execute(
          "UPDATE template_versions SET is_published = 0
            WHERE template_id = ?1 AND is_published = 1",
          rusqlite::params![template_str],
        )?;
        tx.execute(
          "INSERT INTO template_versions (
             template_version_id, template_id, version, questions_json, is_published, created_at
           ) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
          rusqlite::params![version_id_str, template_str, version, questions_json, at_str],
        )?;
        tx.commit()?;
        Ok(version)
      })
      .await?;

    Ok(TemplateVersion {
      template_version_id: version_id,
      template_id,
      version,
      questions,
      is_published: true,
      created_at,
    })
  }

  async fn published_template(&self, template_id: Uuid) -> Result<Option<TemplateVersion>> {
    let id_str = encode_uuid(template_id);

    let raw: Option<RawTemplateVersion> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM template_versions
                  WHERE template_id = ?1 AND is_published = 1",
                RawTemplateVersion::COLUMNS
              ),
              rusqlite::params![id_str],
              RawTemplateVersion::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTemplateVersion::into_template).transpose()
  }

  // ── Responses ─────────────────────────────────────────────────────────────

  async fn record_response(&self, input: NewTemplateResponse) -> Result<RecordOutcome> {
    let response = TemplateResponse {
      response_id:     Uuid::new_v4(),
      template_id:     input.template_id,
      hospital_id:     input.hospital_id,
      session_id:      input.session_id,
      answers:         input.answers,
      response_hash:   input.response_hash,
      completion_rate: input.completion_rate,
      created_at:      Utc::now(),
    };

    let response_id_str = encode_uuid(response.response_id);
    let template_str    = encode_uuid(response.template_id);
    let hospital_str    = encode_uuid(response.hospital_id);
    let session_str     = response.session_id.map(encode_uuid);
    let answers_json    = serde_json::to_string(&response.answers)?;
    let hash            = response.response_hash.clone();
    let rate            = response.completion_rate;
    let at_str          = encode_dt(response.created_at);

    // `None` means this delivery wrote the row; `Some(rate)` is the rate
    // stored by the earlier delivery.
    let prior_rate: Option<f64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
          "INSERT INTO template_responses (
             response_id, template_id, hospital_id, session_id,
             answers_json, response_hash, completion_rate, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (response_hash) DO NOTHING",
          rusqlite::params![
            response_id_str,
            template_str,
            hospital_str,
            session_str,
            answers_json,
            hash,
            rate,
            at_str,
          ],
        )?;
        let prior = if inserted == 0 {
          Some(tx.query_row(
            "SELECT completion_rate FROM template_responses WHERE response_hash = ?1",
            rusqlite::params![hash],
            |row| row.get(0),
          )?)
        } else {
          None
        };
        tx.commit()?;
        Ok(prior)
      })
      .await?;

    Ok(match prior_rate {
      Some(completion_rate) => RecordOutcome::Duplicate { completion_rate },
      None => RecordOutcome::Inserted(response),
    })
  }

  async fn list_responses(&self, template_id: Uuid) -> Result<Vec<TemplateResponse>> {
    let id_str = encode_uuid(template_id);

    let raws: Vec<RawTemplateResponse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM template_responses WHERE template_id = ?1 ORDER BY created_at, rowid",
          RawTemplateResponse::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawTemplateResponse::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTemplateResponse::into_response).collect()
  }
}
