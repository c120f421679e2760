//! The `BillingStore` trait.
//!
//! Implemented by storage backends (e.g. `voxledger-store-sqlite`). The
//! gateway depends on this abstraction, not on any concrete backend.
//!
//! Correctness under at-least-once delivery rests on two operations being
//! atomic in the backend: [`BillingStore::debit`] and
//! [`BillingStore::record_response`]. Both are keyed by a uniqueness
//! constraint, never by an in-process lock.

use std::future::Future;

use uuid::Uuid;

use crate::{
  call::{CallSession, CallStatus, StatusChange},
  ledger::{DebitOutcome, Transaction},
  response::{NewTemplateResponse, RecordOutcome, TemplateResponse},
  template::{Question, TemplateVersion},
  tenant::{Campaign, ContractStatus, Hospital},
};

pub trait BillingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Tenants & campaigns ───────────────────────────────────────────────

  fn add_hospital(
    &self,
    name: String,
    opening_balance: i64,
    contract_status: ContractStatus,
  ) -> impl Future<Output = Result<Hospital, Self::Error>> + Send + '_;

  /// Returns `None` if not found.
  fn get_hospital(
    &self,
    hospital_id: Uuid,
  ) -> impl Future<Output = Result<Option<Hospital>, Self::Error>> + Send + '_;

  /// Fails if the hospital does not exist.
  fn add_campaign(
    &self,
    hospital_id: Uuid,
  ) -> impl Future<Output = Result<Campaign, Self::Error>> + Send + '_;

  /// Resolve the tenant that owns a campaign.
  fn campaign_hospital(
    &self,
    campaign_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  // ── Call sessions ─────────────────────────────────────────────────────

  /// Create a `queued` session. Called by the outbound call trigger before
  /// any status event for the session can arrive.
  fn create_call_session(
    &self,
    campaign_id: Uuid,
  ) -> impl Future<Output = Result<CallSession, Self::Error>> + Send + '_;

  fn get_call_session(
    &self,
    call_session_id: Uuid,
  ) -> impl Future<Output = Result<Option<CallSession>, Self::Error>> + Send + '_;

  /// Apply one provider status event atomically, following
  /// [`CallStatus::can_advance_to`]. The duration is recorded only when the
  /// transition is applied. Returns `None` if the session does not exist.
  fn advance_call_session(
    &self,
    call_session_id: Uuid,
    status: CallStatus,
    duration_seconds: Option<i64>,
  ) -> impl Future<Output = Result<Option<StatusChange>, Self::Error>> + Send + '_;

  // ── Ledger ────────────────────────────────────────────────────────────

  /// Debit `amount` tokens for one call session.
  ///
  /// In one atomic step: insert a `call_usage` transaction of `-amount`
  /// keyed by the session id, and decrement the balance only if that insert
  /// took effect. If the session was already billed, the existing
  /// transaction is returned with `replayed = true`. Overdraft is allowed.
  fn debit(
    &self,
    hospital_id: Uuid,
    call_session_id: Uuid,
    amount: i64,
  ) -> impl Future<Output = Result<DebitOutcome, Self::Error>> + Send + '_;

  /// Recharge a tenant's balance. Append-only like debits, no idempotency
  /// key.
  fn credit(
    &self,
    hospital_id: Uuid,
    amount: i64,
    reference: Option<String>,
  ) -> impl Future<Output = Result<Transaction, Self::Error>> + Send + '_;

  /// All transactions for a tenant, oldest first.
  fn list_transactions(
    &self,
    hospital_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Transaction>, Self::Error>> + Send + '_;

  // ── Templates ─────────────────────────────────────────────────────────

  /// Publish a new version of `template_id`, unpublishing the previous one
  /// in the same step.
  fn publish_template_version(
    &self,
    template_id: Uuid,
    questions: Vec<Question>,
  ) -> impl Future<Output = Result<TemplateVersion, Self::Error>> + Send + '_;

  /// The currently published version, if any.
  fn published_template(
    &self,
    template_id: Uuid,
  ) -> impl Future<Output = Result<Option<TemplateVersion>, Self::Error>> + Send + '_;

  // ── Responses ─────────────────────────────────────────────────────────

  /// Insert a response unless one with the same `response_hash` exists, in
  /// which case nothing is written and the stored completion rate is
  /// returned.
  fn record_response(
    &self,
    input: NewTemplateResponse,
  ) -> impl Future<Output = Result<RecordOutcome, Self::Error>> + Send + '_;

  /// All stored responses for a template, oldest first.
  fn list_responses(
    &self,
    template_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TemplateResponse>, Self::Error>> + Send + '_;
}
