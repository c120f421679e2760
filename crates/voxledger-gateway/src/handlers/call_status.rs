//! Call-status events: advance the session, then bill it if the event is
//! billable.

use axum::{Json, extract::State};
use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;
use voxledger_core::{
  call::{CallStatus, is_billable},
  store::BillingStore,
};

use crate::{
  AppState,
  auth::Caller,
  error::Error,
  event::{CallStatusEvent, decode},
};

#[derive(Debug, Serialize)]
pub struct CallStatusReply {
  pub success:         bool,
  pub call_session_id: Uuid,
  /// Status as stored after the event.
  pub status:          CallStatus,
  /// `false` when the event was stale and left the status unchanged.
  pub applied:         bool,
  pub billable:        bool,
  pub transaction_id:  Option<Uuid>,
  /// `true` when the session had already been billed by an earlier delivery.
  pub replayed:        bool,
}

/// `POST /webhooks/call-status`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  body: Bytes,
) -> Result<Json<CallStatusReply>, Error>
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  let event = decode::<CallStatusEvent>(&body)?;
  apply(&state, &caller, event).await.map(Json)
}

pub async fn apply<S>(
  state: &AppState<S>,
  caller: &Caller,
  event: CallStatusEvent,
) -> Result<CallStatusReply, Error>
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  event.check()?;

  let not_found =
    || Error::NotFound(format!("call session {:?}", event.call_session_id));
  let session_id = Uuid::parse_str(&event.call_session_id).map_err(|_| not_found())?;

  let session = state
    .store
    .get_call_session(session_id)
    .await
    .map_err(Error::internal)?
    .ok_or_else(not_found)?;

  let hospital_id = state
    .store
    .campaign_hospital(session.campaign_id)
    .await
    .map_err(Error::internal)?
    .ok_or_else(|| Error::NotFound(format!("campaign {}", session.campaign_id)))?;

  caller.authorize(hospital_id)?;

  let change = state
    .store
    .advance_call_session(session_id, event.status, event.duration)
    .await
    .map_err(Error::internal)?
    .ok_or_else(not_found)?;

  if !change.applied {
    tracing::info!(
      %session_id,
      current = %change.session.status,
      reported = %event.status,
      "stale or post-terminal status ignored"
    );
  }

  // Decided on the event as delivered, once; the debit's idempotency key
  // absorbs every repeat.
  let billable = is_billable(event.status, event.duration);

  let debit = if billable {
    let outcome = state
      .store
      .debit(hospital_id, session_id, state.config.tokens_per_call)
      .await
      .map_err(Error::ledger)?;
    tracing::info!(
      %session_id,
      %hospital_id,
      transaction_id = %outcome.transaction.transaction_id,
      replayed = outcome.replayed,
      "call billed"
    );
    if !outcome.replayed && change.session.status == CallStatus::Failed {
      tracing::info!(
        %session_id,
        %hospital_id,
        transaction_id = %outcome.transaction.transaction_id,
        reported = %event.status,
        "debit recorded against a session stored as failed"
      );
    }
    Some(outcome)
  } else {
    None
  };

  Ok(CallStatusReply {
    success: true,
    call_session_id: session_id,
    status: change.session.status,
    applied: change.applied,
    billable,
    transaction_id: debit.as_ref().map(|d| d.transaction.transaction_id),
    replayed: debit.is_some_and(|d| d.replayed),
  })
}
