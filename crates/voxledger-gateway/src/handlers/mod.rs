pub mod call_status;
pub mod health;
pub mod ledger;
pub mod response;

use axum::{
  Json,
  extract::State,
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use voxledger_core::store::BillingStore;

use crate::{
  AppState,
  auth::Caller,
  error::Error,
  event::{InboundEvent, decode},
};

/// `POST /webhooks/voice`: tagged envelope, dispatched by event kind.
pub async fn webhook<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  body: Bytes,
) -> Result<Response, Error>
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  match decode::<InboundEvent>(&body)? {
    InboundEvent::CallStatus(event) => {
      let reply = call_status::apply(&state, &caller, event).await?;
      Ok(Json(reply).into_response())
    }
    InboundEvent::Response(event) => {
      let reply = response::ingest(&state, &caller, event).await?;
      Ok(Json(reply).into_response())
    }
  }
}
