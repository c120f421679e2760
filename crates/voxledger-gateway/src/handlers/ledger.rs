//! Tenant ledger: balance view and recharges.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/ledger/{hospital_id}` | Own hospital, or any with a super-tenant credential |
//! | `POST` | `/ledger/{hospital_id}/credit` | Super-tenant only; body `{"amount": n, "reference": "..."}` |

use axum::{
  Json,
  extract::{Path, State},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use voxledger_core::{
  ledger::Transaction,
  store::BillingStore,
  tenant::ContractStatus,
};

use crate::{AppState, auth::Caller, error::Error, event::decode};

#[derive(Debug, Serialize)]
pub struct LedgerView {
  pub success:         bool,
  pub hospital_id:     Uuid,
  pub name:            String,
  pub token_balance:   i64,
  pub contract_status: ContractStatus,
  pub transactions:    Vec<Transaction>,
}

/// `GET /ledger/{hospital_id}`
pub async fn show<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(hospital_id): Path<Uuid>,
) -> Result<Json<LedgerView>, Error>
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  caller.authorize(hospital_id)?;

  let hospital = state
    .store
    .get_hospital(hospital_id)
    .await
    .map_err(Error::internal)?
    .ok_or_else(|| Error::NotFound(format!("hospital {hospital_id}")))?;

  let transactions = state
    .store
    .list_transactions(hospital_id)
    .await
    .map_err(Error::internal)?;

  Ok(Json(LedgerView {
    success: true,
    hospital_id,
    name: hospital.name,
    token_balance: hospital.token_balance,
    contract_status: hospital.contract_status,
    transactions,
  }))
}

#[derive(Debug, Deserialize)]
pub struct CreditBody {
  pub amount:    i64,
  #[serde(default)]
  pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreditReply {
  pub success:       bool,
  pub transaction:   Transaction,
  pub token_balance: i64,
}

/// `POST /ledger/{hospital_id}/credit`
pub async fn credit<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(hospital_id): Path<Uuid>,
  body: Bytes,
) -> Result<Json<CreditReply>, Error>
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  caller.require_super_tenant()?;

  let body = decode::<CreditBody>(&body)?;
  if body.amount <= 0 {
    return Err(Error::MalformedPayload(format!(
      "amount must be positive, got {}",
      body.amount
    )));
  }

  state
    .store
    .get_hospital(hospital_id)
    .await
    .map_err(Error::internal)?
    .ok_or_else(|| Error::NotFound(format!("hospital {hospital_id}")))?;

  let transaction = state
    .store
    .credit(hospital_id, body.amount, body.reference)
    .await
    .map_err(Error::ledger)?;

  let token_balance = state
    .store
    .get_hospital(hospital_id)
    .await
    .map_err(Error::internal)?
    .map(|h| h.token_balance)
    .ok_or_else(|| Error::NotFound(format!("hospital {hospital_id}")))?;

  tracing::info!(
    %hospital_id,
    amount = transaction.amount,
    token_balance,
    "hospital recharged"
  );

  Ok(Json(CreditReply { success: true, transaction, token_balance }))
}
