//! Response events: resolve the tenant, validate against the published
//! template, then record once per distinct content fingerprint.

use axum::{Json, extract::State};
use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;
use voxledger_core::{
  response::{NewTemplateResponse, RecordOutcome},
  store::BillingStore,
};

use crate::{
  AppState,
  auth::{Caller, TenantScope},
  error::Error,
  event::{ResponseEvent, ResponseMetadata, decode},
};

#[derive(Debug, Serialize)]
pub struct ResponseReply {
  pub success:         bool,
  /// `None` when the submission was already recorded.
  pub response_id:     Option<Uuid>,
  pub response_hash:   String,
  pub completion_rate: f64,
  pub duplicate:       bool,
}

/// `POST /webhooks/response`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  body: Bytes,
) -> Result<Json<ResponseReply>, Error>
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  let event = decode::<ResponseEvent>(&body)?;
  ingest(&state, &caller, event).await.map(Json)
}

pub async fn ingest<S>(
  state: &AppState<S>,
  caller: &Caller,
  event: ResponseEvent,
) -> Result<ResponseReply, Error>
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  let hospital_id = resolve_hospital(state, caller, &event.metadata).await?;

  state
    .store
    .get_hospital(hospital_id)
    .await
    .map_err(Error::internal)?
    .ok_or_else(|| Error::NotFound(format!("hospital {hospital_id}")))?;

  let template = state
    .store
    .published_template(event.template_id)
    .await
    .map_err(Error::internal)?
    .ok_or(Error::TemplateNotFound(event.template_id))?;

  let answers = template.validate(event.question_count, &event.answers)?;

  let input = NewTemplateResponse::new(
    template.template_id,
    hospital_id,
    event.metadata.session_id,
    answers,
    template.question_count(),
  );
  let response_hash = input.response_hash.clone();

  let reply = match state
    .store
    .record_response(input)
    .await
    .map_err(Error::internal)?
  {
    RecordOutcome::Inserted(stored) => {
      tracing::info!(
        response_id = %stored.response_id,
        template_id = %stored.template_id,
        version = template.version,
        %hospital_id,
        completion_rate = stored.completion_rate,
        "response recorded"
      );
      ResponseReply {
        success: true,
        response_id: Some(stored.response_id),
        response_hash,
        completion_rate: stored.completion_rate,
        duplicate: false,
      }
    }
    RecordOutcome::Duplicate { completion_rate } => {
      tracing::info!(%response_hash, "duplicate response delivery ignored");
      ResponseReply {
        success: true,
        response_id: None,
        response_hash,
        completion_rate,
        duplicate: true,
      }
    }
  };

  Ok(reply)
}

/// The tenant a response is recorded against.
///
/// Tenant-scoped callers always record against their own hospital; a
/// conflicting `hospital_id` or `campaign_id` in the metadata is rejected.
/// Super-tenant callers name the hospital in the metadata, directly or via
/// the campaign.
async fn resolve_hospital<S>(
  state: &AppState<S>,
  caller: &Caller,
  metadata: &ResponseMetadata,
) -> Result<Uuid, Error>
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  let campaign_hospital = match metadata.campaign_id {
    Some(campaign_id) => state
      .store
      .campaign_hospital(campaign_id)
      .await
      .map_err(Error::internal)?,
    None => None,
  };

  match caller.scope {
    TenantScope::Hospital(own) => {
      for claimed in [metadata.hospital_id, campaign_hospital].into_iter().flatten() {
        if claimed != own {
          return Err(Error::TenantContext(format!(
            "payload names hospital {claimed}, credential is scoped to {own}"
          )));
        }
      }
      Ok(own)
    }
    TenantScope::Any => match (metadata.hospital_id, metadata.campaign_id) {
      (Some(claimed), _) => {
        if let Some(owner) = campaign_hospital
          && owner != claimed
        {
          return Err(Error::TenantContext(format!(
            "campaign belongs to hospital {owner}, payload names {claimed}"
          )));
        }
        Ok(claimed)
      }
      (None, Some(campaign_id)) => campaign_hospital
        .ok_or_else(|| Error::NotFound(format!("campaign {campaign_id}"))),
      (None, None) => Err(Error::TenantContext(
        "super-tenant response must name a hospital or campaign".to_owned(),
      )),
    },
  }
}
