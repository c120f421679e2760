//! Ingestion gateway for voxledger.
//!
//! Exposes an axum [`Router`] that receives the telephony provider's
//! call-status and response webhooks, authenticates them, and routes them to
//! the call-session state machine, the token ledger, and the template
//! validator, backed by any [`BillingStore`].

pub mod auth;
pub mod error;
pub mod event;
pub mod handlers;

pub use error::Error;

use std::{any::Any, path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  response::{IntoResponse, Response},
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use voxledger_core::store::BillingStore;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `VOXLEDGER_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  pub jwt_secret:      String,
  #[serde(default)]
  pub jwt_issuer:      Option<String>,
  /// Tokens debited per billable call.
  #[serde(default = "default_tokens_per_call")]
  pub tokens_per_call: i64,
  #[serde(default = "default_max_body_bytes")]
  pub max_body_bytes:  usize,
}

fn default_tokens_per_call() -> i64 { 1 }

fn default_max_body_bytes() -> usize { 1024 * 1024 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: BillingStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the gateway [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  let body_limit = state.config.max_body_bytes;

  Router::new()
    .route("/health",                       get(handlers::health::handler))
    .route("/webhooks/voice",               post(handlers::webhook::<S>))
    .route("/webhooks/call-status",         post(handlers::call_status::handler::<S>))
    .route("/webhooks/response",            post(handlers::response::handler::<S>))
    .route("/ledger/{hospital_id}",         get(handlers::ledger::show::<S>))
    .route("/ledger/{hospital_id}/credit",  post(handlers::ledger::credit::<S>))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(CatchPanicLayer::custom(handle_panic))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Turn a handler panic into a logged `InternalFault` response.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
  let detail = panic
    .downcast_ref::<String>()
    .map(String::as_str)
    .or_else(|| panic.downcast_ref::<&str>().copied())
    .unwrap_or("non-string panic payload");
  tracing::error!(detail, "handler panicked");
  Error::Internal(format!("handler panicked: {detail}").into()).into_response()
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::Utc;
  use jsonwebtoken::{Algorithm, EncodingKey, Header};
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;
  use voxledger_core::{
    ledger::TransactionType,
    template::Question,
    tenant::ContractStatus,
  };
  use voxledger_store_sqlite::SqliteStore;

  use crate::auth::{Claims, Role};

  const SECRET: &str = "gateway-test-secret";

  struct Fixture {
    state:       AppState<SqliteStore>,
    hospital_id: Uuid,
    campaign_id: Uuid,
    session_id:  Uuid,
    template_id: Uuid,
  }

  /// One hospital (balance 10), one campaign, one queued session, and a
  /// published template `q1,q2,q3`.
  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let hospital = store
      .add_hospital("Riverside".into(), 10, ContractStatus::Active)
      .await
      .unwrap();
    let campaign = store.add_campaign(hospital.hospital_id).await.unwrap();
    let session = store.create_call_session(campaign.campaign_id).await.unwrap();
    let template_id = Uuid::new_v4();
    store
      .publish_template_version(
        template_id,
        vec![
          Question { id: "q1".into(), order: 1 },
          Question { id: "q2".into(), order: 2 },
          Question { id: "q3".into(), order: 3 },
        ],
      )
      .await
      .unwrap();

    let state = AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig {
        host:            "127.0.0.1".to_string(),
        port:            8088,
        store_path:      PathBuf::from(":memory:"),
        jwt_secret:      SECRET.to_string(),
        jwt_issuer:      None,
        tokens_per_call: 1,
        max_body_bytes:  default_max_body_bytes(),
      }),
      auth:   Arc::new(AuthConfig {
        jwt_secret: SECRET.to_string(),
        jwt_issuer: None,
      }),
    };

    Fixture {
      state,
      hospital_id: hospital.hospital_id,
      campaign_id: campaign.campaign_id,
      session_id: session.call_session_id,
      template_id,
    }
  }

  fn token(role: Role, hospital_id: Option<Uuid>) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
      sub: Some("provider".into()),
      exp: now + 600,
      iat: Some(now),
      iss: None,
      hospital_id,
      role,
    };
    jsonwebtoken::encode(
      &Header::new(Algorithm::HS256),
      &claims,
      &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
  }

  fn tenant_token(hospital_id: Uuid) -> String { token(Role::Tenant, Some(hospital_id)) }

  fn super_token() -> String { token(Role::SuperTenant, None) }

  async fn send(
    state:  AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    bearer: Option<&str>,
    body:   Value,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = bearer {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
  }

  fn answers(orders: &[(&str, i64)]) -> Value {
    Value::Array(
      orders
        .iter()
        .map(|(id, order)| {
          json!({
            "question_id": id,
            "question_order": order,
            "response": format!("answer to {id}"),
            "confidence": 0.92,
          })
        })
        .collect(),
    )
  }

  fn response_body(f: &Fixture, answers: Value) -> Value {
    json!({
      "template_id": f.template_id,
      "question_count": 3,
      "answers": answers,
      "metadata": {
        "session_id": f.session_id,
        "hospital_id": f.hospital_id,
        "campaign_id": f.campaign_id,
        "call_duration_seconds": 40,
      },
    })
  }

  async fn balance(f: &Fixture) -> i64 {
    f.state
      .store
      .get_hospital(f.hospital_id)
      .await
      .unwrap()
      .unwrap()
      .token_balance
  }

  // ── Health ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_needs_no_credential() {
    let f = fixture().await;
    let (status, body) = send(f.state, "GET", "/health", None, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_credential_is_401() {
    let f = fixture().await;
    let (status, body) = send(
      f.state,
      "POST",
      "/webhooks/call-status",
      None,
      json!({ "call_session_id": f.session_id, "status": "completed", "duration": 40 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "AuthError");
  }

  #[tokio::test]
  async fn tenant_credential_without_scope_is_403() {
    let f = fixture().await;
    let (status, body) = send(
      f.state,
      "POST",
      "/webhooks/call-status",
      Some(&token(Role::Tenant, None)),
      json!({ "call_session_id": f.session_id, "status": "ringing" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "TenantContextError");
  }

  #[tokio::test]
  async fn other_tenants_session_is_403_and_not_billed() {
    let f = fixture().await;
    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&tenant_token(Uuid::new_v4())),
      json!({ "call_session_id": f.session_id, "status": "completed", "duration": 40 }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "TenantContextError");
    assert_eq!(balance(&f).await, 10);
  }

  // ── Call status ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn repeated_completed_event_bills_once() {
    let f = fixture().await;
    let auth = super_token();
    let event = json!({ "call_session_id": f.session_id, "status": "completed", "duration": 40 });

    let mut transaction_ids = Vec::new();
    for attempt in 0..5 {
      let (status, body) = send(
        f.state.clone(),
        "POST",
        "/webhooks/call-status",
        Some(&auth),
        event.clone(),
      )
      .await;
      assert_eq!(status, StatusCode::OK, "{body}");
      assert_eq!(body["success"], true);
      assert_eq!(body["billable"], true);
      assert_eq!(body["replayed"], attempt > 0);
      transaction_ids.push(body["transaction_id"].clone());
    }

    assert!(transaction_ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(balance(&f).await, 9);
    let log = f.state.store.list_transactions(f.hospital_id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].amount, -1);
    assert_eq!(log[0].transaction_type, TransactionType::CallUsage);
  }

  #[tokio::test]
  async fn concurrent_duplicate_deliveries_bill_once() {
    let f = fixture().await;
    let auth = super_token();
    let event = json!({ "call_session_id": f.session_id, "status": "completed", "duration": 40 });

    let handles: Vec<_> = (0..10)
      .map(|_| {
        let state = f.state.clone();
        let auth = auth.clone();
        let event = event.clone();
        tokio::spawn(async move {
          send(state, "POST", "/webhooks/call-status", Some(&auth), event).await
        })
      })
      .collect();

    for h in handles {
      let (status, _) = h.await.unwrap();
      assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(balance(&f).await, 9);
    assert_eq!(
      f.state.store.list_transactions(f.hospital_id).await.unwrap().len(),
      1
    );
  }

  #[tokio::test]
  async fn answered_with_zero_duration_is_not_billed() {
    let f = fixture().await;
    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&tenant_token(f.hospital_id)),
      json!({ "call_session_id": f.session_id, "status": "answered", "duration": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "answered");
    assert_eq!(body["billable"], false);
    assert_eq!(body["transaction_id"], Value::Null);
    assert_eq!(balance(&f).await, 10);
  }

  #[tokio::test]
  async fn answered_with_duration_is_billed_and_completion_does_not_rebill() {
    let f = fixture().await;
    let auth = tenant_token(f.hospital_id);

    let (_, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&auth),
      json!({ "call_session_id": f.session_id, "status": "answered", "duration": 45 }),
    )
    .await;
    assert_eq!(body["billable"], true);
    assert_eq!(body["replayed"], false);

    let (_, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&auth),
      json!({ "call_session_id": f.session_id, "status": "completed", "duration": 60 }),
    )
    .await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["replayed"], true);
    assert_eq!(balance(&f).await, 9);
  }

  #[tokio::test]
  async fn non_billable_progression_leaves_ledger_alone() {
    let f = fixture().await;
    let auth = super_token();
    for status in ["queued", "ringing", "failed"] {
      let (code, body) = send(
        f.state.clone(),
        "POST",
        "/webhooks/call-status",
        Some(&auth),
        json!({ "call_session_id": f.session_id, "status": status }),
      )
      .await;
      assert_eq!(code, StatusCode::OK);
      assert_eq!(body["billable"], false);
    }
    let session = f.state.store.get_call_session(f.session_id).await.unwrap().unwrap();
    assert_eq!(session.status.to_string(), "failed");
    assert_eq!(balance(&f).await, 10);
  }

  #[tokio::test]
  async fn late_answered_after_completed_does_not_regress() {
    let f = fixture().await;
    let auth = super_token();
    send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&auth),
      json!({ "call_session_id": f.session_id, "status": "completed", "duration": 40 }),
    )
    .await;
    let (_, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&auth),
      json!({ "call_session_id": f.session_id, "status": "answered", "duration": 30 }),
    )
    .await;
    assert_eq!(body["applied"], false);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["replayed"], true);
    assert_eq!(balance(&f).await, 9);
  }

  #[tokio::test]
  async fn late_completed_after_failed_is_billed_without_regressing() {
    let f = fixture().await;
    let auth = super_token();
    send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&auth),
      json!({ "call_session_id": f.session_id, "status": "failed" }),
    )
    .await;
    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&auth),
      json!({ "call_session_id": f.session_id, "status": "completed", "duration": 40 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], false);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["billable"], true);
    assert_eq!(body["replayed"], false);
    assert_eq!(balance(&f).await, 9);

    let session = f.state.store.get_call_session(f.session_id).await.unwrap().unwrap();
    assert!(session.billed);
    assert_eq!(session.status.to_string(), "failed");
  }

  #[tokio::test]
  async fn unknown_or_malformed_session_is_404() {
    let f = fixture().await;
    let auth = super_token();
    for id in [Uuid::new_v4().to_string(), "not-a-session".to_string()] {
      let (status, body) = send(
        f.state.clone(),
        "POST",
        "/webhooks/call-status",
        Some(&auth),
        json!({ "call_session_id": id, "status": "completed", "duration": 10 }),
      )
      .await;
      assert_eq!(status, StatusCode::NOT_FOUND);
      assert_eq!(body["error"]["kind"], "NotFoundError");
    }
  }

  #[tokio::test]
  async fn malformed_call_status_is_400() {
    let f = fixture().await;
    let auth = super_token();
    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&auth),
      json!({ "call_session_id": f.session_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "MalformedPayloadError");

    let (status, body) = send(
      f.state,
      "POST",
      "/webhooks/call-status",
      Some(&auth),
      json!({ "call_session_id": f.session_id, "status": "answered", "duration": -5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "MalformedPayloadError");
  }

  // ── Responses ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn end_to_end_response_then_billing() {
    let f = fixture().await;
    let auth = tenant_token(f.hospital_id);
    let body = response_body(&f, answers(&[("q1", 1), ("q2", 2), ("q3", 3)]));

    let (status, first) = send(
      f.state.clone(),
      "POST",
      "/webhooks/response",
      Some(&auth),
      body.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["success"], true);
    assert_eq!(first["duplicate"], false);
    assert_eq!(first["completion_rate"], 1.0);
    assert!(first["response_id"].is_string());

    let (status, second) =
      send(f.state.clone(), "POST", "/webhooks/response", Some(&auth), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["response_id"], Value::Null);
    assert_eq!(second["response_hash"], first["response_hash"]);
    assert_eq!(second["completion_rate"], first["completion_rate"]);
    assert_eq!(
      f.state.store.list_responses(f.template_id).await.unwrap().len(),
      1
    );

    let event = json!({ "call_session_id": f.session_id, "status": "completed", "duration": 40 });
    for _ in 0..2 {
      let (status, _) = send(
        f.state.clone(),
        "POST",
        "/webhooks/call-status",
        Some(&auth),
        event.clone(),
      )
      .await;
      assert_eq!(status, StatusCode::OK);
    }
    let log = f.state.store.list_transactions(f.hospital_id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].amount, -1);
    assert_eq!(balance(&f).await, 9);
  }

  #[tokio::test]
  async fn partial_submission_reports_partial_completion() {
    let f = fixture().await;
    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/response",
      Some(&tenant_token(f.hospital_id)),
      response_body(&f, answers(&[("q1", 1), ("q3", 3)])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rate = body["completion_rate"].as_f64().unwrap();
    assert!((rate - 2.0 / 3.0).abs() < 1e-9, "{rate}");
  }

  #[tokio::test]
  async fn unordered_answers_are_rejected_and_not_stored() {
    let f = fixture().await;
    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/response",
      Some(&tenant_token(f.hospital_id)),
      response_body(&f, answers(&[("q2", 2), ("q1", 1), ("q3", 3)])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "UnorderedAnswersError");
    assert!(f.state.store.list_responses(f.template_id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn unknown_question_is_named_and_not_stored() {
    let f = fixture().await;
    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/response",
      Some(&tenant_token(f.hospital_id)),
      response_body(&f, answers(&[("q1", 1), ("q7", 2), ("q3", 3)])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "UnknownQuestionError");
    assert!(body["error"]["message"].as_str().unwrap().contains("q7"));
    assert!(f.state.store.list_responses(f.template_id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn question_count_mismatch_is_400() {
    let f = fixture().await;
    let mut body = response_body(&f, answers(&[("q1", 1)]));
    body["question_count"] = json!(5);
    let (status, reply) = send(
      f.state,
      "POST",
      "/webhooks/response",
      Some(&tenant_token(f.hospital_id)),
      body,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"]["kind"], "QuestionCountMismatchError");
    let msg = reply["error"]["message"].as_str().unwrap();
    assert!(msg.contains('5') && msg.contains('3'), "{msg}");
  }

  #[tokio::test]
  async fn malformed_answer_is_400() {
    let f = fixture().await;
    let bad = json!([{ "question_id": "q1", "question_order": 1, "response": "" , "confidence": 0.5 }]);
    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/response",
      Some(&tenant_token(f.hospital_id)),
      response_body(&f, bad),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "MalformedAnswerError");
  }

  #[tokio::test]
  async fn unpublished_template_is_404() {
    let f = fixture().await;
    let mut body = response_body(&f, answers(&[("q1", 1)]));
    body["template_id"] = json!(Uuid::new_v4());
    let (status, reply) = send(
      f.state,
      "POST",
      "/webhooks/response",
      Some(&tenant_token(f.hospital_id)),
      body,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply["error"]["kind"], "TemplateNotFoundError");
  }

  #[tokio::test]
  async fn payload_claiming_another_tenant_is_403() {
    let f = fixture().await;
    let mut body = response_body(&f, answers(&[("q1", 1)]));
    body["metadata"]["hospital_id"] = json!(Uuid::new_v4());
    let (status, reply) = send(
      f.state,
      "POST",
      "/webhooks/response",
      Some(&tenant_token(f.hospital_id)),
      body,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(reply["error"]["kind"], "TenantContextError");
  }

  #[tokio::test]
  async fn super_tenant_response_resolves_hospital_via_campaign() {
    let f = fixture().await;
    let mut body = response_body(&f, answers(&[("q1", 1), ("q2", 2), ("q3", 3)]));
    body["metadata"]["hospital_id"] = Value::Null;
    let (status, reply) = send(
      f.state.clone(),
      "POST",
      "/webhooks/response",
      Some(&super_token()),
      body,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    let stored = f.state.store.list_responses(f.template_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].hospital_id, f.hospital_id);
  }

  #[tokio::test]
  async fn super_tenant_response_without_tenant_hint_is_403() {
    let f = fixture().await;
    let body = json!({
      "template_id": f.template_id,
      "question_count": 3,
      "answers": answers(&[("q1", 1)]),
    });
    let (status, reply) =
      send(f.state, "POST", "/webhooks/response", Some(&super_token()), body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(reply["error"]["kind"], "TenantContextError");
  }

  // ── Envelope ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn envelope_routes_both_event_kinds() {
    let f = fixture().await;
    let auth = tenant_token(f.hospital_id);

    let mut response = response_body(&f, answers(&[("q1", 1), ("q2", 2), ("q3", 3)]));
    response["event"] = json!("response");
    let (status, body) =
      send(f.state.clone(), "POST", "/webhooks/voice", Some(&auth), response).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["duplicate"], false);

    let (status, body) = send(
      f.state.clone(),
      "POST",
      "/webhooks/voice",
      Some(&auth),
      json!({
        "event": "call_status",
        "call_session_id": f.session_id,
        "status": "completed",
        "duration": 40,
      }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["billable"], true);

    let (status, body) = send(
      f.state,
      "POST",
      "/webhooks/voice",
      Some(&auth),
      json!({ "event": "hangup" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "MalformedPayloadError");
  }

  // ── Ledger ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn recharge_requires_super_tenant() {
    let f = fixture().await;
    let uri = format!("/ledger/{}/credit", f.hospital_id);

    let (status, body) = send(
      f.state.clone(),
      "POST",
      &uri,
      Some(&tenant_token(f.hospital_id)),
      json!({ "amount": 50 }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "TenantContextError");

    let (status, body) = send(
      f.state.clone(),
      "POST",
      &uri,
      Some(&super_token()),
      json!({ "amount": 50, "reference": "INV-7" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_balance"], 60);
    assert_eq!(body["transaction"]["transaction_type"], "recharge");

    let (status, body) = send(
      f.state,
      "POST",
      &uri,
      Some(&super_token()),
      json!({ "amount": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "MalformedPayloadError");
  }

  #[tokio::test]
  async fn ledger_view_is_tenant_scoped() {
    let f = fixture().await;
    send(
      f.state.clone(),
      "POST",
      "/webhooks/call-status",
      Some(&super_token()),
      json!({ "call_session_id": f.session_id, "status": "completed", "duration": 40 }),
    )
    .await;

    let uri = format!("/ledger/{}", f.hospital_id);
    let (status, body) = send(
      f.state.clone(),
      "GET",
      &uri,
      Some(&tenant_token(f.hospital_id)),
      Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_balance"], 9);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["transactions"][0]["transaction_type"], "call_usage");

    let (status, _) = send(
      f.state,
      "GET",
      &uri,
      Some(&tenant_token(Uuid::new_v4())),
      Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  // ── Panics ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn panic_becomes_internal_fault() {
    let resp = handle_panic(Box::new("boom"));
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["kind"], "InternalFault");
    assert_eq!(body["error"]["message"], "internal fault");
  }
}
