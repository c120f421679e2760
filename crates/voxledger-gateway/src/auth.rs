//! Bearer-credential verification and the [`Caller`] extractor.
//!
//! Credentials are HS256 JWTs minted by the external credential issuer. The
//! gateway only verifies them. Tenant context always comes from the verified
//! claims; anything a request body says about its tenant is advisory.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use voxledger_core::store::BillingStore;

use crate::{AppState, error::Error};

/// Verification settings for inbound credentials.
#[derive(Clone)]
pub struct AuthConfig {
  /// Shared HS256 secret of the credential issuer.
  pub jwt_secret: String,
  /// When set, the `iss` claim must match.
  pub jwt_issuer: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AuthConfig")
      .field("jwt_secret", &"[redacted]")
      .field("jwt_issuer", &self.jwt_issuer)
      .finish()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  /// Scoped to a single hospital. The voice service mints its per-hospital
  /// credentials with role `voice_service`.
  #[default]
  #[serde(alias = "voice_service")]
  Tenant,
  /// Platform credential (e.g. the telephony provider's) acting for any
  /// hospital.
  SuperTenant,
}

/// Claims carried by a credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sub:         Option<String>,
  pub exp:         i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub iat:         Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub iss:         Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hospital_id: Option<Uuid>,
  #[serde(default)]
  pub role:        Role,
}

/// Which tenants a verified caller may act for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
  Hospital(Uuid),
  Any,
}

/// A verified caller. Present in a handler means the credential checked out
/// and carries a usable tenant scope.
#[derive(Debug, Clone)]
pub struct Caller {
  pub subject: Option<String>,
  pub scope:   TenantScope,
}

impl Caller {
  /// Reject unless the caller may act for `hospital_id`.
  pub fn authorize(&self, hospital_id: Uuid) -> Result<(), Error> {
    match self.scope {
      TenantScope::Any => Ok(()),
      TenantScope::Hospital(own) if own == hospital_id => Ok(()),
      TenantScope::Hospital(_) => Err(Error::TenantContext(format!(
        "credential is not scoped to hospital {hospital_id}"
      ))),
    }
  }

  pub fn require_super_tenant(&self) -> Result<(), Error> {
    match self.scope {
      TenantScope::Any => Ok(()),
      TenantScope::Hospital(_) => Err(Error::TenantContext(
        "operation requires a super-tenant credential".to_owned(),
      )),
    }
  }
}

/// Verify the bearer credential in `headers` and derive the caller.
pub fn verify_bearer(headers: &HeaderMap, config: &AuthConfig) -> Result<Caller, Error> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .ok_or_else(|| Error::Auth("missing Authorization header".to_owned()))?
    .to_str()
    .map_err(|_| Error::Auth("Authorization header is not ASCII".to_owned()))?;

  let token = header_val
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| Error::Auth("expected a Bearer credential".to_owned()))?;

  let claims = decode_claims(token, config)?;

  let scope = match (claims.role, claims.hospital_id) {
    (Role::SuperTenant, _) => TenantScope::Any,
    (Role::Tenant, Some(id)) => TenantScope::Hospital(id),
    (Role::Tenant, None) => {
      return Err(Error::TenantContext(
        "credential carries no hospital scope".to_owned(),
      ));
    }
  };

  Ok(Caller { subject: claims.sub, scope })
}

fn decode_claims(token: &str, config: &AuthConfig) -> Result<Claims, Error> {
  let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

  let mut validation = Validation::new(Algorithm::HS256);
  validation.set_required_spec_claims(&["exp"]);
  if let Some(issuer) = &config.jwt_issuer {
    validation.set_issuer(&[issuer]);
  }

  jsonwebtoken::decode::<Claims>(token, &key, &validation)
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
      ErrorKind::ExpiredSignature => Error::Auth("credential expired".to_owned()),
      _ => Error::Auth(format!("invalid credential: {e}")),
    })
}

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: BillingStore + Clone + Send + Sync + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let caller = verify_bearer(&parts.headers, &state.auth)?;
    tracing::debug!(subject = ?caller.subject, scope = ?caller.scope, "caller verified");
    Ok(caller)
  }
}
