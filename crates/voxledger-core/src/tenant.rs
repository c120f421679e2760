//! Tenants (hospitals) and the campaigns that resolve to them.
//!
//! A hospital's `token_balance` is never written directly; it only moves
//! through the ledger operations on [`crate::store::BillingStore`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Commercial state of a hospital's contract.
///
/// Informational only; billing never blocks on it.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContractStatus {
  #[default]
  Active,
  Suspended,
  Expired,
}

/// A tenant of the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hospital {
  pub hospital_id:     Uuid,
  pub name:            String,
  /// May go negative: overdraft is a dunning signal, not an error.
  pub token_balance:   i64,
  pub contract_status: ContractStatus,
  pub created_at:      DateTime<Utc>,
}

/// An outbound calling campaign owned by exactly one hospital.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
  pub campaign_id: Uuid,
  pub hospital_id: Uuid,
  pub created_at:  DateTime<Utc>,
}
