//! Ledger types: the append-only transaction log behind each tenant's token
//! balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Why a transaction exists. `(reference_id, CallUsage)` is unique.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
  /// Debit for one billable call; `reference_id` is the call session id.
  CallUsage,
  /// Token recharge; `reference_id` is the purchase reference, if any.
  Recharge,
}

/// A single ledger entry. Never updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
  pub transaction_id:   Uuid,
  pub hospital_id:      Uuid,
  /// Signed; negative for debits.
  pub amount:           i64,
  pub transaction_type: TransactionType,
  pub reference_id:     Option<String>,
  pub created_at:       DateTime<Utc>,
}

/// Result of [`crate::store::BillingStore::debit`].
#[derive(Debug, Clone)]
pub struct DebitOutcome {
  /// The transaction for this session: new, or the one recorded earlier.
  pub transaction: Transaction,
  /// `true` when a prior delivery already recorded the debit and the balance
  /// was left untouched.
  pub replayed:    bool,
}
