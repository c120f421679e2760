//! Versioned survey templates and the validator that checks a provider's
//! answer submission against the published version.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Template ────────────────────────────────────────────────────────────────

/// One question definition inside a template version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub id:    String,
  pub order: i64,
}

/// An immutable snapshot of a template's question set. At most one version
/// per template is published at a time, and only that one is validated
/// against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVersion {
  pub template_version_id: Uuid,
  pub template_id:         Uuid,
  /// Monotonic per template, starting at 1.
  pub version:             i64,
  pub questions:           Vec<Question>,
  pub is_published:        bool,
  pub created_at:          DateTime<Utc>,
}

// ─── Answers ─────────────────────────────────────────────────────────────────

/// A structurally valid answer, in the shape stored in `answers_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
  pub question_id: String,
  pub order:       i64,
  pub response:    String,
  pub confidence:  f64,
}

impl TemplateVersion {
  pub fn question_count(&self) -> usize { self.questions.len() }

  /// Validate a submission against this (published) version.
  ///
  /// Checks run in a fixed order and the first failure rejects the whole
  /// submission: declared question count, answer structure, answer ordering,
  /// question membership. Answers are never reordered; on success they come
  /// back in submission order.
  pub fn validate(
    &self,
    question_count: usize,
    raw_answers: &[Value],
  ) -> Result<Vec<Answer>> {
    if question_count != self.question_count() {
      return Err(Error::QuestionCountMismatch {
        submitted: question_count,
        expected:  self.question_count(),
      });
    }

    let answers = raw_answers
      .iter()
      .enumerate()
      .map(|(index, raw)| parse_answer(index, raw))
      .collect::<Result<Vec<_>>>()?;

    for (index, pair) in answers.windows(2).enumerate() {
      if pair[1].order < pair[0].order {
        return Err(Error::UnorderedAnswers {
          index:    index + 1,
          previous: pair[0].order,
          found:    pair[1].order,
        });
      }
    }

    let known: HashSet<&str> =
      self.questions.iter().map(|q| q.id.as_str()).collect();
    if let Some(unknown) =
      answers.iter().find(|a| !known.contains(a.question_id.as_str()))
    {
      return Err(Error::UnknownQuestion(unknown.question_id.clone()));
    }

    Ok(answers)
  }
}

/// Structural check of one wire answer.
fn parse_answer(index: usize, raw: &Value) -> Result<Answer> {
  let malformed = |reason: &str| Error::MalformedAnswer {
    index,
    reason: reason.to_owned(),
  };

  let obj = raw.as_object().ok_or_else(|| malformed("not an object"))?;

  let question_id = obj
    .get("question_id")
    .and_then(Value::as_str)
    .filter(|s| !s.trim().is_empty())
    .ok_or_else(|| malformed("question_id must be a non-empty string"))?;

  let order = obj
    .get("question_order")
    .and_then(integral)
    .ok_or_else(|| malformed("question_order must be an integer"))?;

  let response = obj
    .get("response")
    .and_then(Value::as_str)
    .filter(|s| !s.trim().is_empty())
    .ok_or_else(|| malformed("response must be a non-empty string"))?;

  let confidence = obj
    .get("confidence")
    .and_then(Value::as_f64)
    .filter(|c| c.is_finite())
    .ok_or_else(|| malformed("confidence must be a number"))?;

  Ok(Answer {
    question_id: question_id.to_owned(),
    order,
    response: response.to_owned(),
    confidence,
  })
}

/// Accept `3` and `3.0`, reject `2.5`.
fn integral(v: &Value) -> Option<i64> {
  v.as_i64().or_else(|| {
    v.as_f64()
      .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
      .map(|f| f as i64)
  })
}
