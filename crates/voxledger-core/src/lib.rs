//! Core types and trait definitions for the voxledger billing and response
//! ingestion core.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! pure decision logic (call-status transitions, the billability classifier,
//! template validation, response fingerprinting) lives here so that every
//! backend and every transport applies the same rules.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod call;
pub mod error;
pub mod ledger;
pub mod response;
pub mod store;
pub mod template;
pub mod tenant;

pub use error::{Error, Result};
