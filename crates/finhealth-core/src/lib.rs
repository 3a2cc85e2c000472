//! Core types and pipeline stages for the financial-health pipeline.
//!
//! Bronze rows are normalized into silver facts, facts into gold KPIs, and
//! KPIs into health scores. Everything here is pure and synchronous except the
//! [`store::LayerStore`] trait; this crate has no database or file I/O.

// We intentionally use native `async fn` in trait impls.
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod company;
pub mod config;
pub mod digest;
pub mod error;
pub mod fact;
pub mod kpi;
pub mod normalize;
pub mod notes;
pub mod pipeline;
pub mod report;
pub mod score;
pub mod statement;
pub mod store;
pub mod vocab;

pub use error::{Error, Result};
