//! Core policy shared across the valix workspace.
//!
//! Holds the backoff computation used by both the job queue and the webhook
//! delivery engine.

pub mod backoff;

pub use backoff::backoff_delay;
