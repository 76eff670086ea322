//! Contact search entry points.
//!
//! # Responsibility
//! - Evaluate the boolean search grammar over active-collection records.
//! - Apply tag filters and deterministic title ordering.

pub mod query;
