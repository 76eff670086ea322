//! Domain model for tenant contact records and their audit trail.
//!
//! # Responsibility
//! - Define the canonical contact record and the normalized import shape.
//! - Define audit event states and the tagged change payload.
//!
//! # Invariants
//! - A contact id is assigned once and never regenerated.
//! - `Contact::attributes` is derived; only `refresh_attributes` writes it.

pub mod contact;
pub mod event;
