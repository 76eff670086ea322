//! Contact use-case services.
//!
//! # Responsibility
//! - Orchestrate store, audit log and tag registry calls into lifecycle
//!   operations.
//! - Classify every failure as user- or server-caused.

pub mod audit;
pub mod contact_service;
pub mod duplicates;
pub mod error;
