//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate entity store calls into document and folder use cases.
//! - Keep the backlink index and the request layer decoupled from storage.
//!
//! # Invariants
//! - Not-found and validation outcomes are returned as typed `VaultError`s;
//!   store I/O failures pass through unchanged.

pub mod document_service;
pub mod error;
pub mod integrity;
pub mod tree_service;
