//! Repository layer: record persistence behind the `EntityStore` contract.
//!
//! # Responsibility
//! - Define record-level persistence used by every service.
//! - Keep on-disk layout and write atomicity inside the repository boundary.
//!
//! # Invariants
//! - Store writes validate records before touching disk.
//! - Store APIs return semantic results (`None`, `false`) for absent records
//!   and reserve errors for validation and I/O failures.

pub mod entity_store;
pub mod fs_store;
