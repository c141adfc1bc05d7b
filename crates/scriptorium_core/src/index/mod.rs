//! Link graph: extraction grammar and the derived backlink index.
//!
//! # Responsibility
//! - Turn document content into outgoing link targets.
//! - Maintain the inverted target -> source mapping used for backlinks.
//!
//! # Invariants
//! - The index is derived state; it can always be rebuilt from documents.

pub mod backlinks;
pub mod link_extractor;
