//! Identifier generation
//!
//! New persons, documents, sessions, conflicts and audit entries obtain their
//! ids from an injected [`IdGenerator`] rather than building them ad hoc.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Capability for minting new record identifiers
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

/// Random UUIDv4 identifiers (production default)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` identifiers for tests and fixtures
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}
