//! Reconciliation services
//!
//! Each service owns a pool handle and, where it writes, an injected
//! [`IdGenerator`](blb_common::IdGenerator). Mutations run inside one
//! monitored transaction and append an audit entry before commit.

pub mod bulk_documents;
pub mod conflict_reconciler;
pub mod duplicate_detector;
pub mod entity_matcher;
pub mod merge_engine;
pub mod post_parser;
pub mod session_attendance;
pub mod session_review;

pub use bulk_documents::BulkDocumentIngester;
pub use conflict_reconciler::ConflictReconciler;
pub use duplicate_detector::DuplicateDetector;
pub use entity_matcher::EntityMatcher;
pub use merge_engine::MergeEngine;
pub use session_attendance::SessionRecorder;
pub use session_review::SessionReviewer;
