//! Raw trace normalization
//!
//! Turns the backend's nested call tree (calls and logs interleaved) into the
//! shape the decoder engine consumes: per-node log and call arrays plus an
//! explicit order list bridging the two.
//!
//! - `logs`: log extraction and pass-scoped log indexing
//! - `order`: child order reconciliation
//! - `normalizer`: the traversal driver
//! - `arena`: the resulting node arena and its query helpers

mod fields;

pub mod arena;
pub mod logs;
pub mod normalizer;
pub mod order;

pub use arena::{NormalizedTrace, OrderedMember, ROOT};
pub use logs::{LogFlattener, LogIndexer};
pub use normalizer::TraceNormalizer;
pub use order::ChildOrderReconciler;
