//! # Trace Remap
//!
//! Prepares EVM execution traces for semantic decoding and reassembles the
//! decoder's output for display.
//!
//! ## Core Features
//!
//! - **Trace Normalization**
//!   - Canonical addresses and explicit empty payloads
//!   - Per-node log extraction with pass-scoped log indices
//!   - Explicit child order bridging separate log and call arrays
//!   - Arena layout with iterative traversal for deep traces
//!
//! - **Interface Resolution**
//!   - Descriptor lookup by `(address, codehash)`
//!   - Delegate-call inheritance of the caller's fragments
//!   - Graceful degradation for unknown contracts
//!
//! - **Decode Reassembly**
//!   - Pluggable decoder engine and chain access capabilities
//!   - Order-preserving flattening into display records
//!   - Explicit result duplication policy
//!   - Generation-tagged requests that never apply stale results
//!
//! ## Example Usage
//!
//! ```rust
//! use trace_remap::{
//!     abi::DescriptorTable,
//!     normalize::TraceNormalizer,
//!     types::{ChildOrder, TraceResponse},
//! };
//!
//! # fn example() -> anyhow::Result<()> {
//! let response: TraceResponse = serde_json::from_str(r#"{
//!     "chain": "ethereum",
//!     "txhash": "0x01",
//!     "entrypoint": {
//!         "path": "0", "variant": "call", "status": 1,
//!         "from": "0x1111111111111111111111111111111111111111",
//!         "to": "0x2222222222222222222222222222222222222222",
//!         "input": "0x", "output": "0x", "value": "0", "codehash": "0x",
//!         "children": [
//!             { "path": "0.0", "type": "log", "topics": [], "data": "0x" }
//!         ]
//!     }
//! }"#)?;
//!
//! let descriptors = DescriptorTable::from_address_infos(&response.addresses)?;
//! let trace = TraceNormalizer::new(&descriptors).normalize(&response.entrypoint)?;
//!
//! assert_eq!(trace.root().child_order, vec![ChildOrder::Log(0)]);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Module Structure
//!
//! - `types`: Raw, normalized, decoded and display data structures
//! - `abi`: Interface descriptors and their resolution
//! - `normalize`: Trace normalization
//! - `display`: Decoded tree flattening
//! - `session`: Generation-tagged decode sessions
//! - `sources`: Raw trace producers (geth frames, REVM recording)
//! - `chain`: Provider-backed chain access
//! - `traits`: Capability traits at the pipeline's seams
//! - `config`: Pipeline configuration
//! - `errors`: Error types and handling
//! - `utils`: Parsing helpers

pub mod abi;
pub mod chain;
pub mod config;
pub mod display;
pub mod errors;
pub mod normalize;
pub mod session;
pub mod sources;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export only the essential types and functions
pub use abi::{AbiResolver, DescriptorTable, InterfaceDescriptor};
pub use config::PipelineConfig;
pub use display::DecodedTreeFlattener;
pub use errors::PipelineError;
pub use normalize::{NormalizedTrace, TraceNormalizer};
pub use session::{DecodeRequest, DecodeSession, DecodeState, SessionOutcome};
pub use traits::{ActionFormatter, ChainAccess, DecoderEngine, MetadataSink};
