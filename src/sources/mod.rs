//! Producers of raw traces
//!
//! The pipeline consumes raw traces in the trace backend's interleaved shape.
//! These adapters produce that shape from other sources:
//!
//! - `geth`: geth `callTracer` frames fetched by the caller
//! - `recorder`: a REVM inspector recording local executions

pub mod geth;
pub mod recorder;

pub use geth::raw_trace_from_call_frame;
pub use recorder::TraceRecorder;
