//! Error types for trace normalization and decode reassembly
//!
//! This module defines the error taxonomy of the pipeline:
//! - Normalization errors (malformed trace structure, fatal to a pass)
//! - Descriptor table errors
//! - Decoder engine and chain access errors
//! - Display flattening errors
//!
//! A missing interface descriptor is not an error:
//! unknown contracts resolve to an empty fragment set instead of failing.

use thiserror::Error;

/// Top-level error type for the decode pipeline
///
/// Encompasses all possible errors that can occur while turning a raw trace
/// into display records, providing a unified error handling interface for users.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The raw trace could not be normalized
    #[error("Failed to normalize trace: {0}")]
    Normalize(#[from] NormalizeError),

    /// The descriptor table could not be built
    #[error("Invalid descriptor table: {0}")]
    Descriptor(#[from] DescriptorError),

    /// The decoder engine rejected the normalized trace
    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),

    /// The decoded tree could not be flattened for display
    #[error("Display flattening failed: {0}")]
    Flatten(#[from] FlattenError),
}

/// Normalization errors
///
/// Any of these aborts the entire normalization pass: a malformed node
/// invalidates the index correlations of its whole subtree, so no partial
/// tree is ever produced.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Address field could not be parsed or failed checksum validation
    ///
    /// # Fields
    /// * `path` - PathId of the offending trace node
    /// * `field` - Name of the field (`from`, `to`, `address`)
    /// * `value` - Raw text as found in the trace
    #[error("Invalid address in `{field}` of node {path}: {value:?}")]
    InvalidAddress {
        path: String,
        field: &'static str,
        value: String,
    },

    /// Hex payload (calldata, returndata, log data) could not be decoded
    #[error("Invalid hex bytes in `{field}` of node {path}: {value:?}")]
    InvalidBytes {
        path: String,
        field: &'static str,
        value: String,
    },

    /// 32-byte word (topic or codehash) could not be decoded
    #[error("Invalid 32-byte word in `{field}` of node {path}: {value:?}")]
    InvalidWord {
        path: String,
        field: &'static str,
        value: String,
    },

    /// Call value is neither decimal nor 0x-prefixed hex
    #[error("Invalid value in node {path}: {value:?}")]
    InvalidValue { path: String, value: String },

    /// A child listed in the original order has no counterpart in the
    /// materialized log or call arrays
    #[error("Child {child} of node {parent} not found among normalized {kind}")]
    UnmatchedChild {
        parent: String,
        child: String,
        kind: &'static str,
    },

    /// A normalized node violates the arena invariants
    #[error("Invariant violated at node {path}: {reason}")]
    BrokenInvariant { path: String, reason: String },

    /// The response's `txhash` is not a 32-byte hex word
    #[error("Invalid transaction hash: {0:?}")]
    InvalidTransactionHash(String),
}

/// Descriptor table errors
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Table key is not a valid address
    #[error("Invalid address key: {0:?}")]
    InvalidAddress(String),

    /// Table key is not a valid codehash
    #[error("Invalid codehash key {codehash:?} for {address}")]
    InvalidCodehash { address: String, codehash: String },

    /// Fragment list could not be parsed as an ABI
    #[error("Invalid fragments for {address}: {reason}")]
    InvalidFragments { address: String, reason: String },
}

/// Errors raised while awaiting the decoder engine
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The pluggable engine failed
    ///
    /// Chain access failures the engine propagates arrive here as well.
    #[error("Decoder engine error: {0}")]
    Engine(#[from] anyhow::Error),
}

/// Read-only chain access errors
#[derive(Debug, Error)]
pub enum ChainAccessError {
    /// Transport or RPC-level failure
    #[error("RPC request failed: {0}")]
    Rpc(String),
}

/// Errors raised while flattening decoded output into display records
#[derive(Debug, Error)]
pub enum FlattenError {
    /// The result formatter could not render a decoded action
    ///
    /// # Fields
    /// * `record` - Identifier of the record being rendered
    /// * `source` - Formatter error
    #[error("Failed to format result {record}: {source}")]
    Format {
        record: String,
        #[source]
        source: anyhow::Error,
    },
}
