//! Core types for trace normalization and decode reassembly
//!
//! This module defines the data structures that flow through the pipeline:
//! - Raw trace entries as delivered by the trace backend (calls, logs, storage accesses)
//! - Normalized nodes consumed by the decoder engine
//! - Decoded action trees produced by the decoder engine
//! - Display records consumed by tree rendering

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    sync::Arc,
};
pub use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::abi::InterfaceDescriptor;

/// Index of a node inside a [`NormalizedTrace`](crate::normalize::NormalizedTrace) arena
pub type NodeIndex = usize;

/// Stable identifier of an entry within a single trace
///
/// Paths are dot-separated positions (`"0"`, `"0.2"`, `"0.2.1"`) and are unique
/// per trace. They correlate logs and calls across the raw and normalized
/// representations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(String);

impl PathId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Path of the entrypoint call
    pub fn root() -> Self {
        Self("0".to_string())
    }

    /// Path of the `position`-th child entry of this node
    pub fn child(&self, position: usize) -> Self {
        Self(format!("{}.{}", self.0, position))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PathId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for PathId {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// Kind of call frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallVariant {
    /// Regular message call
    #[default]
    Call,
    /// Legacy call executing callee code in the caller's storage
    CallCode,
    /// Call executing callee code in the caller's storage and calling context
    DelegateCall,
    /// Read-only call
    StaticCall,
    /// Contract creation
    Create,
    /// Contract creation with salt
    Create2,
    /// Self-destruct balance transfer
    SelfDestruct,
}

impl CallVariant {
    /// Parses the upper-case frame type used by geth-style tracers
    pub fn from_geth_type(typ: &str) -> Option<Self> {
        match typ.to_ascii_uppercase().as_str() {
            "CALL" => Some(Self::Call),
            "CALLCODE" => Some(Self::CallCode),
            "DELEGATECALL" => Some(Self::DelegateCall),
            "STATICCALL" => Some(Self::StaticCall),
            "CREATE" => Some(Self::Create),
            "CREATE2" => Some(Self::Create2),
            "SELFDESTRUCT" => Some(Self::SelfDestruct),
            _ => None,
        }
    }

    /// Whether this call inherits the caller's interface descriptor
    pub fn is_delegate(&self) -> bool {
        matches!(self, Self::DelegateCall)
    }

    /// Whether this call runs in the caller's storage context
    ///
    /// Logs emitted inside such a frame are attributed to the caller.
    pub fn executes_in_caller_context(&self) -> bool {
        matches!(self, Self::DelegateCall | Self::CallCode)
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }
}

/// A child entry of a raw call node
///
/// Tagged by the `type` field of the trace backend's JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TraceEntry {
    Call(RawCallNode),
    Log(RawLogNode),
    Sload(RawSloadNode),
    Sstore(RawSstoreNode),
}

impl TraceEntry {
    pub fn path(&self) -> &PathId {
        match self {
            TraceEntry::Call(call) => &call.path,
            TraceEntry::Log(log) => &log.path,
            TraceEntry::Sload(sload) => &sload.path,
            TraceEntry::Sstore(sstore) => &sstore.path,
        }
    }
}

/// Call frame as delivered by the trace backend
///
/// Every on-chain value is kept as text; validation and canonicalization happen
/// during normalization. Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCallNode {
    /// Position in the trace tree
    pub path: PathId,
    /// Call kind
    pub variant: CallVariant,
    /// Gas made available to the frame
    #[serde(default)]
    pub gas: u64,
    /// Whether the target is a precompile
    #[serde(default)]
    pub is_precompile: bool,
    /// Caller address
    pub from: String,
    /// Callee (code) address
    pub to: String,
    /// Calldata (or init code for creations)
    #[serde(default)]
    pub input: String,
    /// Returndata
    #[serde(default)]
    pub output: String,
    /// Gas consumed by the frame
    #[serde(default)]
    pub gas_used: u64,
    /// Native value, decimal or 0x-prefixed hex
    #[serde(default)]
    pub value: String,
    /// `1` on success, anything else on failure
    pub status: u64,
    /// Hash of the callee's code, `"0x"` when unknown
    #[serde(default)]
    pub codehash: String,
    /// Interleaved child entries in emission order
    #[serde(default)]
    pub children: Vec<TraceEntry>,
}

impl RawCallNode {
    /// Immediate call children, in order
    pub fn calls(&self) -> impl DoubleEndedIterator<Item = &RawCallNode> {
        self.children.iter().filter_map(|entry| match entry {
            TraceEntry::Call(call) => Some(call),
            _ => None,
        })
    }

    /// Immediate log children, in order
    pub fn logs(&self) -> impl DoubleEndedIterator<Item = &RawLogNode> {
        self.children.iter().filter_map(|entry| match entry {
            TraceEntry::Log(log) => Some(log),
            _ => None,
        })
    }
}

/// Log event as delivered by the trace backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogNode {
    /// Position in the trace tree
    pub path: PathId,
    /// Emitting address; derived from the enclosing call when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Event topics (bytes32 each)
    #[serde(default)]
    pub topics: Vec<String>,
    /// Unindexed event data
    #[serde(default)]
    pub data: String,
}

/// Storage read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSloadNode {
    pub path: PathId,
    pub slot: String,
    pub value: String,
}

/// Storage write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSstoreNode {
    pub path: PathId,
    pub slot: String,
    pub old_value: String,
    pub new_value: String,
}

/// Per-contract metadata attached to a trace response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Human readable label
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub functions: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub events: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub errors: BTreeMap<String, serde_json::Value>,
    /// JSON ABI items
    #[serde(default)]
    pub fragments: Vec<serde_json::Value>,
}

/// Complete trace backend response for one transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceResponse {
    pub chain: String,
    pub txhash: String,
    #[serde(default)]
    pub preimages: HashMap<String, String>,
    /// `addresses[address][codehash]`
    #[serde(default)]
    pub addresses: HashMap<String, HashMap<String, AddressInfo>>,
    pub entrypoint: RawCallNode,
}

/// Stack reserved for one response parse
///
/// The typed pass over internally tagged entries recurses a few frames per
/// call level; call trees nest up to the EVM depth limit of 1024.
const PARSE_STACK_SIZE: usize = 256 * 1024 * 1024;

impl TraceResponse {
    /// Parses a response of any nesting depth
    ///
    /// `serde_json::from_str` stops at 128 nested values, which a call tree
    /// passes after 64 calls. This lifts the limit and runs the parse on a
    /// dedicated stack that grows on demand.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        stacker::grow(PARSE_STACK_SIZE, || {
            let mut deserializer = serde_json::Deserializer::from_str(json);
            deserializer.disable_recursion_limit();
            let response = Self::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
            deserializer.end()?;
            Ok(response)
        })
    }
}

/// Normalized log event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Pass-wide log index, strictly increasing in traversal order
    pub index: u64,
    /// PathId of the raw log
    pub path: PathId,
    /// Emitting (storage context) address
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
}

/// Tagged reference from a node's original child order into its
/// materialized `logs` or `children` array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildOrder {
    /// Index into `logs`
    Log(usize),
    /// Index into `children`
    Call(usize),
}

/// Call node in the form consumed by the decoder engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedNode {
    pub id: PathId,
    #[serde(rename = "type")]
    pub variant: CallVariant,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub codehash: Option<B256>,
    pub calldata: Bytes,
    pub returndata: Bytes,
    pub failed: bool,
    pub gas_used: u64,
    /// Immediate logs, in emission order
    pub logs: Vec<LogRecord>,
    /// Arena indices of the normalized call children, in emission order
    pub children: Vec<NodeIndex>,
    /// Interleaving of `logs` and `children`
    pub child_order: Vec<ChildOrder>,
    /// Own fragments merged with any delegate-call inherited fragments
    pub abi: Arc<InterfaceDescriptor>,
}

/// Decoder engine output node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedActionNode<A> {
    /// Normalized node this output was decoded from
    pub source_node: PathId,
    pub results: Vec<A>,
    pub children: Vec<DecodedActionNode<A>>,
}

impl<A> DecodedActionNode<A> {
    pub fn new(source_node: impl Into<PathId>) -> Self {
        Self {
            source_node: source_node.into(),
            results: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_result(mut self, result: A) -> Self {
        self.results.push(result);
        self
    }

    pub fn with_child(mut self, child: DecodedActionNode<A>) -> Self {
        self.children.push(child);
        self
    }
}

/// Flattened record handed to tree rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRecord<C> {
    /// Stable render key
    pub id: String,
    pub content: C,
    pub children: Vec<DisplayRecord<C>>,
}

/// Metadata the decoder engine wants fetched for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRequest {
    pub tokens: BTreeSet<Address>,
}

impl MetadataRequest {
    /// Price lookup keys in `"{prefix}:{token}"` form
    pub fn price_keys(&self, prefix: &str) -> Vec<String> {
        self.tokens
            .iter()
            .map(|token| format!("{prefix}:{}", token.to_checksum(None)))
            .collect()
    }
}

/// Decoder engine result: decoded tree plus the metadata it needs
pub type DecoderOutput<A> = (DecodedActionNode<A>, MetadataRequest);
