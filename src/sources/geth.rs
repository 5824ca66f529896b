//! Conversion from geth `callTracer` frames
//!
//! A `callTracer` frame (with `withLog: true`) keeps logs and sub-calls in two
//! separate arrays and records, per log, how many sub-calls preceded it
//! (`position`). Conversion rebuilds the interleaved child sequence and
//! assigns PathIds in combined child order: `"0"`, `"0.0"`, `"0.1"`, ...
//!
//! Recursion depth here is bounded by the EVM call depth limit (1024).

use std::collections::HashMap;

use alloy::{
    primitives::{hex, Address},
    rpc::types::trace::geth::{CallFrame, CallLogFrame},
};
use log::warn;

use crate::types::{AddressInfo, CallVariant, PathId, RawCallNode, RawLogNode, TraceEntry, TraceResponse};

/// Converts a geth call frame into a raw trace rooted at path `"0"`
pub fn raw_trace_from_call_frame(frame: &CallFrame) -> RawCallNode {
    convert_frame(frame, PathId::root())
}

impl TraceResponse {
    /// Builds a full trace response from a geth call frame
    ///
    /// Every address seen in the trace is registered under the unknown
    /// codehash with an empty fragment list, so descriptor lookups have an
    /// address-wide slot to fill.
    pub fn from_call_frame(chain: impl Into<String>, txhash: impl Into<String>, frame: &CallFrame) -> Self {
        let entrypoint = raw_trace_from_call_frame(frame);

        let mut addresses: HashMap<String, HashMap<String, AddressInfo>> = HashMap::new();
        let mut pending = vec![&entrypoint];
        while let Some(node) = pending.pop() {
            for address in [&node.from, &node.to] {
                addresses.entry(address.clone()).or_insert_with(|| {
                    HashMap::from([(
                        "0x".to_string(),
                        AddressInfo {
                            label: "Contract".to_string(),
                            ..Default::default()
                        },
                    )])
                });
            }
            pending.extend(node.calls());
        }

        Self {
            chain: chain.into(),
            txhash: txhash.into(),
            preimages: HashMap::new(),
            addresses,
            entrypoint,
        }
    }
}

fn convert_frame(frame: &CallFrame, path: PathId) -> RawCallNode {
    let variant = CallVariant::from_geth_type(&frame.typ).unwrap_or_else(|| {
        warn!("Unknown call frame type {:?} at {path}, treating as CALL", frame.typ);
        CallVariant::Call
    });

    // Logs without a position were emitted after the last sub-call.
    let mut logs: Vec<&CallLogFrame> = frame.logs.iter().collect();
    logs.sort_by_key(|log| log.position.unwrap_or(u64::MAX));
    let mut logs = logs.into_iter().peekable();

    let mut children = Vec::with_capacity(frame.calls.len() + frame.logs.len());
    for (call_index, call) in frame.calls.iter().enumerate() {
        while let Some(log) = logs.next_if(|log| log.position.unwrap_or(u64::MAX) <= call_index as u64) {
            children.push(TraceEntry::Log(convert_log(log, path.child(children.len()))));
        }
        let child_path = path.child(children.len());
        children.push(TraceEntry::Call(convert_frame(call, child_path)));
    }
    for log in logs {
        children.push(TraceEntry::Log(convert_log(log, path.child(children.len()))));
    }

    RawCallNode {
        path,
        variant,
        gas: frame.gas.saturating_to(),
        is_precompile: false,
        from: frame.from.to_checksum(None),
        // A failed creation has no target.
        to: frame.to.unwrap_or(Address::ZERO).to_checksum(None),
        input: hex::encode_prefixed(&frame.input),
        output: frame
            .output
            .as_ref()
            .map(hex::encode_prefixed)
            .unwrap_or_default(),
        gas_used: frame.gas_used.saturating_to(),
        value: frame.value.unwrap_or_default().to_string(),
        status: u64::from(frame.error.is_none()),
        codehash: "0x".to_string(),
        children,
    }
}

fn convert_log(log: &CallLogFrame, path: PathId) -> RawLogNode {
    RawLogNode {
        path,
        address: log.address.map(|address| address.to_checksum(None)),
        topics: log
            .topics
            .iter()
            .flatten()
            .map(hex::encode_prefixed)
            .collect(),
        data: log
            .data
            .as_ref()
            .map(hex::encode_prefixed)
            .unwrap_or_else(|| "0x".to_string()),
    }
}
