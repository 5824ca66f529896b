//! Child order reconciliation
//!
//! The decoder engine takes a node's logs and call children as two separate
//! arrays, while "what happened before what" lives only in the original
//! interleaved child sequence. The order list produced here is the lossless
//! bridge: one tagged index per original call or log child.

use std::collections::HashMap;

use crate::{
    errors::NormalizeError,
    types::{ChildOrder, LogRecord, PathId, TraceEntry},
};

/// Builds `child_order` lists
pub struct ChildOrderReconciler;

impl ChildOrderReconciler {
    /// Maps each original call/log child to its position in `logs` or `children`
    ///
    /// # Arguments
    /// * `parent` - PathId of the node being reconciled
    /// * `original` - The node's raw children in emission order
    /// * `logs` - Materialized log records of the node
    /// * `children` - PathIds of the materialized call children, in order
    ///
    /// # Returns
    /// `(Log, i)` / `(Call, i)` per original log/call child; storage entries
    /// are skipped. When a PathId appears more than once the first match wins.
    ///
    /// # Errors
    /// `UnmatchedChild` if an original child has no materialized counterpart.
    pub fn reconcile(
        parent: &PathId,
        original: &[TraceEntry],
        logs: &[LogRecord],
        children: &[&PathId],
    ) -> Result<Vec<ChildOrder>, NormalizeError> {
        let log_positions = first_positions(logs.iter().map(|log| &log.path));
        let call_positions = first_positions(children.iter().copied());

        original
            .iter()
            .filter_map(|entry| match entry {
                TraceEntry::Log(log) => Some(
                    log_positions
                        .get(&log.path)
                        .map(|&index| ChildOrder::Log(index))
                        .ok_or_else(|| unmatched(parent, &log.path, "logs")),
                ),
                TraceEntry::Call(call) => Some(
                    call_positions
                        .get(&call.path)
                        .map(|&index| ChildOrder::Call(index))
                        .ok_or_else(|| unmatched(parent, &call.path, "children")),
                ),
                TraceEntry::Sload(_) | TraceEntry::Sstore(_) => None,
            })
            .collect()
    }
}

fn first_positions<'a>(paths: impl Iterator<Item = &'a PathId>) -> HashMap<&'a PathId, usize> {
    let mut positions = HashMap::new();
    for (index, path) in paths.enumerate() {
        positions.entry(path).or_insert(index);
    }
    positions
}

fn unmatched(parent: &PathId, child: &PathId, kind: &'static str) -> NormalizeError {
    NormalizeError::UnmatchedChild {
        parent: parent.to_string(),
        child: child.to_string(),
        kind,
    }
}
