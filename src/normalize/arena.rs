//! Arena of normalized call nodes
//!
//! Nodes live in a flat vector in pre-order (entrypoint first) and refer to
//! their call children by index, so no traversal over the tree ever needs
//! native recursion.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    errors::NormalizeError,
    types::{ChildOrder, LogRecord, NodeIndex, NormalizedNode, PathId},
};

/// Index of the entrypoint in every [`NormalizedTrace`]
pub const ROOT: NodeIndex = 0;

/// A log or call child, in original emission order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderedMember<'a> {
    Log(&'a LogRecord),
    Call(&'a NormalizedNode),
}

/// Normalized trace handed to the decoder engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTrace {
    nodes: Vec<NormalizedNode>,
    log_paths: BTreeMap<u64, PathId>,
}

impl NormalizedTrace {
    pub(crate) fn new(nodes: Vec<NormalizedNode>, log_paths: BTreeMap<u64, PathId>) -> Self {
        debug_assert!(!nodes.is_empty());
        Self { nodes, log_paths }
    }

    /// The entrypoint call
    pub fn root(&self) -> &NormalizedNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, index: NodeIndex) -> Option<&NormalizedNode> {
        self.nodes.get(index)
    }

    /// All nodes in pre-order
    pub fn nodes(&self) -> &[NormalizedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Arena index of the node with the given PathId
    pub fn find(&self, path: &PathId) -> Option<NodeIndex> {
        self.nodes.iter().position(|node| &node.id == path)
    }

    /// Normalized call children of a node, in order
    pub fn children(&self, index: NodeIndex) -> impl Iterator<Item = &NormalizedNode> {
        self.nodes
            .get(index)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|&child| self.nodes.get(child))
    }

    /// PathId of the log that received a pass-wide index
    pub fn log_path(&self, index: u64) -> Option<&PathId> {
        self.log_paths.get(&index)
    }

    pub fn log_paths(&self) -> &BTreeMap<u64, PathId> {
        &self.log_paths
    }

    /// Total number of logs across the trace
    pub fn log_count(&self) -> usize {
        self.log_paths.len()
    }

    /// Reassembles a node's logs and calls in original emission order
    pub fn ordered_members(&self, index: NodeIndex) -> Vec<OrderedMember<'_>> {
        let Some(node) = self.nodes.get(index) else {
            return Vec::new();
        };
        node.child_order
            .iter()
            .filter_map(|order| match *order {
                ChildOrder::Log(i) => node.logs.get(i).map(OrderedMember::Log),
                ChildOrder::Call(i) => node
                    .children
                    .get(i)
                    .and_then(|&child| self.nodes.get(child))
                    .map(OrderedMember::Call),
            })
            .collect()
    }

    /// Logs of a node, optionally with those of all call descendants
    ///
    /// Recursive mode walks depth-first, immediate logs first, which is the
    /// view decoders use for on-chain lookups over a whole subtree.
    pub fn collect_logs(&self, index: NodeIndex, recursive: bool) -> Vec<&LogRecord> {
        let mut logs = Vec::new();
        let mut pending = vec![index];
        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            logs.extend(node.logs.iter());
            if !recursive {
                break;
            }
            pending.extend(node.children.iter().rev());
        }
        logs
    }

    /// Validates the structural invariants of the arena
    ///
    /// - `child_order` has exactly one entry per log and per call child
    /// - every order entry indexes into its target array
    /// - log indices strictly increase in traversal order
    pub fn check_invariants(&self) -> Result<(), NormalizeError> {
        let mut last_index: Option<u64> = None;

        for node in &self.nodes {
            let broken = |reason: String| NormalizeError::BrokenInvariant {
                path: node.id.to_string(),
                reason,
            };

            let expected = node.logs.len() + node.children.len();
            if node.child_order.len() != expected {
                return Err(broken(format!(
                    "child order has {} entries, expected {}",
                    node.child_order.len(),
                    expected
                )));
            }
            for order in &node.child_order {
                match *order {
                    ChildOrder::Log(i) if i >= node.logs.len() => {
                        return Err(broken(format!("log index {i} out of bounds")));
                    }
                    ChildOrder::Call(i) if i >= node.children.len() => {
                        return Err(broken(format!("call index {i} out of bounds")));
                    }
                    _ => {}
                }
            }
            if node.children.iter().any(|&child| child >= self.nodes.len()) {
                return Err(broken("child arena index out of bounds".to_string()));
            }
            for log in &node.logs {
                if last_index.is_some_and(|last| log.index <= last) {
                    return Err(broken(format!("log index {} does not increase", log.index)));
                }
                last_index = Some(log.index);
            }
        }

        Ok(())
    }
}
