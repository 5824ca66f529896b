//! Trace normalization driver
//!
//! Walks the raw trace once and produces the arena consumed by the decoder
//! engine. The walk uses an explicit work stack instead of native recursion,
//! so pathologically deep traces cannot exhaust the call stack.
//!
//! For every call node the pass:
//! 1. Resolves the interface descriptor, inheriting the parent's merged
//!    descriptor only when the parent invoked this node via delegate call
//! 2. Extracts the node's immediate logs (pass-scoped indices)
//! 3. Normalizes each call child, left to right
//! 4. Reconciles the interleaved child order over the two arrays

use std::{collections::HashSet, sync::Arc};

use alloy::primitives::{Address, B256};
use log::{debug, warn};

use super::{
    arena::NormalizedTrace,
    fields,
    logs::LogFlattener,
    order::ChildOrderReconciler,
};
use crate::{
    abi::{AbiResolver, DescriptorTable, InterfaceDescriptor},
    errors::NormalizeError,
    types::{NodeIndex, NormalizedNode, PathId, RawCallNode},
};

/// Pending unit of work on the explicit traversal stack
enum Frame<'r> {
    /// Normalize `raw` and attach it to `parent`
    Enter {
        raw: &'r RawCallNode,
        parent: Option<NodeIndex>,
        inherited: Option<Arc<InterfaceDescriptor>>,
        context: Address,
    },
    /// All children of `index` are normalized; reconcile its order
    Exit { raw: &'r RawCallNode, index: NodeIndex },
}

/// Converts raw traces into [`NormalizedTrace`] arenas
///
/// The normalizer itself holds no per-pass state: each call to
/// [`normalize`](Self::normalize) creates its own log indexer, so one
/// normalizer may serve any number of sequential or concurrent passes.
#[derive(Debug, Clone)]
pub struct TraceNormalizer<'a> {
    resolver: AbiResolver<'a>,
    transaction_hash: Option<B256>,
}

impl<'a> TraceNormalizer<'a> {
    pub fn new(descriptors: &'a DescriptorTable) -> Self {
        Self {
            resolver: AbiResolver::new(descriptors),
            transaction_hash: None,
        }
    }

    /// Stamps every produced log record with `hash`
    pub fn with_transaction_hash(mut self, hash: Option<B256>) -> Self {
        self.transaction_hash = hash;
        self
    }

    /// Normalizes a whole trace from its entrypoint
    pub fn normalize(&self, root: &RawCallNode) -> Result<NormalizedTrace, NormalizeError> {
        self.normalize_from(root, None)
    }

    /// Normalizes a (sub)trace whose root was reached via delegate call
    ///
    /// # Arguments
    /// * `root` - Node to start from
    /// * `parent_descriptor` - Merged descriptor of the delegating caller
    ///
    /// # Errors
    /// Any malformed field anywhere in the tree aborts the pass; no partial
    /// tree is returned.
    pub fn normalize_from(
        &self,
        root: &RawCallNode,
        parent_descriptor: Option<Arc<InterfaceDescriptor>>,
    ) -> Result<NormalizedTrace, NormalizeError> {
        debug!("Normalizing trace rooted at {}", root.path);

        let mut logs = LogFlattener::new(self.transaction_hash);
        let mut nodes: Vec<NormalizedNode> = Vec::new();
        let mut seen: HashSet<&PathId> = HashSet::new();

        let mut stack = vec![Frame::Enter {
            raw: root,
            parent: None,
            inherited: parent_descriptor,
            context: fields::address(&root.path, "to", &root.to)?,
        }];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter { raw, parent, inherited, context } => {
                    let paths = std::iter::once(&raw.path).chain(raw.logs().map(|log| &log.path));
                    for path in paths {
                        if !seen.insert(path) {
                            warn!("Duplicate PathId {path} in trace, order reconciliation uses the first match");
                        }
                    }

                    let node = self.remap(raw, inherited.as_ref(), context, &mut logs)?;
                    let index = nodes.len();
                    let abi = Arc::clone(&node.abi);
                    nodes.push(node);
                    if let Some(parent) = parent {
                        nodes[parent].children.push(index);
                    }

                    stack.push(Frame::Exit { raw, index });
                    let calls: Vec<&RawCallNode> = raw.calls().collect();
                    for child in calls.into_iter().rev() {
                        stack.push(Frame::Enter {
                            raw: child,
                            parent: Some(index),
                            inherited: child.variant.is_delegate().then(|| Arc::clone(&abi)),
                            context: fields::storage_context(context, child)?,
                        });
                    }
                }
                Frame::Exit { raw, index } => {
                    let child_order = {
                        let node = &nodes[index];
                        let children: Vec<&PathId> =
                            node.children.iter().map(|&child| &nodes[child].id).collect();
                        ChildOrderReconciler::reconcile(&raw.path, &raw.children, &node.logs, &children)?
                    };
                    nodes[index].child_order = child_order;
                }
            }
        }

        let index_to_path = logs.into_indexer().into_index_to_path();
        debug!(
            "Normalized {} call nodes with {} logs",
            nodes.len(),
            index_to_path.len()
        );
        Ok(NormalizedTrace::new(nodes, index_to_path))
    }

    /// Converts one raw node, leaving children and order to the driver
    fn remap(
        &self,
        raw: &RawCallNode,
        inherited: Option<&Arc<InterfaceDescriptor>>,
        context: Address,
        logs: &mut LogFlattener,
    ) -> Result<NormalizedNode, NormalizeError> {
        let path = &raw.path;
        let from = fields::address(path, "from", &raw.from)?;
        let to = fields::address(path, "to", &raw.to)?;
        let codehash = fields::codehash(path, &raw.codehash)?;
        let value = fields::value(path, &raw.value)?;
        let calldata = fields::bytes(path, "input", &raw.input)?;
        let returndata = fields::bytes(path, "output", &raw.output)?;

        Ok(NormalizedNode {
            id: path.clone(),
            variant: raw.variant,
            from,
            to,
            value,
            codehash,
            calldata,
            returndata,
            failed: raw.status != 1,
            gas_used: raw.gas_used,
            logs: logs.flatten(raw, context, false)?,
            children: Vec::new(),
            child_order: Vec::new(),
            abi: self.resolver.resolve(to, codehash, inherited),
        })
    }
}
