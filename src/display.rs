//! Decoded tree flattening
//!
//! The decoder engine returns a tree mirroring the call structure, where each
//! node carries zero or more decoded results. Display wants a tree of records
//! containing only nodes that produced something:
//!
//! - A node without results contributes no record; its descendants' records
//!   pass through in its place.
//! - A node with results contributes one record per result, each holding the
//!   node's descendant records as children.
//!
//! With several results on one node, the duplication policy decides whether
//! every result record receives the full descendant list or only the first.

use log::debug;

use crate::{
    config::PipelineConfig,
    errors::FlattenError,
    traits::ActionFormatter,
    types::{DecodedActionNode, DisplayRecord, PathId},
};

/// Stable render key of the `position`-th result of a decoded node
pub fn record_id(source: &PathId, position: usize) -> String {
    format!("{source}.result_{position}")
}

/// Walk state of one decoded node
struct Frame<'n, A, C> {
    node: &'n DecodedActionNode<A>,
    next_child: usize,
    descendants: Vec<DisplayRecord<C>>,
}

impl<'n, A, C> Frame<'n, A, C> {
    fn new(node: &'n DecodedActionNode<A>) -> Self {
        Self {
            node,
            next_child: 0,
            descendants: Vec::new(),
        }
    }
}

/// Converts decoded action trees into ordered display records
#[derive(Debug, Clone)]
pub struct DecodedTreeFlattener<F> {
    formatter: F,
    duplicate_descendants_across_results: bool,
}

impl<F> DecodedTreeFlattener<F> {
    /// Creates a flattener that duplicates descendants across results
    pub fn new(formatter: F) -> Self {
        Self {
            formatter,
            duplicate_descendants_across_results: true,
        }
    }

    pub fn from_config(formatter: F, config: &PipelineConfig) -> Self {
        Self::new(formatter).with_duplicate_descendants(config.duplicate_descendants_across_results)
    }

    pub fn with_duplicate_descendants(mut self, duplicate: bool) -> Self {
        self.duplicate_descendants_across_results = duplicate;
        self
    }

    pub fn formatter(&self) -> &F {
        &self.formatter
    }

    /// Flattens a decoded tree
    ///
    /// Children are processed in order and their records concatenated; the
    /// walk is post-order on an explicit stack, so descendant records are
    /// always produced before the records of the node owning them. Record ids
    /// depend only on the source PathId and result position, so flattening
    /// the same tree twice yields identical keys.
    ///
    /// # Errors
    /// `FlattenError::Format` if the formatter rejects any result.
    pub fn flatten<A>(&self, root: &DecodedActionNode<A>) -> Result<Vec<DisplayRecord<F::Content>>, FlattenError>
    where
        F: ActionFormatter<A>,
        F::Content: Clone,
    {
        let mut stack = vec![Frame::new(root)];
        let mut output = Vec::new();

        while let Some(top) = stack.last_mut() {
            let node = top.node;
            if let Some(child) = node.children.get(top.next_child) {
                top.next_child += 1;
                stack.push(Frame::new(child));
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            let records = self.emit(frame.node, frame.descendants)?;
            match stack.last_mut() {
                Some(parent) => parent.descendants.extend(records),
                None => output = records,
            }
        }

        debug!("Flattened decoded tree into {} top-level records", output.len());
        Ok(output)
    }

    fn emit<A>(
        &self,
        node: &DecodedActionNode<A>,
        descendants: Vec<DisplayRecord<F::Content>>,
    ) -> Result<Vec<DisplayRecord<F::Content>>, FlattenError>
    where
        F: ActionFormatter<A>,
        F::Content: Clone,
    {
        if node.results.is_empty() {
            return Ok(descendants);
        }

        let last = node.results.len() - 1;
        let mut descendants = Some(descendants);
        let mut records = Vec::with_capacity(node.results.len());

        for (position, result) in node.results.iter().enumerate() {
            let id = record_id(&node.source_node, position);
            let content = self
                .formatter
                .format(result)
                .map_err(|source| FlattenError::Format {
                    record: id.clone(),
                    source,
                })?;

            let children = if self.duplicate_descendants_across_results {
                if position == last {
                    descendants.take().unwrap_or_default()
                } else {
                    descendants.clone().unwrap_or_default()
                }
            } else {
                descendants.take().unwrap_or_default()
            };

            records.push(DisplayRecord { id, content, children });
        }

        Ok(records)
    }
}
