//! Log extraction with pass-scoped indexing
//!
//! Logs of a call node are pulled out of its interleaved children into a flat,
//! order-preserving sequence. Each log gets a pass-wide index and the index is
//! mapped back to the log's PathId.
//!
//! The counter and map live in a `LogIndexer` owned by one normalization pass,
//! never in process-wide state, so repeated or concurrent passes each count
//! from zero independently.

use std::collections::BTreeMap;

use alloy::primitives::{Address, B256};

use super::fields;
use crate::{
    errors::NormalizeError,
    traits::Reset,
    types::{LogRecord, PathId, RawCallNode, RawLogNode},
};

/// Pass-scoped log index counter and index→PathId map
#[derive(Debug, Clone, Default)]
pub struct LogIndexer {
    next_index: u64,
    index_to_path: BTreeMap<u64, PathId>,
}

impl LogIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next index to `path`
    pub fn assign(&mut self, path: &PathId) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.index_to_path.insert(index, path.clone());
        index
    }

    /// PathId of the log that received `index`
    pub fn path_of(&self, index: u64) -> Option<&PathId> {
        self.index_to_path.get(&index)
    }

    pub fn index_to_path(&self) -> &BTreeMap<u64, PathId> {
        &self.index_to_path
    }

    /// Number of indices handed out so far
    pub fn len(&self) -> usize {
        self.index_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_path.is_empty()
    }

    pub fn into_index_to_path(self) -> BTreeMap<u64, PathId> {
        self.index_to_path
    }
}

impl Reset for LogIndexer {
    fn reset(&mut self) {
        self.next_index = 0;
        self.index_to_path = BTreeMap::new();
    }
}

/// Extracts log records from raw call nodes
///
/// # Example
/// ```
/// use trace_remap::normalize::LogFlattener;
/// use trace_remap::types::{PathId, RawCallNode, RawLogNode, TraceEntry};
/// use alloy::primitives::Address;
///
/// let node = RawCallNode {
///     path: PathId::root(),
///     from: Address::ZERO.to_string(),
///     to: Address::repeat_byte(0x11).to_string(),
///     status: 1,
///     children: vec![TraceEntry::Log(RawLogNode { path: "0.0".into(), ..Default::default() })],
///     ..Default::default()
/// };
///
/// let mut flattener = LogFlattener::new(None);
/// let logs = flattener.flatten(&node, Address::repeat_byte(0x11), false).unwrap();
/// assert_eq!(logs[0].index, 0);
/// assert_eq!(flattener.indexer().path_of(0), Some(&PathId::new("0.0")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogFlattener {
    indexer: LogIndexer,
    transaction_hash: Option<B256>,
}

impl LogFlattener {
    /// Creates a flattener for one pass
    ///
    /// # Arguments
    /// * `transaction_hash` - Hash stamped on every produced record
    pub fn new(transaction_hash: Option<B256>) -> Self {
        Self {
            indexer: LogIndexer::new(),
            transaction_hash,
        }
    }

    pub fn indexer(&self) -> &LogIndexer {
        &self.indexer
    }

    pub fn into_indexer(self) -> LogIndexer {
        self.indexer
    }

    /// Flattens the logs belonging to `node`
    ///
    /// # Arguments
    /// * `node` - Call node whose logs are extracted
    /// * `context` - Storage context address of `node`; logs without an
    ///   explicit address are attributed to it
    /// * `recursive` - Also append the logs of every call descendant
    ///
    /// # Returns
    /// Immediate logs in original order. In recursive mode each immediate
    /// call child follows, left to right, flattened the same way
    /// (depth-first, immediate logs first).
    ///
    /// # Errors
    /// Any malformed log field, or malformed `to` of a descendant visited in
    /// recursive mode.
    pub fn flatten(
        &mut self,
        node: &RawCallNode,
        context: Address,
        recursive: bool,
    ) -> Result<Vec<LogRecord>, NormalizeError> {
        let mut records = Vec::new();
        let mut pending = vec![(node, context)];

        while let Some((current, context)) = pending.pop() {
            for log in current.logs() {
                records.push(self.record(log, context)?);
            }
            if !recursive {
                break;
            }
            let children = current
                .calls()
                .map(|child| Ok((child, fields::storage_context(context, child)?)))
                .collect::<Result<Vec<_>, NormalizeError>>()?;
            pending.extend(children.into_iter().rev());
        }

        Ok(records)
    }

    fn record(&mut self, log: &RawLogNode, context: Address) -> Result<LogRecord, NormalizeError> {
        let address = match log.address.as_deref() {
            Some(text) if !text.is_empty() => fields::address(&log.path, "address", text)?,
            _ => context,
        };
        let topics = log
            .topics
            .iter()
            .map(|topic| fields::word(&log.path, "topics", topic))
            .collect::<Result<Vec<_>, _>>()?;
        let data = fields::bytes(&log.path, "data", &log.data)?;

        Ok(LogRecord {
            index: self.indexer.assign(&log.path),
            path: log.path.clone(),
            address,
            topics,
            data,
            transaction_hash: self.transaction_hash,
        })
    }
}
