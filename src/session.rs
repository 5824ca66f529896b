//! Decode session: normalize, await the decoder engine, apply the result
//!
//! The decoder engine call is the single suspension point of the pipeline.
//! Inputs may change while a decode is in flight, so every request carries a
//! generation number taken from a monotonically increasing counter. A
//! resolution is applied to the displayed state only if its generation is
//! still the newest one issued; anything older is discarded, however late it
//! arrives.
//!
//! # State Transitions
//! - `begin` → `Pending`
//! - engine success → `Decoded` (records are `None` when flattening failed)
//! - normalization or engine failure → `Failed`
//! - stale resolution → no change
//!
//! Metadata requests are forwarded only once a result has been applied.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::B256;
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::{
    abi::DescriptorTable,
    config::PipelineConfig,
    display::DecodedTreeFlattener,
    errors::{DecodeError, NormalizeError, PipelineError},
    normalize::TraceNormalizer,
    traits::{ActionFormatter, ChainAccess, DecoderEngine, MetadataSink},
    types::{DisplayRecord, MetadataRequest, RawCallNode, TraceResponse},
    utils::parse_utils::parse_word,
};

/// Per-transaction inputs of one decode request
#[derive(Debug, Clone, Copy)]
pub struct DecodeRequest<'a> {
    /// Raw entrypoint call
    pub trace: &'a RawCallNode,
    /// Hash stamped on every normalized log
    pub transaction_hash: Option<B256>,
    /// Block timestamp forwarded with price requests
    pub block_timestamp: Option<u64>,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(trace: &'a RawCallNode) -> Self {
        Self {
            trace,
            transaction_hash: None,
            block_timestamp: None,
        }
    }

    /// Builds a request for a trace response, parsing its `txhash`
    ///
    /// An empty `txhash` (or `"0x"`) leaves the hash unset.
    ///
    /// # Returns
    /// * `Ok(DecodeRequest)` - Request over the response's entrypoint
    /// * `Err(NormalizeError::InvalidTransactionHash)` - `txhash` is not a 32-byte word
    pub fn from_response(response: &'a TraceResponse) -> Result<Self, NormalizeError> {
        let txhash = response.txhash.trim();
        let transaction_hash = if txhash.is_empty() || txhash == "0x" {
            None
        } else {
            let hash = parse_word(txhash)
                .ok_or_else(|| NormalizeError::InvalidTransactionHash(response.txhash.clone()))?;
            Some(hash)
        };
        Ok(Self {
            trace: &response.entrypoint,
            transaction_hash,
            block_timestamp: None,
        })
    }

    pub fn with_transaction_hash(mut self, hash: B256) -> Self {
        self.transaction_hash = Some(hash);
        self
    }

    pub fn with_block_timestamp(mut self, timestamp: u64) -> Self {
        self.block_timestamp = Some(timestamp);
        self
    }
}

/// Handle identifying one decode request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DecodeTicket {
    generation: u64,
}

impl DecodeTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Displayed state of a session
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeState<C> {
    /// Nothing requested yet
    Idle,
    /// A request is in flight
    Pending { generation: u64 },
    /// The newest request resolved
    Decoded {
        generation: u64,
        /// Flattened records; `None` when flattening failed and display was omitted
        records: Option<Vec<DisplayRecord<C>>>,
        metadata: MetadataRequest,
    },
    /// The newest request failed
    Failed { generation: u64, message: String },
}

impl<C> DecodeState<C> {
    pub fn generation(&self) -> Option<u64> {
        match self {
            DecodeState::Idle => None,
            DecodeState::Pending { generation }
            | DecodeState::Decoded { generation, .. }
            | DecodeState::Failed { generation, .. } => Some(*generation),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, DecodeState::Pending { .. })
    }

    pub fn records(&self) -> Option<&[DisplayRecord<C>]> {
        match self {
            DecodeState::Decoded { records: Some(records), .. } => Some(records),
            _ => None,
        }
    }
}

/// What happened to a resolved request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The result was applied to the displayed state
    Applied { generation: u64 },
    /// A newer request exists; the result was discarded
    Stale { generation: u64, latest: u64 },
}

/// Owns the displayed decode state for one view
pub struct DecodeSession<E, F, M>
where
    E: DecoderEngine,
    F: ActionFormatter<E::Action>,
{
    engine: E,
    flattener: DecodedTreeFlattener<F>,
    metadata: M,
    config: PipelineConfig,
    generation: AtomicU64,
    state: RwLock<DecodeState<F::Content>>,
}

impl<E, F, M> DecodeSession<E, F, M>
where
    E: DecoderEngine,
    F: ActionFormatter<E::Action> + Sync,
    F::Content: Clone + Send + Sync,
    M: MetadataSink,
{
    /// Creates a session
    ///
    /// # Arguments
    /// * `engine` - Decoder engine
    /// * `formatter` - Renders decoded actions into display content
    /// * `metadata` - Receives token and price metadata requests
    /// * `config` - Pipeline configuration
    pub fn new(engine: E, formatter: F, metadata: M, config: PipelineConfig) -> Self {
        Self {
            engine,
            flattener: DecodedTreeFlattener::from_config(formatter, &config),
            metadata,
            config,
            generation: AtomicU64::new(0),
            state: RwLock::new(DecodeState::Idle),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generation of the newest issued request (0 before any)
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: DecodeTicket) -> bool {
        ticket.generation == self.latest_generation()
    }

    /// Snapshot of the displayed state
    pub async fn state(&self) -> DecodeState<F::Content> {
        self.state.read().await.clone()
    }

    /// Issues a new generation and marks the state pending
    pub async fn begin(&self) -> DecodeTicket {
        let mut state = self.state.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = DecodeState::Pending { generation };
        DecodeTicket { generation }
    }

    /// Runs one decode for the given request
    ///
    /// # Arguments
    /// * `request` - Raw entrypoint call with its transaction hash and timestamp
    /// * `descriptors` - Interface descriptor table for the trace
    /// * `access` - Chain access capability passed through to the engine
    ///
    /// # Returns
    /// * `Ok(Applied)` - The result (possibly with display omitted) is now displayed
    /// * `Ok(Stale)` - A newer request superseded this one
    /// * `Err(_)` - Normalization or decoding failed; the state shows `Failed`
    pub async fn run<C: ChainAccess>(
        &self,
        request: DecodeRequest<'_>,
        descriptors: &DescriptorTable,
        access: &C,
    ) -> Result<SessionOutcome, PipelineError> {
        let ticket = self.begin().await;
        debug!("Decode request {} started", ticket.generation);

        let normalizer =
            TraceNormalizer::new(descriptors).with_transaction_hash(request.transaction_hash);
        let input = match normalizer.normalize(request.trace) {
            Ok(input) => input,
            Err(err) => {
                let err = PipelineError::from(err);
                return self.fail(ticket, err).await;
            }
        };

        let (decoded, metadata) = match self.engine.decode(&input, access).await {
            Ok(output) => output,
            Err(err) => {
                let err = PipelineError::from(DecodeError::Engine(err));
                return self.fail(ticket, err).await;
            }
        };

        if !self.is_current(ticket) {
            return Ok(self.stale(ticket));
        }

        let records = match self.flattener.flatten(&decoded) {
            Ok(records) => Some(records),
            Err(err) => {
                warn!("Failed to generate decoded tree for request {}: {err}", ticket.generation);
                None
            }
        };

        let decoded = DecodeState::Decoded {
            generation: ticket.generation,
            records,
            metadata: metadata.clone(),
        };
        let outcome = self.apply(ticket, decoded).await;
        if let SessionOutcome::Applied { .. } = outcome {
            self.forward_metadata(&metadata, request.block_timestamp);
        }
        Ok(outcome)
    }

    /// Applies `state` if `ticket` is still the newest request
    pub async fn apply(&self, ticket: DecodeTicket, state: DecodeState<F::Content>) -> SessionOutcome {
        let mut current = self.state.write().await;
        if !self.is_current(ticket) {
            return self.stale(ticket);
        }
        *current = state;
        info!("Decode request {} applied", ticket.generation);
        SessionOutcome::Applied { generation: ticket.generation }
    }

    async fn fail(&self, ticket: DecodeTicket, err: PipelineError) -> Result<SessionOutcome, PipelineError> {
        warn!("Decode request {} failed: {err}", ticket.generation);
        let failed = DecodeState::Failed {
            generation: ticket.generation,
            message: err.to_string(),
        };
        match self.apply(ticket, failed).await {
            SessionOutcome::Applied { .. } => Err(err),
            stale => Ok(stale),
        }
    }

    fn stale(&self, ticket: DecodeTicket) -> SessionOutcome {
        let latest = self.latest_generation();
        debug!(
            "Discarding stale decode result {} (latest is {latest})",
            ticket.generation
        );
        SessionOutcome::Stale {
            generation: ticket.generation,
            latest,
        }
    }

    fn forward_metadata(&self, metadata: &MetadataRequest, block_timestamp: Option<u64>) {
        if metadata.tokens.is_empty() {
            return;
        }
        let tokens: Vec<_> = metadata.tokens.iter().copied().collect();
        if let (Some(prefix), Some(timestamp)) =
            (self.config.price_key_prefix.as_deref(), block_timestamp)
        {
            self.metadata
                .request_prices(&metadata.price_keys(prefix), timestamp);
        }
        self.metadata.request_tokens(&tokens);
    }
}
