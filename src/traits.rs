//! Capability traits at the pipeline's seams
//!
//! This module provides traits for:
//! - Resetting and extracting state from recorders (`Reset`, `TraceOutput`)
//! - Read-only on-chain lookups handed opaquely to decoders (`ChainAccess`)
//! - The pluggable decoder engine (`DecoderEngine`)
//! - Rendering decoded actions into display content (`ActionFormatter`)
//! - Fire-and-forget metadata fetching (`MetadataSink`)

use std::future::Future;

use alloy::primitives::{Address, Bytes, U256};

use crate::{
    errors::ChainAccessError,
    normalize::NormalizedTrace,
    types::DecoderOutput,
};

/// Trait for resetting accumulated state between runs
///
/// Implementors should clear any accumulated state:
/// - Open frames and recorded traces
/// - Counters and index maps
pub trait Reset {
    /// Clears all accumulated state data
    fn reset(&mut self);
}

/// Trait for extracting the result collected by a recorder
pub trait TraceOutput {
    type Output;

    fn get_output(&self) -> Self::Output;
}

/// Read-only chain lookups available to decoder engines
///
/// The pipeline never calls these itself; it passes the capability through
/// to the engine untouched.
pub trait ChainAccess: Send + Sync {
    /// Deployed code at `address`
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes, ChainAccessError>> + Send;

    /// Storage word at `slot` of `address`
    fn storage_at(
        &self,
        address: Address,
        slot: U256,
    ) -> impl Future<Output = Result<U256, ChainAccessError>> + Send;

    /// Executes a read-only call and returns its returndata
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = Result<Bytes, ChainAccessError>> + Send;
}

/// Pluggable decoder turning a normalized trace into decoded actions
///
/// Alternative decoding strategies plug in here without touching
/// normalization.
pub trait DecoderEngine: Send + Sync {
    /// Decoded action type carried in result lists
    type Action: Send;

    /// Decodes `input`, possibly performing lookups through `access`
    fn decode<C: ChainAccess>(
        &self,
        input: &NormalizedTrace,
        access: &C,
    ) -> impl Future<Output = anyhow::Result<DecoderOutput<Self::Action>>> + Send;
}

/// Renders one decoded action into display content
///
/// Implemented for any `Fn(&A) -> anyhow::Result<C>`.
pub trait ActionFormatter<A> {
    type Content;

    fn format(&self, action: &A) -> anyhow::Result<Self::Content>;
}

impl<A, C, F> ActionFormatter<A> for F
where
    F: Fn(&A) -> anyhow::Result<C>,
{
    type Content = C;

    fn format(&self, action: &A) -> anyhow::Result<C> {
        self(action)
    }
}

/// Receives metadata fetch requests
///
/// Calls must return immediately; fetching happens elsewhere and never gates
/// display.
pub trait MetadataSink: Send + Sync {
    /// Token metadata (symbol, decimals) is wanted for `tokens`
    fn request_tokens(&self, tokens: &[Address]);

    /// Prices are wanted for `keys` (`"{prefix}:{token}"`) at `timestamp`
    fn request_prices(&self, keys: &[String], timestamp: u64) {
        let _ = (keys, timestamp);
    }
}

impl MetadataSink for () {
    fn request_tokens(&self, _tokens: &[Address]) {}
}
