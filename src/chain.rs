//! Chain access backed by an alloy provider
//!
//! Decoders occasionally need on-chain state (token symbols, proxy slots)
//! that the trace does not carry. `ProviderChainAccess` exposes a read-only
//! subset of an alloy [`Provider`] through the [`ChainAccess`] capability.
//!
//! # Example
//! ```no_run
//! use trace_remap::chain::ProviderChainAccess;
//! use alloy::providers::ProviderBuilder;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = ProviderBuilder::new().connect_http("https://eth.llamarpc.com".parse()?);
//! let access = ProviderChainAccess::new(provider);
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
};

use crate::{errors::ChainAccessError, traits::ChainAccess};

/// [`ChainAccess`] over any alloy provider
#[derive(Debug, Clone)]
pub struct ProviderChainAccess<P> {
    provider: P,
}

impl<P> ProviderChainAccess<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

fn rpc_error(err: impl std::fmt::Display) -> ChainAccessError {
    ChainAccessError::Rpc(err.to_string())
}

impl<P: Provider> ChainAccess for ProviderChainAccess<P> {
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes, ChainAccessError>> + Send {
        async move { self.provider.get_code_at(address).await.map_err(rpc_error) }
    }

    fn storage_at(
        &self,
        address: Address,
        slot: U256,
    ) -> impl Future<Output = Result<U256, ChainAccessError>> + Send {
        async move {
            self.provider
                .get_storage_at(address, slot)
                .await
                .map_err(rpc_error)
        }
    }

    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = Result<Bytes, ChainAccessError>> + Send {
        async move {
            let tx = TransactionRequest::default().with_to(to).with_input(data);
            self.provider.call(tx).await.map_err(rpc_error)
        }
    }
}
