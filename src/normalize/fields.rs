//! Field-level validation for raw trace nodes
//!
//! Wraps the textual parsers with the PathId and field name of the node being
//! normalized, so a malformed field reports exactly where it came from.

use alloy::primitives::{Address, Bytes, B256, U256};

use crate::{
    errors::NormalizeError,
    types::{PathId, RawCallNode},
    utils::parse_utils::{parse_address, parse_bytes, parse_codehash, parse_value, parse_word},
};

pub(crate) fn address(path: &PathId, field: &'static str, text: &str) -> Result<Address, NormalizeError> {
    parse_address(text).ok_or_else(|| NormalizeError::InvalidAddress {
        path: path.to_string(),
        field,
        value: text.to_string(),
    })
}

pub(crate) fn bytes(path: &PathId, field: &'static str, text: &str) -> Result<Bytes, NormalizeError> {
    parse_bytes(text).ok_or_else(|| NormalizeError::InvalidBytes {
        path: path.to_string(),
        field,
        value: text.to_string(),
    })
}

pub(crate) fn word(path: &PathId, field: &'static str, text: &str) -> Result<B256, NormalizeError> {
    parse_word(text).ok_or_else(|| NormalizeError::InvalidWord {
        path: path.to_string(),
        field,
        value: text.to_string(),
    })
}

pub(crate) fn codehash(path: &PathId, text: &str) -> Result<Option<B256>, NormalizeError> {
    parse_codehash(text).ok_or_else(|| NormalizeError::InvalidWord {
        path: path.to_string(),
        field: "codehash",
        value: text.to_string(),
    })
}

pub(crate) fn value(path: &PathId, text: &str) -> Result<U256, NormalizeError> {
    parse_value(text).ok_or_else(|| NormalizeError::InvalidValue {
        path: path.to_string(),
        value: text.to_string(),
    })
}

/// Storage context address in which `child` executes
///
/// Delegate-style calls run in their caller's context; every other call runs
/// in the context of its own target.
pub(crate) fn storage_context(parent_context: Address, child: &RawCallNode) -> Result<Address, NormalizeError> {
    if child.variant.executes_in_caller_context() {
        Ok(parent_context)
    } else {
        address(&child.path, "to", &child.to)
    }
}
