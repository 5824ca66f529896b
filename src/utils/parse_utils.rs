//! Parsing helpers for textual trace fields
//!
//! Trace backends deliver every on-chain value as text. This module turns
//! that text into canonical alloy primitives:
//! - Addresses (with EIP-55 checksum validation for mixed-case input)
//! - Hex byte payloads (empty payloads become explicit empty bytes)
//! - 32-byte words (topics, codehashes)
//! - Call values (decimal or 0x-prefixed hex)

use alloy::primitives::{hex, Address, Bytes, B256, U256};
use std::str::FromStr;

/// Parse an address into its canonical form
///
/// Mixed-case input is treated as an EIP-55 checksummed address and must
/// carry a valid checksum; all-lowercase or all-uppercase input is accepted
/// as is.
///
/// # Returns
/// * `Some(Address)` - Parsed address
/// * `None` - Wrong length, non-hex characters, or bad checksum
pub fn parse_address(text: &str) -> Option<Address> {
    let text = text.trim();
    let body = text.strip_prefix("0x").unwrap_or(text);
    if body.len() != 40 {
        return None;
    }
    let mixed_case = body.chars().any(|c| c.is_ascii_uppercase())
        && body.chars().any(|c| c.is_ascii_lowercase());
    if mixed_case {
        Address::parse_checksummed(format!("0x{body}"), None).ok()
    } else {
        Address::from_str(body).ok()
    }
}

/// Parse a hex payload, mapping absent/empty payloads to empty bytes
pub fn parse_bytes(text: &str) -> Option<Bytes> {
    let text = text.trim();
    if text.is_empty() || text == "0x" {
        return Some(Bytes::new());
    }
    hex::decode(text).ok().map(Bytes::from)
}

/// Parse a 0x-prefixed 32-byte word
pub fn parse_word(text: &str) -> Option<B256> {
    B256::from_str(text.trim()).ok()
}

/// Parse a codehash, where `""` and `"0x"` mean "unknown"
///
/// # Returns
/// * `Some(None)` - Codehash is unknown
/// * `Some(Some(hash))` - Parsed codehash
/// * `None` - Malformed codehash
pub fn parse_codehash(text: &str) -> Option<Option<B256>> {
    let text = text.trim();
    if text.is_empty() || text == "0x" {
        return Some(None);
    }
    parse_word(text).map(Some)
}

/// Parse a call value given as decimal or 0x-prefixed hex
pub fn parse_value(text: &str) -> Option<U256> {
    let text = text.trim();
    if text.is_empty() || text == "0x" {
        return Some(U256::ZERO);
    }
    U256::from_str(text).ok()
}
