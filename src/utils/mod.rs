//! Utility functions for trace field handling
//!
//! # Modules
//!
//! - [`parse_utils`]: Textual trace field parsing
//!   - Address canonicalization with checksum validation
//!   - Hex payloads, 32-byte words, call values

/// Trace field parsing utilities
pub mod parse_utils;
