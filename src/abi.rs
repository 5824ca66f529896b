//! Interface descriptor storage and resolution
//!
//! This module provides:
//! - `InterfaceDescriptor`: the function/event/error fragments known for a contract
//! - `DescriptorTable`: descriptors keyed by `(address, codehash)`
//! - `AbiResolver`: per-call lookup with delegate-call inheritance
//!
//! A delegate call executes the callee's code in the caller's context, so the
//! caller's known selectors must stay resolvable inside it. Ordinary calls get
//! an interface independent of their caller.

use std::{
    collections::{hash_map::Entry, BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use alloy::{
    json_abi::{Error as AbiError, Event, Function, JsonAbi},
    primitives::{Address, Selector, B256},
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    errors::DescriptorError,
    types::AddressInfo,
    utils::parse_utils::{parse_address, parse_codehash},
};

/// Set of ABI fragments known for one contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceDescriptor {
    abi: JsonAbi,
}

impl InterfaceDescriptor {
    pub fn new(abi: JsonAbi) -> Self {
        Self { abi }
    }

    /// Descriptor with no fragments
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a descriptor from human-readable signatures
    ///
    /// # Example
    /// ```
    /// use trace_remap::abi::InterfaceDescriptor;
    ///
    /// let erc20 = InterfaceDescriptor::parse([
    ///     "function transfer(address to, uint256 amount) returns (bool)",
    ///     "event Transfer(address indexed from, address indexed to, uint256 value)",
    /// ]).unwrap();
    /// assert!(erc20.has_function("transfer"));
    /// assert!(erc20.has_event("Transfer"));
    /// ```
    pub fn parse<'a, I>(signatures: I) -> Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        JsonAbi::parse(signatures)
            .map(Self::new)
            .map_err(|err| DescriptorError::InvalidFragments {
                address: "<inline>".to_string(),
                reason: err.to_string(),
            })
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Total number of fragments
    pub fn len(&self) -> usize {
        self.abi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abi.is_empty()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.abi.functions.contains_key(name)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.abi.events.contains_key(name)
    }

    pub fn has_error(&self, name: &str) -> bool {
        self.abi.errors.contains_key(name)
    }

    /// Finds the function matching a 4-byte selector
    pub fn function_by_selector(&self, selector: Selector) -> Option<&Function> {
        self.abi.functions().find(|function| function.selector() == selector)
    }

    /// Finds the non-anonymous event matching a topic0
    pub fn event_by_topic(&self, topic: B256) -> Option<&Event> {
        self.abi
            .events()
            .find(|event| !event.anonymous && event.selector() == topic)
    }

    /// Merges inherited fragments underneath this descriptor's own
    ///
    /// Fragments are keyed by signature: every own entry is kept, and an
    /// inherited entry is added unless an own entry with the same signature
    /// exists. Overloads from both sides therefore stay resolvable.
    pub fn merged_with_inherited(&self, inherited: &InterfaceDescriptor) -> InterfaceDescriptor {
        let mut merged = self.abi.clone();
        let parent = &inherited.abi;

        merge_overloads(&mut merged.functions, &parent.functions, Function::signature);
        merge_overloads(&mut merged.events, &parent.events, Event::signature);
        merge_overloads(&mut merged.errors, &parent.errors, AbiError::signature);
        if merged.constructor.is_none() {
            merged.constructor = parent.constructor.clone();
        }
        if merged.fallback.is_none() {
            merged.fallback = parent.fallback.clone();
        }
        if merged.receive.is_none() {
            merged.receive = parent.receive.clone();
        }

        InterfaceDescriptor::new(merged)
    }
}

/// Appends inherited overloads whose signature is not already present
fn merge_overloads<T: Clone>(
    own: &mut BTreeMap<String, Vec<T>>,
    inherited: &BTreeMap<String, Vec<T>>,
    signature: impl Fn(&T) -> String,
) {
    for (name, overloads) in inherited {
        let entries = own.entry(name.clone()).or_default();
        let known: HashSet<String> = entries.iter().map(&signature).collect();
        entries.extend(
            overloads
                .iter()
                .filter(|overload| !known.contains(&signature(overload)))
                .cloned(),
        );
    }
}

/// Interface descriptors keyed by `(address, codehash)`
///
/// A `None` codehash registers an address-wide descriptor, used when no entry
/// for the exact codehash exists.
#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    entries: HashMap<Address, HashMap<Option<B256>, Arc<InterfaceDescriptor>>>,
    labels: HashMap<Address, String>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor, replacing any previous one for the same key
    pub fn insert(&mut self, address: Address, codehash: Option<B256>, descriptor: InterfaceDescriptor) {
        self.entries
            .entry(address)
            .or_default()
            .insert(codehash, Arc::new(descriptor));
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_descriptor(
        mut self,
        address: Address,
        codehash: Option<B256>,
        descriptor: InterfaceDescriptor,
    ) -> Self {
        self.insert(address, codehash, descriptor);
        self
    }

    pub fn set_label(&mut self, address: Address, label: impl Into<String>) {
        self.labels.insert(address, label.into());
    }

    pub fn label(&self, address: Address) -> Option<&str> {
        self.labels.get(&address).map(String::as_str)
    }

    /// Looks up the descriptor for a code instance
    ///
    /// Tries the exact `(address, codehash)` entry first, then the
    /// address-wide entry.
    pub fn get(&self, address: Address, codehash: Option<B256>) -> Option<&Arc<InterfaceDescriptor>> {
        let by_codehash = self.entries.get(&address)?;
        by_codehash
            .get(&codehash)
            .or_else(|| by_codehash.get(&None))
    }

    /// Number of registered `(address, codehash)` entries
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a table from a trace response's `addresses[address][codehash]` map
    ///
    /// Address keys are canonicalized; `"0x"` codehash keys register
    /// address-wide descriptors. Labels are kept alongside.
    pub fn from_address_infos(
        addresses: &HashMap<String, HashMap<String, AddressInfo>>,
    ) -> Result<Self, DescriptorError> {
        let mut table = Self::new();
        for (address_key, by_codehash) in addresses {
            let address = parse_address(address_key)
                .ok_or_else(|| DescriptorError::InvalidAddress(address_key.clone()))?;
            for (codehash_key, info) in by_codehash {
                let codehash = parse_codehash(codehash_key).ok_or_else(|| {
                    DescriptorError::InvalidCodehash {
                        address: address_key.clone(),
                        codehash: codehash_key.clone(),
                    }
                })?;
                let abi: JsonAbi =
                    serde_json::from_value(serde_json::Value::Array(info.fragments.clone()))
                        .map_err(|err| DescriptorError::InvalidFragments {
                            address: address_key.clone(),
                            reason: err.to_string(),
                        })?;
                table.insert(address, codehash, InterfaceDescriptor::new(abi));
                if !info.label.is_empty() {
                    if let Entry::Vacant(slot) = table.labels.entry(address) {
                        slot.insert(info.label.clone());
                    }
                }
            }
        }
        debug!("Built descriptor table with {} entries", table.len());
        Ok(table)
    }
}

/// Resolves the merged interface descriptor of each call
#[derive(Debug, Clone)]
pub struct AbiResolver<'a> {
    table: &'a DescriptorTable,
    empty: Arc<InterfaceDescriptor>,
}

impl<'a> AbiResolver<'a> {
    pub fn new(table: &'a DescriptorTable) -> Self {
        Self {
            table,
            empty: Arc::new(InterfaceDescriptor::empty()),
        }
    }

    /// Resolves the descriptor for a call target
    ///
    /// # Arguments
    /// * `address` - Code address of the callee
    /// * `codehash` - Codehash of the callee, `None` when unknown
    /// * `inherited` - Merged descriptor of the invoking parent; only supplied
    ///   for delegate calls
    ///
    /// # Returns
    /// The registered descriptor merged over `inherited`. A missing
    /// registration resolves to an empty fragment set, so decoding for the
    /// call degrades to "unknown" instead of failing.
    pub fn resolve(
        &self,
        address: Address,
        codehash: Option<B256>,
        inherited: Option<&Arc<InterfaceDescriptor>>,
    ) -> Arc<InterfaceDescriptor> {
        let own = self.table.get(address, codehash);
        if own.is_none() {
            debug!("No interface descriptor registered for {address}");
        }

        match (own, inherited) {
            (Some(own), None) => Arc::clone(own),
            (None, None) => Arc::clone(&self.empty),
            (None, Some(inherited)) => Arc::clone(inherited),
            (Some(own), Some(inherited)) => Arc::new(own.merged_with_inherited(inherited)),
        }
    }
}
