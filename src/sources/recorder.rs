//! REVM inspector recording executions as raw traces
//!
//! `TraceRecorder` hooks into REVM's call, create and log events and builds
//! the interleaved raw tree directly, so locally executed transactions go
//! through the same normalization path as backend traces.
//!
//! # Special Cases
//! - Delegate calls and callcodes record the code address as `to`
//! - Creation targets are unknown until `create_end`
//! - Codehashes are recorded as unknown (`"0x"`), so descriptor lookups use
//!   address-wide entries

use alloy::primitives::{hex, Address, Bytes, Log};
use revm::{
    context::ContextTr,
    interpreter::{
        CallInputs, CallOutcome, CallScheme, CreateInputs, CreateOutcome, CreateScheme, Interpreter,
        InterpreterTypes,
    },
    Inspector,
};

use crate::{
    traits::{Reset, TraceOutput},
    types::{CallVariant, PathId, RawCallNode, RawLogNode, TraceEntry},
};

/// Records one transaction's call tree with interleaved logs
#[derive(Debug, Default, Clone)]
pub struct TraceRecorder {
    /// Frames entered but not yet finished, innermost last
    open: Vec<RawCallNode>,
    /// Finished entrypoint frame
    finished: Option<RawCallNode>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded trace, once the entrypoint frame has finished
    pub fn trace(&self) -> Option<&RawCallNode> {
        self.finished.as_ref()
    }

    /// Path of the next child entry of the innermost open frame
    fn next_path(&self) -> PathId {
        match self.open.last() {
            Some(parent) => parent.path.child(parent.children.len()),
            None => PathId::root(),
        }
    }

    fn enter(&mut self, variant: CallVariant, from: Address, to: Option<Address>, input: &Bytes, value: String, gas: u64) {
        let node = RawCallNode {
            path: self.next_path(),
            variant,
            gas,
            from: from.to_checksum(None),
            to: to.map(|to| to.to_checksum(None)).unwrap_or_default(),
            input: hex::encode_prefixed(input),
            value,
            codehash: "0x".to_string(),
            ..Default::default()
        };
        self.open.push(node);
    }

    /// Finishes the innermost frame and attaches it to its parent
    fn exit(&mut self, success: bool, gas_used: u64, output: &Bytes, created: Option<Address>) {
        let Some(mut node) = self.open.pop() else {
            return;
        };
        node.status = u64::from(success);
        node.gas_used = gas_used;
        node.output = hex::encode_prefixed(output);
        if let Some(address) = created {
            node.to = address.to_checksum(None);
        }
        if node.to.is_empty() {
            // Failed creation: no address was ever assigned
            node.to = Address::ZERO.to_checksum(None);
        }

        match self.open.last_mut() {
            Some(parent) => parent.children.push(TraceEntry::Call(node)),
            None => self.finished = Some(node),
        }
    }
}

impl<CTX, INTR> Inspector<CTX, INTR> for TraceRecorder
where
    CTX: ContextTr,
    INTR: InterpreterTypes,
{
    fn call(&mut self, context: &mut CTX, inputs: &mut CallInputs) -> Option<CallOutcome> {
        let variant = match inputs.scheme {
            CallScheme::DelegateCall => CallVariant::DelegateCall,
            CallScheme::CallCode => CallVariant::CallCode,
            CallScheme::StaticCall => CallVariant::StaticCall,
            _ => CallVariant::Call,
        };
        let to = match inputs.scheme {
            CallScheme::DelegateCall | CallScheme::CallCode => inputs.bytecode_address,
            _ => inputs.target_address,
        };
        let input = inputs.input.bytes(context);
        self.enter(
            variant,
            inputs.caller,
            Some(to),
            &input,
            inputs.call_value().to_string(),
            inputs.gas_limit,
        );
        None
    }

    fn create(&mut self, _context: &mut CTX, inputs: &mut CreateInputs) -> Option<CreateOutcome> {
        let variant = match inputs.scheme {
            CreateScheme::Create2 { .. } => CallVariant::Create2,
            _ => CallVariant::Create,
        };
        self.enter(
            variant,
            inputs.caller,
            None,
            &inputs.init_code,
            inputs.value.to_string(),
            inputs.gas_limit,
        );
        None
    }

    fn call_end(&mut self, _context: &mut CTX, _inputs: &CallInputs, outcome: &mut CallOutcome) {
        self.exit(
            outcome.result.result.is_ok(),
            outcome.result.gas.spent(),
            &outcome.result.output,
            None,
        );
    }

    fn create_end(&mut self, _context: &mut CTX, _inputs: &CreateInputs, outcome: &mut CreateOutcome) {
        self.exit(
            outcome.result.result.is_ok(),
            outcome.result.gas.spent(),
            &outcome.result.output,
            outcome.address,
        );
    }

    fn log(&mut self, _interp: &mut Interpreter<INTR>, _context: &mut CTX, log: Log) {
        let path = self.next_path();
        let Some(frame) = self.open.last_mut() else {
            return;
        };
        frame.children.push(TraceEntry::Log(RawLogNode {
            path,
            address: Some(log.address.to_checksum(None)),
            topics: log.data.topics().iter().map(hex::encode_prefixed).collect(),
            data: hex::encode_prefixed(&log.data.data),
        }));
    }
}

impl Reset for TraceRecorder {
    /// Drops open frames and any finished trace
    fn reset(&mut self) {
        self.open = Vec::new();
        self.finished = None;
    }
}

impl TraceOutput for TraceRecorder {
    type Output = Option<RawCallNode>;

    fn get_output(&self) -> Self::Output {
        self.finished.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_open_frames() {
        let mut recorder = TraceRecorder::new();
        assert_eq!(recorder.next_path(), PathId::root());

        recorder.enter(CallVariant::Call, Address::ZERO, Some(Address::repeat_byte(1)), &Bytes::new(), "0".into(), 100);
        assert_eq!(recorder.next_path(), PathId::new("0.0"));

        recorder.enter(CallVariant::DelegateCall, Address::repeat_byte(1), Some(Address::repeat_byte(2)), &Bytes::new(), "0".into(), 50);
        assert_eq!(recorder.next_path(), PathId::new("0.0.0"));
        recorder.exit(true, 10, &Bytes::new(), None);

        // the finished child now occupies slot 0 of the entrypoint
        assert_eq!(recorder.next_path(), PathId::new("0.1"));
        recorder.exit(false, 20, &Bytes::from(vec![0xde, 0xad]), None);

        let trace = recorder.get_output().unwrap();
        assert_eq!(trace.status, 0);
        assert_eq!(trace.output, "0xdead");
        assert_eq!(trace.calls().count(), 1);
        assert_eq!(trace.calls().next().unwrap().variant, CallVariant::DelegateCall);
        assert_eq!(trace.calls().next().unwrap().status, 1);
    }

    #[test]
    fn test_failed_creation_gets_zero_target() {
        let mut recorder = TraceRecorder::new();
        recorder.enter(CallVariant::Create, Address::repeat_byte(1), None, &Bytes::new(), "0".into(), 100);
        recorder.exit(false, 100, &Bytes::new(), None);

        assert_eq!(recorder.trace().unwrap().to, Address::ZERO.to_checksum(None));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut recorder = TraceRecorder::new();
        recorder.enter(CallVariant::Call, Address::ZERO, Some(Address::ZERO), &Bytes::new(), "0".into(), 1);
        recorder.exit(true, 1, &Bytes::new(), None);
        assert!(recorder.trace().is_some());

        recorder.reset();
        assert!(recorder.trace().is_none());
        assert_eq!(recorder.next_path(), PathId::root());
    }
}
