//! Integration tests for trace normalization
//!
//! # Test Coverage
//! - Child order reconciliation over interleaved logs and calls
//! - Delegate-call descriptor inheritance and overload merging
//! - Pass-scoped log indexing
//! - Log address attribution under delegate calls
//! - Fatal handling of malformed trace fields
//! - Arena helpers (`ordered_members`, `collect_logs`, `check_invariants`)
//! - Responses nested to the EVM call depth limit

use std::sync::Arc;

use alloy::primitives::{hex, Address, Bytes, B256, U256};
use trace_remap::{
    abi::{DescriptorTable, InterfaceDescriptor},
    errors::NormalizeError,
    normalize::{LogFlattener, OrderedMember, TraceNormalizer, ROOT},
    types::{
        CallVariant, ChildOrder, PathId, RawCallNode, RawLogNode, RawSloadNode, RawSstoreNode,
        TraceEntry, TraceResponse,
    },
};

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn call(path: &str, variant: CallVariant, from: Address, to: Address, children: Vec<TraceEntry>) -> TraceEntry {
    TraceEntry::Call(raw_call(path, variant, from, to, children))
}

fn raw_call(path: &str, variant: CallVariant, from: Address, to: Address, children: Vec<TraceEntry>) -> RawCallNode {
    RawCallNode {
        path: path.into(),
        variant,
        from: from.to_checksum(None),
        to: to.to_checksum(None),
        input: "0x".to_string(),
        output: "0x".to_string(),
        value: "0".to_string(),
        status: 1,
        codehash: "0x".to_string(),
        children,
        ..Default::default()
    }
}

fn log(path: &str) -> TraceEntry {
    TraceEntry::Log(RawLogNode {
        path: path.into(),
        address: None,
        topics: vec![hex::encode_prefixed(B256::repeat_byte(0xee))],
        data: "0x01".to_string(),
    })
}

fn paths(entries: &[TraceEntry]) -> Vec<PathId> {
    entries.iter().map(|entry| entry.path().clone()).collect()
}

#[test]
fn test_call_log_call_scenario() {
    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        addr(0x02),
        vec![
            call("0.0", CallVariant::Call, addr(0x02), addr(0x03), vec![]),
            log("0.1"),
            call("0.2", CallVariant::Call, addr(0x02), addr(0x04), vec![]),
        ],
    );

    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();
    let node = trace.root();

    assert_eq!(node.logs.len(), 1);
    assert_eq!(node.logs[0].path, PathId::new("0.1"));
    assert_eq!(node.children.len(), 2);

    let children: Vec<_> = trace.children(ROOT).map(|child| child.to).collect();
    assert_eq!(children, vec![addr(0x03), addr(0x04)]);
    assert_eq!(
        node.child_order,
        vec![ChildOrder::Call(0), ChildOrder::Log(0), ChildOrder::Call(1)]
    );
    trace.check_invariants().unwrap();
}

#[test]
fn test_delegate_call_merges_parent_descriptor() {
    let parent = addr(0x0a);
    let implementation = addr(0x0b);

    let table = DescriptorTable::new()
        .with_descriptor(parent, None, InterfaceDescriptor::parse(["function foo()"]).unwrap())
        .with_descriptor(implementation, None, InterfaceDescriptor::parse(["function bar()"]).unwrap());

    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        parent,
        vec![
            call("0.0", CallVariant::DelegateCall, parent, implementation, vec![]),
            call("0.1", CallVariant::Call, parent, implementation, vec![]),
        ],
    );

    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();
    let children: Vec<_> = trace.children(ROOT).collect();

    // delegate call: own and inherited fragments
    assert!(children[0].abi.has_function("foo"));
    assert!(children[0].abi.has_function("bar"));

    // ordinary call: own fragments only
    assert!(!children[1].abi.has_function("foo"));
    assert!(children[1].abi.has_function("bar"));

    // the parent keeps its own descriptor untouched
    assert!(trace.root().abi.has_function("foo"));
    assert!(!trace.root().abi.has_function("bar"));
}

#[test]
fn test_delegate_call_keeps_parent_overloads() {
    let parent = addr(0x0a);
    let implementation = addr(0x0b);

    let table = DescriptorTable::new()
        .with_descriptor(
            parent,
            None,
            InterfaceDescriptor::parse([
                "function transfer(address to, uint256 amount) returns (bool)",
                "function foo(uint256 amount) returns (bool)",
                "function baz()",
            ])
            .unwrap(),
        )
        .with_descriptor(
            implementation,
            None,
            InterfaceDescriptor::parse([
                "function transfer(address to, uint256 amount, bytes data) returns (bool)",
                "function foo(uint256 value)",
            ])
            .unwrap(),
        );

    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        parent,
        vec![call("0.0", CallVariant::DelegateCall, parent, implementation, vec![])],
    );

    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();
    let merged = &trace.children(ROOT).next().unwrap().abi;

    // both transfer overloads stay resolvable, own first
    let transfer = &merged.abi().functions["transfer"];
    assert_eq!(transfer.len(), 2);
    assert_eq!(transfer[0].inputs.len(), 3);
    let parent_transfer = merged.function_by_selector([0xa9, 0x05, 0x9c, 0xbb].into()).unwrap();
    assert_eq!(parent_transfer.inputs.len(), 2);

    // same signature: the callee's own entry wins
    let foo = &merged.abi().functions["foo"];
    assert_eq!(foo.len(), 1);
    assert!(foo[0].outputs.is_empty());
    assert!(merged.has_function("baz"));
}

#[test]
fn test_nested_delegate_calls_accumulate_fragments() {
    let proxy = addr(0x0a);
    let router = addr(0x0b);
    let library = addr(0x0c);

    let table = DescriptorTable::new()
        .with_descriptor(proxy, None, InterfaceDescriptor::parse(["function upgradeTo(address)"]).unwrap())
        .with_descriptor(router, None, InterfaceDescriptor::parse(["function swap()"]).unwrap())
        .with_descriptor(library, None, InterfaceDescriptor::parse(["function math()"]).unwrap());

    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        proxy,
        vec![call(
            "0.0",
            CallVariant::DelegateCall,
            proxy,
            router,
            vec![call("0.0.0", CallVariant::DelegateCall, proxy, library, vec![])],
        )],
    );

    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();
    let inner = trace.node(trace.find(&PathId::new("0.0.0")).unwrap()).unwrap();
    for name in ["upgradeTo", "swap", "math"] {
        assert!(inner.abi.has_function(name), "missing {name}");
    }
}

#[test]
fn test_unknown_contract_resolves_to_empty_descriptor() {
    let root = raw_call("0", CallVariant::Call, addr(0x01), addr(0x02), vec![]);
    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();

    assert!(trace.root().abi.is_empty());
}

#[test]
fn test_codehash_specific_descriptor() {
    let target = addr(0x02);
    let codehash = B256::repeat_byte(0xcc);

    let table = DescriptorTable::new()
        .with_descriptor(target, None, InterfaceDescriptor::parse(["function legacy()"]).unwrap())
        .with_descriptor(target, Some(codehash), InterfaceDescriptor::parse(["function current()"]).unwrap());

    let mut root = raw_call("0", CallVariant::Call, addr(0x01), target, vec![]);
    root.codehash = hex::encode_prefixed(codehash);

    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();
    assert_eq!(trace.root().codehash, Some(codehash));
    assert!(trace.root().abi.has_function("current"));
    assert!(!trace.root().abi.has_function("legacy"));
}

#[test]
fn test_log_indices_strictly_increase() {
    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        addr(0x02),
        vec![
            log("0.0"),
            call(
                "0.1",
                CallVariant::Call,
                addr(0x02),
                addr(0x03),
                vec![log("0.1.0"), log("0.1.1")],
            ),
            log("0.2"),
        ],
    );

    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();

    let indices: Vec<u64> = trace
        .nodes()
        .iter()
        .flat_map(|node| node.logs.iter().map(|log| log.index))
        .collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(trace.log_count(), 4);
    assert_eq!(trace.log_path(0), Some(&PathId::new("0.0")));
    assert_eq!(trace.log_path(1), Some(&PathId::new("0.2")));
    assert_eq!(trace.log_path(2), Some(&PathId::new("0.1.0")));
    trace.check_invariants().unwrap();
}

#[test]
fn test_repeated_passes_count_from_zero() {
    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        addr(0x02),
        vec![log("0.0"), log("0.1")],
    );

    let table = DescriptorTable::new();
    let normalizer = TraceNormalizer::new(&table);
    let first = normalizer.normalize(&root).unwrap();
    let second = normalizer.normalize(&root).unwrap();

    assert_eq!(first, second);
    assert_eq!(second.root().logs[0].index, 0);
}

#[test]
fn test_log_address_follows_storage_context() {
    let proxy = addr(0x0a);
    let implementation = addr(0x0b);
    let token = addr(0x0c);
    let explicit = addr(0x0d);

    let explicit_log = RawLogNode {
        path: "0.0.1".into(),
        address: Some(explicit.to_checksum(None)),
        topics: Vec::new(),
        data: "0x".to_string(),
    };

    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        proxy,
        vec![
            call(
                "0.0",
                CallVariant::DelegateCall,
                proxy,
                implementation,
                vec![log("0.0.0"), TraceEntry::Log(explicit_log)],
            ),
            call("0.1", CallVariant::Call, proxy, token, vec![log("0.1.0")]),
        ],
    );

    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();
    let children: Vec<_> = trace.children(ROOT).collect();

    assert_eq!(children[0].logs[0].address, proxy);
    assert_eq!(children[0].logs[1].address, explicit);
    assert_eq!(children[1].logs[0].address, token);
}

#[test]
fn test_transaction_hash_is_stamped() {
    let hash = B256::repeat_byte(0x42);
    let root = raw_call("0", CallVariant::Call, addr(0x01), addr(0x02), vec![log("0.0")]);

    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table)
        .with_transaction_hash(Some(hash))
        .normalize(&root)
        .unwrap();

    assert_eq!(trace.root().logs[0].transaction_hash, Some(hash));
}

#[test]
fn test_node_fields_are_canonical() {
    let mut root = raw_call("0", CallVariant::Call, addr(0xab), addr(0x02), vec![]);
    root.from = root.from.to_lowercase();
    root.input = String::new();
    root.output = "0xdeadbeef".to_string();
    root.value = "0x10".to_string();
    root.status = 0;

    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();
    let node = trace.root();

    assert_eq!(node.from, addr(0xab));
    assert_eq!(node.calldata, Bytes::new());
    assert_eq!(node.returndata, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
    assert_eq!(node.value, U256::from(16));
    assert_eq!(node.codehash, None);
    assert!(node.failed);
}

#[test]
fn test_malformed_address_aborts_pass() {
    let mut child = raw_call("0.1", CallVariant::Call, addr(0x02), addr(0x03), vec![]);
    child.to = "0xnot-an-address".to_string();

    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        addr(0x02),
        vec![log("0.0"), TraceEntry::Call(child)],
    );

    let table = DescriptorTable::new();
    let err = TraceNormalizer::new(&table).normalize(&root).unwrap_err();
    match err {
        NormalizeError::InvalidAddress { path, field, .. } => {
            assert_eq!(path, "0.1");
            assert_eq!(field, "to");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_bad_checksum_is_rejected() {
    let mut root = raw_call("0", CallVariant::Call, addr(0x01), addr(0x02), vec![]);
    root.from = "0xD8dA6BF26964aF9D7eEd9e03E53415D37aA96045".to_string();

    let table = DescriptorTable::new();
    let result = TraceNormalizer::new(&table).normalize(&root);
    assert!(matches!(result, Err(NormalizeError::InvalidAddress { field: "from", .. })));
}

#[test]
fn test_malformed_topic_aborts_pass() {
    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        addr(0x02),
        vec![TraceEntry::Log(RawLogNode {
            path: "0.0".into(),
            topics: vec!["0x1234".to_string()],
            ..Default::default()
        })],
    );

    let table = DescriptorTable::new();
    let result = TraceNormalizer::new(&table).normalize(&root);
    assert!(matches!(result, Err(NormalizeError::InvalidWord { field: "topics", .. })));
}

#[test]
fn test_storage_entries_are_skipped() {
    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        addr(0x02),
        vec![
            TraceEntry::Sload(RawSloadNode {
                path: "0.0".into(),
                slot: "0x00".to_string(),
                value: "0x01".to_string(),
            }),
            log("0.1"),
            TraceEntry::Sstore(RawSstoreNode {
                path: "0.2".into(),
                slot: "0x00".to_string(),
                old_value: "0x01".to_string(),
                new_value: "0x02".to_string(),
            }),
            call("0.3", CallVariant::StaticCall, addr(0x02), addr(0x03), vec![]),
        ],
    );

    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();

    assert_eq!(trace.root().child_order, vec![ChildOrder::Log(0), ChildOrder::Call(0)]);
    trace.check_invariants().unwrap();
}

#[test]
fn test_ordered_members_reproduce_original_order() {
    let original = vec![
        log("0.0"),
        call("0.1", CallVariant::Call, addr(0x02), addr(0x03), vec![log("0.1.0")]),
        log("0.2"),
        log("0.3"),
        call("0.4", CallVariant::DelegateCall, addr(0x02), addr(0x04), vec![]),
        call("0.5", CallVariant::Create, addr(0x02), addr(0x05), vec![]),
        log("0.6"),
    ];
    let root = raw_call("0", CallVariant::Call, addr(0x01), addr(0x02), original.clone());

    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();

    let rebuilt: Vec<PathId> = trace
        .ordered_members(ROOT)
        .into_iter()
        .map(|member| match member {
            OrderedMember::Log(log) => log.path.clone(),
            OrderedMember::Call(call) => call.id.clone(),
        })
        .collect();
    assert_eq!(rebuilt, paths(&original));
}

#[test]
fn test_collect_logs_depth_first() {
    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        addr(0x02),
        vec![
            call(
                "0.0",
                CallVariant::Call,
                addr(0x02),
                addr(0x03),
                vec![
                    call("0.0.0", CallVariant::Call, addr(0x03), addr(0x04), vec![log("0.0.0.0")]),
                    log("0.0.1"),
                ],
            ),
            log("0.1"),
            call("0.2", CallVariant::Call, addr(0x02), addr(0x05), vec![log("0.2.0")]),
        ],
    );

    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table).normalize(&root).unwrap();

    let immediate: Vec<_> = trace.collect_logs(ROOT, false).iter().map(|log| log.path.clone()).collect();
    assert_eq!(immediate, vec![PathId::new("0.1")]);

    let recursive: Vec<_> = trace.collect_logs(ROOT, true).iter().map(|log| log.path.clone()).collect();
    assert_eq!(
        recursive,
        vec![
            PathId::new("0.1"),
            PathId::new("0.0.1"),
            PathId::new("0.0.0.0"),
            PathId::new("0.2.0"),
        ]
    );
}

#[test]
fn test_log_flattener_recursive_mode() {
    let root = raw_call(
        "0",
        CallVariant::Call,
        addr(0x01),
        addr(0x02),
        vec![
            call("0.0", CallVariant::Call, addr(0x02), addr(0x03), vec![log("0.0.0")]),
            log("0.1"),
            call("0.2", CallVariant::DelegateCall, addr(0x02), addr(0x04), vec![log("0.2.0")]),
        ],
    );

    let mut flattener = LogFlattener::new(None);
    let records = flattener.flatten(&root, addr(0x02), true).unwrap();

    let order: Vec<_> = records.iter().map(|log| (log.index, log.path.clone(), log.address)).collect();
    assert_eq!(
        order,
        vec![
            (0, PathId::new("0.1"), addr(0x02)),
            (1, PathId::new("0.0.0"), addr(0x03)),
            (2, PathId::new("0.2.0"), addr(0x02)),
        ]
    );
    assert_eq!(flattener.indexer().len(), 3);
}

#[test]
fn test_deep_trace_does_not_overflow() {
    let depth = 2_000;
    let mut node = raw_call("leaf", CallVariant::DelegateCall, addr(0x02), addr(0x03), vec![log("leaf.0")]);
    for level in (0..depth).rev() {
        let path = format!("level{level}");
        node = raw_call(&path, CallVariant::DelegateCall, addr(0x02), addr(0x03), vec![TraceEntry::Call(node)]);
    }

    let descriptor = Arc::new(InterfaceDescriptor::parse(["function foo()"]).unwrap());
    let table = DescriptorTable::new();
    let trace = TraceNormalizer::new(&table)
        .normalize_from(&node, Some(descriptor))
        .unwrap();

    assert_eq!(trace.len(), depth + 1);
    assert_eq!(trace.log_count(), 1);
    assert!(trace.nodes().last().unwrap().abi.has_function("foo"));
    trace.check_invariants().unwrap();
}

fn nested_response_json(depth: usize) -> String {
    let from = addr(0x11).to_checksum(None);
    let to = addr(0x22).to_checksum(None);
    let mut path = PathId::root();
    let mut json = String::from(r#"{"chain":"ethereum","txhash":"0x","entrypoint":"#);
    for level in 0..depth {
        let tag = if level == 0 { "" } else { r#""type":"call","# };
        json.push_str(&format!(
            r#"{{{tag}"path":"{path}","variant":"call","from":"{from}","to":"{to}","status":1,"children":["#
        ));
        path = path.child(0);
    }
    for _ in 0..depth {
        json.push_str("]}");
    }
    json.push('}');
    json
}

#[test]
fn test_deep_response_parses_and_normalizes() {
    let depth = 1_024;
    let json = nested_response_json(depth);

    let err = serde_json::from_str::<TraceResponse>(&json).unwrap_err();
    assert!(err.to_string().contains("recursion limit"));

    let response = TraceResponse::from_json(&json).unwrap();
    let table = DescriptorTable::from_address_infos(&response.addresses).unwrap();
    let trace = TraceNormalizer::new(&table).normalize(&response.entrypoint).unwrap();

    assert_eq!(trace.len(), depth);
    let leaf = format!("0{}", ".0".repeat(depth - 1));
    assert_eq!(trace.nodes().last().unwrap().id.as_str(), leaf);
    trace.check_invariants().unwrap();
}
