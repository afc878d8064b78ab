//! End-to-end coverage for the delegate's lifecycle scenarios, run against the in-memory
//! mock host and the native reference target -- no real TFLite runtime or OpenVINO install
//! involved.

use openvino_delegate_core::config::DelegateOptions;
use openvino_delegate_core::host::mock::{MockContext, MockNode, MockTensor};
use openvino_delegate_core::host::{AllocationClass, DelegateSubgraph};
use openvino_delegate_core::layout::FusedActivation;
use openvino_delegate_core::ops::OpAttributes;
use openvino_delegate_core::probe;
use openvino_delegate_core::target::native::NativeCore;
use openvino_delegate_core::types::SourceType;
use openvino_delegate_core::Delegate;

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn f32_values(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

/// Single Logistic node, input [1,1,1,1] = 0.5, expect sigmoid(0.5) ≈ 0.6225.
fn single_logistic_host() -> (MockContext, DelegateSubgraph) {
    let mut host = MockContext::new();
    host.add_tensor(MockTensor::new(0, SourceType::F32, vec![1, 1, 1, 1], AllocationClass::Dynamic, None, "in"));
    host.add_tensor(MockTensor::new(1, SourceType::F32, vec![1, 1, 1, 1], AllocationClass::Dynamic, None, "out"));
    host.add_node(MockNode {
        id: 0,
        op_kind: "LOGISTIC".to_string(),
        inputs: vec![0],
        outputs: vec![1],
        attributes: OpAttributes::Activation,
    });
    let subgraph = DelegateSubgraph { node_ids: vec![0], input_tensors: vec![0], output_tensors: vec![1] };
    (host, subgraph)
}

#[test]
fn s1_single_logistic_matches_sigmoid_of_one_half() {
    let (host, subgraph) = single_logistic_host();
    assert!(probe::is_node_supported(&host, 0));

    let mut delegate = Delegate::new(NativeCore::new(), DelegateOptions::default());
    delegate.init(&host, &subgraph).unwrap();

    host.tensor(0).unwrap().set_data(f32_bytes(&[0.5]));
    delegate.eval(&host).unwrap();

    let out = f32_values(&host.tensor(1).unwrap().data().unwrap());
    assert_eq!(out.len(), 1);
    assert!((out[0] - 0.622_459_3).abs() < 1e-4);
}

fn add_subgraph_host() -> (MockContext, DelegateSubgraph) {
    let mut host = MockContext::new();
    host.add_tensor(MockTensor::new(0, SourceType::F32, vec![1, 4], AllocationClass::Dynamic, None, "a"));
    host.add_tensor(MockTensor::new(
        1,
        SourceType::F32,
        vec![1, 4],
        AllocationClass::MmapRo,
        Some(f32_bytes(&[10.0, 20.0, 30.0, 40.0])),
        "b",
    ));
    host.add_tensor(MockTensor::new(2, SourceType::F32, vec![1, 4], AllocationClass::Dynamic, None, "out"));
    host.add_node(MockNode {
        id: 0,
        op_kind: "ADD".to_string(),
        inputs: vec![0, 1],
        outputs: vec![2],
        attributes: OpAttributes::BinaryElementwise { activation: FusedActivation::None },
    });
    let subgraph = DelegateSubgraph { node_ids: vec![0], input_tensors: vec![0], output_tensors: vec![2] };
    (host, subgraph)
}

#[test]
fn s2_add_of_two_parameters() {
    let (host, subgraph) = add_subgraph_host();
    let mut delegate = Delegate::new(NativeCore::new(), DelegateOptions::default());
    delegate.init(&host, &subgraph).unwrap();

    host.tensor(0).unwrap().set_data(f32_bytes(&[1.0, 2.0, 3.0, 4.0]));
    delegate.eval(&host).unwrap();

    let out = f32_values(&host.tensor(2).unwrap().data().unwrap());
    assert_eq!(out, vec![11.0, 22.0, 33.0, 44.0]);
}

/// First Init writes the cache artifacts; a second delegate configured against the same
/// cache dir/token loads from cache (no fresh graph traversal) and produces the same output.
#[test]
fn s4_cache_hit_reproduces_output_on_second_init() {
    let dir = tempfile::tempdir().unwrap();
    let options = DelegateOptions { cache_dir: Some(dir.path().to_path_buf()), model_token: Some("m".to_string()) };

    let (host, subgraph) = add_subgraph_host();
    let mut first = Delegate::new(NativeCore::new(), options.clone());
    first.init(&host, &subgraph).unwrap();

    let xml = dir.path().join("m.xml");
    let bin = dir.path().join("m.bin");
    assert!(xml.exists(), "expected cached artifact at {}", xml.display());
    assert!(bin.exists(), "expected cached artifact at {}", bin.display());

    host.tensor(0).unwrap().set_data(f32_bytes(&[1.0, 2.0, 3.0, 4.0]));
    first.eval(&host).unwrap();
    let first_out = f32_values(&host.tensor(2).unwrap().data().unwrap());

    let (host2, subgraph2) = add_subgraph_host();
    let mut second = Delegate::new(NativeCore::new(), options);
    second.init(&host2, &subgraph2).unwrap();

    host2.tensor(0).unwrap().set_data(f32_bytes(&[1.0, 2.0, 3.0, 4.0]));
    second.eval(&host2).unwrap();
    let second_out = f32_values(&host2.tensor(2).unwrap().data().unwrap());

    assert_eq!(first_out, second_out);
    assert_eq!(second_out, vec![11.0, 22.0, 33.0, 44.0]);
}

/// A model with one supported Add and one op outside §6: the probe accepts the Add and
/// rejects the other, so a host-side partitioner would delegate only the Add.
#[test]
fn s5_unsupported_op_is_excluded_from_the_partition() {
    let mut host = MockContext::new();
    host.add_tensor(MockTensor::new(0, SourceType::F32, vec![1, 4], AllocationClass::Dynamic, None, "a"));
    host.add_tensor(MockTensor::new(
        1,
        SourceType::F32,
        vec![1, 4],
        AllocationClass::MmapRo,
        Some(f32_bytes(&[10.0, 20.0, 30.0, 40.0])),
        "b",
    ));
    host.add_tensor(MockTensor::new(2, SourceType::F32, vec![1, 4], AllocationClass::Dynamic, None, "sum"));
    host.add_tensor(MockTensor::new(3, SourceType::F32, vec![1, 4], AllocationClass::Dynamic, None, "strided_out"));
    host.add_node(MockNode {
        id: 0,
        op_kind: "ADD".to_string(),
        inputs: vec![0, 1],
        outputs: vec![2],
        attributes: OpAttributes::BinaryElementwise { activation: FusedActivation::None },
    });
    host.add_node(MockNode {
        id: 1,
        op_kind: "STRIDED_SLICE".to_string(),
        inputs: vec![2],
        outputs: vec![3],
        attributes: OpAttributes::None,
    });

    assert!(probe::is_node_supported(&host, 0));
    assert!(!probe::is_node_supported(&host, 1));
}

/// Softmax with beta != 1.0 is rejected by the probe (§4.3/§6): the translator is never
/// reached for it.
#[test]
fn s6_softmax_with_non_unit_beta_is_rejected_by_probe() {
    let mut host = MockContext::new();
    host.add_tensor(MockTensor::new(0, SourceType::F32, vec![1, 4], AllocationClass::Dynamic, None, "in"));
    host.add_node(MockNode {
        id: 0,
        op_kind: "SOFTMAX".to_string(),
        inputs: vec![0],
        outputs: vec![1],
        attributes: OpAttributes::Softmax { beta: 2.0 },
    });
    assert!(!probe::is_node_supported(&host, 0));
}
