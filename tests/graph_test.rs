use weft::graph::{DType, Graph, GraphOp, MapOp};

#[test]
fn test_graph_new() {
    let graph = Graph::new();
    assert!(graph.nodes.borrow().is_empty());
    assert!(graph.inputs.borrow().is_empty());
    assert!(graph.outputs.borrow().is_empty());
}

#[test]
fn test_input_registration() {
    let graph = Graph::new();
    let x = graph.input(DType::F32, vec![1, 8, 32, 32]);
    assert_eq!(*graph.inputs.borrow(), vec![x]);
    assert_eq!(graph.node(x).op, GraphOp::Input);
    assert_eq!(graph.shape(x), vec![1, 8, 32, 32]);
}

#[test]
fn test_separable_block_shapes() {
    // The canonical supported pattern: pad, depthwise conv, scale_shift,
    // relu. Shapes must flow through unchanged except for the channel
    // multiplier.
    let graph = Graph::new();
    let x = graph.input(DType::F32, vec![2, 16, 64, 64]);
    let padded = graph.pad2d(x, 1, 1);
    let filter = graph.input(DType::F32, vec![16, 4, 3, 3]);
    let conv = graph.depthwise_conv2d(padded, filter, (1, 1));
    let scale = graph.input(DType::F32, vec![64]);
    let shift = graph.input(DType::F32, vec![64]);
    let ss = graph.scale_shift(conv, scale, shift);
    let out = graph.relu(ss);
    graph.mark_output(out);

    assert_eq!(graph.shape(padded), vec![2, 16, 66, 66]);
    assert_eq!(graph.shape(conv), vec![2, 64, 64, 64]);
    assert_eq!(graph.shape(out), vec![2, 64, 64, 64]);
    assert_eq!(graph.node(out).op, GraphOp::Elementwise(MapOp::Relu));
    assert_eq!(graph.node(conv).src, vec![padded, filter]);
    assert_eq!(graph.output_ids(), vec![out]);
}

#[test]
fn test_producers_precede_consumers() {
    let graph = Graph::new();
    let x = graph.input(DType::F32, vec![1, 4, 8, 8]);
    let y = graph.relu(x);
    let z = graph.add(y, x);
    for (src, node) in [(x, y), (y, z), (x, z)] {
        assert!(src < node, "arena order must follow dependency order");
    }
}

#[test]
fn test_graph_clone_compares_equal() {
    let graph = Graph::new();
    let x = graph.input(DType::F32, vec![1, 4, 8, 8]);
    graph.mark_output(graph.relu(x));
    let copy = graph.clone();
    assert_eq!(graph, copy);
}
