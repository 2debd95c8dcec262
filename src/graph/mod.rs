//! The computation-graph interface the scheduler reads.
//!
//! This is a minimal mirror of the upstream tensor language: an arena of
//! immutable nodes addressed by [`NodeId`], with just enough constructors to
//! express the pattern the depthwise schedule supports (inputs, padding, the
//! convolution itself, and elementwise/scale-shift epilogues). The scheduler
//! never mutates a graph; it only walks it.

mod dtype;
mod node;
mod op;

pub use dtype::DType;
pub use node::{NodeData, NodeId};
pub use op::{GraphOp, MapOp};

use std::cell::RefCell;

/// Owns all the nodes of a computation graph.
///
/// The `Graph` uses interior mutability (`RefCell`) so nodes can be added
/// through `&self` while construction code holds multiple `NodeId` handles.
/// Producers must exist before their consumers, so the arena is acyclic by
/// construction.
#[derive(Default, Debug)]
pub struct Graph {
    /// A vector holding the data for all nodes in the graph.
    pub nodes: RefCell<Vec<NodeData>>,
    /// Node IDs that are external inputs to the graph.
    pub inputs: RefCell<Vec<NodeId>>,
    /// Node IDs declared as graph outputs (schedule roots).
    pub outputs: RefCell<Vec<NodeId>>,
}

impl Graph {
    /// Creates a new, empty computation graph.
    pub fn new() -> Self {
        Graph::default()
    }

    /// Adds a new node to the graph.
    ///
    /// This is the raw entry point; the typed constructors below infer
    /// shapes and should be preferred. It is public so malformed graphs can
    /// be built in tests of the scheduler's validation paths.
    pub fn add_node(
        &self,
        op: GraphOp,
        src: Vec<NodeId>,
        dtype: DType,
        shape: Vec<usize>,
    ) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.len();
        nodes.push(NodeData {
            op,
            src,
            dtype,
            shape,
        });
        NodeId(id)
    }

    /// Adds a new input node to the graph.
    pub fn input(&self, dtype: DType, shape: Vec<usize>) -> NodeId {
        let id = self.add_node(GraphOp::Input, vec![], dtype, shape);
        self.inputs.borrow_mut().push(id);
        id
    }

    /// Declares a node as a graph output (a schedule root).
    pub fn mark_output(&self, id: NodeId) {
        self.outputs.borrow_mut().push(id);
    }

    /// Returns a clone of the data for a node.
    pub fn node(&self, id: NodeId) -> NodeData {
        self.nodes.borrow()[id.0].clone()
    }

    /// Returns the shape of a node.
    pub fn shape(&self, id: NodeId) -> Vec<usize> {
        self.nodes.borrow()[id.0].shape.clone()
    }

    /// Declared outputs of the graph.
    pub fn output_ids(&self) -> Vec<NodeId> {
        self.outputs.borrow().clone()
    }

    /// Zero-pads the two spatial axes of an NCHW tensor, symmetrically.
    pub fn pad2d(&self, src: NodeId, pad_h: usize, pad_w: usize) -> NodeId {
        let (dtype, shape) = {
            let nodes = self.nodes.borrow();
            let src_node = &nodes[src.0];
            (src_node.dtype, src_node.shape.clone())
        };
        assert_eq!(shape.len(), 4, "pad2d expects an NCHW tensor");
        let padded = vec![
            shape[0],
            shape[1],
            shape[2] + 2 * pad_h,
            shape[3] + 2 * pad_w,
        ];
        self.add_node(GraphOp::Pad2d { pad_h, pad_w }, vec![src], dtype, padded)
    }

    /// Depthwise 2-D convolution of a padded NCHW input with a
    /// `[channels, multiplier, kernel_h, kernel_w]` filter.
    pub fn depthwise_conv2d(
        &self,
        padded: NodeId,
        filter: NodeId,
        stride: (usize, usize),
    ) -> NodeId {
        let (dtype, in_shape, f_shape) = {
            let nodes = self.nodes.borrow();
            let in_node = &nodes[padded.0];
            let f_node = &nodes[filter.0];
            (in_node.dtype, in_node.shape.clone(), f_node.shape.clone())
        };
        assert_eq!(in_shape.len(), 4, "depthwise_conv2d expects an NCHW input");
        assert_eq!(f_shape.len(), 4, "filter must be [C, M, KH, KW]");
        if in_shape[1] != f_shape[0] {
            panic!(
                "channel mismatch in depthwise_conv2d: input has {} channels, filter {}",
                in_shape[1], f_shape[0]
            );
        }
        let out_h = (in_shape[2] - f_shape[2]) / stride.0 + 1;
        let out_w = (in_shape[3] - f_shape[3]) / stride.1 + 1;
        let out_shape = vec![in_shape[0], in_shape[1] * f_shape[1], out_h, out_w];
        self.add_node(
            GraphOp::DepthwiseConv2d { stride },
            vec![padded, filter],
            dtype,
            out_shape,
        )
    }

    /// Unary elementwise map over one tensor.
    pub fn map(&self, op: MapOp, src: NodeId) -> NodeId {
        let (dtype, shape) = {
            let nodes = self.nodes.borrow();
            let src_node = &nodes[src.0];
            (src_node.dtype, src_node.shape.clone())
        };
        self.add_node(GraphOp::Elementwise(op), vec![src], dtype, shape)
    }

    /// Rectified linear unit.
    pub fn relu(&self, src: NodeId) -> NodeId {
        self.map(MapOp::Relu, src)
    }

    /// Elementwise addition of two tensors of identical shape.
    pub fn add(&self, lhs: NodeId, rhs: NodeId) -> NodeId {
        let (dtype, lhs_shape, rhs_shape) = {
            let nodes = self.nodes.borrow();
            let lhs_node = &nodes[lhs.0];
            let rhs_node = &nodes[rhs.0];
            (lhs_node.dtype, lhs_node.shape.clone(), rhs_node.shape.clone())
        };
        if lhs_shape != rhs_shape {
            panic!("shape mismatch in add: {lhs_shape:?} vs {rhs_shape:?}");
        }
        self.add_node(
            GraphOp::Elementwise(MapOp::Add),
            vec![lhs, rhs],
            dtype,
            lhs_shape,
        )
    }

    /// Per-channel affine `x * scale + shift`, with `scale` and `shift`
    /// one-dimensional tensors over the channel axis.
    pub fn scale_shift(&self, src: NodeId, scale: NodeId, shift: NodeId) -> NodeId {
        let (dtype, shape, scale_shape, shift_shape) = {
            let nodes = self.nodes.borrow();
            let src_node = &nodes[src.0];
            (
                src_node.dtype,
                src_node.shape.clone(),
                nodes[scale.0].shape.clone(),
                nodes[shift.0].shape.clone(),
            )
        };
        assert_eq!(shape.len(), 4, "scale_shift expects an NCHW tensor");
        if scale_shape != [shape[1]] || shift_shape != [shape[1]] {
            panic!(
                "scale/shift must be [{}], got {scale_shape:?} and {shift_shape:?}",
                shape[1]
            );
        }
        self.add_node(GraphOp::ScaleShift, vec![src, scale, shift], dtype, shape)
    }

    /// Sum-reduction along one axis. The depthwise schedule rejects this op;
    /// it exists because upstream graphs are not limited to what this crate
    /// can schedule.
    pub fn sum(&self, src: NodeId, axis: usize) -> NodeId {
        let (dtype, mut shape) = {
            let nodes = self.nodes.borrow();
            let src_node = &nodes[src.0];
            (src_node.dtype, src_node.shape.clone())
        };
        assert!(axis < shape.len(), "reduction axis out of bounds");
        shape.remove(axis);
        self.add_node(GraphOp::Reduce(axis), vec![src], dtype, shape)
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        *self.nodes.borrow() == *other.nodes.borrow()
            && *self.inputs.borrow() == *other.inputs.borrow()
            && *self.outputs.borrow() == *other.outputs.borrow()
    }
}

impl Clone for Graph {
    fn clone(&self) -> Self {
        Graph {
            nodes: RefCell::new(self.nodes.borrow().clone()),
            inputs: RefCell::new(self.inputs.borrow().clone()),
            outputs: RefCell::new(self.outputs.borrow().clone()),
        }
    }
}
