use crate::graph::{dtype::DType, op::GraphOp};

/// A unique identifier for a node within a `Graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// The data associated with a single node in the computation graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// The operation performed by this node.
    pub op: GraphOp,
    /// The `NodeId`s of the input nodes to this operation.
    pub src: Vec<NodeId>,
    /// The data type of the tensor produced by this node.
    pub dtype: DType,
    /// The concrete extents of the tensor, NCHW order for 4-D tensors.
    pub shape: Vec<usize>,
}

impl NodeData {
    /// Returns `true` if the node has no producers (an external tensor).
    pub fn is_leaf(&self) -> bool {
        self.src.is_empty()
    }
}
