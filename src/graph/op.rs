/// An elementwise map applied point-for-point to its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOp {
    Relu,
    Neg,
    Add,
    Mul,
}

/// An enumeration of all tensor operations the scheduler can encounter.
///
/// The set is closed: classification during traversal is a `match` over these
/// variants, and anything outside the supported subset is rejected with a
/// hard error instead of silently falling through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphOp {
    /// An input tensor to the graph.
    Input,
    /// Zero padding of the two spatial axes of an NCHW tensor.
    ///
    /// Padding is a pure index function; the scheduler never materializes
    /// the padded tensor and instead fuses it into the staged fetch of its
    /// consumer.
    Pad2d { pad_h: usize, pad_w: usize },
    /// A one-to-one elementwise map (e.g. relu).
    Elementwise(MapOp),
    /// Per-channel affine transform `x * scale + shift` (bias addition or a
    /// folded batch-norm).
    ScaleShift,
    /// A depthwise 2-D convolution: each input channel is convolved with its
    /// own filter slice, `channel_multiplier` times, with no summation
    /// across channels. Operands are the padded input and the filter, whose
    /// shape is `[channels, channel_multiplier, kernel_h, kernel_w]`.
    DepthwiseConv2d { stride: (usize, usize) },
    /// A reduction along one axis. Upstream graphs may contain it, but the
    /// depthwise schedule does not cover it.
    Reduce(usize),
}

impl GraphOp {
    /// Returns `true` if the operation is a one-to-one elementwise map.
    pub fn is_elementwise(&self) -> bool {
        matches!(self, GraphOp::Elementwise(_))
    }

    /// Returns `true` if the operation is a per-channel scale/shift.
    pub fn is_scale_shift(&self) -> bool {
        matches!(self, GraphOp::ScaleShift)
    }

    /// Returns `true` if the operation is a depthwise convolution.
    pub fn is_depthwise_conv(&self) -> bool {
        matches!(self, GraphOp::DepthwiseConv2d { .. })
    }

    /// Short lowercase label used in stage names and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            GraphOp::Input => "input",
            GraphOp::Pad2d { .. } => "pad2d",
            GraphOp::Elementwise(MapOp::Relu) => "relu",
            GraphOp::Elementwise(MapOp::Neg) => "neg",
            GraphOp::Elementwise(MapOp::Add) => "add",
            GraphOp::Elementwise(MapOp::Mul) => "mul",
            GraphOp::ScaleShift => "scale_shift",
            GraphOp::DepthwiseConv2d { .. } => "depthwise_conv2d",
            GraphOp::Reduce(_) => "reduce",
        }
    }
}
