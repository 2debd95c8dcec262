//! Schedule construction for depthwise separable convolutions.
//!
//! The scheduler walks a computation graph from its declared outputs,
//! inlines the one-to-one epilogue stages, and builds the staged,
//! hierarchy-bound schedule for the single depthwise-convolution node the
//! graph contains: input and filter travel global → shared → local, the
//! convolution accumulates in registers, and the output axes are split and
//! bound across blocks, virtual threads, and the T×T physical threads.

use log::{debug, trace};
use rustc_hash::FxHashSet;

use super::stage::{BindTarget, Placement};
use super::tiling::Tiling;
use super::{Schedule, ScheduleError};
use crate::graph::{Graph, GraphOp, NodeId};

/// Builds the schedule for one graph.
///
/// Create one scheduler per invocation; [`run`](DepthwiseScheduler::run)
/// consumes it and returns the finished schedule, so no state outlives a
/// single graph.
pub struct DepthwiseScheduler<'a> {
    graph: &'a Graph,
    sched: Schedule,
    visited: FxHashSet<NodeId>,
    conv: Option<NodeId>,
}

/// Builds a schedule for a graph holding one depthwise convolution and an
/// optional elementwise/scale-shift epilogue chain.
pub fn schedule_depthwise_conv2d(graph: &Graph) -> Result<Schedule, ScheduleError> {
    DepthwiseScheduler::new(graph).run()
}

impl<'a> DepthwiseScheduler<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        DepthwiseScheduler {
            graph,
            sched: Schedule::new(graph.output_ids()),
            visited: FxHashSet::default(),
            conv: None,
        }
    }

    /// Runs traversal and schedule construction, consuming the scheduler.
    pub fn run(mut self) -> Result<Schedule, ScheduleError> {
        for root in self.graph.output_ids() {
            self.visit(root, root)?;
        }
        if self.conv.is_none() {
            return Err(ScheduleError::NoConvolution);
        }
        trace!("schedule:\n{}", self.sched.dump());
        Ok(self.sched)
    }

    /// Traversal and fusion classification.
    ///
    /// One-to-one stages are inlined and recursed through; the convolution
    /// stops the recursion and triggers staging and binding. Anything else
    /// is a hard error.
    fn visit(&mut self, id: NodeId, root: NodeId) -> Result<(), ScheduleError> {
        if !self.visited.insert(id) {
            return Ok(());
        }
        let node = self.graph.node(id);
        match node.op {
            GraphOp::Elementwise(_) | GraphOp::ScaleShift => {
                if self.sched.is_root(id) {
                    // The declared output anchors the hardware binding and
                    // is never inlined, even though it is elementwise.
                    trace!("keeping root {} node {id:?} materialized", node.op.label());
                    self.sched
                        .add_compute_stage(id, node.op.label(), Placement::Root, &node.shape);
                } else {
                    debug!("inlining {} node {id:?}", node.op.label());
                    self.sched.compute_inline(id, node.op.label(), &node.shape);
                }
                for src in &node.src {
                    if !self.graph.node(*src).is_leaf() {
                        self.visit(*src, root)?;
                    }
                }
                Ok(())
            }
            GraphOp::DepthwiseConv2d { .. } => self.schedule_conv(id, root),
            op => Err(ScheduleError::UnsupportedNode { node: id, op }),
        }
    }

    /// Staging and hierarchy binding for the matched convolution.
    fn schedule_conv(&mut self, conv: NodeId, root: NodeId) -> Result<(), ScheduleError> {
        assert!(
            self.conv.is_none(),
            "graph contains more than one depthwise convolution"
        );
        self.conv = Some(conv);

        let conv_node = self.graph.node(conv);
        let padded = conv_node.src[0];
        let filter = conv_node.src[1];
        let pad_shape = self.graph.shape(padded);
        let filter_shape = self.graph.shape(filter);
        let out_shape = conv_node.shape;

        let channels = out_shape[1];
        let multiplier = filter_shape[1];
        if multiplier == 0 || channels % multiplier != 0 {
            return Err(ScheduleError::ChannelMultiplierMismatch {
                channels,
                multiplier,
            });
        }

        let tiling = Tiling::for_output(out_shape[2], out_shape[3]);
        debug!(
            "scheduling conv {conv:?}: {}x{} output, tiling {tiling:?}",
            out_shape[2], out_shape[3]
        );

        // Staging. Padding is a pure index function, so it folds into the
        // shared fetch; the padded tensor never reaches global memory.
        self.sched.compute_inline(padded, "pad", &pad_shape);
        let input_shared =
            self.sched
                .cache_read_node(padded, Placement::Shared, "input.shared", &pad_shape);
        let filter_shared =
            self.sched
                .cache_read_node(filter, Placement::Shared, "filter.shared", &filter_shape);
        let input_local = self
            .sched
            .cache_read_stage(input_shared, Placement::Local, "input.local");
        let filter_local = self
            .sched
            .cache_read_stage(filter_shared, Placement::Local, "filter.local");

        // Accumulation target: straight into the output buffer when the
        // convolution is itself a declared output, otherwise into registers
        // that the inlined epilogue consumes.
        let (anchor, accum) = if self.sched.is_root(conv) {
            let out = self.sched.add_compute_stage(
                conv,
                "depthwise_conv2d",
                Placement::Root,
                &out_shape,
            );
            let local = self
                .sched
                .cache_write(conv, "depthwise_conv2d.local", &out_shape);
            (out, local)
        } else {
            let local = self.sched.add_compute_stage(
                conv,
                "depthwise_conv2d",
                Placement::Local,
                &out_shape,
            );
            (self.sched.node_stage[&root], local)
        };

        // Hierarchy binding over the anchor's [batch, channel, h, w] axes.
        let s = self.sched.stage_mut(anchor);
        let batch = s.axis(0);
        let channel = s.axis(1);
        let height = s.axis(2);
        let width = s.axis(3);

        // Channel splits into (channel-block, multiplier-unit); the
        // multiplier unit moves innermost so each thread's innermost work is
        // one contiguous unit. Batch and channel-block fuse into grid x.
        let (cblock, mult) = s.split(channel, multiplier);
        s.reorder(&[height, width, mult]);
        let bx = s.fuse(batch, cblock);
        s.bind(bx, BindTarget::BlockX);

        // Spatial tiling: block tile, then virtual threads, then physical
        // threads, leaving the per-thread remainders innermost.
        let (by1, row_tile) = s.split(height, tiling.block_h);
        let (tvx, vx_rest) = s.split_nparts(row_tile, tiling.vthread_h);
        let (tx, row_rem) = s.split_nparts(vx_rest, tiling.num_thread);
        let (by2, col_tile) = s.split(width, tiling.block_w);
        let (tvy, vy_rest) = s.split_nparts(col_tile, tiling.vthread_w);
        let (ty, col_rem) = s.split_nparts(vy_rest, tiling.num_thread);

        // Virtual threads outermost among per-block work: each owns a
        // disjoint spatial sub-tile.
        s.reorder(&[by1, by2, tvx, tvy, tx, ty, row_rem, col_rem]);
        let by = s.fuse(by1, by2);
        s.bind(tvx, BindTarget::VThreadX);
        s.bind(tvy, BindTarget::VThreadY);
        s.bind(tx, BindTarget::ThreadX);
        s.bind(ty, BindTarget::ThreadY);
        s.bind(by, BindTarget::BlockY);

        // Register stages recompute at each (block, vthread, thread): no
        // cross-thread aliasing, no synchronization.
        self.sched.compute_at(input_local, anchor, ty);
        self.sched.compute_at(filter_local, anchor, ty);
        self.sched.compute_at(accum, anchor, ty);

        // Shared fills happen once per block. Splitting the staged tensor's
        // spatial axes by the same thread count as the anchor keeps the
        // cooperative fetch disjoint and the write->read barrier valid.
        self.sched.compute_at(input_shared, anchor, by);
        let is = self.sched.stage_mut(input_shared);
        let (is_tx, _) = is.split_nparts(is.axis(2), tiling.num_thread);
        let (is_ty, _) = is.split_nparts(is.axis(3), tiling.num_thread);
        is.bind(is_tx, BindTarget::ThreadX);
        is.bind(is_ty, BindTarget::ThreadY);

        self.sched.compute_at(filter_shared, anchor, by);
        let fs = self.sched.stage_mut(filter_shared);
        // Within-kernel spatial axes ahead of the multiplier axis, matching
        // the order the local stage re-reads the filter in.
        fs.reorder(&[fs.axis(2), fs.axis(3), fs.axis(1)]);
        let (fs_tx, _) = fs.split_nparts(fs.axis(2), tiling.num_thread);
        let (fs_ty, _) = fs.split_nparts(fs.axis(3), tiling.num_thread);
        fs.bind(fs_tx, BindTarget::ThreadX);
        fs.bind(fs_ty, BindTarget::ThreadY);

        Ok(())
    }
}
