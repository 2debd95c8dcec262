//! Schedule representation and construction.
//!
//! A [`Schedule`] is built fresh for every invocation: an arena of [`Stage`]
//! records addressed by [`StageId`], one per materialization point, plus the
//! map from graph nodes to the stage that places them. Anchors between
//! stages ("compute-at") are stored as index pairs, never references, so the
//! structure is a plain acyclic value that can be compared, cloned, and
//! handed to a code generator.

mod depthwise;
mod launch;
mod stage;
mod tiling;

pub use depthwise::{schedule_depthwise_conv2d, DepthwiseScheduler};
pub use launch::LaunchSpec;
pub use stage::{
    AxisId, AxisOrigin, BindTarget, CacheSource, IterVar, Placement, Stage, StageId, StageRole,
};
pub use tiling::Tiling;

use crate::graph::{GraphOp, NodeId};
use rustc_hash::FxHashMap;
use std::fmt;

/// Schedule-construction errors.
///
/// All variants are hard failures: the input graph falls outside the
/// supported pattern and no partial schedule is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// A visited producer is neither elementwise, scale-shift, nor a
    /// depthwise convolution.
    UnsupportedNode { node: NodeId, op: GraphOp },
    /// The convolution's output-channel extent is not divisible by its
    /// channel multiplier; the graph is malformed.
    ChannelMultiplierMismatch { channels: usize, multiplier: usize },
    /// No depthwise convolution is reachable from the declared outputs.
    NoConvolution,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::UnsupportedNode { node, op } => {
                write!(
                    f,
                    "cannot schedule {} node {:?}: only elementwise, scale_shift and \
                     depthwise_conv2d stages are supported",
                    op.label(),
                    node
                )
            }
            ScheduleError::ChannelMultiplierMismatch {
                channels,
                multiplier,
            } => {
                write!(
                    f,
                    "output channel extent {channels} is not divisible by channel multiplier \
                     {multiplier}"
                )
            }
            ScheduleError::NoConvolution => {
                write!(f, "no depthwise convolution reachable from the graph outputs")
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

/// The execution plan for one computation graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    stages: Vec<Stage>,
    node_stage: FxHashMap<NodeId, StageId>,
    roots: Vec<NodeId>,
}

impl Schedule {
    pub(crate) fn new(roots: Vec<NodeId>) -> Self {
        Schedule {
            stages: Vec::new(),
            node_stage: FxHashMap::default(),
            roots,
        }
    }

    /// Returns `true` if the node is a declared graph output.
    pub fn is_root(&self, node: NodeId) -> bool {
        self.roots.contains(&node)
    }

    /// The declared graph outputs this schedule was built for.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// All stages, in creation order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, id: StageId) -> &Stage {
        &self.stages[id.0]
    }

    pub(crate) fn stage_mut(&mut self, id: StageId) -> &mut Stage {
        &mut self.stages[id.0]
    }

    /// The stage that places a graph node, if the node has been visited.
    pub fn stage_of(&self, node: NodeId) -> Option<StageId> {
        self.node_stage.get(&node).copied()
    }

    fn push_stage(&mut self, stage: Stage) -> StageId {
        let id = StageId(self.stages.len());
        self.stages.push(stage);
        id
    }

    /// Creates the stage that computes a graph node. Each node is placed
    /// exactly once.
    pub(crate) fn add_compute_stage(
        &mut self,
        node: NodeId,
        name: &str,
        placement: Placement,
        domain: &[usize],
    ) -> StageId {
        assert!(
            !self.node_stage.contains_key(&node),
            "node {node:?} already has a placement"
        );
        let id = self.push_stage(Stage::new(node, name, placement, StageRole::Compute, domain));
        self.node_stage.insert(node, id);
        id
    }

    /// Marks a node as inlined: recomputed at every use site, never
    /// materialized.
    pub(crate) fn compute_inline(&mut self, node: NodeId, name: &str, domain: &[usize]) -> StageId {
        self.add_compute_stage(node, name, Placement::Inline, domain)
    }

    /// Stages a copy of a graph node's tensor in a faster memory scope.
    pub(crate) fn cache_read_node(
        &mut self,
        node: NodeId,
        placement: Placement,
        name: &str,
        domain: &[usize],
    ) -> StageId {
        let role = StageRole::CacheRead {
            source: CacheSource::Node(node),
        };
        self.push_stage(Stage::new(node, name, placement, role, domain))
    }

    /// Stages a copy of another stage's buffer, one memory level down.
    pub(crate) fn cache_read_stage(
        &mut self,
        source: StageId,
        placement: Placement,
        name: &str,
    ) -> StageId {
        let origin = self.stages[source.0].origin;
        let domain = self.stages[source.0].domain.clone();
        let role = StageRole::CacheRead {
            source: CacheSource::Stage(source),
        };
        self.push_stage(Stage::new(origin, name, placement, role, &domain))
    }

    /// Adds a register accumulator for a node whose final values are written
    /// back to its own (root-placed) buffer.
    pub(crate) fn cache_write(&mut self, node: NodeId, name: &str, domain: &[usize]) -> StageId {
        self.push_stage(Stage::new(
            node,
            name,
            Placement::Local,
            StageRole::CacheWrite,
            domain,
        ))
    }

    /// Anchors `stage` at a loop of `anchor`: its values are produced inside
    /// that loop, once per surrounding iteration.
    pub(crate) fn compute_at(&mut self, stage: StageId, anchor: StageId, axis: AxisId) {
        assert_ne!(stage, anchor, "a stage cannot be anchored at itself");
        assert!(
            self.stages[anchor.0].leaf_axes.contains(&axis),
            "anchor axis a{} is not a leaf of stage {}",
            axis.0,
            self.stages[anchor.0].name
        );
        self.stages[stage.0].compute_at = Some((anchor, axis));
    }

    /// Renders the schedule as text, one stage per block, for debugging and
    /// log output.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            out.push_str(&format!("[{i}] {} ({:?})", stage.name, stage.placement));
            if let Some((anchor, axis)) = stage.compute_at {
                out.push_str(&format!(
                    " at {}.a{}",
                    self.stages[anchor.0].name, axis.0
                ));
            }
            out.push('\n');
            for axis in &stage.leaf_axes {
                let iv = &stage.iter_vars[axis.0];
                match iv.bind {
                    Some(target) => {
                        out.push_str(&format!("  a{}[{}] -> {}\n", axis.0, iv.extent, target))
                    }
                    None => out.push_str(&format!("  a{}[{}]\n", axis.0, iv.extent)),
                }
            }
        }
        out
    }
}
