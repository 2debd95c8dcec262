//! Stages and their loop-axis machinery.
//!
//! A stage is one materialization point in the schedule: a graph node's
//! computation, or a cached copy of a tensor in a faster memory scope. Each
//! stage owns a small arena of iteration variables; splits, fusions, and
//! reorders rewrite the leaf loop order while the parent links double as the
//! stage's axis-transform history.

use crate::graph::NodeId;

/// Index of one stage within a schedule's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub usize);

/// Index of one iteration variable within a stage's axis arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisId(pub usize);

/// Hardware dimension a loop axis can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindTarget {
    BlockX,
    BlockY,
    VThreadX,
    VThreadY,
    ThreadX,
    ThreadY,
}

impl std::fmt::Display for BindTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BindTarget::BlockX => "blockIdx.x",
            BindTarget::BlockY => "blockIdx.y",
            BindTarget::VThreadX => "vthread.x",
            BindTarget::VThreadY => "vthread.y",
            BindTarget::ThreadX => "threadIdx.x",
            BindTarget::ThreadY => "threadIdx.y",
        };
        f.write_str(name)
    }
}

/// How an iteration variable came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrigin {
    /// One of the stage's original tensor axes.
    Root { dim: usize },
    /// Outer half of a split of `parent`.
    SplitOuter { parent: AxisId },
    /// Inner half of a split of `parent`.
    SplitInner { parent: AxisId },
    /// Fusion of two adjacent axes.
    Fused { outer: AxisId, inner: AxisId },
}

/// One loop axis of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterVar {
    pub origin: AxisOrigin,
    pub extent: usize,
    pub bind: Option<BindTarget>,
}

/// Where a stage's values live, and with it the synchronization contract.
///
/// `Shared` stages are filled cooperatively by all threads of a block and
/// imply a barrier between the write and read phases; `Local` stages are
/// owned by a single thread and need none. `Inline` stages are never
/// materialized at all, and `Root` stages write the final output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Inline,
    Shared,
    Local,
    Root,
}

/// What a cache stage copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// A graph node's tensor (read through any inlined index functions).
    Node(NodeId),
    /// Another stage of this schedule, one memory level up.
    Stage(StageId),
}

/// Why a stage exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    /// Computes the graph node it originates from.
    Compute,
    /// Copies its source into a faster memory scope before use.
    CacheRead { source: CacheSource },
    /// Accumulates the origin node's result in registers before writeback.
    CacheWrite,
}

/// One materialization point in a schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// The graph node this stage computes or caches.
    pub origin: NodeId,
    /// Human-readable label, e.g. `input.shared`.
    pub name: String,
    pub placement: Placement,
    pub role: StageRole,
    /// Extents of the stage's original tensor axes.
    pub domain: Vec<usize>,
    /// All iteration variables ever created for this stage.
    pub iter_vars: Vec<IterVar>,
    /// Current loop-nest order, outermost first.
    pub leaf_axes: Vec<AxisId>,
    /// Anchor in another stage's loop nest at which this stage's values are
    /// produced. Stored as indices so the schedule stays an acyclic arena.
    pub compute_at: Option<(StageId, AxisId)>,
}

impl Stage {
    pub(crate) fn new(
        origin: NodeId,
        name: &str,
        placement: Placement,
        role: StageRole,
        domain: &[usize],
    ) -> Self {
        let iter_vars = domain
            .iter()
            .enumerate()
            .map(|(dim, &extent)| IterVar {
                origin: AxisOrigin::Root { dim },
                extent,
                bind: None,
            })
            .collect::<Vec<_>>();
        let leaf_axes = (0..domain.len()).map(AxisId).collect();
        Stage {
            origin,
            name: name.to_string(),
            placement,
            role,
            domain: domain.to_vec(),
            iter_vars,
            leaf_axes,
            compute_at: None,
        }
    }

    /// The iteration variable for an original tensor dimension.
    ///
    /// Valid as a transform target only while the axis is still a leaf
    /// (i.e. has not itself been split or fused away).
    pub fn axis(&self, dim: usize) -> AxisId {
        assert!(dim < self.domain.len(), "axis {dim} out of range");
        AxisId(dim)
    }

    /// Extent of an iteration variable.
    pub fn extent(&self, axis: AxisId) -> usize {
        self.iter_vars[axis.0].extent
    }

    /// The axis bound to `target`, if any.
    pub fn binding(&self, target: BindTarget) -> Option<AxisId> {
        self.leaf_axes
            .iter()
            .copied()
            .find(|a| self.iter_vars[a.0].bind == Some(target))
    }

    /// Extent of the axis bound to `target`, if any.
    pub fn binding_extent(&self, target: BindTarget) -> Option<usize> {
        self.binding(target).map(|a| self.extent(a))
    }

    fn leaf_pos(&self, axis: AxisId) -> usize {
        self.leaf_axes
            .iter()
            .position(|a| *a == axis)
            .unwrap_or_else(|| panic!("axis a{} is not a leaf of stage {}", axis.0, self.name))
    }

    fn push(&mut self, iv: IterVar) -> AxisId {
        let id = AxisId(self.iter_vars.len());
        self.iter_vars.push(iv);
        id
    }

    /// Splits a leaf axis so the inner loop has extent `factor`.
    ///
    /// Returns `(outer, inner)`. The outer extent rounds up, so a
    /// non-divisible split covers the axis with a partial final iteration.
    pub fn split(&mut self, axis: AxisId, factor: usize) -> (AxisId, AxisId) {
        assert!(factor > 0, "split factor must be positive");
        let pos = self.leaf_pos(axis);
        assert!(
            self.iter_vars[axis.0].bind.is_none(),
            "cannot split bound axis a{}",
            axis.0
        );
        let extent = self.iter_vars[axis.0].extent;
        let outer = self.push(IterVar {
            origin: AxisOrigin::SplitOuter { parent: axis },
            extent: extent.div_ceil(factor),
            bind: None,
        });
        let inner = self.push(IterVar {
            origin: AxisOrigin::SplitInner { parent: axis },
            extent: factor,
            bind: None,
        });
        self.leaf_axes.splice(pos..=pos, [outer, inner]);
        (outer, inner)
    }

    /// Splits a leaf axis so the outer loop has extent `nparts`.
    pub fn split_nparts(&mut self, axis: AxisId, nparts: usize) -> (AxisId, AxisId) {
        assert!(nparts > 0, "split nparts must be positive");
        let pos = self.leaf_pos(axis);
        assert!(
            self.iter_vars[axis.0].bind.is_none(),
            "cannot split bound axis a{}",
            axis.0
        );
        let extent = self.iter_vars[axis.0].extent;
        let outer = self.push(IterVar {
            origin: AxisOrigin::SplitOuter { parent: axis },
            extent: nparts,
            bind: None,
        });
        let inner = self.push(IterVar {
            origin: AxisOrigin::SplitInner { parent: axis },
            extent: extent.div_ceil(nparts),
            bind: None,
        });
        self.leaf_axes.splice(pos..=pos, [outer, inner]);
        (outer, inner)
    }

    /// Fuses two adjacent leaf axes into one with the product extent.
    pub fn fuse(&mut self, outer: AxisId, inner: AxisId) -> AxisId {
        let outer_pos = self.leaf_pos(outer);
        let inner_pos = self.leaf_pos(inner);
        assert_eq!(
            outer_pos + 1,
            inner_pos,
            "fuse requires adjacent axes (a{} then a{})",
            outer.0,
            inner.0
        );
        let extent = self.iter_vars[outer.0].extent * self.iter_vars[inner.0].extent;
        let fused = self.push(IterVar {
            origin: AxisOrigin::Fused { outer, inner },
            extent,
            bind: None,
        });
        self.leaf_axes.splice(outer_pos..=inner_pos, [fused]);
        fused
    }

    /// Reorders the listed leaf axes among the positions they occupy.
    ///
    /// Axes not listed keep their positions, so a partial list permutes only
    /// the named loops.
    pub fn reorder(&mut self, order: &[AxisId]) {
        let mut slots: Vec<usize> = order.iter().map(|a| self.leaf_pos(*a)).collect();
        slots.sort_unstable();
        assert_eq!(
            slots.windows(2).filter(|w| w[0] == w[1]).count(),
            0,
            "reorder list contains a duplicate axis"
        );
        for (slot, axis) in slots.into_iter().zip(order) {
            self.leaf_axes[slot] = *axis;
        }
    }

    /// Binds a leaf axis to a hardware dimension.
    pub fn bind(&mut self, axis: AxisId, target: BindTarget) {
        let _ = self.leaf_pos(axis);
        assert!(
            self.iter_vars[axis.0].bind.is_none(),
            "axis a{} is already bound",
            axis.0
        );
        assert!(
            self.binding(target).is_none(),
            "stage {} already has an axis bound to {target}",
            self.name
        );
        self.iter_vars[axis.0].bind = Some(target);
    }
}
