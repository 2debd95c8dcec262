//! Host-side launch geometry.

use super::stage::BindTarget;
use super::Schedule;

/// The launch descriptor a host runtime needs to start the generated
/// kernel: grid extents from the two fused grid-bound axes, the physical
/// thread block, and the virtual-thread replication executed as unrolled
/// instruction streams on those same threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchSpec {
    pub grid_x: usize,
    pub grid_y: usize,
    pub block_x: usize,
    pub block_y: usize,
    pub vthread_x: usize,
    pub vthread_y: usize,
}

impl LaunchSpec {
    /// Total number of blocks in the grid.
    pub fn num_blocks(&self) -> usize {
        self.grid_x * self.grid_y
    }

    /// Physical threads per block.
    pub fn threads_per_block(&self) -> usize {
        self.block_x * self.block_y
    }
}

impl Schedule {
    /// Derives the launch geometry from the anchor stage's bindings.
    ///
    /// Returns `None` for a schedule with no grid-bound stage (which a
    /// successfully constructed schedule always has).
    pub fn launch_spec(&self) -> Option<LaunchSpec> {
        let anchor = self
            .stages()
            .iter()
            .find(|s| s.binding(BindTarget::BlockX).is_some())?;
        Some(LaunchSpec {
            grid_x: anchor.binding_extent(BindTarget::BlockX)?,
            grid_y: anchor.binding_extent(BindTarget::BlockY)?,
            block_x: anchor.binding_extent(BindTarget::ThreadX).unwrap_or(1),
            block_y: anchor.binding_extent(BindTarget::ThreadY).unwrap_or(1),
            vthread_x: anchor.binding_extent(BindTarget::VThreadX).unwrap_or(1),
            vthread_y: anchor.binding_extent(BindTarget::VThreadY).unwrap_or(1),
        })
    }
}
