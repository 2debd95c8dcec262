//! Tile-size selection policy.

/// Tile sizes and thread-hierarchy replication factors chosen for one
/// scheduled output.
///
/// Immutable once derived; every component of the schedule reads the same
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiling {
    /// Rows of output covered by one block.
    pub block_h: usize,
    /// Columns of output covered by one block.
    pub block_w: usize,
    /// Virtual-thread replication along height.
    pub vthread_h: usize,
    /// Virtual-thread replication along width.
    pub vthread_w: usize,
    /// Physical threads along each in-block spatial direction.
    pub num_thread: usize,
}

impl Tiling {
    /// Threads per block side. Tile sizes are kept multiples of this so the
    /// cooperative shared-memory fill stays coalesced and tile edges cause
    /// no divergence.
    pub const NUM_THREAD: usize = 8;

    /// Chooses tile sizes for an output of the given spatial extents.
    ///
    /// Ordered rule table, first match wins. An extent divisible by neither
    /// 48 nor 32 is not tiled at all: the whole extent becomes one oversized
    /// tile rather than an uneven partition.
    pub fn for_output(height: usize, width: usize) -> Self {
        let block_h = if height % 48 == 0 {
            48
        } else if height % 32 == 0 {
            32
        } else {
            height
        };
        let (block_w, vthread_w) = if width % 48 == 0 {
            (48, 3)
        } else if width % 32 == 0 {
            (32, 1)
        } else {
            (width, 1)
        };
        Tiling {
            block_h,
            block_w,
            vthread_h: 1,
            vthread_w,
            num_thread: Self::NUM_THREAD,
        }
    }
}
