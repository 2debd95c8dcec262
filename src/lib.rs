//! Weft: GPU schedule synthesis for depthwise separable convolutions.
//!
//! Weft turns an abstract computation graph (one depthwise convolution,
//! optionally wrapped in elementwise/scale-shift epilogue stages) into a
//! concrete GPU execution plan: how work is partitioned across blocks and
//! threads, which tensors are staged through shared and register memory,
//! and in what order the loop axes run on the hardware hierarchy.
//!
//! # Architecture
//!
//! - **graph**: the computation-graph interface the scheduler reads (an
//!   arena of immutable nodes with a closed operation set)
//! - **schedule**: stages, loop-axis transforms, the tile-size policy, and
//!   the depthwise scheduler itself
//!
//! Code generation, kernel launch, and global-memory allocation live in
//! downstream crates; weft's output is a [`schedule::Schedule`] plus the
//! [`schedule::LaunchSpec`] geometry derived from it.
//!
//! # Example
//!
//! ```
//! use weft::graph::{DType, Graph};
//! use weft::schedule::schedule_depthwise_conv2d;
//!
//! let graph = Graph::new();
//! let x = graph.input(DType::F32, vec![1, 32, 94, 94]);
//! let padded = graph.pad2d(x, 1, 1);
//! let filter = graph.input(DType::F32, vec![32, 1, 3, 3]);
//! let conv = graph.depthwise_conv2d(padded, filter, (1, 1));
//! graph.mark_output(graph.relu(conv));
//!
//! let schedule = schedule_depthwise_conv2d(&graph)?;
//!
//! let launch = schedule.launch_spec().unwrap();
//! assert_eq!((launch.block_x, launch.block_y), (8, 8));
//! # Ok::<(), weft::schedule::ScheduleError>(())
//! ```

pub mod graph;
pub mod schedule;

pub use graph::{DType, Graph, GraphOp, NodeId};
pub use schedule::{schedule_depthwise_conv2d, LaunchSpec, Schedule, ScheduleError, Tiling};

/// Prelude module with commonly used types and traits.
pub mod prelude {
    pub use crate::graph::{DType, Graph, GraphOp, MapOp, NodeId};
    pub use crate::schedule::{
        schedule_depthwise_conv2d, BindTarget, LaunchSpec, Placement, Schedule, ScheduleError,
        StageId, Tiling,
    };
}
