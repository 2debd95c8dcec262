use weft::graph::{DType, Graph, NodeId};
use weft::schedule::{
    schedule_depthwise_conv2d, AxisOrigin, BindTarget, Placement, ScheduleError,
};

/// Builds input → pad → depthwise conv → scale_shift → relu, with a 3x3
/// stride-1 kernel so the convolution output keeps the input's spatial
/// extents.
fn fused_graph(h: usize, w: usize, channels: usize, multiplier: usize) -> (Graph, NodeId) {
    let graph = Graph::new();
    let x = graph.input(DType::F32, vec![1, channels, h, w]);
    let padded = graph.pad2d(x, 1, 1);
    let filter = graph.input(DType::F32, vec![channels, multiplier, 3, 3]);
    let conv = graph.depthwise_conv2d(padded, filter, (1, 1));
    let scale = graph.input(DType::F32, vec![channels * multiplier]);
    let shift = graph.input(DType::F32, vec![channels * multiplier]);
    let ss = graph.scale_shift(conv, scale, shift);
    let root = graph.relu(ss);
    graph.mark_output(root);
    (graph, conv)
}

#[test]
fn test_fused_pipeline_launch_geometry() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (graph, _) = fused_graph(96, 96, 16, 2);
    let sched = schedule_depthwise_conv2d(&graph).unwrap();
    let launch = sched.launch_spec().unwrap();

    // grid x fuses batch with the channel blocks: 1 * (32 / 2)
    assert_eq!(launch.grid_x, 16);
    // grid y fuses the 48x48 spatial tiles: (96/48) * (96/48)
    assert_eq!(launch.grid_y, 4);
    assert_eq!((launch.block_x, launch.block_y), (8, 8));
    assert_eq!((launch.vthread_x, launch.vthread_y), (1, 3));
    assert_eq!(launch.num_blocks(), 64);
    assert_eq!(launch.threads_per_block(), 64);
}

#[test]
fn test_leaf_loops_cover_output_exactly() {
    let (graph, _) = fused_graph(96, 96, 16, 2);
    let root = graph.output_ids()[0];
    let sched = schedule_depthwise_conv2d(&graph).unwrap();

    let anchor = sched.stage(sched.stage_of(root).unwrap());
    let covered: usize = anchor
        .leaf_axes
        .iter()
        .map(|a| anchor.extent(*a))
        .product();
    // Tile sizes divide the extents, so the loop nest neither overlaps nor
    // overshoots: it enumerates each element of the [1, 32, 96, 96] output
    // exactly once.
    assert_eq!(covered, 32 * 96 * 96);
}

#[test]
fn test_oversized_tile_fallback() {
    let (graph, _) = fused_graph(100, 100, 4, 1);
    let sched = schedule_depthwise_conv2d(&graph).unwrap();
    let launch = sched.launch_spec().unwrap();

    // 100 divides by neither 48 nor 32: one whole-extent tile per axis.
    assert_eq!(launch.grid_y, 1);
    assert_eq!(launch.grid_x, 4);
    assert_eq!((launch.vthread_x, launch.vthread_y), (1, 1));
    assert_eq!((launch.block_x, launch.block_y), (8, 8));
}

#[test]
fn test_multiplier_unit_is_innermost() {
    let (graph, _) = fused_graph(96, 96, 16, 2);
    let root = graph.output_ids()[0];
    let sched = schedule_depthwise_conv2d(&graph).unwrap();

    let anchor = sched.stage(sched.stage_of(root).unwrap());
    let last = *anchor.leaf_axes.last().unwrap();
    assert_eq!(anchor.extent(last), 2);
    // the innermost loop is the inner half of the channel split
    match anchor.iter_vars[last.0].origin {
        AxisOrigin::SplitInner { parent } => {
            assert_eq!(
                anchor.iter_vars[parent.0].origin,
                AxisOrigin::Root { dim: 1 }
            );
        }
        other => panic!("innermost axis has origin {other:?}"),
    }
}

#[test]
fn test_local_stages_anchored_at_thread_binding() {
    let (graph, _) = fused_graph(96, 96, 16, 2);
    let root = graph.output_ids()[0];
    let sched = schedule_depthwise_conv2d(&graph).unwrap();
    let anchor_id = sched.stage_of(root).unwrap();
    let anchor = sched.stage(anchor_id);

    for stage in sched.stages() {
        if stage.placement == Placement::Local {
            let (at_stage, at_axis) = stage
                .compute_at
                .unwrap_or_else(|| panic!("local stage {} has no anchor", stage.name));
            assert_eq!(at_stage, anchor_id);
            assert_eq!(anchor.iter_vars[at_axis.0].bind, Some(BindTarget::ThreadY));
        }
    }
}

#[test]
fn test_shared_stages_anchored_per_block_with_matching_threads() {
    let (graph, _) = fused_graph(96, 96, 16, 2);
    let root = graph.output_ids()[0];
    let sched = schedule_depthwise_conv2d(&graph).unwrap();
    let anchor_id = sched.stage_of(root).unwrap();
    let anchor = sched.stage(anchor_id);

    let mut seen = 0;
    for stage in sched.stages() {
        if stage.placement != Placement::Shared {
            continue;
        }
        seen += 1;
        let (at_stage, at_axis) = stage.compute_at.unwrap();
        assert_eq!(at_stage, anchor_id);
        assert_eq!(anchor.iter_vars[at_axis.0].bind, Some(BindTarget::BlockY));
        // producer and consumer agree on the thread grid, so the barrier
        // between the cooperative fill and the reads is valid
        assert_eq!(
            stage.binding_extent(BindTarget::ThreadX),
            anchor.binding_extent(BindTarget::ThreadX)
        );
        assert_eq!(
            stage.binding_extent(BindTarget::ThreadY),
            anchor.binding_extent(BindTarget::ThreadY)
        );
    }
    assert_eq!(seen, 2);
}

#[test]
fn test_filter_fetch_spatial_axes_precede_multiplier() {
    let (graph, _) = fused_graph(96, 96, 16, 2);
    let sched = schedule_depthwise_conv2d(&graph).unwrap();

    let fs = sched
        .stages()
        .iter()
        .find(|s| s.name == "filter.shared")
        .unwrap();
    // after the reorder, the multiplier axis of [C, M, KH, KW] is innermost
    let last = *fs.leaf_axes.last().unwrap();
    assert_eq!(fs.iter_vars[last.0].origin, AxisOrigin::Root { dim: 1 });
}

#[test]
fn test_identical_graphs_yield_identical_schedules() {
    let (g1, _) = fused_graph(96, 96, 16, 2);
    let (g2, _) = fused_graph(96, 96, 16, 2);
    let s1 = schedule_depthwise_conv2d(&g1).unwrap();
    let s2 = schedule_depthwise_conv2d(&g2).unwrap();
    assert_eq!(s1, s2);
}

#[test]
fn test_dump_names_the_staging_chain() {
    let (graph, _) = fused_graph(64, 64, 8, 1);
    let sched = schedule_depthwise_conv2d(&graph).unwrap();
    let dump = sched.dump();
    for name in [
        "input.shared",
        "input.local",
        "filter.shared",
        "filter.local",
        "depthwise_conv2d",
        "blockIdx.x",
        "vthread",
        "threadIdx.y",
    ] {
        assert!(dump.contains(name), "dump is missing {name}:\n{dump}");
    }
}

#[test]
fn test_failure_returns_no_schedule() {
    let graph = Graph::new();
    let x = graph.input(DType::F32, vec![1, 10, 34, 34]);
    let filter = graph.input(DType::F32, vec![10, 3, 3, 3]);
    let conv = graph.add_node(
        weft::graph::GraphOp::DepthwiseConv2d { stride: (1, 1) },
        vec![x, filter],
        DType::F32,
        vec![1, 10, 32, 32],
    );
    graph.mark_output(conv);

    match schedule_depthwise_conv2d(&graph) {
        Err(ScheduleError::ChannelMultiplierMismatch {
            channels: 10,
            multiplier: 3,
        }) => {}
        other => panic!("expected multiplier mismatch, got {other:?}"),
    }
}
