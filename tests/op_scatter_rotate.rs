use std::collections::HashMap;

use proptest::prelude::*;
use scatter_rotate::{
    OpScatterRotate, PixelBuffer, RayonDispatcher, RotationParameters, ScatterKernel,
    SequentialDispatcher, bench_utils, destination_offset, rotate_point,
};

const SENTINEL: f32 = -1.0;

/// Source value(s) that may end up in each destination offset.
fn candidates(src: &PixelBuffer, params: &RotationParameters) -> HashMap<usize, Vec<f32>> {
    let (rows, cols) = (src.rows(), src.cols());
    let mut map: HashMap<usize, Vec<f32>> = HashMap::new();
    for row in 0..rows {
        for col in 0..cols {
            if let Some(offset) = destination_offset(row, col, rows, cols, params) {
                map.entry(offset).or_default().push(src.at(row, col));
            }
        }
    }
    map
}

fn rotate_with(params: RotationParameters, src: &PixelBuffer) -> PixelBuffer {
    let mut rotate = OpScatterRotate::new();
    rotate.set_rotation_parameters(params).set_sentinel(SENTINEL);
    rotate
        .apply(&RayonDispatcher::new(), src)
        .expect("rotate")
        .output
}

#[test]
fn test_quarter_turn_on_4x4_by_hand() {
    // cos = 0, sin = 1: x2 = col, y2 = -row. Only row 0 stays in bounds.
    //
    //  (row, col) -> (x2, y2) -> offset
    //  (0, 0) -> (0,  0) -> 0      (1, c) -> (c, -1) -> none
    //  (0, 1) -> (1,  0) -> 1      (2, c) -> (c, -2) -> none
    //  (0, 2) -> (2,  0) -> 2      (3, c) -> (c, -3) -> none
    //  (0, 3) -> (3,  0) -> 3
    let data: Vec<f32> = (0..16).map(|i| 100.0 + i as f32).collect();
    let src = PixelBuffer::from_vec(4, 4, data).unwrap();
    let params = RotationParameters::from_cos_sin(0.0, 1.0);

    for row in 0..4 {
        for col in 0..4 {
            let (x2, y2) = rotate_point(row as i32, col as i32, &params);
            assert_eq!((x2, y2), (col as i32, -(row as i32)));
        }
    }

    let out = rotate_with(params, &src);
    let mut expected = vec![SENTINEL; 16];
    expected[..4].copy_from_slice(&[100.0, 101.0, 102.0, 103.0]);
    assert_eq!(out.as_slice(), expected.as_slice());
}

#[test]
fn test_zero_angle_places_row_col_at_x_y() {
    // x2 = row, y2 = col; with offset cols * y2 + x2 a square raster is transposed.
    let src = bench_utils::create_ramp_buffer(5, 5);
    let out = rotate_with(RotationParameters::from_degrees(0.0), &src);
    for row in 0..5 {
        for col in 0..5 {
            assert_eq!(out.at(col, row), src.at(row, col));
        }
    }
    assert_eq!(out.count_equal(SENTINEL), 0);
}

#[test]
fn test_zero_angle_non_square_drops_out_of_range_axes() {
    // 2 rows x 3 cols: x2 = row must be < 3, y2 = col must be < 2.
    let src = bench_utils::create_ramp_buffer(2, 3);
    let out = rotate_with(RotationParameters::from_degrees(0.0), &src);
    // (0,0)->0, (0,1)->3, (1,0)->1, (1,1)->4; col 2 has y2 = 2 >= rows.
    assert_eq!(out.as_slice(), &[0.0, 3.0, SENTINEL, 1.0, 4.0, SENTINEL]);
}

#[test]
fn test_default_angle_leaves_sentinel_visible() {
    let src = bench_utils::create_test_buffer(32, 32);
    let run = OpScatterRotate::new()
        .apply(&RayonDispatcher::new(), &src)
        .expect("rotate");
    let reached = candidates(&src, &RotationParameters::from_degrees(-45.0)).len();
    assert_eq!(run.output.count_equal(1234.0), 32 * 32 - reached);
    assert_eq!(run.sentinel_cells, 32 * 32 - reached);
    assert!(run.sentinel_cells > 0);
}

#[test]
fn test_rayon_matches_sequential_without_collisions() {
    let src = bench_utils::create_ramp_buffer(40, 40);
    let kernel = ScatterKernel::new(RotationParameters::from_degrees(0.0));

    let mut par = PixelBuffer::filled(40, 40, SENTINEL).unwrap();
    let mut seq = par.clone();
    kernel.run(&RayonDispatcher::new(), &src, &mut par).unwrap();
    kernel.run(&SequentialDispatcher, &src, &mut seq).unwrap();
    assert_eq!(par, seq);
}

#[test]
fn test_dedicated_pool_reports_context() {
    let dispatcher = RayonDispatcher::with_threads(2).unwrap();
    let src = bench_utils::create_ramp_buffer(8, 8);
    let run = OpScatterRotate::new().apply(&dispatcher, &src).unwrap();
    assert_eq!(run.context.workers, 2);
    assert_eq!(run.context.to_string(), "CPU thread pool (2 workers)");
}

proptest! {
    #[test]
    fn prop_unwritten_cells_keep_sentinel(
        rows in 1usize..24,
        cols in 1usize..24,
        angle in -360.0f64..360.0,
    ) {
        let src = bench_utils::create_ramp_buffer(rows, cols);
        let params = RotationParameters::from_degrees(angle);
        let expected = candidates(&src, &params);
        let out = rotate_with(params, &src);

        for (offset, &value) in out.as_slice().iter().enumerate() {
            match expected.get(&offset) {
                // Collisions: any contributing source may win.
                Some(sources) => prop_assert!(sources.contains(&value)),
                None => prop_assert_eq!(value, SENTINEL),
            }
        }
    }

    #[test]
    fn prop_full_turns_match_zero_angle(
        rows in 1usize..20,
        cols in 1usize..20,
        turns in -2i32..=3,
    ) {
        let src = bench_utils::create_ramp_buffer(rows, cols);
        let base = rotate_with(RotationParameters::from_degrees(0.0), &src);
        let turned = rotate_with(RotationParameters::from_degrees(360.0 * f64::from(turns)), &src);
        prop_assert_eq!(base, turned);
    }

    #[test]
    fn prop_opposite_angles_undo_within_truncation(
        row in 0i32..64,
        col in 0i32..64,
        angle in -180.0f64..180.0,
    ) {
        let forward = RotationParameters::from_degrees(angle);
        let backward = RotationParameters::from_degrees(-angle);
        let (x2, y2) = rotate_point(row, col, &forward);
        let (x3, y3) = rotate_point(x2, y2, &backward);
        prop_assert!((x3 - row).abs() <= 2, "row {row} -> {x3}");
        prop_assert!((y3 - col).abs() <= 2, "col {col} -> {y3}");
    }

    #[test]
    fn prop_transform_is_deterministic(
        row in 0i32..4096,
        col in 0i32..4096,
        cos in -1.0f32..=1.0,
        sin in -1.0f32..=1.0,
    ) {
        let params = RotationParameters::from_cos_sin(cos, sin);
        let first = rotate_point(row, col, &params);
        let second = rotate_point(row, col, &params);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_destination_size_is_invariant(
        rows in 0usize..32,
        cols in 0usize..32,
        angle in -90.0f64..90.0,
    ) {
        let src = bench_utils::create_ramp_buffer(rows, cols);
        let mut rotate = OpScatterRotate::new();
        rotate.set_rotation(angle);

        let mut dst = PixelBuffer::filled(rows, cols, 0.0).unwrap();
        prop_assert_eq!(dst.len(), rows * cols);
        rotate.apply_to_preallocated(&RayonDispatcher::new(), &src, &mut dst).unwrap();
        prop_assert_eq!(dst.len(), rows * cols);
        prop_assert_eq!(dst.rows(), rows);
        prop_assert_eq!(dst.cols(), cols);
    }
}
