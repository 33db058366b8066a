mod common;

use beatflow_core::cancel::{CancelToken, Outcome};
use beatflow_core::error::BeatflowError;
use beatflow_core::frame::{Frame, FrameStack};
use beatflow_core::motion::block_match::grid_dim;
use beatflow_core::motion::{estimate, estimate_with_progress, AnalysisParameters};

use common::{meta, static_stack, translating_frames, translating_stack};

/// Whether a block moved by `(dx, dy)` still lies inside the frame.
fn block_fits(row: usize, col: usize, bw: usize, dx: i64, dy: i64, h: usize, w: usize) -> bool {
    let y = (row * bw) as i64 + dy;
    let x = (col * bw) as i64 + dx;
    y >= 0 && x >= 0 && y + bw as i64 <= h as i64 && x + bw as i64 <= w as i64
}

#[test]
fn test_grid_count_and_shape() {
    let stack = translating_stack(10, 70, 50, 0, 0);
    let params = AnalysisParameters::new(16, 3, 2).unwrap();
    let field = estimate(&stack, &params).unwrap();

    assert_eq!(field.len(), 7);
    assert_eq!(field.grid_dim(), (4, 3));
    assert_eq!(field.data.dim(), (7, 2, 4, 3));
    assert_eq!(grid_dim(70, 50, 16).unwrap(), (4, 3));
}

#[test]
fn test_recovers_exact_translation() {
    let (h, w, bw) = (64, 64, 16);
    let stack = translating_stack(5, h, w, 1, 1);
    let params = AnalysisParameters::new(bw, 2, 4).unwrap();
    let field = estimate(&stack, &params).unwrap();

    let (rows, cols) = field.grid_dim();
    for p in 0..field.len() {
        for r in 0..rows {
            for c in 0..cols {
                if block_fits(r, c, bw, 2, 2, h, w) {
                    assert_eq!(field.vector(p, r, c), (2.0, 2.0), "pair {p} block ({r}, {c})");
                }
            }
        }
    }
}

#[test]
fn test_recovers_negative_translation() {
    let (h, w, bw) = (48, 64, 8);
    let stack = translating_stack(3, h, w, -3, 2);
    let params = AnalysisParameters::new(bw, 1, 5).unwrap();
    let field = estimate(&stack, &params).unwrap();

    let (rows, cols) = field.grid_dim();
    let mut checked = 0;
    for r in 0..rows {
        for c in 0..cols {
            if block_fits(r, c, bw, -3, 2, h, w) {
                assert_eq!(field.vector(0, r, c), (-3.0, 2.0));
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}

#[test]
fn test_static_frames_give_zero_field() {
    let stack = static_stack(4, 32, 32);
    let field = estimate(&stack, &AnalysisParameters::new(8, 1, 3).unwrap()).unwrap();
    assert!(field.data.iter().all(|&v| v == 0.0));
}

#[test]
fn test_shift_beyond_search_radius_is_not_found() {
    let stack = translating_stack(2, 64, 64, 6, 0);
    let field = estimate(&stack, &AnalysisParameters::new(16, 1, 2).unwrap()).unwrap();
    assert!(field.data.iter().all(|&v| v.abs() <= 2.0));
}

#[test]
fn test_rejects_invalid_blockwidth() {
    let stack = static_stack(4, 20, 20);
    for bw in [3, 15, 130, 0] {
        let params = AnalysisParameters {
            blockwidth: bw,
            delay: 1,
            max_shift: 2,
        };
        assert!(
            matches!(estimate(&stack, &params), Err(BeatflowError::InvalidParameters(_))),
            "blockwidth {bw} must be rejected"
        );
    }

    let too_large = AnalysisParameters::new(32, 1, 2).unwrap();
    assert!(matches!(
        estimate(&stack, &too_large),
        Err(BeatflowError::InvalidParameters(_))
    ));
}

#[test]
fn test_insufficient_frames() {
    let stack = static_stack(3, 32, 32);
    let params = AnalysisParameters::new(16, 3, 2).unwrap();
    assert!(matches!(
        estimate(&stack, &params),
        Err(BeatflowError::InsufficientFrames { frames: 3, delay: 3 })
    ));
}

#[test]
fn test_zero_delay_is_invalid() {
    assert!(matches!(
        AnalysisParameters::new(16, 0, 2),
        Err(BeatflowError::InvalidParameters(_))
    ));
}

#[test]
fn test_progress_is_reported_per_pair() {
    let stack = translating_stack(6, 32, 32, 1, 0);
    let params = AnalysisParameters::new(16, 1, 2).unwrap();
    let mut reported = Vec::new();

    let outcome = estimate_with_progress(
        &stack,
        &params,
        |f| reported.push(f),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(matches!(outcome, Outcome::Completed(_)));
    assert_eq!(reported, vec![0.2, 0.4, 0.6, 0.8, 1.0]);
}

#[test]
fn test_cancel_stops_after_current_pair() {
    let stack = translating_stack(6, 32, 32, 1, 0);
    let params = AnalysisParameters::new(16, 1, 2).unwrap();
    let cancel = CancelToken::new();
    let mut calls = 0;

    let outcome = estimate_with_progress(
        &stack,
        &params,
        |_| {
            calls += 1;
            if calls == 2 {
                cancel.cancel();
            }
        },
        &cancel,
    )
    .unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(calls, 2);
}

#[test]
fn test_cancelled_before_start() {
    let stack = translating_stack(4, 32, 32, 1, 0);
    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = estimate_with_progress(
        &stack,
        &AnalysisParameters::new(16, 1, 2).unwrap(),
        |_| panic!("no pair should be processed"),
        &cancel,
    )
    .unwrap();
    assert!(outcome.is_cancelled());
}

#[test]
fn test_parallel_and_small_grids_agree() {
    // 4x4 = 16 blocks takes the parallel path, 1x4 the sequential one.
    let frames = translating_frames(2, 64, 64, 2, 0);
    let wide = FrameStack::new(frames.clone(), meta(10.0, 1.0)).unwrap();
    let params = AnalysisParameters::new(16, 1, 3).unwrap();
    let full = estimate(&wide, &params).unwrap();

    let strip: Vec<_> = frames
        .into_iter()
        .map(|f| {
            let data = f.data.slice(ndarray::s![16..32, ..]).to_owned();
            Frame::new(data, 16)
        })
        .collect();
    let narrow = FrameStack::new(strip, meta(10.0, 1.0)).unwrap();
    let part = estimate(&narrow, &params).unwrap();

    for c in 0..3 {
        assert_eq!(part.vector(0, 0, c), (2.0, 0.0));
        assert_eq!(full.vector(0, 1, c), (2.0, 0.0));
    }
}
