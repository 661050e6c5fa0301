// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use glam::DVec3;

use schwarzschild_render::frame::FrameBuffer;
use schwarzschild_render::integrator::rk4_step;
use schwarzschild_render::io::{self, RenderMetadata};
use schwarzschild_render::params::RenderParams;
use schwarzschild_render::scheduler::{RenderController, RenderProgress, RenderStatus};
use schwarzschild_render::spacetime::{
    critical_impact_parameter, lapse, null_invariant, photon_sphere_radius, Schwarzschild,
    IDX_R, IDX_UR,
};
use schwarzschild_render::tile::{render_tile, tiles_for_frame, TileRequest};
use schwarzschild_render::tracer::{crosses_disk_plane, initial_state, GeodesicTracer, HitClass};
use schwarzschild_render::RenderError;

/// Parameters with the disk pushed beyond the escape radius, so every ray
/// either escapes or is captured.
fn diskless(distance: f64, escape: f64) -> RenderParams {
    RenderParams {
        camera_distance: distance,
        disk_inner_radius: 10.0 * escape,
        disk_outer_radius: 12.0 * escape,
        escape_radius: Some(escape),
        ..RenderParams::default()
    }
}

/// Test 1: Null invariant conservation
/// Integrate camera rays of a 256 px frame at θ = 1.0 with h = 0.04 until they
/// escape or plunge inwards inside the photon sphere r = 3M, after which
/// capture is certain. g_μν u^μ u^ν must stay within 1e-6 of zero the whole
/// way, and the tracer must classify every ray as captured or escaped.
#[test]
fn null_invariant_is_conserved() {
    let params = RenderParams {
        resolution: 256,
        camera_theta: 1.0,
        ..diskless(30.0, 120.0)
    }
    .prepare()
    .unwrap();
    let system = Schwarzschild::new(params.mass());
    let tracer = GeodesicTracer::new(&params);
    let cam = params.camera;
    let photon_sphere = photon_sphere_radius(1.0);
    let mut closest = f64::INFINITY;

    for (x, y) in [(128, 128), (180, 100), (40, 220)] {
        let dir = cam.pixel_direction(x, y, 256, 256);
        let mut state = initial_state(&system, cam.position, dir);
        let h0 = null_invariant(1.0, &state);
        assert!(h0.abs() < 1e-8, "initial invariant {}", h0);

        let mut terminated = false;
        for step in 0..params.max_steps {
            state = rk4_step(&system, &state, 0.04);
            let r = state[IDX_R];
            closest = closest.min(r);
            let h = null_invariant(1.0, &state);
            assert!(
                (h - h0).abs() < 1e-6,
                "pixel ({}, {}) step {}: invariant drifted to {} at r = {}",
                x,
                y,
                step,
                h,
                r
            );
            if r >= params.escape_radius || (r < photon_sphere && state[IDX_UR] < 0.0) {
                terminated = true;
                break;
            }
        }
        assert!(terminated, "pixel ({}, {}) neither escaped nor plunged", x, y);

        let hit = tracer.trace(&initial_state(&system, cam.position, dir), false).hit;
        assert!(
            matches!(hit, HitClass::Horizon | HitClass::Escape),
            "pixel ({}, {}) classified {:?}",
            x,
            y,
            hit
        );
    }
    assert!(closest < photon_sphere, "no ray reached the strong field");
}

/// Test 2: Capture threshold
/// Equatorial rays from r = 100 with impact parameter b are captured iff
/// b < 3√3 M ≈ 5.196.
#[test]
fn capture_threshold_at_critical_impact_parameter() {
    let distance = 100.0;
    let params = RenderParams {
        max_steps: 40000,
        step_size: 0.05,
        ..diskless(distance, 400.0)
    }
    .prepare()
    .unwrap();
    let tracer = GeodesicTracer::new(&params);
    let f = lapse(1.0, distance);

    let trace = |b: f64| {
        let sin_alpha = b * f.sqrt() / distance;
        let cos_alpha = (1.0 - sin_alpha * sin_alpha).sqrt();
        let state = initial_state(
            tracer.system(),
            DVec3::new(distance, 0.0, 0.0),
            DVec3::new(-cos_alpha, sin_alpha, 0.0),
        );
        tracer.trace(&state, false).hit
    };

    for b in [3.0, 4.5, 5.0] {
        assert_eq!(trace(b), HitClass::Horizon, "b = {} should be captured", b);
    }
    for b in [5.4, 6.0, 8.0] {
        assert_eq!(trace(b), HitClass::Escape, "b = {} should escape", b);
    }
}

/// Test 3: Shadow radius
/// M = 1, D = 30: the measured shadow radius from the full-resolution pass
/// must be within 5% of 3√3 M.
#[test]
fn shadow_radius_matches_theory() {
    let params = RenderParams {
        field_of_view: 30.0,
        resolution: 96,
        tile_size: 32,
        step_size: 0.05,
        max_steps: 20000,
        ..diskless(30.0, 60.0)
    };
    let controller = RenderController::new(params)
        .unwrap()
        .with_threads(4)
        .with_passes(vec![1])
        .unwrap();
    let output = controller.render(None).unwrap();

    let measured = output.stats.shadow_radius().unwrap();
    let expected = critical_impact_parameter(1.0);
    let rel = (measured - expected).abs() / expected;
    assert!(
        rel < 0.05,
        "measured shadow radius {} vs theoretical {} ({:.2}%)",
        measured,
        expected,
        100.0 * rel
    );
    assert!(output.stats.histogram.count(HitClass::Horizon) > 0);
    assert_eq!(output.stats.histogram.count(HitClass::Disk), 0);
}

/// Test 4: Determinism
/// Identical parameters give bit-identical frames regardless of the number
/// of workers or the order tiles complete in.
#[test]
fn frames_are_bit_identical_across_thread_counts() {
    let params = RenderParams {
        resolution: 48,
        tile_size: 16,
        max_steps: 4000,
        step_size: 0.08,
        ..RenderParams::default()
    };
    let render = |threads: usize| {
        RenderController::new(params.clone())
            .unwrap()
            .with_threads(threads)
            .with_passes(vec![4, 2, 1])
            .unwrap()
            .render(None)
            .unwrap()
    };
    let one = render(1);
    let four = render(4);
    assert_eq!(one.frame.pixels(), four.frame.pixels());
    assert_eq!(one.frame.overlay_rgba(), four.frame.overlay_rgba());
    assert_eq!(one.stats.rays, four.stats.rays);
    assert_eq!(one.stats.steps, four.stats.steps);
    assert_eq!(one.stats.shadow, four.stats.shadow);
}

/// Test 5: Disk plane crossing
/// θ samples [1.60, 1.57, 1.50] cross the equator exactly once, between the
/// first and second sample.
#[test]
fn disk_plane_crossing_detected_once() {
    let thetas = [1.60, 1.57, 1.50];
    let crossings: Vec<usize> = thetas
        .windows(2)
        .enumerate()
        .filter(|(_, w)| crosses_disk_plane(w[0], w[1]))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(crossings, vec![0]);
}

/// Test 6: Tile merge order
/// Merging every tile result of a two-pass render forwards, backwards, or
/// twice yields the same frame.
#[test]
fn tile_merge_is_order_independent() {
    let params = RenderParams {
        resolution: 32,
        tile_size: 16,
        max_steps: 3000,
        step_size: 0.1,
        ..RenderParams::default()
    }
    .prepare()
    .unwrap();
    let overlays = params.overlays();

    let mut results = Vec::new();
    for (pass, stride) in [4u32, 1].into_iter().enumerate() {
        let pass_params = Arc::new(params.for_pass(stride));
        for tile in tiles_for_frame(32, 32, 16) {
            let request = TileRequest {
                params: Arc::clone(&pass_params),
                tile,
                width: 32,
                height: 32,
                stride,
                pass,
                debug_pixel: None,
                overlays,
            };
            results.push(render_tile(&request).unwrap());
        }
    }

    let mut forward = FrameBuffer::new(32, 32, overlays);
    for r in &results {
        forward.merge(r).unwrap();
    }
    let mut backward = FrameBuffer::new(32, 32, overlays);
    for r in results.iter().rev() {
        backward.merge(r).unwrap();
    }
    let mut twice = forward.clone();
    for r in &results {
        twice.merge(r).unwrap();
    }

    assert_eq!(forward.pixels(), backward.pixels());
    assert_eq!(forward.pixels(), twice.pixels());
    assert_eq!(forward.overlay_rgba(), backward.overlay_rgba());
    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(backward.coverage_at(x, y), Some(2));
        }
    }
}

/// Test 7: Doppler beaming
/// Seen almost edge-on, the side of the disk moving towards the camera is
/// markedly brighter than the receding side.
#[test]
fn approaching_side_of_disk_is_brighter() {
    let params = RenderParams {
        camera_theta: 1.4,
        field_of_view: 60.0,
        disk_inner_radius: 6.0,
        disk_outer_radius: 20.0,
        resolution: 64,
        tile_size: 32,
        max_steps: 6000,
        step_size: 0.05,
        ..RenderParams::default()
    };
    let output = RenderController::new(params)
        .unwrap()
        .with_passes(vec![1])
        .unwrap()
        .render(None)
        .unwrap();
    let frame = &output.frame;

    let mut sums = [0.0f64; 2];
    let mut counts = [0u32; 2];
    for y in 0..64 {
        for x in 0..64 {
            if frame.hit_at(x, y) != Some(HitClass::Disk) {
                continue;
            }
            let p = frame.pixel(x, y).unwrap();
            let side = (x >= 32) as usize;
            sums[side] += p[0] as f64 + p[1] as f64 + p[2] as f64;
            counts[side] += 1;
        }
    }
    assert!(counts[0] > 20 && counts[1] > 20, "disk pixels {:?}", counts);
    let left = sums[0] / counts[0] as f64;
    let right = sums[1] / counts[1] as f64;
    let ratio = left.max(right) / left.min(right).max(1e-9);
    assert!(ratio > 1.2, "left {} right {} ratio {}", left, right, ratio);
}

/// Test 8: End-to-end offline render
/// Progress events are ordered and complete; the PNG and JSON artifacts
/// describe the frame that was rendered.
#[test]
fn offline_render_writes_artifacts() {
    let params = RenderParams {
        resolution: 40,
        tile_size: 16,
        max_steps: 3000,
        step_size: 0.1,
        show_heatmap: true,
        ..RenderParams::default()
    };
    let events = Mutex::new(Vec::new());
    let record = |p: RenderProgress| events.lock().unwrap().push(p);
    let controller = RenderController::new(params.clone()).unwrap().with_threads(3);
    assert_eq!(controller.passes(), vec![8, 4, 2, 1]);
    let output = controller.render(Some(&record)).unwrap();

    let events = events.into_inner().unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.status, RenderStatus::Completed);
    assert_eq!(last.tiles_processed, 9 * 4);
    assert!(events
        .iter()
        .all(|e| (0.0..=1.0).contains(&e.progress) && e.error.is_none()));
    assert!(events.windows(2).all(|w| w[0].rays <= w[1].rays));

    let dir = std::env::temp_dir().join("schwarzschild_verification_render");
    std::fs::create_dir_all(&dir).unwrap();
    let stamp = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let base = io::output_basename("verify", &stamp);
    let png = dir.join(format!("{}.png", base));
    let overlay = dir.join(format!("{}_overlay.png", base));
    let json = dir.join(format!("{}.json", base));

    io::save_frame_png(&output.frame, &png).unwrap();
    io::save_overlay_png(&output.frame, &overlay).unwrap();
    RenderMetadata::from_render(&params, &output.stats, stamp)
        .save(&json)
        .unwrap();

    let image = image::open(&png).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (40, 40));
    assert_eq!(image.get_pixel(7, 9).0, output.frame.pixel(7, 9).unwrap());

    let meta = RenderMetadata::load(&json).unwrap();
    assert_eq!(meta.resolution, 40);
    assert_eq!(meta.timestamp, stamp);
    assert_eq!(meta.histogram.total(), 40 * 40);
    assert_eq!(meta.rays, output.stats.rays);
    assert_eq!(meta.step_summary.max, Some(output.stats.step_stats.max));

    std::fs::remove_dir_all(&dir).ok();
}

/// Test 9: Domain errors
/// Invalid physics is rejected before any ray is traced.
#[test]
fn invalid_parameters_are_rejected() {
    let bad_mass = RenderParams {
        mass: -1.0,
        ..RenderParams::default()
    };
    assert!(matches!(
        RenderController::new(bad_mass),
        Err(RenderError::InvalidMass(_))
    ));

    let inside = RenderParams {
        camera_distance: 1.5,
        ..RenderParams::default()
    };
    assert!(matches!(
        RenderController::new(inside),
        Err(RenderError::CameraInsideHorizon { .. })
    ));

    let controller = RenderController::new(RenderParams::default()).unwrap();
    assert!(matches!(
        controller.with_passes(vec![2, 4, 1]),
        Err(RenderError::InvalidPasses(_))
    ));
}
