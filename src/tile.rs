// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::DVec3;

use crate::error::{RenderError, Result};
use crate::frame::{HitHistogram, ShadowEstimate, StepStats};
use crate::params::{OverlayFlags, PreparedParams};
use crate::tracer::{impact_parameter, initial_state, GeodesicTracer, HitClass};

/// Rectangular region of the frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Tile {
    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True if the tile is non-empty and lies inside a `width` x `height` frame.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }

    /// True if frame pixel (x, y) lies inside the tile.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }
}

/// Cover a frame with row-major tiles, clipping the last row and column.
pub fn tiles_for_frame(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();
    for y in (0..height).step_by(tile_size as usize) {
        for x in (0..width).step_by(tile_size as usize) {
            tiles.push(Tile {
                x,
                y,
                width: tile_size.min(width - x),
                height: tile_size.min(height - y),
            });
        }
    }
    tiles
}

/// Frame pixel whose ray path should be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugPixel {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

/// Recorded path of the debug pixel's ray.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugPath {
    /// The pixel that was traced.
    pub pixel: DebugPixel,
    /// How the ray ended.
    pub hit: HitClass,
    /// Steps taken.
    pub steps: u32,
    /// Sparse Cartesian samples along the ray.
    pub points: Vec<DVec3>,
}

/// Everything a worker needs to render one tile of one pass.
#[derive(Debug, Clone)]
pub struct TileRequest {
    /// Pass-effective parameters (see [`PreparedParams::for_pass`]).
    pub params: Arc<PreparedParams>,
    /// Region to render.
    pub tile: Tile,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Sample every `stride`-th pixel in each direction.
    pub stride: u32,
    /// Index of the pass this tile belongs to.
    pub pass: usize,
    /// Pixel whose path to capture, if any.
    pub debug_pixel: Option<DebugPixel>,
    /// Overlays to record.
    pub overlays: OverlayFlags,
}

/// A rendered tile, ready to merge into the frame.
#[derive(Debug, Clone)]
pub struct TileResult {
    /// Region rendered.
    pub tile: Tile,
    /// Pass index.
    pub pass: usize,
    /// Sampling stride.
    pub stride: u32,
    /// RGBA8 pixels, row-major over the tile.
    pub pixels: Vec<u8>,
    /// Per-pixel [`HitClass::code`], when classification was requested.
    pub hit_map: Option<Vec<u8>>,
    /// Per-pixel step counts, when the heatmap was requested.
    pub step_map: Option<Vec<u32>>,
    /// Rays traced.
    pub rays: u64,
    /// Integration steps summed over all rays.
    pub steps: u64,
    /// Path of the debug pixel, if it was sampled here.
    pub debug_path: Option<DebugPath>,
    /// Shadow-rim accumulators; empty unless `stride == 1`.
    pub shadow: ShadowEstimate,
    /// Largest step count of any ray.
    pub max_steps: u32,
    /// Ray counts per hit class.
    pub histogram: HitHistogram,
    /// Per-ray step statistics.
    pub step_stats: StepStats,
    /// Wall time spent rendering.
    pub elapsed: Duration,
}

fn to_rgba8(color: [f64; 3]) -> [u8; 4] {
    let c = color.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8);
    [c[0], c[1], c[2], 255]
}

/// Render one tile.
///
/// Samples every `stride`-th pixel of the tile and fills the stride x stride
/// block it stands for. On the full-resolution pass it also measures the
/// shadow rim: each horizontally or vertically adjacent pair of samples where
/// exactly one ray fell into the horizon contributes the mean of their impact
/// parameters.
///
/// # Errors
/// Returns [`RenderError::TileOutOfBounds`] if the tile does not fit in the
/// frame, and [`RenderError::InvalidParameter`] for a zero stride.
pub fn render_tile(request: &TileRequest) -> Result<TileResult> {
    let TileRequest {
        ref params,
        tile,
        width,
        height,
        stride,
        pass,
        debug_pixel,
        overlays,
    } = *request;

    if !tile.fits(width, height) {
        return Err(RenderError::TileOutOfBounds {
            tile,
            width,
            height,
        });
    }
    if stride == 0 {
        return Err(RenderError::InvalidParameter {
            name: "stride",
            value: 0.0,
            reason: "must be at least 1",
        });
    }

    let start = Instant::now();
    let tracer = GeodesicTracer::new(params);
    let camera = params.camera;
    let mass = params.mass();

    let n = tile.area();
    let mut pixels = vec![0u8; n * 4];
    let mut hit_map = overlays.classification.then(|| vec![0u8; n]);
    let mut step_map = overlays.heatmap.then(|| vec![0u32; n]);

    let cols = tile.width.div_ceil(stride) as usize;
    let rows = tile.height.div_ceil(stride) as usize;
    let measure_rim = stride == 1;
    let mut samples: Vec<(HitClass, Option<f64>)> = Vec::new();
    if measure_rim {
        samples.reserve(cols * rows);
    }

    let mut rays = 0u64;
    let mut steps = 0u64;
    let mut max_steps = 0u32;
    let mut histogram = HitHistogram::default();
    let mut step_stats = StepStats::default();
    let mut debug_path = None;

    for ly in (0..tile.height).step_by(stride as usize) {
        for lx in (0..tile.width).step_by(stride as usize) {
            let px = tile.x + lx;
            let py = tile.y + ly;
            let direction = camera.pixel_direction(px, py, width, height);
            let state = initial_state(tracer.system(), camera.position, direction);
            let capture = debug_pixel == Some(DebugPixel { x: px, y: py });
            let result = tracer.trace(&state, capture);

            rays += 1;
            steps += result.steps as u64;
            max_steps = max_steps.max(result.steps);
            histogram.record(result.hit);
            step_stats.record(result.steps);

            let rgba = to_rgba8(result.color);
            let code = result.hit.code();
            for by in ly..(ly + stride).min(tile.height) {
                for bx in lx..(lx + stride).min(tile.width) {
                    let idx = (by * tile.width + bx) as usize;
                    pixels[idx * 4..idx * 4 + 4].copy_from_slice(&rgba);
                    if let Some(map) = hit_map.as_mut() {
                        map[idx] = code;
                    }
                    if let Some(map) = step_map.as_mut() {
                        map[idx] = result.steps;
                    }
                }
            }

            if measure_rim {
                samples.push((result.hit, impact_parameter(mass, &state)));
            }
            if let Some(points) = result.path {
                debug_path = Some(DebugPath {
                    pixel: DebugPixel { x: px, y: py },
                    hit: result.hit,
                    steps: result.steps,
                    points,
                });
            }
        }
    }

    let mut shadow = ShadowEstimate::default();
    if measure_rim {
        let block_area = (stride * stride) as f64;
        let mut rim = |a: (HitClass, Option<f64>), b: (HitClass, Option<f64>)| {
            let captured_a = a.0 == HitClass::Horizon;
            let captured_b = b.0 == HitClass::Horizon;
            if captured_a != captured_b {
                if let (Some(ba), Some(bb)) = (a.1, b.1) {
                    shadow.add(0.5 * (ba + bb), block_area);
                }
            }
        };
        for row in 0..rows {
            for col in 0..cols {
                let here = samples[row * cols + col];
                if col + 1 < cols {
                    rim(here, samples[row * cols + col + 1]);
                }
                if row + 1 < rows {
                    rim(here, samples[(row + 1) * cols + col]);
                }
            }
        }
    }

    Ok(TileResult {
        tile,
        pass,
        stride,
        pixels,
        hit_map,
        step_map,
        rays,
        steps,
        debug_path,
        shadow,
        max_steps,
        histogram,
        step_stats,
        elapsed: start.elapsed(),
    })
}
