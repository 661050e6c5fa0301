// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::params::OverlayFlags;
use crate::tile::{Tile, TileResult};
use crate::tracer::HitClass;

/// Overlay alpha for classified pixels.
const OVERLAY_ALPHA: u8 = 90;

/// Running shadow-radius accumulators.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShadowEstimate {
    /// Weighted sum of rim impact parameters.
    pub sum: f64,
    /// Total weight.
    pub weight: f64,
}

impl ShadowEstimate {
    /// Add one weighted impact parameter.
    pub fn add(&mut self, b: f64, weight: f64) {
        self.sum += b * weight;
        self.weight += weight;
    }

    /// Fold another estimate into this one.
    pub fn merge(&mut self, other: &ShadowEstimate) {
        self.sum += other.sum;
        self.weight += other.weight;
    }

    /// sum / weight, or `None` before any rim sample arrived.
    pub fn radius(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.sum / self.weight)
    }

    /// Clear both accumulators.
    pub fn reset(&mut self) {
        *self = ShadowEstimate::default();
    }
}

/// Ray counts per [`HitClass`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitHistogram {
    /// Escaped rays.
    pub escape: u64,
    /// Captured rays.
    pub horizon: u64,
    /// Disk hits.
    pub disk: u64,
    /// Non-finite states.
    pub numerical: u64,
    /// Budget exhaustions.
    #[serde(rename = "max")]
    pub step_budget: u64,
}

impl HitHistogram {
    fn slot(&mut self, hit: HitClass) -> &mut u64 {
        match hit {
            HitClass::Escape => &mut self.escape,
            HitClass::Horizon => &mut self.horizon,
            HitClass::Disk => &mut self.disk,
            HitClass::Numerical => &mut self.numerical,
            HitClass::StepBudget => &mut self.step_budget,
        }
    }

    /// Count one ray.
    pub fn record(&mut self, hit: HitClass) {
        *self.slot(hit) += 1;
    }

    /// Count for one class.
    pub fn count(&self, hit: HitClass) -> u64 {
        match hit {
            HitClass::Escape => self.escape,
            HitClass::Horizon => self.horizon,
            HitClass::Disk => self.disk,
            HitClass::Numerical => self.numerical,
            HitClass::StepBudget => self.step_budget,
        }
    }

    /// Add another histogram's counts.
    pub fn merge(&mut self, other: &HitHistogram) {
        for hit in HitClass::ALL {
            *self.slot(hit) += other.count(hit);
        }
    }

    /// Total rays counted.
    pub fn total(&self) -> u64 {
        HitClass::ALL.iter().map(|&h| self.count(h)).sum()
    }
}

/// Min / max / mean of per-ray step counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStats {
    /// Fewest steps of any ray.
    pub min: u32,
    /// Most steps of any ray.
    pub max: u32,
    /// Sum over all rays.
    pub sum: u64,
    /// Rays counted.
    pub count: u64,
}

impl Default for StepStats {
    fn default() -> Self {
        StepStats {
            min: u32::MAX,
            max: 0,
            sum: 0,
            count: 0,
        }
    }
}

impl StepStats {
    /// Count one ray.
    pub fn record(&mut self, steps: u32) {
        self.min = self.min.min(steps);
        self.max = self.max.max(steps);
        self.sum += steps as u64;
        self.count += 1;
    }

    /// Fold in another set of statistics.
    pub fn merge(&mut self, other: &StepStats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Mean steps per ray.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

/// The frame being assembled from tile results.
///
/// Only the controller writes to it. Every pixel remembers the pass that last
/// wrote it; a tile result is applied to a pixel only if its pass is at least
/// that one, so merging the same result twice is a no-op and the final frame
/// does not depend on the order results arrive in.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    hit_map: Option<Vec<u8>>,
    step_map: Option<Vec<u32>>,
    coverage: Vec<u32>,
}

impl FrameBuffer {
    /// Blank (transparent black) frame with the requested overlay maps.
    pub fn new(width: u32, height: u32, overlays: OverlayFlags) -> Self {
        let n = width as usize * height as usize;
        FrameBuffer {
            width,
            height,
            pixels: vec![0; n * 4],
            hit_map: overlays.classification.then(|| vec![HitClass::Escape.code(); n]),
            step_map: overlays.heatmap.then(|| vec![0; n]),
            coverage: vec![0; n],
        }
    }

    /// Frame width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 pixels, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// True if the classification map is kept.
    pub fn has_hit_map(&self) -> bool {
        self.hit_map.is_some()
    }

    /// True if the step-count map is kept.
    pub fn has_step_map(&self) -> bool {
        self.step_map.is_some()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// RGBA of pixel (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let i = self.index(x, y)? * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Classification of pixel (x, y), if recorded.
    pub fn hit_at(&self, x: u32, y: u32) -> Option<HitClass> {
        let i = self.index(x, y)?;
        HitClass::from_code(self.hit_map.as_ref()?[i])
    }

    /// Step count of pixel (x, y), if recorded.
    pub fn steps_at(&self, x: u32, y: u32) -> Option<u32> {
        let i = self.index(x, y)?;
        Some(self.step_map.as_ref()?[i])
    }

    /// Index + 1 of the pass that last wrote pixel (x, y); 0 if untouched.
    pub fn coverage_at(&self, x: u32, y: u32) -> Option<u32> {
        Some(self.coverage[self.index(x, y)?])
    }

    /// Write a tile result into the frame.
    ///
    /// # Errors
    /// Returns [`RenderError::TileOutOfBounds`] if the tile does not fit, and
    /// [`RenderError::Other`] if the result's buffers do not match its tile.
    pub fn merge(&mut self, result: &TileResult) -> Result<()> {
        let tile: Tile = result.tile;
        if !tile.fits(self.width, self.height) {
            return Err(RenderError::TileOutOfBounds {
                tile,
                width: self.width,
                height: self.height,
            });
        }
        let n = tile.area();
        if result.pixels.len() != n * 4
            || result.hit_map.as_ref().is_some_and(|m| m.len() != n)
            || result.step_map.as_ref().is_some_and(|m| m.len() != n)
        {
            return Err(RenderError::Other(format!(
                "tile result at ({}, {}) has buffers inconsistent with its {}x{} size",
                tile.x, tile.y, tile.width, tile.height
            )));
        }

        let stamp = result.pass as u32 + 1;
        for ly in 0..tile.height {
            for lx in 0..tile.width {
                let local = (ly * tile.width + lx) as usize;
                let global = (tile.y + ly) as usize * self.width as usize + (tile.x + lx) as usize;
                if self.coverage[global] > stamp {
                    continue;
                }
                self.coverage[global] = stamp;
                self.pixels[global * 4..global * 4 + 4]
                    .copy_from_slice(&result.pixels[local * 4..local * 4 + 4]);
                if let (Some(dst), Some(src)) = (self.hit_map.as_mut(), result.hit_map.as_ref()) {
                    dst[global] = src[local];
                }
                if let (Some(dst), Some(src)) = (self.step_map.as_mut(), result.step_map.as_ref())
                {
                    dst[global] = src[local];
                }
            }
        }
        Ok(())
    }

    /// Compose the scientific overlay as RGBA8.
    ///
    /// Classification colours each pixel by hit class; the heatmap scales the
    /// colour by steps over the largest step count in the frame. Escaped rays
    /// stay transparent.
    pub fn overlay_rgba(&self) -> Vec<u8> {
        let n = self.width as usize * self.height as usize;
        let max_steps = self
            .step_map
            .as_ref()
            .and_then(|m| m.iter().copied().max())
            .unwrap_or(0);
        let mut out = vec![0u8; n * 4];
        for i in 0..n {
            if self.coverage[i] == 0 {
                continue;
            }
            let hit = self
                .hit_map
                .as_ref()
                .and_then(|m| HitClass::from_code(m[i]));
            let mut rgb: [f64; 3] = match hit {
                Some(HitClass::Disk) => [255.0, 120.0, 40.0],
                Some(HitClass::Horizon) => [20.0, 20.0, 20.0],
                Some(HitClass::Escape) => [30.0, 60.0, 120.0],
                Some(HitClass::Numerical) => [255.0, 0.0, 255.0],
                Some(HitClass::StepBudget) => [255.0, 230.0, 0.0],
                None => [255.0, 255.0, 255.0],
            };
            if let Some(steps) = self.step_map.as_ref() {
                if max_steps > 0 {
                    let intensity = steps[i] as f64 / max_steps as f64;
                    rgb = rgb.map(|c| c * intensity);
                }
            }
            let alpha = if hit == Some(HitClass::Escape) {
                0
            } else {
                OVERLAY_ALPHA
            };
            out[i * 4] = rgb[0].round() as u8;
            out[i * 4 + 1] = rgb[1].round() as u8;
            out[i * 4 + 2] = rgb[2].round() as u8;
            out[i * 4 + 3] = alpha;
        }
        out
    }
}
