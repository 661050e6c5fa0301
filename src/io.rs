// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use image::{ImageError, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::frame::{FrameBuffer, HitHistogram, StepStats};
use crate::params::RenderParams;
use crate::scheduler::RenderStats;
use crate::spacetime::critical_impact_parameter;

impl From<ImageError> for RenderError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::IoError(io) => RenderError::IoError(io),
            other => RenderError::Other(format!("image error: {}", other)),
        }
    }
}

/// Infer the image format from the extension; only PNG is written.
pub fn infer_format(path: &Path) -> Result<ImageFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => Ok(ImageFormat::Png),
        Some(ext) => Err(RenderError::UnsupportedFileFormat(ext.to_string())),
        None => Err(RenderError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

fn save_rgba(pixels: &[u8], width: u32, height: u32, path: &Path) -> Result<()> {
    let format = infer_format(path)?;
    let image = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
        RenderError::Other(format!(
            "pixel buffer of {} bytes does not hold a {}x{} RGBA image",
            pixels.len(),
            width,
            height
        ))
    })?;
    image.save_with_format(path, format)?;
    Ok(())
}

/// Write the rendered frame as an RGBA PNG.
pub fn save_frame_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    save_rgba(frame.pixels(), frame.width(), frame.height(), path)
}

/// Write the scientific overlay as an RGBA PNG.
///
/// # Errors
/// Fails if the frame recorded neither a classification nor a step map.
pub fn save_overlay_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    if !frame.has_hit_map() && !frame.has_step_map() {
        return Err(RenderError::Other(
            "frame has no overlay data (scientific mode off?)".to_string(),
        ));
    }
    save_rgba(&frame.overlay_rgba(), frame.width(), frame.height(), path)
}

/// Min / max / mean steps per ray of the final pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    /// Fewest steps.
    pub min: Option<u32>,
    /// Most steps.
    pub max: Option<u32>,
    /// Mean steps.
    pub mean: Option<f64>,
}

impl From<&StepStats> for StepSummary {
    fn from(stats: &StepStats) -> Self {
        if stats.count == 0 {
            return StepSummary {
                min: None,
                max: None,
                mean: None,
            };
        }
        StepSummary {
            min: Some(stats.min),
            max: Some(stats.max),
            mean: stats.mean(),
        }
    }
}

/// JSON record written next to an offline render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    /// Parameters the frame was rendered with.
    pub params: RenderParams,
    /// Frame edge length in pixels.
    pub resolution: u32,
    /// Pass strides.
    pub passes: Vec<u32>,
    /// Rays traced, all passes.
    pub rays: u64,
    /// Integration steps, all passes.
    pub steps: u64,
    /// Measured shadow radius.
    #[serde(alias = "shadowRadius")]
    pub shadow_radius_measured: Option<f64>,
    /// 3√3 M.
    pub shadow_radius_theoretical: f64,
    /// Hit classes of the final pass.
    pub histogram: HitHistogram,
    /// Step statistics of the final pass.
    pub step_summary: StepSummary,
    /// When the render finished, RFC 3339 in UTC.
    pub timestamp: DateTime<Utc>,
    /// Wall time of the render.
    pub elapsed_seconds: f64,
}

impl RenderMetadata {
    /// Collect metadata for a finished render.
    pub fn from_render(
        params: &RenderParams,
        stats: &RenderStats,
        timestamp: DateTime<Utc>,
    ) -> Self {
        RenderMetadata {
            params: params.clone(),
            resolution: params.resolution,
            passes: stats.passes.clone(),
            rays: stats.rays,
            steps: stats.steps,
            shadow_radius_measured: stats.shadow_radius(),
            shadow_radius_theoretical: critical_impact_parameter(params.mass),
            histogram: stats.histogram,
            step_summary: StepSummary::from(&stats.step_stats),
            timestamp,
            elapsed_seconds: stats.elapsed.as_secs_f64(),
        }
    }

    /// Write as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| RenderError::Other(format!("metadata write error: {}", e)))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Read a metadata file.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader)
            .map_err(|e| RenderError::Other(format!("metadata parse error: {}", e)))
    }
}

/// Load render parameters from a JSON file; missing fields take defaults.
pub fn load_params(path: &Path) -> Result<RenderParams> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader)
        .map_err(|e| RenderError::Other(format!("config parse error in {}: {}", path.display(), e)))
}

/// `<label>_<YYYY-MM-DD_HH-MM-SS>`, shared by the image and metadata files.
pub fn output_basename(label: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{}_{}", label, timestamp.format("%Y-%m-%d_%H-%M-%S"))
}
