// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::error::{RenderError, Result};
use crate::spacetime::horizon_radius;

/// Step budget floor applied to coarse passes.
pub const MIN_PASS_STEPS: u32 = 400;

/// Render parameters as supplied by the control surface or the CLI.
///
/// Immutable for the duration of a render; see [`RenderParams::prepare`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderParams {
    /// Black hole mass M (geometric units).
    pub mass: f64,
    /// Camera distance from the origin.
    pub camera_distance: f64,
    /// Camera polar angle in radians.
    pub camera_theta: f64,
    /// Camera azimuth in radians.
    pub camera_phi: f64,
    /// Field of view in degrees.
    pub field_of_view: f64,
    /// Inner accretion disk radius.
    pub disk_inner_radius: f64,
    /// Outer accretion disk radius.
    pub disk_outer_radius: f64,
    /// Disk flux scale.
    pub disk_brightness: f64,
    /// Square frame edge length in pixels.
    pub resolution: u32,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Integration step budget per ray.
    pub max_steps: u32,
    /// Fixed RK4 step size in the affine parameter.
    pub step_size: f64,
    /// Tone mapping exposure.
    pub exposure: f64,
    /// Linear RGB colour for escaped rays.
    pub background_color: [f64; 3],
    /// Escape radius; defaults to 4x the camera distance.
    pub escape_radius: Option<f64>,
    /// Enables the overlays below.
    pub scientific_mode: bool,
    /// Record a hit-classification map.
    pub show_hit_classification: bool,
    /// Record a step-count map.
    pub show_heatmap: bool,
}

impl Default for RenderParams {
    fn default() -> Self {
        RenderParams {
            mass: 1.0,
            camera_distance: 30.0,
            camera_theta: 1.2,
            camera_phi: 0.0,
            field_of_view: 45.0,
            disk_inner_radius: 6.0,
            disk_outer_radius: 30.0,
            disk_brightness: 1.0,
            resolution: 800,
            tile_size: 128,
            max_steps: 24000,
            step_size: 0.04,
            exposure: 1.15,
            background_color: [0.04, 0.04, 0.12],
            escape_radius: None,
            scientific_mode: true,
            show_hit_classification: true,
            show_heatmap: false,
        }
    }
}

fn positive_finite(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RenderError::InvalidParameter {
            name,
            value,
            reason: "must be positive and finite",
        });
    }
    Ok(())
}

fn nonzero(name: &'static str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(RenderError::InvalidParameter {
            name,
            value: 0.0,
            reason: "must be at least 1",
        });
    }
    Ok(())
}

impl RenderParams {
    /// Reject physically or numerically invalid parameter sets.
    ///
    /// # Errors
    /// Returns a domain error for a non-positive mass, a camera at or inside
    /// the horizon, or any out-of-range scalar.
    pub fn validate(&self) -> Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(RenderError::InvalidMass(self.mass));
        }
        let horizon = horizon_radius(self.mass);
        if !self.camera_distance.is_finite() || self.camera_distance <= horizon {
            return Err(RenderError::CameraInsideHorizon {
                distance: self.camera_distance,
                horizon,
            });
        }
        for (name, angle) in [
            ("camera_theta", self.camera_theta),
            ("camera_phi", self.camera_phi),
        ] {
            if !angle.is_finite() {
                return Err(RenderError::InvalidParameter {
                    name,
                    value: angle,
                    reason: "must be finite",
                });
            }
        }
        if !self.field_of_view.is_finite()
            || self.field_of_view <= 0.0
            || self.field_of_view >= 180.0
        {
            return Err(RenderError::InvalidParameter {
                name: "field_of_view",
                value: self.field_of_view,
                reason: "must lie strictly between 0 and 180 degrees",
            });
        }
        if !self.disk_inner_radius.is_finite()
            || !self.disk_outer_radius.is_finite()
            || self.disk_inner_radius < 0.0
            || self.disk_outer_radius <= self.disk_inner_radius
        {
            return Err(RenderError::InvalidDiskRadii {
                inner: self.disk_inner_radius,
                outer: self.disk_outer_radius,
            });
        }
        if !self.disk_brightness.is_finite() || self.disk_brightness < 0.0 {
            return Err(RenderError::InvalidParameter {
                name: "disk_brightness",
                value: self.disk_brightness,
                reason: "must be non-negative and finite",
            });
        }
        nonzero("resolution", self.resolution)?;
        nonzero("tile_size", self.tile_size)?;
        nonzero("max_steps", self.max_steps)?;
        positive_finite("step_size", self.step_size)?;
        positive_finite("exposure", self.exposure)?;
        for c in self.background_color {
            if !c.is_finite() || !(0.0..=1.0).contains(&c) {
                return Err(RenderError::InvalidParameter {
                    name: "background_color",
                    value: c,
                    reason: "channels must lie in [0, 1]",
                });
            }
        }
        if let Some(escape) = self.escape_radius {
            if !escape.is_finite() || escape <= self.camera_distance {
                return Err(RenderError::InvalidParameter {
                    name: "escape_radius",
                    value: escape,
                    reason: "must exceed the camera distance",
                });
            }
        }
        Ok(())
    }

    /// Validate and derive the camera and escape radius.
    ///
    /// # Errors
    /// Propagates any error from [`RenderParams::validate`].
    pub fn prepare(&self) -> Result<PreparedParams> {
        self.validate()?;
        let camera = Camera::looking_at_origin(
            self.camera_distance,
            self.camera_theta,
            self.camera_phi,
            self.field_of_view,
        );
        Ok(PreparedParams {
            escape_radius: self.escape_radius.unwrap_or(4.0 * self.camera_distance),
            camera,
            step_size: self.step_size,
            max_steps: self.max_steps,
            raw: self.clone(),
        })
    }
}

/// Which per-pixel overlays a tile should record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayFlags {
    /// Hit-classification map.
    pub classification: bool,
    /// Step-count map.
    pub heatmap: bool,
}

impl OverlayFlags {
    /// True when at least one overlay is recorded.
    pub fn any(&self) -> bool {
        self.classification || self.heatmap
    }
}

/// Validated parameters with the derived quantities every tile needs.
///
/// `step_size` and `max_steps` are the effective values for the current
/// pass; the originals stay in `raw`.
#[derive(Debug, Clone)]
pub struct PreparedParams {
    /// The parameters as supplied.
    pub raw: RenderParams,
    /// Camera derived from distance and angles.
    pub camera: Camera,
    /// Resolved escape radius.
    pub escape_radius: f64,
    /// Effective step size.
    pub step_size: f64,
    /// Effective step budget.
    pub max_steps: u32,
}

impl PreparedParams {
    /// Black hole mass.
    pub fn mass(&self) -> f64 {
        self.raw.mass
    }

    /// Overlays requested by the parameters; none outside scientific mode.
    pub fn overlays(&self) -> OverlayFlags {
        if !self.raw.scientific_mode {
            return OverlayFlags::default();
        }
        OverlayFlags {
            classification: self.raw.show_hit_classification,
            heatmap: self.raw.show_heatmap,
        }
    }

    /// Parameters for a pass sampling every `stride`-th pixel: the step size
    /// grows and the step budget shrinks in proportion to the stride.
    pub fn for_pass(&self, stride: u32) -> PreparedParams {
        let stride = stride.max(1);
        let floor = MIN_PASS_STEPS.min(self.raw.max_steps);
        PreparedParams {
            step_size: self.raw.step_size * stride as f64,
            max_steps: self.raw.max_steps.div_ceil(stride).max(floor),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let prepared = RenderParams::default().prepare().unwrap();
        assert_eq!(prepared.escape_radius, 120.0);
        assert!((prepared.camera.position.length() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_mass() {
        let params = RenderParams {
            mass: 0.0,
            ..RenderParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(RenderError::InvalidMass(_))
        ));
    }

    #[test]
    fn rejects_camera_at_horizon() {
        let params = RenderParams {
            mass: 2.0,
            camera_distance: 4.0,
            ..RenderParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(RenderError::CameraInsideHorizon { .. })
        ));
    }

    #[test]
    fn rejects_inverted_disk() {
        let params = RenderParams {
            disk_inner_radius: 10.0,
            disk_outer_radius: 8.0,
            ..RenderParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(RenderError::InvalidDiskRadii { .. })
        ));
    }

    #[test]
    fn rejects_escape_inside_camera() {
        let params = RenderParams {
            escape_radius: Some(20.0),
            ..RenderParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(RenderError::InvalidParameter {
                name: "escape_radius",
                ..
            })
        ));
    }

    #[test]
    fn explicit_escape_radius_wins() {
        let params = RenderParams {
            escape_radius: Some(75.0),
            ..RenderParams::default()
        };
        assert_eq!(params.prepare().unwrap().escape_radius, 75.0);
    }

    #[test]
    fn pass_scaling() {
        let prepared = RenderParams::default().prepare().unwrap();
        let coarse = prepared.for_pass(8);
        assert!((coarse.step_size - 0.32).abs() < 1e-12);
        assert_eq!(coarse.max_steps, 3000);
        let fine = prepared.for_pass(1);
        assert_eq!(fine.max_steps, 24000);
        assert_eq!(fine.step_size, 0.04);
    }

    #[test]
    fn pass_scaling_respects_floor() {
        let params = RenderParams {
            max_steps: 1000,
            ..RenderParams::default()
        };
        let prepared = params.prepare().unwrap();
        assert_eq!(prepared.for_pass(10).max_steps, MIN_PASS_STEPS);

        let tiny = RenderParams {
            max_steps: 50,
            ..RenderParams::default()
        };
        assert_eq!(tiny.prepare().unwrap().for_pass(10).max_steps, 50);
    }

    #[test]
    fn overlays_need_scientific_mode() {
        let params = RenderParams {
            scientific_mode: false,
            show_heatmap: true,
            ..RenderParams::default()
        };
        assert!(!params.prepare().unwrap().overlays().any());
    }

    #[test]
    fn json_uses_camel_case_and_defaults() {
        let params: RenderParams =
            serde_json::from_str(r#"{"mass": 2.0, "cameraDistance": 40.0, "showHeatmap": true}"#)
                .unwrap();
        assert_eq!(params.mass, 2.0);
        assert_eq!(params.camera_distance, 40.0);
        assert!(params.show_heatmap);
        assert_eq!(params.tile_size, 128);
    }
}
