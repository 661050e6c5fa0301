// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::params::PreparedParams;
use crate::spacetime::{lapse, RayState, IDX_R, IDX_THETA, IDX_UPHI, IDX_UT};

/// Stefan–Boltzmann constant (W m⁻² K⁻⁴).
pub const STEFAN_BOLTZMANN: f64 = 5.670374419e-8;

/// Temperature at which the colour response is normalised (solar, K).
pub const REFERENCE_TEMPERATURE: f64 = 5778.0;

/// Exponent of the radial flux profile.
const FLUX_EXPONENT: f64 = -0.75;

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Black-body-like colour for temperature `temp` (K).
///
/// Continuous power-law channel responses, so neighbouring temperatures never
/// band.
pub fn temperature_to_rgb(temp: f64) -> [f64; 3] {
    let t = (temp / REFERENCE_TEMPERATURE).max(0.0);
    [
        clamp01(1.5 * t.powf(0.6)),
        clamp01(1.2 * t.powf(0.5)),
        clamp01(2.0 * t.powf(0.4)),
    ]
}

/// sRGB transfer function for a linear value in [0, 1].
pub fn linear_to_srgb(x: f64) -> f64 {
    if x <= 0.0031308 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

/// Exponential exposure curve followed by gamma encoding, clamped per channel.
pub fn tone_map(rgb: [f64; 3], exposure: f64) -> [f64; 3] {
    rgb.map(|c| clamp01(linear_to_srgb(1.0 - (-c * exposure).exp())))
}

/// Keplerian angular velocity ω = √(M/r³).
pub fn disk_angular_velocity(mass: f64, r: f64) -> f64 {
    (mass / (r * r * r)).sqrt()
}

/// (uᵗ, u^φ) of a circular equatorial orbit at radius `r`.
///
/// `None` at or inside the photon sphere, where no timelike circular orbit
/// exists.
pub fn disk_four_velocity(mass: f64, r: f64) -> Option<(f64, f64)> {
    let denom = 1.0 - 3.0 * mass / r;
    if denom.is_nan() || denom <= 0.0 {
        return None;
    }
    let ut = 1.0 / denom.sqrt();
    Some((ut, disk_angular_velocity(mass, r) * ut))
}

/// Photon energy at infinity E = f·uᵗ.
pub fn energy_at_infinity(mass: f64, state: &RayState) -> f64 {
    lapse(mass, state[IDX_R]) * state[IDX_UT]
}

/// Combined gravitational and Doppler shift factor for disk emission.
///
/// Returns 0 for the degenerate cases (no circular orbit, non-positive or
/// non-finite denominator).
pub fn shift_factor(mass: f64, state: &RayState) -> f64 {
    let r = state[IDX_R];
    let Some((disk_ut, disk_uphi)) = disk_four_velocity(mass, r) else {
        return 0.0;
    };
    let sin_theta = state[IDX_THETA].sin();
    let p_t = -lapse(mass, r) * state[IDX_UT];
    let p_phi = r * r * sin_theta * sin_theta * state[IDX_UPHI];
    let denominator = -(p_t * disk_ut + p_phi * disk_uphi);
    if !denominator.is_finite() || denominator <= 0.0 {
        return 0.0;
    }
    energy_at_infinity(mass, state) / denominator
}

/// Thin-disk emission model for one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskModel {
    /// Black hole mass.
    pub mass: f64,
    /// Inner disk radius.
    pub inner: f64,
    /// Outer disk radius.
    pub outer: f64,
    /// Flux scale.
    pub brightness: f64,
    /// Tone mapping exposure.
    pub exposure: f64,
}

impl DiskModel {
    /// Take the disk settings from prepared parameters.
    pub fn from_params(params: &PreparedParams) -> Self {
        DiskModel {
            mass: params.raw.mass,
            inner: params.raw.disk_inner_radius,
            outer: params.raw.disk_outer_radius,
            brightness: params.raw.disk_brightness,
            exposure: params.raw.exposure,
        }
    }

    /// Effective temperature of the disk at radius `r`.
    pub fn temperature(&self, r: f64) -> f64 {
        let inner = self.inner.max(2.01 * self.mass);
        let outer = self.outer.max(inner + 1.0);
        let clamped = r.clamp(inner, outer);
        let flux = self.brightness * (clamped / inner).powf(FLUX_EXPONENT);
        (flux / STEFAN_BOLTZMANN).powf(0.25)
    }

    /// Final colour of a disk crossing at radius `r` seen along `state`.
    pub fn shade(&self, r: f64, state: &RayState) -> [f64; 3] {
        let g = shift_factor(self.mass, state);
        if g <= 0.0 {
            return [0.0; 3];
        }
        let boost = g.powi(4);
        let base = temperature_to_rgb(self.temperature(r));
        tone_map(base.map(|c| c * boost), self.exposure)
    }
}
