// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use glam::DVec3;

/// Spherical coordinates (r, θ, φ) of a Cartesian point, z-up.
pub fn spherical_from_cartesian(v: DVec3) -> (f64, f64, f64) {
    let r = v.length();
    if r == 0.0 {
        return (0.0, std::f64::consts::FRAC_PI_2, 0.0);
    }
    let theta = (v.z / r).clamp(-1.0, 1.0).acos();
    let phi = v.y.atan2(v.x);
    (r, theta, phi)
}

/// Cartesian point for spherical coordinates (r, θ, φ), z-up.
pub fn cartesian_from_spherical(r: f64, theta: f64, phi: f64) -> DVec3 {
    let sin_theta = theta.sin();
    DVec3::new(
        r * sin_theta * phi.cos(),
        r * sin_theta * phi.sin(),
        r * theta.cos(),
    )
}

/// Orthonormal (radial, polar, azimuthal) frame at a point.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    /// Radius of the point.
    pub r: f64,
    /// Polar angle of the point.
    pub theta: f64,
    /// Azimuth of the point.
    pub phi: f64,
    /// Unit vector along increasing r.
    pub radial: DVec3,
    /// Unit vector along increasing θ.
    pub polar: DVec3,
    /// Unit vector along increasing φ.
    pub azimuthal: DVec3,
}

impl LocalFrame {
    /// Build the frame at Cartesian `position`.
    pub fn at(position: DVec3) -> Self {
        let (r, theta, phi) = spherical_from_cartesian(position);
        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        LocalFrame {
            r,
            theta,
            phi,
            radial: DVec3::new(st * cp, st * sp, ct),
            polar: DVec3::new(ct * cp, ct * sp, -st),
            azimuthal: DVec3::new(-sp, cp, 0.0),
        }
    }

    /// Components of `direction` along (radial, polar, azimuthal).
    pub fn project(&self, direction: DVec3) -> (f64, f64, f64) {
        (
            direction.dot(self.radial),
            direction.dot(self.polar),
            direction.dot(self.azimuthal),
        )
    }
}

/// Pinhole camera looking at the black hole from a fixed position.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// Cartesian camera position.
    pub position: DVec3,
    /// Unit view direction (towards the origin).
    pub forward: DVec3,
    /// Unit screen-right vector.
    pub right: DVec3,
    /// Unit screen-up vector.
    pub up: DVec3,
    /// Horizontal field of view in degrees.
    pub fov_degrees: f64,
}

impl Camera {
    /// Place the camera at (distance, θ, φ) looking at the origin.
    pub fn looking_at_origin(distance: f64, theta: f64, phi: f64, fov_degrees: f64) -> Self {
        let position = cartesian_from_spherical(distance, theta, phi);
        let forward = (-position).normalize_or_zero();

        // Fall back to +y when looking straight down the z axis.
        let mut world_up = DVec3::Z;
        if forward.cross(world_up).length() < 1e-6 {
            world_up = DVec3::Y;
        }
        let right = forward.cross(world_up).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();

        Camera {
            position,
            forward,
            right,
            up,
            fov_degrees,
        }
    }

    /// Unit view direction through the centre of pixel (x, y).
    pub fn pixel_direction(&self, x: u32, y: u32, width: u32, height: u32) -> DVec3 {
        let aspect = width as f64 / height as f64;
        let scale = (self.fov_degrees.to_radians() / 2.0).tan();
        let ndc_x = (2.0 * ((x as f64 + 0.5) / width as f64) - 1.0) * scale * aspect;
        let ndc_y = (1.0 - 2.0 * ((y as f64 + 0.5) / height as f64)) * scale;
        (self.forward + self.right * ndc_x + self.up * ndc_y).normalize_or_zero()
    }
}
