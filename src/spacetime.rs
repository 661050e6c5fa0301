// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::integrator::OdeSystem;

/// Ray state: spacetime position (t, r, θ, φ) followed by the 4-velocity
/// (uᵗ, uʳ, u^θ, u^φ).
pub type RayState = [f64; 8];

/// Index of the coordinate time.
pub const IDX_T: usize = 0;
/// Index of the radius.
pub const IDX_R: usize = 1;
/// Index of the polar angle.
pub const IDX_THETA: usize = 2;
/// Index of the azimuth.
pub const IDX_PHI: usize = 3;
/// Index of uᵗ.
pub const IDX_UT: usize = 4;
/// Index of uʳ.
pub const IDX_UR: usize = 5;
/// Index of u^θ.
pub const IDX_UTHETA: usize = 6;
/// Index of u^φ.
pub const IDX_UPHI: usize = 7;

/// Smallest |sin θ| allowed in a denominator near the poles.
pub const SIN_THETA_FLOOR: f64 = 1e-6;

/// The lapse function f(r) = 1 - 2M/r.
pub fn lapse(mass: f64, r: f64) -> f64 {
    debug_assert!(r > 0.0, "lapse evaluated at r = {}", r);
    1.0 - 2.0 * mass / r
}

/// Event horizon radius 2M.
pub fn horizon_radius(mass: f64) -> f64 {
    2.0 * mass
}

/// Photon sphere radius 3M.
pub fn photon_sphere_radius(mass: f64) -> f64 {
    3.0 * mass
}

/// Critical impact parameter 3√3·M separating captured from escaping photons.
/// This is also the theoretical shadow radius seen by a distant observer.
pub fn critical_impact_parameter(mass: f64) -> f64 {
    3.0 * 3.0_f64.sqrt() * mass
}

/// sin θ with its magnitude clamped to [`SIN_THETA_FLOOR`], keeping the sign.
///
/// Every term that divides by sin θ goes through this one guard.
pub fn polar_sin(theta: f64) -> f64 {
    let s = theta.sin();
    if s.abs() >= SIN_THETA_FLOOR {
        s
    } else if s < 0.0 {
        -SIN_THETA_FLOOR
    } else {
        SIN_THETA_FLOOR
    }
}

/// Diagonal metric components (g_tt, g_rr, g_θθ, g_φφ) at (r, θ).
pub fn metric_diagonal(mass: f64, r: f64, theta: f64) -> [f64; 4] {
    let f = lapse(mass, r);
    let sin_theta = theta.sin();
    let r2 = r * r;
    [-f, 1.0 / f, r2, r2 * sin_theta * sin_theta]
}

/// Nonzero connection coefficients of the Schwarzschild metric.
///
/// Symmetric partners (Γ^μ_βα = Γ^μ_αβ) are implied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Christoffel {
    /// Γᵗ_tr
    pub t_tr: f64,
    /// Γʳ_tt
    pub r_tt: f64,
    /// Γʳ_rr
    pub r_rr: f64,
    /// Γʳ_θθ
    pub r_thth: f64,
    /// Γʳ_φφ
    pub r_phph: f64,
    /// Γ^θ_rθ
    pub th_rth: f64,
    /// Γ^θ_φφ
    pub th_phph: f64,
    /// Γ^φ_rφ
    pub ph_rph: f64,
    /// Γ^φ_θφ
    pub ph_thph: f64,
}

impl Christoffel {
    /// Evaluate the connection at radius `r` given sin θ and cos θ.
    ///
    /// `sin_theta` is used as a divisor for Γ^φ_θφ; callers pass it through
    /// [`polar_sin`] first.
    pub fn new(mass: f64, r: f64, sin_theta: f64, cos_theta: f64) -> Self {
        let f = lapse(mass, r);
        let r2 = r * r;
        Christoffel {
            t_tr: mass / (r2 * f),
            r_tt: mass * f / r2,
            r_rr: -mass / (r2 * f),
            r_thth: -r * f,
            r_phph: -r * f * sin_theta * sin_theta,
            th_rth: 1.0 / r,
            th_phph: -sin_theta * cos_theta,
            ph_rph: 1.0 / r,
            ph_thph: cos_theta / sin_theta,
        }
    }
}

/// Null geodesic system of a static, non-rotating mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schwarzschild {
    /// Black hole mass M in geometric units.
    pub mass: f64,
}

impl Schwarzschild {
    /// Create the system for mass `mass`.
    pub fn new(mass: f64) -> Self {
        Schwarzschild { mass }
    }

    /// Horizon radius 2M.
    pub fn horizon_radius(&self) -> f64 {
        horizon_radius(self.mass)
    }

    /// Geodesic equation: dx^μ/dλ = u^μ, du^μ/dλ = -Γ^μ_αβ u^α u^β.
    pub fn geodesic_rhs(&self, state: &RayState) -> RayState {
        let r = state[IDX_R];
        let theta = state[IDX_THETA];
        let ut = state[IDX_UT];
        let ur = state[IDX_UR];
        let uth = state[IDX_UTHETA];
        let uph = state[IDX_UPHI];

        let g = Christoffel::new(self.mass, r, polar_sin(theta), theta.cos());

        let mut out = [0.0; 8];
        out[IDX_T] = ut;
        out[IDX_R] = ur;
        out[IDX_THETA] = uth;
        out[IDX_PHI] = uph;
        out[IDX_UT] = -2.0 * g.t_tr * ut * ur;
        out[IDX_UR] = -g.r_tt * ut * ut
            - g.r_rr * ur * ur
            - g.r_thth * uth * uth
            - g.r_phph * uph * uph;
        out[IDX_UTHETA] = -2.0 * g.th_rth * ur * uth - g.th_phph * uph * uph;
        out[IDX_UPHI] = -2.0 * g.ph_rph * ur * uph - 2.0 * g.ph_thph * uth * uph;
        out
    }
}

impl OdeSystem<8> for Schwarzschild {
    fn derivative(&self, state: &RayState) -> RayState {
        self.geodesic_rhs(state)
    }
}

/// Null-energy invariant g_μν u^μ u^ν; zero for an exact light ray.
pub fn null_invariant(mass: f64, state: &RayState) -> f64 {
    let [gtt, grr, gthth, gphph] = metric_diagonal(mass, state[IDX_R], state[IDX_THETA]);
    let ut = state[IDX_UT];
    let ur = state[IDX_UR];
    let uth = state[IDX_UTHETA];
    let uph = state[IDX_UPHI];
    gtt * ut * ut + grr * ur * ur + gthth * uth * uth + gphph * uph * uph
}
