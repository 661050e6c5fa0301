// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::f64::consts::FRAC_PI_2;

use glam::DVec3;

use crate::camera::{cartesian_from_spherical, LocalFrame};
use crate::emission::DiskModel;
use crate::integrator::rk4_step;
use crate::params::PreparedParams;
use crate::spacetime::{
    lapse, metric_diagonal, null_invariant, photon_sphere_radius, polar_sin, RayState,
    Schwarzschild, IDX_PHI, IDX_R, IDX_THETA, IDX_UPHI, IDX_UR, IDX_UT, IDX_UTHETA,
};

/// Relative margin above the horizon at which a ray counts as captured.
pub const HORIZON_MARGIN: f64 = 1e-3;

/// Largest |null invariant| accepted for an initial state.
pub const NULL_TOLERANCE: f64 = 1e-6;

/// Accumulated |Δr| between two recorded debug path points.
pub const PATH_SAMPLE_DISTANCE: f64 = 0.05;

/// Largest null invariant, relative to the spatial kinetic term, tolerated
/// outside the photon sphere before a ray is declared numerically broken.
pub const DRIFT_TOLERANCE: f64 = 1e-3;

/// |θ - π/2| below which a ray starting exactly in the disk plane counts as
/// crossing it.
const PLANE_EPSILON: f64 = 1e-4;

/// Terminal classification of a traced ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HitClass {
    /// Reached the escape radius.
    Escape = 0,
    /// Fell through the horizon.
    Horizon = 1,
    /// Hit the accretion disk.
    Disk = 2,
    /// The state became non-finite.
    Numerical = 3,
    /// Ran out of integration steps.
    StepBudget = 4,
}

impl HitClass {
    /// All classes in code order.
    pub const ALL: [HitClass; 5] = [
        HitClass::Escape,
        HitClass::Horizon,
        HitClass::Disk,
        HitClass::Numerical,
        HitClass::StepBudget,
    ];

    /// One-byte code stored in the classification overlay.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`HitClass::code`].
    pub fn from_code(code: u8) -> Option<HitClass> {
        HitClass::ALL.get(code as usize).copied()
    }

    /// Short lowercase name.
    pub fn label(self) -> &'static str {
        match self {
            HitClass::Escape => "escape",
            HitClass::Horizon => "horizon",
            HitClass::Disk => "disk",
            HitClass::Numerical => "numerical",
            HitClass::StepBudget => "max",
        }
    }
}

/// Outcome of tracing one ray.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceResult {
    /// Linear-ish display colour in [0, 1].
    pub color: [f64; 3],
    /// How the ray terminated.
    pub hit: HitClass,
    /// Integration steps consumed.
    pub steps: u32,
    /// Sparse Cartesian path, when requested.
    pub path: Option<Vec<DVec3>>,
}

/// True if θ crossed the equatorial plane between two consecutive steps.
pub fn crosses_disk_plane(prev_theta: f64, theta: f64) -> bool {
    let prev_diff = prev_theta - FRAC_PI_2;
    let diff = theta - FRAC_PI_2;
    if prev_diff == 0.0 {
        diff.abs() < PLANE_EPSILON
    } else {
        prev_diff * diff <= 0.0
    }
}

/// Rescale the spatial velocity to unit metric norm and re-solve uᵗ so the
/// state is exactly null.
pub fn renormalize_null(mass: f64, state: &mut RayState) {
    let [_, grr, gthth, gphph] = metric_diagonal(mass, state[IDX_R], state[IDX_THETA]);
    let spatial = grr * state[IDX_UR] * state[IDX_UR]
        + gthth * state[IDX_UTHETA] * state[IDX_UTHETA]
        + gphph * state[IDX_UPHI] * state[IDX_UPHI];
    if spatial > 0.0 {
        let scale = 1.0 / spatial.sqrt();
        state[IDX_UR] *= scale;
        state[IDX_UTHETA] *= scale;
        state[IDX_UPHI] *= scale;
    }
    state[IDX_UT] = (1.0 / lapse(mass, state[IDX_R])).sqrt();
}

/// Initial ray state for a photon leaving `position` along the unit vector
/// `direction`.
pub fn initial_state(system: &Schwarzschild, position: DVec3, direction: DVec3) -> RayState {
    let frame = LocalFrame::at(position);
    let (d_r, d_theta, d_phi) = frame.project(direction);
    let r = frame.r;
    let theta = frame.theta;
    let f = lapse(system.mass, r);

    let ur = d_r * f.sqrt();
    let utheta = d_theta / r;
    let uphi = d_phi / (r * polar_sin(theta));

    let [_, grr, gthth, gphph] = metric_diagonal(system.mass, r, theta);
    let spatial = grr * ur * ur + gthth * utheta * utheta + gphph * uphi * uphi;
    let ut = (spatial / f).sqrt();

    let mut state = [0.0, r, theta, frame.phi, ut, ur, utheta, uphi];
    if null_invariant(system.mass, &state).abs() > NULL_TOLERANCE {
        renormalize_null(system.mass, &mut state);
    }
    state
}

/// |g_μν u^μ u^ν| divided by the spatial part of the norm.
pub fn relative_drift(mass: f64, state: &RayState) -> f64 {
    let [_, grr, gthth, gphph] = metric_diagonal(mass, state[IDX_R], state[IDX_THETA]);
    let spatial = grr * state[IDX_UR] * state[IDX_UR]
        + gthth * state[IDX_UTHETA] * state[IDX_UTHETA]
        + gphph * state[IDX_UPHI] * state[IDX_UPHI];
    let drift = null_invariant(mass, state).abs();
    if spatial > 0.0 {
        drift / spatial
    } else {
        drift
    }
}

/// Impact parameter b = L/E of a ray; `None` if the energy is not positive.
pub fn impact_parameter(mass: f64, state: &RayState) -> Option<f64> {
    let r = state[IDX_R];
    let energy = lapse(mass, r) * state[IDX_UT];
    if !(energy > 0.0) {
        return None;
    }
    let sin_theta = state[IDX_THETA].sin();
    let uth = state[IDX_UTHETA];
    let uph = state[IDX_UPHI];
    let l_squared = r * r * r * r * (uth * uth + sin_theta * sin_theta * uph * uph);
    let b = l_squared.max(0.0).sqrt() / energy;
    b.is_finite().then_some(b)
}

#[derive(Default)]
struct PathSampler {
    points: Vec<DVec3>,
    prev_r: Option<f64>,
    travelled: f64,
}

impl PathSampler {
    fn observe(&mut self, state: &RayState) {
        let r = state[IDX_R];
        match self.prev_r {
            None => self.record(state),
            Some(prev) => {
                self.travelled += (r - prev).abs();
                if self.travelled > PATH_SAMPLE_DISTANCE {
                    self.record(state);
                }
            }
        }
        self.prev_r = Some(r);
    }

    fn record(&mut self, state: &RayState) {
        self.points.push(cartesian_from_spherical(
            state[IDX_R],
            state[IDX_THETA],
            state[IDX_PHI],
        ));
        self.travelled = 0.0;
    }
}

/// Integrates single rays through the Schwarzschild geometry of one pass.
///
/// Holds no mutable state, so one tracer can serve any number of rays and
/// identical inputs always give identical results.
#[derive(Debug, Clone)]
pub struct GeodesicTracer {
    system: Schwarzschild,
    step_size: f64,
    max_steps: u32,
    capture_radius: f64,
    photon_sphere: f64,
    escape_radius: f64,
    disk: DiskModel,
    background: [f64; 3],
}

impl GeodesicTracer {
    /// Build a tracer from pass-effective parameters.
    pub fn new(params: &PreparedParams) -> Self {
        let system = Schwarzschild::new(params.mass());
        GeodesicTracer {
            capture_radius: system.horizon_radius() * (1.0 + HORIZON_MARGIN),
            photon_sphere: photon_sphere_radius(system.mass),
            system,
            step_size: params.step_size,
            max_steps: params.max_steps,
            escape_radius: params.escape_radius,
            disk: DiskModel::from_params(params),
            background: params.raw.background_color,
        }
    }

    /// The spacetime being integrated.
    pub fn system(&self) -> &Schwarzschild {
        &self.system
    }

    /// Trace one ray until it terminates or exhausts the step budget.
    ///
    /// A photon moving inwards inside the photon sphere cannot turn around,
    /// so once one has been seen plunging, any later increase in r is a
    /// step straddling the horizon and the ray counts as captured.
    pub fn trace(&self, state: &RayState, capture_path: bool) -> TraceResult {
        let mut sampler = capture_path.then(PathSampler::default);
        let mut current = *state;
        let mut prev_theta = current[IDX_THETA];
        let mut prev_r = current[IDX_R];
        let mut plunging = false;

        for i in 0..self.max_steps {
            if let Some(s) = sampler.as_mut() {
                s.observe(&current);
            }
            plunging |= current[IDX_R] < self.photon_sphere && current[IDX_UR] < 0.0;

            let next = rk4_step(&self.system, &current, self.step_size);
            let steps = i + 1;
            let r = next[IDX_R];
            let theta = next[IDX_THETA];

            let terminal = if !r.is_finite() || !theta.is_finite() {
                Some((self.background, HitClass::Numerical))
            } else if r <= self.capture_radius || (plunging && r > current[IDX_R]) {
                Some(([0.0; 3], HitClass::Horizon))
            } else if r >= self.photon_sphere
                && relative_drift(self.system.mass, &next) > DRIFT_TOLERANCE
            {
                Some((self.background, HitClass::Numerical))
            } else if r >= self.escape_radius {
                Some((self.background, HitClass::Escape))
            } else if crosses_disk_plane(prev_theta, theta) {
                let radius = 0.5 * (prev_r + r);
                (radius >= self.disk.inner && radius <= self.disk.outer)
                    .then(|| (self.disk.shade(radius, &next), HitClass::Disk))
            } else {
                None
            };

            if let Some((color, hit)) = terminal {
                if let Some(s) = sampler.as_mut() {
                    if hit != HitClass::Numerical {
                        s.record(&next);
                    }
                }
                return TraceResult {
                    color,
                    hit,
                    steps,
                    path: sampler.map(|s| s.points),
                };
            }

            current = next;
            prev_theta = theta;
            prev_r = r;
        }

        TraceResult {
            color: self.background,
            hit: HitClass::StepBudget,
            steps: self.max_steps,
            path: sampler.map(|s| s.points),
        }
    }
}
