// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! A tile-parallel renderer for null geodesics around a Schwarzschild black
//! hole.
//!
//! Each pixel's photon is traced backwards from a pinhole camera through the
//! curved spacetime with a fixed-step RK4 integrator until it falls into the
//! horizon, escapes, or crosses a thin accretion disk. Frames are rendered in
//! progressively finer passes by a pool of workers, and the finest pass also
//! measures the apparent radius of the black hole shadow, which should match
//! 3√3 M.

#![warn(missing_docs)]

/// Pinhole camera and spherical/Cartesian conversions.
pub mod camera;
/// Thin-disk emission, redshift and tone mapping.
pub mod emission;
/// Error types for the library.
pub mod error;
/// Frame assembly, overlays and render statistics.
pub mod frame;
/// Fixed-step Runge-Kutta integration.
pub mod integrator;
/// PNG and JSON export.
pub mod io;
/// Render parameters, validation and per-pass scaling.
pub mod params;
/// Progressive multi-pass render controller.
pub mod scheduler;
/// Schwarzschild metric, connection and geodesic equations.
pub mod spacetime;
/// Tiles and the worker-side tile renderer.
pub mod tile;
/// Single-ray geodesic tracing and hit classification.
pub mod tracer;

pub use crate::error::{RenderError, Result};
pub use crate::frame::FrameBuffer;
pub use crate::params::RenderParams;
pub use crate::scheduler::{CancelToken, RenderController, RenderProgress, RenderStatus};
pub use crate::tracer::{GeodesicTracer, HitClass};
