// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

use crate::tile::Tile;

/// Errors that can occur during render setup, tile rendering, or export.
#[derive(Debug)]
pub enum RenderError {
    /// Black hole mass is not positive and finite.
    InvalidMass(f64),
    /// Camera sits at or inside the event horizon.
    CameraInsideHorizon {
        /// The requested camera distance.
        distance: f64,
        /// The horizon radius 2M.
        horizon: f64,
    },
    /// A scalar parameter is outside its valid range.
    InvalidParameter {
        /// The parameter name.
        name: &'static str,
        /// The value provided.
        value: f64,
        /// Explanation of the constraint.
        reason: &'static str,
    },
    /// Disk radii are not ordered or not finite.
    InvalidDiskRadii {
        /// Inner disk radius.
        inner: f64,
        /// Outer disk radius.
        outer: f64,
    },
    /// Pass schedule is empty, not decreasing, or does not end at stride 1.
    InvalidPasses(Vec<u32>),
    /// A tile request does not fit inside the frame.
    TileOutOfBounds {
        /// The offending tile.
        tile: Tile,
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
    },
    /// A worker failed while rendering a tile. The whole render is aborted.
    WorkerFault {
        /// Index of the pass the tile belonged to.
        pass: usize,
        /// The tile being rendered.
        tile: Tile,
        /// The worker's error message, verbatim.
        message: String,
    },
    /// The render was stopped by an explicit cancellation request.
    Cancelled,
    /// Output file extension is not supported.
    UnsupportedFileFormat(String),
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidMass(m) => {
                write!(f, "invalid mass: {} (must be positive and finite)", m)
            }
            RenderError::CameraInsideHorizon { distance, horizon } => {
                write!(
                    f,
                    "camera distance {} is at or inside the event horizon r = {}",
                    distance, horizon
                )
            }
            RenderError::InvalidParameter {
                name,
                value,
                reason,
            } => {
                write!(f, "invalid {}: {} ({})", name, value, reason)
            }
            RenderError::InvalidDiskRadii { inner, outer } => {
                write!(
                    f,
                    "invalid disk radii: inner {} outer {} (need 0 <= inner < outer)",
                    inner, outer
                )
            }
            RenderError::InvalidPasses(passes) => {
                write!(
                    f,
                    "invalid pass schedule {:?} (must be non-empty, decreasing, ending at 1)",
                    passes
                )
            }
            RenderError::TileOutOfBounds {
                tile,
                width,
                height,
            } => {
                write!(
                    f,
                    "tile at ({}, {}) size {}x{} exceeds frame {}x{}",
                    tile.x, tile.y, tile.width, tile.height, width, height
                )
            }
            RenderError::WorkerFault {
                pass,
                tile,
                message,
            } => {
                write!(
                    f,
                    "worker failed on pass {} tile ({}, {}): {}",
                    pass, tile.x, tile.y, message
                )
            }
            RenderError::Cancelled => write!(f, "render cancelled"),
            RenderError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            RenderError::IoError(e) => write!(f, "I/O error: {}", e),
            RenderError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::IoError(e)
    }
}

/// Convenience type alias for Results with RenderError.
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_mass() {
        let e = RenderError::InvalidMass(-1.0);
        assert_eq!(
            e.to_string(),
            "invalid mass: -1 (must be positive and finite)"
        );
    }

    #[test]
    fn display_camera_inside_horizon() {
        let e = RenderError::CameraInsideHorizon {
            distance: 1.5,
            horizon: 2.0,
        };
        assert_eq!(
            e.to_string(),
            "camera distance 1.5 is at or inside the event horizon r = 2"
        );
    }

    #[test]
    fn display_invalid_parameter() {
        let e = RenderError::InvalidParameter {
            name: "step_size",
            value: 0.0,
            reason: "must be positive and finite",
        };
        assert_eq!(
            e.to_string(),
            "invalid step_size: 0 (must be positive and finite)"
        );
    }

    #[test]
    fn display_worker_fault_keeps_message() {
        let e = RenderError::WorkerFault {
            pass: 2,
            tile: Tile {
                x: 64,
                y: 0,
                width: 64,
                height: 64,
            },
            message: "boom".to_string(),
        };
        assert_eq!(e.to_string(), "worker failed on pass 2 tile (64, 0): boom");
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e = RenderError::IoError(io_err);
        assert!(e.to_string().contains("file not found"));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let e: RenderError = io_err.into();
        assert!(matches!(e, RenderError::IoError(_)));
    }

    #[test]
    fn display_invalid_passes() {
        let e = RenderError::InvalidPasses(vec![4, 2]);
        assert!(e.to_string().contains("[4, 2]"));
    }
}
