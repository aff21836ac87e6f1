//! Snooker Sim - Discrete-event billiard physics
//!
//! Core modules:
//! - `adt`: Handle-addressable AVL priority queue
//! - `math`: Polynomial root finding and frame rotations
//! - `sim`: Balls, table, tiles, motion model, events and the two engines
//! - `settings`: Numeric tolerances passed into every run
//! - `error`: Invalid-usage errors surfaced to callers

pub mod adt;
pub mod error;
pub mod math;
pub mod settings;
pub mod sim;

pub use error::SimError;
pub use settings::SimSettings;
pub use sim::{
    Ball, BallId, BallKind, CueShot, Event, EventKind, EventHandler, Flow, InTimeSimulation,
    MotionPhase, PrescheduledSimulation, Simulation, Table,
};

use glam::{DVec2, DVec3};

/// Physical constants (SI units)
pub mod consts {
    /// Gravitational acceleration (m/s²)
    pub const GRAVITY: f64 = 9.81;

    /// Standard snooker ball
    pub const BALL_RADIUS: f64 = 0.02625;
    pub const BALL_MASS: f64 = 0.120;

    /// Cloth friction coefficients
    pub const SLIDING_FRICTION: f64 = 0.2;
    pub const ROLLING_FRICTION: f64 = 0.016;
    /// Friction against spin about the vertical axis
    pub const SPINNING_FRICTION: f64 = 0.044;

    /// Full-size table (playing surface, metres)
    pub const TABLE_WIDTH: f64 = 1.778;
    pub const TABLE_LENGTH: f64 = 3.569;
    pub const POCKET_RADIUS: f64 = 0.045;
    pub const POCKET_CORNER_RADIUS: f64 = 0.045;

    /// Spot layout measured from the baulk cushion
    pub const BAULK_LINE: f64 = 0.737;
    pub const D_RADIUS: f64 = 0.292;
    pub const BLACK_SPOT_DISTANCE: f64 = 0.324;

    /// Typical cue mass (kg)
    pub const CUE_MASS: f64 = 0.550;
}

/// Rotate a vector counter-clockwise by `angle` radians
#[inline]
pub fn rotate(v: DVec2, angle: f64) -> DVec2 {
    DVec2::from_angle(angle).rotate(v)
}

/// Horizontal part of a 3D vector
#[inline]
pub fn planar(v: DVec3) -> DVec2 {
    DVec2::new(v.x, v.y)
}

/// Unit vector along `v`, zero when `v` is (numerically) zero
#[inline]
pub fn direction(v: DVec2) -> DVec2 {
    v.try_normalize().unwrap_or(DVec2::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rotate_quarter_turn() {
        let r = rotate(DVec2::X, FRAC_PI_2);
        assert!((r - DVec2::Y).length() < 1e-12);
    }

    #[test]
    fn test_direction_of_zero() {
        assert_eq!(direction(DVec2::ZERO), DVec2::ZERO);
        assert!((direction(DVec2::new(3.0, 4.0)) - DVec2::new(0.6, 0.8)).length() < 1e-12);
    }
}
