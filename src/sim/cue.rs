//! Cue impact model and shot perturbation
//!
//! The cue is treated as a rigid body striking the ball at an offset from
//! the centre line. The impulse gives linear velocity along the heading and
//! spin from the off-centre contact; the ball always leaves the tip sliding.
//!
//! Sampling callers perturb shots with Gaussian noise drawn from a caller
//! supplied RNG, so a seeded `Pcg32` reproduces the same sample sequence.

use std::f64::consts::FRAC_PI_2;

use glam::{DVec2, DVec3};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::state::Ball;
use crate::consts::CUE_MASS;
use crate::math::Frame;
use crate::rotate;

/// Fraction of the radius the tip may land off-centre before miscueing
const MAX_OFFSET_FRACTION: f64 = 0.9;

/// One cue stroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueShot {
    /// Direction of travel on the table (radians, counter-clockwise from +x)
    pub heading: f64,
    /// Cue elevation above the cloth (radians)
    pub elevation: f64,
    /// Sideways tip offset from the ball centre (m, positive = right)
    pub offset_x: f64,
    /// Vertical tip offset from the ball centre (m, positive = above)
    pub offset_y: f64,
    /// Cue speed at impact (m/s)
    pub speed: f64,
    pub cue_mass: f64,
}

/// Standard deviations applied by [`CueShot::with_noise`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotNoise {
    pub heading: f64,
    pub elevation: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub speed: f64,
}

impl Default for ShotNoise {
    fn default() -> Self {
        Self {
            heading: 0.005,
            elevation: 0.01,
            offset_x: 0.001,
            offset_y: 0.001,
            speed: 0.05,
        }
    }
}

/// Standard deviations for perturbing a direct kinematic assignment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicNoise {
    pub velocity: f64,
    pub angular_velocity: f64,
}

impl Default for KinematicNoise {
    fn default() -> Self {
        Self {
            velocity: 0.02,
            angular_velocity: 0.5,
        }
    }
}

impl CueShot {
    /// Centre-ball stroke along `heading`
    pub fn new(heading: f64, speed: f64) -> Self {
        Self {
            heading,
            elevation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            speed,
            cue_mass: CUE_MASS,
        }
    }

    /// Strike off-centre: `offset_x` sideways, `offset_y` above the centre
    pub fn with_spin(mut self, offset_x: f64, offset_y: f64) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self
    }

    /// Velocity and angular velocity the stroke leaves `ball` with
    pub fn impart(&self, ball: &Ball) -> (DVec2, DVec3) {
        let r = ball.radius;
        let m = ball.mass;

        // Clamp the tip onto the usable face of the ball
        let mut offset = DVec2::new(self.offset_x, self.offset_y);
        let limit = MAX_OFFSET_FRACTION * r;
        if offset.length() > limit {
            offset = offset.normalize() * limit;
        }
        let (a, b) = (offset.x, offset.y);
        let c = (r * r - a * a - b * b).max(0.0).sqrt();
        let (sin, cos) = self.elevation.sin_cos();

        let lever = a * a + b * b * cos * cos + c * c * sin * sin - 2.0 * b * c * cos * sin;
        let force = 2.0 * m * self.speed / (1.0 + m / self.cue_mass + 5.0 / (2.0 * r * r) * lever);
        let inertia = 0.4 * m * r * r;

        // Ball frame: +y is the direction of travel
        let spin = DVec3::new(
            (c * force * sin - b * force * cos) / inertia,
            a * force * sin / inertia,
            a * force * cos / inertia,
        );
        let velocity = DVec2::new(0.0, force / m * cos);

        let frame = Frame::aligned_with(rotate(DVec2::X, self.heading - FRAC_PI_2));
        (frame.to_world(velocity), frame.to_world3(spin))
    }

    /// Copy of this shot with every parameter jittered by Gaussian noise
    pub fn with_noise<R: Rng + ?Sized>(&self, rng: &mut R, noise: &ShotNoise) -> CueShot {
        CueShot {
            heading: jitter(rng, self.heading, noise.heading),
            elevation: jitter(rng, self.elevation, noise.elevation),
            offset_x: jitter(rng, self.offset_x, noise.offset_x),
            offset_y: jitter(rng, self.offset_y, noise.offset_y),
            speed: jitter(rng, self.speed, noise.speed).max(0.0),
            cue_mass: self.cue_mass,
        }
    }
}

/// Jitter the horizontal components of a kinematic assignment
pub fn noisy_kinematics<R: Rng + ?Sized>(
    rng: &mut R,
    velocity: DVec2,
    angular_velocity: DVec3,
    noise: &KinematicNoise,
) -> (DVec2, DVec3) {
    let velocity = DVec2::new(
        jitter(rng, velocity.x, noise.velocity),
        jitter(rng, velocity.y, noise.velocity),
    );
    let angular_velocity = DVec3::new(
        jitter(rng, angular_velocity.x, noise.angular_velocity),
        jitter(rng, angular_velocity.y, noise.angular_velocity),
        angular_velocity.z,
    );
    (velocity, angular_velocity)
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, value: f64, deviation: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    value + deviation.abs() * z
}
