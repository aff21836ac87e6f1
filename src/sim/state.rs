//! Ball kinematic records
//!
//! A [`Ball`] is a snapshot: every kinematic field is valid as of
//! [`Ball::time`]. Later states are derived through the motion model
//! ([`Ball::at`]), never by mutating the snapshot in place.

use std::fmt;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use super::motion::BallMotion;
use crate::consts::*;

/// Stable identity of a ball within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BallId(pub u32);

impl fmt::Display for BallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ball colour, used by rule observers to classify pots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BallKind {
    Cue,
    Red,
    Yellow,
    Green,
    Brown,
    Blue,
    Pink,
    Black,
}

impl BallKind {
    /// Snooker point value (the cue ball scores nothing)
    pub fn value(&self) -> u32 {
        match self {
            BallKind::Cue => 0,
            BallKind::Red => 1,
            BallKind::Yellow => 2,
            BallKind::Green => 3,
            BallKind::Brown => 4,
            BallKind::Blue => 5,
            BallKind::Pink => 6,
            BallKind::Black => 7,
        }
    }
}

/// Which closed-form motion currently governs a ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionPhase {
    Resting,
    /// Contact point slips over the cloth
    Sliding,
    /// Spin matches translation
    Rolling,
}

impl MotionPhase {
    /// Phase entered when the current one runs out
    pub fn next(&self) -> MotionPhase {
        match self {
            MotionPhase::Sliding => MotionPhase::Rolling,
            MotionPhase::Rolling | MotionPhase::Resting => MotionPhase::Resting,
        }
    }
}

/// Cloth friction coefficients for one ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Friction {
    pub sliding: f64,
    pub rolling: f64,
    /// Against spin about the vertical axis
    pub spinning: f64,
}

impl Default for Friction {
    fn default() -> Self {
        Self {
            sliding: SLIDING_FRICTION,
            rolling: ROLLING_FRICTION,
            spinning: SPINNING_FRICTION,
        }
    }
}

/// Kinematic snapshot of one ball
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub id: BallId,
    pub kind: BallKind,
    /// Centre on the table plane
    pub position: DVec2,
    pub velocity: DVec2,
    pub angular_velocity: DVec3,
    pub phase: MotionPhase,
    /// Simulation time the kinematic fields refer to
    pub time: f64,
    pub mass: f64,
    pub radius: f64,
    pub friction: Friction,
}

impl Ball {
    /// A resting standard snooker ball
    pub fn new(id: BallId, kind: BallKind, position: DVec2) -> Self {
        Self {
            id,
            kind,
            position,
            velocity: DVec2::ZERO,
            angular_velocity: DVec3::ZERO,
            phase: MotionPhase::Resting,
            time: 0.0,
            mass: BALL_MASS,
            radius: BALL_RADIUS,
            friction: Friction::default(),
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_friction(mut self, friction: Friction) -> Self {
        self.friction = friction;
        self
    }

    pub fn is_resting(&self) -> bool {
        self.phase == MotionPhase::Resting
    }

    /// Velocity of the contact point relative to the cloth
    pub fn slip_velocity(&self) -> DVec2 {
        let w = self.angular_velocity;
        DVec2::new(
            self.velocity.x - self.radius * w.y,
            self.velocity.y + self.radius * w.x,
        )
    }

    /// Angular velocity that rolls without slipping at `velocity`
    pub fn rolling_spin(&self, velocity: DVec2) -> DVec3 {
        DVec3::new(
            -velocity.y / self.radius,
            velocity.x / self.radius,
            self.angular_velocity.z,
        )
    }

    /// Motion model for the current phase
    pub fn motion(&self) -> &'static dyn BallMotion {
        super::motion::for_phase(self.phase)
    }

    /// Time the current phase runs out (absolute simulation time)
    pub fn phase_end(&self) -> f64 {
        self.time + self.motion().duration(self)
    }

    /// Snapshot derived for a later time. Phase is unchanged; callers must
    /// not ask past [`Ball::phase_end`].
    pub fn at(&self, time: f64) -> Ball {
        let motion = self.motion();
        Ball {
            position: motion.position(self, time),
            velocity: motion.velocity(self, time),
            angular_velocity: motion.angular_velocity(self, time),
            time,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ball_rests() {
        let ball = Ball::new(BallId(3), BallKind::Blue, DVec2::new(0.5, 1.0));
        assert!(ball.is_resting());
        assert_eq!(ball.radius, BALL_RADIUS);
        assert_eq!(ball.friction.sliding, 0.2);
        assert_eq!(ball.kind.value(), 5);
    }

    #[test]
    fn test_slip_vanishes_when_rolling() {
        let mut ball = Ball::new(BallId(0), BallKind::Cue, DVec2::ZERO);
        ball.velocity = DVec2::new(0.4, -1.2);
        ball.angular_velocity = ball.rolling_spin(ball.velocity);
        assert!(ball.slip_velocity().length() < 1e-12);
    }

    #[test]
    fn test_phase_progression() {
        assert_eq!(MotionPhase::Sliding.next(), MotionPhase::Rolling);
        assert_eq!(MotionPhase::Rolling.next(), MotionPhase::Resting);
        assert_eq!(MotionPhase::Resting.next(), MotionPhase::Resting);
    }

    #[test]
    fn test_resting_ball_at_later_time() {
        let ball = Ball::new(BallId(1), BallKind::Red, DVec2::new(1.0, 2.0));
        let later = ball.at(5.0);
        assert_eq!(later.position, ball.position);
        assert_eq!(later.time, 5.0);
    }

    #[test]
    fn test_ball_id_display() {
        assert_eq!(BallId(7).to_string(), "#7");
    }
}
