//! Closed-form motion per phase
//!
//! Friction acts along a fixed direction for the whole of a phase (the slip
//! direction while sliding, the velocity direction while rolling), so every
//! trajectory is a parabola `p + v·dt + ½·a·dt²` with constant `a`. The
//! collision solver relies on that shape through [`BallMotion::acceleration`].

use glam::{DVec2, DVec3};

use super::state::{Ball, MotionPhase};
use crate::consts::GRAVITY;
use crate::{direction, planar};
use crate::math::Frame;

/// Per-phase motion model. All times are absolute simulation times.
pub trait BallMotion: Sync {
    fn position(&self, ball: &Ball, time: f64) -> DVec2;
    fn velocity(&self, ball: &Ball, time: f64) -> DVec2;
    fn angular_velocity(&self, ball: &Ball, time: f64) -> DVec3;
    /// Time until the phase runs out, measured from `ball.time`
    fn duration(&self, ball: &Ball) -> f64;
    /// Friction coefficient in effect
    fn friction(&self, ball: &Ball) -> f64;
    /// Constant planar acceleration over the phase
    fn acceleration(&self, ball: &Ball) -> DVec2;
}

pub struct Sliding;
pub struct Rolling;
pub struct Resting;

static SLIDING: Sliding = Sliding;
static ROLLING: Rolling = Rolling;
static RESTING: Resting = Resting;

pub fn for_phase(phase: MotionPhase) -> &'static dyn BallMotion {
    match phase {
        MotionPhase::Sliding => &SLIDING,
        MotionPhase::Rolling => &ROLLING,
        MotionPhase::Resting => &RESTING,
    }
}

/// Vertical spin decays linearly to zero and stays there
fn spin_decay(ball: &Ball, dt: f64) -> f64 {
    let z = ball.angular_velocity.z;
    let loss = 5.0 * ball.friction.spinning * GRAVITY * dt / (2.0 * ball.radius);
    z.signum() * (z.abs() - loss).max(0.0)
}

impl BallMotion for Sliding {
    fn position(&self, ball: &Ball, time: f64) -> DVec2 {
        let dt = time - ball.time;
        let frame = Frame::aligned_with(ball.velocity);
        let slip = frame.to_local(direction(ball.slip_velocity()));
        let speed = ball.velocity.length();
        let local = DVec2::new(speed * dt, 0.0) - 0.5 * ball.friction.sliding * GRAVITY * dt * dt * slip;
        ball.position + frame.to_world(local)
    }

    fn velocity(&self, ball: &Ball, time: f64) -> DVec2 {
        let dt = time - ball.time;
        ball.velocity + self.acceleration(ball) * dt
    }

    fn angular_velocity(&self, ball: &Ball, time: f64) -> DVec3 {
        let dt = time - ball.time;
        let u = direction(ball.slip_velocity());
        let gain = 5.0 * ball.friction.sliding * GRAVITY * dt / (2.0 * ball.radius);
        // ẑ × û
        let torque_axis = DVec2::new(-u.y, u.x);
        DVec3::new(
            ball.angular_velocity.x + torque_axis.x * gain,
            ball.angular_velocity.y + torque_axis.y * gain,
            spin_decay(ball, dt),
        )
    }

    fn duration(&self, ball: &Ball) -> f64 {
        2.0 * ball.slip_velocity().length() / (7.0 * ball.friction.sliding * GRAVITY)
    }

    fn friction(&self, ball: &Ball) -> f64 {
        ball.friction.sliding
    }

    fn acceleration(&self, ball: &Ball) -> DVec2 {
        -ball.friction.sliding * GRAVITY * direction(ball.slip_velocity())
    }
}

impl BallMotion for Rolling {
    fn position(&self, ball: &Ball, time: f64) -> DVec2 {
        let dt = time - ball.time;
        ball.position + ball.velocity * dt + 0.5 * self.acceleration(ball) * dt * dt
    }

    fn velocity(&self, ball: &Ball, time: f64) -> DVec2 {
        let dt = time - ball.time;
        ball.velocity + self.acceleration(ball) * dt
    }

    fn angular_velocity(&self, ball: &Ball, time: f64) -> DVec3 {
        let dt = time - ball.time;
        let horizontal = planar(ball.angular_velocity);
        let loss = ball.friction.rolling * GRAVITY * dt / ball.radius;
        let remaining = (horizontal.length() - loss).max(0.0) * direction(horizontal);
        DVec3::new(remaining.x, remaining.y, spin_decay(ball, dt))
    }

    fn duration(&self, ball: &Ball) -> f64 {
        ball.velocity.length() / (ball.friction.rolling * GRAVITY)
    }

    fn friction(&self, ball: &Ball) -> f64 {
        ball.friction.rolling
    }

    fn acceleration(&self, ball: &Ball) -> DVec2 {
        -ball.friction.rolling * GRAVITY * direction(ball.velocity)
    }
}

impl BallMotion for Resting {
    fn position(&self, ball: &Ball, _time: f64) -> DVec2 {
        ball.position
    }

    fn velocity(&self, _ball: &Ball, _time: f64) -> DVec2 {
        DVec2::ZERO
    }

    fn angular_velocity(&self, _ball: &Ball, _time: f64) -> DVec3 {
        DVec3::ZERO
    }

    fn duration(&self, _ball: &Ball) -> f64 {
        f64::INFINITY
    }

    fn friction(&self, _ball: &Ball) -> f64 {
        0.0
    }

    fn acceleration(&self, _ball: &Ball) -> DVec2 {
        DVec2::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{BallId, BallKind};

    fn moving(phase: MotionPhase, velocity: DVec2, spin: DVec3) -> Ball {
        let mut ball = Ball::new(BallId(0), BallKind::Cue, DVec2::new(0.5, 0.5));
        ball.phase = phase;
        ball.velocity = velocity;
        ball.angular_velocity = spin;
        ball.time = 1.0;
        ball
    }

    #[test]
    fn test_sliding_ends_without_slip() {
        let ball = moving(MotionPhase::Sliding, DVec2::new(1.5, 0.8), DVec3::new(3.0, -10.0, 4.0));
        let end = ball.phase_end();
        let rolled = ball.at(end);
        assert!(rolled.slip_velocity().length() < 1e-9, "slip {:?}", rolled.slip_velocity());
    }

    #[test]
    fn test_sliding_position_matches_velocity_integral() {
        let ball = moving(MotionPhase::Sliding, DVec2::new(-0.7, 1.1), DVec3::new(-2.0, 5.0, 0.0));
        let dt = 0.05;
        let a = Sliding.acceleration(&ball);
        let expected = ball.position + ball.velocity * dt + 0.5 * a * dt * dt;
        assert!((ball.at(ball.time + dt).position - expected).length() < 1e-12);
    }

    #[test]
    fn test_stun_slide_from_rest_spin() {
        // No spin: slip equals velocity, friction opposes motion
        let ball = moving(MotionPhase::Sliding, DVec2::new(0.0, 2.0), DVec3::ZERO);
        let a = Sliding.acceleration(&ball);
        assert!((a - DVec2::new(0.0, -0.2 * GRAVITY)).length() < 1e-12);
        let expected = 2.0 * 2.0 / (7.0 * 0.2 * GRAVITY);
        assert!((Sliding.duration(&ball) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_stops_after_stopping_distance() {
        let v = DVec2::new(0.6, 0.8);
        let ball = moving(MotionPhase::Rolling, v, DVec3::ZERO);
        let ball = Ball {
            angular_velocity: ball.rolling_spin(v),
            ..ball
        };
        let end = ball.phase_end();
        assert!((end - ball.time - 1.0 / (0.016 * GRAVITY)).abs() < 1e-12);

        let stopped = ball.at(end);
        assert!(stopped.velocity.length() < 1e-12);
        assert!(stopped.angular_velocity.truncate().length() < 1e-9);
        let distance = (stopped.position - ball.position).length();
        assert!((distance - 1.0 / (2.0 * 0.016 * GRAVITY)).abs() < 1e-9);
    }

    #[test]
    fn test_spin_decays_without_overshoot() {
        let ball = moving(MotionPhase::Rolling, DVec2::X, DVec3::new(0.0, 0.0, 2.0));
        let much_later = Rolling.angular_velocity(&ball, ball.time + 100.0);
        assert_eq!(much_later.z, 0.0);
    }

    #[test]
    fn test_resting_is_inert() {
        let ball = moving(MotionPhase::Resting, DVec2::ZERO, DVec3::ZERO);
        assert!(Resting.duration(&ball).is_infinite());
        assert_eq!(Resting.friction(&ball), 0.0);
        assert_eq!(Resting.position(&ball, 10.0), ball.position);
    }
}
