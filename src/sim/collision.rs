//! Continuous collision detection and impact response
//!
//! - Trajectories are planar parabolas, so the squared separation of two
//!   bodies is a quartic in elapsed time and a distance to a line is a
//!   quadratic
//! - Contact times come from [`RootFinder`]; a numerical failure is logged
//!   and treated as "no contact"
//! - Candidate times past the end of a participant's current motion phase
//!   are dropped; the phase-change event reschedules them

use glam::DVec2;

use super::state::{Ball, MotionPhase};
use super::table::{Cushion, Pocket, PocketCorner};
use crate::math::RootFinder;
use crate::settings::SimSettings;

/// Planar path `p + v·t + ½·a·t²`, `t` measured from the snapshot time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    pub position: DVec2,
    pub velocity: DVec2,
    pub acceleration: DVec2,
}

impl Trajectory {
    pub fn of(ball: &Ball) -> Self {
        let motion = ball.motion();
        Self {
            position: ball.position,
            velocity: motion.velocity(ball, ball.time),
            acceleration: motion.acceleration(ball),
        }
    }

    pub fn fixed(position: DVec2) -> Self {
        Self {
            position,
            velocity: DVec2::ZERO,
            acceleration: DVec2::ZERO,
        }
    }

    pub fn at(&self, t: f64) -> DVec2 {
        self.position + self.velocity * t + 0.5 * self.acceleration * t * t
    }
}

/// Ascending coefficients of `|b(t) - a(t)|² - reach²`
pub fn separation_polynomial(a: &Trajectory, b: &Trajectory, reach: f64) -> [f64; 5] {
    let c = b.position - a.position;
    let v = b.velocity - a.velocity;
    let h = 0.5 * (b.acceleration - a.acceleration);
    [
        c.dot(c) - reach * reach,
        2.0 * v.dot(c),
        v.dot(v) + 2.0 * h.dot(c),
        2.0 * h.dot(v),
        h.dot(h),
    ]
}

/// Ascending coefficients of the signed distance from the line through
/// `point` (normal `normal`, pointing at the path's side) minus `offset`
pub fn line_polynomial(path: &Trajectory, point: DVec2, normal: DVec2, offset: f64) -> [f64; 3] {
    [
        normal.dot(path.position - point) - offset,
        normal.dot(path.velocity),
        0.5 * normal.dot(path.acceleration),
    ]
}

/// Contact-time queries against one set of tolerances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionSolver {
    finder: RootFinder,
    space_epsilon: f64,
    time_epsilon: f64,
}

impl CollisionSolver {
    pub fn new(settings: &SimSettings) -> Self {
        Self {
            finder: RootFinder::from_settings(settings),
            space_epsilon: settings.space_epsilon,
            time_epsilon: settings.time_epsilon,
        }
    }

    /// Absolute time at which two balls touch
    pub fn ball_ball(&self, a: &Ball, b: &Ball) -> Option<f64> {
        if a.id == b.id || (a.is_resting() && b.is_resting()) {
            return None;
        }

        // Bring the older snapshot up to the newer one's time
        let start = a.time.max(b.time);
        let a = if a.time < start { a.at(start) } else { a.clone() };
        let b = if b.time < start { b.at(start) } else { b.clone() };

        let horizon = a.phase_end().min(b.phase_end()) - start;
        let coeffs = separation_polynomial(&Trajectory::of(&a), &Trajectory::of(&b), a.radius + b.radius);
        let t = self.first_contact(&coeffs, horizon, || format!("balls {} and {}", a.id, b.id))?;
        Some(start + t)
    }

    /// Absolute time the ball meets a cushion within the cushion's extent
    pub fn ball_cushion(&self, ball: &Ball, cushion: &Cushion) -> Option<f64> {
        let path = Trajectory::of(ball);
        let t = self.line_crossing(ball, &path, cushion.center, cushion.normal(), ball.radius)?;
        let contact = path.at(t);
        if !cushion.spans(contact) {
            log::debug!("ball {} misses cushion {:?} at {contact}", ball.id, cushion.orientation);
            return None;
        }
        Some(ball.time + t)
    }

    /// Absolute time the ball touches a pocket jaw
    pub fn ball_corner(&self, ball: &Ball, corner: &PocketCorner) -> Option<f64> {
        self.ball_sphere(ball, corner.position, ball.radius + corner.radius)
    }

    /// Absolute time the ball's centre enters the pocket
    pub fn ball_pocket(&self, ball: &Ball, pocket: &Pocket) -> Option<f64> {
        self.ball_sphere(ball, pocket.position, pocket.radius)
    }

    /// Elapsed time until the ball's edge, offset by `offset` along `normal`,
    /// reaches the line through `point`. A ball already past the line never
    /// crosses it.
    pub fn line_crossing(&self, ball: &Ball, path: &Trajectory, point: DVec2, normal: DVec2, offset: f64) -> Option<f64> {
        if ball.is_resting() {
            return None;
        }
        let coeffs = line_polynomial(path, point, normal, offset);
        if coeffs[0] < -self.space_epsilon {
            return None;
        }
        let horizon = ball.motion().duration(ball);
        self.first_contact(&coeffs, horizon, || format!("ball {} and line through {point}", ball.id))
    }

    fn ball_sphere(&self, ball: &Ball, centre: DVec2, reach: f64) -> Option<f64> {
        if ball.is_resting() {
            return None;
        }
        let coeffs = separation_polynomial(&Trajectory::of(ball), &Trajectory::fixed(centre), reach);
        let horizon = ball.motion().duration(ball);
        let t = self.first_contact(&coeffs, horizon, || format!("ball {} and obstacle at {centre}", ball.id))?;
        Some(ball.time + t)
    }

    fn first_contact(&self, coeffs: &[f64], horizon: f64, pair: impl FnOnce() -> String) -> Option<f64> {
        match self.finder.min_non_negative_root(coeffs) {
            Ok(Some(t)) if t <= horizon + self.time_epsilon => Some(t),
            Ok(_) => None,
            Err(err) => {
                log::debug!("dropping candidate for {}: {err} (coefficients {coeffs:?})", pair());
                None
            }
        }
    }
}

/// Mirror `velocity` about the line with unit normal `normal`
pub fn reflect(velocity: DVec2, normal: DVec2) -> DVec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Elastic exchange of the centre-line velocity components of two touching
/// balls. Tangential velocity and spin are left alone.
pub fn exchange_momentum(a: &mut Ball, b: &mut Ball) {
    let Some(n) = (b.position - a.position).try_normalize() else {
        return;
    };
    let (ma, mb) = (a.mass, b.mass);
    let ua = a.velocity.dot(n);
    let ub = b.velocity.dot(n);
    let ua_after = (ua * (ma - mb) + 2.0 * mb * ub) / (ma + mb);
    let ub_after = (ub * (mb - ma) + 2.0 * ma * ua) / (ma + mb);
    a.velocity += (ua_after - ua) * n;
    b.velocity += (ub_after - ub) * n;
}

/// Phase a ball settles into right after an impact
pub fn phase_after_impact(ball: &Ball, rest_velocity: f64) -> MotionPhase {
    let slipping = ball.slip_velocity().length() >= rest_velocity;
    if !slipping && ball.velocity.length() < rest_velocity {
        MotionPhase::Resting
    } else if !slipping {
        MotionPhase::Rolling
    } else {
        MotionPhase::Sliding
    }
}
