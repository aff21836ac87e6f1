//! Time-stamped state mutations
//!
//! Every way a ball's trajectory can change is one [`EventKind`] variant.
//! The engine dispatches on the variant once, in [`Event::apply`].

use std::fmt;

use glam::{DVec2, DVec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{exchange_momentum, phase_after_impact, reflect};
use super::cue::{CueShot, KinematicNoise, ShotNoise, noisy_kinematics};
use super::engine::World;
use super::state::{BallId, MotionPhase};
use super::tiles::TileId;
use crate::direction;
use crate::error::SimError;

/// Identifier of a scheduled event. Never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// What happens at an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Current motion phase ran out
    StateChange { ball: BallId, to: MotionPhase },
    BallCollision { a: BallId, b: BallId },
    /// Index into the table's cushion list
    CushionCollision { ball: BallId, cushion: usize },
    /// Index into the table's pocket-corner list
    PocketCornerCollision { ball: BallId, corner: usize },
    /// Index into the table's pocket list
    Pocketing { ball: BallId, pocket: usize },
    EnterTile { ball: BallId, tile: TileId },
    LeaveTile { ball: BallId, tile: TileId },
    /// Direct kinematic assignment
    SetValues {
        ball: BallId,
        velocity: DVec2,
        angular_velocity: DVec3,
        phase: MotionPhase,
    },
    CueStrike { ball: BallId, shot: CueShot },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: f64, kind: EventKind) -> Self {
        Self { time, kind }
    }

    /// Cue strike on `ball` at `time`
    pub fn cue_strike(time: f64, ball: BallId, shot: CueShot) -> Self {
        Self::new(time, EventKind::CueStrike { ball, shot })
    }

    pub fn set_values(time: f64, ball: BallId, velocity: DVec2, angular_velocity: DVec3, phase: MotionPhase) -> Self {
        Self::new(
            time,
            EventKind::SetValues {
                ball,
                velocity,
                angular_velocity,
                phase,
            },
        )
    }

    /// Copy with the injected payload perturbed for shot sampling. Events
    /// the engine derives itself come back unchanged.
    pub fn with_noise<R: Rng + ?Sized>(&self, rng: &mut R, shot: &ShotNoise, kinematic: &KinematicNoise) -> Event {
        let kind = match &self.kind {
            EventKind::CueStrike { ball, shot: cue } => EventKind::CueStrike {
                ball: *ball,
                shot: cue.with_noise(rng, shot),
            },
            EventKind::SetValues {
                ball,
                velocity,
                angular_velocity,
                phase,
            } => {
                let (velocity, angular_velocity) = noisy_kinematics(rng, *velocity, *angular_velocity, kinematic);
                EventKind::SetValues {
                    ball: *ball,
                    velocity,
                    angular_velocity,
                    phase: *phase,
                }
            }
            other => other.clone(),
        };
        Event::new(self.time, kind)
    }

    /// Balls whose trajectory this event changes
    pub fn participants(&self) -> Vec<BallId> {
        match self.kind {
            EventKind::BallCollision { a, b } => vec![a, b],
            EventKind::StateChange { ball, .. }
            | EventKind::CushionCollision { ball, .. }
            | EventKind::PocketCornerCollision { ball, .. }
            | EventKind::Pocketing { ball, .. }
            | EventKind::EnterTile { ball, .. }
            | EventKind::LeaveTile { ball, .. }
            | EventKind::SetValues { ball, .. }
            | EventKind::CueStrike { ball, .. } => vec![ball],
        }
    }

    /// Physical impacts (ball, cushion or jaw)
    pub fn is_collision(&self) -> bool {
        matches!(
            self.kind,
            EventKind::BallCollision { .. }
                | EventKind::CushionCollision { .. }
                | EventKind::PocketCornerCollision { .. }
        )
    }

    pub fn is_ball_collision(&self) -> bool {
        matches!(self.kind, EventKind::BallCollision { .. })
    }

    pub fn is_pocketing(&self) -> bool {
        matches!(self.kind, EventKind::Pocketing { .. })
    }

    /// Tile bookkeeping only; no physics changes
    pub fn is_tiling(&self) -> bool {
        matches!(self.kind, EventKind::EnterTile { .. } | EventKind::LeaveTile { .. })
    }

    /// Mutate the world as this event dictates
    pub fn apply(&self, world: &mut World) -> Result<(), SimError> {
        let time = self.time;
        match &self.kind {
            EventKind::StateChange { ball, to } => {
                let mut b = world.snapshot(*ball, time)?;
                b.phase = *to;
                match to {
                    MotionPhase::Resting => {
                        b.velocity = DVec2::ZERO;
                        b.angular_velocity = DVec3::ZERO;
                    }
                    MotionPhase::Rolling => b.angular_velocity = b.rolling_spin(b.velocity),
                    MotionPhase::Sliding => {}
                }
                world.store(b);
            }

            EventKind::BallCollision { a, b } => {
                let mut first = world.snapshot(*a, time)?;
                let mut second = world.snapshot(*b, time)?;

                let gap = first.position.distance(second.position) - (first.radius + second.radius);
                if gap < -world.settings.space_epsilon {
                    log::warn!("balls {a} and {b} overlap by {:.3e} at t={time:.6}", -gap);
                }

                exchange_momentum(&mut first, &mut second);
                let rest = world.settings.rest_velocity;
                for ball in [&mut first, &mut second] {
                    ball.phase = phase_after_impact(ball, rest);
                    if ball.is_resting() {
                        ball.velocity = DVec2::ZERO;
                        ball.angular_velocity = DVec3::ZERO;
                    }
                }
                world.store(first);
                world.store(second);
            }

            EventKind::CushionCollision { ball, cushion } => {
                let normal = world
                    .table
                    .cushions
                    .get(*cushion)
                    .map(|c| c.normal())
                    .ok_or_else(|| SimError::UnknownObstacle {
                        kind: "cushion",
                        index: *cushion,
                    })?;
                let mut b = world.snapshot(*ball, time)?;
                b.velocity = reflect(b.velocity, normal);
                b.position += normal * world.settings.cushion_nudge;
                b.phase = MotionPhase::Sliding;
                // The nudge can carry the ball over a tile boundary
                world.grid.place(&b);
                world.store(b);
            }

            EventKind::PocketCornerCollision { ball, corner } => {
                let centre = world
                    .table
                    .corners
                    .get(*corner)
                    .map(|c| c.position)
                    .ok_or_else(|| SimError::UnknownObstacle {
                        kind: "pocket corner",
                        index: *corner,
                    })?;
                let mut b = world.snapshot(*ball, time)?;
                let normal = direction(b.position - centre);
                b.velocity = reflect(b.velocity, normal);
                b.phase = MotionPhase::Sliding;
                world.store(b);
            }

            EventKind::Pocketing { ball, pocket } => {
                let pocket = *world
                    .table
                    .pockets
                    .get(*pocket)
                    .ok_or_else(|| SimError::UnknownObstacle {
                        kind: "pocket",
                        index: *pocket,
                    })?;
                let mut b = world.snapshot(*ball, time)?;
                // Park the ball outside the grid, one slot per id
                let depth = 4.0 * pocket.radius + 2.0 * b.radius * (b.id.0 as f64 + 1.0);
                b.position = pocket.position - pocket.orientation * depth;
                b.velocity = DVec2::ZERO;
                b.angular_velocity = DVec3::ZERO;
                b.phase = MotionPhase::Resting;
                world.grid.remove_everywhere(b.id);
                world.store(b);
            }

            EventKind::EnterTile { ball, tile } => {
                let b = world.snapshot(*ball, time)?;
                world.store(b);
                world.grid.insert(*ball, *tile);
            }

            EventKind::LeaveTile { ball, tile } => {
                let b = world.snapshot(*ball, time)?;
                world.store(b);
                world.grid.remove(*ball, *tile);
            }

            EventKind::SetValues {
                ball,
                velocity,
                angular_velocity,
                phase,
            } => {
                let mut b = world.snapshot(*ball, time)?;
                b.velocity = *velocity;
                b.angular_velocity = *angular_velocity;
                b.phase = *phase;
                world.store(b);
            }

            EventKind::CueStrike { ball, shot } => {
                let mut b = world.snapshot(*ball, time)?;
                let (velocity, spin) = shot.impart(&b);
                b.velocity = velocity;
                b.angular_velocity = spin;
                b.phase = MotionPhase::Sliding;
                world.store(b);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6}] ", self.time)?;
        match &self.kind {
            EventKind::StateChange { ball, to } => write!(f, "{ball} -> {to:?}"),
            EventKind::BallCollision { a, b } => write!(f, "{a} hits {b}"),
            EventKind::CushionCollision { ball, cushion } => write!(f, "{ball} hits cushion {cushion}"),
            EventKind::PocketCornerCollision { ball, corner } => write!(f, "{ball} hits jaw {corner}"),
            EventKind::Pocketing { ball, pocket } => write!(f, "{ball} potted in pocket {pocket}"),
            EventKind::EnterTile { ball, tile } => write!(f, "{ball} enters tile {}", tile.0),
            EventKind::LeaveTile { ball, tile } => write!(f, "{ball} leaves tile {}", tile.0),
            EventKind::SetValues { ball, phase, .. } => write!(f, "{ball} set ({phase:?})"),
            EventKind::CueStrike { ball, shot } => {
                write!(f, "{ball} struck at {:.3} m/s, heading {:.3}", shot.speed, shot.heading)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SimSettings;
    use crate::sim::state::{Ball, BallKind};
    use crate::sim::table::Table;

    fn world_with(balls: Vec<Ball>) -> World {
        World::new(Table::snooker(), SimSettings::default(), balls).unwrap()
    }

    fn moving(id: u32, position: DVec2, velocity: DVec2) -> Ball {
        let mut ball = Ball::new(BallId(id), BallKind::Red, position);
        ball.velocity = velocity;
        ball.phase = MotionPhase::Sliding;
        ball
    }

    #[test]
    fn test_participants() {
        let e = Event::new(1.0, EventKind::BallCollision { a: BallId(1), b: BallId(2) });
        assert_eq!(e.participants(), vec![BallId(1), BallId(2)]);
        assert!(e.is_collision() && e.is_ball_collision());
        let e = Event::new(1.0, EventKind::LeaveTile { ball: BallId(3), tile: TileId(0) });
        assert_eq!(e.participants(), vec![BallId(3)]);
        assert!(e.is_tiling() && !e.is_collision());
    }

    #[test]
    fn test_resting_transition_zeroes_motion() {
        let mut ball = moving(0, DVec2::new(0.8, 1.0), DVec2::new(0.3, 0.0));
        ball.phase = MotionPhase::Rolling;
        ball.angular_velocity = ball.rolling_spin(ball.velocity);
        let end = ball.phase_end();
        let mut world = world_with(vec![ball]);

        Event::new(end, EventKind::StateChange { ball: BallId(0), to: MotionPhase::Resting })
            .apply(&mut world)
            .unwrap();
        let ball = &world.balls[&BallId(0)];
        assert!(ball.is_resting());
        assert_eq!(ball.velocity, DVec2::ZERO);
        assert_eq!(ball.angular_velocity, DVec3::ZERO);
        assert_eq!(ball.time, end);
    }

    #[test]
    fn test_cushion_rebound_nudges_off() {
        let table = Table::snooker();
        let (index, cushion) = table
            .cushions
            .iter()
            .enumerate()
            .find(|(_, c)| c.orientation == crate::sim::table::Orientation::North)
            .unwrap();
        let r = table.ball_radius;
        let ball = moving(0, DVec2::new(cushion.center.x, table.length - r), DVec2::new(0.0, 1.5));
        let mut world = world_with(vec![ball]);

        Event::new(0.0, EventKind::CushionCollision { ball: BallId(0), cushion: index })
            .apply(&mut world)
            .unwrap();
        let ball = &world.balls[&BallId(0)];
        assert_eq!(ball.velocity, DVec2::new(0.0, -1.5));
        assert!((ball.position.y - (table.length - r - 1e-4)).abs() < 1e-12);
        assert_eq!(ball.phase, MotionPhase::Sliding);
    }

    #[test]
    fn test_jaw_reflects_about_radius() {
        let table = Table::snooker();
        let corner = table.corners[0];
        let r = table.ball_radius;
        let n = DVec2::new(0.6, 0.8);
        let tangent = DVec2::new(-0.8, 0.6);
        let mut ball = moving(0, corner.position + n * (r + corner.radius), DVec2::new(0.3, -1.0));
        ball.phase = MotionPhase::Rolling;
        ball.angular_velocity = ball.rolling_spin(ball.velocity);
        let before = ball.velocity;
        let mut world = world_with(vec![ball]);

        Event::new(0.0, EventKind::PocketCornerCollision { ball: BallId(0), corner: 0 })
            .apply(&mut world)
            .unwrap();
        let ball = &world.balls[&BallId(0)];
        assert!((ball.velocity.dot(n) + before.dot(n)).abs() < 1e-12);
        assert!((ball.velocity.dot(tangent) - before.dot(tangent)).abs() < 1e-12);
        assert_eq!(ball.phase, MotionPhase::Sliding);
    }

    #[test]
    fn test_unknown_obstacle() {
        let mut world = world_with(vec![moving(0, DVec2::new(0.8, 1.0), DVec2::X)]);
        for kind in [
            EventKind::CushionCollision { ball: BallId(0), cushion: 99 },
            EventKind::PocketCornerCollision { ball: BallId(0), corner: 99 },
            EventKind::Pocketing { ball: BallId(0), pocket: 99 },
        ] {
            let err = Event::new(0.0, kind).apply(&mut world).unwrap_err();
            assert!(matches!(err, SimError::UnknownObstacle { index: 99, .. }), "{err}");
            assert!(err.is_recoverable());
        }
        assert_eq!(world.balls[&BallId(0)].velocity, DVec2::X);
    }

    #[test]
    fn test_pocketing_parks_ball_off_grid() {
        let table = Table::snooker();
        let pocket = table.pockets[0];
        let ball = moving(5, pocket.position + pocket.orientation * 0.05, -pocket.orientation);
        let mut world = world_with(vec![ball]);
        assert!(world.grid.tiles_of(BallId(5)).next().is_some());

        Event::new(0.0, EventKind::Pocketing { ball: BallId(5), pocket: 0 })
            .apply(&mut world)
            .unwrap();
        let ball = &world.balls[&BallId(5)];
        assert!(ball.is_resting());
        assert_eq!(world.grid.tiles_of(BallId(5)).count(), 0);
        assert!(world.grid.tiles_overlapping(ball.position, ball.radius).is_empty());
    }

    #[test]
    fn test_unknown_ball() {
        let mut world = world_with(Vec::new());
        let err = Event::new(0.0, EventKind::EnterTile { ball: BallId(9), tile: TileId(0) })
            .apply(&mut world)
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownBall(BallId(9))));
    }

    #[test]
    fn test_noise_only_touches_injected_events() {
        use rand::SeedableRng;
        use rand_pcg::Pcg32;

        let mut rng = Pcg32::seed_from_u64(11);
        let (shot, kinematic) = (ShotNoise::default(), KinematicNoise::default());
        let strike = Event::cue_strike(0.0, BallId(0), CueShot::new(0.5, 2.0));
        assert_ne!(strike.with_noise(&mut rng, &shot, &kinematic), strike);

        let set = Event::set_values(0.0, BallId(0), DVec2::X, DVec3::ZERO, MotionPhase::Sliding);
        let noisy = set.with_noise(&mut rng, &shot, &kinematic);
        assert_ne!(noisy, set);
        assert_eq!(noisy.participants(), set.participants());

        let bump = Event::new(1.0, EventKind::CushionCollision { ball: BallId(0), cushion: 2 });
        assert_eq!(bump.with_noise(&mut rng, &shot, &kinematic), bump);
    }

    #[test]
    fn test_display() {
        let e = Event::new(0.5, EventKind::BallCollision { a: BallId(0), b: BallId(1) });
        assert_eq!(e.to_string(), "[0.500000] #0 hits #1");
    }
}
