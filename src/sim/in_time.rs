//! Incremental strategy
//!
//! Holds only the events reachable from the current state. Each applied
//! event invalidates whatever was queued for its participants and derives
//! fresh candidates from the tiles they occupy, so abandoning a run early
//! costs nothing beyond what was already computed.

use super::engine::{EventBook, Runner, Simulation, World};
use super::event::{Event, EventId, EventKind};
use super::observer::EventHandler;
use super::state::{Ball, BallId};
use super::table::Table;
use super::tiles::{Obstacle, TileGrid, TileId};
use crate::error::SimError;
use crate::settings::SimSettings;

pub struct InTimeSimulation {
    runner: Runner,
    book: EventBook,
}

impl InTimeSimulation {
    pub fn new(table: Table, settings: SimSettings, balls: Vec<Ball>) -> Result<Self, SimError> {
        Ok(Self::from_world(World::new(table, settings, balls)?))
    }

    pub(crate) fn from_world(world: World) -> Self {
        let book = EventBook::new(world.settings.time_epsilon);
        Self {
            runner: Runner::new(world),
            book,
        }
    }

    pub fn world(&self) -> &World {
        &self.runner.world
    }

    /// Pending events in time order
    pub fn upcoming(&self) -> impl Iterator<Item = &Event> + '_ {
        self.book.iter().map(|(_, event)| event)
    }

    /// Splice an external event (a new shot, a kinematic override) into a
    /// run that is already going. It is never invalidated by other events.
    pub fn schedule(&mut self, event: Event) -> Result<EventId, SimError> {
        for ball in event.participants() {
            if self.runner.world.ball(ball).is_none() {
                return Err(SimError::UnknownBall(ball));
            }
        }
        if event.time < self.runner.now {
            return Err(SimError::NegativeTimeStep {
                dt: event.time - self.runner.now,
            });
        }
        Ok(self.book.schedule(event, Vec::new()))
    }

    /// Apply the next event regardless of the pause flag. `None` once the
    /// queue is empty.
    pub fn step(&mut self) -> Result<Option<Event>, SimError> {
        while !self.book.is_empty() {
            if let Some(event) = self.apply_next()? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Pop one event and apply it. Returns `None` when the queue was empty
    /// or the event turned out to be redundant.
    fn apply_next(&mut self) -> Result<Option<Event>, SimError> {
        let Some((id, event)) = self.book.pop()? else {
            return Ok(None);
        };

        if let EventKind::EnterTile { ball, tile } = event.kind {
            if self.runner.world.grid.contains(ball, tile) {
                log::debug!("skipping {id}: {ball} already in tile {}", tile.0);
                return Ok(None);
            }
        }

        log::debug!("applying {id}: {event}");
        event.apply(&mut self.runner.world)?;
        self.runner.now = self.runner.now.max(event.time);

        match event.kind {
            EventKind::EnterTile { ball, tile } => {
                let snapshot = self.runner.world.snapshot(ball, event.time)?;
                self.queue_in_tile(&snapshot, tile);
            }
            EventKind::LeaveTile { ball, tile } => {
                self.book.clear_ball_tile(ball, tile)?;
                let world = &self.runner.world;
                let snapshot = world.snapshot(ball, event.time)?;
                for (time, from) in world.grid.entries_into(&world.solver, &snapshot, tile) {
                    let back = Event::new(time, EventKind::EnterTile { ball, tile });
                    self.book.schedule(back, vec![(ball, Some(from))]);
                }
            }
            _ => {
                for ball in event.participants() {
                    self.book.clear_ball(ball)?;
                }
                for ball in event.participants() {
                    self.queue_all(ball)?;
                }
            }
        }

        self.runner.notify(&event);
        Ok(Some(event))
    }

    /// Derive every candidate event for a ball: its phase change plus
    /// whatever each of its tiles can produce
    fn queue_all(&mut self, id: BallId) -> Result<(), SimError> {
        let ball = self
            .runner
            .world
            .ball(id)
            .cloned()
            .ok_or(SimError::UnknownBall(id))?;

        if !ball.is_resting() {
            let end = ball.phase_end();
            if end.is_finite() {
                let change = Event::new(end, EventKind::StateChange { ball: id, to: ball.phase.next() });
                self.book.schedule(change, vec![(id, None)]);
            }
        }

        let tiles: Vec<TileId> = self.runner.world.grid.tiles_of(id).collect();
        for tile in tiles {
            self.queue_in_tile(&ball, tile);
        }
        Ok(())
    }

    /// Candidates for `ball` inside one tile: impacts with co-occupants and
    /// obstacles, the leave event and entries into neighbouring tiles
    fn queue_in_tile(&mut self, ball: &Ball, tile: TileId) {
        let world = &self.runner.world;
        let Some(cell) = world.grid.tile(tile) else {
            return;
        };
        let solver = &world.solver;
        let here = Some(tile);
        let mut found = Vec::new();

        for other in cell.balls().filter(|&other| other != ball.id) {
            let Some(other_ball) = world.balls.get(&other) else {
                continue;
            };
            if let Some(time) = solver.ball_ball(ball, other_ball) {
                found.push((
                    Event::new(time, EventKind::BallCollision { a: ball.id, b: other }),
                    vec![(ball.id, here), (other, here)],
                ));
            }
        }

        for &obstacle in cell.obstacles() {
            let candidate = match obstacle {
                Obstacle::Cushion(i) => world
                    .table
                    .cushions
                    .get(i)
                    .and_then(|c| solver.ball_cushion(ball, c))
                    .map(|t| (t, EventKind::CushionCollision { ball: ball.id, cushion: i })),
                Obstacle::Pocket(i) => world
                    .table
                    .pockets
                    .get(i)
                    .and_then(|p| solver.ball_pocket(ball, p))
                    .map(|t| (t, EventKind::Pocketing { ball: ball.id, pocket: i })),
                Obstacle::Corner(i) => world
                    .table
                    .corners
                    .get(i)
                    .and_then(|c| solver.ball_corner(ball, c))
                    .map(|t| (t, EventKind::PocketCornerCollision { ball: ball.id, corner: i })),
            };
            if let Some((time, kind)) = candidate {
                found.push((Event::new(time, kind), vec![(ball.id, here)]));
            }
        }

        if let Some(time) = world.grid.leave_event(solver, ball, tile) {
            found.push((
                Event::new(time, EventKind::LeaveTile { ball: ball.id, tile }),
                vec![(ball.id, here)],
            ));
        }
        for (time, next) in world.grid.enter_events(solver, ball, tile) {
            found.push((
                Event::new(time, EventKind::EnterTile { ball: ball.id, tile: next }),
                vec![(ball.id, here)],
            ));
        }

        for (event, filings) in found {
            self.book.schedule(event, filings);
        }
    }
}

impl Simulation for InTimeSimulation {
    /// Replaces anything already pending
    fn init(&mut self, seeds: Vec<Event>) -> Result<(), SimError> {
        self.book = EventBook::new(self.runner.world.settings.time_epsilon);
        self.runner.ready = true;
        for seed in seeds {
            self.schedule(seed)?;
        }
        let moving: Vec<BallId> = self
            .runner
            .world
            .balls
            .values()
            .filter(|b| !b.is_resting())
            .map(|b| b.id)
            .collect();
        for id in moving {
            self.queue_all(id)?;
        }
        log::info!(
            "initialised {} balls with {} pending events",
            self.runner.world.balls.len(),
            self.book.len()
        );
        Ok(())
    }

    fn advance_time(&mut self, dt: f64) -> Result<(), SimError> {
        let target = self.runner.target(dt)?;
        while !self.runner.paused {
            match self.book.peek_time() {
                Some(time) if time < target => {
                    self.apply_next()?;
                }
                _ => break,
            }
        }
        if !self.runner.paused {
            self.runner.now = target;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SimError> {
        if !self.runner.ready {
            return Err(SimError::NotInitialized);
        }
        while !self.runner.paused && !self.book.is_empty() {
            self.apply_next()?;
        }
        if self.book.is_empty() {
            log::info!("run settled at t={:.6}", self.runner.now);
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.runner.pause();
    }

    fn resume(&mut self) {
        self.runner.resume();
    }

    fn is_paused(&self) -> bool {
        self.runner.paused
    }

    fn is_ready(&self) -> bool {
        self.runner.ready
    }

    fn current_time(&self) -> f64 {
        self.runner.now
    }

    fn get_ball(&self, id: BallId) -> Result<Ball, SimError> {
        self.runner.get_ball(id)
    }

    fn balls(&self) -> Vec<Ball> {
        self.runner.balls()
    }

    fn tiles(&self) -> &TileGrid {
        &self.runner.world.grid
    }

    fn table(&self) -> &Table {
        &self.runner.world.table
    }

    fn pending_events(&self) -> usize {
        self.book.len()
    }

    fn add_event_handler(&mut self, handler: Box<dyn EventHandler>) {
        self.runner.add_handler(handler);
    }

    fn remove_handlers(&mut self) {
        self.runner.remove_handlers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::cue::CueShot;
    use crate::sim::observer::{CollisionLimit, EventRecorder};
    use crate::sim::state::{BallKind, MotionPhase};
    use glam::DVec2;

    fn lone_ball() -> Vec<Ball> {
        vec![Ball::new(BallId(0), BallKind::Cue, DVec2::new(0.889, 1.0))]
    }

    #[test]
    fn test_advance_requires_init() {
        let mut sim = InTimeSimulation::new(Table::snooker(), SimSettings::default(), lone_ball()).unwrap();
        assert!(matches!(sim.advance_time(0.1), Err(SimError::NotInitialized)));
        sim.init(Vec::new()).unwrap();
        assert!(matches!(sim.advance_time(-0.1), Err(SimError::NegativeTimeStep { .. })));
        assert!(matches!(sim.advance_time(f64::NAN), Err(SimError::NegativeTimeStep { .. })));
        sim.advance_time(0.25).unwrap();
        assert_eq!(sim.current_time(), 0.25);
        assert_eq!(sim.pending_events(), 0);
    }

    #[test]
    fn test_schedule_rejects_unknown_ball() {
        let mut sim = InTimeSimulation::new(Table::snooker(), SimSettings::default(), lone_ball()).unwrap();
        let shot = Event::cue_strike(0.0, BallId(7), CueShot::new(0.0, 1.0));
        assert!(matches!(sim.init(vec![shot]), Err(SimError::UnknownBall(BallId(7)))));
    }

    #[test]
    fn test_strike_runs_to_rest() {
        let mut sim = InTimeSimulation::new(Table::snooker(), SimSettings::default(), lone_ball()).unwrap();
        let recorder = EventRecorder::new();
        sim.add_event_handler(Box::new(recorder.clone()));
        sim.init(vec![Event::cue_strike(0.0, BallId(0), CueShot::new(std::f64::consts::FRAC_PI_2, 0.5))])
            .unwrap();
        sim.finish().unwrap();

        assert_eq!(sim.pending_events(), 0);
        let ball = sim.get_ball(BallId(0)).unwrap();
        assert!(ball.is_resting());

        let events = recorder.events();
        assert!(matches!(events[0].kind, EventKind::CueStrike { .. }));
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time + 1e-9));
        let last_change = events
            .iter()
            .rev()
            .find(|e| matches!(e.kind, EventKind::StateChange { .. }))
            .unwrap();
        assert!(matches!(last_change.kind, EventKind::StateChange { to: MotionPhase::Resting, .. }));
    }

    #[test]
    fn test_pause_from_handler_stops_the_clock() {
        let balls = vec![
            Ball::new(BallId(0), BallKind::Cue, DVec2::new(0.889, 1.0)),
            Ball::new(BallId(1), BallKind::Red, DVec2::new(0.889, 1.6)),
        ];
        let mut sim = InTimeSimulation::new(Table::snooker(), SimSettings::default(), balls).unwrap();
        sim.add_event_handler(Box::new(CollisionLimit::ball_collisions(1)));
        sim.init(vec![Event::cue_strike(0.0, BallId(0), CueShot::new(std::f64::consts::FRAC_PI_2, 2.0))])
            .unwrap();

        sim.advance_time(10.0).unwrap();
        assert!(sim.is_paused());
        let paused_at = sim.current_time();
        assert!(paused_at > 0.0 && paused_at < 1.0);
        assert!(sim.get_ball(BallId(1)).unwrap().velocity.y > 0.0);

        // Paused runs do not move
        sim.advance_time(1.0).unwrap();
        assert_eq!(sim.current_time(), paused_at);

        sim.remove_handlers();
        sim.resume();
        sim.finish().unwrap();
        assert_eq!(sim.pending_events(), 0);
    }

    #[test]
    fn test_step_applies_one_event() {
        let mut sim = InTimeSimulation::new(Table::snooker(), SimSettings::default(), lone_ball()).unwrap();
        sim.init(vec![Event::cue_strike(0.5, BallId(0), CueShot::new(0.0, 0.5))])
            .unwrap();
        let first = sim.step().unwrap().unwrap();
        assert_eq!(first.time, 0.5);
        assert_eq!(sim.current_time(), 0.5);
        assert!(sim.upcoming().all(|e| e.time >= 0.5));
    }
}
