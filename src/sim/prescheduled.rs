//! Precomputed strategy
//!
//! `init` runs the incremental engine to exhaustion on a copy of the world
//! and keeps the applied events. Playback then replays that fixed sequence,
//! so advancing a frame costs a few event applications and no root finding.

use std::collections::VecDeque;

use super::engine::{Runner, Simulation, World};
use super::event::Event;
use super::in_time::InTimeSimulation;
use super::observer::{EventHandler, EventRecorder};
use super::state::{Ball, BallId};
use super::table::Table;
use super::tiles::TileGrid;
use crate::error::SimError;
use crate::settings::SimSettings;

pub struct PrescheduledSimulation {
    runner: Runner,
    /// Position of each event in the full sequence, used to keep the
    /// lookahead queues in step with playback
    schedule: VecDeque<(usize, Event)>,
    ball_collisions: VecDeque<(usize, Event)>,
    pocketings: VecDeque<(usize, Event)>,
}

impl PrescheduledSimulation {
    pub fn new(table: Table, settings: SimSettings, balls: Vec<Ball>) -> Result<Self, SimError> {
        Ok(Self {
            runner: Runner::new(World::new(table, settings, balls)?),
            schedule: VecDeque::new(),
            ball_collisions: VecDeque::new(),
            pocketings: VecDeque::new(),
        })
    }

    /// Next ball-ball impact still to be played
    pub fn next_ball_collision(&self) -> Option<&Event> {
        self.ball_collisions.front().map(|(_, e)| e)
    }

    /// Next ball to drop, for camera cues
    pub fn next_pocketing(&self) -> Option<&Event> {
        self.pocketings.front().map(|(_, e)| e)
    }

    pub fn remaining(&self) -> usize {
        self.schedule.len()
    }

    /// Events still to be played, in order
    pub fn upcoming(&self) -> impl Iterator<Item = &Event> + '_ {
        self.schedule.iter().map(|(_, e)| e)
    }

    /// Time the last prescheduled event happens, if any remain
    pub fn end_time(&self) -> Option<f64> {
        self.schedule.back().map(|(_, e)| e.time)
    }

    fn play_next(&mut self) -> Result<(), SimError> {
        let Some((index, event)) = self.schedule.pop_front() else {
            return Ok(());
        };
        log::debug!("replaying #{index}: {event}");
        event.apply(&mut self.runner.world)?;
        self.runner.now = self.runner.now.max(event.time);

        for lookahead in [&mut self.ball_collisions, &mut self.pocketings] {
            while lookahead.front().is_some_and(|(i, _)| *i <= index) {
                lookahead.pop_front();
            }
        }

        self.runner.notify(&event);
        Ok(())
    }
}

impl Simulation for PrescheduledSimulation {
    /// Derives the whole run up front. Playback restarts from the state the
    /// simulation was built with.
    fn init(&mut self, seeds: Vec<Event>) -> Result<(), SimError> {
        let mut planner = InTimeSimulation::from_world(self.runner.world.clone());
        let recorder = EventRecorder::new();
        planner.add_event_handler(Box::new(recorder.clone()));
        planner.init(seeds)?;
        planner.finish()?;

        self.schedule = recorder.take().into_iter().enumerate().collect();
        self.ball_collisions = self
            .schedule
            .iter()
            .filter(|(_, e)| e.is_ball_collision())
            .cloned()
            .collect();
        self.pocketings = self
            .schedule
            .iter()
            .filter(|(_, e)| e.is_pocketing())
            .cloned()
            .collect();
        self.runner.ready = true;

        log::info!(
            "prescheduled {} events ({} ball collisions, {} pocketings), settling at t={:.6}",
            self.schedule.len(),
            self.ball_collisions.len(),
            self.pocketings.len(),
            self.end_time().unwrap_or(self.runner.now)
        );
        Ok(())
    }

    fn advance_time(&mut self, dt: f64) -> Result<(), SimError> {
        let target = self.runner.target(dt)?;
        while !self.runner.paused && self.schedule.front().is_some_and(|(_, e)| e.time < target) {
            self.play_next()?;
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
        while !self.runner.paused && !self.schedule.is_empty() {
            self.play_next()?;
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
        self.schedule.len()
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
    use crate::sim::state::BallKind;
    use glam::DVec2;
    use std::f64::consts::FRAC_PI_2;

    fn two_balls() -> Vec<Ball> {
        vec![
            Ball::new(BallId(0), BallKind::Cue, DVec2::new(0.889, 1.0)),
            Ball::new(BallId(1), BallKind::Red, DVec2::new(0.889, 1.4)),
        ]
    }

    #[test]
    fn test_lookahead_follows_playback() {
        let mut sim = PrescheduledSimulation::new(Table::snooker(), SimSettings::default(), two_balls()).unwrap();
        sim.init(vec![Event::cue_strike(0.0, BallId(0), CueShot::new(FRAC_PI_2, 1.0))])
            .unwrap();
        assert!(sim.remaining() > 0);

        // Nothing has moved yet
        assert_eq!(sim.get_ball(BallId(0)).unwrap().position, DVec2::new(0.889, 1.0));

        let hit = sim.next_ball_collision().cloned().unwrap();
        sim.advance_time(hit.time + 1e-6).unwrap();
        assert!(sim.next_ball_collision().is_none_or(|e| e.time > hit.time));
        assert!(sim.get_ball(BallId(1)).unwrap().velocity.y > 0.0);

        sim.finish().unwrap();
        assert_eq!(sim.remaining(), 0);
        assert!(sim.next_ball_collision().is_none());
    }

    #[test]
    fn test_finish_requires_init() {
        let mut sim = PrescheduledSimulation::new(Table::snooker(), SimSettings::default(), two_balls()).unwrap();
        assert!(matches!(sim.finish(), Err(SimError::NotInitialized)));
    }
}
