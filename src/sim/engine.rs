//! Engine building blocks shared by both simulation strategies
//!
//! - [`World`]: the authoritative ball map, table, tile grid and solver
//! - [`EventBook`]: the pending-event arena, its time-ordered queue and the
//!   per-ball filing lists used to invalidate events
//! - [`Simulation`]: the contract callers drive

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::collision::CollisionSolver;
use super::event::{Event, EventId};
use super::observer::{EventHandler, Flow};
use super::state::{Ball, BallId};
use super::table::Table;
use super::tiles::{TileGrid, TileId};
use crate::adt::{AvlTree, Handle, TimeOrder};
use crate::error::SimError;
use crate::settings::SimSettings;

/// Everything an event may read or mutate
#[derive(Debug, Clone)]
pub struct World {
    pub(crate) table: Arc<Table>,
    pub(crate) settings: SimSettings,
    pub(crate) solver: CollisionSolver,
    pub(crate) balls: BTreeMap<BallId, Ball>,
    pub(crate) grid: TileGrid,
}

impl World {
    /// Validate the settings and register every ball in the tiles it overlaps
    pub fn new(table: Table, settings: SimSettings, balls: Vec<Ball>) -> Result<Self, SimError> {
        settings.validate()?;
        let mut grid = TileGrid::new(&table, &settings);
        let mut map = BTreeMap::new();
        for ball in balls {
            grid.place(&ball);
            if let Some(previous) = map.insert(ball.id, ball) {
                log::warn!("ball {} given twice; keeping the later one", previous.id);
            }
        }
        Ok(Self {
            table: Arc::new(table),
            solver: CollisionSolver::new(&settings),
            settings,
            balls: map,
            grid,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Stored state of a ball, as of its last event
    pub fn ball(&self, id: BallId) -> Option<&Ball> {
        self.balls.get(&id)
    }

    /// Copy of a ball advanced to `time`
    pub fn snapshot(&self, id: BallId, time: f64) -> Result<Ball, SimError> {
        let ball = self.balls.get(&id).ok_or(SimError::UnknownBall(id))?;
        Ok(if time > ball.time { ball.at(time) } else { ball.clone() })
    }

    /// Replace a ball's stored state
    pub fn store(&mut self, ball: Ball) {
        self.balls.insert(ball.id, ball);
    }

    /// Every ball advanced to `time`
    pub fn snapshots(&self, time: f64) -> Vec<Ball> {
        self.balls
            .values()
            .map(|b| if time > b.time { b.at(time) } else { b.clone() })
            .collect()
    }
}

/// Ball and tile an event is listed under. `None` is the tile-independent list.
type Filing = (BallId, Option<TileId>);

#[derive(Debug, Clone)]
struct Scheduled {
    event: Event,
    handle: Handle,
    filings: Vec<Filing>,
}

/// Pending events. The arena owns each event; the queue and filing lists
/// only hold its id.
#[derive(Debug, Clone)]
pub struct EventBook {
    queue: AvlTree<f64, EventId, TimeOrder>,
    events: BTreeMap<EventId, Scheduled>,
    filings: BTreeMap<BallId, BTreeMap<Option<TileId>, BTreeSet<EventId>>>,
    next_id: u64,
}

impl EventBook {
    pub fn new(time_epsilon: f64) -> Self {
        Self {
            queue: AvlTree::new(TimeOrder::new(time_epsilon)),
            events: BTreeMap::new(),
            filings: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Queue an event and list it under each `(ball, tile)` filing
    pub fn schedule(&mut self, event: Event, filings: Vec<Filing>) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;

        let handle = self.queue.insert(event.time, id);
        for &(ball, tile) in &filings {
            self.filings
                .entry(ball)
                .or_default()
                .entry(tile)
                .or_default()
                .insert(id);
        }
        log::debug!("queued {id}: {event}");
        self.events.insert(id, Scheduled { event, handle, filings });
        id
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.queue.peek_min().map(|(time, _)| *time)
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id).map(|s| &s.event)
    }

    /// Earliest event, removed from the queue and every filing list
    pub fn pop(&mut self) -> Result<Option<(EventId, Event)>, SimError> {
        let Some((_, id)) = self.queue.delete_min() else {
            return Ok(None);
        };
        let scheduled = self.events.remove(&id).ok_or(SimError::StaleEvent(id))?;
        self.unfile(id, &scheduled.filings)?;
        Ok(Some((id, scheduled.event)))
    }

    /// Remove a not-yet-due event
    pub fn cancel(&mut self, id: EventId) -> Result<Event, SimError> {
        let scheduled = self.events.remove(&id).ok_or(SimError::StaleEvent(id))?;
        self.queue.remove(scheduled.handle).ok_or(SimError::StaleEvent(id))?;
        self.unfile(id, &scheduled.filings)?;
        Ok(scheduled.event)
    }

    /// Cancel every event listed under `ball`, in any tile. Returns how many went.
    pub fn clear_ball(&mut self, ball: BallId) -> Result<usize, SimError> {
        let ids: BTreeSet<EventId> = self
            .filings
            .get(&ball)
            .map(|lists| lists.values().flatten().copied().collect())
            .unwrap_or_default();
        for &id in &ids {
            self.cancel(id)?;
        }
        Ok(ids.len())
    }

    /// Cancel the events listed under `ball` in one tile
    pub fn clear_ball_tile(&mut self, ball: BallId, tile: TileId) -> Result<usize, SimError> {
        let ids: Vec<EventId> = self
            .filings
            .get(&ball)
            .and_then(|lists| lists.get(&Some(tile)))
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default();
        for &id in &ids {
            self.cancel(id)?;
        }
        Ok(ids.len())
    }

    /// Number of events listed under `ball`
    pub fn filed_under(&self, ball: BallId) -> usize {
        self.filings
            .get(&ball)
            .map(|lists| lists.values().map(BTreeSet::len).sum())
            .unwrap_or(0)
    }

    /// Pending events in time order
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &Event)> + '_ {
        self.queue
            .iter()
            .filter_map(|(_, _, id)| self.events.get(id).map(|s| (*id, &s.event)))
    }

    fn unfile(&mut self, id: EventId, filings: &[Filing]) -> Result<(), SimError> {
        for (ball, tile) in filings {
            let Some(lists) = self.filings.get_mut(ball) else {
                return Err(SimError::StaleEvent(id));
            };
            let removed = lists.get_mut(tile).is_some_and(|list| list.remove(&id));
            if !removed {
                return Err(SimError::StaleEvent(id));
            }
            if lists.get(tile).is_some_and(BTreeSet::is_empty) {
                lists.remove(tile);
            }
            if lists.is_empty() {
                self.filings.remove(ball);
            }
        }
        Ok(())
    }
}

/// Clock, pause flag and observers common to both strategies
pub(crate) struct Runner {
    pub(crate) world: World,
    pub(crate) now: f64,
    pub(crate) paused: bool,
    pub(crate) ready: bool,
    handlers: Vec<Box<dyn EventHandler>>,
}

impl Runner {
    pub(crate) fn new(world: World) -> Self {
        Self {
            world,
            now: 0.0,
            paused: false,
            ready: false,
            handlers: Vec::new(),
        }
    }

    /// Target time of an `advance_time(dt)` call
    pub(crate) fn target(&self, dt: f64) -> Result<f64, SimError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::NegativeTimeStep { dt });
        }
        if !self.ready {
            return Err(SimError::NotInitialized);
        }
        Ok(self.now + dt)
    }

    /// Hand an applied event to every observer; any of them may pause the run
    pub(crate) fn notify(&mut self, event: &Event) {
        for handler in &mut self.handlers {
            if handler.handle(event) == Flow::Pause {
                self.paused = true;
            }
        }
        if self.paused {
            log::info!("paused after {event}");
        }
    }

    pub(crate) fn add_handler(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub(crate) fn remove_handlers(&mut self) {
        self.handlers.clear();
    }

    pub(crate) fn pause(&mut self) {
        self.paused = true;
    }

    pub(crate) fn resume(&mut self) {
        if self.paused {
            log::info!("resuming at t={:.6}", self.now);
        }
        self.paused = false;
    }

    pub(crate) fn get_ball(&self, id: BallId) -> Result<Ball, SimError> {
        self.world.snapshot(id, self.now)
    }

    pub(crate) fn balls(&self) -> Vec<Ball> {
        self.world.snapshots(self.now)
    }
}

/// Caller-facing contract of a simulation run
pub trait Simulation: Send {
    /// Queue the seed events and derive the first candidates. Must be called
    /// before time can advance.
    fn init(&mut self, seeds: Vec<Event>) -> Result<(), SimError>;

    /// Apply every event due before `now + dt`, then move the clock there.
    /// A pause stops processing and leaves the clock at the last applied event.
    fn advance_time(&mut self, dt: f64) -> Result<(), SimError>;

    /// Apply events until none remain or the run is paused
    fn finish(&mut self) -> Result<(), SimError>;

    fn pause(&mut self);

    fn resume(&mut self);

    fn is_paused(&self) -> bool;

    fn is_ready(&self) -> bool;

    fn current_time(&self) -> f64;

    /// Snapshot of one ball at the current time
    fn get_ball(&self, id: BallId) -> Result<Ball, SimError>;

    /// Snapshot of every ball at the current time, ordered by id
    fn balls(&self) -> Vec<Ball>;

    fn tiles(&self) -> &TileGrid;

    fn table(&self) -> &Table;

    fn pending_events(&self) -> usize;

    fn add_event_handler(&mut self, handler: Box<dyn EventHandler>);

    fn remove_handlers(&mut self);
}
