//! Event observers
//!
//! Handlers run inline on the thread driving the simulation, right after
//! each event is applied. Returning [`Flow::Pause`] stops the run at that
//! event; the caller resumes it explicitly.

use std::sync::{Arc, Mutex, MutexGuard};

use super::event::Event;

/// What the run should do after a handler has seen an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Pause,
}

pub trait EventHandler: Send {
    fn handle(&mut self, event: &Event) -> Flow;
}

impl<F> EventHandler for F
where
    F: FnMut(&Event) -> Flow + Send,
{
    fn handle(&mut self, event: &Event) -> Flow {
        self(event)
    }
}

/// Keeps every applied event. Clones share one log, so keep a clone and
/// hand the other to the simulation.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Drain the log
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A handler that panicked mid-push leaves a usable log behind
    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventHandler for EventRecorder {
    fn handle(&mut self, event: &Event) -> Flow {
        self.lock().push(event.clone());
        Flow::Continue
    }
}

/// Pauses the run once a number of impacts have been applied
#[derive(Debug, Clone)]
pub struct CollisionLimit {
    limit: usize,
    seen: usize,
    balls_only: bool,
}

impl CollisionLimit {
    /// Count ball, cushion and jaw impacts
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            seen: 0,
            balls_only: false,
        }
    }

    /// Count ball-ball impacts only
    pub fn ball_collisions(limit: usize) -> Self {
        Self {
            balls_only: true,
            ..Self::new(limit)
        }
    }

    pub fn seen(&self) -> usize {
        self.seen
    }
}

impl EventHandler for CollisionLimit {
    fn handle(&mut self, event: &Event) -> Flow {
        let counted = if self.balls_only {
            event.is_ball_collision()
        } else {
            event.is_collision()
        };
        if counted {
            self.seen += 1;
        }
        if self.seen >= self.limit {
            Flow::Pause
        } else {
            Flow::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::event::EventKind;
    use crate::sim::state::{BallId, MotionPhase};

    fn cushion(time: f64) -> Event {
        Event::new(time, EventKind::CushionCollision { ball: BallId(0), cushion: 0 })
    }

    fn stop(time: f64) -> Event {
        Event::new(time, EventKind::StateChange { ball: BallId(0), to: MotionPhase::Resting })
    }

    #[test]
    fn test_recorder_clones_share_log() {
        let recorder = EventRecorder::new();
        let mut handler = recorder.clone();
        assert_eq!(handler.handle(&stop(1.0)), Flow::Continue);
        handler.handle(&cushion(2.0));
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.take()[1].time, 2.0);
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_collision_limit_counts_impacts_only() {
        let mut limit = CollisionLimit::new(2);
        assert_eq!(limit.handle(&cushion(0.1)), Flow::Continue);
        assert_eq!(limit.handle(&stop(0.2)), Flow::Continue);
        assert_eq!(limit.handle(&cushion(0.3)), Flow::Pause);
        assert_eq!(limit.seen(), 2);

        let mut balls = CollisionLimit::ball_collisions(1);
        assert_eq!(balls.handle(&cushion(0.1)), Flow::Continue);
        let hit = Event::new(0.2, EventKind::BallCollision { a: BallId(0), b: BallId(1) });
        assert_eq!(balls.handle(&hit), Flow::Pause);
    }

    #[test]
    fn test_closure_handler() {
        let mut count = 0;
        let mut handler = |_: &Event| {
            count += 1;
            if count > 1 { Flow::Pause } else { Flow::Continue }
        };
        assert_eq!(handler.handle(&stop(0.0)), Flow::Continue);
        assert_eq!(handler.handle(&stop(0.0)), Flow::Pause);
    }
}
