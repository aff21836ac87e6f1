//! Snooker Sim demo
//!
//! Plays a break-off shot on a full-size table with the precomputed engine,
//! logs every event (`RUST_LOG=debug`) and prints where the balls ended up.
//!
//! Usage: `snooker-sim [seed]`. A seed perturbs the shot with cue noise.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Snooker Sim (native) starting...");

    if let Err(e) = demo::run(std::env::args().nth(1)) {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library-only on the web; the demo needs a terminal
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use serde::Serialize;

    use snooker_sim::sim::{EventRecorder, PrescheduledSimulation, ShotNoise};
    use snooker_sim::{BallId, BallKind, CueShot, Event, SimSettings, Simulation, Table};

    /// Cue speed of the break (m/s)
    const BREAK_SPEED: f64 = 3.5;
    /// Right-hand side on the cue ball, as a fraction of its radius
    const BREAK_SIDE: f64 = 0.3;
    /// Playback frame length (s)
    const FRAME: f64 = 1.0 / 60.0;

    #[derive(Serialize)]
    struct Summary {
        seed: Option<u64>,
        duration: f64,
        events: usize,
        ball_collisions: usize,
        potted: Vec<BallId>,
        balls: Vec<snooker_sim::Ball>,
    }

    pub fn run(seed: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
        let seed = seed.map(|s| s.parse::<u64>()).transpose()?;
        let table = Table::snooker();
        let balls = table.frame_layout();

        // Aim thin on the right-hand end of the back row of reds
        let cue = balls
            .iter()
            .find(|b| b.kind == BallKind::Cue)
            .ok_or("frame layout has no cue ball")?;
        let target = table
            .red_spots()
            .into_iter()
            .max_by(|a, b| (a.x + a.y).total_cmp(&(b.x + b.y)))
            .ok_or("frame layout has no reds")?;
        let aim = target + glam::DVec2::new(1.8 * table.ball_radius, 0.0) - cue.position;

        let mut shot = CueShot::new(aim.y.atan2(aim.x), BREAK_SPEED).with_spin(BREAK_SIDE * table.ball_radius, 0.0);
        if let Some(seed) = seed {
            shot = shot.with_noise(&mut Pcg32::seed_from_u64(seed), &ShotNoise::default());
            log::info!("Perturbed break with seed {seed}: heading {:.4}", shot.heading);
        }

        let mut sim = PrescheduledSimulation::new(table, SimSettings::default(), balls)?;
        let recorder = EventRecorder::new();
        sim.add_event_handler(Box::new(recorder.clone()));
        sim.init(vec![Event::cue_strike(0.0, BallId(0), shot)])?;

        let frames = sim.end_time().map_or(0, |end| (end / FRAME).ceil() as usize);
        log::info!("Playing back {} events over {frames} frames", sim.remaining());
        for _ in 0..frames {
            if let Some(next) = sim.next_pocketing() {
                log::debug!("next pot: {next}");
            }
            sim.advance_time(FRAME)?;
        }
        sim.finish()?;

        let events = recorder.take();
        let summary = Summary {
            seed,
            duration: sim.current_time(),
            events: events.len(),
            ball_collisions: events.iter().filter(|e| e.is_ball_collision()).count(),
            potted: events
                .iter()
                .filter(|e| e.is_pocketing())
                .flat_map(Event::participants)
                .collect(),
            balls: sim.balls(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }
}
