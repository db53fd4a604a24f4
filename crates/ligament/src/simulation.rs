//! # Simulation
//!
//! The fixed-timestep orchestration. Every tick runs the same sequence:
//!
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. SYNC IN      kinematic entities -> move-to-target                │
//! │ 2. GAMEPLAY     user code sets velocities, drives motors            │
//! │ 3. CHARACTERS   extended update of every character controller       │
//! │ 4. STEP         physics step with collision substeps                │
//! │ 5. EVENTS       collision queue drained into the callback           │
//! │ 6. SYNC OUT     dynamic bodies -> entities, characters -> entities  │
//! │ 7. VISUALS      entity matrices -> visual sink                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wall-clock frame time is clamped, accumulated, and consumed in whole
//! ticks; whatever is left over is exposed as the interpolation alpha.

use std::time::{Duration, Instant};

use ligament_core::VisualSink;
use ligament_physics::PhysicsWorld;

use crate::config::{check_timing, SimulationConfig};
use crate::ecs::EntityManager;
use crate::error::SimulationResult;
use crate::sync::{
    sync_character_controllers_to_entities, sync_entities_to_physics, sync_entity_transforms,
    sync_physics_to_entities, update_all_character_controllers,
};

/// Interval over which the FPS estimate is averaged, in seconds.
pub const FPS_WINDOW: f64 = 0.5;

/// State handed to gameplay code once per tick.
pub struct TickContext<'a> {
    /// All entities.
    pub entities: &'a mut EntityManager,
    /// The physics world. Not stepped yet this tick.
    pub physics: &'a mut PhysicsWorld,
    /// Tick length in seconds.
    pub dt: f64,
    /// Simulation time at the start of this tick.
    pub time: f64,
    /// Index of this tick.
    pub tick: u64,
}

/// Gameplay code run every tick, before characters and physics.
pub trait Gameplay {
    /// Advances gameplay by one tick.
    fn update(&mut self, ctx: &mut TickContext<'_>);
}

impl<F> Gameplay for F
where
    F: FnMut(&mut TickContext<'_>),
{
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        self(ctx);
    }
}

/// Gameplay that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGameplay;

impl Gameplay for NoGameplay {
    fn update(&mut self, _ctx: &mut TickContext<'_>) {}
}

/// Fixed-timestep accumulator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedTimestep {
    step: f64,
    max_frame_time: f64,
    accumulator: f64,
}

impl FixedTimestep {
    /// Creates an empty accumulator.
    ///
    /// # Errors
    ///
    /// [`crate::SimulationError::InvalidConfig`] unless both durations are
    /// positive and finite.
    pub fn new(step: f64, max_frame_time: f64) -> SimulationResult<Self> {
        check_timing(step, max_frame_time)?;
        Ok(Self {
            step,
            max_frame_time,
            accumulator: 0.0,
        })
    }

    /// Adds a frame's time, clamped to the maximum frame time. A NaN frame
    /// time adds nothing.
    ///
    /// # Returns
    ///
    /// The time actually added.
    pub fn accumulate(&mut self, frame_time: f64) -> f64 {
        let clamped = if frame_time.is_nan() {
            0.0
        } else {
            frame_time.clamp(0.0, self.max_frame_time)
        };
        self.accumulator += clamped;
        clamped
    }

    /// Takes one tick's worth of time if available.
    pub fn consume(&mut self) -> bool {
        if self.accumulator >= self.step {
            self.accumulator -= self.step;
            true
        } else {
            false
        }
    }

    /// Leftover fraction of a tick, in `[0, 1)`.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.accumulator / self.step
    }

    /// Tick length.
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Time waiting to be consumed.
    #[must_use]
    pub const fn pending(&self) -> f64 {
        self.accumulator
    }
}

/// Timing of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Ticks run this frame.
    pub ticks: u32,
    /// Time spent in physics steps, in microseconds.
    pub step_us: u64,
    /// Time spent in the whole frame, in microseconds.
    pub total_us: u64,
    /// Collision events dispatched.
    pub events: usize,
    /// Interpolation alpha after the frame.
    pub alpha: f64,
}

/// Running totals over many frames.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Frames recorded.
    pub frames_recorded: u64,
    /// Ticks run over all frames.
    pub ticks: u64,
    /// Sum of frame times.
    pub total_us_sum: u64,
    /// Sum of physics step times.
    pub step_us_sum: u64,
    /// Fastest frame.
    pub min_frame_us: u64,
    /// Slowest frame.
    pub max_frame_us: u64,
    /// Collision events dispatched.
    pub events: u64,
}

impl FrameStatsAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames_recorded: 0,
            ticks: 0,
            total_us_sum: 0,
            step_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            events: 0,
        }
    }

    /// Records one frame.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.ticks += u64::from(stats.ticks);
        self.total_us_sum += stats.total_us;
        self.step_us_sum += stats.step_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.events += stats.events as u64;
    }

    /// Average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Average physics step time per tick in milliseconds.
    #[must_use]
    pub fn avg_step_ms(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        (self.step_us_sum as f64 / self.ticks as f64) / 1000.0
    }

    /// Prints a summary of the statistics.
    pub fn print_summary(&self) {
        let min_ms = if self.frames_recorded == 0 {
            0.0
        } else {
            self.min_frame_us as f64 / 1000.0
        };
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║                  SIMULATION STATISTICS SUMMARY                   ║");
        println!("╚══════════════════════════════════════════════════════════════════╝");
        println!();
        println!("┌─ TIMING ─────────────────────────────────────────────────────────┐");
        println!("│ Frames Recorded:    {}", self.frames_recorded);
        println!("│ Ticks Run:          {}", self.ticks);
        println!("│ Average Frame:      {:.3} ms", self.avg_frame_ms());
        println!("│ Min Frame:          {min_ms:.3} ms");
        println!("│ Max Frame:          {:.3} ms", self.max_frame_us as f64 / 1000.0);
        println!("│ Average Step:       {:.3} ms", self.avg_step_ms());
        println!("└──────────────────────────────────────────────────────────────────┘");
        println!();
        println!("┌─ EVENTS ─────────────────────────────────────────────────────────┐");
        println!("│ Collisions:         {}", self.events);
        println!("└──────────────────────────────────────────────────────────────────┘");
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Entities, physics and the clock that drives them.
pub struct Simulation {
    // Declared before `physics`: components release their handles while
    // the world still exists.
    entities: EntityManager,
    physics: PhysicsWorld,
    config: SimulationConfig,
    clock: FixedTimestep,
    paused: bool,
    time: f64,
    tick_count: u64,
    fps: f64,
    fps_frames: u32,
    fps_timer: f64,
    last_frame: Option<Instant>,
    stats: FrameStatsAccumulator,
}

impl Simulation {
    /// Builds the physics world and an empty entity manager.
    ///
    /// # Errors
    ///
    /// Invalid configuration or a failed physics world.
    pub fn new(config: SimulationConfig) -> SimulationResult<Self> {
        config.validate()?;
        let mut physics = PhysicsWorld::new(&config.physics)?;
        physics.set_report_stay_events(config.report_stay_events);

        tracing::info!(
            fixed_timestep = config.fixed_timestep,
            max_frame_time = config.max_frame_time,
            collision_steps = config.collision_steps,
            "simulation created"
        );

        Ok(Self {
            entities: EntityManager::new(),
            physics,
            clock: FixedTimestep::new(config.fixed_timestep, config.max_frame_time)?,
            config,
            paused: false,
            time: 0.0,
            tick_count: 0,
            fps: 0.0,
            fps_frames: 0,
            fps_timer: 0.0,
            last_frame: None,
            stats: FrameStatsAccumulator::new(),
        })
    }

    /// Measures the time since the previous call and advances by it.
    ///
    /// The first call only starts the clock.
    pub fn frame(&mut self, now: Instant, gameplay: &mut dyn Gameplay, sink: &mut dyn VisualSink) -> FrameStats {
        let frame_time = self
            .last_frame
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_frame = Some(now);
        self.advance(frame_time.as_secs_f64(), gameplay, sink)
    }

    /// Advances by an externally measured frame time, running as many
    /// ticks as the accumulator allows.
    pub fn advance(&mut self, frame_time: f64, gameplay: &mut dyn Gameplay, sink: &mut dyn VisualSink) -> FrameStats {
        let started = Instant::now();
        let frame_time = frame_time.clamp(0.0, self.config.max_frame_time);
        self.update_fps(frame_time);

        let mut stats = FrameStats::default();
        if !self.paused {
            self.clock.accumulate(frame_time);
            while self.clock.consume() {
                let (step_us, events) = self.tick(gameplay, sink);
                stats.ticks += 1;
                stats.step_us += step_us;
                stats.events += events;
            }
        }
        stats.alpha = self.clock.alpha();
        stats.total_us = started.elapsed().as_micros() as u64;
        self.stats.record(stats);
        stats
    }

    /// Runs one tick. Returns the step time in microseconds and the
    /// number of collision events dispatched.
    fn tick(&mut self, gameplay: &mut dyn Gameplay, sink: &mut dyn VisualSink) -> (u64, usize) {
        let dt = self.clock.step();
        let dt32 = dt as f32;

        sync_entities_to_physics(&mut self.entities, dt32);

        let mut ctx = TickContext {
            entities: &mut self.entities,
            physics: &mut self.physics,
            dt,
            time: self.time,
            tick: self.tick_count,
        };
        gameplay.update(&mut ctx);

        let gravity = self.physics.gravity();
        update_all_character_controllers(&mut self.entities, dt32, gravity);

        let step_started = Instant::now();
        self.physics.step(dt32, self.config.collision_steps);
        let step_us = step_started.elapsed().as_micros() as u64;

        let events = self.physics.process_collisions();

        sync_physics_to_entities(&mut self.entities);
        sync_character_controllers_to_entities(&mut self.entities);
        sync_entity_transforms(&mut self.entities, sink);

        self.time += dt;
        self.tick_count += 1;
        (step_us, events)
    }

    fn update_fps(&mut self, frame_time: f64) {
        self.fps_frames += 1;
        self.fps_timer += frame_time;
        if self.fps_timer >= FPS_WINDOW {
            self.fps = f64::from(self.fps_frames) / self.fps_timer;
            self.fps_frames = 0;
            self.fps_timer = 0.0;
        }
    }

    // =========================================================================
    // Pause
    // =========================================================================

    /// Stops ticking. Frames still count towards the FPS estimate.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes ticking.
    pub fn unpause(&mut self) {
        self.paused = false;
    }

    /// Flips the pause state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Whether ticking is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// All entities.
    #[must_use]
    pub const fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// All entities, mutably.
    pub fn entities_mut(&mut self) -> &mut EntityManager {
        &mut self.entities
    }

    /// The physics world.
    #[must_use]
    pub const fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// The physics world, mutably.
    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    /// Entities and physics at once, for attaching components.
    pub fn parts_mut(&mut self) -> (&mut EntityManager, &mut PhysicsWorld) {
        (&mut self.entities, &mut self.physics)
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Tick length in seconds.
    #[must_use]
    pub const fn fixed_timestep(&self) -> f64 {
        self.clock.step()
    }

    /// Simulated time in seconds.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Ticks run since creation.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Smoothed frames per second.
    #[must_use]
    pub const fn fps(&self) -> f64 {
        self.fps
    }

    /// Leftover fraction of a tick, for render interpolation.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.clock.alpha()
    }

    /// Totals over every frame so far.
    #[must_use]
    pub const fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("entities", &self.entities.len())
            .field("paused", &self.paused)
            .field("time", &self.time)
            .field("ticks", &self.tick_count)
            .finish_non_exhaustive()
    }
}
