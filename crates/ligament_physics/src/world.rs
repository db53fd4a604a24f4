//! # Physics World
//!
//! Owner of the engine state and everything the step needs around it:
//! the scratch budget, the worker pool, the layer filter and the
//! collision queue.
//!
//! Construction is all-or-nothing. Each sub-resource is built in order
//! and bound to a local; the first failure returns early and the locals
//! already built are dropped in reverse order.
//!
//! ## Sharing
//!
//! The engine state sits behind `Arc<Mutex<_>>`. Components keep a
//! [`WorldLink`], a weak reference, so a component that outlives its
//! world turns every call into a no-op.

use std::sync::{Arc, Weak};

use glam::Vec3;
use ligament_core::{EntityId, ScratchArena};
use parking_lot::{Mutex, MutexGuard};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::body::BodyHandle;
use crate::config::PhysicsConfig;
use crate::constraint::{ConstraintDesc, ConstraintHandle, MotorState};
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::{CollisionCallback, CollisionEvent, CollisionQueue};
use crate::layers::{LayerFilter, LayerMask};
use crate::query::RaycastHit;
use crate::system::PhysicsSystem;

/// Weak handle to a world's engine state.
#[derive(Clone, Debug, Default)]
pub struct WorldLink(Weak<Mutex<PhysicsSystem>>);

impl WorldLink {
    /// Runs `f` against the engine state if the world is still alive.
    pub fn with<R>(&self, f: impl FnOnce(&mut PhysicsSystem) -> R) -> Option<R> {
        let system = self.0.upgrade()?;
        let mut guard = system.lock();
        Some(f(&mut guard))
    }

    /// Checks if the world still exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Checks if two links point at the same world.
    #[must_use]
    pub fn same_world(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for PhysicsSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsSystem")
            .field("bodies", &self.body_count())
            .field("steps", &self.step_count())
            .finish_non_exhaustive()
    }
}

/// The physics world.
pub struct PhysicsWorld {
    system: Arc<Mutex<PhysicsSystem>>,
    events: CollisionQueue,
    callback: Option<CollisionCallback>,
    scratch: ScratchArena,
    jobs: ThreadPool,
    config: PhysicsConfig,
}

impl PhysicsWorld {
    /// Builds a world.
    ///
    /// # Errors
    ///
    /// Any sub-resource failure. Nothing built before the failure
    /// survives the call.
    pub fn new(config: &PhysicsConfig) -> PhysicsResult<Self> {
        config.validate().map_err(log_init_failure)?;

        let scratch = ScratchArena::new(config.scratch_bytes)
            .ok_or(PhysicsError::ScratchAllocator {
                bytes: config.scratch_bytes,
            })
            .map_err(log_init_failure)?;

        let jobs = ThreadPoolBuilder::new()
            .num_threads(config.resolved_worker_threads())
            .thread_name(|i| format!("ligament-physics-{i}"))
            .build()
            .map_err(|e| PhysicsError::JobScheduler(e.to_string()))
            .map_err(log_init_failure)?;

        let layers = LayerFilter::new();
        let (collector, events) = CollisionQueue::new(config.max_body_pairs as usize);
        let system = PhysicsSystem::new(config, layers, collector);

        tracing::info!(
            max_bodies = config.max_bodies,
            max_body_pairs = config.max_body_pairs,
            max_contact_constraints = config.max_contact_constraints,
            workers = jobs.current_num_threads(),
            "physics world created"
        );

        Ok(Self {
            system: Arc::new(Mutex::new(system)),
            events,
            callback: None,
            scratch,
            jobs,
            config: config.clone(),
        })
    }

    /// Locks the engine state.
    ///
    /// Do not hold the guard across [`Self::step`] or
    /// [`Self::process_collisions`].
    pub fn lock(&self) -> MutexGuard<'_, PhysicsSystem> {
        self.system.lock()
    }

    /// Weak link for components.
    #[must_use]
    pub fn link(&self) -> WorldLink {
        WorldLink(Arc::downgrade(&self.system))
    }

    /// Configuration the world was built with.
    #[must_use]
    pub const fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Advances the world by `dt` on the worker pool.
    ///
    /// # Returns
    ///
    /// Number of substeps executed.
    pub fn step(&mut self, dt: f32, collision_steps: u32) -> u32 {
        self.scratch.reset();
        let system = &self.system;
        self.jobs.install(|| system.lock().step(dt, collision_steps))
    }

    /// Rebuilds the query structure. Call once after bulk body creation.
    pub fn optimize_broad_phase(&self) {
        self.system.lock().optimize_broad_phase();
    }

    /// Casts a ray against every body.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        self.system.lock().raycast(origin, direction, max_distance)
    }

    /// Casts a ray against bodies whose layer is in `mask`.
    pub fn raycast_filtered(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RaycastHit> {
        self.system
            .lock()
            .raycast_filtered(origin, direction, max_distance, mask)
    }

    /// Casts a ray against every body except `ignore`.
    pub fn raycast_ignore(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: BodyHandle,
    ) -> Option<RaycastHit> {
        self.system
            .lock()
            .raycast_ignore(origin, direction, max_distance, ignore)
    }

    /// Installs the collision callback, replacing any previous one.
    pub fn set_collision_callback(&mut self, callback: impl FnMut(&CollisionEvent) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Removes the collision callback.
    pub fn clear_collision_callback(&mut self) {
        self.callback = None;
    }

    /// Enables stay events for pairs that remain in contact.
    pub fn set_report_stay_events(&mut self, enabled: bool) {
        self.events.set_report_stay(enabled);
    }

    /// Whether stay events are produced.
    #[must_use]
    pub const fn report_stay_events(&self) -> bool {
        self.events.report_stay()
    }

    /// Drains the collision queue into the callback.
    ///
    /// The queue is drained even with no callback installed. The callback
    /// runs with the world unlocked, so it may lock the world itself.
    ///
    /// # Returns
    ///
    /// Number of events drained.
    pub fn process_collisions(&mut self) -> usize {
        let batch = self.drain_collision_events();
        if let Some(callback) = self.callback.as_mut() {
            for event in &batch {
                callback(event);
            }
        }
        batch.len()
    }

    /// Drains the collision queue and returns the batch.
    ///
    /// The batch is charged to the step's scratch budget. Going over it is
    /// logged; no event is dropped.
    pub fn drain_collision_events(&mut self) -> Vec<CollisionEvent> {
        let batch = self.events.drain(&self.system.lock());
        if !self.scratch.charge::<CollisionEvent>(batch.len()) {
            tracing::warn!(
                events = batch.len(),
                budget = self.scratch.capacity(),
                "collision batch exceeds the scratch budget"
            );
        }
        batch
    }

    /// Number of pairs currently in contact.
    #[must_use]
    pub fn active_contact_pairs(&self) -> usize {
        self.events.active_pairs()
    }

    /// Checks if any enabled constraint references `body`.
    #[must_use]
    pub fn body_has_constraint(&self, body: BodyHandle) -> bool {
        self.system.lock().body_has_constraint(body)
    }

    /// Entity stored on a body.
    #[must_use]
    pub fn entity_for_body(&self, body: BodyHandle) -> Option<EntityId> {
        self.system.lock().entity_for_body(body)
    }

    /// Creates a constraint.
    ///
    /// # Errors
    ///
    /// See [`PhysicsSystem::create_constraint`].
    pub fn create_constraint(
        &self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        desc: &ConstraintDesc,
    ) -> PhysicsResult<ConstraintHandle> {
        self.system.lock().create_constraint(body_a, body_b, desc)
    }

    /// Removes a constraint.
    pub fn remove_constraint(&self, handle: ConstraintHandle) -> bool {
        self.system.lock().remove_constraint(handle)
    }

    /// Enables or disables a constraint.
    pub fn set_constraint_enabled(&self, handle: ConstraintHandle, enabled: bool) -> bool {
        self.system.lock().set_constraint_enabled(handle, enabled)
    }

    /// Switches a motor's mode.
    pub fn set_motor_state(&self, handle: ConstraintHandle, state: MotorState) -> bool {
        self.system.lock().set_motor_state(handle, state)
    }

    /// Sets a motor's velocity target.
    pub fn set_motor_target_velocity(&self, handle: ConstraintHandle, velocity: f32) -> bool {
        self.system.lock().set_motor_target_velocity(handle, velocity)
    }

    /// Sets a motor's position target.
    pub fn set_motor_target_position(&self, handle: ConstraintHandle, position: f32) -> bool {
        self.system.lock().set_motor_target_position(handle, position)
    }

    /// Current hinge angle or slider offset.
    #[must_use]
    pub fn constraint_position(&self, handle: ConstraintHandle) -> Option<f32> {
        self.system.lock().constraint_position(handle)
    }

    /// World gravity.
    #[must_use]
    pub fn gravity(&self) -> Vec3 {
        self.system.lock().gravity()
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.system.lock().body_count()
    }

    /// Peak scratch usage since creation, in bytes.
    #[must_use]
    pub const fn scratch_peak(&self) -> usize {
        self.scratch.peak()
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("config", &self.config)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for PhysicsWorld {
    fn drop(&mut self) {
        let links = Arc::weak_count(&self.system);
        tracing::debug!(links, "physics world destroyed");
    }
}

fn log_init_failure(error: PhysicsError) -> PhysicsError {
    tracing::error!(%error, "physics world construction failed");
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_world_builds() {
        let world = PhysicsWorld::new(&PhysicsConfig::default()).unwrap();
        assert_eq!(world.body_count(), 0);
        assert!((world.gravity().y + 9.81).abs() < 1e-6);
        assert!(world.link().is_alive());
    }

    #[test]
    fn test_zero_scratch_fails() {
        let config = PhysicsConfig {
            scratch_bytes: 0,
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            PhysicsWorld::new(&config),
            Err(PhysicsError::ScratchAllocator { bytes: 0 })
        ));
    }

    #[test]
    fn test_link_dies_with_world() {
        let world = PhysicsWorld::new(&PhysicsConfig::default()).unwrap();
        let link = world.link();
        assert_eq!(link.with(|s| s.body_count()), Some(0));

        drop(world);
        assert!(!link.is_alive());
        assert_eq!(link.with(|s| s.body_count()), None);
    }

    #[test]
    fn test_step_without_bodies() {
        let mut world = PhysicsWorld::new(&PhysicsConfig {
            worker_threads: 1,
            ..PhysicsConfig::default()
        })
        .unwrap();
        assert_eq!(world.step(1.0 / 60.0, 2), 2);
        assert_eq!(world.step(0.0, 2), 0);
        assert_eq!(world.process_collisions(), 0);
    }
}
