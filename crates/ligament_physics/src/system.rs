//! # Simulation System
//!
//! The engine state behind the world lock: body/collider/joint tables, the
//! broad and narrow phase, the query structure and the pipeline that
//! steps them.

use std::collections::HashMap;

use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet,
    RigidBodyHandle, RigidBodySet,
};
use rapier3d::geometry::{ColliderSet, DefaultBroadPhase, NarrowPhase};
use rapier3d::math::{Isometry, Real, Vector};
use rapier3d::pipeline::{PhysicsPipeline, QueryPipeline};

use crate::config::PhysicsConfig;
use crate::constraint::ConstraintRegistry;
use crate::convert::{from_vector, to_vector};
use crate::events::CollisionCollector;
use crate::layers::LayerFilter;

/// Engine state shared by the world and every component linked to it.
///
/// Reached through [`crate::PhysicsWorld::lock`] or a [`crate::WorldLink`].
pub struct PhysicsSystem {
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    pub(crate) impulse_joints: ImpulseJointSet,
    pub(crate) multibody_joints: MultibodyJointSet,
    pub(crate) islands: IslandManager,
    pub(crate) broad_phase: DefaultBroadPhase,
    pub(crate) narrow_phase: NarrowPhase,
    pub(crate) ccd: CCDSolver,
    pub(crate) queries: QueryPipeline,
    pub(crate) layers: LayerFilter,
    pub(crate) constraints: ConstraintRegistry,
    pub(crate) kinematic_targets: HashMap<RigidBodyHandle, Isometry<Real>>,
    pub(crate) max_bodies: u32,
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    gravity: Vector<Real>,
    collector: CollisionCollector,
    queries_dirty: bool,
    step_count: u64,
}

impl PhysicsSystem {
    pub(crate) fn new(config: &PhysicsConfig, layers: LayerFilter, collector: CollisionCollector) -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd: CCDSolver::new(),
            queries: QueryPipeline::new(),
            layers,
            constraints: ConstraintRegistry::default(),
            kinematic_targets: HashMap::new(),
            max_bodies: config.max_bodies,
            pipeline: PhysicsPipeline::new(),
            params: IntegrationParameters::default(),
            gravity: to_vector(config.gravity_vec()),
            collector,
            queries_dirty: false,
            step_count: 0,
        }
    }

    /// Advances the simulation by `dt` seconds split into
    /// `collision_steps` substeps.
    ///
    /// Pending kinematic targets are interpolated across the substeps and
    /// consumed.
    ///
    /// # Returns
    ///
    /// Number of substeps executed; zero for a non-positive `dt`.
    pub fn step(&mut self, dt: f32, collision_steps: u32) -> u32 {
        if !(dt > 0.0 && dt.is_finite()) {
            return 0;
        }

        let substeps = collision_steps.max(1);
        self.params.dt = dt / substeps as f32;

        let plans: Vec<_> = self
            .kinematic_targets
            .drain()
            .filter_map(|(handle, target)| {
                let start = *self.bodies.get(handle)?.position();
                Some((handle, start, target))
            })
            .collect();

        for substep in 1..=substeps {
            let t = substep as f32 / substeps as f32;
            for (handle, start, target) in &plans {
                if let Some(body) = self.bodies.get_mut(*handle) {
                    body.set_next_kinematic_position(start.lerp_slerp(target, t));
                }
            }

            self.pipeline.step(
                &self.gravity,
                &self.params,
                &mut self.islands,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd,
                Some(&mut self.queries),
                &(),
                &self.collector,
            );
        }

        self.queries_dirty = false;
        self.step_count += 1;
        substeps
    }

    /// Rebuilds the query structure from scratch.
    ///
    /// Call once after bulk body creation.
    pub fn optimize_broad_phase(&mut self) {
        self.queries.update(&self.colliders);
        self.queries_dirty = false;
    }

    /// Brings the query structure up to date if bodies were added,
    /// removed or teleported since the last step.
    pub(crate) fn refresh_queries(&mut self) {
        if self.queries_dirty {
            self.queries.update(&self.colliders);
            self.queries_dirty = false;
        }
    }

    pub(crate) fn mark_queries_dirty(&mut self) {
        self.queries_dirty = true;
    }

    /// World gravity.
    #[must_use]
    pub fn gravity(&self) -> glam::Vec3 {
        from_vector(&self.gravity)
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of completed `step` calls.
    #[must_use]
    pub const fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Events dropped because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.collector.dropped()
    }
}
