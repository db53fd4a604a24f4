//! # Raycasts
//!
//! One cast, three filters: none, a layer mask, or one excluded body.
//! Rays are cast over `direction * max_distance` with a unit time of
//! impact, so the engine's time of impact is the hit fraction directly.

use glam::Vec3;
use ligament_core::EntityId;
use rapier3d::geometry::{Collider, ColliderHandle, Ray};
use rapier3d::pipeline::QueryFilter;

use crate::body::BodyHandle;
use crate::convert::{from_vector, to_point, to_vector};
use crate::layers::{LayerMask, ObjectLayer};
use crate::system::PhysicsSystem;

/// Result of a raycast that hit something.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit {
    /// Entity owning the struck body, if any.
    pub entity: Option<EntityId>,
    /// Struck body.
    pub body: Option<BodyHandle>,
    /// World-space hit point.
    pub position: Vec3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
    /// Distance from the origin.
    pub distance: f32,
    /// Fraction of `max_distance` travelled, in `[0, 1]`.
    pub fraction: f32,
}

fn layer_of(collider: &Collider) -> Option<ObjectLayer> {
    u32::try_from(collider.user_data)
        .ok()
        .and_then(ObjectLayer::from_index)
}

impl PhysicsSystem {
    /// Casts a ray against every body.
    pub fn raycast(&mut self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        self.cast(origin, direction, max_distance, QueryFilter::default())
    }

    /// Casts a ray against bodies whose layer is in `mask`.
    pub fn raycast_filtered(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RaycastHit> {
        let predicate =
            |_: ColliderHandle, collider: &Collider| layer_of(collider).is_some_and(|l| mask.contains(l));
        self.cast(
            origin,
            direction,
            max_distance,
            QueryFilter::default().predicate(&predicate),
        )
    }

    /// Casts a ray against every body except `ignore`.
    pub fn raycast_ignore(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: BodyHandle,
    ) -> Option<RaycastHit> {
        self.cast(
            origin,
            direction,
            max_distance,
            QueryFilter::default().exclude_rigid_body(ignore.0),
        )
    }

    pub(crate) fn cast(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter<'_>,
    ) -> Option<RaycastHit> {
        let direction = direction.try_normalize()?;
        if !(max_distance > 0.0 && max_distance.is_finite()) {
            return None;
        }
        self.refresh_queries();

        let ray = Ray::new(to_point(origin), to_vector(direction * max_distance));
        let (collider, hit) = self.queries.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            1.0,
            true,
            filter,
        )?;

        let fraction = hit.time_of_impact;
        let distance = fraction * max_distance;
        let parent = self.colliders.get(collider).and_then(Collider::parent);
        let body = parent.map(BodyHandle);
        Some(RaycastHit {
            entity: body.and_then(|b| self.entity_for_body(b)),
            body,
            position: origin + direction * distance,
            normal: from_vector(&hit.normal),
            distance,
            fraction,
        })
    }
}
