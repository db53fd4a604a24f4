//! # Virtual Character
//!
//! A capsule that sweeps itself through the world instead of being
//! solved as a dynamic body. Each update:
//!
//! 1. Validate: bodies within reach are offered to the listener, which may
//!    tell the sweep to ignore them.
//! 2. Sweep: slide, step up stairs and stick to the floor.
//! 3. Contacts: every body touching the capsule at its new pose is
//!    reported as added, then solved. Solving may push the body. Bodies
//!    ignored in step 1 are still reported as added but never solved.
//! 4. Resolve: cancel velocity into solved contacts, recover from
//!    penetration.
//! 5. Classify the support under the capsule and push a dynamic floor
//!    down with the character's weight.
//!
//! An inner kinematic body on the dynamic layer follows the capsule so
//! rigid bodies are shoved by the character during the step as well.

use std::collections::HashSet;

use glam::{Quat, Vec3};
use ligament_core::EntityId;
use rapier3d::control::{CharacterAutostep, CharacterCollision, CharacterLength, KinematicCharacterController};
use rapier3d::geometry::{Collider, ColliderHandle, SharedShape};
use rapier3d::na::Unit;
use rapier3d::parry::bounding_volume::BoundingVolume;
use rapier3d::parry::query;
use rapier3d::pipeline::QueryFilter;

use crate::body::{BodyDesc, BodyHandle, MotionType};
use crate::convert::{from_point, from_vector, to_isometry, to_vector};
use crate::error::{PhysicsError, PhysicsResult};
use crate::layers::ObjectLayer;
use crate::shape::{Shape, ShapeDesc};
use crate::system::PhysicsSystem;

/// Below this, a normal counts as pointing up for support purposes.
const MIN_SUPPORT_COS: f32 = 0.1;

/// Static settings of a character.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterSettings {
    /// Capsule radius.
    pub radius: f32,
    /// Half height of the capsule's cylindrical part.
    pub half_height: f32,
    /// Steepest walkable slope, radians.
    pub max_slope_angle: f32,
    /// Mass used for push and weight impulses.
    pub mass: f32,
    /// Maximum force the character's weight exerts on a dynamic floor.
    pub max_strength: f32,
    /// Contacts closer than this are reported.
    pub predictive_contact_distance: f32,
    /// Skin kept between the capsule and other shapes.
    pub padding: f32,
    /// Fraction of penetration resolved per update.
    pub penetration_recovery_speed: f32,
    /// World up.
    pub up: Vec3,
}

impl Default for CharacterSettings {
    fn default() -> Self {
        Self {
            radius: 0.5,
            half_height: 0.5,
            max_slope_angle: 50f32.to_radians(),
            mass: 70.0,
            max_strength: 100.0,
            predictive_contact_distance: 0.1,
            padding: 0.02,
            penetration_recovery_speed: 1.0,
            up: Vec3::Y,
        }
    }
}

/// Stair stepping and floor sticking parameters of one update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtendedUpdateSettings {
    /// Highest step the character walks up.
    pub step_height: f32,
    /// Minimum free width above a step.
    pub step_forward_test: f32,
    /// How far the character is pulled down to stay on the floor.
    pub stick_to_floor_distance: f32,
}

impl Default for ExtendedUpdateSettings {
    fn default() -> Self {
        Self {
            step_height: 0.4,
            step_forward_test: 0.15,
            stick_to_floor_distance: 0.5,
        }
    }
}

/// Support under the character after an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SupportState {
    /// Standing on walkable ground.
    OnGround,
    /// Standing on a slope steeper than the limit.
    OnSteepGround,
    /// Touching something that gives no support.
    NotSupported,
    /// Touching nothing.
    InAir,
}

impl SupportState {
    /// On walkable or steep ground.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::OnGround | Self::OnSteepGround)
    }
}

/// Cached description of the ground under the character.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroundInfo {
    /// Contact point on the ground.
    pub position: Vec3,
    /// Ground normal. Zero when not supported.
    pub normal: Vec3,
    /// Velocity of the ground at the contact point.
    pub velocity: Vec3,
    /// Ground body.
    pub body: Option<BodyHandle>,
}

/// A body the character touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactBody {
    /// Body handle.
    pub handle: BodyHandle,
    /// Entity that owns it.
    pub entity: Option<EntityId>,
    /// Motion type at contact time.
    pub motion: MotionType,
    /// Whether any enabled constraint references the body.
    pub constrained: bool,
}

/// One step of the contact negotiation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContactEvent {
    /// The body is within reach. No geometry yet.
    Validate {
        /// Touched body.
        body: ContactBody,
    },
    /// Contact geometry is known. Sent for new and continuing contacts.
    Added {
        /// Touched body.
        body: ContactBody,
        /// Contact point on the body.
        position: Vec3,
        /// Normal pointing from the body towards the character.
        normal: Vec3,
    },
    /// The character's velocity is about to be resolved against the contact.
    Solve {
        /// Touched body.
        body: ContactBody,
        /// Contact point on the body.
        position: Vec3,
        /// Normal pointing from the body towards the character.
        normal: Vec3,
        /// Velocity of the body at the contact point.
        contact_velocity: Vec3,
        /// Character velocity before resolution.
        character_velocity: Vec3,
    },
}

impl ContactEvent {
    /// The body this event is about.
    #[must_use]
    pub const fn body(&self) -> &ContactBody {
        match self {
            Self::Validate { body } | Self::Added { body, .. } | Self::Solve { body, .. } => body,
        }
    }
}

/// Listener verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ContactResponse {
    /// Proceed normally.
    #[default]
    Accept,
    /// Validate only: sweep through the body.
    Ignore,
    /// Solve only: apply this impulse to the body at the contact point.
    Push {
        /// World-space impulse.
        impulse: Vec3,
    },
}

/// Receives the contact negotiation of one update.
pub trait CharacterContactListener {
    /// Handles one event.
    fn on_contact(&mut self, event: &ContactEvent) -> ContactResponse;
}

impl<F> CharacterContactListener for F
where
    F: FnMut(&ContactEvent) -> ContactResponse,
{
    fn on_contact(&mut self, event: &ContactEvent) -> ContactResponse {
        self(event)
    }
}

struct Touch {
    body: ContactBody,
    position: Vec3,
    normal: Vec3,
    distance: f32,
    /// Ignored during validation: reported, never solved.
    ignored: bool,
}

/// The engine-side character.
pub struct CharacterVirtual {
    settings: CharacterSettings,
    shape: Shape,
    entity: EntityId,
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    inner_body: BodyHandle,
    support: SupportState,
    ground: GroundInfo,
}

impl CharacterVirtual {
    /// Creates the character and its inner body.
    ///
    /// # Errors
    ///
    /// Capsule dimensions that do not form a shape, or a full world.
    pub fn new(
        system: &mut PhysicsSystem,
        settings: CharacterSettings,
        position: Vec3,
        rotation: Quat,
        entity: EntityId,
    ) -> PhysicsResult<Self> {
        if settings.up.try_normalize().is_none() {
            return Err(PhysicsError::InvalidShape("character up vector is zero".into()));
        }
        let shape = Shape::from_desc(&ShapeDesc::capsule(settings.radius, settings.half_height))?;

        let mut desc = BodyDesc::new(shape.clone(), MotionType::Kinematic, ObjectLayer::Dynamic)
            .at(position, rotation)
            .owned_by(entity);
        desc.allow_sleep = false;
        let inner_body = system.create_body(&desc)?;

        Ok(Self {
            settings,
            shape,
            entity,
            position,
            rotation,
            velocity: Vec3::ZERO,
            inner_body,
            support: SupportState::InAir,
            ground: GroundInfo::default(),
        })
    }

    /// Removes the inner body.
    pub fn destroy(self, system: &mut PhysicsSystem) {
        system.remove_body(self.inner_body);
    }

    /// Runs one update. See the module docs for the phases.
    pub fn extended_update(
        &mut self,
        system: &mut PhysicsSystem,
        dt: f32,
        gravity: Vec3,
        ext: &ExtendedUpdateSettings,
        listener: &mut dyn CharacterContactListener,
    ) -> SupportState {
        if !(dt > 0.0 && dt.is_finite()) {
            return self.support;
        }
        system.refresh_queries();
        let up = self.settings.up.normalize_or_zero();
        let capsule: &SharedShape = self.shape.shared();
        let desired = self.velocity * dt;
        let start = to_isometry(self.position, self.rotation);

        // Validate.
        let reach = self.settings.predictive_contact_distance
            + self.settings.padding
            + desired.length()
            + ext.step_height.max(ext.stick_to_floor_distance);
        let mut ignored: HashSet<ColliderHandle> = HashSet::new();
        for (collider, body) in self.nearby(system, reach) {
            if listener.on_contact(&ContactEvent::Validate { body }) == ContactResponse::Ignore {
                ignored.insert(collider);
            }
        }

        // Sweep.
        let stick = self.support.is_supported() && self.velocity.dot(up) <= 0.0;
        let controller = KinematicCharacterController {
            up: Unit::new_normalize(to_vector(up)),
            offset: CharacterLength::Absolute(self.settings.padding),
            slide: true,
            autostep: Some(CharacterAutostep {
                max_height: CharacterLength::Absolute(ext.step_height),
                min_width: CharacterLength::Absolute(ext.step_forward_test),
                include_dynamic_bodies: false,
            }),
            max_slope_climb_angle: self.settings.max_slope_angle,
            min_slope_slide_angle: self.settings.max_slope_angle,
            snap_to_ground: stick.then_some(CharacterLength::Absolute(ext.stick_to_floor_distance)),
            ..KinematicCharacterController::default()
        };
        let skip = |handle: ColliderHandle, _: &Collider| !ignored.contains(&handle);
        let filter = QueryFilter::default()
            .exclude_sensors()
            .exclude_rigid_body(self.inner_body.0)
            .predicate(&skip);
        let movement = controller.move_shape(
            dt,
            &system.bodies,
            &system.colliders,
            &system.queries,
            &**capsule,
            &start,
            to_vector(desired),
            filter,
            |_: CharacterCollision| {},
        );
        self.position += from_vector(&movement.translation);

        // Contacts at the new pose.
        let touches = self.touching(system, &ignored);
        let mut velocity = self.velocity;
        let mut recovery = Vec3::ZERO;
        let mut best_ground: Option<&Touch> = None;
        let mut solved = 0_usize;
        for touch in &touches {
            listener.on_contact(&ContactEvent::Added {
                body: touch.body,
                position: touch.position,
                normal: touch.normal,
            });
            if touch.ignored {
                continue;
            }
            solved += 1;

            let contact_velocity = system
                .velocity_at_point(touch.body.handle, touch.position)
                .unwrap_or(Vec3::ZERO);
            let response = listener.on_contact(&ContactEvent::Solve {
                body: touch.body,
                position: touch.position,
                normal: touch.normal,
                contact_velocity,
                character_velocity: self.velocity,
            });
            if let ContactResponse::Push { impulse } = response {
                if system.add_impulse_at_point(touch.body.handle, impulse, touch.position) {
                    system.activate_body(touch.body.handle);
                }
            }

            let approach = (velocity - contact_velocity).dot(touch.normal);
            if approach < 0.0 {
                velocity -= touch.normal * approach;
            }
            if touch.distance < 0.0 {
                recovery += touch.normal * -touch.distance;
            }
            let below = (touch.position - self.position).dot(up) < 0.0;
            let cos = touch.normal.dot(up);
            if below && cos > MIN_SUPPORT_COS && best_ground.map_or(true, |g| cos > g.normal.dot(up)) {
                best_ground = Some(touch);
            }
        }
        self.position += recovery * self.settings.penetration_recovery_speed.clamp(0.0, 1.0);

        // Support.
        let max_slope_cos = self.settings.max_slope_angle.cos();
        let (support, ground) = match best_ground {
            Some(touch) => {
                let state = if touch.normal.dot(up) >= max_slope_cos {
                    SupportState::OnGround
                } else {
                    SupportState::OnSteepGround
                };
                let ground = GroundInfo {
                    position: touch.position,
                    normal: touch.normal,
                    velocity: system
                        .velocity_at_point(touch.body.handle, touch.position)
                        .unwrap_or(Vec3::ZERO),
                    body: Some(touch.body.handle),
                };
                (state, ground)
            }
            None if movement.grounded => self.probe_ground(system, up, max_slope_cos),
            None if solved > 0 => (SupportState::NotSupported, GroundInfo::default()),
            None => (SupportState::InAir, GroundInfo::default()),
        };
        self.support = support;
        self.ground = ground;
        self.velocity = velocity;

        if support.is_supported() {
            if let Some(floor) = ground.body {
                self.push_floor(system, floor, gravity, dt);
            }
        }

        system.move_kinematic(self.inner_body, self.position, self.rotation, dt);
        support
    }

    /// Bodies near the capsule, one entry per collider.
    fn nearby(&self, system: &PhysicsSystem, reach: f32) -> Vec<(ColliderHandle, ContactBody)> {
        let pose = to_isometry(self.position, self.rotation);
        let capsule = self.shape.shared();
        let aabb = capsule.compute_aabb(&pose).loosened(reach);

        let mut found = Vec::new();
        system
            .queries
            .colliders_with_aabb_intersecting_aabb(&aabb, |handle| {
                found.push(*handle);
                true
            });

        found
            .into_iter()
            .filter_map(|handle| {
                let collider = system.colliders.get(handle)?;
                if collider.is_sensor() {
                    return None;
                }
                let body = self.contact_body(system, collider)?;
                query::contact(collider.position(), collider.shape(), &pose, &**capsule, reach)
                    .ok()
                    .flatten()
                    .map(|_| (handle, body))
            })
            .collect()
    }

    /// Contacts between the capsule at its current pose and everything
    /// around it, flagged when validation ignored the collider.
    fn touching(&self, system: &PhysicsSystem, ignored: &HashSet<ColliderHandle>) -> Vec<Touch> {
        let reach = self.settings.padding + self.settings.predictive_contact_distance;
        self.nearby(system, reach)
            .into_iter()
            .filter_map(|(handle, body)| {
                let collider = system.colliders.get(handle)?;
                let pose = to_isometry(self.position, self.rotation);
                let contact = query::contact(
                    collider.position(),
                    collider.shape(),
                    &pose,
                    &**self.shape.shared(),
                    reach,
                )
                .ok()
                .flatten()?;
                Some(Touch {
                    body,
                    position: from_point(&contact.point1),
                    normal: from_vector(&contact.normal1),
                    distance: contact.dist,
                    ignored: ignored.contains(&handle),
                })
            })
            .collect()
    }

    fn contact_body(&self, system: &PhysicsSystem, collider: &Collider) -> Option<ContactBody> {
        let handle = BodyHandle(collider.parent()?);
        if handle == self.inner_body {
            return None;
        }
        Some(ContactBody {
            handle,
            entity: system.entity_for_body(handle),
            motion: system.motion_type(handle)?,
            constrained: system.body_has_constraint(handle),
        })
    }

    fn probe_ground(&self, system: &mut PhysicsSystem, up: Vec3, max_slope_cos: f32) -> (SupportState, GroundInfo) {
        let length = self.settings.half_height
            + self.settings.radius
            + self.settings.padding
            + self.settings.predictive_contact_distance;
        let Some(hit) = system.raycast_ignore(self.position, -up, length, self.inner_body) else {
            return (SupportState::NotSupported, GroundInfo::default());
        };
        let state = if hit.normal.dot(up) >= max_slope_cos {
            SupportState::OnGround
        } else {
            SupportState::OnSteepGround
        };
        let velocity = hit
            .body
            .and_then(|b| system.velocity_at_point(b, hit.position))
            .unwrap_or(Vec3::ZERO);
        (
            state,
            GroundInfo {
                position: hit.position,
                normal: hit.normal,
                velocity,
                body: hit.body,
            },
        )
    }

    /// Applies the character's weight to a dynamic floor.
    fn push_floor(&self, system: &mut PhysicsSystem, floor: BodyHandle, gravity: Vec3, dt: f32) {
        if system.motion_type(floor) != Some(MotionType::Dynamic) {
            return;
        }
        let weight = gravity * self.settings.mass;
        let force = weight.clamp_length_max(self.settings.max_strength);
        system.add_impulse_at_point(floor, force * dt, self.ground.position);
    }

    /// Teleports the character and its inner body.
    pub fn set_position(&mut self, system: &mut PhysicsSystem, position: Vec3) {
        self.position = position;
        system.set_body_position(self.inner_body, position);
    }

    /// Sets the orientation of the character and its inner body.
    pub fn set_rotation(&mut self, system: &mut PhysicsSystem, rotation: Quat) {
        self.rotation = rotation;
        system.set_body_rotation(self.inner_body, rotation);
    }

    /// Capsule center.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Orientation.
    #[must_use]
    pub const fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Current velocity.
    #[must_use]
    pub const fn linear_velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Sets the velocity used by the next update.
    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Support after the last update. `InAir` before the first one.
    #[must_use]
    pub const fn support_state(&self) -> SupportState {
        self.support
    }

    /// Ground under the character after the last update.
    #[must_use]
    pub const fn ground(&self) -> &GroundInfo {
        &self.ground
    }

    /// Inner kinematic body.
    #[must_use]
    pub const fn inner_body(&self) -> BodyHandle {
        self.inner_body
    }

    /// Entity the character belongs to.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Settings.
    #[must_use]
    pub const fn settings(&self) -> &CharacterSettings {
        &self.settings
    }
}

impl std::fmt::Debug for CharacterVirtual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterVirtual")
            .field("entity", &self.entity)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("support", &self.support)
            .finish_non_exhaustive()
    }
}
