//! # Character Controller Component
//!
//! A capsule-shaped virtual character attached to an entity. The
//! component keeps the velocity the game wants, runs the engine-side
//! extended update once per tick and caches what came out of it: the
//! ground state and the ground position, normal and velocity.
//!
//! ## Contact arbitration
//!
//! The engine reports contacts as a stream of events. This component
//! answers them as follows:
//!
//! | Event    | Body                         | Answer                                  |
//! |----------|------------------------------|-----------------------------------------|
//! | Validate | dynamic and constrained      | user callback (zero position), ignore   |
//! | Validate | anything else                | accept                                  |
//! | Added    | anything                     | user callback (true position/normal)    |
//! | Solve    | not dynamic, or constrained  | accept                                  |
//! | Solve    | dynamic, moving into it      | push with `-n * v_into * mass`          |
//!
//! User callbacks are collected during the update and run after the world
//! lock is released, in the order the engine produced them. A callback can
//! therefore drive a constraint motor through a [`WorldLink`] directly.

use std::fmt;

use glam::{Quat, Vec3};
use ligament_core::{ComponentKind, EntityId};
use ligament_physics::{
    BodyHandle, CharacterContactListener, CharacterVirtual, ContactBody, ContactEvent, ContactResponse,
    MotionType, PhysicsWorld, SupportState, WorldLink,
};

use crate::config::CharacterControllerConfig;
use crate::ecs::{ComponentData, Entity};

/// Ground classification after an update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GroundState {
    /// Standing on walkable ground.
    OnGround,
    /// Touching ground too steep to stand on; the character slides.
    OnSteepGround,
    /// Touching something that does not hold the character up.
    NotSupported,
    /// Touching nothing.
    #[default]
    InAir,
}

impl From<SupportState> for GroundState {
    fn from(state: SupportState) -> Self {
        match state {
            SupportState::OnGround => Self::OnGround,
            SupportState::OnSteepGround => Self::OnSteepGround,
            SupportState::NotSupported => Self::NotSupported,
            SupportState::InAir => Self::InAir,
        }
    }
}

/// When a contact callback fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactStage {
    /// Before the sweep, for a constrained dynamic body the character will
    /// pass through. Position and normal are zero.
    Validate,
    /// After the sweep, with real contact geometry.
    Added,
}

/// Contact reported to the user callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterContact {
    /// Entity carrying the controller.
    pub character: EntityId,
    /// Entity owning the touched body.
    pub hit: Option<EntityId>,
    /// Touched body.
    pub body: BodyHandle,
    /// When the callback fired.
    pub stage: ContactStage,
    /// World-space contact point.
    pub position: Vec3,
    /// Normal pointing from the body towards the character.
    pub normal: Vec3,
}

/// User contact callback.
pub type CharacterContactCallback = Box<dyn FnMut(&CharacterContact) + Send>;

/// Answers the engine's contact events for one update.
struct ContactArbiter {
    character: EntityId,
    mass: f32,
    record: bool,
    contacts: Vec<CharacterContact>,
}

impl ContactArbiter {
    fn new(character: EntityId, mass: f32, record: bool) -> Self {
        Self {
            character,
            mass,
            record,
            contacts: Vec::new(),
        }
    }

    fn report(&mut self, body: &ContactBody, stage: ContactStage, position: Vec3, normal: Vec3) {
        if self.record {
            self.contacts.push(CharacterContact {
                character: self.character,
                hit: body.entity,
                body: body.handle,
                stage,
                position,
                normal,
            });
        }
    }
}

/// Impulse that pushes a body the character walks into.
///
/// `normal` points from the body towards the character. Returns `None`
/// when the character is not moving into the body.
#[must_use]
pub fn push_impulse(character_velocity: Vec3, normal: Vec3, mass: f32) -> Option<Vec3> {
    let into = -character_velocity.dot(normal);
    if into <= 0.0 {
        return None;
    }
    Some(-normal * into * mass)
}

impl CharacterContactListener for ContactArbiter {
    fn on_contact(&mut self, event: &ContactEvent) -> ContactResponse {
        match *event {
            ContactEvent::Validate { body } => {
                if body.motion == MotionType::Dynamic && body.constrained {
                    self.report(&body, ContactStage::Validate, Vec3::ZERO, Vec3::ZERO);
                    return ContactResponse::Ignore;
                }
                ContactResponse::Accept
            }
            ContactEvent::Added {
                body,
                position,
                normal,
            } => {
                self.report(&body, ContactStage::Added, position, normal);
                ContactResponse::Accept
            }
            ContactEvent::Solve {
                body,
                normal,
                character_velocity,
                ..
            } => {
                if body.motion != MotionType::Dynamic || body.constrained {
                    return ContactResponse::Accept;
                }
                push_impulse(character_velocity, normal, self.mass)
                    .map_or(ContactResponse::Accept, |impulse| ContactResponse::Push { impulse })
            }
        }
    }
}

/// Component driving one virtual character.
pub struct CharacterController {
    // `None` once destroyed.
    character: Option<CharacterVirtual>,
    link: WorldLink,
    entity: EntityId,
    config: CharacterControllerConfig,
    velocity: Vec3,
    ground_state: GroundState,
    ground_position: Vec3,
    ground_normal: Vec3,
    ground_velocity: Vec3,
    callback: Option<CharacterContactCallback>,
    enabled: bool,
}

/// Creates a character at the entity's current pose and attaches it.
///
/// # Returns
///
/// `None` if the entity already has a controller or the character could
/// not be created.
pub fn attach_character_controller<'e>(
    entity: &'e mut Entity,
    world: &PhysicsWorld,
    config: &CharacterControllerConfig,
) -> Option<&'e mut CharacterController> {
    if entity.has_component(ComponentKind::Character) {
        tracing::debug!(entity = entity.id().raw(), "entity already has a character controller");
        return None;
    }

    let character = CharacterVirtual::new(
        &mut world.lock(),
        config.character_settings(),
        entity.position(),
        entity.rotation(),
        entity.id(),
    )
    .map_err(|error| tracing::warn!(entity = entity.id().raw(), %error, "character creation failed"))
    .ok()?;

    let controller = CharacterController {
        character: Some(character),
        link: world.link(),
        entity: entity.id(),
        config: *config,
        velocity: Vec3::ZERO,
        ground_state: GroundState::InAir,
        ground_position: Vec3::ZERO,
        ground_normal: Vec3::ZERO,
        ground_velocity: Vec3::ZERO,
        callback: None,
        enabled: true,
    };
    entity.add_component(ComponentData::Character(controller));
    entity.character_mut()
}

/// Destroys the entity's character controller.
///
/// # Returns
///
/// `false` if the entity had none.
pub fn remove_character_controller(entity: &mut Entity) -> bool {
    entity.remove_component(ComponentKind::Character)
}

impl CharacterController {
    /// Runs one extended update with the current velocity.
    ///
    /// Does nothing while disabled or once the world is gone.
    pub fn update(&mut self, dt: f32, gravity: Vec3) {
        if !self.enabled {
            return;
        }
        let ext = self.config.extended_update_settings();
        let velocity = self.velocity;
        let Some(character) = self.character.as_mut() else {
            return;
        };
        let mut arbiter = ContactArbiter::new(self.entity, self.config.mass, self.callback.is_some());

        let Some(support) = self.link.with(|system| {
            character.set_linear_velocity(velocity);
            character.extended_update(system, dt, gravity, &ext, &mut arbiter)
        }) else {
            return;
        };

        self.velocity = character.linear_velocity();
        self.ground_state = support.into();
        let ground = character.ground();
        self.ground_position = ground.position;
        self.ground_normal = ground.normal;
        self.ground_velocity = ground.velocity;

        if let Some(callback) = self.callback.as_mut() {
            for contact in &arbiter.contacts {
                callback(contact);
            }
        }
    }

    /// Entity carrying the controller.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Settings the controller was created with.
    #[must_use]
    pub const fn config(&self) -> &CharacterControllerConfig {
        &self.config
    }

    /// Link to the world the character lives in.
    #[must_use]
    pub const fn world(&self) -> &WorldLink {
        &self.link
    }

    /// Inner kinematic body that shoves rigid bodies during the step.
    #[must_use]
    pub fn inner_body(&self) -> Option<BodyHandle> {
        self.character.as_ref().map(CharacterVirtual::inner_body)
    }

    // =========================================================================
    // Velocity
    // =========================================================================

    /// Velocity used by the next update.
    #[must_use]
    pub const fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Sets the velocity used by the next update.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Adds to the velocity used by the next update.
    pub fn add_velocity(&mut self, delta: Vec3) {
        self.velocity += delta;
    }

    // =========================================================================
    // Ground
    // =========================================================================

    /// Ground state after the last update. `InAir` before the first one.
    #[must_use]
    pub const fn ground_state(&self) -> GroundState {
        self.ground_state
    }

    /// Standing on ground, walkable or steep.
    #[must_use]
    pub const fn is_grounded(&self) -> bool {
        matches!(self.ground_state, GroundState::OnGround | GroundState::OnSteepGround)
    }

    /// Standing on ground too steep to walk.
    #[must_use]
    pub const fn is_on_steep_slope(&self) -> bool {
        matches!(self.ground_state, GroundState::OnSteepGround)
    }

    /// Ground contact point.
    #[must_use]
    pub const fn ground_position(&self) -> Vec3 {
        self.ground_position
    }

    /// Ground normal.
    #[must_use]
    pub const fn ground_normal(&self) -> Vec3 {
        self.ground_normal
    }

    /// Velocity of the ground under the character, for moving platforms.
    #[must_use]
    pub const fn ground_velocity(&self) -> Vec3 {
        self.ground_velocity
    }

    // =========================================================================
    // Pose
    // =========================================================================

    /// Capsule center.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.character
            .as_ref()
            .map_or(Vec3::ZERO, CharacterVirtual::position)
    }

    /// Orientation.
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.character
            .as_ref()
            .map_or(Quat::IDENTITY, CharacterVirtual::rotation)
    }

    /// Teleports the character.
    pub fn set_position(&mut self, position: Vec3) -> bool {
        let Some(character) = self.character.as_mut() else {
            return false;
        };
        self.link
            .with(|system| character.set_position(system, position))
            .is_some()
    }

    /// Turns the character.
    pub fn set_rotation(&mut self, rotation: Quat) -> bool {
        let Some(character) = self.character.as_mut() else {
            return false;
        };
        self.link
            .with(|system| character.set_rotation(system, rotation))
            .is_some()
    }

    // =========================================================================
    // Callbacks & flags
    // =========================================================================

    /// Installs the contact callback, replacing any previous one.
    pub fn set_contact_callback(&mut self, callback: impl FnMut(&CharacterContact) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Removes the contact callback.
    pub fn clear_contact_callback(&mut self) {
        self.callback = None;
    }

    /// Disabled controllers skip their update.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the controller.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Drop for CharacterController {
    fn drop(&mut self) {
        let Some(character) = self.character.take() else {
            return;
        };
        let removed = self.link.with(|system| character.destroy(system)).is_some();
        tracing::debug!(entity = self.entity.raw(), removed, "character controller destroyed");
    }
}

impl fmt::Debug for CharacterController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacterController")
            .field("entity", &self.entity)
            .field("velocity", &self.velocity)
            .field("ground_state", &self.ground_state)
            .field("enabled", &self.enabled)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(motion: MotionType, constrained: bool) -> ContactBody {
        let world = PhysicsWorld::new(&ligament_physics::PhysicsConfig {
            worker_threads: 1,
            ..ligament_physics::PhysicsConfig::default()
        })
        .unwrap();
        let shape = ligament_physics::Shape::from_desc(&ligament_physics::ShapeDesc::sphere(0.5)).unwrap();
        let handle = world
            .lock()
            .create_body(&ligament_physics::BodyDesc::new(
                shape,
                motion,
                ligament_physics::ObjectLayer::Dynamic,
            ))
            .unwrap();
        ContactBody {
            handle,
            entity: Some(EntityId::from_raw(9)),
            motion,
            constrained,
        }
    }

    #[test]
    fn test_ground_state_mapping() {
        assert_eq!(GroundState::from(SupportState::OnGround), GroundState::OnGround);
        assert_eq!(GroundState::from(SupportState::OnSteepGround), GroundState::OnSteepGround);
        assert_eq!(GroundState::from(SupportState::NotSupported), GroundState::NotSupported);
        assert_eq!(GroundState::from(SupportState::InAir), GroundState::InAir);
        assert_eq!(GroundState::default(), GroundState::InAir);
    }

    #[test]
    fn test_validate_ignores_constrained_dynamic_bodies() {
        let mut arbiter = ContactArbiter::new(EntityId::FIRST, 70.0, true);

        let door = body(MotionType::Dynamic, true);
        let verdict = arbiter.on_contact(&ContactEvent::Validate { body: door });
        assert_eq!(verdict, ContactResponse::Ignore);
        assert_eq!(arbiter.contacts.len(), 1);
        assert_eq!(arbiter.contacts[0].stage, ContactStage::Validate);
        assert_eq!(arbiter.contacts[0].position, Vec3::ZERO);
        assert_eq!(arbiter.contacts[0].hit, Some(EntityId::from_raw(9)));

        for other in [body(MotionType::Dynamic, false), body(MotionType::Static, true)] {
            let verdict = arbiter.on_contact(&ContactEvent::Validate { body: other });
            assert_eq!(verdict, ContactResponse::Accept);
        }
        assert_eq!(arbiter.contacts.len(), 1);
    }

    #[test]
    fn test_added_reports_geometry() {
        let mut arbiter = ContactArbiter::new(EntityId::FIRST, 70.0, true);
        let event = ContactEvent::Added {
            body: body(MotionType::Static, false),
            position: Vec3::new(0.0, 0.5, 0.0),
            normal: Vec3::Y,
        };

        assert_eq!(arbiter.on_contact(&event), ContactResponse::Accept);
        let contact = arbiter.contacts[0];
        assert_eq!(contact.stage, ContactStage::Added);
        assert_eq!(contact.position, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(contact.normal, Vec3::Y);
        assert_eq!(contact.character, EntityId::FIRST);
    }

    #[test]
    fn test_nothing_recorded_without_callback() {
        let mut arbiter = ContactArbiter::new(EntityId::FIRST, 70.0, false);
        arbiter.on_contact(&ContactEvent::Validate {
            body: body(MotionType::Dynamic, true),
        });
        assert!(arbiter.contacts.is_empty());
    }

    #[test]
    fn test_solve_pushes_free_dynamic_bodies() {
        let mut arbiter = ContactArbiter::new(EntityId::FIRST, 70.0, false);
        let solve = |body| ContactEvent::Solve {
            body,
            position: Vec3::new(1.0, 1.0, 0.0),
            normal: Vec3::NEG_X,
            contact_velocity: Vec3::ZERO,
            character_velocity: Vec3::new(2.0, 0.0, 0.0),
        };

        let verdict = arbiter.on_contact(&solve(body(MotionType::Dynamic, false)));
        assert_eq!(
            verdict,
            ContactResponse::Push {
                impulse: Vec3::new(140.0, 0.0, 0.0)
            }
        );
        assert_eq!(
            arbiter.on_contact(&solve(body(MotionType::Dynamic, true))),
            ContactResponse::Accept
        );
        assert_eq!(
            arbiter.on_contact(&solve(body(MotionType::Kinematic, false))),
            ContactResponse::Accept
        );
    }

    #[test]
    fn test_push_impulse_direction_and_scaling() {
        let normal = Vec3::NEG_X;
        let slow = push_impulse(Vec3::new(1.0, 0.0, 0.0), normal, 70.0).unwrap();
        let fast = push_impulse(Vec3::new(3.0, 0.0, 0.0), normal, 70.0).unwrap();
        let heavy = push_impulse(Vec3::new(1.0, 0.0, 0.0), normal, 140.0).unwrap();

        assert!(slow.x > 0.0);
        assert!(fast.length() > slow.length());
        assert!(heavy.length() > slow.length());
        assert_eq!(push_impulse(Vec3::new(-1.0, 0.0, 0.0), normal, 70.0), None);
        assert_eq!(push_impulse(Vec3::new(0.0, 1.0, 0.0), normal, 70.0), None);
    }
}
