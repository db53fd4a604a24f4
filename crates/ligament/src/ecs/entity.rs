//! # Entity
//!
//! A game object: id, name, transform, one slot per component kind and a
//! non-owning link to a visual node.
//!
//! The component mask is only ever changed next to the slot it describes,
//! so `mask.contains(kind) == slots[kind].is_some()` holds at all times.

use std::any::Any;

use glam::{Mat4, Quat, Vec3};
use ligament_core::{ComponentKind, ComponentMask, EntityId, NodeHandle, Transform};

use super::component::{Component, ComponentData};
use crate::character::CharacterController;
use crate::rigid_body::RigidBody;

/// Longest name an entity keeps, in bytes.
pub const MAX_NAME_LEN: usize = 63;

/// A game object.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    name: String,
    active: bool,
    transform: Transform,
    components: [Option<Component>; ComponentKind::COUNT],
    mask: ComponentMask,
    node: Option<NodeHandle>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, name: Option<&str>) -> Self {
        Self {
            id,
            name: name.map(truncate_name).unwrap_or_default(),
            active: true,
            transform: Transform::IDENTITY,
            components: Default::default(),
            mask: ComponentMask::EMPTY,
            node: None,
        }
    }

    /// Unique id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Display name, possibly empty.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the entity. Names longer than [`MAX_NAME_LEN`] bytes are cut.
    pub fn set_name(&mut self, name: &str) {
        self.name = truncate_name(name);
    }

    /// Inactive entities are skipped by every iteration and sync pass.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Activates or deactivates the entity.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    // =========================================================================
    // Transform
    // =========================================================================

    /// Full transform.
    #[inline]
    #[must_use]
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Full transform, mutably.
    #[inline]
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// World position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// World rotation.
    #[inline]
    #[must_use]
    pub const fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    /// Per-axis scale.
    #[inline]
    #[must_use]
    pub const fn scale(&self) -> Vec3 {
        self.transform.scale
    }

    /// Sets the position.
    #[inline]
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    /// Sets the rotation.
    #[inline]
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
    }

    /// Sets the rotation from XYZ euler angles in radians.
    pub fn set_rotation_euler(&mut self, euler: Vec3) {
        self.transform.set_rotation_euler(euler);
    }

    /// Sets the per-axis scale.
    #[inline]
    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
    }

    /// Sets the same scale on every axis.
    #[inline]
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.transform.scale = Vec3::splat(scale);
    }

    /// Moves the entity by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        self.transform.translate(offset);
    }

    /// Rotates by `angle` radians about `axis`.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.transform.rotate(angle, axis);
    }

    /// Matrix handed to the visual node.
    #[must_use]
    pub fn transform_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    // =========================================================================
    // Visual node
    // =========================================================================

    /// Linked visual node.
    #[inline]
    #[must_use]
    pub const fn node(&self) -> Option<NodeHandle> {
        self.node
    }

    /// Links or unlinks a visual node. The entity never owns it.
    pub fn set_node(&mut self, node: Option<NodeHandle>) {
        self.node = node;
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Which kinds are present.
    #[inline]
    #[must_use]
    pub const fn component_mask(&self) -> ComponentMask {
        self.mask
    }

    /// Checks if a component of `kind` is present.
    #[inline]
    #[must_use]
    pub const fn has_component(&self, kind: ComponentKind) -> bool {
        self.mask.contains(kind)
    }

    /// Attaches a payload to the slot of its kind.
    ///
    /// An existing component of the same kind is destroyed first, running
    /// its destructor.
    pub fn add_component(&mut self, data: ComponentData) -> &mut Component {
        let kind = data.kind();
        let slot = &mut self.components[kind.index()];
        if slot.take().is_some() {
            tracing::debug!(entity = self.id.raw(), %kind, "component replaced");
        }
        self.mask.insert(kind);
        slot.insert(Component::new(data))
    }

    /// Payload of `kind`.
    #[must_use]
    pub fn component(&self, kind: ComponentKind) -> Option<&ComponentData> {
        self.components[kind.index()].as_ref().and_then(Component::data)
    }

    /// Payload of `kind`, mutably.
    pub fn component_mut(&mut self, kind: ComponentKind) -> Option<&mut ComponentData> {
        self.components[kind.index()]
            .as_mut()
            .and_then(Component::data_mut)
    }

    /// Destroys the component of `kind`.
    ///
    /// # Returns
    ///
    /// `false` if there was none.
    pub fn remove_component(&mut self, kind: ComponentKind) -> bool {
        self.mask.remove(kind);
        self.components[kind.index()].take().is_some()
    }

    /// Installs a custom destructor on the component of `kind`.
    ///
    /// # Returns
    ///
    /// `false` if there is no such component.
    pub fn set_component_destructor(
        &mut self,
        kind: ComponentKind,
        destructor: impl FnOnce(ComponentData) + Send + 'static,
    ) -> bool {
        match self.components[kind.index()].as_mut() {
            Some(component) => {
                component.set_destructor(destructor);
                true
            }
            None => false,
        }
    }

    /// Destroys every component in slot order.
    pub(crate) fn clear_components(&mut self) {
        for slot in &mut self.components {
            drop(slot.take());
        }
        self.mask = ComponentMask::EMPTY;
    }

    // =========================================================================
    // Typed access
    // =========================================================================

    /// Rigid body component.
    #[must_use]
    pub fn rigid_body(&self) -> Option<&RigidBody> {
        match self.component(ComponentKind::RigidBody)? {
            ComponentData::RigidBody(body) => Some(body),
            _ => None,
        }
    }

    /// Rigid body component, mutably.
    pub fn rigid_body_mut(&mut self) -> Option<&mut RigidBody> {
        match self.component_mut(ComponentKind::RigidBody)? {
            ComponentData::RigidBody(body) => Some(body),
            _ => None,
        }
    }

    /// Character controller component.
    #[must_use]
    pub fn character(&self) -> Option<&CharacterController> {
        match self.component(ComponentKind::Character)? {
            ComponentData::Character(character) => Some(character),
            _ => None,
        }
    }

    /// Character controller component, mutably.
    pub fn character_mut(&mut self) -> Option<&mut CharacterController> {
        match self.component_mut(ComponentKind::Character)? {
            ComponentData::Character(character) => Some(character),
            _ => None,
        }
    }

    /// Node referenced by the mesh-link component.
    #[must_use]
    pub fn mesh_link(&self) -> Option<NodeHandle> {
        match self.component(ComponentKind::MeshLink)? {
            ComponentData::MeshLink(node) => Some(*node),
            _ => None,
        }
    }

    /// Animator payload, if present and of type `T`.
    #[must_use]
    pub fn animator<T: Any>(&self) -> Option<&T> {
        match self.component(ComponentKind::Animator)? {
            ComponentData::Animator(payload) => payload.downcast_ref(),
            _ => None,
        }
    }

    /// Animator payload, mutably.
    pub fn animator_mut<T: Any>(&mut self) -> Option<&mut T> {
        match self.component_mut(ComponentKind::Animator)? {
            ComponentData::Animator(payload) => payload.downcast_mut(),
            _ => None,
        }
    }

    /// Audio-source payload, if present and of type `T`.
    #[must_use]
    pub fn audio_source<T: Any>(&self) -> Option<&T> {
        match self.component(ComponentKind::AudioSource)? {
            ComponentData::AudioSource(payload) => payload.downcast_ref(),
            _ => None,
        }
    }

    /// Audio-source payload, mutably.
    pub fn audio_source_mut<T: Any>(&mut self) -> Option<&mut T> {
        match self.component_mut(ComponentKind::AudioSource)? {
            ComponentData::AudioSource(payload) => payload.downcast_mut(),
            _ => None,
        }
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        self.clear_components();
    }
}

fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_owned();
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted(counter: &Arc<AtomicUsize>) -> impl FnOnce(ComponentData) + Send + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fresh_entity() {
        let entity = Entity::new(EntityId::FIRST, Some("crate"));
        assert_eq!(entity.name(), "crate");
        assert!(entity.is_active());
        assert_eq!(*entity.transform(), Transform::IDENTITY);
        assert!(entity.component_mask().is_empty());
        assert_eq!(entity.node(), None);
    }

    #[test]
    fn test_name_truncated_on_char_boundary() {
        let long = "é".repeat(40);
        let entity = Entity::new(EntityId::FIRST, Some(&long));
        assert!(entity.name().len() <= MAX_NAME_LEN);
        assert_eq!(entity.name().len(), 62);

        let unnamed = Entity::new(EntityId::FIRST, None);
        assert_eq!(unnamed.name(), "");
    }

    #[test]
    fn test_add_then_get() {
        let mut entity = Entity::new(EntityId::FIRST, None);
        entity.add_component(ComponentData::Animator(Box::new(7_i32)));

        assert!(entity.has_component(ComponentKind::Animator));
        assert_eq!(entity.animator::<i32>(), Some(&7));
        assert_eq!(entity.animator::<u8>(), None);
        assert!(entity.component(ComponentKind::AudioSource).is_none());
    }

    #[test]
    fn test_replace_runs_old_destructor_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut entity = Entity::new(EntityId::FIRST, None);

        entity
            .add_component(ComponentData::AudioSource(Box::new(1_u32)))
            .set_destructor(counted(&calls));
        entity.add_component(ComponentData::AudioSource(Box::new(2_u32)));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(entity.audio_source::<u32>(), Some(&2));
        assert_eq!(entity.component_mask().count(), 1);
    }

    #[test]
    fn test_remove_clears_slot_and_mask() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut entity = Entity::new(EntityId::FIRST, None);
        entity.add_component(ComponentData::Animator(Box::new(())));
        assert!(entity.set_component_destructor(ComponentKind::Animator, counted(&calls)));

        assert!(entity.remove_component(ComponentKind::Animator));
        assert!(!entity.has_component(ComponentKind::Animator));
        assert!(!entity.remove_component(ComponentKind::Animator));
        assert!(!entity.set_component_destructor(ComponentKind::Animator, |_| {}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transform_helpers() {
        let mut entity = Entity::new(EntityId::FIRST, None);
        entity.set_position(Vec3::new(1.0, 0.0, 0.0));
        entity.translate(Vec3::new(0.0, 2.0, 0.0));
        entity.set_uniform_scale(2.0);

        assert_eq!(entity.position(), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(entity.scale(), Vec3::splat(2.0));
        let origin = entity.transform_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }
}
