//! # Entity Manager
//!
//! Owns every entity. Entities live in one growable array; destruction
//! swaps the last entity into the freed position, so array order is not
//! stable across destructions. Lookups are linear scans.

use ligament_core::{ComponentMask, EntityId};

use super::entity::Entity;

/// Capacity reserved by a fresh manager.
pub const INITIAL_CAPACITY: usize = 64;

/// Owner of all entities.
#[derive(Debug)]
pub struct EntityManager {
    entities: Vec<Entity>,
    // `None` once every id has been handed out.
    next_id: Option<EntityId>,
}

impl EntityManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Vec::with_capacity(INITIAL_CAPACITY),
            next_id: Some(EntityId::FIRST),
        }
    }

    /// Creates an entity with the identity transform and no components.
    ///
    /// Ids are never reused. Once they run out the entity gets
    /// [`EntityId::NULL`], which no lookup resolves.
    pub fn create_entity(&mut self, name: Option<&str>) -> &mut Entity {
        let id = match self.next_id {
            Some(id) => {
                self.next_id = id.next();
                id
            }
            None => {
                tracing::error!(name = name.unwrap_or(""), "entity ids exhausted");
                EntityId::NULL
            }
        };
        let index = self.entities.len();
        self.entities.push(Entity::new(id, name));
        tracing::debug!(entity = id.raw(), name = name.unwrap_or(""), "entity created");
        &mut self.entities[index]
    }

    /// Destroys an entity and every component it carries.
    ///
    /// # Returns
    ///
    /// `false` if no entity has that id.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let mut entity = self.entities.swap_remove(index);
        entity.clear_components();
        tracing::debug!(entity = id.raw(), "entity destroyed");
        true
    }

    /// Destroys every entity, last first.
    pub fn clear(&mut self) {
        while let Some(mut entity) = self.entities.pop() {
            entity.clear_components();
        }
    }

    /// First entity with `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name() == name)
    }

    /// First entity with `name`, mutably.
    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.name() == name)
    }

    /// Entity with `id`.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Entity with `id`, mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        if id.is_null() {
            return None;
        }
        self.entities.iter().position(|e| e.id() == id)
    }

    /// Runs `f` on every active entity.
    pub fn for_each(&mut self, mut f: impl FnMut(&mut Entity)) {
        for entity in self.entities.iter_mut().filter(|e| e.is_active()) {
            f(entity);
        }
    }

    /// Runs `f` on every active entity carrying all kinds in `required`.
    pub fn for_each_with(&mut self, required: ComponentMask, mut f: impl FnMut(&mut Entity)) {
        for entity in self.entities.iter_mut().filter(|e| {
            e.is_active() && e.component_mask().is_superset_of(required)
        }) {
            f(entity);
        }
    }

    /// Every entity, active or not, in array order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Every entity, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    /// Number of entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Checks if there are no entities.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Current capacity of the entity array.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Id the next created entity will get.
    #[inline]
    #[must_use]
    pub const fn next_id(&self) -> EntityId {
        match self.next_id {
            Some(id) => id,
            None => EntityId::NULL,
        }
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EntityManager {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentData;
    use ligament_core::ComponentKind;

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut manager = EntityManager::new();
        let a = manager.create_entity(Some("a")).id();
        let b = manager.create_entity(Some("b")).id();
        assert_eq!(a, EntityId::FIRST);
        assert!(b > a);

        assert!(manager.destroy_entity(b));
        let c = manager.create_entity(None).id();
        assert!(c > b);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_exhausted_ids_are_null() {
        let mut manager = EntityManager::new();
        manager.next_id = Some(EntityId::from_raw(u32::MAX));

        let last = manager.create_entity(Some("last")).id();
        assert_eq!(last, EntityId::from_raw(u32::MAX));
        let overflow = manager.create_entity(Some("overflow")).id();
        assert!(overflow.is_null());

        assert!(manager.get(last).is_some());
        assert!(manager.get(EntityId::FIRST).is_none());
        assert!(!manager.destroy_entity(overflow));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_destroy_swaps_last_into_place() {
        let mut manager = EntityManager::new();
        let ids: Vec<_> = (0..4).map(|_| manager.create_entity(None).id()).collect();

        assert!(manager.destroy_entity(ids[0]));
        let order: Vec<_> = manager.iter().map(Entity::id).collect();
        assert_eq!(order, vec![ids[3], ids[1], ids[2]]);

        assert!(!manager.destroy_entity(ids[0]));
        assert!(!manager.destroy_entity(EntityId::NULL));
    }

    #[test]
    fn test_find_by_name_returns_first_match() {
        let mut manager = EntityManager::new();
        let first = manager.create_entity(Some("twin")).id();
        manager.create_entity(Some("twin"));

        assert_eq!(manager.find_by_name("twin").map(Entity::id), Some(first));
        assert!(manager.find_by_name("missing").is_none());
    }

    #[test]
    fn test_iteration_skips_inactive() {
        let mut manager = EntityManager::new();
        manager
            .create_entity(Some("tagged"))
            .add_component(ComponentData::Animator(Box::new(())));
        manager
            .create_entity(Some("sleeping"))
            .add_component(ComponentData::Animator(Box::new(())));
        manager.create_entity(Some("plain"));
        if let Some(entity) = manager.find_by_name_mut("sleeping") {
            entity.set_active(false);
        }

        let mut all = 0;
        manager.for_each(|_| all += 1);
        assert_eq!(all, 2);

        let mut tagged = Vec::new();
        manager.for_each_with(ComponentMask::of(ComponentKind::Animator), |e| {
            tagged.push(e.name().to_owned());
        });
        assert_eq!(tagged, vec!["tagged".to_owned()]);
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut manager = EntityManager::new();
        assert!(manager.capacity() >= INITIAL_CAPACITY);
        for _ in 0..(INITIAL_CAPACITY * 2 + 1) {
            manager.create_entity(None);
        }
        assert_eq!(manager.len(), INITIAL_CAPACITY * 2 + 1);
        assert_eq!(manager.next_id().raw(), (INITIAL_CAPACITY * 2 + 2) as u32);
    }
}
