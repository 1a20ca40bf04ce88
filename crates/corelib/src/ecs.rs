//! Flat entity registry: entity id -> component, one map per component type.

use std::collections::BTreeMap;

use crate::Mat4;
use crate::transform::Transform;

/// Entity id. Ids are plain integers chosen by the caller or handed out by
/// [`World::spawn`]; nothing ties the id to any particular component.
pub type Entity = u32;

/// Ordered map from entity id to one component type.
#[derive(Clone, Debug)]
pub struct ComponentMap<T> {
    items: BTreeMap<Entity, T>,
}

impl<T> ComponentMap<T> {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }

    /// Insert or overwrite; returns the previous component for `entity`.
    pub fn insert(&mut self, entity: Entity, component: T) -> Option<T> {
        self.items.insert(entity, component)
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        self.items.remove(&entity)
    }

    #[inline]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.items.get(&entity)
    }

    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.items.get_mut(&entity)
    }

    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.items.contains_key(&entity)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in ascending entity order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.items.iter().map(|(e, c)| (*e, c))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.items.iter_mut().map(|(e, c)| (*e, c))
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.items.keys().copied()
    }

    /// Remove every entry, yielding them in entity order.
    pub fn drain(&mut self) -> impl Iterator<Item = (Entity, T)> {
        std::mem::take(&mut self.items).into_iter()
    }
}

impl<T> Default for ComponentMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform registry. Renderables live in their own map next to the
/// renderer; the two are keyed independently with no integrity check.
#[derive(Default)]
pub struct World {
    transforms: ComponentMap<Transform>,
    next_id: Entity,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and give it a transform.
    pub fn spawn(&mut self, t: Transform) -> Entity {
        while self.transforms.contains(self.next_id) {
            self.next_id = self.next_id.wrapping_add(1);
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.transforms.insert(id, t);
        id
    }

    /// Attach or overwrite the transform of `e`.
    pub fn set_transform(&mut self, e: Entity, t: Transform) -> Option<Transform> {
        self.transforms.insert(e, t)
    }

    pub fn remove_transform(&mut self, e: Entity) -> Option<Transform> {
        self.transforms.remove(e)
    }

    #[inline]
    pub fn transform(&self, e: Entity) -> Option<&Transform> {
        self.transforms.get(e)
    }

    /// Mutable access to a transform (for animation).
    #[inline]
    pub fn transform_mut(&mut self, e: Entity) -> Option<&mut Transform> {
        self.transforms.get_mut(e)
    }

    /// Model matrix of `e`, identity when it has no transform.
    pub fn model_matrix(&self, e: Entity) -> Mat4 {
        self.transforms
            .get(e)
            .map_or(Mat4::IDENTITY, Transform::model_matrix)
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.transforms.entities()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Demo system: spin every transform by `degrees_per_sec * dt`.
    pub fn system_rotate_all(&mut self, dt: f32, degrees_per_sec: [f32; 3]) {
        let [sx, sy, sz] = degrees_per_sec;
        for (_, t) in self.transforms.iter_mut() {
            t.rotation.x = (t.rotation.x + sx * dt) % 360.0;
            t.rotation.y = (t.rotation.y + sy * dt) % 360.0;
            t.rotation.z = (t.rotation.z + sz * dt) % 360.0;
        }
    }
}
