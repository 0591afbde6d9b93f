use super::{Entity, EntityId};
use crate::context::DataPlugin;

/// Stores every entity ever created. Dead entities keep their slot so ids stay valid.
#[derive(Default)]
pub struct EntityData {
    entities: Vec<Entity>,
}

impl DataPlugin for EntityData {
    fn init() -> Self {
        EntityData::default()
    }
}

impl EntityData {
    pub(crate) fn next_id(&self) -> EntityId {
        EntityId(self.entities.len())
    }

    pub(crate) fn add(&mut self, entity: Entity) -> EntityId {
        debug_assert_eq!(entity.id, self.next_id());
        let id = entity.id;
        self.entities.push(entity);
        id
    }

    pub(crate) fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }
}
