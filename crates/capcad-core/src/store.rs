//! 实体存储
//!
//! 按标识索引的实体表，同时记录插入顺序。恢复（撤销删除）的实体排在末尾。

use crate::entity::{Entity, EntityId};
use crate::error::SceneError;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    /// 标识 -> (插入序号, 实体)
    entities: HashMap<EntityId, (u64, Entity)>,
    /// 插入序号 -> 标识
    order: BTreeMap<u64, EntityId>,
    next_seq: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id).map(|(_, e)| e)
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.order.values().filter_map(|id| self.get(id))
    }

    pub fn get_all(&self) -> Vec<&Entity> {
        self.iter().collect()
    }

    pub fn add(&mut self, entity: Entity) -> Result<(), SceneError> {
        if self.has(&entity.id) {
            return Err(SceneError::DuplicateId(entity.id));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, entity.id);
        self.entities.insert(entity.id, (seq, entity));
        Ok(())
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        let (seq, entity) = self.entities.remove(id)?;
        self.order.remove(&seq);
        Some(entity)
    }

    /// 原位替换，返回旧实体
    pub fn replace(&mut self, entity: Entity) -> Result<Entity, SceneError> {
        match self.entities.get_mut(&entity.id) {
            Some((_, slot)) => Ok(std::mem::replace(slot, entity)),
            None => Err(SceneError::NotFound(entity.id)),
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
