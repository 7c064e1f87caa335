//! 选择集
//!
//! 只有所在图层存在、可见且未锁定的实体才可被选中。
//! 点选按存储的插入顺序取第一个命中，而不是最近的实体。

use crate::entity::{Entity, EntityId};
use crate::geometry::Point;
use crate::layer::LayerManager;
use crate::math::BoundingBox2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 默认点选容差（内部单位，0.2mm）
pub const DEFAULT_SELECT_TOLERANCE: i64 = 200;

/// 选择配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// 点选容差（内部单位）
    pub tolerance: i64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_SELECT_TOLERANCE,
        }
    }
}

/// 当前选中的实体集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<EntityId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: EntityId) {
        self.ids.insert(id);
    }

    pub fn remove(&mut self, id: &EntityId) -> bool {
        self.ids.remove(id)
    }

    pub fn toggle(&mut self, id: EntityId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// 选中的标识（升序）
    pub fn ids(&self) -> Vec<EntityId> {
        self.ids.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&EntityId) -> bool) {
        self.ids.retain(|id| keep(id));
    }
}

/// 实体所在图层存在、可见且未锁定
pub fn is_selectable(entity: &Entity, layers: &LayerManager) -> bool {
    layers
        .get(&entity.layer_id)
        .is_some_and(|layer| layer.is_editable())
}

/// 按遍历顺序返回第一个精确命中的可选实体
pub fn first_hit<'a>(
    entities: impl IntoIterator<Item = &'a Entity>,
    layers: &LayerManager,
    point: &Point,
    tolerance: i64,
) -> Option<EntityId> {
    entities
        .into_iter()
        .filter(|e| is_selectable(e, layers))
        .find(|e| e.geometry.hit_test(point, tolerance))
        .map(|e| e.id)
}

/// 包围盒完全落在矩形内的可选实体
pub fn contained_in<'a>(
    entities: impl IntoIterator<Item = &'a Entity>,
    layers: &LayerManager,
    rect: &BoundingBox2,
) -> Vec<EntityId> {
    entities
        .into_iter()
        .filter(|e| is_selectable(e, layers) && rect.contains(&e.bounding_box()))
        .map(|e| e.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityOptions;
    use crate::geometry::Line;
    use crate::layer::LayerOptions;

    fn line_on(raw: u64, layer: &str, ax: i64, bx: i64) -> Entity {
        Entity::new(
            EntityId::new(raw),
            Line::new(Point::new(ax, 0), Point::new(bx, 0)).unwrap().into(),
            EntityOptions::on_layer(layer),
            0,
        )
    }

    #[test]
    fn test_toggle() {
        let mut selection = Selection::new();
        selection.toggle(EntityId::new(1));
        assert!(selection.contains(&EntityId::new(1)));
        selection.toggle(EntityId::new(1));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_layer_state_gates_selection() {
        let mut layers = LayerManager::new();
        layers.create_layer("hidden", LayerOptions::default()).unwrap();
        layers.set_visible("hidden", false).unwrap();
        layers.create_layer("locked", LayerOptions::default()).unwrap();
        layers.set_locked("locked", true).unwrap();

        assert!(is_selectable(&line_on(1, "default", 0, 1000), &layers));
        assert!(!is_selectable(&line_on(2, "hidden", 0, 1000), &layers));
        assert!(!is_selectable(&line_on(3, "locked", 0, 1000), &layers));
        assert!(!is_selectable(&line_on(4, "missing", 0, 1000), &layers));
    }

    #[test]
    fn test_first_hit_uses_iteration_order_not_distance() {
        let layers = LayerManager::new();
        // 两条线都在容差内，第二条更近，但仍然选第一条
        let far = Entity::new(
            EntityId::new(1),
            Line::new(Point::new(0, 150), Point::new(1000, 150)).unwrap().into(),
            EntityOptions::default(),
            0,
        );
        let near = line_on(2, "default", 0, 1000);
        let hit = first_hit([&far, &near], &layers, &Point::new(500, 0), DEFAULT_SELECT_TOLERANCE);
        assert_eq!(hit, Some(EntityId::new(1)));
    }

    #[test]
    fn test_box_uses_containment() {
        let layers = LayerManager::new();
        let inside = line_on(1, "default", 1000, 2000);
        let straddling = line_on(2, "default", 1000, 9000);
        let rect = BoundingBox2::from_coords(0, -100, 5000, 100);
        assert_eq!(contained_in([&inside, &straddling], &layers, &rect), vec![EntityId::new(1)]);
    }
}
