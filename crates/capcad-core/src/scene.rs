//! 场景（文档）
//!
//! 把实体存储、空间索引、图层与选择集组合在一个一致的接口之后，
//! 并持有标识计数器与版本计数器。每次公开的变更完成后都满足：
//! 1. 所有实体的 `layer_id` 都指向存在的图层
//! 2. 索引中每个实体的单元与其当前几何一致，没有残留单元
//! 3. 版本号只在成功的 add/remove/replace/clear/restore 时递增
//! 4. 实体标识唯一

use crate::entity::{now_millis, Entity, EntityId, EntityOptions};
use crate::error::SceneError;
use crate::geometry::{Geometry, Point};
use crate::layer::{Layer, LayerManager, LayerOptions, DEFAULT_LAYER_ID};
use crate::math::BoundingBox2;
use crate::selection::{self, Selection};
use crate::spatial::SpatialIndex;
use crate::store::EntityStore;

#[derive(Debug, Clone)]
pub struct Scene {
    store: EntityStore,
    index: SpatialIndex,
    layers: LayerManager,
    selection: Selection,
    /// 下一个待分配的标识
    next_id: u64,
    version: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// `u64::MAX` 保留不用，标识计数器因此永远不会回绕
fn check_id(id: EntityId) -> Result<(), SceneError> {
    if id.raw() == u64::MAX {
        return Err(SceneError::ReservedId(id));
    }
    Ok(())
}

impl Scene {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            index: SpatialIndex::default(),
            layers: LayerManager::new(),
            selection: Selection::new(),
            next_id: 1,
            version: 0,
        }
    }

    /// 由快照内容重建场景：先图层，再直接写入实体（保留原标识），最后恢复版本号
    pub fn from_parts(
        layers: Vec<Layer>,
        entities: Vec<Entity>,
        version: u64,
    ) -> Result<Self, SceneError> {
        let mut scene = Self::new();
        scene.layers.load(layers)?;

        for entity in entities {
            check_id(entity.id)?;
            if !scene.layers.has(&entity.layer_id) {
                return Err(SceneError::LayerNotFound(entity.layer_id));
            }
            scene.next_id = scene.next_id.max(entity.id.raw().saturating_add(1));
            scene.index.insert(entity.id, &entity.geometry);
            scene.store.add(entity)?;
        }

        scene.version = version;
        Ok(scene)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    fn allocate_id(&mut self) -> Result<EntityId, SceneError> {
        check_id(EntityId::new(self.next_id)).map_err(|_| SceneError::IdSpaceExhausted)?;
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    // ========== 实体 ==========

    /// 添加几何，返回新分配的标识
    pub fn add(&mut self, geometry: Geometry, options: EntityOptions) -> Result<EntityId, SceneError> {
        if !self.layers.has(&options.layer_id) {
            return Err(SceneError::LayerNotFound(options.layer_id));
        }

        let id = self.allocate_id()?;
        let entity = Entity::new(id, geometry, options, now_millis());
        self.store.add(entity.clone())?;
        self.index.insert(id, &entity.geometry);
        self.touch();

        tracing::debug!("Added {} {} on layer {}", entity.kind(), id, entity.layer_id);
        Ok(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    pub fn has(&self, id: &EntityId) -> bool {
        self.store.has(id)
    }

    /// 按插入顺序遍历所有实体
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.store.iter()
    }

    pub fn get_all(&self) -> Vec<&Entity> {
        self.store.get_all()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// 删除实体；不存在时返回 `None` 且版本号不变
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        let entity = self.store.remove(id)?;
        self.index.remove(id);
        self.selection.remove(id);
        self.touch();

        tracing::debug!("Removed {} {}", entity.kind(), id);
        Some(entity)
    }

    /// 替换实体几何，保留标识、图层与创建时间；返回替换前的实体
    pub fn replace(&mut self, id: &EntityId, geometry: Geometry) -> Result<Entity, SceneError> {
        let old = self.store.get(id).ok_or(SceneError::NotFound(*id))?;
        let updated = old.with_geometry(geometry, now_millis());

        self.index.remove(id);
        self.index.insert(*id, &updated.geometry);
        let old = self.store.replace(updated)?;
        self.touch();

        tracing::debug!("Replaced {} with new geometry", id);
        Ok(old)
    }

    /// 清空所有实体
    pub fn clear(&mut self) {
        self.store.clear();
        self.index.clear();
        self.selection.clear();
        self.touch();
    }

    /// 原样写回一个完整的实体快照（撤销破坏性编辑时使用）
    ///
    /// 先清除该标识可能残留的存储与索引条目，因此即使实体形状在删除后发生
    /// 过变化，索引仍保持一致。
    pub fn restore(&mut self, entity: Entity) -> Result<(), SceneError> {
        check_id(entity.id)?;
        if !self.layers.has(&entity.layer_id) {
            return Err(SceneError::LayerNotFound(entity.layer_id));
        }

        let id = entity.id;
        self.store.remove(&id);
        self.index.remove(&id);

        self.index.insert(id, &entity.geometry);
        self.store.add(entity)?;
        self.next_id = self.next_id.max(id.raw().saturating_add(1));
        self.touch();

        tracing::debug!("Restored {}", id);
        Ok(())
    }

    // ========== 空间查询 ==========

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn query_box(&self, min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Vec<EntityId> {
        self.index.query_box(min_x, min_y, max_x, max_y)
    }

    pub fn query_point(&self, point: &Point, radius: i64) -> Vec<EntityId> {
        self.index.query_point(point, radius)
    }

    // ========== 图层 ==========
    //
    // 图层编辑不改变版本号。

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn create_layer(&mut self, id: &str, options: LayerOptions) -> Result<&Layer, SceneError> {
        self.layers.create_layer(id, options)
    }

    /// 删除图层；仍有实体引用时返回 `LayerInUse`
    pub fn remove_layer(&mut self, id: &str) -> Result<Layer, SceneError> {
        if id == DEFAULT_LAYER_ID || !self.layers.has(id) {
            return self.layers.remove_layer(id);
        }
        let count = self.store.iter().filter(|e| e.layer_id == id).count();
        if count > 0 {
            return Err(SceneError::LayerInUse {
                layer: id.to_string(),
                count,
            });
        }
        self.layers.remove_layer(id)
    }

    pub fn set_layer_visible(&mut self, id: &str, visible: bool) -> Result<(), SceneError> {
        self.layers.set_visible(id, visible)
    }

    pub fn set_layer_locked(&mut self, id: &str, locked: bool) -> Result<(), SceneError> {
        self.layers.set_locked(id, locked)
    }

    pub fn rename_layer(&mut self, id: &str, name: impl Into<String>) -> Result<(), SceneError> {
        self.layers.rename(id, name)
    }

    pub fn set_layer_color(&mut self, id: &str, color: impl Into<String>) -> Result<(), SceneError> {
        self.layers.set_color(id, color)
    }

    // ========== 选择 ==========

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// 直接编辑选择集，可用 `prune_selection` 清理失效标识
    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// 点选：清空选择集后选中第一个命中的实体（插入顺序）
    pub fn select_at(&mut self, point: &Point, tolerance: i64) -> Vec<EntityId> {
        self.selection.clear();
        if let Some(id) = selection::first_hit(self.store.iter(), &self.layers, point, tolerance) {
            self.selection.add(id);
        }
        self.selection.ids()
    }

    /// 框选：清空选择集后选中包围盒完全落在矩形内的实体
    pub fn select_in_box(&mut self, min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Vec<EntityId> {
        self.selection.clear();
        let rect = BoundingBox2::from_coords(min_x, min_y, max_x, max_y);
        for id in selection::contained_in(self.store.iter(), &self.layers, &rect) {
            self.selection.add(id);
        }
        self.selection.ids()
    }

    /// 丢弃选择集中已不存在的标识
    pub fn prune_selection(&mut self) {
        let store = &self.store;
        self.selection.retain(|id| store.has(id));
    }

    // ========== 完整性 ==========

    /// 校验场景不变量，返回第一个违例
    pub fn check_integrity(&self) -> Result<(), SceneError> {
        if self.index.len() != self.store.len() {
            return Err(SceneError::Integrity(format!(
                "index holds {} entities, store holds {}",
                self.index.len(),
                self.store.len()
            )));
        }

        for entity in self.store.iter() {
            if !self.layers.has(&entity.layer_id) {
                return Err(SceneError::Integrity(format!(
                    "{} references missing layer {}",
                    entity.id, entity.layer_id
                )));
            }
            if entity.id.raw() >= self.next_id {
                return Err(SceneError::Integrity(format!(
                    "{} is not below the id counter {}",
                    entity.id, self.next_id
                )));
            }
            let expected = self.index.expected_cells(&entity.geometry);
            if self.index.cells_of(&entity.id) != Some(expected.as_slice()) {
                return Err(SceneError::Integrity(format!(
                    "{} has stale spatial index cells",
                    entity.id
                )));
            }
        }

        if let Some(orphan) = self.index.ids().find(|id| !self.store.has(id)) {
            return Err(SceneError::Integrity(format!(
                "index references removed entity {orphan}"
            )));
        }
        Ok(())
    }
}
