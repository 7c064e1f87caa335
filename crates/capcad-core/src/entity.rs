//! 实体定义
//!
//! 实体 = 标识 + 几何 + 图层归属 + 可见/锁定标志 + 时间戳。
//! 实体只能通过场景整体替换来修改。

use crate::geometry::{Geometry, GeometryKind};
use crate::layer::DEFAULT_LAYER_ID;
use crate::math::BoundingBox2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 实体唯一标识符
///
/// 由场景单调分配，场景生命周期内不会复用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// 时间戳（毫秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    pub created_at: i64,
    pub updated_at: i64,
}

/// 添加实体时的可选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityOptions {
    pub layer_id: String,
    pub visible: bool,
    pub locked: bool,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            layer_id: DEFAULT_LAYER_ID.to_string(),
            visible: true,
            locked: false,
        }
    }
}

impl EntityOptions {
    pub fn on_layer(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            ..Self::default()
        }
    }
}

/// 文档实体
///
/// 序列化时几何展开为 `type` + `geometry` 两个字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    #[serde(flatten)]
    pub geometry: Geometry,
    pub layer_id: String,
    pub visible: bool,
    pub locked: bool,
    pub meta: EntityMeta,
}

impl Entity {
    pub fn new(id: EntityId, geometry: Geometry, options: EntityOptions, now_ms: i64) -> Self {
        Self {
            id,
            geometry,
            layer_id: options.layer_id,
            visible: options.visible,
            locked: options.locked,
            meta: EntityMeta {
                created_at: now_ms,
                updated_at: now_ms,
            },
        }
    }

    pub fn kind(&self) -> GeometryKind {
        self.geometry.kind()
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        self.geometry.bounding_box()
    }

    /// 替换几何，保留标识与创建时间
    pub fn with_geometry(&self, geometry: Geometry, now_ms: i64) -> Self {
        Self {
            geometry,
            meta: EntityMeta {
                created_at: self.meta.created_at,
                updated_at: now_ms,
            },
            ..self.clone()
        }
    }
}

/// 当前时间（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Line, Point};

    #[test]
    fn test_entity_json_shape() {
        let line = Line::new(Point::new(0, 0), Point::new(1000, 0)).unwrap();
        let entity = Entity::new(EntityId::new(7), line.into(), EntityOptions::default(), 42);
        let value = serde_json::to_value(&entity).unwrap();

        assert_eq!(value["id"], 7);
        assert_eq!(value["type"], "LINE");
        assert_eq!(value["layerId"], "default");
        assert_eq!(value["geometry"]["end"]["x"], 1000);
        assert_eq!(value["meta"]["createdAt"], 42);

        let back: Entity = serde_json::from_value(value).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_with_geometry_keeps_identity() {
        let entity = Entity::new(
            EntityId::new(1),
            Point::new(1, 2).into(),
            EntityOptions::on_layer("walls"),
            100,
        );
        let updated = entity.with_geometry(Point::new(5, 5).into(), 200);
        assert_eq!(updated.id, entity.id);
        assert_eq!(updated.layer_id, "walls");
        assert_eq!(updated.meta.created_at, 100);
        assert_eq!(updated.meta.updated_at, 200);
        assert_eq!(EntityId::new(3).to_string(), "e3");
    }
}
