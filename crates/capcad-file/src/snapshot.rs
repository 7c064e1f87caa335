//! 文档快照
//!
//! ```text
//! {
//!   schemaVersion, meta: { savedAt, version },
//!   layers: [ { id, name, visible, locked, color } ],
//!   entities: [ { id, type, geometry, layerId, visible, locked, meta } ]
//! }
//! ```
//!
//! 所有坐标都是整数微米。加载时先校验 `schemaVersion`，不匹配则整个加载失败，
//! 不做任何部分构建。

use crate::error::FileError;
use capcad_core::entity::{now_millis, Entity};
use capcad_core::layer::Layer;
use capcad_core::scene::Scene;
use serde::{Deserialize, Serialize};

/// 当前快照结构版本
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    /// 保存时间（毫秒）
    pub saved_at: i64,
    /// 保存时的场景版本号
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: u32,
    pub meta: SnapshotMeta,
    pub layers: Vec<Layer>,
    pub entities: Vec<Entity>,
}

/// 只读取 `schemaVersion`，其余字段跳过不解析
#[derive(Debug, Deserialize)]
pub(crate) struct SchemaHeader {
    #[serde(rename = "schemaVersion")]
    schema_version: Option<u64>,
}

impl SchemaHeader {
    pub(crate) fn check(&self) -> Result<(), FileError> {
        check_schema(self.schema_version)
    }
}

fn check_schema(found: Option<u64>) -> Result<(), FileError> {
    match found {
        Some(v) if v == u64::from(SCHEMA_VERSION) => Ok(()),
        other => Err(FileError::UnsupportedSchema {
            found: other.map_or_else(|| "missing".to_string(), |v| v.to_string()),
            expected: SCHEMA_VERSION,
        }),
    }
}

/// 生成场景快照（实体按插入顺序）
pub fn serialize(scene: &Scene) -> Snapshot {
    Snapshot {
        schema_version: SCHEMA_VERSION,
        meta: SnapshotMeta {
            saved_at: now_millis(),
            version: scene.version(),
        },
        layers: scene.layers().all().to_vec(),
        entities: scene.entities().cloned().collect(),
    }
}

/// 由快照重建场景，保留实体标识、图层归属与版本号
pub fn deserialize(snapshot: Snapshot) -> Result<Scene, FileError> {
    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(FileError::UnsupportedSchema {
            found: snapshot.schema_version.to_string(),
            expected: SCHEMA_VERSION,
        });
    }
    Ok(Scene::from_parts(
        snapshot.layers,
        snapshot.entities,
        snapshot.meta.version,
    )?)
}

pub fn to_json(scene: &Scene) -> Result<String, FileError> {
    Ok(serde_json::to_string_pretty(&serialize(scene))?)
}

/// 从 JSON 文本加载；在解析其余字段之前先检查 `schemaVersion`
pub fn from_json(text: &str) -> Result<Scene, FileError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    check_schema(value.get("schemaVersion").and_then(serde_json::Value::as_u64))?;

    let snapshot: Snapshot = serde_json::from_value(value)?;
    let scene = deserialize(snapshot)?;
    tracing::info!(
        "Loaded snapshot with {} entities, {} layers (version {})",
        scene.len(),
        scene.layers().len(),
        scene.version()
    );
    Ok(scene)
}
