//! 内核错误定义
//!
//! 几何构造错误与场景完整性错误分开定义，二者都会同步返回给调用方。

use crate::entity::EntityId;
use thiserror::Error;

/// 几何构造/运算错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unsupported entity: {0}")]
    UnsupportedEntity(String),

    #[error("Singular matrix (determinant {0:e})")]
    SingularMatrix(f64),
}

/// 场景/存储/图层完整性错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Duplicate entity id: {0}")]
    DuplicateId(EntityId),

    #[error("Duplicate layer: {0}")]
    DuplicateLayer(String),

    #[error("Entity not found: {0}")]
    NotFound(EntityId),

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Layer '{0}' is protected and cannot be removed")]
    ProtectedLayer(String),

    #[error("Layer '{layer}' is still referenced by {count} entities")]
    LayerInUse { layer: String, count: usize },

    #[error("Entity id {0} is reserved")]
    ReservedId(EntityId),

    #[error("Entity id space exhausted")]
    IdSpaceExhausted,

    #[error("Scene integrity violated: {0}")]
    Integrity(String),
}
