//! CapCAD 核心几何引擎
//!
//! 提供整数微米几何图元、容差感知的几何运算、对象捕捉，以及由实体存储、
//! 空间索引、图层和选择集组成的文档模型。
//!
//! # 架构设计
//!
//! - `Geometry`: 封闭的几何和类型（点、线、圆、弧、多段线）
//! - `Entity`: 标识 + 几何 + 图层归属
//! - `Scene`: 唯一的可变文档，持有标识与版本计数器
//!
//! # 示例
//!
//! ```rust
//! use capcad_core::prelude::*;
//!
//! let mut scene = Scene::new();
//! let line = Line::new(Point::from_display(0.0, 0.0)?, Point::from_display(10.0, 0.0)?)?;
//! let id = scene.add(line.into(), EntityOptions::default())?;
//! assert!(scene.query_box(0, 0, 10_000, 0).contains(&id));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod entity;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod math;
pub mod ops;
pub mod scene;
pub mod selection;
pub mod snap;
pub mod spatial;
pub mod store;
pub mod transform;
pub mod units;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::entity::{Entity, EntityId, EntityMeta, EntityOptions};
    pub use crate::error::{GeometryError, SceneError};
    pub use crate::geometry::{Arc, Circle, Geometry, GeometryKind, Line, Point, Polyline};
    pub use crate::layer::{Layer, LayerManager, LayerOptions, DEFAULT_LAYER_ID};
    pub use crate::math::BoundingBox2;
    pub use crate::scene::Scene;
    pub use crate::selection::{Selection, SelectionConfig};
    pub use crate::snap::{SnapConfig, SnapEngine, SnapMask, SnapPoint, SnapType};
    pub use crate::spatial::SpatialIndex;
    pub use crate::transform::Transform2D;
    pub use crate::units::EPS;
}
