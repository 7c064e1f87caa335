//! CapCAD 文件格式处理
//!
//! 支持：
//! - 版本化文档快照（JSON 文本形式）
//! - `.ccad` 原生格式（MessagePack + Zstd）

pub mod error;
pub mod native;
pub mod snapshot;

pub use error::FileError;
pub use snapshot::{deserialize, from_json, serialize, to_json, Snapshot, SnapshotMeta, SCHEMA_VERSION};
