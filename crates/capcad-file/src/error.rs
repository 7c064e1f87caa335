//! 文件操作错误定义

use capcad_core::error::SceneError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(String),

    #[error("Unsupported snapshot schema {found}, expected {expected}")]
    UnsupportedSchema { found: String, expected: u32 },

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}
