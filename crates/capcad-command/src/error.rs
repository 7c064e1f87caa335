//! 命令与脚本错误定义

use capcad_core::error::{GeometryError, SceneError};
use thiserror::Error;

/// 命令执行/事务错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Transaction '{0}' is already open")]
    TransactionAlreadyOpen(String),

    #[error("Transaction '{0}' is closed")]
    TransactionClosed(String),

    #[error("No transaction is open")]
    NoTransaction,

    #[error("Cannot {action} while transaction '{name}' is open")]
    TransactionInProgress { action: &'static str, name: String },

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

/// 脚本/插件错误
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Plugin '{0}' is already registered")]
    DuplicatePlugin(String),

    #[error("Plugin '{0}' not found")]
    PluginNotFound(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
