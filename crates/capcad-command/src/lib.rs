//! CapCAD命令引擎
//!
//! 所有对场景的编辑都包装为命令，由 [`CommandManager`] 执行并记录到撤销栈：
//! - 单条命令：添加/删除/替换实体
//! - 组合命令、事务与可复用宏，作为一个整体撤销/重做
//! - 采集缓冲：高频硬件采样先进入缓冲区，显式提交时才生成一条命令
//! - 脚本门面：受限 API + 自动事务，出错时整体回滚
//!
//! ```
//! use capcad_command::prelude::*;
//! use capcad_core::prelude::*;
//!
//! let mut manager = CommandManager::new(Scene::new());
//! let line = Line::new(Point::new(0, 0), Point::new(10_000, 0))?;
//! manager.execute(EditCommand::add(line.into(), EntityOptions::default()))?;
//! assert_eq!(manager.scene().len(), 1);
//!
//! manager.undo()?;
//! assert!(manager.scene().is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod capture;
pub mod command;
pub mod error;
pub mod manager;
pub mod script;

pub use error::{CommandError, ScriptError};

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::capture::{
        capture_channel, CaptureConfig, CaptureMode, CaptureSession, CaptureState, CommitCapture,
        MachinePoint,
    };
    pub use crate::command::{
        AddEntity, Command, Composite, EditCommand, Macro, RemoveEntity, ReplaceEntity, Transaction,
    };
    pub use crate::error::{CommandError, ScriptError};
    pub use crate::manager::{CommandManager, HistoryConfig};
    pub use crate::script::{run_script, PluginRegistry, ScriptApi, TransactionGuard};
}
