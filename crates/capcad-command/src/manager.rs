//! 命令管理器
//!
//! 持有场景、撤销栈与重做栈，以及当前打开的事务。
//! 执行、撤销、重做都是同步完成的，不可重入。

use crate::command::{Command, EditCommand, Transaction};
use crate::error::CommandError;
use capcad_core::entity::EntityId;
use capcad_core::scene::Scene;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 撤销历史默认最大深度
pub const HISTORY_MAX_DEPTH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// 撤销栈最大深度，超出时丢弃最早的记录
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: HISTORY_MAX_DEPTH,
        }
    }
}

#[derive(Debug)]
pub struct CommandManager {
    scene: Scene,
    undo_stack: VecDeque<EditCommand>,
    redo_stack: Vec<EditCommand>,
    transaction: Option<Transaction>,
    config: HistoryConfig,
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new(Scene::new())
    }
}

impl CommandManager {
    pub fn new(scene: Scene) -> Self {
        Self::with_config(scene, HistoryConfig::default())
    }

    pub fn with_config(scene: Scene, config: HistoryConfig) -> Self {
        Self {
            scene,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            transaction: None,
            config,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// 直接访问场景，只用于不进入历史的编辑（图层、选择集）
    ///
    /// 通过这里修改实体会让撤销栈中的备忘失效。
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }

    /// 执行命令，返回本次创建的实体标识
    ///
    /// 有打开的事务时命令追加到事务中，不触碰撤销/重做栈。
    pub fn execute(&mut self, mut cmd: EditCommand) -> Result<Vec<EntityId>, CommandError> {
        cmd.execute(&mut self.scene)?;
        let created = cmd.created_ids();
        tracing::debug!("Executed {} ({} created)", cmd.name(), created.len());

        match self.transaction.as_mut() {
            Some(tx) => tx.append(cmd)?,
            None => self.push_undo(cmd),
        }
        Ok(created)
    }

    fn push_undo(&mut self, cmd: EditCommand) {
        self.undo_stack.push_back(cmd);
        while self.undo_stack.len() > self.config.max_depth.max(1) {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
    }

    // ========== 事务 ==========

    pub fn begin_transaction(&mut self, name: impl Into<String>) -> Result<(), CommandError> {
        if let Some(tx) = &self.transaction {
            return Err(CommandError::TransactionAlreadyOpen(tx.name().to_string()));
        }
        let tx = Transaction::new(name);
        tracing::debug!("Begin transaction {}", tx.name());
        self.transaction = Some(tx);
        Ok(())
    }

    /// 提交事务，整体作为一条撤销记录（空事务不记录）
    pub fn commit_transaction(&mut self) -> Result<(), CommandError> {
        let mut tx = self.transaction.take().ok_or(CommandError::NoTransaction)?;
        tx.close();

        if tx.is_empty() {
            tracing::debug!("Commit empty transaction {}", tx.name());
            return Ok(());
        }

        tracing::debug!("Commit transaction {} ({} commands)", tx.name(), tx.len());
        self.push_undo(EditCommand::Transaction(tx));
        Ok(())
    }

    /// 回滚事务：逆序撤销已执行的子命令并丢弃事务，不触碰撤销/重做栈
    ///
    /// 撤销失败时场景保持回滚前的状态，事务仍然打开。
    pub fn rollback_transaction(&mut self) -> Result<(), CommandError> {
        let mut tx = self.transaction.take().ok_or(CommandError::NoTransaction)?;
        tracing::debug!("Rollback transaction {} ({} commands)", tx.name(), tx.len());
        if let Err(err) = tx.undo(&mut self.scene) {
            self.transaction = Some(tx);
            return Err(err);
        }
        tx.close();
        Ok(())
    }

    pub fn is_transaction_open(&self) -> bool {
        self.transaction.is_some()
    }

    fn ensure_no_transaction(&self, action: &'static str) -> Result<(), CommandError> {
        match &self.transaction {
            Some(tx) => Err(CommandError::TransactionInProgress {
                action,
                name: tx.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    // ========== 撤销/重做 ==========

    /// 撤销最近一条记录，栈为空时返回 `Ok(false)`
    ///
    /// 撤销失败时场景保持不变，记录留在撤销栈顶，可以修复后重试。
    pub fn undo(&mut self) -> Result<bool, CommandError> {
        self.ensure_no_transaction("undo")?;
        let Some(mut cmd) = self.undo_stack.pop_back() else {
            return Ok(false);
        };

        if let Err(err) = cmd.undo(&mut self.scene) {
            self.undo_stack.push_back(cmd);
            return Err(err);
        }
        tracing::debug!("Undo {}", cmd.name());
        self.redo_stack.push(cmd);
        Ok(true)
    }

    /// 重做最近撤销的记录，栈为空时返回 `Ok(false)`
    pub fn redo(&mut self) -> Result<bool, CommandError> {
        self.ensure_no_transaction("redo")?;
        let Some(mut cmd) = self.redo_stack.pop() else {
            return Ok(false);
        };

        if let Err(err) = cmd.execute(&mut self.scene) {
            self.redo_stack.push(cmd);
            return Err(err);
        }
        tracing::debug!("Redo {}", cmd.name());
        self.undo_stack.push_back(cmd);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// 下一次撤销的命令名称
    pub fn undo_name(&self) -> Option<&str> {
        self.undo_stack.back().map(Command::name)
    }

    pub fn redo_name(&self) -> Option<&str> {
        self.redo_stack.last().map(Command::name)
    }

    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
