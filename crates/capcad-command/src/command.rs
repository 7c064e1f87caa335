//! 编辑命令
//!
//! 每条命令在执行时把撤销所需的状态（备忘）保存在自身字段里，撤销时再取出，
//! 从不持有对场景中实体的引用。

use crate::capture::CommitCapture;
use crate::error::CommandError;
use capcad_core::entity::{Entity, EntityId, EntityOptions};
use capcad_core::error::SceneError;
use capcad_core::geometry::Geometry;
use capcad_core::scene::Scene;

/// 可执行、可撤销的编辑
pub trait Command {
    /// 执行（或重做）命令
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError>;

    /// 撤销命令
    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError>;

    /// 命令名称（用于显示与日志）
    fn name(&self) -> &str;
}

/// 历史记录中保存的命令
#[derive(Debug, Clone)]
pub enum EditCommand {
    AddEntity(AddEntity),
    RemoveEntity(RemoveEntity),
    ReplaceEntity(ReplaceEntity),
    Composite(Composite),
    Transaction(Transaction),
    Macro(Macro),
    CommitCapture(CommitCapture),
}

impl EditCommand {
    pub fn add(geometry: Geometry, options: EntityOptions) -> Self {
        Self::AddEntity(AddEntity::new(geometry, options))
    }

    pub fn remove(id: EntityId) -> Self {
        Self::RemoveEntity(RemoveEntity::new(id))
    }

    pub fn replace(id: EntityId, geometry: Geometry) -> Self {
        Self::ReplaceEntity(ReplaceEntity::new(id, geometry))
    }

    pub fn composite(name: impl Into<String>, commands: Vec<EditCommand>) -> Self {
        Self::Composite(Composite::new(name, commands))
    }

    /// 最近一次执行所创建的实体标识
    pub fn created_ids(&self) -> Vec<EntityId> {
        match self {
            Self::AddEntity(cmd) => cmd.id().into_iter().collect(),
            Self::RemoveEntity(_) | Self::ReplaceEntity(_) => Vec::new(),
            Self::Composite(cmd) => collect_created(&cmd.commands),
            Self::Transaction(cmd) => collect_created(&cmd.commands),
            Self::Macro(cmd) => collect_created(&cmd.commands),
            Self::CommitCapture(cmd) => cmd.ids(),
        }
    }

    /// 去掉备忘的副本，可以作为新命令再次执行
    pub fn fresh(&self) -> Self {
        match self {
            Self::AddEntity(cmd) => Self::AddEntity(AddEntity::new(
                cmd.geometry.clone(),
                cmd.options.clone(),
            )),
            Self::RemoveEntity(cmd) => Self::RemoveEntity(RemoveEntity::new(cmd.id)),
            Self::ReplaceEntity(cmd) => {
                Self::ReplaceEntity(ReplaceEntity::new(cmd.id, cmd.geometry.clone()))
            }
            Self::Composite(cmd) => Self::Composite(Composite::new(
                cmd.name.clone(),
                cmd.commands.iter().map(EditCommand::fresh).collect(),
            )),
            Self::Transaction(cmd) => Self::Transaction(Transaction {
                name: cmd.name.clone(),
                commands: cmd.commands.iter().map(EditCommand::fresh).collect(),
                open: cmd.open,
            }),
            Self::Macro(cmd) => Self::Macro(cmd.instantiate()),
            Self::CommitCapture(cmd) => Self::CommitCapture(cmd.fresh()),
        }
    }
}

fn collect_created(commands: &[EditCommand]) -> Vec<EntityId> {
    commands.iter().flat_map(EditCommand::created_ids).collect()
}

impl Command for EditCommand {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        match self {
            Self::AddEntity(cmd) => cmd.execute(scene),
            Self::RemoveEntity(cmd) => cmd.execute(scene),
            Self::ReplaceEntity(cmd) => cmd.execute(scene),
            Self::Composite(cmd) => cmd.execute(scene),
            Self::Transaction(cmd) => cmd.execute(scene),
            Self::Macro(cmd) => cmd.execute(scene),
            Self::CommitCapture(cmd) => cmd.execute(scene),
        }
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        match self {
            Self::AddEntity(cmd) => cmd.undo(scene),
            Self::RemoveEntity(cmd) => cmd.undo(scene),
            Self::ReplaceEntity(cmd) => cmd.undo(scene),
            Self::Composite(cmd) => cmd.undo(scene),
            Self::Transaction(cmd) => cmd.undo(scene),
            Self::Macro(cmd) => cmd.undo(scene),
            Self::CommitCapture(cmd) => cmd.undo(scene),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::AddEntity(cmd) => cmd.name(),
            Self::RemoveEntity(cmd) => cmd.name(),
            Self::ReplaceEntity(cmd) => cmd.name(),
            Self::Composite(cmd) => cmd.name(),
            Self::Transaction(cmd) => cmd.name(),
            Self::Macro(cmd) => cmd.name(),
            Self::CommitCapture(cmd) => cmd.name(),
        }
    }
}

// ========== 单实体命令 ==========

/// 添加实体
///
/// 首次执行由场景分配标识；撤销后再重做时原样写回同一个实体，
/// 因此重做链中后续命令引用的标识仍然有效。
#[derive(Debug, Clone)]
pub struct AddEntity {
    geometry: Geometry,
    options: EntityOptions,
    /// 执行后创建的实体
    created: Option<Entity>,
}

impl AddEntity {
    pub fn new(geometry: Geometry, options: EntityOptions) -> Self {
        Self {
            geometry,
            options,
            created: None,
        }
    }

    /// 已分配的标识（执行之前为 `None`）
    pub fn id(&self) -> Option<EntityId> {
        self.created.as_ref().map(|e| e.id)
    }
}

impl Command for AddEntity {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        match &self.created {
            Some(entity) => scene.restore(entity.clone())?,
            None => {
                let id = scene.add(self.geometry.clone(), self.options.clone())?;
                self.created = scene.get(&id).cloned();
            }
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        if let Some(id) = self.id() {
            scene.remove(&id).ok_or(SceneError::NotFound(id))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Add Entity"
    }
}

/// 删除实体，执行时保存完整快照
#[derive(Debug, Clone)]
pub struct RemoveEntity {
    id: EntityId,
    removed: Option<Entity>,
}

impl RemoveEntity {
    pub fn new(id: EntityId) -> Self {
        Self { id, removed: None }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }
}

impl Command for RemoveEntity {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        let entity = scene.remove(&self.id).ok_or(SceneError::NotFound(self.id))?;
        self.removed = Some(entity);
        Ok(())
    }

    /// 写回失败时保留备忘，之后仍可重试
    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        if let Some(entity) = &self.removed {
            scene.restore(entity.clone())?;
            self.removed = None;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Remove Entity"
    }
}

/// 替换实体几何，撤销时原样写回替换前的完整实体（含时间戳）
#[derive(Debug, Clone)]
pub struct ReplaceEntity {
    id: EntityId,
    geometry: Geometry,
    previous: Option<Entity>,
}

impl ReplaceEntity {
    pub fn new(id: EntityId, geometry: Geometry) -> Self {
        Self {
            id,
            geometry,
            previous: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }
}

impl Command for ReplaceEntity {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        let previous = scene.replace(&self.id, self.geometry.clone())?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        if let Some(entity) = &self.previous {
            scene.restore(entity.clone())?;
            self.previous = None;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Replace Entity"
    }
}

// ========== 组合命令 ==========

/// 按顺序执行子命令；任一子命令失败时撤销已执行的部分再返回错误
pub(crate) fn execute_all(
    commands: &mut [EditCommand],
    scene: &mut Scene,
) -> Result<(), CommandError> {
    for k in 0..commands.len() {
        if let Err(err) = commands[k].execute(scene) {
            tracing::debug!("Sub-command {} failed: {}", commands[k].name(), err);
            undo_partial(&mut commands[..k], scene);
            return Err(err);
        }
    }
    Ok(())
}

/// 逆序撤销；某条子命令撤销失败时按原顺序重做已撤销的部分再返回错误
pub(crate) fn undo_all(commands: &mut [EditCommand], scene: &mut Scene) -> Result<(), CommandError> {
    for k in (0..commands.len()).rev() {
        if let Err(err) = commands[k].undo(scene) {
            tracing::debug!("Undo of sub-command {} failed: {}", commands[k].name(), err);
            redo_partial(&mut commands[k + 1..], scene);
            return Err(err);
        }
    }
    Ok(())
}

/// 撤销失败后的补偿性重做，失败只记录日志
fn redo_partial(commands: &mut [EditCommand], scene: &mut Scene) {
    for cmd in commands.iter_mut() {
        if let Err(err) = cmd.execute(scene) {
            tracing::error!("Failed to redo {} during recovery: {}", cmd.name(), err);
        }
    }
}

/// 补偿性撤销，已经在报告另一个错误，这里的失败只记录日志
fn undo_partial(commands: &mut [EditCommand], scene: &mut Scene) {
    for cmd in commands.iter_mut().rev() {
        if let Err(err) = cmd.undo(scene) {
            tracing::error!("Failed to undo {} during recovery: {}", cmd.name(), err);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Composite {
    name: String,
    commands: Vec<EditCommand>,
}

impl Composite {
    pub fn new(name: impl Into<String>, commands: Vec<EditCommand>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    pub fn commands(&self) -> &[EditCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for Composite {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        execute_all(&mut self.commands, scene)
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        undo_all(&mut self.commands, scene)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 事务：打开时接收子命令，提交后关闭
///
/// 子命令在追加之前已经由管理器执行过，事务本身只负责整体撤销/重做。
#[derive(Debug, Clone)]
pub struct Transaction {
    name: String,
    commands: Vec<EditCommand>,
    open: bool,
}

impl Transaction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 追加已执行的子命令，关闭后失败
    pub fn append(&mut self, command: EditCommand) -> Result<(), CommandError> {
        if !self.open {
            return Err(CommandError::TransactionClosed(self.name.clone()));
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn commands(&self) -> &[EditCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for Transaction {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        execute_all(&mut self.commands, scene)
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        undo_all(&mut self.commands, scene)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 具名、可复用的命令组合
///
/// 录制一次，通过 [`Macro::instantiate`] 得到不带备忘的新副本反复执行。
#[derive(Debug, Clone)]
pub struct Macro {
    name: String,
    commands: Vec<EditCommand>,
}

impl Macro {
    pub fn new(name: impl Into<String>, commands: Vec<EditCommand>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    pub fn push(&mut self, command: EditCommand) {
        self.commands.push(command);
    }

    pub fn instantiate(&self) -> Self {
        Self {
            name: self.name.clone(),
            commands: self.commands.iter().map(EditCommand::fresh).collect(),
        }
    }

    pub fn commands(&self) -> &[EditCommand] {
        &self.commands
    }
}

impl Command for Macro {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        execute_all(&mut self.commands, scene)
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        undo_all(&mut self.commands, scene)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl From<Composite> for EditCommand {
    fn from(cmd: Composite) -> Self {
        Self::Composite(cmd)
    }
}

impl From<Macro> for EditCommand {
    fn from(cmd: Macro) -> Self {
        Self::Macro(cmd)
    }
}

impl From<CommitCapture> for EditCommand {
    fn from(cmd: CommitCapture) -> Self {
        Self::CommitCapture(cmd)
    }
}
