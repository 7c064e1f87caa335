//! 脚本门面
//!
//! 脚本只能通过 [`ScriptApi`] 的 add/replace/remove/list/get 访问场景，
//! 每次修改都是一条普通命令。[`run_script`] 把整个脚本包在一个事务里：
//! 正常返回时提交，返回错误、提前返回或 panic 时由 [`TransactionGuard`] 回滚。

use crate::command::EditCommand;
use crate::error::{CommandError, ScriptError};
use crate::manager::CommandManager;
use capcad_core::entity::{Entity, EntityId, EntityOptions};
use capcad_core::geometry::Geometry;
use std::collections::BTreeMap;

/// 作用域事务：创建时开始，显式提交，析构时若未提交则回滚
pub struct TransactionGuard<'a> {
    manager: &'a mut CommandManager,
    committed: bool,
}

impl<'a> TransactionGuard<'a> {
    pub fn begin(manager: &'a mut CommandManager, name: &str) -> Result<Self, CommandError> {
        manager.begin_transaction(name)?;
        Ok(Self {
            manager,
            committed: false,
        })
    }

    pub fn manager(&mut self) -> &mut CommandManager {
        self.manager
    }

    pub fn commit(mut self) -> Result<(), CommandError> {
        self.committed = true;
        self.manager.commit_transaction()
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.manager.rollback_transaction() {
            Ok(()) => tracing::warn!("Transaction rolled back"),
            Err(err) => tracing::error!("Failed to roll back transaction: {}", err),
        }
    }
}

/// 暴露给脚本的受限接口
pub struct ScriptApi<'a> {
    manager: &'a mut CommandManager,
}

impl<'a> ScriptApi<'a> {
    pub fn new(manager: &'a mut CommandManager) -> Self {
        Self { manager }
    }

    /// 添加实体，返回新标识
    pub fn add(&mut self, geometry: Geometry, options: EntityOptions) -> Result<EntityId, ScriptError> {
        let created = self.manager.execute(EditCommand::add(geometry, options))?;
        created.into_iter().next().ok_or_else(|| {
            ScriptError::Other(anyhow::anyhow!("add produced no entity"))
        })
    }

    pub fn replace(&mut self, id: EntityId, geometry: Geometry) -> Result<(), ScriptError> {
        self.manager.execute(EditCommand::replace(id, geometry))?;
        Ok(())
    }

    pub fn remove(&mut self, id: EntityId) -> Result<(), ScriptError> {
        self.manager.execute(EditCommand::remove(id))?;
        Ok(())
    }

    /// 所有实体（插入顺序）
    pub fn list(&self) -> Vec<&Entity> {
        self.manager.scene().get_all()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.manager.scene().get(id)
    }
}

/// 在隐式事务中运行脚本
///
/// 成功时提交为一条撤销记录；失败时场景恢复到脚本运行前的状态，
/// 再把错误原样返回。
pub fn run_script<T, F>(manager: &mut CommandManager, name: &str, script: F) -> Result<T, ScriptError>
where
    F: FnOnce(&mut ScriptApi<'_>) -> Result<T, ScriptError>,
{
    let mut guard = TransactionGuard::begin(manager, name)?;
    let result = script(&mut ScriptApi::new(guard.manager()));

    match result {
        Ok(value) => {
            guard.commit()?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!("Script '{}' failed: {}", name, err);
            drop(guard);
            Err(err)
        }
    }
}

/// 插件：在脚本上下文中运行的具名函数
pub type Plugin = Box<dyn Fn(&mut ScriptApi<'_>) -> Result<(), ScriptError> + Send + Sync>;

/// 插件注册表
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Plugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, plugin: F) -> Result<(), ScriptError>
    where
        F: Fn(&mut ScriptApi<'_>) -> Result<(), ScriptError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.plugins.contains_key(&name) {
            return Err(ScriptError::DuplicatePlugin(name));
        }
        tracing::debug!("Registered plugin {}", name);
        self.plugins.insert(name, Box::new(plugin));
        Ok(())
    }

    /// 运行插件（隐式事务）
    pub fn run(&self, name: &str, manager: &mut CommandManager) -> Result<(), ScriptError> {
        let plugin = self
            .plugins
            .get(name)
            .ok_or_else(|| ScriptError::PluginNotFound(name.to_string()))?;
        run_script(manager, name, |api| plugin(api))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// 已注册的插件名（按名称排序）
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capcad_core::prelude::*;

    fn line(x: i64) -> Geometry {
        Line::new(Point::new(x, 0), Point::new(x + 1_000, 0))
            .unwrap()
            .into()
    }

    #[test]
    fn test_guard_rolls_back_on_drop() {
        let mut mgr = CommandManager::default();
        {
            let mut guard = TransactionGuard::begin(&mut mgr, "scoped").unwrap();
            guard
                .manager()
                .execute(EditCommand::add(line(0), EntityOptions::default()))
                .unwrap();
            assert_eq!(guard.manager().scene().len(), 1);
        }
        assert!(mgr.scene().is_empty());
        assert!(!mgr.is_transaction_open());
        assert!(!mgr.can_undo());
    }

    #[test]
    fn test_script_commits_as_one_entry() {
        let mut mgr = CommandManager::default();
        let ids = run_script(&mut mgr, "two lines", |api| {
            let a = api.add(line(0), EntityOptions::default())?;
            let b = api.add(line(5_000), EntityOptions::default())?;
            Ok(vec![a, b])
        })
        .unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(mgr.undo_len(), 1);
        mgr.undo().unwrap();
        assert!(mgr.scene().is_empty());
    }

    #[test]
    fn test_script_error_rolls_back() {
        let mut mgr = CommandManager::default();
        let keep = mgr
            .execute(EditCommand::add(line(0), EntityOptions::default()))
            .unwrap()[0];
        let before: Vec<Entity> = mgr.scene().entities().cloned().collect();

        let result: Result<(), ScriptError> = run_script(&mut mgr, "broken", |api| {
            api.add(line(5_000), EntityOptions::default())?;
            api.replace(keep, line(9_000))?;
            api.remove(EntityId::new(404))?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(ScriptError::Command(CommandError::Scene(SceneError::NotFound(_))))
        ));
        let after: Vec<Entity> = mgr.scene().entities().cloned().collect();
        assert_eq!(after, before);
        assert_eq!(mgr.undo_len(), 1);
    }

    #[test]
    fn test_plugins() {
        let mut registry = PluginRegistry::new();
        registry
            .register("square", |api| {
                let pts = [(0, 0), (1_000, 0), (1_000, 1_000), (0, 1_000), (0, 0)];
                for w in pts.windows(2) {
                    let l = Line::new(Point::new(w[0].0, w[0].1), Point::new(w[1].0, w[1].1))?;
                    api.add(l.into(), EntityOptions::default())?;
                }
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            registry.register("square", |_| Ok(())),
            Err(ScriptError::DuplicatePlugin(_))
        ));

        let mut mgr = CommandManager::default();
        registry.run("square", &mut mgr).unwrap();
        assert_eq!(mgr.scene().len(), 4);
        assert!(matches!(
            registry.run("circle", &mut mgr),
            Err(ScriptError::PluginNotFound(_))
        ));
        assert_eq!(registry.names(), vec!["square"]);
    }
}
