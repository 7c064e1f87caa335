//! 图层管理
//!
//! 图层按创建顺序保存。`"default"` 图层始终存在且不可删除。

use crate::error::SceneError;
use serde::{Deserialize, Serialize};

/// 默认图层标识
pub const DEFAULT_LAYER_ID: &str = "default";

/// 默认图层颜色
pub const DEFAULT_LAYER_COLOR: &str = "#000000";

/// 图层
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub color: String,
}

impl Layer {
    /// 可见且未锁定
    pub fn is_editable(&self) -> bool {
        self.visible && !self.locked
    }

    fn default_layer() -> Self {
        Self {
            id: DEFAULT_LAYER_ID.to_string(),
            name: "Default".to_string(),
            visible: true,
            locked: false,
            color: DEFAULT_LAYER_COLOR.to_string(),
        }
    }
}

/// 创建图层的可选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOptions {
    /// 省略时使用图层标识
    pub name: Option<String>,
    pub visible: bool,
    pub locked: bool,
    pub color: String,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            name: None,
            visible: true,
            locked: false,
            color: DEFAULT_LAYER_COLOR.to_string(),
        }
    }
}

impl LayerOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// 图层管理器
#[derive(Debug, Clone)]
pub struct LayerManager {
    layers: Vec<Layer>,
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerManager {
    /// 创建只含默认图层的管理器
    pub fn new() -> Self {
        Self {
            layers: vec![Layer::default_layer()],
        }
    }

    pub fn create_layer(&mut self, id: &str, options: LayerOptions) -> Result<&Layer, SceneError> {
        if self.has(id) {
            return Err(SceneError::DuplicateLayer(id.to_string()));
        }
        self.layers.push(Layer {
            id: id.to_string(),
            name: options.name.unwrap_or_else(|| id.to_string()),
            visible: options.visible,
            locked: options.locked,
            color: options.color,
        });
        tracing::debug!("Created layer {}", id);
        Ok(&self.layers[self.layers.len() - 1])
    }

    /// 删除图层；默认图层受保护
    pub fn remove_layer(&mut self, id: &str) -> Result<Layer, SceneError> {
        if id == DEFAULT_LAYER_ID {
            return Err(SceneError::ProtectedLayer(id.to_string()));
        }
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| SceneError::LayerNotFound(id.to_string()))?;
        Ok(self.layers.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Layer, SceneError> {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| SceneError::LayerNotFound(id.to_string()))
    }

    pub fn set_visible(&mut self, id: &str, visible: bool) -> Result<(), SceneError> {
        self.get_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn set_locked(&mut self, id: &str, locked: bool) -> Result<(), SceneError> {
        self.get_mut(id)?.locked = locked;
        Ok(())
    }

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<(), SceneError> {
        self.get_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_color(&mut self, id: &str, color: impl Into<String>) -> Result<(), SceneError> {
        self.get_mut(id)?.color = color.into();
        Ok(())
    }

    /// 所有图层（创建顺序）
    pub fn all(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// 用快照中的图层整体替换；快照里的默认图层定义覆盖内置定义，缺失时补回
    pub fn load(&mut self, layers: Vec<Layer>) -> Result<(), SceneError> {
        let mut rebuilt: Vec<Layer> = Vec::with_capacity(layers.len() + 1);
        for layer in layers {
            if rebuilt.iter().any(|l| l.id == layer.id) {
                return Err(SceneError::DuplicateLayer(layer.id));
            }
            rebuilt.push(layer);
        }
        if !rebuilt.iter().any(|l| l.id == DEFAULT_LAYER_ID) {
            rebuilt.insert(0, Layer::default_layer());
        }
        self.layers = rebuilt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layer_exists_and_is_protected() {
        let mut layers = LayerManager::new();
        let default = layers.get(DEFAULT_LAYER_ID).unwrap();
        assert_eq!(default.name, "Default");
        assert_eq!(
            layers.remove_layer(DEFAULT_LAYER_ID),
            Err(SceneError::ProtectedLayer("default".to_string()))
        );
    }

    #[test]
    fn test_create_layer() {
        let mut layers = LayerManager::new();
        let layer = layers.create_layer("walls", LayerOptions::default()).unwrap();
        assert_eq!(layer.name, "walls");
        assert_eq!(layer.color, DEFAULT_LAYER_COLOR);

        assert!(matches!(
            layers.create_layer("walls", LayerOptions::named("Walls")),
            Err(SceneError::DuplicateLayer(_))
        ));
        assert_eq!(layers.len(), 2);
    }

    #[test]
    fn test_mutators_require_existing_layer() {
        let mut layers = LayerManager::new();
        layers.create_layer("a", LayerOptions::named("A")).unwrap();

        layers.set_visible("a", false).unwrap();
        layers.set_locked("a", true).unwrap();
        layers.rename("a", "Renamed").unwrap();
        layers.set_color("a", "#ff0000").unwrap();
        let a = layers.get("a").unwrap();
        assert!(!a.visible && a.locked && !a.is_editable());
        assert_eq!(a.name, "Renamed");

        for result in [
            layers.set_visible("nope", true),
            layers.set_locked("nope", true),
            layers.rename("nope", "x"),
            layers.set_color("nope", "#fff"),
        ] {
            assert!(matches!(result, Err(SceneError::LayerNotFound(_))));
        }
        assert!(matches!(layers.remove_layer("nope"), Err(SceneError::LayerNotFound(_))));
        assert!(layers.remove_layer("a").is_ok());
    }

    #[test]
    fn test_load_replaces_default_definition() {
        let mut layers = LayerManager::new();
        let custom_default = Layer {
            id: DEFAULT_LAYER_ID.to_string(),
            name: "Base".to_string(),
            visible: true,
            locked: true,
            color: "#123456".to_string(),
        };
        layers.load(vec![custom_default.clone()]).unwrap();
        assert_eq!(layers.get(DEFAULT_LAYER_ID), Some(&custom_default));

        layers.load(Vec::new()).unwrap();
        assert_eq!(layers.get(DEFAULT_LAYER_ID).unwrap().name, "Default");
    }
}
