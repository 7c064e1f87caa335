//! 硬件采集缓冲
//!
//! 高频采样不直接进入撤销历史：采样点先在 [`CaptureSession`] 中累积，
//! 只有显式提交时才生成一条 [`CommitCapture`] 命令。
//!
//! 其他线程上的采样源必须通过 [`capture_channel`] 把点交给编辑线程，
//! 再由 [`CaptureSession::pump`] 取出；会话本身不做任何内部同步。
//!
//! 会话只接收已经换算成内部单位的 [`MachinePoint`]，协议文本与单位的解析
//! 由采样源所在的适配层负责。

use crate::command::{Command, EditCommand};
use crate::error::CommandError;
use capcad_core::entity::{Entity, EntityId, EntityOptions};
use capcad_core::error::SceneError;
use capcad_core::geometry::{Geometry, Line, Point, Polyline};
use capcad_core::scene::Scene;
use capcad_core::units::EPS;
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// 预览环形缓冲的默认容量
pub const DEFAULT_PREVIEW_LIMIT: usize = 1000;

/// 采样点（内部单位）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachinePoint {
    pub x: i64,
    pub y: i64,
    /// 时间戳（毫秒）
    pub t: i64,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl MachinePoint {
    pub fn new(x: i64, y: i64, t: i64) -> Self {
        Self {
            x,
            y,
            t,
            meta: BTreeMap::new(),
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// 采集状态机：Idle → Capturing ⇄ Paused → Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
    Paused,
    Stopped,
}

/// 提交时生成的几何
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// 每对相邻点一条直线
    #[default]
    Segments,
    /// 整体一条多段线
    Polyline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// 预览环形缓冲容量
    pub preview_limit: usize,
    pub mode: CaptureMode,
    /// 提交的实体所在图层
    pub layer_id: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            mode: CaptureMode::default(),
            layer_id: capcad_core::layer::DEFAULT_LAYER_ID.to_string(),
        }
    }
}

/// 创建采样通道（发送端交给采样线程）
pub fn capture_channel() -> (Sender<MachinePoint>, Receiver<MachinePoint>) {
    channel::unbounded()
}

/// 采集会话
#[derive(Debug)]
pub struct CaptureSession {
    state: CaptureState,
    /// 完整采样
    points: Vec<MachinePoint>,
    /// 最近的采样（显示用）
    preview: VecDeque<MachinePoint>,
    config: CaptureConfig,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            state: CaptureState::Idle,
            points: Vec::new(),
            preview: VecDeque::new(),
            config,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// 开始采集（清空缓冲）。只在 Idle 或 Stopped 状态下生效
    pub fn start(&mut self) {
        if !matches!(self.state, CaptureState::Idle | CaptureState::Stopped) {
            return;
        }
        self.points.clear();
        self.preview.clear();
        self.state = CaptureState::Capturing;
        tracing::debug!("Capture started");
    }

    pub fn pause(&mut self) {
        if self.state == CaptureState::Capturing {
            self.state = CaptureState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == CaptureState::Paused {
            self.state = CaptureState::Capturing;
        }
    }

    pub fn stop(&mut self) {
        if self.state != CaptureState::Idle {
            self.state = CaptureState::Stopped;
            tracing::debug!("Capture stopped with {} points", self.points.len());
        }
    }

    /// 接收一个采样点，非采集状态下丢弃并返回 `false`
    pub fn ingest(&mut self, point: MachinePoint) -> bool {
        if self.state != CaptureState::Capturing {
            return false;
        }

        self.preview.push_back(point.clone());
        while self.preview.len() > self.config.preview_limit {
            self.preview.pop_front();
        }
        self.points.push(point);
        true
    }

    /// 取出通道中已到达的所有采样，返回被接收的数量
    pub fn pump(&mut self, receiver: &Receiver<MachinePoint>) -> usize {
        let mut accepted = 0;
        let mut discarded = 0;
        for point in receiver.try_iter() {
            if self.ingest(point) {
                accepted += 1;
            } else {
                discarded += 1;
            }
        }
        if discarded > 0 {
            tracing::warn!(
                "Discarded {} samples received while {:?}",
                discarded,
                self.state
            );
        }
        accepted
    }

    pub fn points(&self) -> &[MachinePoint] {
        &self.points
    }

    pub fn preview(&self) -> impl Iterator<Item = &MachinePoint> + '_ {
        self.preview.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 取走缓冲中的全部采样，生成一条提交命令
    pub fn commit(&mut self) -> EditCommand {
        let points: Vec<Point> = self.points.drain(..).map(|p| p.point()).collect();
        self.preview.clear();
        tracing::info!("Committing capture of {} points", points.len());
        EditCommand::CommitCapture(CommitCapture::new(
            points,
            self.config.mode,
            EntityOptions::on_layer(self.config.layer_id.clone()),
        ))
    }
}

/// 去掉 `EPS` 内的连续重复点
fn dedup_points(points: &[Point]) -> Vec<Point> {
    let mut result: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if result.last().map_or(true, |last| !last.approx_eq(p, EPS)) {
            result.push(*p);
        }
    }
    result
}

/// 把一次采集转换为几何实体的命令
#[derive(Debug, Clone)]
pub struct CommitCapture {
    points: Vec<Point>,
    mode: CaptureMode,
    options: EntityOptions,
    /// 执行后创建的实体
    created: Vec<Entity>,
}

impl CommitCapture {
    pub fn new(points: Vec<Point>, mode: CaptureMode, options: EntityOptions) -> Self {
        Self {
            points,
            mode,
            options,
            created: Vec::new(),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.created.iter().map(|e| e.id).collect()
    }

    pub(crate) fn fresh(&self) -> Self {
        Self::new(self.points.clone(), self.mode, self.options.clone())
    }

    /// 采样点对应的几何，重复点不会产生零长度线段
    pub fn geometries(&self) -> Vec<Geometry> {
        let points = dedup_points(&self.points);
        match self.mode {
            CaptureMode::Segments => points
                .windows(2)
                .filter_map(|pair| Line::new(pair[0], pair[1]).ok())
                .map(Geometry::Line)
                .collect(),
            CaptureMode::Polyline => Polyline::new(points)
                .map(|pl| vec![Geometry::Polyline(pl)])
                .unwrap_or_default(),
        }
    }

    fn remove_created(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        while let Some(entity) = self.created.pop() {
            if scene.remove(&entity.id).is_none() {
                return Err(SceneError::NotFound(entity.id).into());
            }
        }
        Ok(())
    }
}

impl Command for CommitCapture {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        if !self.created.is_empty() {
            for entity in &self.created {
                scene.restore(entity.clone())?;
            }
            return Ok(());
        }

        for geometry in self.geometries() {
            match scene.add(geometry, self.options.clone()) {
                Ok(id) => {
                    if let Some(entity) = scene.get(&id) {
                        self.created.push(entity.clone());
                    }
                }
                Err(err) => {
                    if let Err(undo_err) = self.remove_created(scene) {
                        tracing::error!("Failed to revert partial capture: {}", undo_err);
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    /// 任一实体缺失时写回已删除的部分，场景保持撤销前的状态
    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        for k in (0..self.created.len()).rev() {
            let id = self.created[k].id;
            if scene.remove(&id).is_none() {
                for entity in &self.created[k + 1..] {
                    if let Err(err) = scene.restore(entity.clone()) {
                        tracing::error!("Failed to restore {} during recovery: {}", entity.id, err);
                    }
                }
                return Err(SceneError::NotFound(id).into());
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Commit Capture"
    }
}
