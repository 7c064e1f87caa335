//! 对象捕捉系统
//!
//! 支持的捕捉类型（按优先级从高到低）：
//! - 交点 (Intersection)
//! - 端点 (Endpoint)
//! - 中点 (Midpoint)
//! - 圆心 (Center)
//! - 最近点 (Nearest)
//!
//! 先按类型优先级选择，同类型再取距离光标最近者。

use crate::entity::{Entity, EntityId};
use crate::geometry::{Arc, Circle, Geometry, Line, Point, Polyline};
use crate::ops;
use serde::{Deserialize, Serialize};

/// 默认最大捕捉距离（内部单位，0.5mm）
pub const DEFAULT_SNAP_DISTANCE: i64 = 500;

/// 捕捉类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SnapType {
    /// 交点捕捉
    Intersection,
    /// 端点捕捉
    Endpoint,
    /// 中点捕捉
    Midpoint,
    /// 圆心捕捉
    Center,
    /// 最近点捕捉
    Nearest,
}

impl SnapType {
    /// 获取捕捉类型的名称
    pub fn name(&self) -> &'static str {
        match self {
            SnapType::Intersection => "交点",
            SnapType::Endpoint => "端点",
            SnapType::Midpoint => "中点",
            SnapType::Center => "圆心",
            SnapType::Nearest => "最近点",
        }
    }

    /// 获取捕捉类型的快捷键
    pub fn shortcut(&self) -> &'static str {
        match self {
            SnapType::Intersection => "INT",
            SnapType::Endpoint => "END",
            SnapType::Midpoint => "MID",
            SnapType::Center => "CEN",
            SnapType::Nearest => "NEA",
        }
    }

    /// 优先级，数值越小越优先
    pub fn priority(&self) -> u8 {
        match self {
            SnapType::Intersection => 1,
            SnapType::Endpoint => 2,
            SnapType::Midpoint => 3,
            SnapType::Center => 4,
            SnapType::Nearest => 5,
        }
    }

    fn bit(&self) -> u8 {
        match self {
            SnapType::Intersection => SnapMask::INTERSECTION,
            SnapType::Endpoint => SnapMask::ENDPOINT,
            SnapType::Midpoint => SnapMask::MIDPOINT,
            SnapType::Center => SnapMask::CENTER,
            SnapType::Nearest => SnapMask::NEAREST,
        }
    }
}

/// 捕捉点
#[derive(Debug, Clone, PartialEq)]
pub struct SnapPoint {
    /// 捕捉到的坐标
    pub point: Point,
    /// 捕捉类型
    pub snap_type: SnapType,
    /// 关联的实体（交点涉及两个实体）
    pub sources: Vec<EntityId>,
    /// 到光标的距离
    pub distance: f64,
}

impl SnapPoint {
    pub fn new(point: Point, snap_type: SnapType, sources: Vec<EntityId>, cursor: &Point) -> Self {
        Self {
            point,
            snap_type,
            sources,
            distance: point.distance_f64(cursor),
        }
    }
}

/// 捕捉配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// 最大捕捉距离（内部单位）
    pub max_distance: i64,
    /// 启用的捕捉类型
    pub enabled_types: SnapMask,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_SNAP_DISTANCE,
            enabled_types: SnapMask::default(),
        }
    }
}

/// 捕捉掩码（位域，用于快速启用/禁用捕捉类型）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapMask {
    bits: u8,
}

impl SnapMask {
    pub const INTERSECTION: u8 = 1 << 0;
    pub const ENDPOINT: u8 = 1 << 1;
    pub const MIDPOINT: u8 = 1 << 2;
    pub const CENTER: u8 = 1 << 3;
    pub const NEAREST: u8 = 1 << 4;

    pub const NONE: SnapMask = SnapMask { bits: 0 };
    pub const ALL: SnapMask = SnapMask { bits: 0x1F };

    pub fn new(bits: u8) -> Self {
        Self { bits }
    }

    pub fn is_enabled(&self, snap_type: SnapType) -> bool {
        self.bits & snap_type.bit() != 0
    }

    pub fn set(&mut self, snap_type: SnapType, enabled: bool) {
        if enabled {
            self.bits |= snap_type.bit();
        } else {
            self.bits &= !snap_type.bit();
        }
    }

    pub fn toggle(&mut self, snap_type: SnapType) {
        let enabled = self.is_enabled(snap_type);
        self.set(snap_type, !enabled);
    }
}

impl Default for SnapMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// 捕捉引擎
#[derive(Debug, Clone, Default)]
pub struct SnapEngine {
    config: SnapConfig,
    /// 候选捕捉点缓冲
    candidates: Vec<SnapPoint>,
}

impl SnapEngine {
    pub fn new(config: SnapConfig) -> Self {
        Self {
            config,
            candidates: Vec::with_capacity(64),
        }
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SnapConfig {
        &mut self.config
    }

    /// 寻找最佳捕捉点，没有候选落在最大距离内时返回 `None`
    pub fn find_snap_point(&mut self, cursor: Point, entities: &[&Entity]) -> Option<SnapPoint> {
        self.candidates.clear();

        for entity in entities {
            self.collect_entity_snap_points(entity, cursor);
        }

        if self.enabled(SnapType::Intersection) {
            self.collect_intersection_points(entities, cursor);
        }

        let max = self.config.max_distance as f64;
        self.candidates
            .iter()
            .filter(|c| c.distance <= max)
            .min_by(|a, b| {
                a.snap_type
                    .priority()
                    .cmp(&b.snap_type.priority())
                    .then(a.distance.total_cmp(&b.distance))
            })
            .cloned()
    }

    fn enabled(&self, snap_type: SnapType) -> bool {
        self.config.enabled_types.is_enabled(snap_type)
    }

    fn push(&mut self, point: Point, snap_type: SnapType, id: EntityId, cursor: &Point) {
        if self.enabled(snap_type) {
            self.candidates
                .push(SnapPoint::new(point, snap_type, vec![id], cursor));
        }
    }

    /// 收集单个实体的捕捉点
    fn collect_entity_snap_points(&mut self, entity: &Entity, cursor: Point) {
        match &entity.geometry {
            Geometry::Point(p) => self.push(*p, SnapType::Endpoint, entity.id, &cursor),
            Geometry::Line(line) => self.collect_line_snap_points(line, entity.id, cursor),
            Geometry::Circle(circle) => self.collect_circle_snap_points(circle, entity.id, cursor),
            Geometry::Arc(arc) => self.collect_arc_snap_points(arc, entity.id, cursor),
            Geometry::Polyline(polyline) => {
                self.collect_polyline_snap_points(polyline, entity.id, cursor)
            }
        }
    }

    fn collect_line_snap_points(&mut self, line: &Line, id: EntityId, cursor: Point) {
        self.push(line.start(), SnapType::Endpoint, id, &cursor);
        self.push(line.end(), SnapType::Endpoint, id, &cursor);
        self.push(line.midpoint(), SnapType::Midpoint, id, &cursor);

        let nearest = ops::project_point_on_line(&cursor, line).point;
        self.push(nearest, SnapType::Nearest, id, &cursor);
    }

    fn collect_circle_snap_points(&mut self, circle: &Circle, id: EntityId, cursor: Point) {
        self.push(circle.center(), SnapType::Center, id, &cursor);
        self.push(circle.nearest_point(&cursor), SnapType::Nearest, id, &cursor);
    }

    fn collect_arc_snap_points(&mut self, arc: &Arc, id: EntityId, cursor: Point) {
        self.push(arc.start_point(), SnapType::Endpoint, id, &cursor);
        self.push(arc.end_point(), SnapType::Endpoint, id, &cursor);
        self.push(arc.midpoint(), SnapType::Midpoint, id, &cursor);
        self.push(arc.center(), SnapType::Center, id, &cursor);

        // 最近点必须落在弧上，否则退回到较近的端点
        let on_circle = arc.circle().nearest_point(&cursor);
        let c = arc.center();
        let angle = ((on_circle.y - c.y) as f64).atan2((on_circle.x - c.x) as f64);
        let nearest = if arc.contains_angle(angle) {
            on_circle
        } else if arc.start_point().distance_squared(&cursor)
            <= arc.end_point().distance_squared(&cursor)
        {
            arc.start_point()
        } else {
            arc.end_point()
        };
        self.push(nearest, SnapType::Nearest, id, &cursor);
    }

    fn collect_polyline_snap_points(&mut self, polyline: &Polyline, id: EntityId, cursor: Point) {
        for p in polyline.points() {
            self.push(*p, SnapType::Endpoint, id, &cursor);
        }
        for (a, b) in polyline.segments() {
            // 零长度线段只贡献顶点
            let Ok(seg) = Line::new(a, b) else {
                continue;
            };
            self.push(seg.midpoint(), SnapType::Midpoint, id, &cursor);
            let nearest = ops::project_point_on_line(&cursor, &seg).point;
            self.push(nearest, SnapType::Nearest, id, &cursor);
        }
    }

    /// 收集交点
    fn collect_intersection_points(&mut self, entities: &[&Entity], cursor: Point) {
        // 双重循环检查所有实体对
        for i in 0..entities.len() {
            for j in (i + 1)..entities.len() {
                let (a, b) = (entities[i], entities[j]);
                for point in ops::find_intersections(&a.geometry, &b.geometry) {
                    self.candidates.push(SnapPoint::new(
                        point,
                        SnapType::Intersection,
                        vec![a.id, b.id],
                        &cursor,
                    ));
                }
            }
        }
    }
}

/// 使用默认掩码在给定距离内寻找最佳捕捉点
pub fn find_snap(cursor: Point, entities: &[&Entity], max_distance: i64) -> Option<SnapPoint> {
    SnapEngine::new(SnapConfig {
        max_distance,
        ..SnapConfig::default()
    })
    .find_snap_point(cursor, entities)
}
