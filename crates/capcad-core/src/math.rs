//! 数学基础类型
//!
//! 整数包围盒，以及浮点中间计算使用的 nalgebra 向量。

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// 浮点二维向量（仅用于中间计算，存储始终为整数）
pub type Vector2 = nalgebra::Vector2<f64>;

/// 角度参数比较容差（弧度）
pub const ANGLE_EPSILON: f64 = 1e-9;

/// 将角度归一化到 [0, 2π)
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid 在极小负数上可能返回 TAU
    if a >= TAU {
        0.0
    } else {
        a
    }
}

/// 内部整数坐标的轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox2 {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox2 {
    /// 由任意两个角点创建（自动规范化）
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// 由坐标范围创建
    pub fn from_coords(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// 单点退化包围盒
    pub fn from_point(p: Point) -> Self {
        Self { min: p, max: p }
    }

    /// 包含所有点的最小包围盒
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::from_point(first), |bbox, p| bbox.expanded_to(*p)))
    }

    /// 以中心和半边长创建
    pub fn around(center: Point, half: i64) -> Self {
        Self {
            min: Point::new(center.x.saturating_sub(half), center.y.saturating_sub(half)),
            max: Point::new(center.x.saturating_add(half), center.y.saturating_add(half)),
        }
    }

    pub fn expanded_to(self, p: Point) -> Self {
        Self {
            min: Point::new(self.min.x.min(p.x), self.min.y.min(p.y)),
            max: Point::new(self.max.x.max(p.x), self.max.y.max(p.y)),
        }
    }

    pub fn union(&self, other: &BoundingBox2) -> Self {
        self.expanded_to(other.min).expanded_to(other.max)
    }

    pub fn width(&self) -> i64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.min.x + self.width() / 2,
            self.min.y + self.height() / 2,
        )
    }

    /// 点是否在包围盒内（含边界）
    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// `other` 是否完全落在本包围盒内
    pub fn contains(&self, other: &BoundingBox2) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// 两个包围盒是否相交（含边界接触）
    pub fn intersects(&self, other: &BoundingBox2) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}
