//! 空间索引
//!
//! 固定尺寸的均匀网格（10mm 单元）。每个实体登记在其包围盒覆盖的所有单元中，
//! 并保留反向映射（实体 -> 单元），保证删除与更新精确对称。
//!
//! - `query_box`：包围盒级别的保守过滤，调用方需自行做精确测试
//!
//! 包围盒覆盖超过 [`MAX_ENTITY_CELLS`] 个单元的实体不进网格，单独放在
//! 超大集合里，查询时按包围盒逐个比较。
//! - `query_point`：不经过网格，逐个实体精确计算距离

use crate::entity::EntityId;
use crate::geometry::{Geometry, Point};
use crate::math::BoundingBox2;
use std::collections::{HashMap, HashSet};

/// 网格单元大小（内部单位，10mm）
pub const CELL_SIZE: i64 = 10_000;

/// 点查询的默认半径（内部单位，1mm）
pub const DEFAULT_QUERY_RADIUS: i64 = 1_000;

/// 单个实体最多登记的单元数
pub const MAX_ENTITY_CELLS: i64 = 4_096;

/// 网格坐标
pub type CellKey = (i64, i64);

/// 两个网格坐标之间（含两端）的单元数，溢出时饱和
fn cell_span(min: CellKey, max: CellKey) -> i64 {
    (max.0 - min.0 + 1).saturating_mul(max.1 - min.1 + 1)
}

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    /// 网格单元大小
    cell_size: i64,

    /// 网格映射：网格坐标 -> 实体集合
    grid: HashMap<CellKey, HashSet<EntityId>>,

    /// 反向映射：实体 -> 占用的网格单元（超大实体为空）
    entity_cells: HashMap<EntityId, Vec<CellKey>>,

    /// 不进网格的超大实体
    oversized: HashSet<EntityId>,

    /// 实体几何（点查询的精确测试）
    geometries: HashMap<EntityId, Geometry>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

impl SpatialIndex {
    /// 创建新的空间索引
    pub fn new(cell_size: i64) -> Self {
        Self {
            cell_size: cell_size.max(1),
            grid: HashMap::new(),
            entity_cells: HashMap::new(),
            oversized: HashSet::new(),
            geometries: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> i64 {
        self.cell_size
    }

    /// 将坐标转换为网格坐标（向下取整）
    fn to_grid_coord(&self, p: Point) -> CellKey {
        (p.x.div_euclid(self.cell_size), p.y.div_euclid(self.cell_size))
    }

    /// 获取包围盒覆盖的所有网格单元
    fn cells_for_bbox(&self, bbox: &BoundingBox2) -> Vec<CellKey> {
        let (min_gx, min_gy) = self.to_grid_coord(bbox.min);
        let (max_gx, max_gy) = self.to_grid_coord(bbox.max);

        let mut cells = Vec::new();
        for gx in min_gx..=max_gx {
            for gy in min_gy..=max_gy {
                cells.push((gx, gy));
            }
        }
        cells
    }

    fn is_oversized(&self, bbox: &BoundingBox2) -> bool {
        cell_span(self.to_grid_coord(bbox.min), self.to_grid_coord(bbox.max)) > MAX_ENTITY_CELLS
    }

    /// 几何应占用的网格单元，超大实体返回空
    pub fn expected_cells(&self, geometry: &Geometry) -> Vec<CellKey> {
        let bbox = geometry.bounding_box();
        if self.is_oversized(&bbox) {
            return Vec::new();
        }
        self.cells_for_bbox(&bbox)
    }

    /// 插入实体（已存在时先移除旧条目）
    pub fn insert(&mut self, id: EntityId, geometry: &Geometry) {
        self.remove(&id);

        if self.is_oversized(&geometry.bounding_box()) {
            self.oversized.insert(id);
        }
        let cells = self.expected_cells(geometry);
        for cell in &cells {
            self.grid.entry(*cell).or_default().insert(id);
        }
        self.entity_cells.insert(id, cells);
        self.geometries.insert(id, geometry.clone());
    }

    /// 移除实体
    pub fn remove(&mut self, id: &EntityId) -> bool {
        self.geometries.remove(id);
        self.oversized.remove(id);
        let Some(cells) = self.entity_cells.remove(id) else {
            return false;
        };
        for cell in cells {
            if let Some(ids) = self.grid.get_mut(&cell) {
                ids.remove(id);
                if ids.is_empty() {
                    self.grid.remove(&cell);
                }
            }
        }
        true
    }

    /// 更新实体几何
    pub fn update(&mut self, id: EntityId, geometry: &Geometry) {
        self.insert(id, geometry);
    }

    /// 范围查询：返回登记在与矩形相交的任一单元中的实体（按标识排序）
    pub fn query_box(&self, min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Vec<EntityId> {
        self.query_rect(&BoundingBox2::from_coords(min_x, min_y, max_x, max_y))
    }

    pub fn query_rect(&self, rect: &BoundingBox2) -> Vec<EntityId> {
        let (min_g, max_g) = (self.to_grid_coord(rect.min), self.to_grid_coord(rect.max));
        let span = cell_span(min_g, max_g);

        let mut seen: HashSet<EntityId> = self
            .oversized
            .iter()
            .filter(|id| {
                self.geometries
                    .get(*id)
                    .is_some_and(|g| g.bounding_box().intersects(rect))
            })
            .copied()
            .collect();

        // 查询范围大于已占用单元数时直接扫描占用单元
        if span < 0 || span as usize > self.grid.len() {
            for (cell, ids) in &self.grid {
                let inside = (min_g.0..=max_g.0).contains(&cell.0)
                    && (min_g.1..=max_g.1).contains(&cell.1);
                if inside {
                    seen.extend(ids.iter().copied());
                }
            }
        } else {
            for cell in self.cells_for_bbox(rect) {
                if let Some(ids) = self.grid.get(&cell) {
                    seen.extend(ids.iter().copied());
                }
            }
        }

        let mut result: Vec<EntityId> = seen.into_iter().collect();
        result.sort();
        result
    }

    /// 点查询：精确距离在 `radius` 内的实体（按标识排序）
    pub fn query_point(&self, point: &Point, radius: i64) -> Vec<EntityId> {
        let mut result: Vec<EntityId> = self
            .geometries
            .iter()
            .filter(|(_, g)| g.distance_to_point(point) <= radius as f64)
            .map(|(id, _)| *id)
            .collect();
        result.sort();
        result
    }

    /// 实体当前登记的单元
    pub fn cells_of(&self, id: &EntityId) -> Option<&[CellKey]> {
        self.entity_cells.get(id).map(Vec::as_slice)
    }

    pub fn is_oversized_entity(&self, id: &EntityId) -> bool {
        self.oversized.contains(id)
    }

    /// 单元内登记的实体数
    pub fn cell_population(&self, cell: &CellKey) -> usize {
        self.grid.get(cell).map_or(0, HashSet::len)
    }

    /// 清空索引
    pub fn clear(&mut self) {
        self.grid.clear();
        self.entity_cells.clear();
        self.oversized.clear();
        self.geometries.clear();
    }

    /// 获取实体数量
    pub fn len(&self) -> usize {
        self.entity_cells.len()
    }

    /// 检查是否为空
    pub fn is_empty(&self) -> bool {
        self.entity_cells.is_empty()
    }

    /// 已登记的实体标识
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.entity_cells.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Circle, Line};

    fn line(ax: i64, ay: i64, bx: i64, by: i64) -> Geometry {
        Line::new(Point::new(ax, ay), Point::new(bx, by))
            .unwrap()
            .into()
    }

    #[test]
    fn test_spatial_index() {
        let mut index = SpatialIndex::default();

        let id1 = EntityId::new(1);
        let id2 = EntityId::new(2);
        let id3 = EntityId::new(3);

        index.insert(id1, &line(0, 0, 5_000, 5_000));
        index.insert(id2, &line(10_000, 10_000, 15_000, 15_000));
        index.insert(id3, &line(100_000, 100_000, 105_000, 105_000));

        let result = index.query_box(0, 0, 20_000, 20_000);
        assert_eq!(result, vec![id1, id2]);
    }

    #[test]
    fn test_cells_follow_bbox() {
        let mut index = SpatialIndex::default();
        let id = EntityId::new(1);

        // 跨越 x 方向两个单元
        index.insert(id, &line(5_000, 1_000, 15_000, 1_000));
        assert_eq!(index.cells_of(&id).unwrap(), &[(0, 0), (1, 0)]);

        // 负坐标向下取整
        index.update(id, &Point::new(-1, -10_001).into());
        assert_eq!(index.cells_of(&id).unwrap(), &[(-1, -2)]);
        assert_eq!(index.cell_population(&(0, 0)), 0);
        assert_eq!(index.cell_population(&(1, 0)), 0);
    }

    #[test]
    fn test_remove_is_exact() {
        let mut index = SpatialIndex::default();
        let id = EntityId::new(1);
        index.insert(id, &Circle::new(Point::ORIGIN, 15_000).unwrap().into());
        assert_eq!(index.cells_of(&id).unwrap().len(), 16);

        assert!(index.remove(&id));
        assert!(!index.remove(&id));
        assert!(index.query_box(-20_000, -20_000, 20_000, 20_000).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_query_point_is_exact() {
        let mut index = SpatialIndex::default();
        let l = EntityId::new(1);
        let c = EntityId::new(2);
        index.insert(l, &line(0, 0, 10_000, 0));
        index.insert(c, &Circle::new(Point::new(0, 2_500), 2_000).unwrap().into());

        assert_eq!(index.query_point(&Point::new(5_000, 800), DEFAULT_QUERY_RADIUS), vec![l]);
        // 圆内部不算命中，只测到圆周的距离
        assert!(index.query_point(&Point::new(0, 2_500), DEFAULT_QUERY_RADIUS).is_empty());
        assert_eq!(index.query_point(&Point::new(0, 800), DEFAULT_QUERY_RADIUS), vec![l, c]);
    }

    #[test]
    fn test_huge_entity_skips_grid() {
        let mut index = SpatialIndex::default();
        let big = EntityId::new(1);
        let small = EntityId::new(2);
        // 约 4×10^10 个单元，不能逐个登记
        index.insert(big, &line(-1_000_000_000, -1_000_000_000, 1_000_000_000, 1_000_000_000));
        index.insert(small, &line(0, 0, 5_000, 0));

        assert!(index.is_oversized_entity(&big));
        assert_eq!(index.cells_of(&big).unwrap(), &[] as &[CellKey]);
        assert_eq!(index.cell_population(&(0, 0)), 1);

        assert_eq!(index.query_box(0, 0, 1_000, 1_000), vec![big, small]);
        assert!(index.query_box(2_000_000_000, 0, 2_000_001_000, 1_000).is_empty());

        // 更新为普通尺寸后回到网格
        index.update(big, &line(50_000, 0, 55_000, 0));
        assert!(!index.is_oversized_entity(&big));
        assert_eq!(index.cells_of(&big).unwrap(), &[(5, 0)]);

        assert!(index.remove(&big));
        assert_eq!(index.query_box(-10_000, -10_000, 100_000, 100_000), vec![small]);
    }

    #[test]
    fn test_huge_query_scans_occupied_cells() {
        let mut index = SpatialIndex::default();
        let id = EntityId::new(1);
        index.insert(id, &Point::new(123_456, -987_654).into());
        assert_eq!(index.query_box(i64::MIN / 2, i64::MIN / 2, i64::MAX / 2, i64::MAX / 2), vec![id]);
    }
}
