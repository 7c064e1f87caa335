//! 几何运算
//!
//! 求交、投影、打断、修剪、延伸与测量。长度一律为内部单位；线段求交时
//! `eps` 同时用作平行判定阈值和参数区间 `[-eps, 1 + eps]` 的余量。

use crate::error::GeometryError;
use crate::geometry::{Arc, Circle, Geometry, Line, Point, Polyline};
use crate::math::{BoundingBox2, Vector2};
use crate::units::{self, EPS};

/// 线段包围盒
pub fn bbox_line(line: &Line) -> BoundingBox2 {
    line.bounding_box()
}

/// 两条直线的参数解 `(t, u)`，分别对应 `l1`、`l2` 上的参数；平行时返回 `None`
fn line_line_params(l1: &Line, l2: &Line, eps: i64) -> Option<(f64, f64)> {
    let (x1, y1) = (l1.start().x as f64, l1.start().y as f64);
    let (x3, y3) = (l2.start().x as f64, l2.start().y as f64);
    let d1 = l1.direction();
    let d2 = l2.direction();

    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() <= eps as f64 {
        return None;
    }

    let t = ((x3 - x1) * d2.y - (y3 - y1) * d2.x) / denom;
    let u = ((x3 - x1) * d1.y - (y3 - y1) * d1.x) / denom;
    Some((t, u))
}

fn within_segment(t: f64, eps: i64) -> bool {
    let eps = eps as f64;
    t >= -eps && t <= 1.0 + eps
}

/// 线段-线段交点
///
/// 行列式绝对值不超过 `eps` 视为平行。参数 `t`、`u` 都必须落在
/// `[-eps, 1 + eps]` 内，余量按参数计而不是按长度计，所以默认 `EPS`
/// 下延长线上相当远的交点也会被接受。两条线段最多一个交点。
pub fn intersect_line_line(l1: &Line, l2: &Line, eps: i64) -> Option<Point> {
    let (t, u) = line_line_params(l1, l2, eps)?;
    if !within_segment(t, eps) || !within_segment(u, eps) {
        return None;
    }
    Some(l1.point_at(t))
}

/// 线段-圆交点
///
/// 解 `a·t² + b·t + c = 0`。判别式小于 `-EPS` 无交点，绝对值不超过 `EPS`
/// 视为相切只返回一个点，否则返回两个根。参数必须落在 [0, 1]，
/// 结果按参数从小到大排列。
pub fn intersect_line_circle(line: &Line, circle: &Circle) -> Vec<Point> {
    let d = line.direction();
    let f = line.start().to_vector() - circle.center().to_vector();
    let r = circle.radius() as f64;
    let eps = EPS as f64;

    let a = d.norm_squared();
    let b = 2.0 * f.dot(&d);
    let c = f.norm_squared() - r * r;
    let disc = b * b - 4.0 * a * c;

    if disc < -eps {
        return Vec::new();
    }

    let on_segment = |t: &f64| (0.0..=1.0).contains(t);

    if disc.abs() <= eps {
        let t = -b / (2.0 * a);
        return if on_segment(&t) {
            vec![line.point_at(t)]
        } else {
            Vec::new()
        };
    }

    let root = disc.sqrt();
    [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)]
        .into_iter()
        .filter(on_segment)
        .map(|t| line.point_at(t))
        .collect()
}

/// 线段-圆弧交点（先求整圆交点，再按角度范围过滤）
pub fn intersect_line_arc(line: &Line, arc: &Arc) -> Vec<Point> {
    intersect_line_circle(line, &arc.circle())
        .into_iter()
        .filter(|p| on_arc(arc, p))
        .collect()
}

fn on_arc(arc: &Arc, p: &Point) -> bool {
    let c = arc.center();
    arc.contains_angle(((p.y - c.y) as f64).atan2((p.x - c.x) as f64))
}

/// 圆-圆交点
///
/// 相离、内含（不接触）或重合时无交点；相切返回一个点，相交返回两个点。
pub fn intersect_circle_circle(c1: &Circle, c2: &Circle) -> Vec<Point> {
    let (r0, r1) = (c1.radius() as f64, c2.radius() as f64);
    let delta = c2.center().to_vector() - c1.center().to_vector();
    let d = delta.norm();
    let eps = EPS as f64;

    if d > r0 + r1 + eps || d < (r0 - r1).abs() - eps {
        return Vec::new();
    }
    // 同心或重合
    if d == 0.0 || (d <= eps && (r0 - r1).abs() <= eps) {
        return Vec::new();
    }

    let a = (r0 * r0 - r1 * r1 + d * d) / (2.0 * d);
    let h = (r0 * r0 - a * a).max(0.0).sqrt();
    let mid = c1.center().to_vector() + delta * (a / d);

    if h <= eps {
        return vec![Point::from_vector(mid)];
    }

    let offset = Vector2::new(-delta.y, delta.x) * (h / d);
    vec![Point::from_vector(mid + offset), Point::from_vector(mid - offset)]
}

/// 点在线段上的正交投影
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub point: Point,
    /// 夹紧到 [0, 1] 的参数
    pub t: f64,
}

pub fn project_point_on_line(point: &Point, line: &Line) -> Projection {
    let d = line.direction();
    let len2 = d.norm_squared();
    if len2 == 0.0 {
        return Projection {
            point: line.start(),
            t: 0.0,
        };
    }
    let t = units::clamp(
        (point.to_vector() - line.start().to_vector()).dot(&d) / len2,
        0.0,
        1.0,
    );
    Projection {
        point: line.point_at(t),
        t,
    }
}

/// 打断结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSplit {
    /// 打断点与端点重合，原样返回
    Unchanged(Line),
    /// 按原始起点到终点的顺序排列的两段
    Parts(Line, Line),
}

/// 在指定点打断线段，不会产生零长度片段
pub fn split_line_at_point(line: &Line, point: &Point) -> LineSplit {
    if point.approx_eq(&line.start(), EPS) || point.approx_eq(&line.end(), EPS) {
        return LineSplit::Unchanged(*line);
    }
    match (Line::new(line.start(), *point), Line::new(*point, line.end())) {
        (Ok(first), Ok(second)) => LineSplit::Parts(first, second),
        _ => LineSplit::Unchanged(*line),
    }
}

/// 用切割线修剪目标线，保留含原始起点的一段
pub fn trim_line_with_line(target: &Line, cutter: &Line) -> Line {
    let Some(p) = intersect_line_line(target, cutter, EPS) else {
        return *target;
    };
    match split_line_at_point(target, &p) {
        LineSplit::Parts(kept, _) => kept,
        LineSplit::Unchanged(line) => line,
    }
}

/// 把目标线沿其无限延长线延伸到边界线段上
///
/// 找到交点时用交点替换终点；交点与起点重合会得到零长度线段，返回
/// `DegenerateGeometry`。
pub fn extend_line_to_line(target: &Line, boundary: &Line) -> Result<Line, GeometryError> {
    let Some((t, u)) = line_line_params(target, boundary, EPS) else {
        return Ok(*target);
    };
    if !within_segment(u, EPS) {
        return Ok(*target);
    }
    Line::new(target.start(), target.point_at(t))
}

/// 两点距离（显示单位）
pub fn measure_distance(p1: &Point, p2: &Point) -> f64 {
    units::to_external(p1.distance(p2))
}

/// 两条线之间的夹角（弧度，[0, π]）
pub fn measure_angle(l1: &Line, l2: &Line) -> f64 {
    let (d1, d2) = (l1.direction(), l2.direction());
    (d1.dot(&d2) / (d1.norm() * d2.norm())).clamp(-1.0, 1.0).acos()
}

/// 多段线的非退化线段
fn polyline_lines(polyline: &Polyline) -> Vec<Line> {
    polyline
        .segments()
        .filter_map(|(a, b)| Line::new(a, b).ok())
        .collect()
}

/// 两个几何体的全部交点（用于交点捕捉）
pub fn find_intersections(g1: &Geometry, g2: &Geometry) -> Vec<Point> {
    match (g1, g2) {
        (Geometry::Line(l1), Geometry::Line(l2)) => {
            intersect_line_line(l1, l2, EPS).into_iter().collect()
        }
        (Geometry::Line(line), Geometry::Circle(circle))
        | (Geometry::Circle(circle), Geometry::Line(line)) => {
            intersect_line_circle(line, circle)
        }
        (Geometry::Line(line), Geometry::Arc(arc)) | (Geometry::Arc(arc), Geometry::Line(line)) => {
            intersect_line_arc(line, arc)
        }
        (Geometry::Circle(c1), Geometry::Circle(c2)) => intersect_circle_circle(c1, c2),
        (Geometry::Circle(circle), Geometry::Arc(arc))
        | (Geometry::Arc(arc), Geometry::Circle(circle)) => {
            intersect_circle_circle(circle, &arc.circle())
                .into_iter()
                .filter(|p| on_arc(arc, p))
                .collect()
        }
        (Geometry::Arc(a1), Geometry::Arc(a2)) => intersect_circle_circle(&a1.circle(), &a2.circle())
            .into_iter()
            .filter(|p| on_arc(a1, p) && on_arc(a2, p))
            .collect(),
        (Geometry::Polyline(pl), _) => polyline_lines(pl)
            .iter()
            .flat_map(|seg| find_intersections(&Geometry::Line(*seg), g2))
            .collect(),
        (_, Geometry::Polyline(_)) => find_intersections(g2, g1),
        (Geometry::Point(_), _) | (_, Geometry::Point(_)) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn line(ax: i64, ay: i64, bx: i64, by: i64) -> Line {
        Line::new(Point::new(ax, ay), Point::new(bx, by)).unwrap()
    }

    fn circle(x: i64, y: i64, r: i64) -> Circle {
        Circle::new(Point::new(x, y), r).unwrap()
    }

    #[test]
    fn test_line_line_crossing() {
        let l1 = line(0, 0, 10_000, 10_000);
        let l2 = line(0, 10_000, 10_000, 0);
        assert_eq!(
            intersect_line_line(&l1, &l2, EPS),
            Some(Point::new(5_000, 5_000))
        );
    }

    #[test]
    fn test_line_line_parallel_and_disjoint() {
        let l1 = line(0, 0, 10_000, 0);
        let l2 = line(0, 1_000, 10_000, 1_000);
        assert_eq!(intersect_line_line(&l1, &l2, EPS), None);

        // 延长线相交，但参数超出 [-eps, 1 + eps]
        let l3 = line(200_000, -5_000, 200_000, 5_000);
        assert_eq!(intersect_line_line(&l1, &l3, EPS), None);
    }

    #[test]
    fn test_line_line_parameter_margin_is_not_scaled_by_length() {
        // t = 1.5 已经越过线段末端 5 mm，但仍在参数余量之内
        let l1 = line(0, 0, 10_000, 0);
        let l2 = line(15_000, -1_000, 15_000, 1_000);
        assert_eq!(
            intersect_line_line(&l1, &l2, EPS),
            Some(Point::new(15_000, 0))
        );

        // eps = 0 时退回严格的线段求交
        assert_eq!(intersect_line_line(&l1, &l2, 0), None);
    }

    #[test]
    fn test_line_line_touching_within_tolerance() {
        let l1 = line(0, 0, 10_000, 0);
        let l2 = line(10_005, -5_000, 10_005, 5_000);
        assert_eq!(
            intersect_line_line(&l1, &l2, EPS),
            Some(Point::new(10_005, 0))
        );
    }

    #[test]
    fn test_line_circle() {
        let c = circle(0, 0, 1_000);

        let through = line(-2_000, 0, 2_000, 0);
        let pts = intersect_line_circle(&through, &c);
        assert_eq!(pts, vec![Point::new(-1_000, 0), Point::new(1_000, 0)]);

        let tangent = line(-2_000, 1_000, 2_000, 1_000);
        assert_eq!(intersect_line_circle(&tangent, &c), vec![Point::new(0, 1_000)]);

        let miss = line(-2_000, 2_000, 2_000, 2_000);
        assert!(intersect_line_circle(&miss, &c).is_empty());

        // 线段起点在圆内，只有一个参数落在 [0,1]
        let inside = line(0, 0, 2_000, 0);
        assert_eq!(intersect_line_circle(&inside, &c), vec![Point::new(1_000, 0)]);
    }

    #[test]
    fn test_line_circle_tangency_uses_discriminant() {
        let c = circle(0, 0, 1_000);

        // 距圆心 995，判别式远大于 EPS，是两个交点而不是切点
        let near = line(-2_000, 995, 2_000, 995);
        assert_eq!(
            intersect_line_circle(&near, &c),
            vec![Point::new(-100, 995), Point::new(100, 995)]
        );

        // 距圆心 1005，判别式为负
        let outside = line(-2_000, 1_005, 2_000, 1_005);
        assert!(intersect_line_circle(&outside, &c).is_empty());
    }

    #[test]
    fn test_circle_circle_cases() {
        let c1 = circle(0, 0, 1_000);

        // 外切
        let tangent = intersect_circle_circle(&c1, &circle(2_000, 0, 1_000));
        assert_eq!(tangent, vec![Point::new(1_000, 0)]);

        // 相交
        let overlap = intersect_circle_circle(&c1, &circle(1_000, 0, 1_000));
        assert_eq!(overlap.len(), 2);
        assert!(overlap.contains(&Point::new(500, 866)));
        assert!(overlap.contains(&Point::new(500, -866)));

        // 相离、内含、重合
        assert!(intersect_circle_circle(&c1, &circle(5_000, 0, 1_000)).is_empty());
        assert!(intersect_circle_circle(&c1, &circle(100, 0, 200)).is_empty());
        assert!(intersect_circle_circle(&c1, &c1).is_empty());
    }

    #[test]
    fn test_line_arc_filters_by_angle() {
        let upper = Arc::new(Point::ORIGIN, 1_000, 0.0, PI, false).unwrap();
        let vertical = line(0, -2_000, 0, 2_000);
        assert_eq!(intersect_line_arc(&vertical, &upper), vec![Point::new(0, 1_000)]);
    }

    #[test]
    fn test_projection_clamps() {
        let l = line(0, 0, 10_000, 0);
        let mid = project_point_on_line(&Point::new(2_500, 700), &l);
        assert_eq!(mid.point, Point::new(2_500, 0));
        assert_eq!(mid.t, 0.25);

        let before = project_point_on_line(&Point::new(-500, 0), &l);
        assert_eq!(before.point, Point::new(0, 0));
        assert_eq!(before.t, 0.0);
    }

    #[test]
    fn test_split_never_creates_zero_length() {
        let l = line(0, 0, 10_000, 0);
        assert_eq!(
            split_line_at_point(&l, &Point::new(5, 0)),
            LineSplit::Unchanged(l)
        );
        assert_eq!(
            split_line_at_point(&l, &Point::new(4_000, 0)),
            LineSplit::Parts(line(0, 0, 4_000, 0), line(4_000, 0, 10_000, 0))
        );
    }

    #[test]
    fn test_trim_keeps_start_fragment() {
        let target = line(0, 0, 10_000, 0);
        let cutter = line(6_000, -1_000, 6_000, 1_000);
        assert_eq!(trim_line_with_line(&target, &cutter), line(0, 0, 6_000, 0));

        let far = line(200_000, -1_000, 200_000, 1_000);
        assert_eq!(trim_line_with_line(&target, &far), target);
    }

    #[test]
    fn test_extend_uses_infinite_target() {
        let target = line(0, 0, 5_000, 0);
        let boundary = line(8_000, -1_000, 8_000, 1_000);
        assert_eq!(
            extend_line_to_line(&target, &boundary).unwrap(),
            line(0, 0, 8_000, 0)
        );

        // 边界线段的参数 u = -20，超出余量
        let off = line(8_000, 1_000, 8_000, 1_050);
        assert_eq!(extend_line_to_line(&target, &off).unwrap(), target);

        let parallel = line(0, 1_000, 5_000, 1_000);
        assert_eq!(extend_line_to_line(&target, &parallel).unwrap(), target);
    }

    #[test]
    fn test_measure() {
        assert_eq!(measure_distance(&Point::ORIGIN, &Point::new(3_000, 4_000)), 5.0);
        let angle = measure_angle(&line(0, 0, 1_000, 0), &line(0, 0, 0, 1_000));
        assert!((angle - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_find_intersections_polyline() {
        let pl = crate::geometry::Polyline::new(vec![
            Point::new(0, 0),
            Point::new(10_000, 0),
            Point::new(10_000, 10_000),
        ])
        .unwrap();
        let cross = line(5_000, -1_000, 5_000, 1_000);
        let pts = find_intersections(&Geometry::Polyline(pl.clone()), &Geometry::Line(cross));
        assert_eq!(pts, vec![Point::new(5_000, 0)]);
        let swapped = find_intersections(&Geometry::Line(cross), &Geometry::Polyline(pl));
        assert_eq!(swapped, pts);
        assert!(find_intersections(&Geometry::Point(Point::ORIGIN), &Geometry::Line(cross)).is_empty());
    }
}
