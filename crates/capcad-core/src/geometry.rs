//! 几何图元定义
//!
//! 支持的基本图元：
//! - 点 (Point)
//! - 线段 (Line)
//! - 圆 (Circle)
//! - 圆弧 (Arc)
//! - 多段线 (Polyline)
//!
//! 所有坐标均为整数微米。除 `Point` 外，图元只能通过可失败的构造函数创建，
//! 反序列化同样经过校验，因此持有的值总是合法的。

use crate::error::GeometryError;
use crate::math::{normalize_angle, BoundingBox2, Vector2, ANGLE_EPSILON};
use crate::units::{self, approx_equal, EPS};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;

/// 几何类型枚举（封闭的和类型）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "geometry", rename_all = "UPPERCASE")]
pub enum Geometry {
    Point(Point),
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Polyline(Polyline),
}

/// 几何类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GeometryKind {
    Point,
    Line,
    Circle,
    Arc,
    Polyline,
}

impl GeometryKind {
    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "POINT",
            GeometryKind::Line => "LINE",
            GeometryKind::Circle => "CIRCLE",
            GeometryKind::Arc => "ARC",
            GeometryKind::Polyline => "POLYLINE",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Geometry {
    /// 获取几何类型
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Line(_) => GeometryKind::Line,
            Geometry::Circle(_) => GeometryKind::Circle,
            Geometry::Arc(_) => GeometryKind::Arc,
            Geometry::Polyline(_) => GeometryKind::Polyline,
        }
    }

    /// 获取几何的包围盒
    ///
    /// 圆弧使用整圆包围盒，作为空间索引的保守过滤。
    pub fn bounding_box(&self) -> BoundingBox2 {
        match self {
            Geometry::Point(p) => p.bounding_box(),
            Geometry::Line(l) => l.bounding_box(),
            Geometry::Circle(c) => c.bounding_box(),
            Geometry::Arc(a) => a.bounding_box(),
            Geometry::Polyline(pl) => pl.bounding_box(),
        }
    }

    /// 点到几何的精确距离
    pub fn distance_to_point(&self, p: &Point) -> f64 {
        match self {
            Geometry::Point(q) => q.distance_f64(p),
            Geometry::Line(l) => l.distance_to_point(p),
            Geometry::Circle(c) => c.distance_to_point(p),
            Geometry::Arc(a) => a.distance_to_point(p),
            Geometry::Polyline(pl) => pl.distance_to_point(p),
        }
    }

    /// 精确命中测试（容差为内部单位）
    pub fn hit_test(&self, p: &Point, tolerance: i64) -> bool {
        let tol = tolerance as f64;
        match self {
            Geometry::Point(q) => {
                q.distance_squared(p) <= i128::from(tolerance) * i128::from(tolerance)
            }
            Geometry::Line(l) => l.distance_squared_to_point(p) <= tol * tol,
            Geometry::Circle(c) => c.distance_to_point(p) <= tol,
            Geometry::Arc(a) => a.distance_to_point(p) <= tol,
            Geometry::Polyline(pl) => pl
                .segments()
                .any(|(a, b)| segment_distance_squared(a, b, p) <= tol * tol),
        }
    }
}

impl From<Point> for Geometry {
    fn from(p: Point) -> Self {
        Geometry::Point(p)
    }
}

impl From<Line> for Geometry {
    fn from(l: Line) -> Self {
        Geometry::Line(l)
    }
}

impl From<Circle> for Geometry {
    fn from(c: Circle) -> Self {
        Geometry::Circle(c)
    }
}

impl From<Arc> for Geometry {
    fn from(a: Arc) -> Self {
        Geometry::Arc(a)
    }
}

impl From<Polyline> for Geometry {
    fn from(pl: Polyline) -> Self {
        Geometry::Polyline(pl)
    }
}

/// 点（整数微米）
///
/// 派生的 `Ord` 按 x、再按 y 比较，即线段端点规范化使用的字典序。
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// 从显示单位（毫米）创建，四舍五入到微米
    pub fn from_display(x: f64, y: f64) -> Result<Self, GeometryError> {
        Ok(Self::new(units::to_internal(x)?, units::to_internal(y)?))
    }

    /// 从内部单位创建，坐标必须已经是整数
    pub fn from_internal(x: f64, y: f64) -> Result<Self, GeometryError> {
        Ok(Self::new(integral(x)?, integral(y)?))
    }

    /// 转换为显示单位（毫米）
    pub fn to_display(&self) -> (f64, f64) {
        (units::to_external(self.x), units::to_external(self.y))
    }

    /// 两个坐标轴都在容差内
    pub fn approx_eq(&self, other: &Point, eps: i64) -> bool {
        approx_equal(self.x, other.x, eps) && approx_equal(self.y, other.y, eps)
    }

    /// 距离平方（精确整数）
    pub fn distance_squared(&self, other: &Point) -> i128 {
        let dx = i128::from(other.x) - i128::from(self.x);
        let dy = i128::from(other.y) - i128::from(self.y);
        dx * dx + dy * dy
    }

    pub fn distance_f64(&self, other: &Point) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    /// 距离（四舍五入到微米）
    pub fn distance(&self, other: &Point) -> i64 {
        self.distance_f64(other).round() as i64
    }

    pub fn to_vector(&self) -> Vector2 {
        Vector2::new(self.x as f64, self.y as f64)
    }

    /// 浮点坐标四舍五入为内部点
    pub(crate) fn rounded(x: f64, y: f64) -> Self {
        Self::new(x.round() as i64, y.round() as i64)
    }

    pub(crate) fn from_vector(v: Vector2) -> Self {
        Self::rounded(v.x, v.y)
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_point(*self)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

fn integral(v: f64) -> Result<i64, GeometryError> {
    if !v.is_finite() || v.fract() != 0.0 || v.abs() >= i64::MAX as f64 {
        return Err(GeometryError::InvalidNumber(format!(
            "internal coordinate {v} must be an integer"
        )));
    }
    Ok(v as i64)
}

/// 点到线段距离的平方；零长度线段退化为点距离
pub(crate) fn segment_distance_squared(a: Point, b: Point, p: &Point) -> f64 {
    let v = b.to_vector() - a.to_vector();
    let w = p.to_vector() - a.to_vector();
    let len2 = v.norm_squared();
    if len2 == 0.0 {
        return w.norm_squared();
    }
    let t = (w.dot(&v) / len2).clamp(0.0, 1.0);
    (w - v * t).norm_squared()
}

/// 线段
///
/// 端点按字典序规范化：`Line::new(a, b) == Line::new(b, a)`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LineRepr")]
pub struct Line {
    start: Point,
    end: Point,
}

#[derive(Deserialize)]
struct LineRepr {
    start: Point,
    end: Point,
}

impl TryFrom<LineRepr> for Line {
    type Error = GeometryError;

    fn try_from(repr: LineRepr) -> Result<Self, Self::Error> {
        Line::new(repr.start, repr.end)
    }
}

impl Line {
    /// 创建线段，端点在容差内重合时失败
    pub fn new(a: Point, b: Point) -> Result<Self, GeometryError> {
        if a.approx_eq(&b, EPS) {
            return Err(GeometryError::DegenerateGeometry(format!(
                "zero-length line {a} -> {b}"
            )));
        }
        let (start, end) = if a > b { (b, a) } else { (a, b) };
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn direction(&self) -> Vector2 {
        self.end.to_vector() - self.start.to_vector()
    }

    pub fn length(&self) -> f64 {
        self.start.distance_f64(&self.end)
    }

    pub fn midpoint(&self) -> Point {
        Point::rounded(
            (self.start.x as f64 + self.end.x as f64) / 2.0,
            (self.start.y as f64 + self.end.y as f64) / 2.0,
        )
    }

    /// 参数 t 处的点（t=0 为起点，t=1 为终点）
    pub fn point_at(&self, t: f64) -> Point {
        Point::from_vector(self.start.to_vector() + self.direction() * t)
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::new(self.start, self.end)
    }

    pub fn distance_squared_to_point(&self, p: &Point) -> f64 {
        segment_distance_squared(self.start, self.end, p)
    }

    pub fn distance_to_point(&self, p: &Point) -> f64 {
        self.distance_squared_to_point(p).sqrt()
    }
}

/// 圆
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CircleRepr")]
pub struct Circle {
    center: Point,
    radius: i64,
}

#[derive(Deserialize)]
struct CircleRepr {
    center: Point,
    radius: f64,
}

impl TryFrom<CircleRepr> for Circle {
    type Error = GeometryError;

    fn try_from(repr: CircleRepr) -> Result<Self, Self::Error> {
        Circle::from_internal(repr.center, repr.radius)
    }
}

impl Circle {
    /// 创建圆，半径必须大于 `EPS`
    pub fn new(center: Point, radius: i64) -> Result<Self, GeometryError> {
        if radius <= EPS {
            return Err(GeometryError::InvalidGeometry(format!(
                "circle radius {radius} must be greater than {EPS}"
            )));
        }
        Ok(Self { center, radius })
    }

    /// 从浮点半径创建，半径必须是整数
    pub fn from_internal(center: Point, radius: f64) -> Result<Self, GeometryError> {
        if !radius.is_finite() || radius.fract() != 0.0 || radius.abs() >= i64::MAX as f64 {
            return Err(GeometryError::InvalidGeometry(format!(
                "circle radius {radius} must be an integer"
            )));
        }
        Self::new(center, radius as i64)
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius(&self) -> i64 {
        self.radius
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::around(self.center, self.radius)
    }

    /// 点到圆周的距离
    pub fn distance_to_point(&self, p: &Point) -> f64 {
        (self.center.distance_f64(p) - self.radius as f64).abs()
    }

    /// 圆周上离 `p` 最近的点；`p` 位于圆心时取 0° 方向
    pub fn nearest_point(&self, p: &Point) -> Point {
        let d = p.to_vector() - self.center.to_vector();
        let norm = d.norm();
        if norm == 0.0 {
            return self.point_at_angle(0.0);
        }
        Point::from_vector(self.center.to_vector() + d * (self.radius as f64 / norm))
    }

    pub fn point_at_angle(&self, angle: f64) -> Point {
        Point::rounded(
            self.center.x as f64 + self.radius as f64 * angle.cos(),
            self.center.y as f64 + self.radius as f64 * angle.sin(),
        )
    }
}

/// 圆弧
///
/// 角度为弧度，归一化到 [0, 2π)。`clockwise` 为真时从起始角顺时针扫到终止角。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArcRepr", rename_all = "camelCase")]
pub struct Arc {
    center: Point,
    radius: i64,
    start_angle: f64,
    end_angle: f64,
    clockwise: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArcRepr {
    center: Point,
    radius: i64,
    start_angle: f64,
    end_angle: f64,
    #[serde(default)]
    clockwise: bool,
}

impl TryFrom<ArcRepr> for Arc {
    type Error = GeometryError;

    fn try_from(repr: ArcRepr) -> Result<Self, Self::Error> {
        Arc::new(
            repr.center,
            repr.radius,
            repr.start_angle,
            repr.end_angle,
            repr.clockwise,
        )
    }
}

impl Arc {
    pub fn new(
        center: Point,
        radius: i64,
        start_angle: f64,
        end_angle: f64,
        clockwise: bool,
    ) -> Result<Self, GeometryError> {
        if radius <= EPS {
            return Err(GeometryError::InvalidGeometry(format!(
                "arc radius {radius} must be greater than {EPS}"
            )));
        }
        if !start_angle.is_finite() || !end_angle.is_finite() {
            return Err(GeometryError::InvalidNumber(format!(
                "arc angles must be finite ({start_angle}, {end_angle})"
            )));
        }

        let start_angle = normalize_angle(start_angle);
        let end_angle = normalize_angle(end_angle);
        let gap = (start_angle - end_angle).abs();
        if gap < ANGLE_EPSILON || TAU - gap < ANGLE_EPSILON {
            return Err(GeometryError::DegenerateGeometry(format!(
                "arc start and end angles coincide ({start_angle})"
            )));
        }

        Ok(Self {
            center,
            radius,
            start_angle,
            end_angle,
            clockwise,
        })
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius(&self) -> i64 {
        self.radius
    }

    pub fn start_angle(&self) -> f64 {
        self.start_angle
    }

    pub fn end_angle(&self) -> f64 {
        self.end_angle
    }

    pub fn clockwise(&self) -> bool {
        self.clockwise
    }

    /// 扫过的角度，(0, 2π)
    pub fn sweep(&self) -> f64 {
        if self.clockwise {
            (self.start_angle - self.end_angle).rem_euclid(TAU)
        } else {
            (self.end_angle - self.start_angle).rem_euclid(TAU)
        }
    }

    /// 角度是否落在弧的扫掠范围内（含端点）
    pub fn contains_angle(&self, angle: f64) -> bool {
        let a = normalize_angle(angle);
        let offset = if self.clockwise {
            (self.start_angle - a).rem_euclid(TAU)
        } else {
            (a - self.start_angle).rem_euclid(TAU)
        };
        offset <= self.sweep() + ANGLE_EPSILON || TAU - offset < ANGLE_EPSILON
    }

    /// 所在的整圆
    pub fn circle(&self) -> Circle {
        Circle {
            center: self.center,
            radius: self.radius,
        }
    }

    pub fn point_at_angle(&self, angle: f64) -> Point {
        self.circle().point_at_angle(angle)
    }

    pub fn start_point(&self) -> Point {
        self.point_at_angle(self.start_angle)
    }

    pub fn end_point(&self) -> Point {
        self.point_at_angle(self.end_angle)
    }

    pub fn midpoint(&self) -> Point {
        let half = self.sweep() / 2.0;
        let angle = if self.clockwise {
            self.start_angle - half
        } else {
            self.start_angle + half
        };
        self.point_at_angle(angle)
    }

    /// 保守包围盒（整圆）
    pub fn bounding_box(&self) -> BoundingBox2 {
        self.circle().bounding_box()
    }

    pub fn distance_to_point(&self, p: &Point) -> f64 {
        let d = p.to_vector() - self.center.to_vector();
        if d.norm() > 0.0 && self.contains_angle(d.y.atan2(d.x)) {
            return (d.norm() - self.radius as f64).abs();
        }
        self.start_point()
            .distance_f64(p)
            .min(self.end_point().distance_f64(p))
    }
}

/// 多段线（至少两个顶点）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PolylineRepr")]
pub struct Polyline {
    points: Vec<Point>,
}

#[derive(Deserialize)]
struct PolylineRepr {
    points: Vec<Point>,
}

impl TryFrom<PolylineRepr> for Polyline {
    type Error = GeometryError;

    fn try_from(repr: PolylineRepr) -> Result<Self, Self::Error> {
        Polyline::new(repr.points)
    }
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Result<Self, GeometryError> {
        if points.len() < 2 {
            return Err(GeometryError::InvalidGeometry(format!(
                "polyline requires at least 2 points, got {}",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// 相邻顶点对
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }

    pub fn length(&self) -> f64 {
        self.segments().map(|(a, b)| a.distance_f64(&b)).sum()
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        // 构造保证至少两个点
        BoundingBox2::from_points(&self.points)
            .unwrap_or_else(|| BoundingBox2::from_point(Point::ORIGIN))
    }

    pub fn distance_to_point(&self, p: &Point) -> f64 {
        self.segments()
            .map(|(a, b)| segment_distance_squared(a, b, p))
            .fold(f64::INFINITY, f64::min)
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_point_constructors() {
        assert_eq!(Point::from_display(1.5, -2.0).unwrap(), Point::new(1500, -2000));
        assert_eq!(Point::from_internal(3.0, 4.0).unwrap(), Point::new(3, 4));
        assert!(matches!(
            Point::from_internal(3.5, 4.0),
            Err(GeometryError::InvalidNumber(_))
        ));
        assert!(Point::from_display(f64::NAN, 0.0).is_err());
        assert_eq!(Point::new(0, 0).distance(&Point::new(3000, 4000)), 5000);
    }

    #[test]
    fn test_line_canonical_order() {
        let a = Point::new(100, 0);
        let b = Point::new(0, 0);
        let line = Line::new(a, b).unwrap();
        assert_eq!(line.start(), b);
        assert_eq!(line.end(), a);

        // x 相同时按 y 排序
        let l = Line::new(Point::new(5, 100), Point::new(5, 1)).unwrap();
        assert_eq!(l.start(), Point::new(5, 1));
    }

    #[test]
    fn test_zero_length_line_rejected() {
        let p = Point::new(0, 0);
        assert!(matches!(
            Line::new(p, Point::new(10, -10)),
            Err(GeometryError::DegenerateGeometry(_))
        ));
        assert!(Line::new(p, Point::new(11, 0)).is_ok());
    }

    #[test]
    fn test_circle_radius_validation() {
        assert!(matches!(
            Circle::new(Point::ORIGIN, EPS),
            Err(GeometryError::InvalidGeometry(_))
        ));
        assert!(Circle::from_internal(Point::ORIGIN, 100.5).is_err());
        let c = Circle::new(Point::ORIGIN, 1000).unwrap();
        assert_eq!(c.bounding_box(), BoundingBox2::from_coords(-1000, -1000, 1000, 1000));
        assert_eq!(c.nearest_point(&Point::new(5000, 0)), Point::new(1000, 0));
    }

    #[test]
    fn test_arc_normalization_and_degeneracy() {
        let arc = Arc::new(Point::ORIGIN, 1000, -FRAC_PI_2, 3.0 * PI, false).unwrap();
        assert!((arc.start_angle() - 1.5 * PI).abs() < 1e-12);
        assert!((arc.end_angle() - PI).abs() < 1e-12);

        assert!(matches!(
            Arc::new(Point::ORIGIN, 1000, 0.0, TAU, false),
            Err(GeometryError::DegenerateGeometry(_))
        ));
        assert!(matches!(
            Arc::new(Point::ORIGIN, 5, 0.0, 1.0, false),
            Err(GeometryError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_arc_contains_angle_respects_direction() {
        let ccw = Arc::new(Point::ORIGIN, 1000, 0.0, FRAC_PI_2, false).unwrap();
        assert!(ccw.contains_angle(PI / 4.0));
        assert!(!ccw.contains_angle(PI));

        let cw = Arc::new(Point::ORIGIN, 1000, 0.0, FRAC_PI_2, true).unwrap();
        assert!(!cw.contains_angle(PI / 4.0));
        assert!(cw.contains_angle(PI));
        assert!((cw.sweep() - 1.5 * PI).abs() < 1e-12);
        assert_eq!(ccw.midpoint(), Point::new(707, 707));
    }

    #[test]
    fn test_polyline_requires_two_points() {
        assert!(Polyline::new(vec![Point::ORIGIN]).is_err());
        let pl = Polyline::new(vec![
            Point::new(0, 0),
            Point::new(1000, 0),
            Point::new(1000, 1000),
        ])
        .unwrap();
        assert_eq!(pl.segments().count(), 2);
        assert_eq!(pl.length(), 2000.0);
        assert_eq!(pl.distance_to_point(&Point::new(1500, 500)), 500.0);
    }

    #[test]
    fn test_hit_test() {
        let line: Geometry = Line::new(Point::new(0, 0), Point::new(10_000, 0)).unwrap().into();
        assert!(line.hit_test(&Point::new(5_000, 200), 200));
        assert!(!line.hit_test(&Point::new(5_000, 201), 200));

        let circle: Geometry = Circle::new(Point::ORIGIN, 1000).unwrap().into();
        assert!(circle.hit_test(&Point::new(0, 1150), 200));
        assert!(!circle.hit_test(&Point::ORIGIN, 200));
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"{"start":{"x":0,"y":0},"end":{"x":5,"y":0}}"#;
        assert!(serde_json::from_str::<Line>(bad).is_err());

        let reversed = r#"{"start":{"x":90,"y":0},"end":{"x":0,"y":0}}"#;
        let line: Line = serde_json::from_str(reversed).unwrap();
        assert_eq!(line.start(), Point::ORIGIN);

        let geom: Geometry = Geometry::Circle(Circle::new(Point::ORIGIN, 500).unwrap());
        let json = serde_json::to_string(&geom).unwrap();
        assert!(json.contains(r#""type":"CIRCLE""#));
        assert_eq!(serde_json::from_str::<Geometry>(&json).unwrap(), geom);
    }

    proptest! {
        #[test]
        fn prop_line_is_order_independent(
            ax in -1_000_000i64..1_000_000, ay in -1_000_000i64..1_000_000,
            bx in -1_000_000i64..1_000_000, by in -1_000_000i64..1_000_000,
        ) {
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            prop_assume!(!a.approx_eq(&b, EPS));
            prop_assert_eq!(Line::new(a, b).unwrap(), Line::new(b, a).unwrap());
        }
    }
}
