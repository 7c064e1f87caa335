//! 二维仿射变换
//!
//! 2×3 矩阵 `[a, b, c, d, tx, ty]`：
//! `x' = a·x + c·y + tx`，`y' = b·x + d·y + ty`。

use crate::error::GeometryError;
use crate::geometry::{Arc, Circle, Geometry, Line, Point};
use crate::units;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// 奇异矩阵判定阈值
const SINGULAR_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// 平移（内部单位）
    pub fn translate(dx: i64, dy: i64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, dx as f64, dy as f64)
    }

    /// 平移（显示单位，毫米）
    pub fn translate_display(dx: f64, dy: f64) -> Result<Self, GeometryError> {
        Ok(Self::translate(
            units::to_internal(dx)?,
            units::to_internal(dy)?,
        ))
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn uniform_scale(s: f64) -> Self {
        Self::scale(s, s)
    }

    /// 绕原点逆时针旋转（弧度）
    pub fn rotate(theta: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    fn to_matrix(self) -> Matrix3<f64> {
        Matrix3::new(
            self.a, self.c, self.tx, //
            self.b, self.d, self.ty, //
            0.0, 0.0, 1.0,
        )
    }

    fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self::new(m[(0, 0)], m[(1, 0)], m[(0, 1)], m[(1, 1)], m[(0, 2)], m[(1, 2)])
    }

    /// 组合变换：先应用 `other`，再应用 `self`
    pub fn multiply(&self, other: &Transform2D) -> Self {
        Self::from_matrix(&(self.to_matrix() * other.to_matrix()))
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// 逆变换，`|det| < 1e-12` 时失败
    pub fn invert(&self) -> Result<Self, GeometryError> {
        let det = self.determinant();
        if det.abs() < SINGULAR_EPSILON {
            return Err(GeometryError::SingularMatrix(det));
        }
        self.to_matrix()
            .try_inverse()
            .map(|m| Self::from_matrix(&m))
            .ok_or(GeometryError::SingularMatrix(det))
    }

    /// 变换点并四舍五入到整数
    pub fn apply(&self, p: &Point) -> Point {
        let (x, y) = (p.x as f64, p.y as f64);
        Point::rounded(
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    /// 半径缩放系数 `sqrt(a² + b²)`，只在等比缩放下精确
    pub fn radius_scale(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }
}

impl Mul for Transform2D {
    type Output = Transform2D;

    fn mul(self, rhs: Transform2D) -> Transform2D {
        self.multiply(&rhs)
    }
}

pub fn transform_point(m: &Transform2D, p: &Point) -> Point {
    m.apply(p)
}

/// 变换几何体
///
/// 圆/圆弧的新半径按 `radius * sqrt(a² + b²)` 近似，非等比缩放或错切下
/// 不会得到椭圆。圆弧只变换圆心、缩放半径，起止角与方向保持原值，
/// 因此旋转或镜像后圆弧端点不跟随图形转动。
/// 多段线返回 `UnsupportedEntity`。
pub fn transform_geometry(m: &Transform2D, geometry: &Geometry) -> Result<Geometry, GeometryError> {
    match geometry {
        Geometry::Point(p) => Ok(Geometry::Point(m.apply(p))),
        Geometry::Line(l) => Ok(Geometry::Line(Line::new(
            m.apply(&l.start()),
            m.apply(&l.end()),
        )?)),
        Geometry::Circle(c) => Ok(Geometry::Circle(Circle::new(
            m.apply(&c.center()),
            scaled_radius(m, c.radius()),
        )?)),
        Geometry::Arc(arc) => Ok(Geometry::Arc(Arc::new(
            m.apply(&arc.center()),
            scaled_radius(m, arc.radius()),
            arc.start_angle(),
            arc.end_angle(),
            arc.clockwise(),
        )?)),
        Geometry::Polyline(_) => Err(GeometryError::UnsupportedEntity(format!(
            "cannot transform {}",
            geometry.kind()
        ))),
    }
}

fn scaled_radius(m: &Transform2D, radius: i64) -> i64 {
    (radius as f64 * m.radius_scale()).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn approx(m1: &Transform2D, m2: &Transform2D) -> bool {
        [
            m1.a - m2.a,
            m1.b - m2.b,
            m1.c - m2.c,
            m1.d - m2.d,
            m1.tx - m2.tx,
            m1.ty - m2.ty,
        ]
        .iter()
        .all(|d| d.abs() < 1e-6)
    }

    #[test]
    fn test_translate_and_rotate_point() {
        let t = Transform2D::translate_display(1.0, 2.0).unwrap();
        assert_eq!(t.apply(&Point::new(0, 0)), Point::new(1000, 2000));

        let r = Transform2D::rotate(FRAC_PI_2);
        assert_eq!(r.apply(&Point::new(1000, 0)), Point::new(0, 1000));
    }

    #[test]
    fn test_multiply_applies_right_first() {
        let t = Transform2D::translate(1000, 0);
        let r = Transform2D::rotate(FRAC_PI_2);
        // 先平移再旋转
        assert_eq!(r.multiply(&t).apply(&Point::ORIGIN), Point::new(0, 1000));
        // 先旋转再平移
        assert_eq!((t * r).apply(&Point::ORIGIN), Point::new(1000, 0));
    }

    #[test]
    fn test_singular_matrix() {
        let m = Transform2D::scale(0.0, 1.0);
        assert!(matches!(m.invert(), Err(GeometryError::SingularMatrix(_))));
    }

    #[test]
    fn test_transform_circle_scales_radius() {
        let circle = Geometry::Circle(Circle::new(Point::new(1000, 0), 500).unwrap());
        let out = transform_geometry(&Transform2D::uniform_scale(2.0), &circle).unwrap();
        assert_eq!(out, Geometry::Circle(Circle::new(Point::new(2000, 0), 1000).unwrap()));
    }

    #[test]
    fn test_non_uniform_scale_is_approximate() {
        // 半径只取 x 轴缩放系数，不是椭圆
        let circle = Geometry::Circle(Circle::new(Point::ORIGIN, 1000).unwrap());
        let out = transform_geometry(&Transform2D::scale(2.0, 5.0), &circle).unwrap();
        let Geometry::Circle(c) = out else {
            panic!("expected circle");
        };
        assert_eq!(c.radius(), 2000);
    }

    #[test]
    fn test_transform_arc_keeps_angles() {
        let arc = Geometry::Arc(Arc::new(Point::ORIGIN, 1000, 0.0, FRAC_PI_2, false).unwrap());
        let Geometry::Arc(out) = transform_geometry(&Transform2D::rotate(FRAC_PI_2), &arc).unwrap()
        else {
            panic!("expected arc");
        };
        assert!(out.start_angle().abs() < 1e-12);
        assert!((out.end_angle() - FRAC_PI_2).abs() < 1e-12);
        assert!(!out.clockwise());
        assert_eq!(out.start_point(), Point::new(1000, 0));

        // 镜像也不翻转方向
        let Geometry::Arc(mirrored) =
            transform_geometry(&Transform2D::scale(-1.0, 1.0), &arc).unwrap()
        else {
            panic!("expected arc");
        };
        assert!(!mirrored.clockwise());
        assert_eq!(mirrored.end_point(), Point::new(0, 1000));

        let Geometry::Arc(moved) =
            transform_geometry(&Transform2D::translate(5000, 0), &arc).unwrap()
        else {
            panic!("expected arc");
        };
        assert_eq!(moved.center(), Point::new(5000, 0));
        assert_eq!(moved.start_point(), Point::new(6000, 0));
    }

    #[test]
    fn test_polyline_unsupported() {
        let pl = Geometry::Polyline(
            crate::geometry::Polyline::new(vec![Point::ORIGIN, Point::new(1000, 0)]).unwrap(),
        );
        assert!(matches!(
            transform_geometry(&Transform2D::identity(), &pl),
            Err(GeometryError::UnsupportedEntity(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_invert_round_trips(
            theta in -PI..PI,
            s in 0.1f64..10.0,
            dx in -100_000i64..100_000,
            dy in -100_000i64..100_000,
        ) {
            let m = Transform2D::translate(dx, dy) * Transform2D::rotate(theta) * Transform2D::uniform_scale(s);
            let inv = m.invert().unwrap();
            prop_assert!(approx(&(m * inv), &Transform2D::identity()));
        }
    }
}
