//! 单位换算
//!
//! 内部长度单位为整数微米，显示单位为毫米。

use crate::error::GeometryError;

/// 每显示单位（毫米）对应的内部单位数
pub const UNIT_SCALE: f64 = 1000.0;

/// 近似相等容差（内部单位，10µm = 0.01mm）
pub const EPS: i64 = 10;

/// 显示单位 -> 内部整数单位（四舍五入）
pub fn to_internal(display: f64) -> Result<i64, GeometryError> {
    if !display.is_finite() {
        return Err(GeometryError::InvalidNumber(format!(
            "{display} is not a finite number"
        )));
    }
    let scaled = (display * UNIT_SCALE).round();
    if scaled.abs() >= i64::MAX as f64 {
        return Err(GeometryError::InvalidNumber(format!(
            "{display} is out of range"
        )));
    }
    Ok(scaled as i64)
}

/// 内部整数单位 -> 显示单位
pub fn to_external(value: i64) -> f64 {
    value as f64 / UNIT_SCALE
}

/// |a - b| <= eps
pub fn approx_equal(a: i64, b: i64, eps: i64) -> bool {
    a.abs_diff(b) <= eps.unsigned_abs()
}

pub fn clamp<T: PartialOrd>(value: T, lo: T, hi: T) -> T {
    if value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}
