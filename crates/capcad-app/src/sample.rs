//! 采样文本适配
//!
//! 把运动硬件输出的文本行换算成内部单位的 [`MachinePoint`]。
//! 支持 `"x,y"` 与 `"X:1.5,Y:2[,U:mm]"` 两种格式，后者可以逐行覆盖单位。

use capcad_command::capture::MachinePoint;
use serde::Deserialize;
use thiserror::Error;

/// 采样文本的坐标单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputUnit {
    #[default]
    Um,
    Mm,
    Cm,
    Inch,
}

impl InputUnit {
    /// 每单位对应的微米数
    pub fn scale(self) -> f64 {
        match self {
            Self::Um => 1.0,
            Self::Mm => 1_000.0,
            Self::Cm => 10_000.0,
            Self::Inch => 25_400.0,
        }
    }

    pub fn to_micrometers(self, value: f64) -> i64 {
        (value * self.scale()).round() as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Um => "um",
            Self::Mm => "mm",
            Self::Cm => "cm",
            Self::Inch => "inch",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "um" => Some(Self::Um),
            "mm" => Some(Self::Mm),
            "cm" => Some(Self::Cm),
            "inch" | "in" => Some(Self::Inch),
            _ => None,
        }
    }
}

/// 模拟采样源配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// 未带 `U:` 字段的采样所用单位
    pub input_unit: InputUnit,
}

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("Malformed sample: {0:?}")]
    Malformed(String),
    #[error("Invalid coordinate {0:?}")]
    InvalidNumber(String),
    #[error("Unknown unit {0:?}")]
    UnknownUnit(String),
}

fn keyed<'a>(field: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = field.split_once(':')?;
    k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
}

fn coordinate(text: &str) -> Result<f64, SampleError> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SampleError::InvalidNumber(text.to_string()))
}

/// 解析一行采样文本，坐标按单位换算为微米，所用单位记入 `meta["inputUnit"]`
pub fn parse_sample(text: &str, unit: InputUnit, t: i64) -> Result<MachinePoint, SampleError> {
    let fields: Vec<&str> = text.trim().split(',').map(str::trim).collect();
    if fields.len() < 2 {
        return Err(SampleError::Malformed(text.to_string()));
    }

    let (x, y, unit) = match (keyed(fields[0], "X"), keyed(fields[1], "Y")) {
        (Some(x), Some(y)) => {
            let unit = match fields.get(2).and_then(|f| keyed(f, "U").or_else(|| keyed(f, "UNIT"))) {
                Some(name) => InputUnit::from_name(name)
                    .ok_or_else(|| SampleError::UnknownUnit(name.to_string()))?,
                None => unit,
            };
            (coordinate(x)?, coordinate(y)?, unit)
        }
        _ => (coordinate(fields[0])?, coordinate(fields[1])?, unit),
    };

    let mut point = MachinePoint::new(unit.to_micrometers(x), unit.to_micrometers(y), t);
    point
        .meta
        .insert("inputUnit".to_string(), unit.name().to_string());
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pairs_in_default_unit() {
        let p = parse_sample("1.5, -2", InputUnit::Mm, 7).unwrap();
        assert_eq!((p.x, p.y, p.t), (1_500, -2_000, 7));
        assert_eq!(p.meta.get("inputUnit").map(String::as_str), Some("mm"));
    }

    #[test]
    fn unit_field_overrides_default() {
        let p = parse_sample("X:1,Y:2,U:inch", InputUnit::Um, 0).unwrap();
        assert_eq!((p.x, p.y), (25_400, 50_800));
        assert_eq!(p.meta.get("inputUnit").map(String::as_str), Some("inch"));

        assert_eq!(
            parse_sample("X:1,Y:2,U:furlong", InputUnit::Um, 0),
            Err(SampleError::UnknownUnit("furlong".to_string()))
        );
    }

    #[test]
    fn rejects_bad_samples() {
        assert!(matches!(
            parse_sample("garbage", InputUnit::Um, 0),
            Err(SampleError::Malformed(_))
        ));
        assert!(matches!(
            parse_sample("1,nan", InputUnit::Um, 0),
            Err(SampleError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_sample("X:a,Y:1", InputUnit::Um, 0),
            Err(SampleError::InvalidNumber(_))
        ));
    }
}
