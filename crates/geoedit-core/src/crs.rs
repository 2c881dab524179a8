//! 坐标系标签
//!
//! 坐标系只作为转换的键，不携带可变状态。

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 支持的地理坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// WGS84 地理坐标系 (EPSG:4326)
    Wgs84,
    /// 国测局加偏坐标系 (GCJ-02)，没有 EPSG 编码
    Gcj02,
    /// 2000国家大地坐标系 (EPSG:4490)
    Cgcs2000,
}

impl CoordinateSystem {
    pub const ALL: [CoordinateSystem; 3] = [
        CoordinateSystem::Wgs84,
        CoordinateSystem::Gcj02,
        CoordinateSystem::Cgcs2000,
    ];

    /// EPSG 编码
    pub fn epsg(&self) -> Option<u32> {
        match self {
            CoordinateSystem::Wgs84 => Some(4326),
            CoordinateSystem::Gcj02 => None,
            CoordinateSystem::Cgcs2000 => Some(4490),
        }
    }

    /// 由 EPSG 编码查找
    pub fn from_epsg(code: u32) -> Result<Self, EngineError> {
        Self::ALL
            .into_iter()
            .find(|crs| crs.epsg() == Some(code))
            .ok_or_else(|| EngineError::UnsupportedCoordinateSystem(format!("EPSG:{}", code)))
    }

    /// 标识字符串
    pub fn identifier(&self) -> &'static str {
        match self {
            CoordinateSystem::Wgs84 => "WGS84",
            CoordinateSystem::Gcj02 => "GCJ02",
            CoordinateSystem::Cgcs2000 => "CGCS2000",
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for CoordinateSystem {
    type Err = EngineError;

    /// 接受名称（不区分大小写，忽略 `-`/`_`）或 `EPSG:xxxx`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_' && *c != ' ')
            .collect::<String>()
            .to_uppercase();

        if let Some(code) = normalized.strip_prefix("EPSG:") {
            let code = code
                .parse::<u32>()
                .map_err(|_| EngineError::UnsupportedCoordinateSystem(s.to_string()))?;
            return Self::from_epsg(code);
        }

        match normalized.as_str() {
            "WGS84" => Ok(CoordinateSystem::Wgs84),
            "GCJ02" => Ok(CoordinateSystem::Gcj02),
            "CGCS2000" => Ok(CoordinateSystem::Cgcs2000),
            _ => Err(EngineError::UnsupportedCoordinateSystem(s.to_string())),
        }
    }
}
