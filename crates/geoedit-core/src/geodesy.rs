//! 大地测量协作者
//!
//! 坐标转换和加密只通过 [`GeodesyProvider`] 访问椭球计算，不关心具体实现。
//! [`StandardGeodesy`] 是默认实现：
//! - 测地线距离与插值：`geo` 的 Karney 测地线算法
//! - WGS84 ↔ CGCS2000：经地心直角坐标在两个椭球之间换算
//! - WGS84 ↔ GCJ02：公开的加偏模型，反算用不动点迭代

use crate::crs::CoordinateSystem;
use crate::geometry::GeoPoint;
use crate::math::Vector3;
use geo::{Distance, Geodesic, InterpolatePoint};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

/// 加偏方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffsetDirection {
    /// WGS84 → GCJ02
    ToGcj02,
    /// GCJ02 → WGS84
    FromGcj02,
}

/// 大地测量错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeodesyError {
    #[error("Coordinate out of range: ({x}, {y})")]
    OutOfRange { x: f64, y: f64 },

    #[error("Unsupported projection: {from} -> {to}")]
    UnsupportedProjection {
        from: CoordinateSystem,
        to: CoordinateSystem,
    },

    #[error("Geodesic computation failed: {0}")]
    Computation(String),
}

/// 大地测量能力
///
/// 所有点都是经纬度（x 经度，y 纬度，单位度），z 为椭球高（米）。
pub trait GeodesyProvider: Send + Sync {
    /// 椭球间重投影（WGS84 ↔ CGCS2000）
    fn project_point(
        &self,
        point: &GeoPoint,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> Result<GeoPoint, GeodesyError>;

    /// 加偏/纠偏（WGS84 ↔ GCJ02）
    fn offset_point(&self, point: &GeoPoint, direction: OffsetDirection) -> Result<GeoPoint, GeodesyError>;

    /// 测地线距离（米）
    fn geodesic_distance(&self, a: &GeoPoint, b: &GeoPoint) -> Result<f64, GeodesyError>;

    /// 沿测地线按比例插值，`fraction` 取 0..=1
    fn geodesic_interpolate(
        &self,
        a: &GeoPoint,
        b: &GeoPoint,
        fraction: f64,
    ) -> Result<GeoPoint, GeodesyError>;
}

/// 椭球参数
#[derive(Debug, Clone, Copy)]
struct Ellipsoid {
    /// 长半轴（米）
    a: f64,
    /// 扁率
    f: f64,
}

impl Ellipsoid {
    const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    const CGCS2000: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };

    fn for_crs(crs: CoordinateSystem) -> Option<Ellipsoid> {
        match crs {
            CoordinateSystem::Wgs84 => Some(Self::WGS84),
            CoordinateSystem::Cgcs2000 => Some(Self::CGCS2000),
            CoordinateSystem::Gcj02 => None,
        }
    }

    /// 第一偏心率平方
    fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }

    /// 卯酉圈曲率半径
    fn prime_vertical_radius(&self, sin_lat: f64) -> f64 {
        self.a / (1.0 - self.e2() * sin_lat * sin_lat).sqrt()
    }

    /// 大地坐标 → 地心直角坐标
    fn to_ecef(&self, lon: f64, lat: f64, h: f64) -> Vector3 {
        let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
        let n = self.prime_vertical_radius(sin_lat);
        Vector3::new(
            (n + h) * cos_lat * cos_lon,
            (n + h) * cos_lat * sin_lon,
            (n * (1.0 - self.e2()) + h) * sin_lat,
        )
    }

    /// 地心直角坐标 → 大地坐标（经度, 纬度, 椭球高）
    fn from_ecef(&self, ecef: &Vector3) -> (f64, f64, f64) {
        let e2 = self.e2();
        let lon = ecef.y.atan2(ecef.x);
        let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();

        let mut lat = ecef.z.atan2(p * (1.0 - e2));
        for _ in 0..ECEF_ITERATIONS {
            let sin_lat = lat.sin();
            let n = self.prime_vertical_radius(sin_lat);
            lat = (ecef.z + e2 * n * sin_lat).atan2(p);
        }

        let (sin_lat, cos_lat) = lat.sin_cos();
        let h = p * cos_lat + ecef.z * sin_lat - self.a * (1.0 - e2 * sin_lat * sin_lat).sqrt();
        (lon.to_degrees(), lat.to_degrees(), h)
    }
}

const ECEF_ITERATIONS: usize = 8;

/// GCJ02 模型使用的克拉索夫斯基椭球参数
const GCJ_A: f64 = 6_378_245.0;
const GCJ_EE: f64 = 0.006_693_421_622_965_943_23;

/// 纠偏迭代收敛阈值（度）
const GCJ_INVERSE_TOLERANCE: f64 = 1e-12;
const GCJ_INVERSE_MAX_ITERATIONS: usize = 30;

/// 默认大地测量实现
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardGeodesy;

impl StandardGeodesy {
    pub fn new() -> Self {
        Self
    }

    fn check_range(point: &GeoPoint) -> Result<(), GeodesyError> {
        if !point.is_finite() || point.y.abs() > 90.0 {
            return Err(GeodesyError::OutOfRange {
                x: point.x,
                y: point.y,
            });
        }
        Ok(())
    }

    /// GCJ02 只在中国大陆范围内加偏
    fn out_of_china(lon: f64, lat: f64) -> bool {
        !(72.004..=137.8347).contains(&lon) || !(0.8293..=55.8271).contains(&lat)
    }

    fn offset_lat(x: f64, y: f64) -> f64 {
        let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
        ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
        ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
        ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
        ret
    }

    fn offset_lon(x: f64, y: f64) -> f64 {
        let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
        ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
        ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
        ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
        ret
    }

    /// WGS84 经纬度 → GCJ02 经纬度
    fn gcj_forward(lon: f64, lat: f64) -> (f64, f64) {
        if Self::out_of_china(lon, lat) {
            return (lon, lat);
        }
        let dlat = Self::offset_lat(lon - 105.0, lat - 35.0);
        let dlon = Self::offset_lon(lon - 105.0, lat - 35.0);
        let rad_lat = lat.to_radians();
        let magic = 1.0 - GCJ_EE * rad_lat.sin() * rad_lat.sin();
        let sqrt_magic = magic.sqrt();
        let dlat = (dlat * 180.0) / ((GCJ_A * (1.0 - GCJ_EE)) / (magic * sqrt_magic) * PI);
        let dlon = (dlon * 180.0) / (GCJ_A / sqrt_magic * rad_lat.cos() * PI);
        (lon + dlon, lat + dlat)
    }

    /// GCJ02 经纬度 → WGS84 经纬度
    ///
    /// 加偏函数没有解析逆，这里迭代修正直到正算结果回到输入点。
    fn gcj_inverse(lon: f64, lat: f64) -> (f64, f64) {
        let (mut wlon, mut wlat) = (lon, lat);
        for _ in 0..GCJ_INVERSE_MAX_ITERATIONS {
            let (glon, glat) = Self::gcj_forward(wlon, wlat);
            let (dlon, dlat) = (glon - lon, glat - lat);
            if dlon.abs() < GCJ_INVERSE_TOLERANCE && dlat.abs() < GCJ_INVERSE_TOLERANCE {
                break;
            }
            wlon -= dlon;
            wlat -= dlat;
        }
        (wlon, wlat)
    }
}

impl GeodesyProvider for StandardGeodesy {
    fn project_point(
        &self,
        point: &GeoPoint,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> Result<GeoPoint, GeodesyError> {
        Self::check_range(point)?;
        if from == to {
            return Ok(*point);
        }
        let (src, dst) = match (Ellipsoid::for_crs(from), Ellipsoid::for_crs(to)) {
            (Some(src), Some(dst)) => (src, dst),
            _ => return Err(GeodesyError::UnsupportedProjection { from, to }),
        };

        let ecef = src.to_ecef(point.x, point.y, point.z.unwrap_or(0.0));
        let (lon, lat, h) = dst.from_ecef(&ecef);
        Ok(GeoPoint {
            x: lon,
            y: lat,
            z: point.z.map(|_| h),
        })
    }

    fn offset_point(&self, point: &GeoPoint, direction: OffsetDirection) -> Result<GeoPoint, GeodesyError> {
        Self::check_range(point)?;
        let (lon, lat) = match direction {
            OffsetDirection::ToGcj02 => Self::gcj_forward(point.x, point.y),
            OffsetDirection::FromGcj02 => Self::gcj_inverse(point.x, point.y),
        };
        Ok(point.with_xy(lon, lat))
    }

    fn geodesic_distance(&self, a: &GeoPoint, b: &GeoPoint) -> Result<f64, GeodesyError> {
        Self::check_range(a)?;
        Self::check_range(b)?;
        let meters = Geodesic::distance(geo::Point::new(a.x, a.y), geo::Point::new(b.x, b.y));
        if meters.is_finite() {
            Ok(meters)
        } else {
            Err(GeodesyError::Computation(format!(
                "non-finite distance between ({}, {}) and ({}, {})",
                a.x, a.y, b.x, b.y
            )))
        }
    }

    fn geodesic_interpolate(
        &self,
        a: &GeoPoint,
        b: &GeoPoint,
        fraction: f64,
    ) -> Result<GeoPoint, GeodesyError> {
        Self::check_range(a)?;
        Self::check_range(b)?;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(GeodesyError::Computation(format!(
                "interpolation fraction {} outside [0, 1]",
                fraction
            )));
        }
        let p = Geodesic::point_at_ratio_between(
            geo::Point::new(a.x, a.y),
            geo::Point::new(b.x, b.y),
            fraction,
        );
        let z = a.z.zip(b.z).map(|(za, zb)| za + (zb - za) * fraction);
        Ok(GeoPoint { x: p.x(), y: p.y(), z })
    }
}
