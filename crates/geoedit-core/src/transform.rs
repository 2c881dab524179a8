//! 坐标转换
//!
//! 所有转换都以 WGS84 为中转：`from -> WGS84 -> to`。
//! - WGS84 ↔ GCJ02：调用协作者的加偏/纠偏
//! - WGS84 ↔ CGCS2000：调用协作者的椭球重投影
//!
//! 源坐标系与目标坐标系相同时直接返回输入，不做任何计算。

use crate::crs::CoordinateSystem;
use crate::edit::{common_layer, Edit, OperationKind};
use crate::error::{EngineError, Result};
use crate::feature::Feature;
use crate::geodesy::{GeodesyProvider, OffsetDirection};
use crate::geometry::{GeoPoint, Geometry, Part};
use rayon::prelude::*;

/// 坐标转换器，构造时固定源/目标坐标系
pub struct CoordinateTransformer<'a> {
    from: CoordinateSystem,
    to: CoordinateSystem,
    geodesy: &'a dyn GeodesyProvider,
}

impl<'a> CoordinateTransformer<'a> {
    pub fn new(from: CoordinateSystem, to: CoordinateSystem, geodesy: &'a dyn GeodesyProvider) -> Self {
        Self { from, to, geodesy }
    }

    /// 由坐标系名称或 EPSG 编码创建
    pub fn from_codes(from: &str, to: &str, geodesy: &'a dyn GeodesyProvider) -> Result<Self> {
        Ok(Self::new(from.parse()?, to.parse()?, geodesy))
    }

    pub fn source(&self) -> CoordinateSystem {
        self.from
    }

    pub fn target(&self) -> CoordinateSystem {
        self.to
    }

    /// 是否为恒等转换
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// 转换单个点
    pub fn transform_point(&self, point: &GeoPoint) -> Result<GeoPoint> {
        if self.is_identity() {
            return Ok(*point);
        }
        let wgs84 = self.to_wgs84(point)?;
        self.from_wgs84(&wgs84)
    }

    fn to_wgs84(&self, point: &GeoPoint) -> Result<GeoPoint> {
        let p = match self.from {
            CoordinateSystem::Wgs84 => *point,
            CoordinateSystem::Gcj02 => self.geodesy.offset_point(point, OffsetDirection::FromGcj02)?,
            CoordinateSystem::Cgcs2000 => {
                self.geodesy
                    .project_point(point, CoordinateSystem::Cgcs2000, CoordinateSystem::Wgs84)?
            }
        };
        Ok(p)
    }

    fn from_wgs84(&self, point: &GeoPoint) -> Result<GeoPoint> {
        let p = match self.to {
            CoordinateSystem::Wgs84 => *point,
            CoordinateSystem::Gcj02 => self.geodesy.offset_point(point, OffsetDirection::ToGcj02)?,
            CoordinateSystem::Cgcs2000 => {
                self.geodesy
                    .project_point(point, CoordinateSystem::Wgs84, CoordinateSystem::Cgcs2000)?
            }
        };
        Ok(p)
    }

    fn transform_part(&self, part: &Part) -> Result<Part> {
        part.try_map(|p| self.transform_point(p))
    }

    /// 转换几何
    ///
    /// 几何类型、部件数量与顺序、部件内点序都保持不变；
    /// 任意一点转换失败则整个几何失败，不返回部分结果。
    pub fn transform_geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        match geometry {
            Geometry::Point(p) => Ok(Geometry::Point(self.transform_point(p)?)),
            Geometry::Multipoint(points) => Ok(Geometry::Multipoint(
                points
                    .iter()
                    .map(|p| self.transform_point(p))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Geometry::Polyline(parts) => Ok(Geometry::Polyline(
                parts.iter().map(|part| self.transform_part(part)).collect::<Result<Vec<_>>>()?,
            )),
            Geometry::Polygon(parts) => Ok(Geometry::Polygon(
                parts.iter().map(|part| self.transform_part(part)).collect::<Result<Vec<_>>>()?,
            )),
            // 范围经过非线性转换后不再是轴对齐矩形
            Geometry::Envelope(_) => Err(EngineError::UnsupportedGeometryKind(geometry.kind())),
        }
    }

    /// 批量转换要素，标识保持不变
    ///
    /// 要素之间互不依赖，并行处理；任一要素失败则整体失败。
    pub fn transform_features(&self, features: &[Feature]) -> Result<Edit> {
        let layer = common_layer(features)?;
        let updated = features
            .par_iter()
            .map(|f| -> Result<Feature> { Ok(f.with_geometry(self.transform_geometry(&f.geometry)?)) })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Transformed {} features from {} to {}",
            updated.len(),
            self.from,
            self.to
        );

        Ok(Edit::updated(OperationKind::Transform, layer, updated))
    }
}
