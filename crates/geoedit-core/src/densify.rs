//! 加密
//!
//! 相邻两点的测地线距离超过最大段长时，沿测地线等距插入中间点。
//! 坐标是经纬度，所以使用椭球面距离而不是平面距离。

use crate::edit::{common_layer, Edit, OperationKind};
use crate::error::{ensure_positive, EngineError, Result};
use crate::feature::Feature;
use crate::geodesy::GeodesyProvider;
use crate::geometry::{GeoPoint, Geometry, Part};

/// 加密器
pub struct Densifier<'a> {
    geodesy: &'a dyn GeodesyProvider,
    /// 最大段长（米）
    max_segment_length: f64,
}

impl<'a> Densifier<'a> {
    pub fn new(geodesy: &'a dyn GeodesyProvider, max_segment_length: f64) -> Result<Self> {
        ensure_positive("max_segment_length", max_segment_length)?;
        Ok(Self {
            geodesy,
            max_segment_length,
        })
    }

    pub fn max_segment_length(&self) -> f64 {
        self.max_segment_length
    }

    /// 计算一条边需要插入的中间点（不含两个端点）
    fn segment_fill(&self, a: &GeoPoint, b: &GeoPoint) -> Result<Vec<GeoPoint>> {
        let d = self.geodesy.geodesic_distance(a, b)?;
        if d <= self.max_segment_length {
            return Ok(Vec::new());
        }
        let pieces = (d / self.max_segment_length).ceil() as usize;
        (1..pieces)
            .map(|k| {
                self.geodesy
                    .geodesic_interpolate(a, b, k as f64 / pieces as f64)
                    .map_err(EngineError::from)
            })
            .collect()
    }

    /// 加密有序点序列
    pub fn densify_points(&self, points: &[GeoPoint]) -> Result<Vec<GeoPoint>> {
        let Some(first) = points.first() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(points.len());
        out.push(*first);
        for pair in points.windows(2) {
            out.extend(self.segment_fill(&pair[0], &pair[1])?);
            out.push(pair[1]);
        }
        Ok(out)
    }

    /// 加密部件；`close_ring` 为真且环未显式闭合时，闭合边也一并加密
    pub fn densify_part(&self, part: &Part, close_ring: bool) -> Result<Part> {
        let mut points = self.densify_points(part.points())?;
        if close_ring && part.len() > 2 && !part.is_closed() {
            if let (Some(tail), Some(head)) = (part.tail(), part.head()) {
                points.extend(self.segment_fill(tail, head)?);
            }
        }
        Ok(Part::new(points))
    }

    /// 加密几何，只接受多段线和多边形
    pub fn densify_geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        match geometry {
            Geometry::Polyline(parts) => Ok(Geometry::Polyline(
                parts
                    .iter()
                    .map(|part| self.densify_part(part, false))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Geometry::Polygon(parts) => Ok(Geometry::Polygon(
                parts
                    .iter()
                    .map(|part| self.densify_part(part, true))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Geometry::Point(_) | Geometry::Multipoint(_) | Geometry::Envelope(_) => {
                Err(EngineError::UnsupportedGeometryKind(geometry.kind()))
            }
        }
    }

    /// 加密要素集，标识保持不变
    pub fn densify_features(&self, features: &[Feature]) -> Result<Edit> {
        let layer = common_layer(features)?;
        let mut updated = Vec::with_capacity(features.len());
        for feature in features {
            updated.push(feature.with_geometry(self.densify_geometry(&feature.geometry)?));
        }

        let before: usize = features.iter().map(|f| f.geometry.point_count()).sum();
        let after: usize = updated.iter().map(|f| f.geometry.point_count()).sum();
        tracing::debug!(
            "Densified {} features at {} m: {} -> {} points",
            updated.len(),
            self.max_segment_length,
            before,
            after
        );

        Ok(Edit::updated(OperationKind::Densify, layer, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::StandardGeodesy;
    use crate::geometry::GeometryKind;
    use crate::layer::LayerId;

    #[test]
    fn test_rejects_non_positive_length() {
        let geodesy = StandardGeodesy::new();
        for bad in [0.0, -5.0, f64::INFINITY] {
            assert!(matches!(
                Densifier::new(&geodesy, bad),
                Err(EngineError::InvalidParameter { name: "max_segment_length", .. })
            ));
        }
    }

    #[test]
    fn test_densify_equator_segment() {
        let geodesy = StandardGeodesy::new();
        // 赤道上一度约 111.3 km，按 30 km 切成 4 段
        let densifier = Densifier::new(&geodesy, 30_000.0).unwrap();
        let out = densifier
            .densify_points(&[GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0)])
            .unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], GeoPoint::new(0.0, 0.0));
        assert_eq!(out[4], GeoPoint::new(1.0, 0.0));
        for w in out.windows(2) {
            let d = geodesy.geodesic_distance(&w[0], &w[1]).unwrap();
            assert!(d <= 30_000.0 + 1e-6);
            assert!((d - 111_319.49 / 4.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_short_segments_untouched() {
        let geodesy = StandardGeodesy::new();
        let densifier = Densifier::new(&geodesy, 1_000_000.0).unwrap();
        let pts = Part::from_xy([(0.0, 0.0), (0.5, 0.5), (1.0, 0.0)]).into_points();
        assert_eq!(densifier.densify_points(&pts).unwrap(), pts);
    }

    #[test]
    fn test_polygon_closing_edge() {
        let geodesy = StandardGeodesy::new();
        let densifier = Densifier::new(&geodesy, 60_000.0).unwrap();
        // 三角形，未显式闭合；闭合边 (0,1)->(0,0) 约 110.6 km，需要插入一个点
        let polygon = Geometry::polygon([(0.0, 0.0), (0.1, 0.0), (0.0, 1.0)]);
        let out = densifier.densify_geometry(&polygon).unwrap();
        let ring = &out.parts().unwrap()[0];
        assert_eq!(ring.head(), Some(&GeoPoint::new(0.0, 0.0)));
        let last = ring.tail().unwrap();
        assert!(last.x.abs() < 1e-9);
        assert!((last.y - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_multipoint_rejected() {
        let geodesy = StandardGeodesy::new();
        let densifier = Densifier::new(&geodesy, 10.0).unwrap();
        let mp = Geometry::Multipoint(vec![GeoPoint::new(0.0, 0.0)]);
        assert!(matches!(
            densifier.densify_geometry(&mp),
            Err(EngineError::UnsupportedGeometryKind(GeometryKind::Multipoint))
        ));
    }

    #[test]
    fn test_densify_features_keeps_identity() {
        let geodesy = StandardGeodesy::new();
        let densifier = Densifier::new(&geodesy, 50_000.0).unwrap();
        let f = Feature::new(LayerId::new(), Geometry::polyline([(0.0, 0.0), (1.0, 0.0)]));
        let edit = densifier.densify_features(std::slice::from_ref(&f)).unwrap();
        assert_eq!(edit.updated[0].id, f.id);
        assert_eq!(edit.updated[0].geometry.point_count(), 4);
    }
}
