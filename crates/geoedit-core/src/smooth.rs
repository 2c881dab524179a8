//! 曲线平滑
//!
//! 对夹角小于阈值的内部顶点，在其两侧沿 Catmull-Rom 样条插入点，
//! 使线在拐角处变圆；原顶点位置不变。整个过程可重复多遍，
//! 每一遍作用在上一遍的结果上，之后可选地做一次概化控制点数。
//! 多边形的环按闭合处理，首点同样可以是拐角。

use crate::edit::{common_layer, Edit, OperationKind};
use crate::error::{ensure_positive, EngineError, Result};
use crate::feature::Feature;
use crate::geometry::{GeoPoint, Geometry, Part};
use crate::math::vertex_angle;
use crate::simplify::{SimplifyMethod, Simplifier};
use crate::store::FeatureStore;
use serde::{Deserialize, Serialize};

/// 平滑参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothParams {
    /// 每个拐角插入的点数
    pub points_per_segment: usize,
    /// 重复遍数
    pub level: usize,
    /// 夹角（度）达到该值视为已经平滑，不再处理
    pub min_smooth_angle: f64,
    /// 夹角（度）不超过该值视为折返，保持尖角
    pub reversal_angle: f64,
    /// 平滑后概化的最大偏离，`None` 表示不概化
    pub generalize: Option<f64>,
    /// 为真时原地更新要素，否则生成新要素、保留原要素
    pub replace_originals: bool,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            points_per_segment: 4,
            level: 2,
            min_smooth_angle: 160.0,
            reversal_angle: 1.0,
            generalize: None,
            replace_originals: true,
        }
    }
}

impl SmoothParams {
    pub fn validate(&self) -> Result<()> {
        if self.points_per_segment == 0 {
            return Err(EngineError::invalid_parameter("points_per_segment", "must be at least 1"));
        }
        if self.level == 0 {
            return Err(EngineError::invalid_parameter("level", "must be at least 1"));
        }
        if !(self.min_smooth_angle > 0.0 && self.min_smooth_angle <= 180.0) {
            return Err(EngineError::invalid_parameter(
                "min_smooth_angle",
                format!("must be in (0, 180], got {}", self.min_smooth_angle),
            ));
        }
        if !(self.reversal_angle >= 0.0 && self.reversal_angle < self.min_smooth_angle) {
            return Err(EngineError::invalid_parameter(
                "reversal_angle",
                format!(
                    "must be in [0, min_smooth_angle), got {}",
                    self.reversal_angle
                ),
            ));
        }
        if let Some(max_deviation) = self.generalize {
            ensure_positive("generalize", max_deviation)?;
        }
        Ok(())
    }
}

/// 平滑器
#[derive(Debug, Clone, Copy)]
pub struct Smoother {
    params: SmoothParams,
}

impl Smoother {
    pub fn new(params: SmoothParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SmoothParams {
        &self.params
    }

    /// 顶点是否需要平滑
    fn is_corner(&self, prev: &GeoPoint, vertex: &GeoPoint, next: &GeoPoint) -> bool {
        match vertex_angle(&prev.xy(), &vertex.xy(), &next.xy()) {
            Some(angle) => angle > self.params.reversal_angle && angle < self.params.min_smooth_angle,
            None => false,
        }
    }

    /// 单遍平滑
    ///
    /// `close_ring` 为真时把点序列看作隐式闭合的环：首点也参与拐角判断，
    /// 样条控制点首尾相接，尾点到首点的闭合边同样插值。
    fn smooth_pass(&self, points: &[GeoPoint], close_ring: bool) -> Vec<GeoPoint> {
        let n = points.len();
        if n < 3 {
            return points.to_vec();
        }

        let corners: Vec<bool> = (0..n)
            .map(|i| {
                if close_ring {
                    self.is_corner(&points[(i + n - 1) % n], &points[i], &points[(i + 1) % n])
                } else {
                    i > 0 && i + 1 < n && self.is_corner(&points[i - 1], &points[i], &points[i + 1])
                }
            })
            .collect();

        let k = self.params.points_per_segment;
        // 入边放 ceil(k/2) 个，出边放 floor(k/2) 个，都落在靠近拐角的半段内
        let incoming = k - k / 2;
        let outgoing = k / 2;
        let edges = if close_ring { n } else { n - 1 };

        let mut out = Vec::with_capacity(n + corners.iter().filter(|c| **c).count() * k);
        for i in 0..edges {
            let j = (i + 1) % n;
            out.push(points[i]);

            let mut ts = Vec::new();
            if corners[i] {
                ts.extend((1..=outgoing).map(|m| 0.5 * m as f64 / (outgoing + 1) as f64));
            }
            if corners[j] {
                ts.extend((1..=incoming).map(|m| 0.5 + 0.5 * m as f64 / (incoming + 1) as f64));
            }
            if ts.is_empty() {
                continue;
            }

            let (p0, p3) = if close_ring {
                (&points[(i + n - 1) % n], &points[(i + 2) % n])
            } else {
                (
                    if i > 0 { &points[i - 1] } else { &points[i] },
                    if i + 2 < n { &points[i + 2] } else { &points[j] },
                )
            };
            out.extend(ts.into_iter().map(|t| catmull_rom(p0, &points[i], &points[j], p3, t)));
        }
        if !close_ring {
            out.push(points[n - 1]);
        }
        out
    }

    /// 平滑有序点序列（开放的线）
    pub fn smooth_points(&self, points: &[GeoPoint]) -> Result<Vec<GeoPoint>> {
        Ok(self.smooth_part(&Part::new(points.to_vec()), false)?.into_points())
    }

    /// 平滑部件；`close_ring` 为真时按多边形的环处理
    ///
    /// 显式闭合的环先去掉重复的尾点，平滑后再补回。
    pub fn smooth_part(&self, part: &Part, close_ring: bool) -> Result<Part> {
        let explicit = close_ring && part.is_closed();
        let mut current = part.points().to_vec();
        if explicit {
            current.pop();
        }
        for _ in 0..self.params.level {
            current = self.smooth_pass(&current, close_ring);
        }
        if explicit {
            if let Some(head) = current.first().copied() {
                current.push(head);
            }
        }

        let smoothed = Part::new(current);
        match self.params.generalize {
            Some(max_deviation) => {
                Simplifier::new(SimplifyMethod::Generalize(max_deviation)).simplify_part(&smoothed, close_ring)
            }
            None => Ok(smoothed),
        }
    }

    fn smooth_parts(&self, parts: &[Part], close_ring: bool) -> Result<Vec<Part>> {
        parts.iter().map(|part| self.smooth_part(part, close_ring)).collect()
    }

    /// 平滑几何，只接受多段线和多边形
    pub fn smooth_geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        match geometry {
            Geometry::Polyline(parts) => Ok(Geometry::Polyline(self.smooth_parts(parts, false)?)),
            Geometry::Polygon(parts) => Ok(Geometry::Polygon(self.smooth_parts(parts, true)?)),
            Geometry::Point(_) | Geometry::Multipoint(_) | Geometry::Envelope(_) => {
                Err(EngineError::UnsupportedGeometryKind(geometry.kind()))
            }
        }
    }

    /// 平滑要素集
    ///
    /// 替换模式下保留标识；否则通过存储生成新要素，原要素不动，由调用方决定是否删除。
    pub fn smooth_features<S: FeatureStore + ?Sized>(&self, store: &S, features: &[Feature]) -> Result<Edit> {
        let layer = common_layer(features)?;
        let geometries = features
            .iter()
            .map(|f| self.smooth_geometry(&f.geometry))
            .collect::<Result<Vec<_>>>()?;

        let edit = if self.params.replace_originals {
            let updated = features
                .iter()
                .zip(geometries)
                .map(|(f, g)| f.with_geometry(g))
                .collect();
            Edit::updated(OperationKind::Smooth, layer, updated)
        } else {
            let mut added = Vec::with_capacity(features.len());
            for (f, g) in features.iter().zip(geometries) {
                added.push(store.create_feature(f.layer, g)?.with_attributes(f.attributes.clone()));
            }
            Edit::added(OperationKind::Smooth, layer, added)
        };

        tracing::debug!(
            "Smoothed {} features (level {}, {} points per corner)",
            features.len(),
            self.params.level,
            self.params.points_per_segment
        );
        Ok(edit)
    }
}

/// 均匀 Catmull-Rom 样条在 p1..p2 段上的插值，z 值线性插值
fn catmull_rom(p0: &GeoPoint, p1: &GeoPoint, p2: &GeoPoint, p3: &GeoPoint, t: f64) -> GeoPoint {
    let t2 = t * t;
    let t3 = t2 * t;
    let blend = |a: f64, b: f64, c: f64, d: f64| {
        0.5 * (2.0 * b + (-a + c) * t + (2.0 * a - 5.0 * b + 4.0 * c - d) * t2 + (-a + 3.0 * b - 3.0 * c + d) * t3)
    };
    GeoPoint {
        x: blend(p0.x, p1.x, p2.x, p3.x),
        y: blend(p0.y, p1.y, p2.y, p3.y),
        z: p1.z.zip(p2.z).map(|(z1, z2)| z1 + (z2 - z1) * t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryKind;
    use crate::layer::Layer;
    use crate::store::InMemoryFeatureStore;

    fn smoother(points_per_segment: usize, level: usize, min_smooth_angle: f64) -> Smoother {
        Smoother::new(SmoothParams {
            points_per_segment,
            level,
            min_smooth_angle,
            ..SmoothParams::default()
        })
        .unwrap()
    }

    #[test]
    fn test_straight_line_untouched() {
        let pts = Part::from_xy([(0.0, 0.0), (0.0, 10.0), (0.0, 20.0)]).into_points();
        let out = smoother(2, 1, 170.0).smooth_points(&pts).unwrap();
        assert_eq!(out, pts);
    }

    #[test]
    fn test_right_angle_gets_bracketed() {
        let pts = Part::from_xy([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]).into_points();
        let out = smoother(2, 1, 170.0).smooth_points(&pts).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[2], pts[1]);
        assert_eq!(out[4], pts[2]);
        // 入边上的点在拐角之前，出边上的点在拐角之后
        assert!(out[1].x > 5.0 && out[1].x < 10.0);
        assert!(out[3].y > 0.0 && out[3].y < 5.0);
        // 拐角处的夹角变钝
        let angle = vertex_angle(&out[1].xy(), &out[2].xy(), &out[3].xy()).unwrap();
        assert!(angle > 90.0);
    }

    #[test]
    fn test_reversal_preserved() {
        let pts = Part::from_xy([(0.0, 0.0), (10.0, 0.0), (0.0, 0.0)]).into_points();
        let out = smoother(2, 1, 170.0).smooth_points(&pts).unwrap();
        assert_eq!(out, pts);
    }

    #[test]
    fn test_levels_increase_density() {
        let pts = Part::from_xy([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)]).into_points();
        let one = smoother(2, 1, 170.0).smooth_points(&pts).unwrap();
        let three = smoother(2, 3, 170.0).smooth_points(&pts).unwrap();
        assert!(one.len() > pts.len());
        assert!(three.len() >= one.len());
        assert_eq!(three.first(), pts.first());
        assert_eq!(three.last(), pts.last());
    }

    #[test]
    fn test_generalize_bounds_growth() {
        let pts = Part::from_xy([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)]).into_points();
        let raw = smoother(6, 3, 175.0).smooth_points(&pts).unwrap();
        let generalized = Smoother::new(SmoothParams {
            points_per_segment: 6,
            level: 3,
            min_smooth_angle: 175.0,
            generalize: Some(0.5),
            ..SmoothParams::default()
        })
        .unwrap()
        .smooth_points(&pts)
        .unwrap();
        assert!(generalized.len() < raw.len());
    }

    #[test]
    fn test_invalid_params() {
        for params in [
            SmoothParams { points_per_segment: 0, ..SmoothParams::default() },
            SmoothParams { level: 0, ..SmoothParams::default() },
            SmoothParams { min_smooth_angle: 0.0, ..SmoothParams::default() },
            SmoothParams { min_smooth_angle: 200.0, ..SmoothParams::default() },
            SmoothParams { reversal_angle: 170.0, min_smooth_angle: 160.0, ..SmoothParams::default() },
            SmoothParams { generalize: Some(-1.0), ..SmoothParams::default() },
        ] {
            assert!(matches!(Smoother::new(params), Err(EngineError::InvalidParameter { .. })));
        }
    }

    #[test]
    fn test_point_rejected() {
        let s = smoother(2, 1, 170.0);
        assert!(matches!(
            s.smooth_geometry(&Geometry::Point(GeoPoint::new(0.0, 0.0))),
            Err(EngineError::UnsupportedGeometryKind(GeometryKind::Point))
        ));
    }

    #[test]
    fn test_smooth_features_modes() {
        let mut store = InMemoryFeatureStore::new();
        let layer = store.add_layer(Layer::new("trails", GeometryKind::Polyline));
        let f = Feature::new(layer, Geometry::polyline([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]))
            .with_attribute("name", "trail");

        let edit = smoother(2, 1, 170.0).smooth_features(&store, std::slice::from_ref(&f)).unwrap();
        assert_eq!(edit.updated.len(), 1);
        assert_eq!(edit.updated[0].id, f.id);

        let copy = Smoother::new(SmoothParams {
            points_per_segment: 2,
            level: 1,
            min_smooth_angle: 170.0,
            replace_originals: false,
            ..SmoothParams::default()
        })
        .unwrap()
        .smooth_features(&store, std::slice::from_ref(&f))
        .unwrap();
        assert!(copy.updated.is_empty() && copy.deleted.is_empty());
        assert_eq!(copy.added.len(), 1);
        assert_ne!(copy.added[0].id, f.id);
        assert_eq!(copy.added[0].attributes, f.attributes);
        assert_eq!(copy.added[0].geometry.point_count(), 5);
    }

    #[test]
    fn test_ring_rounds_every_corner() {
        let square = Geometry::polygon([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let out = smoother(2, 1, 170.0).smooth_geometry(&square).unwrap();
        let ring = out.parts().unwrap()[0].points();
        // 四个拐角各在两侧插入一个点
        assert_eq!(ring.len(), 4 + 4 * 2);
        assert_eq!(ring[0], GeoPoint::new(0.0, 0.0));
        for (i, corner) in square.parts().unwrap()[0].points().iter().enumerate() {
            assert_eq!(ring[i * 3], *corner);
        }
        // 首点两侧的插值点关于对角线对称
        let before_head = ring[11];
        let after_head = ring[1];
        assert!(before_head.x < 0.0 && before_head.y > 0.0 && before_head.y < 5.0);
        assert!((before_head.x - after_head.y).abs() < 1e-12);
        assert!((before_head.y - after_head.x).abs() < 1e-12);
    }

    #[test]
    fn test_closed_ring_stays_closed() {
        let square = Part::from_xy([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        let out = smoother(2, 1, 170.0).smooth_part(&square, true).unwrap();
        assert_eq!(out.len(), 4 + 4 * 2 + 1);
        assert!(out.is_closed());

        let open = smoother(2, 1, 170.0)
            .smooth_part(&Part::from_xy([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]), true)
            .unwrap();
        assert_eq!(&out.points()[..12], open.points());
    }

    #[test]
    fn test_ring_generalize_keeps_polygon() {
        let triangle = Geometry::polygon([(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
        let out = Smoother::new(SmoothParams {
            points_per_segment: 2,
            level: 1,
            generalize: Some(50.0),
            ..SmoothParams::default()
        })
        .unwrap()
        .smooth_geometry(&triangle)
        .unwrap();
        assert!(!out.parts().unwrap()[0].is_degenerate_ring());
    }
}
