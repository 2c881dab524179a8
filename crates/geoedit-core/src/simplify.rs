//! 线简化
//!
//! 四种策略，都保留首尾点：
//! - 间隔抽稀：每隔 n 个点保留一个
//! - 垂距抽稀：删除到前后两点连线距离不超过阈值的点，删除后回退重扫
//! - Douglas-Peucker：在最大偏离点处递归分割
//! - 概化（Generalize）：以最大偏离作为 epsilon 的 Douglas-Peucker，
//!   保证结果与原线的偏离不超过给定值
//!
//! 多部件几何逐部件简化，部件数量和顺序不变。多边形的环至少保留三个
//! 不重复的顶点，不足时按离现有顶点最远的顺序补回原顶点。

use crate::edit::{common_layer, Edit, OperationKind};
use crate::error::{ensure_positive, EngineError, Result};
use crate::feature::Feature;
use crate::geometry::{GeoPoint, Geometry, Part};
use crate::math::{distance_to_segment, Point2, EPSILON};
use serde::{Deserialize, Serialize};

/// 简化策略
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "value", rename_all = "snake_case")]
pub enum SimplifyMethod {
    /// 间隔抽稀，保留下标 0, n, 2n, … 以及末点
    Interval(usize),
    /// 垂距抽稀，参数为最大垂距
    PerpendicularDistance(f64),
    /// Douglas-Peucker，参数为 epsilon
    DouglasPeucker(f64),
    /// 概化，参数为最大偏离
    Generalize(f64),
}

impl SimplifyMethod {
    pub fn name(&self) -> &'static str {
        match self {
            SimplifyMethod::Interval(_) => "Interval",
            SimplifyMethod::PerpendicularDistance(_) => "PerpendicularDistance",
            SimplifyMethod::DouglasPeucker(_) => "DouglasPeucker",
            SimplifyMethod::Generalize(_) => "Generalize",
        }
    }

    /// 校验参数
    pub fn validate(&self) -> Result<()> {
        match *self {
            SimplifyMethod::Interval(n) => {
                if n == 0 {
                    return Err(EngineError::invalid_parameter("interval", "must be at least 1"));
                }
                Ok(())
            }
            SimplifyMethod::PerpendicularDistance(d) => ensure_positive("max_distance", d),
            SimplifyMethod::DouglasPeucker(e) => ensure_positive("epsilon", e),
            SimplifyMethod::Generalize(d) => ensure_positive("max_deviation", d),
        }
    }
}

/// 简化器
#[derive(Debug, Clone, Copy)]
pub struct Simplifier {
    method: SimplifyMethod,
}

impl Simplifier {
    pub fn new(method: SimplifyMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> SimplifyMethod {
        self.method
    }

    /// 简化有序点序列
    ///
    /// 少于两个点时原样返回。
    pub fn simplify_points(&self, points: &[GeoPoint]) -> Result<Vec<GeoPoint>> {
        self.method.validate()?;
        if points.len() < 2 {
            return Ok(points.to_vec());
        }
        let out = match self.method {
            SimplifyMethod::Interval(n) => interval_decimation(points, n),
            SimplifyMethod::PerpendicularDistance(d) => perpendicular_distance_decimation(points, d),
            SimplifyMethod::DouglasPeucker(e) | SimplifyMethod::Generalize(e) => douglas_peucker(points, e),
        };
        Ok(out)
    }

    /// 简化部件；`close_ring` 为真时按多边形的环处理，不会退化到三个顶点以下
    pub fn simplify_part(&self, part: &Part, close_ring: bool) -> Result<Part> {
        let points = self.simplify_points(part.points())?;
        if close_ring {
            Ok(Part::new(restore_ring(part.points(), points)))
        } else {
            Ok(Part::new(points))
        }
    }

    /// 简化几何，只接受多段线和多边形
    pub fn simplify_geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        match geometry {
            Geometry::Polyline(parts) => Ok(Geometry::Polyline(self.simplify_parts(parts, false)?)),
            Geometry::Polygon(parts) => Ok(Geometry::Polygon(self.simplify_parts(parts, true)?)),
            Geometry::Point(_) | Geometry::Multipoint(_) | Geometry::Envelope(_) => {
                Err(EngineError::UnsupportedGeometryKind(geometry.kind()))
            }
        }
    }

    fn simplify_parts(&self, parts: &[Part], close_ring: bool) -> Result<Vec<Part>> {
        parts.iter().map(|part| self.simplify_part(part, close_ring)).collect()
    }

    /// 简化要素集，标识保持不变
    pub fn simplify_features(&self, features: &[Feature]) -> Result<Edit> {
        self.method.validate()?;
        let layer = common_layer(features)?;
        let updated = features
            .iter()
            .map(|f| -> Result<Feature> { Ok(f.with_geometry(self.simplify_geometry(&f.geometry)?)) })
            .collect::<Result<Vec<_>>>()?;

        let before: usize = features.iter().map(|f| f.geometry.point_count()).sum();
        let after: usize = updated.iter().map(|f| f.geometry.point_count()).sum();
        tracing::debug!(
            "{} simplified {} features: {} -> {} points",
            self.method.name(),
            updated.len(),
            before,
            after
        );

        Ok(Edit::updated(OperationKind::Simplify, layer, updated))
    }
}

/// 间隔抽稀
fn interval_decimation(points: &[GeoPoint], n: usize) -> Vec<GeoPoint> {
    let last = points.len() - 1;
    let mut out: Vec<GeoPoint> = points.iter().step_by(n).copied().collect();
    if last % n != 0 {
        out.push(points[last]);
    }
    out
}

/// 垂距抽稀
///
/// 删除一个点后从它的前一个点重新检查，直到完整扫描一遍没有删除为止。
fn perpendicular_distance_decimation(points: &[GeoPoint], max_distance: f64) -> Vec<GeoPoint> {
    let mut out = points.to_vec();
    loop {
        let before = out.len();
        let mut i = 1;
        while i + 1 < out.len() {
            let d = distance_to_segment(&out[i].xy(), &out[i - 1].xy(), &out[i + 1].xy());
            if d <= max_distance {
                out.remove(i);
                if i > 1 {
                    i -= 1;
                }
            } else {
                i += 1;
            }
        }
        if out.len() == before {
            break;
        }
    }
    out
}

/// Douglas-Peucker
///
/// 用显式栈代替递归，避免长线上的深递归。
fn douglas_peucker(points: &[GeoPoint], epsilon: f64) -> Vec<GeoPoint> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }
        let a = points[first].xy();
        let b = points[last].xy();

        let mut index = first;
        let mut max_dist = -1.0;
        for (i, p) in points.iter().enumerate().take(last).skip(first + 1) {
            let d = distance_to_segment(&p.xy(), &a, &b);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }

        if max_dist > epsilon {
            keep[index] = true;
            stack.push((first, index));
            stack.push((index, last));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// 环的最少不重复顶点数
const MIN_RING_VERTICES: usize = 3;

/// 补回环上被删掉的顶点，直到不重复顶点达到三个或原环本身就不够
///
/// `simplified` 必须是 `original` 的子序列。
fn restore_ring(original: &[GeoPoint], simplified: Vec<GeoPoint>) -> Vec<GeoPoint> {
    if distinct_xy(simplified.iter()).len() >= MIN_RING_VERTICES {
        return simplified;
    }

    let mut keep = vec![false; original.len()];
    let mut cursor = 0;
    for p in &simplified {
        while cursor < original.len() && original[cursor] != *p {
            cursor += 1;
        }
        if cursor < original.len() {
            keep[cursor] = true;
            cursor += 1;
        }
    }

    loop {
        let anchors = distinct_xy(original.iter().zip(&keep).filter_map(|(p, k)| k.then_some(p)));
        if anchors.len() >= MIN_RING_VERTICES || anchors.is_empty() {
            break;
        }
        let farthest = original
            .iter()
            .enumerate()
            .filter(|(i, _)| !keep[*i])
            .map(|(i, p)| {
                let d = match anchors.as_slice() {
                    [a] => distance_to_segment(&p.xy(), a, a),
                    [a, b, ..] => distance_to_segment(&p.xy(), a, b),
                    [] => 0.0,
                };
                (i, d)
            })
            .filter(|(_, d)| *d > EPSILON)
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match farthest {
            Some((i, _)) => keep[i] = true,
            None => break,
        }
    }

    original
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// 前三个不重复的平面坐标
fn distinct_xy<'a>(points: impl Iterator<Item = &'a GeoPoint>) -> Vec<Point2> {
    let mut seen: Vec<Point2> = Vec::with_capacity(MIN_RING_VERTICES);
    for p in points {
        let xy = p.xy();
        if !seen.contains(&xy) {
            seen.push(xy);
            if seen.len() == MIN_RING_VERTICES {
                break;
            }
        }
    }
    seen
}
