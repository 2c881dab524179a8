//! 几何模型定义
//!
//! 支持的几何类型：
//! - 点 (Point)
//! - 多点 (Multipoint)
//! - 多段线 (Polyline)
//! - 多边形 (Polygon)
//! - 矩形范围 (Envelope)
//!
//! 几何是值类型，每次操作都产生新的几何，几何类型在值的生命周期内不变。

use crate::error::{EngineError, Result};
use crate::math::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 几何类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    Multipoint,
    Polyline,
    Polygon,
    Envelope,
}

impl GeometryKind {
    /// 类型名称
    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::Multipoint => "Multipoint",
            GeometryKind::Polyline => "Polyline",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::Envelope => "Envelope",
        }
    }

    /// 是否由部件组成（可以合并、拆分）
    pub fn is_part_bearing(&self) -> bool {
        matches!(
            self,
            GeometryKind::Multipoint | GeometryKind::Polyline | GeometryKind::Polygon
        )
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 坐标点，z 值可选
///
/// 坐标含义由所属几何的坐标系决定，地理坐标系下 x 为经度、y 为纬度。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// 平面坐标
    pub fn xy(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    /// 替换平面坐标，保留 z 值
    pub fn with_xy(&self, x: f64, y: f64) -> Self {
        Self { x, y, z: self.z }
    }

    /// 平面距离
    pub fn planar_distance(&self, other: &GeoPoint) -> f64 {
        (other.xy() - self.xy()).norm()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.map_or(true, f64::is_finite)
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// 部件：一条有序的顶点链（多段线的一段或多边形的一个环）
///
/// 顶点一旦加入部件就不可单独修改，只能整体生成新部件。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Part {
    points: Vec<GeoPoint>,
}

impl Part {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    /// 从平面坐标列表创建
    pub fn from_xy(coords: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self {
            points: coords.into_iter().map(GeoPoint::from).collect(),
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 首点
    pub fn head(&self) -> Option<&GeoPoint> {
        self.points.first()
    }

    /// 尾点
    pub fn tail(&self) -> Option<&GeoPoint> {
        self.points.last()
    }

    /// 首尾点重合（显式闭合的环）
    pub fn is_closed(&self) -> bool {
        match (self.head(), self.tail()) {
            (Some(h), Some(t)) => self.points.len() > 1 && h.x == t.x && h.y == t.y,
            _ => false,
        }
    }

    /// 作为多边形的环是否退化：不重复的平面顶点少于三个
    pub fn is_degenerate_ring(&self) -> bool {
        let mut seen: Vec<Point2> = Vec::with_capacity(3);
        for p in &self.points {
            let xy = p.xy();
            if !seen.contains(&xy) {
                seen.push(xy);
                if seen.len() == 3 {
                    return false;
                }
            }
        }
        true
    }

    /// 返回顶点顺序相反的新部件
    pub fn reversed(&self) -> Part {
        let mut points = self.points.clone();
        points.reverse();
        Part { points }
    }

    /// 逐点转换，任一点失败则整体失败
    pub fn try_map<E>(&self, f: impl FnMut(&GeoPoint) -> std::result::Result<GeoPoint, E>) -> std::result::Result<Part, E> {
        let points = self.points.iter().map(f).collect::<std::result::Result<Vec<_>, E>>()?;
        Ok(Part { points })
    }
}

impl From<Vec<GeoPoint>> for Part {
    fn from(points: Vec<GeoPoint>) -> Self {
        Self::new(points)
    }
}

/// 矩形范围
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Envelope {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin: xmin.min(xmax),
            ymin: ymin.min(ymax),
            xmax: xmin.max(xmax),
            ymax: ymin.max(ymax),
        }
    }
}

/// 多部件几何
///
/// 点/多点中的点无序；多段线/多边形的部件有序，合并、拆分、连接都依赖部件顺序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(GeoPoint),
    Multipoint(Vec<GeoPoint>),
    Polyline(Vec<Part>),
    Polygon(Vec<Part>),
    Envelope(Envelope),
}

impl Geometry {
    /// 单部件多段线
    pub fn polyline(coords: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Geometry::Polyline(vec![Part::from_xy(coords)])
    }

    /// 单环多边形
    pub fn polygon(coords: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Geometry::Polygon(vec![Part::from_xy(coords)])
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Multipoint(_) => GeometryKind::Multipoint,
            Geometry::Polyline(_) => GeometryKind::Polyline,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::Envelope(_) => GeometryKind::Envelope,
        }
    }

    /// 多段线/多边形的部件
    pub fn parts(&self) -> Option<&[Part]> {
        match self {
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => Some(parts),
            _ => None,
        }
    }

    /// 部件数量（多点中每个点计为一个部件）
    pub fn part_count(&self) -> usize {
        match self {
            Geometry::Point(_) | Geometry::Envelope(_) => 1,
            Geometry::Multipoint(points) => points.len(),
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => parts.len(),
        }
    }

    /// 顶点总数
    pub fn point_count(&self) -> usize {
        match self {
            Geometry::Point(_) => 1,
            Geometry::Multipoint(points) => points.len(),
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => {
                parts.iter().map(Part::len).sum()
            }
            Geometry::Envelope(_) => 4,
        }
    }

    /// 是否含有零长度部件（仅作为编辑中的临时状态合法）
    pub fn has_empty_part(&self) -> bool {
        match self {
            Geometry::Multipoint(points) => points.is_empty(),
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => {
                parts.is_empty() || parts.iter().any(Part::is_empty)
            }
            Geometry::Point(_) | Geometry::Envelope(_) => false,
        }
    }

    /// 拆成部件列表，多点的每个点成为单点部件
    pub fn to_parts(&self) -> Result<Vec<Part>> {
        match self {
            Geometry::Multipoint(points) => {
                Ok(points.iter().map(|p| Part::new(vec![*p])).collect())
            }
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => Ok(parts.clone()),
            Geometry::Point(_) | Geometry::Envelope(_) => {
                Err(EngineError::UnsupportedGeometryKind(self.kind()))
            }
        }
    }

    /// 由部件列表组装指定类型的几何
    pub fn from_parts(kind: GeometryKind, parts: Vec<Part>) -> Result<Geometry> {
        match kind {
            GeometryKind::Multipoint => Ok(Geometry::Multipoint(
                parts.into_iter().flat_map(Part::into_points).collect(),
            )),
            GeometryKind::Polyline => Ok(Geometry::Polyline(parts)),
            GeometryKind::Polygon => Ok(Geometry::Polygon(parts)),
            GeometryKind::Point | GeometryKind::Envelope => {
                Err(EngineError::UnsupportedGeometryKind(kind))
            }
        }
    }

    /// 反转每个部件的顶点顺序，部件顺序不变
    ///
    /// 点、多点和范围没有方向，返回 `UnsupportedGeometryKind`。
    pub fn reversed(&self) -> Result<Geometry> {
        match self {
            Geometry::Polyline(parts) => Ok(Geometry::Polyline(parts.iter().map(Part::reversed).collect())),
            Geometry::Polygon(parts) => Ok(Geometry::Polygon(parts.iter().map(Part::reversed).collect())),
            Geometry::Point(_) | Geometry::Multipoint(_) | Geometry::Envelope(_) => {
                Err(EngineError::UnsupportedGeometryKind(self.kind()))
            }
        }
    }
}
