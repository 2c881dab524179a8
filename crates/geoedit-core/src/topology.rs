//! 拓扑编辑
//!
//! 合并、拆分、连接、反转、复制。每个操作先检查全部前置条件再构造结果，
//! 结果以 [`Edit`] 返回，不直接写存储。改变要素数量的操作通过存储生成新标识。

use crate::edit::{Edit, OperationKind};
use crate::error::{EngineError, Result};
use crate::feature::Feature;
use crate::geometry::{GeoPoint, Geometry, GeometryKind, Part};
use crate::layer::{Layer, LayerId};
use crate::store::FeatureStore;
use serde::{Deserialize, Serialize};

/// 连接方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkMode {
    /// 自动选择端点距离最近的组合
    #[default]
    Auto,
    /// 首点接首点
    HeadToHead,
    /// 尾点接尾点
    TailToTail,
    /// 前一条的尾点接后一条的首点
    HeadToTail,
}

/// 两条线之间的端点组合，顺序即距离相同时的优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Junction {
    TailHead,
    TailTail,
    HeadHead,
    HeadTail,
}

impl Junction {
    const ALL: [Junction; 4] = [
        Junction::TailHead,
        Junction::TailTail,
        Junction::HeadHead,
        Junction::HeadTail,
    ];

    fn gap(&self, a: &[GeoPoint], b: &[GeoPoint]) -> f64 {
        let (p, q) = match self {
            Junction::TailHead => (a.last(), b.first()),
            Junction::TailTail => (a.last(), b.last()),
            Junction::HeadHead => (a.first(), b.first()),
            Junction::HeadTail => (a.first(), b.last()),
        };
        match (p, q) {
            (Some(p), Some(q)) => p.planar_distance(q),
            _ => f64::INFINITY,
        }
    }
}

/// 拓扑编辑器，作用于单个图层
pub struct TopologyEditor<'a, S: FeatureStore + ?Sized> {
    store: &'a S,
    layer: Layer,
    join_tolerance: f64,
}

impl<'a, S: FeatureStore + ?Sized> TopologyEditor<'a, S> {
    pub fn new(store: &'a S, layer: LayerId) -> Result<Self> {
        let layer = store.layer(layer)?.clone();
        Ok(Self {
            store,
            layer,
            join_tolerance: 0.0,
        })
    }

    /// 连接时两端点距离不超过该值视为同一点，只保留一个
    pub fn with_join_tolerance(mut self, tolerance: f64) -> Result<Self> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(EngineError::invalid_parameter(
                "join_tolerance",
                format!("must be a finite non-negative number, got {}", tolerance),
            ));
        }
        self.join_tolerance = tolerance;
        Ok(self)
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    fn ensure_on_layer(&self, features: &[Feature]) -> Result<()> {
        if let Some(stray) = features.iter().find(|f| f.layer != self.layer.id) {
            return Err(EngineError::PreconditionFailed(format!(
                "feature {} is not on layer {}",
                stray.id, self.layer.name
            )));
        }
        Ok(())
    }

    /// 图层必须由部件组成，且每个输入的几何类型与图层一致
    fn ensure_part_bearing(&self, features: &[Feature]) -> Result<()> {
        if !self.layer.kind.is_part_bearing() {
            return Err(EngineError::UnsupportedGeometryKind(self.layer.kind));
        }
        if let Some(f) = features.iter().find(|f| f.geometry.kind() != self.layer.kind) {
            return Err(EngineError::PreconditionFailed(format!(
                "feature {} is a {}, layer {} holds {}",
                f.id,
                f.geometry.kind(),
                self.layer.name,
                self.layer.kind
            )));
        }
        Ok(())
    }

    fn mint(&self, geometry: Geometry, template: &Feature) -> Result<Feature> {
        Ok(self
            .store
            .create_feature(self.layer.id, geometry)?
            .with_attributes(template.attributes.clone()))
    }

    /// 合并：所有部件按输入顺序拼成一个新要素，属性取第一个输入
    pub fn union(&self, features: &[Feature]) -> Result<Edit> {
        self.ensure_on_layer(features)?;
        self.ensure_part_bearing(features)?;
        let [first, _, ..] = features else {
            return Err(EngineError::PreconditionFailed(
                "union needs at least two features".to_string(),
            ));
        };

        let mut parts = Vec::new();
        for feature in features {
            parts.extend(feature.geometry.to_parts()?);
        }
        let part_count = parts.len();
        let merged = self.mint(Geometry::from_parts(self.layer.kind, parts)?, first)?;

        tracing::debug!(
            "Union of {} features into {} ({} parts)",
            features.len(),
            merged.id,
            part_count
        );
        Ok(Edit::replaced(
            OperationKind::Union,
            Some(self.layer.id),
            vec![merged],
            features.to_vec(),
        ))
    }

    /// 拆分：多部件要素按部件顺序拆成单部件要素，单部件要素不参与
    pub fn separate(&self, features: &[Feature]) -> Result<Edit> {
        self.ensure_on_layer(features)?;
        self.ensure_part_bearing(features)?;

        let mut added = Vec::new();
        let mut deleted = Vec::new();
        for feature in features.iter().filter(|f| f.geometry.part_count() > 1) {
            for part in feature.geometry.to_parts()? {
                added.push(self.mint(Geometry::from_parts(self.layer.kind, vec![part])?, feature)?);
            }
            deleted.push(feature.clone());
        }

        if deleted.is_empty() {
            tracing::debug!("Separate: none of {} features has more than one part", features.len());
        } else {
            tracing::debug!("Separated {} features into {}", deleted.len(), added.len());
        }
        Ok(Edit::replaced(OperationKind::Separate, Some(self.layer.id), added, deleted))
    }

    /// 连接多条单部件多段线为一条
    pub fn link(&self, features: &[Feature], mode: LinkMode, reverse: bool) -> Result<Edit> {
        self.ensure_on_layer(features)?;
        if self.layer.kind != GeometryKind::Polyline {
            return Err(EngineError::UnsupportedGeometryKind(self.layer.kind));
        }
        if features.len() < 2 {
            return Err(EngineError::PreconditionFailed(
                "link needs at least two features".to_string(),
            ));
        }
        let lines = features
            .iter()
            .map(|f| match &f.geometry {
                Geometry::Polyline(parts) if parts.len() == 1 && !parts[0].is_empty() => {
                    Ok(parts[0].points())
                }
                _ => Err(EngineError::PreconditionFailed(format!(
                    "feature {} is not a single-part polyline",
                    f.id
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let points = match (lines.as_slice(), mode) {
            ([a, b], _) => self.link_pair(a, b, mode, reverse),
            (_, LinkMode::HeadToHead | LinkMode::TailToTail) => {
                return Err(EngineError::PreconditionFailed(format!(
                    "{:?} only links two features, got {}",
                    mode,
                    lines.len()
                )));
            }
            (_, LinkMode::Auto | LinkMode::HeadToTail) => {
                let mut chain = lines[0].to_vec();
                for next in &lines[1..] {
                    self.append(&mut chain, next, reverse);
                }
                chain
            }
        };

        let linked = self.mint(Geometry::Polyline(vec![Part::new(points)]), &features[0])?;
        tracing::debug!(
            "Linked {} features ({:?}) into {} with {} points",
            features.len(),
            mode,
            linked.id,
            linked.geometry.point_count()
        );
        Ok(Edit::replaced(
            OperationKind::Link,
            Some(self.layer.id),
            vec![linked],
            features.to_vec(),
        ))
    }

    fn link_pair(&self, a: &[GeoPoint], b: &[GeoPoint], mode: LinkMode, reverse: bool) -> Vec<GeoPoint> {
        let junction = match mode {
            LinkMode::HeadToHead => Junction::HeadHead,
            LinkMode::TailToTail => Junction::TailTail,
            LinkMode::HeadToTail if reverse => Junction::TailTail,
            LinkMode::HeadToTail => Junction::TailHead,
            LinkMode::Auto => {
                let mut best = Junction::TailHead;
                let mut best_gap = best.gap(a, b);
                for junction in &Junction::ALL[1..] {
                    let gap = junction.gap(a, b);
                    if gap < best_gap {
                        best = *junction;
                        best_gap = gap;
                    }
                }
                best
            }
        };

        match junction {
            Junction::TailHead => self.joined(a, b, false, false),
            Junction::TailTail => self.joined(a, b, false, true),
            Junction::HeadHead => self.joined(a, b, true, false),
            // B 的尾点接 A 的首点：先 B 后 A
            Junction::HeadTail => self.joined(b, a, false, false),
        }
    }

    fn joined(&self, a: &[GeoPoint], b: &[GeoPoint], reverse_a: bool, reverse_b: bool) -> Vec<GeoPoint> {
        let mut chain = a.to_vec();
        if reverse_a {
            chain.reverse();
        }
        self.append(&mut chain, b, reverse_b);
        chain
    }

    /// 把 `next` 接到 `chain` 尾部，重合的连接点只保留一个
    fn append(&self, chain: &mut Vec<GeoPoint>, next: &[GeoPoint], reverse: bool) {
        let mut next = next.to_vec();
        if reverse {
            next.reverse();
        }
        let skip = match (chain.last(), next.first()) {
            (Some(tail), Some(head)) => tail.planar_distance(head) <= self.join_tolerance,
            _ => false,
        };
        chain.extend(next.into_iter().skip(usize::from(skip)));
    }

    /// 反转每个部件的点序，标识不变
    pub fn reverse(&self, features: &[Feature]) -> Result<Edit> {
        self.ensure_on_layer(features)?;
        let updated = features
            .iter()
            .map(|f| -> Result<Feature> { Ok(f.with_geometry(f.geometry.reversed()?)) })
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("Reversed {} features", updated.len());
        Ok(Edit::updated(OperationKind::Reverse, Some(self.layer.id), updated))
    }

    /// 原样复制到同一图层，原要素不动
    pub fn create_copy(&self, features: &[Feature]) -> Result<Edit> {
        self.ensure_on_layer(features)?;
        let added = features
            .iter()
            .map(|f| self.mint(f.geometry.clone(), f))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("Copied {} features", added.len());
        Ok(Edit::added(OperationKind::CreateCopy, Some(self.layer.id), added))
    }
}
