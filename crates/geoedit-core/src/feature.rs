//! 要素定义
//!
//! 要素 = 标识 + 所属图层 + 几何 + 属性。
//! 原地编辑（反转、加密、简化、平滑、坐标转换）保留标识；
//! 改变数量的操作（合并、拆分、连接、复制）产生新标识。

use crate::error::{EngineError, Result};
use crate::geometry::{Geometry, Part};
use crate::layer::LayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// 属性表
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// 要素ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(Uuid);

impl FeatureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FeatureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 要素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub layer: LayerId,
    pub geometry: Geometry,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Feature {
    /// 创建新要素（生成新标识）
    pub fn new(layer: LayerId, geometry: Geometry) -> Self {
        Self {
            id: FeatureId::new(),
            layer,
            geometry,
            attributes: Attributes::new(),
        }
    }

    /// 设置属性
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// 设置单个属性
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// 替换几何，保留标识和属性
    pub fn with_geometry(&self, geometry: Geometry) -> Self {
        Self {
            id: self.id,
            layer: self.layer,
            geometry,
            attributes: self.attributes.clone(),
        }
    }

    /// 检查要素能否持久化
    ///
    /// 零长度部件、不足三个不重复顶点的环和非有限坐标只允许出现在编辑过程中。
    pub fn validate(&self) -> Result<()> {
        if self.geometry.has_empty_part() {
            return Err(EngineError::InvalidFeature(format!(
                "feature {} has an empty part",
                self.id
            )));
        }
        if let Geometry::Polygon(rings) = &self.geometry {
            if let Some(index) = rings.iter().position(Part::is_degenerate_ring) {
                return Err(EngineError::InvalidFeature(format!(
                    "feature {} has a degenerate ring at part {}",
                    self.id, index
                )));
            }
        }
        let finite = match &self.geometry {
            Geometry::Point(p) => p.is_finite(),
            Geometry::Multipoint(points) => points.iter().all(|p| p.is_finite()),
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => parts
                .iter()
                .all(|part| part.points().iter().all(|p| p.is_finite())),
            Geometry::Envelope(e) => [e.xmin, e.ymin, e.xmax, e.ymax].iter().all(|v| v.is_finite()),
        };
        if !finite {
            return Err(EngineError::InvalidFeature(format!(
                "feature {} has non-finite coordinates",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_geometry_keeps_identity() {
        let layer = LayerId::new();
        let f = Feature::new(layer, Geometry::polyline([(0.0, 0.0), (1.0, 1.0)]))
            .with_attribute("name", "road");
        let g = f.with_geometry(f.geometry.reversed().unwrap());
        assert_eq!(g.id, f.id);
        assert_eq!(g.attributes, f.attributes);
        assert_ne!(g.geometry, f.geometry);
    }

    #[test]
    fn test_validate_rejects_empty_part() {
        let f = Feature::new(LayerId::new(), Geometry::Polygon(vec![Part::default()]));
        assert!(matches!(f.validate(), Err(EngineError::InvalidFeature(_))));
    }

    #[test]
    fn test_validate_rejects_degenerate_ring() {
        let layer = LayerId::new();
        let sliver = Feature::new(layer, Geometry::polygon([(0.0, 0.0), (10.0, 0.0)]));
        assert!(matches!(sliver.validate(), Err(EngineError::InvalidFeature(_))));

        let closed_sliver = Feature::new(layer, Geometry::polygon([(0.0, 0.0), (10.0, 0.0), (0.0, 0.0)]));
        assert!(matches!(closed_sliver.validate(), Err(EngineError::InvalidFeature(_))));

        // 同样两个点作为线是合法的
        assert!(Feature::new(layer, Geometry::polyline([(0.0, 0.0), (10.0, 0.0)])).validate().is_ok());
        assert!(Feature::new(layer, Geometry::polygon([(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_new_features_get_distinct_ids() {
        let layer = LayerId::new();
        let a = Feature::new(layer, Geometry::polyline([(0.0, 0.0), (1.0, 1.0)]));
        let b = Feature::new(layer, a.geometry.clone());
        assert_ne!(a.id, b.id);
    }
}
