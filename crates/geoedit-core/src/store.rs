//! 要素存储
//!
//! 引擎只通过 [`FeatureStore`] 访问持久化层：生成新要素标识、写入编辑结果、查询图层内容。
//! [`InMemoryFeatureStore`] 是内存实现，供测试和嵌入式场景使用。

use crate::feature::{Feature, FeatureId};
use crate::geometry::{Geometry, GeometryKind};
use crate::layer::{Layer, LayerId};
use std::collections::HashMap;
use thiserror::Error;

/// 存储错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Layer not found: {0}")]
    LayerNotFound(LayerId),

    #[error("Feature not found: {0}")]
    FeatureNotFound(FeatureId),

    #[error("Feature already exists: {0}")]
    DuplicateFeature(FeatureId),

    #[error("Geometry kind {found} does not match layer kind {expected}")]
    KindMismatch {
        expected: GeometryKind,
        found: GeometryKind,
    },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// 要素存储接口
pub trait FeatureStore {
    /// 查询图层
    fn layer(&self, id: LayerId) -> Result<&Layer, StoreError>;

    /// 在图层中生成新要素（分配新标识），尚未写入
    fn create_feature(&self, layer: LayerId, geometry: Geometry) -> Result<Feature, StoreError>;

    /// 写入新要素
    fn add_features(&mut self, layer: LayerId, features: Vec<Feature>) -> Result<(), StoreError>;

    /// 按标识覆盖已有要素
    fn update_feature(&mut self, layer: LayerId, feature: Feature) -> Result<(), StoreError>;

    /// 删除要素
    fn delete_features(&mut self, layer: LayerId, features: &[Feature]) -> Result<(), StoreError>;

    /// 图层中的全部要素，按写入顺序
    fn query_all(&self, layer: LayerId) -> Result<Vec<Feature>, StoreError>;

    /// 按标识查询
    fn get_feature(&self, layer: LayerId, id: FeatureId) -> Result<Feature, StoreError> {
        self.query_all(layer)?
            .into_iter()
            .find(|f| f.id == id)
            .ok_or(StoreError::FeatureNotFound(id))
    }
}

#[derive(Debug, Clone)]
struct LayerTable {
    layer: Layer,
    features: Vec<Feature>,
}

impl LayerTable {
    fn position(&self, id: FeatureId) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }
}

/// 内存要素存储
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeatureStore {
    tables: HashMap<LayerId, LayerTable>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册图层
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        self.tables.insert(
            id,
            LayerTable {
                layer,
                features: Vec::new(),
            },
        );
        id
    }

    /// 移除图层及其全部要素
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        self.tables.remove(&id).map(|table| table.layer)
    }

    pub fn feature_count(&self, layer: LayerId) -> usize {
        self.tables.get(&layer).map_or(0, |t| t.features.len())
    }

    fn table(&self, layer: LayerId) -> Result<&LayerTable, StoreError> {
        self.tables.get(&layer).ok_or(StoreError::LayerNotFound(layer))
    }

    fn table_mut(&mut self, layer: LayerId) -> Result<&mut LayerTable, StoreError> {
        self.tables.get_mut(&layer).ok_or(StoreError::LayerNotFound(layer))
    }
}

fn check_kind(layer: &Layer, geometry: &Geometry) -> Result<(), StoreError> {
    if geometry.kind() != layer.kind {
        return Err(StoreError::KindMismatch {
            expected: layer.kind,
            found: geometry.kind(),
        });
    }
    Ok(())
}

impl FeatureStore for InMemoryFeatureStore {
    fn layer(&self, id: LayerId) -> Result<&Layer, StoreError> {
        Ok(&self.table(id)?.layer)
    }

    fn create_feature(&self, layer: LayerId, geometry: Geometry) -> Result<Feature, StoreError> {
        let table = self.table(layer)?;
        check_kind(&table.layer, &geometry)?;
        Ok(Feature::new(layer, geometry))
    }

    fn add_features(&mut self, layer: LayerId, features: Vec<Feature>) -> Result<(), StoreError> {
        let table = self.table_mut(layer)?;
        // 先整体校验，避免写入一半
        for (i, feature) in features.iter().enumerate() {
            check_kind(&table.layer, &feature.geometry)?;
            if table.position(feature.id).is_some() || features[..i].iter().any(|f| f.id == feature.id) {
                return Err(StoreError::DuplicateFeature(feature.id));
            }
        }
        table.features.extend(features.into_iter().map(|mut f| {
            f.layer = layer;
            f
        }));
        Ok(())
    }

    fn update_feature(&mut self, layer: LayerId, feature: Feature) -> Result<(), StoreError> {
        let table = self.table_mut(layer)?;
        check_kind(&table.layer, &feature.geometry)?;
        let index = table
            .position(feature.id)
            .ok_or(StoreError::FeatureNotFound(feature.id))?;
        table.features[index] = feature;
        Ok(())
    }

    fn delete_features(&mut self, layer: LayerId, features: &[Feature]) -> Result<(), StoreError> {
        let table = self.table_mut(layer)?;
        if let Some(missing) = features.iter().find(|f| table.position(f.id).is_none()) {
            return Err(StoreError::FeatureNotFound(missing.id));
        }
        table
            .features
            .retain(|existing| !features.iter().any(|f| f.id == existing.id));
        Ok(())
    }

    fn query_all(&self, layer: LayerId) -> Result<Vec<Feature>, StoreError> {
        Ok(self.table(layer)?.features.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_layer(kind: GeometryKind) -> (InMemoryFeatureStore, LayerId) {
        let mut store = InMemoryFeatureStore::new();
        let id = store.add_layer(Layer::new("roads", kind));
        (store, id)
    }

    #[test]
    fn test_create_does_not_persist() {
        let (store, layer) = store_with_layer(GeometryKind::Polyline);
        let f = store
            .create_feature(layer, Geometry::polyline([(0.0, 0.0), (1.0, 0.0)]))
            .unwrap();
        assert_eq!(f.layer, layer);
        assert_eq!(store.feature_count(layer), 0);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let (store, layer) = store_with_layer(GeometryKind::Polygon);
        assert!(matches!(
            store.create_feature(layer, Geometry::polyline([(0.0, 0.0), (1.0, 0.0)])),
            Err(StoreError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_add_update_delete() {
        let (mut store, layer) = store_with_layer(GeometryKind::Polyline);
        let a = store.create_feature(layer, Geometry::polyline([(0.0, 0.0), (1.0, 0.0)])).unwrap();
        let b = store.create_feature(layer, Geometry::polyline([(2.0, 0.0), (3.0, 0.0)])).unwrap();
        store.add_features(layer, vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(store.query_all(layer).unwrap(), vec![a.clone(), b.clone()]);

        let reversed = a.with_geometry(a.geometry.reversed().unwrap());
        store.update_feature(layer, reversed.clone()).unwrap();
        assert_eq!(store.get_feature(layer, a.id).unwrap(), reversed);

        store.delete_features(layer, std::slice::from_ref(&b)).unwrap();
        assert_eq!(store.query_all(layer).unwrap(), vec![reversed]);
        assert_eq!(
            store.delete_features(layer, std::slice::from_ref(&b)),
            Err(StoreError::FeatureNotFound(b.id))
        );
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let (mut store, layer) = store_with_layer(GeometryKind::Polyline);
        let a = store.create_feature(layer, Geometry::polyline([(0.0, 0.0), (1.0, 0.0)])).unwrap();
        store.add_features(layer, vec![a.clone()]).unwrap();
        assert_eq!(
            store.add_features(layer, vec![a.clone()]),
            Err(StoreError::DuplicateFeature(a.id))
        );
        assert_eq!(store.feature_count(layer), 1);
    }

    #[test]
    fn test_unknown_layer() {
        let mut store = InMemoryFeatureStore::new();
        let missing = LayerId::new();
        assert_eq!(store.query_all(missing), Err(StoreError::LayerNotFound(missing)));
        assert!(store.add_features(missing, Vec::new()).is_err());
    }
}
