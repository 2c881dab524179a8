//! 编辑结果
//!
//! 每个编辑操作返回一个 [`Edit`]：新增、删除、更新三组要素。
//! 引擎本身不写存储，由调用方（通常是 [`crate::session::EditSession`]）提交。

use crate::error::{EngineError, Result};
use crate::feature::Feature;
use crate::history::ChangeKind;
use crate::layer::LayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Union,
    Separate,
    Link,
    Reverse,
    CreateCopy,
    Simplify,
    Densify,
    Smooth,
    Transform,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Union => "Union",
            OperationKind::Separate => "Separate",
            OperationKind::Link => "Link",
            OperationKind::Reverse => "Reverse",
            OperationKind::CreateCopy => "CreateCopy",
            OperationKind::Simplify => "Simplify",
            OperationKind::Densify => "Densify",
            OperationKind::Smooth => "Smooth",
            OperationKind::Transform => "Transform",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一次操作的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    pub operation: OperationKind,
    /// 所属图层；没有要素参与的空结果没有图层
    pub layer: Option<LayerId>,
    /// 新增要素（新标识）
    pub added: Vec<Feature>,
    /// 被删除的原要素
    pub deleted: Vec<Feature>,
    /// 原地修改的要素（标识不变）
    pub updated: Vec<Feature>,
}

impl Edit {
    /// 空结果
    pub fn empty(operation: OperationKind, layer: Option<LayerId>) -> Self {
        Self {
            operation,
            layer,
            added: Vec::new(),
            deleted: Vec::new(),
            updated: Vec::new(),
        }
    }

    /// 只包含更新的结果
    pub fn updated(operation: OperationKind, layer: Option<LayerId>, features: Vec<Feature>) -> Self {
        Self {
            updated: features,
            ..Self::empty(operation, layer)
        }
    }

    /// 只包含新增的结果
    pub fn added(operation: OperationKind, layer: Option<LayerId>, features: Vec<Feature>) -> Self {
        Self {
            added: features,
            ..Self::empty(operation, layer)
        }
    }

    /// 新增并删除（改变要素数量的操作）
    pub fn replaced(
        operation: OperationKind,
        layer: Option<LayerId>,
        added: Vec<Feature>,
        deleted: Vec<Feature>,
    ) -> Self {
        Self {
            added,
            deleted,
            ..Self::empty(operation, layer)
        }
    }

    /// 没有任何要素变化（软失败）
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// 结果要素集：新增与更新的要素
    pub fn result_features(&self) -> impl Iterator<Item = &Feature> {
        self.added.iter().chain(self.updated.iter())
    }

    /// 按类型拆成变更，顺序固定为 新增、更新、删除，空组省略
    pub fn into_changes(self) -> Vec<ChangeKind> {
        let mut changes = Vec::with_capacity(3);
        if !self.added.is_empty() {
            changes.push(ChangeKind::Added(self.added));
        }
        if !self.updated.is_empty() {
            changes.push(ChangeKind::Updated(self.updated));
        }
        if !self.deleted.is_empty() {
            changes.push(ChangeKind::Deleted(self.deleted));
        }
        changes
    }
}

/// 确认所有要素属于同一图层，返回该图层（输入为空时为 `None`）
pub(crate) fn common_layer(features: &[Feature]) -> Result<Option<LayerId>> {
    let mut layers = features.iter().map(|f| f.layer);
    let Some(first) = layers.next() else {
        return Ok(None);
    };
    if layers.any(|layer| layer != first) {
        return Err(EngineError::PreconditionFailed(
            "features belong to more than one layer".to_string(),
        ));
    }
    Ok(Some(first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn line(layer: LayerId) -> Feature {
        Feature::new(layer, Geometry::polyline([(0.0, 0.0), (1.0, 0.0)]))
    }

    #[test]
    fn test_into_changes_skips_empty_groups() {
        let layer = LayerId::new();
        let edit = Edit::replaced(OperationKind::Union, Some(layer), vec![line(layer)], vec![line(layer), line(layer)]);
        let changes = edit.into_changes();
        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], ChangeKind::Added(f) if f.len() == 1));
        assert!(matches!(&changes[1], ChangeKind::Deleted(f) if f.len() == 2));
    }

    #[test]
    fn test_empty_edit() {
        let edit = Edit::empty(OperationKind::Separate, None);
        assert!(edit.is_empty());
        assert!(edit.into_changes().is_empty());
    }

    #[test]
    fn test_common_layer() {
        let a = LayerId::new();
        let b = LayerId::new();
        assert_eq!(common_layer(&[]).unwrap(), None);
        assert_eq!(common_layer(&[line(a), line(a)]).unwrap(), Some(a));
        assert!(matches!(
            common_layer(&[line(a), line(b)]),
            Err(EngineError::PreconditionFailed(_))
        ));
    }
}
