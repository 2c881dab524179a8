//! 变更历史
//!
//! 每个图层一条只追加的记录序列。一次复合操作（如合并 = 新增 + 删除）
//! 按变更类型拆成多条记录，共享同一个操作编号。

use crate::edit::{Edit, OperationKind};
use crate::feature::{Feature, FeatureId};
use crate::layer::LayerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 操作编号，在记录器内单调递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(u64);

impl OperationId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// 变更内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added(Vec<Feature>),
    Deleted(Vec<Feature>),
    Updated(Vec<Feature>),
}

impl ChangeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeKind::Added(_) => "Added",
            ChangeKind::Deleted(_) => "Deleted",
            ChangeKind::Updated(_) => "Updated",
        }
    }

    pub fn features(&self) -> &[Feature] {
        match self {
            ChangeKind::Added(f) | ChangeKind::Deleted(f) | ChangeKind::Updated(f) => f,
        }
    }

    pub fn feature_ids(&self) -> Vec<FeatureId> {
        self.features().iter().map(|f| f.id).collect()
    }
}

/// 变更记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// 图层内序号，从 0 开始
    pub sequence: u64,
    pub operation_id: OperationId,
    pub operation: OperationKind,
    pub layer: LayerId,
    pub change: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct LayerHistory {
    records: Vec<ChangeRecord>,
    next_sequence: u64,
}

/// 变更记录器
#[derive(Debug, Default)]
pub struct ChangeRecorder {
    histories: HashMap<LayerId, LayerHistory>,
    next_operation: u64,
}

impl ChangeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次编辑
    ///
    /// 没有要素变化或没有图层的编辑不产生记录，返回 `None`。
    pub fn record(&mut self, edit: Edit) -> Option<OperationId> {
        let layer = edit.layer?;
        if edit.is_empty() {
            return None;
        }

        let operation_id = OperationId(self.next_operation);
        self.next_operation += 1;

        let operation = edit.operation;
        let timestamp = Utc::now();
        let history = self.histories.entry(layer).or_default();
        for change in edit.into_changes() {
            tracing::debug!(
                "Recording {} ({}) for layer {}: {} features",
                operation,
                change.name(),
                layer,
                change.features().len()
            );
            history.records.push(ChangeRecord {
                sequence: history.next_sequence,
                operation_id,
                operation,
                layer,
                change,
                timestamp,
            });
            history.next_sequence += 1;
        }

        Some(operation_id)
    }

    /// 图层的全部记录，按记录顺序
    pub fn history(&self, layer: LayerId) -> &[ChangeRecord] {
        self.histories
            .get(&layer)
            .map(|h| h.records.as_slice())
            .unwrap_or(&[])
    }

    /// 某次操作产生的全部记录
    pub fn records_for(&self, layer: LayerId, operation_id: OperationId) -> Vec<&ChangeRecord> {
        self.history(layer)
            .iter()
            .filter(|r| r.operation_id == operation_id)
            .collect()
    }

    /// 最近一次操作的编号
    pub fn last_operation(&self, layer: LayerId) -> Option<OperationId> {
        self.history(layer).last().map(|r| r.operation_id)
    }

    /// 只保留最近 `keep_last` 条记录；序号不回退
    pub fn truncate(&mut self, layer: LayerId, keep_last: usize) {
        if let Some(history) = self.histories.get_mut(&layer) {
            let excess = history.records.len().saturating_sub(keep_last);
            if excess > 0 {
                history.records.drain(..excess);
                tracing::debug!("Truncated {} records from layer {}", excess, layer);
            }
        }
    }

    /// 丢弃图层的全部历史
    pub fn discard_layer(&mut self, layer: LayerId) {
        if self.histories.remove(&layer).is_some() {
            tracing::debug!("Discarded history of layer {}", layer);
        }
    }

    /// 有历史记录的图层数
    pub fn layer_count(&self) -> usize {
        self.histories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn line(layer: LayerId) -> Feature {
        Feature::new(layer, Geometry::polyline([(0.0, 0.0), (1.0, 0.0)]))
    }

    #[test]
    fn test_compound_edit_shares_operation_id() {
        let mut recorder = ChangeRecorder::new();
        let layer = LayerId::new();
        let a = line(layer);
        let b = line(layer);
        let merged = line(layer);
        let edit = Edit::replaced(OperationKind::Union, Some(layer), vec![merged.clone()], vec![a, b]);

        let op = recorder.record(edit).unwrap();
        let records = recorder.history(layer);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.operation_id == op && r.operation == OperationKind::Union));
        assert_eq!(records[0].change.feature_ids(), vec![merged.id]);
        assert!(matches!(records[1].change, ChangeKind::Deleted(ref f) if f.len() == 2));
        assert_eq!(records[0].sequence, 0);
        assert_eq!(records[1].sequence, 1);
    }

    #[test]
    fn test_empty_edit_not_recorded() {
        let mut recorder = ChangeRecorder::new();
        let layer = LayerId::new();
        assert_eq!(recorder.record(Edit::empty(OperationKind::Link, Some(layer))), None);
        assert_eq!(recorder.record(Edit::empty(OperationKind::Link, None)), None);
        assert!(recorder.history(layer).is_empty());
        assert_eq!(recorder.layer_count(), 0);
    }

    #[test]
    fn test_operations_are_ordered() {
        let mut recorder = ChangeRecorder::new();
        let layer = LayerId::new();
        let f = line(layer);
        let first = recorder
            .record(Edit::updated(OperationKind::Reverse, Some(layer), vec![f.clone()]))
            .unwrap();
        let second = recorder
            .record(Edit::updated(OperationKind::Densify, Some(layer), vec![f]))
            .unwrap();
        assert!(first < second);
        assert_eq!(recorder.last_operation(layer), Some(second));
        assert_eq!(recorder.records_for(layer, first).len(), 1);
        assert!(recorder.history(layer)[0].timestamp <= recorder.history(layer)[1].timestamp);
    }

    #[test]
    fn test_histories_are_per_layer() {
        let mut recorder = ChangeRecorder::new();
        let (l1, l2) = (LayerId::new(), LayerId::new());
        recorder.record(Edit::added(OperationKind::CreateCopy, Some(l1), vec![line(l1)]));
        recorder.record(Edit::added(OperationKind::CreateCopy, Some(l2), vec![line(l2)]));
        assert_eq!(recorder.history(l1).len(), 1);
        assert_eq!(recorder.history(l2).len(), 1);

        recorder.discard_layer(l1);
        assert!(recorder.history(l1).is_empty());
        assert_eq!(recorder.history(l2).len(), 1);
    }

    #[test]
    fn test_truncate_keeps_latest() {
        let mut recorder = ChangeRecorder::new();
        let layer = LayerId::new();
        for _ in 0..5 {
            recorder.record(Edit::updated(OperationKind::Smooth, Some(layer), vec![line(layer)]));
        }
        recorder.truncate(layer, 2);
        let records = recorder.history(layer);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 3);

        recorder.record(Edit::updated(OperationKind::Smooth, Some(layer), vec![line(layer)]));
        assert_eq!(recorder.history(layer).last().unwrap().sequence, 5);
    }
}
