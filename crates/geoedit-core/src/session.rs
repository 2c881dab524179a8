//! 编辑会话
//!
//! 把编辑结果写入要素存储并记录历史。写入顺序：新增、更新、删除；
//! 写入前先检查被更新、删除的要素都存在，检查不通过时存储和历史都不变。

use crate::edit::Edit;
use crate::error::{EngineError, Result};
use crate::history::{ChangeRecorder, OperationId};
use crate::layer::LayerId;
use crate::store::{FeatureStore, StoreError};

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// 已写入并记录
    Committed { operation: OperationId, records: usize },
    /// 没有符合条件的输入，什么也没做
    NoEligibleInput,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }
}

/// 编辑会话
pub struct EditSession<S: FeatureStore> {
    store: S,
    recorder: ChangeRecorder,
}

impl<S: FeatureStore> EditSession<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            recorder: ChangeRecorder::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn recorder(&self) -> &ChangeRecorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut ChangeRecorder {
        &mut self.recorder
    }

    pub fn into_parts(self) -> (S, ChangeRecorder) {
        (self.store, self.recorder)
    }

    /// 提交编辑
    pub fn commit(&mut self, edit: Edit) -> Result<CommitOutcome> {
        let layer = match edit.layer {
            Some(layer) if !edit.is_empty() => layer,
            _ => {
                tracing::warn!("{}: no eligible input, nothing committed", edit.operation);
                return Ok(CommitOutcome::NoEligibleInput);
            }
        };

        for feature in edit.result_features() {
            feature.validate()?;
            if feature.layer != layer {
                return Err(EngineError::PreconditionFailed(format!(
                    "feature {} is not on layer {}",
                    feature.id, layer
                )));
            }
        }

        self.check_writable(layer, &edit)?;

        if !edit.added.is_empty() {
            self.store.add_features(layer, edit.added.clone())?;
        }
        for feature in &edit.updated {
            self.store.update_feature(layer, feature.clone())?;
        }
        if !edit.deleted.is_empty() {
            self.store.delete_features(layer, &edit.deleted)?;
        }

        let (operation_kind, added, updated, deleted) =
            (edit.operation, edit.added.len(), edit.updated.len(), edit.deleted.len());
        let Some(operation) = self.recorder.record(edit) else {
            return Ok(CommitOutcome::NoEligibleInput);
        };
        let records = self.recorder.records_for(layer, operation).len();

        tracing::info!(
            "Committed {} on layer {}: +{} ~{} -{} ({})",
            operation_kind,
            layer,
            added,
            updated,
            deleted,
            operation
        );
        Ok(CommitOutcome::Committed { operation, records })
    }

    /// 写入前检查：图层类型一致，被更新和删除的要素都在存储中
    fn check_writable(&self, layer: LayerId, edit: &Edit) -> Result<()> {
        let expected = self.store.layer(layer)?.kind;
        for feature in edit.result_features() {
            let found = feature.geometry.kind();
            if found != expected {
                return Err(StoreError::KindMismatch { expected, found }.into());
            }
        }
        for feature in edit.updated.iter().chain(&edit.deleted) {
            self.store.get_feature(layer, feature.id)?;
        }
        Ok(())
    }
}
