//! 图层描述
//!
//! 引擎不管理图层生命周期，只需要知道图层标识和它固定的几何类型。

use crate::geometry::GeometryKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 图层ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
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

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 图层
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    /// 图层固定的几何类型
    pub kind: GeometryKind,
}

impl Layer {
    pub fn new(name: impl Into<String>, kind: GeometryKind) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            kind,
        }
    }
}
