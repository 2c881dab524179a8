//! GeoEdit 要素几何引擎
//!
//! 为GIS编辑应用提供坐标转换和保持拓扑的要素编辑功能。
//!
//! # 架构设计
//!
//! 所有操作都是纯函数：几何值输入，新的几何值输出。
//! - `Geometry`: 点、多点、多段线、多边形（闭合枚举）
//! - `Feature`: 标识 + 几何 + 属性
//! - `Edit`: 一次操作产生的新增/删除/更新要素
//! - `ChangeRecorder`: 按图层记录只追加的变更历史
//!
//! 要素存储和大地测量计算是外部协作者，分别通过 [`store::FeatureStore`]
//! 和 [`geodesy::GeodesyProvider`] 接入。
//!
//! # 示例
//!
//! ```rust
//! use geoedit_core::prelude::*;
//!
//! let line = Part::from_xy([(0.0, 0.0), (1.0, 0.1), (2.0, 0.0), (3.0, 0.0)]);
//! let simplified = Simplifier::new(SimplifyMethod::DouglasPeucker(0.5))
//!     .simplify_points(line.points())
//!     .unwrap();
//! assert_eq!(simplified.len(), 2);
//! ```

pub mod config;
pub mod crs;
pub mod densify;
pub mod edit;
pub mod error;
pub mod feature;
pub mod geodesy;
pub mod geometry;
pub mod history;
pub mod layer;
pub mod math;
pub mod session;
pub mod simplify;
pub mod smooth;
pub mod store;
pub mod topology;
pub mod transform;

pub use error::{EngineError, Result};

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::config::{DensifyConfig, EngineConfig, LinkConfig, SimplifyConfig};
    pub use crate::crs::CoordinateSystem;
    pub use crate::densify::Densifier;
    pub use crate::edit::{Edit, OperationKind};
    pub use crate::error::{EngineError, Result};
    pub use crate::feature::{Attributes, Feature, FeatureId};
    pub use crate::geodesy::{GeodesyError, GeodesyProvider, OffsetDirection, StandardGeodesy};
    pub use crate::geometry::{Envelope, GeoPoint, Geometry, GeometryKind, Part};
    pub use crate::history::{ChangeKind, ChangeRecord, ChangeRecorder, OperationId};
    pub use crate::layer::{Layer, LayerId};
    pub use crate::math::{Point2, EPSILON};
    pub use crate::session::{CommitOutcome, EditSession};
    pub use crate::simplify::{SimplifyMethod, Simplifier};
    pub use crate::smooth::{SmoothParams, Smoother};
    pub use crate::store::{FeatureStore, InMemoryFeatureStore, StoreError};
    pub use crate::topology::{LinkMode, TopologyEditor};
    pub use crate::transform::CoordinateTransformer;
}
