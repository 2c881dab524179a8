//! 引擎错误定义

use crate::geodesy::GeodesyError;
use crate::geometry::GeometryKind;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported coordinate system: {0}")]
    UnsupportedCoordinateSystem(String),

    #[error("Unsupported geometry kind: {0}")]
    UnsupportedGeometryKind(GeometryKind),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid feature: {0}")]
    InvalidFeature(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// 大地测量协作者的错误，原样向上传递
    #[error(transparent)]
    Geodesy(#[from] GeodesyError),

    /// 要素存储协作者的错误，原样向上传递
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// 校验距离类参数：必须是有限正数
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid_parameter(
            name,
            format!("must be a finite positive number, got {}", value),
        ))
    }
}
