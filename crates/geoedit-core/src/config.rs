//! 引擎配置
//!
//! JSON 格式，所有字段都有默认值，缺省字段按默认处理：
//!
//! ```json
//! {
//!   "simplify": { "method": { "method": "douglas_peucker", "value": 0.0001 } },
//!   "densify": { "max_segment_length": 500.0 },
//!   "smooth": { "points_per_segment": 4, "level": 2, "min_smooth_angle": 160.0 },
//!   "link": { "join_tolerance": 0.0, "mode": "Auto", "reverse": false }
//! }
//! ```

use crate::densify::Densifier;
use crate::error::{ensure_positive, EngineError, Result};
use crate::geodesy::GeodesyProvider;
use crate::layer::LayerId;
use crate::simplify::{SimplifyMethod, Simplifier};
use crate::smooth::{SmoothParams, Smoother};
use crate::store::FeatureStore;
use crate::topology::{LinkMode, TopologyEditor};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_simplify_method() -> SimplifyMethod {
    SimplifyMethod::DouglasPeucker(1e-4)
}

fn default_max_segment_length() -> f64 {
    1000.0
}

/// 简化配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplifyConfig {
    #[serde(default = "default_simplify_method")]
    pub method: SimplifyMethod,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            method: default_simplify_method(),
        }
    }
}

/// 加密配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensifyConfig {
    /// 最大段长（米）
    #[serde(default = "default_max_segment_length")]
    pub max_segment_length: f64,
}

impl Default for DensifyConfig {
    fn default() -> Self {
        Self {
            max_segment_length: default_max_segment_length(),
        }
    }
}

/// 连接配置
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// 端点距离不超过该值时视为同一点
    #[serde(default)]
    pub join_tolerance: f64,
    #[serde(default)]
    pub mode: LinkMode,
    #[serde(default)]
    pub reverse: bool,
}

/// 引擎配置
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub simplify: SimplifyConfig,
    #[serde(default)]
    pub densify: DensifyConfig,
    #[serde(default)]
    pub smooth: SmoothParams,
    #[serde(default)]
    pub link: LinkConfig,
}

impl EngineConfig {
    /// 从 JSON 文本解析并校验
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&json)?;
        tracing::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// 校验所有参数
    pub fn validate(&self) -> Result<()> {
        self.simplify.method.validate()?;
        ensure_positive("max_segment_length", self.densify.max_segment_length)?;
        self.smooth.validate()?;
        if !(self.link.join_tolerance.is_finite() && self.link.join_tolerance >= 0.0) {
            return Err(EngineError::invalid_parameter(
                "join_tolerance",
                format!("must be a finite non-negative number, got {}", self.link.join_tolerance),
            ));
        }
        Ok(())
    }

    pub fn simplifier(&self) -> Simplifier {
        Simplifier::new(self.simplify.method)
    }

    pub fn densifier<'a>(&self, geodesy: &'a dyn GeodesyProvider) -> Result<Densifier<'a>> {
        Densifier::new(geodesy, self.densify.max_segment_length)
    }

    pub fn smoother(&self) -> Result<Smoother> {
        Smoother::new(self.smooth)
    }

    pub fn topology_editor<'a, S: FeatureStore + ?Sized>(
        &self,
        store: &'a S,
        layer: LayerId,
    ) -> Result<TopologyEditor<'a, S>> {
        TopologyEditor::new(store, layer)?.with_join_tolerance(self.link.join_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::StandardGeodesy;
    use std::io::Write;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.smooth, SmoothParams::default());
    }

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::from_json_str(
            r#"{
                "simplify": { "method": { "method": "interval", "value": 3 } },
                "smooth": { "level": 1, "generalize": 0.5 },
                "link": { "join_tolerance": 0.01, "mode": "HeadToTail" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.simplify.method, SimplifyMethod::Interval(3));
        assert_eq!(config.smooth.level, 1);
        assert_eq!(config.smooth.generalize, Some(0.5));
        assert_eq!(config.smooth.points_per_segment, SmoothParams::default().points_per_segment);
        assert_eq!(config.link.mode, LinkMode::HeadToTail);
        assert_eq!(config.densify, DensifyConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "densify": { "max_segment_length": 0.0 } }"#),
            Err(EngineError::InvalidParameter { name: "max_segment_length", .. })
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "simplify": { "method": { "method": "interval", "value": 0 } } }"#),
            Err(EngineError::InvalidParameter { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "link": { "join_tolerance": -1.0 } }"#),
            Err(EngineError::InvalidParameter { name: "join_tolerance", .. })
        ));
        assert!(matches!(EngineConfig::from_json_str("not json"), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "densify": {{ "max_segment_length": 250.0 }} }}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.densify.max_segment_length, 250.0);

        let geodesy = StandardGeodesy::new();
        assert_eq!(config.densifier(&geodesy).unwrap().max_segment_length(), 250.0);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EngineConfig::load(dir.path().join("missing.json")),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = EngineConfig {
            simplify: SimplifyConfig {
                method: SimplifyMethod::PerpendicularDistance(0.2),
            },
            ..EngineConfig::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }
}
