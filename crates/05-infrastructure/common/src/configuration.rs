//! 注入器配置

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error};

/// 环境变量前缀，例如 `DI__MAX_RESOLUTION_DEPTH=64`
pub const ENV_PREFIX: &str = "DI";

/// 注入器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// 最大解析深度
    pub max_resolution_depth: usize,
    /// 是否以 debug 级别记录每一步解析
    pub trace_resolution: bool,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: 100,
            trace_resolution: false,
        }
    }
}

impl InjectorConfig {
    /// 从配置文件（可选）和环境变量加载配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("加载注入器配置: {}", path.display());

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| {
                error!("配置构建失败: {}", e);
                ConfigError::ParseError {
                    source: Box::new(e),
                }
            })?;

        Self::bind(settings)
    }

    /// 从 TOML 文本加载配置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()
            .map_err(|e| ConfigError::ParseError {
                source: Box::new(e),
            })?;

        Self::bind(settings)
    }

    fn bind(settings: config::Config) -> Result<Self, ConfigError> {
        let config: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError {
                source: Box::new(e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        Ok(())
    }
}
