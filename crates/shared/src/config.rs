//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::{CatalogError, Result};
use crate::observability::ObservabilityConfig;

/// 规则引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// 模板嵌套展开的最大深度
    pub max_template_depth: usize,
    /// 条件组允许的最大嵌套深度
    pub max_condition_depth: usize,
    /// 批处理工作线程数，为空时使用 CPU 核数
    pub batch_workers: Option<usize>,
    /// 批量低于该数量时在调用线程内串行执行
    pub parallel_threshold: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_template_depth: 5,
            max_condition_depth: 32,
            batch_workers: None,
            parallel_threshold: 64,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineSettings,
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "product-rule-engine".to_string(),
            environment: "development".to_string(),
            engine: EngineSettings::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（CATALOG_ 前缀，层级用双下划线分隔，
    ///    如 CATALOG_ENGINE__MAX_TEMPLATE_DEPTH -> engine.max_template_depth）
    pub fn load(service_name: &str) -> Result<Self> {
        let env = std::env::var("CATALOG_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let config = Self::build(service_name, &env, Path::new(&config_dir))?;
        config.validate()?;
        Ok(config)
    }

    fn build(service_name: &str, env: &str, config_dir: &Path) -> std::result::Result<Self, ConfigError> {
        Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("CATALOG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// 校验配置取值范围
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_template_depth == 0 {
            return Err(CatalogError::InvalidArgument {
                field: "engine.max_template_depth".to_string(),
                message: "必须大于 0".to_string(),
            });
        }

        if self.engine.max_condition_depth == 0 {
            return Err(CatalogError::InvalidArgument {
                field: "engine.max_condition_depth".to_string(),
                message: "必须大于 0".to_string(),
            });
        }

        if self.engine.batch_workers == Some(0) {
            return Err(CatalogError::InvalidArgument {
                field: "engine.batch_workers".to_string(),
                message: "工作线程数不能为 0".to_string(),
            });
        }

        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
