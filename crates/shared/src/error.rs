//! 统一错误处理模块
//!
//! 定义目录平台各组件共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum CatalogError {
    // ==================== 配置错误 ====================
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 规则引擎错误 ====================
    #[error("规则解析失败: {0}")]
    RuleParseFailed(String),

    #[error("规则执行失败: {0}")]
    RuleExecutionFailed(String),

    #[error("规则未找到: rule_id={rule_id}")]
    RuleNotFound { rule_id: String },

    #[error("商品数据无效: {0}")]
    InvalidRecord(String),

    #[error("批处理已取消")]
    Cancelled,

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("无效的参数: {field} - {message}")]
    InvalidArgument { field: String, message: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::RuleParseFailed(_) => "RULE_PARSE_FAILED",
            Self::RuleExecutionFailed(_) => "RULE_EXECUTION_FAILED",
            Self::RuleNotFound { .. } => "RULE_NOT_FOUND",
            Self::InvalidRecord(_) => "INVALID_RECORD",
            Self::Cancelled => "CANCELLED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否由调用方输入引起（调用方应修正输入而不是重试）
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            Self::RuleParseFailed(_)
                | Self::InvalidRecord(_)
                | Self::Validation(_)
                | Self::InvalidArgument { .. }
        )
    }
}
