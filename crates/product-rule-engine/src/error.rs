//! 规则引擎错误类型
//!
//! `RuleError` 是唯一会传播给调用方的错误（调用方输入错误）；
//! 单条规则内部的问题通过 `ActionError` / `TemplateError` 在本地吸收并写入执行日志。

use catalog_shared::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则编译失败: {0}")]
    CompileError(String),

    #[error("商品数据无效: {0}")]
    InvalidRecord(String),

    #[error("条件嵌套过深: 规则 {rule_id} 深度 {depth} 超过上限 {max}")]
    ConditionTooDeep {
        rule_id: String,
        depth: usize,
        max: usize,
    },

    #[error("规则 ID 重复: {0}")]
    DuplicateRule(String),

    #[error("字段不可写: {0}")]
    FieldNotWritable(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("引擎配置无效: {0}")]
    InvalidConfig(String),

    #[error("批处理已取消")]
    Cancelled,

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl From<RuleError> for CatalogError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::CompileError(msg) => CatalogError::RuleParseFailed(msg),
            RuleError::InvalidRecord(msg) => CatalogError::InvalidRecord(msg),
            RuleError::RuleNotFound(rule_id) => CatalogError::RuleNotFound { rule_id },
            RuleError::InvalidConfig(msg) => CatalogError::Validation(msg),
            RuleError::Cancelled => CatalogError::Cancelled,
            RuleError::JsonError(e) => CatalogError::RuleParseFailed(e.to_string()),
            other @ (RuleError::ConditionTooDeep { .. }
            | RuleError::DuplicateRule(_)
            | RuleError::FieldNotWritable(_)) => CatalogError::RuleExecutionFailed(other.to_string()),
        }
    }
}

/// 单个动作的失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// 可恢复：动作被跳过，同一规则的后续动作继续执行
    #[error("动作已跳过: {0}")]
    Skipped(String),

    /// 规则级致命错误：丢弃整个工作副本
    #[error("动作执行失败: {0}")]
    Fatal(String),
}

impl ActionError {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Skipped(reason) | Self::Fatal(reason) => reason,
        }
    }
}

/// 条件求值错误，由求值器转换为 false 并记录诊断
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("{0}")]
    InvalidPattern(String),
}

impl ConditionError {
    pub(crate) fn mismatch(expected: &str, actual: &serde_json::Value) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: crate::record::value_type_name(actual).to_string(),
        }
    }
}

/// 模板渲染错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("模板展开深度超过上限 {max}: {template}")]
    DepthExceeded { max: usize, template: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_error_into_catalog_error() {
        let err: CatalogError = RuleError::InvalidRecord("expected object".to_string()).into();
        assert_eq!(err.code(), "INVALID_RECORD");

        let err: CatalogError = RuleError::DuplicateRule("rule-001".to_string()).into();
        assert_eq!(err.code(), "RULE_EXECUTION_FAILED");
        assert!(err.to_string().contains("rule-001"));

        let err: CatalogError = RuleError::Cancelled.into();
        assert_eq!(err.code(), "CANCELLED");

        let err: CatalogError = RuleError::CompileError("规则 ID 不能为空".to_string()).into();
        assert_eq!(err.code(), "RULE_PARSE_FAILED");
        assert!(err.is_caller_fault());
    }

    #[test]
    fn test_action_error_reason() {
        assert_eq!(ActionError::skipped("成本缺失").reason(), "成本缺失");
        assert_eq!(ActionError::Fatal("depth".to_string()).reason(), "depth");
    }
}
