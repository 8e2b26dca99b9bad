//! 规则操作符与动作类型定义
//!
//! 所有类型标签都是封闭枚举，保证条件分派与动作分派在编译期穷尽。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // 通用比较
    Equals,
    NotEquals,

    // 包含检查
    Contains,
    NotContains,
    InList,
    NotInList,

    // 字符串操作
    StartsWith,
    EndsWith,
    MatchesRegex,

    // 数值比较
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,

    // 长度比较
    LengthGreaterThan,
    LengthLessThan,

    // 空值检查
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::InList => "in_list",
            Self::NotInList => "not_in_list",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::MatchesRegex => "matches_regex",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::LessOrEqual => "less_or_equal",
            Self::LengthGreaterThan => "length_greater_than",
            Self::LengthLessThan => "length_less_than",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// 动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    // 文本
    SetField,
    AppendText,
    PrependText,
    ReplaceText,
    RemoveText,
    TransformTemplate,
    Uppercase,
    Lowercase,
    Capitalize,
    Trim,
    CopyFrom,

    // 标签与类目
    AddTag,
    RemoveTag,
    SetCategory,

    // 价格与数值
    ApplyMargin,
    SetPrice,
    Multiply,
    Add,
    Round,

    // 导出资格
    ExcludeProduct,
    IncludeProduct,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetField => "set_field",
            Self::AppendText => "append_text",
            Self::PrependText => "prepend_text",
            Self::ReplaceText => "replace_text",
            Self::RemoveText => "remove_text",
            Self::TransformTemplate => "transform_template",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::Capitalize => "capitalize",
            Self::Trim => "trim",
            Self::CopyFrom => "copy_from",
            Self::AddTag => "add_tag",
            Self::RemoveTag => "remove_tag",
            Self::SetCategory => "set_category",
            Self::ApplyMargin => "apply_margin",
            Self::SetPrice => "set_price",
            Self::Multiply => "multiply",
            Self::Add => "add",
            Self::Round => "round",
            Self::ExcludeProduct => "exclude_product",
            Self::IncludeProduct => "include_product",
        }
    }

    /// 未指定 target_field 时使用的默认字段
    pub fn default_target(&self) -> Option<&'static str> {
        match self {
            Self::AddTag | Self::RemoveTag => Some("tags"),
            Self::SetCategory => Some("category"),
            Self::ApplyMargin | Self::SetPrice => Some("price"),
            Self::ExcludeProduct | Self::IncludeProduct => Some(crate::record::ELIGIBILITY_FIELD),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
