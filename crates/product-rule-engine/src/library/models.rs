//! 规则模板数据模型
//!
//! 模板是带 `${param}` 占位符的规则 JSON，配合参数定义生成具体规则。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 模板参数定义
///
/// 描述规则模板中可配置的参数，包括类型约束、默认值和验证规则
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDef {
    /// 参数名称，用于在模板 JSON 中引用
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// 用户可见的参数标签
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    /// 参数默认值，当用户未提供时使用
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    /// 数值类型参数的最小值约束
    #[serde(default)]
    pub min: Option<f64>,
    /// 数值类型参数的最大值约束
    #[serde(default)]
    pub max: Option<f64>,
    /// 枚举类型参数的可选值列表
    #[serde(default)]
    pub options: Option<Vec<ParameterOption>>,
}

impl ParameterDef {
    pub fn new(name: impl Into<String>, param_type: ParameterType, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            label: label.into(),
            description: None,
            default: None,
            required: false,
            min: None,
            max: None,
            options: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_options(mut self, options: Vec<ParameterOption>) -> Self {
        self.options = Some(options);
        self
    }
}

/// 参数类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    /// 整数或浮点数
    Number,
    Boolean,
    Array,
    /// 必须配合 options 字段使用
    Enum,
}

/// 枚举参数的选项定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterOption {
    pub value: Value,
    pub label: String,
}

impl ParameterOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// 模板分类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    /// 定价：利润率、调价
    Pricing,
    /// 内容：标题、描述、标签
    Content,
    /// 过滤：导出资格
    Filtering,
}

impl std::fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pricing => write!(f, "pricing"),
            Self::Content => write!(f, "content"),
            Self::Filtering => write!(f, "filtering"),
        }
    }
}

/// 规则模板
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTemplate {
    /// 模板编码，用于程序引用
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: TemplateCategory,
    /// 规则定义，包含参数占位符
    pub template_json: Value,
    pub parameters: Vec<ParameterDef>,
    pub version: String,
    /// 是否为内置模板
    #[serde(default)]
    pub is_system: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RuleTemplate {
    /// 模板需要同时满足：启用状态、编码非空、模板 JSON 为对象
    pub fn is_valid(&self) -> bool {
        self.enabled && !self.code.is_empty() && self.template_json.is_object()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameter_def_serialization() {
        let param = ParameterDef::new("margin", ParameterType::Number, "利润率 (%)")
            .required()
            .with_default(30)
            .with_range(Some(0.0), Some(500.0));

        let json = serde_json::to_string(&param).unwrap();
        assert!(json.contains("\"type\":\"number\""));
        assert!(json.contains("\"required\":true"));
    }

    #[test]
    fn test_parameter_def_deserialization() {
        let json_str = r#"{
            "name": "threshold",
            "type": "number",
            "label": "库存阈值",
            "required": true,
            "min": 0,
            "max": 100
        }"#;

        let param: ParameterDef = serde_json::from_str(json_str).unwrap();
        assert_eq!(param.name, "threshold");
        assert_eq!(param.param_type, ParameterType::Number);
        assert!(param.required);
        assert_eq!(param.min, Some(0.0));
        assert_eq!(param.max, Some(100.0));
    }

    #[test]
    fn test_template_category_serde() {
        assert_eq!(TemplateCategory::Pricing.to_string(), "pricing");
        assert_eq!(
            serde_json::to_string(&TemplateCategory::Filtering).unwrap(),
            "\"filtering\""
        );

        let category: TemplateCategory = serde_json::from_str("\"content\"").unwrap();
        assert_eq!(category, TemplateCategory::Content);
    }

    #[test]
    fn test_rule_template_is_valid() {
        let template = RuleTemplate {
            code: "low_stock".into(),
            name: "低库存排除".into(),
            description: None,
            category: TemplateCategory::Filtering,
            template_json: json!({"name": "low stock"}),
            parameters: vec![],
            version: "1.0.0".into(),
            is_system: false,
            enabled: true,
        };
        assert!(template.is_valid());

        let disabled = RuleTemplate {
            enabled: false,
            ..template.clone()
        };
        assert!(!disabled.is_valid());

        let empty_code = RuleTemplate {
            code: "".into(),
            ..template.clone()
        };
        assert!(!empty_code.is_valid());

        let not_object = RuleTemplate {
            template_json: Value::Null,
            ..template
        };
        assert!(!not_object.is_valid());
    }
}
