//! 模板编译器
//!
//! 将规则模板与参数值结合，生成完整的规则。
//! 核心功能是替换模板中的 `${param}` 占位符，同时保留参数的原始类型。

use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::models::{ParameterDef, ParameterType, RuleTemplate};
use crate::models::Rule;
use crate::record::value_type_name;

/// 模板编译错误
#[derive(Debug, thiserror::Error)]
pub enum TemplateCompileError {
    #[error("缺少必填参数: {0}")]
    MissingParameter(String),

    #[error("参数 {name} 超出范围: 期望 [{min:?}, {max:?}]")]
    ParamOutOfRange {
        name: String,
        min: Option<f64>,
        max: Option<f64>,
    },

    #[error("参数类型错误: {name} 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("参数 {name} 的取值不在可选项中: {value}")]
    InvalidOption { name: String, value: Value },

    #[error("无效的模板: {0}")]
    InvalidTemplate(String),

    #[error("模板生成的规则无效: {0}")]
    InvalidRule(#[from] serde_json::Error),
}

type CompileResult<T> = std::result::Result<T, TemplateCompileError>;

/// 模板编译器
///
/// 负责将模板 JSON 中的占位符替换为实际参数值，支持嵌套结构和类型保留
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateCompiler;

impl TemplateCompiler {
    pub fn new() -> Self {
        Self
    }

    /// 从模板和参数编译出规则
    ///
    /// 编译过程：
    /// 1. 验证必填参数是否提供
    /// 2. 合并用户参数与默认值
    /// 3. 递归替换模板中的占位符
    /// 4. 补齐缺失的 `id` / `name` 后反序列化为 `Rule`
    pub fn compile(
        &self,
        template: &RuleTemplate,
        params: &HashMap<String, Value>,
    ) -> CompileResult<Rule> {
        let mut body = self.compile_value(template, params)?;

        let Value::Object(map) = &mut body else {
            return Err(TemplateCompileError::InvalidTemplate(format!(
                "模板 {} 的规则定义必须是对象",
                template.code
            )));
        };
        map.entry("id")
            .or_insert_with(|| Value::String(format!("{}-{}", template.code, Uuid::new_v4())));
        map.entry("name")
            .or_insert_with(|| Value::String(template.name.clone()));

        Ok(serde_json::from_value(body)?)
    }

    /// 只做参数替换，返回规则 JSON
    pub fn compile_value(
        &self,
        template: &RuleTemplate,
        params: &HashMap<String, Value>,
    ) -> CompileResult<Value> {
        if !template.enabled {
            return Err(TemplateCompileError::InvalidTemplate(format!(
                "模板已停用: {}",
                template.code
            )));
        }

        self.validate_params(&template.parameters, params)?;
        let merged_params = self.merge_with_defaults(&template.parameters, params);
        self.replace_placeholders(&template.template_json, &merged_params)
    }

    /// 验证所有参数是否满足定义的约束
    fn validate_params(
        &self,
        definitions: &[ParameterDef],
        params: &HashMap<String, Value>,
    ) -> CompileResult<()> {
        for def in definitions {
            // 必填参数必须提供值或有默认值
            if def.required && !params.contains_key(&def.name) && def.default.is_none() {
                return Err(TemplateCompileError::MissingParameter(def.name.clone()));
            }

            if let Some(value) = params.get(&def.name) {
                self.validate_param_value(def, value)?;
            }
        }
        Ok(())
    }

    /// 验证单个参数值是否符合定义的类型和范围约束
    fn validate_param_value(&self, def: &ParameterDef, value: &Value) -> CompileResult<()> {
        let type_ok = match def.param_type {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Array => value.is_array(),
            ParameterType::Enum => true,
        };

        if !type_ok {
            return Err(TemplateCompileError::TypeMismatch {
                name: def.name.clone(),
                expected: format!("{:?}", def.param_type),
                actual: value_type_name(value).to_string(),
            });
        }

        if def.param_type == ParameterType::Enum
            && let Some(options) = &def.options
            && !options.iter().any(|o| &o.value == value)
        {
            return Err(TemplateCompileError::InvalidOption {
                name: def.name.clone(),
                value: value.clone(),
            });
        }

        // 数值范围检查
        if let Some(v) = value.as_f64() {
            let below = def.min.is_some_and(|min| v < min);
            let above = def.max.is_some_and(|max| v > max);
            if below || above {
                return Err(TemplateCompileError::ParamOutOfRange {
                    name: def.name.clone(),
                    min: def.min,
                    max: def.max,
                });
            }
        }

        Ok(())
    }

    /// 将用户提供的参数与模板默认值合并
    fn merge_with_defaults(
        &self,
        definitions: &[ParameterDef],
        params: &HashMap<String, Value>,
    ) -> HashMap<String, Value> {
        let mut merged = params.clone();
        for def in definitions {
            if !merged.contains_key(&def.name)
                && let Some(default) = &def.default
            {
                merged.insert(def.name.clone(), default.clone());
            }
        }
        merged
    }

    /// 递归替换模板中的占位符
    ///
    /// 纯占位符字符串（如 "${margin}"）直接返回参数值以保留原始类型；
    /// 混合字符串（如 "margin ${margin}%"）进行文本替换
    fn replace_placeholders(
        &self,
        template: &Value,
        params: &HashMap<String, Value>,
    ) -> CompileResult<Value> {
        match template {
            Value::String(s) => {
                if let Some(name) = whole_placeholder(s) {
                    return params
                        .get(name)
                        .cloned()
                        .ok_or_else(|| TemplateCompileError::MissingParameter(name.to_string()));
                }
                Ok(Value::String(substitute(s, params)))
            }
            Value::Array(arr) => {
                let compiled: CompileResult<Vec<Value>> = arr
                    .iter()
                    .map(|v| self.replace_placeholders(v, params))
                    .collect();
                Ok(Value::Array(compiled?))
            }
            Value::Object(obj) => {
                let mut compiled = Map::new();
                for (k, v) in obj {
                    compiled.insert(k.clone(), self.replace_placeholders(v, params)?);
                }
                Ok(Value::Object(compiled))
            }
            _ => Ok(template.clone()),
        }
    }
}

fn is_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 整个字符串恰好是一个占位符时返回参数名
fn whole_placeholder(s: &str) -> Option<&str> {
    s.strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| is_param_name(name))
}

/// 混合字符串替换；未提供的参数保留原样
fn substitute(s: &str, params: &HashMap<String, Value>) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) if is_param_name(&after[..end]) => {
                let name = &after[..end];
                match params.get(name) {
                    Some(Value::String(v)) => out.push_str(v),
                    Some(v) => out.push_str(&v.to_string()),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str("${");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::models::{ParameterOption, TemplateCategory};
    use serde_json::json;

    fn create_test_template() -> RuleTemplate {
        RuleTemplate {
            code: "low_stock".into(),
            name: "低库存排除".into(),
            description: None,
            category: TemplateCategory::Filtering,
            template_json: json!({
                "condition_groups": [{
                    "logic": "AND",
                    "conditions": [
                        { "field": "stock", "operator": "less_than", "value": "${threshold}" }
                    ]
                }],
                "actions": [ { "type": "exclude_product" } ]
            }),
            parameters: vec![
                ParameterDef::new("threshold", ParameterType::Number, "库存阈值")
                    .required()
                    .with_default(5)
                    .with_range(Some(0.0), Some(10000.0)),
            ],
            version: "1.0".into(),
            is_system: false,
            enabled: true,
        }
    }

    fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_compile_with_params() {
        let compiler = TemplateCompiler::new();
        let rule = compiler
            .compile(&create_test_template(), &params(&[("threshold", json!(3))]))
            .unwrap();

        assert_eq!(rule.condition_groups[0].conditions[0].value, json!(3));
        assert!(rule.id.starts_with("low_stock-"));
        assert_eq!(rule.name, "低库存排除");
    }

    #[test]
    fn test_compile_with_default() {
        let compiler = TemplateCompiler::new();
        let value = compiler
            .compile_value(&create_test_template(), &HashMap::new())
            .unwrap();

        assert_eq!(value["condition_groups"][0]["conditions"][0]["value"], json!(5));
    }

    #[test]
    fn test_missing_required_param() {
        let compiler = TemplateCompiler::new();
        let mut template = create_test_template();
        template.parameters[0].default = None;

        let result = compiler.compile(&template, &HashMap::new());

        assert!(matches!(result, Err(TemplateCompileError::MissingParameter(_))));
    }

    #[test]
    fn test_param_out_of_range() {
        let compiler = TemplateCompiler::new();
        let result = compiler.compile(&create_test_template(), &params(&[("threshold", json!(-1))]));

        assert!(matches!(result, Err(TemplateCompileError::ParamOutOfRange { .. })));
    }

    #[test]
    fn test_type_mismatch() {
        let compiler = TemplateCompiler::new();
        let result = compiler.compile(
            &create_test_template(),
            &params(&[("threshold", json!("five"))]),
        );

        assert!(matches!(result, Err(TemplateCompileError::TypeMismatch { .. })));
    }

    #[test]
    fn test_enum_option_checked() {
        let compiler = TemplateCompiler::new();
        let mut template = create_test_template();
        template.template_json = json!({ "id": "t", "name": "t", "target_marketplaces": ["${channel}"] });
        template.parameters = vec![
            ParameterDef::new("channel", ParameterType::Enum, "渠道").with_options(vec![
                ParameterOption::new("amazon", "Amazon"),
                ParameterOption::new("google", "Google Shopping"),
            ]),
        ];

        let rule = compiler
            .compile(&template, &params(&[("channel", json!("google"))]))
            .unwrap();
        assert_eq!(rule.target_marketplaces, vec!["google"]);
        assert_eq!(rule.id, "t");

        let result = compiler.compile(&template, &params(&[("channel", json!("ebay"))]));
        assert!(matches!(result, Err(TemplateCompileError::InvalidOption { .. })));
    }

    #[test]
    fn test_mixed_string_placeholder() {
        let compiler = TemplateCompiler::new();
        let mut template = create_test_template();
        template.template_json = json!({
            "description": "库存低于 ${threshold} 件时排除, ${unknown} 保留, ${ 不是占位符"
        });

        let value = compiler
            .compile_value(&template, &params(&[("threshold", json!(5))]))
            .unwrap();

        assert_eq!(
            value["description"],
            json!("库存低于 5 件时排除, ${unknown} 保留, ${ 不是占位符")
        );
    }

    #[test]
    fn test_array_param_keeps_type() {
        let compiler = TemplateCompiler::new();
        let mut template = create_test_template();
        template.template_json = json!({ "target_categories": "${categories}" });
        template.parameters = vec![
            ParameterDef::new("categories", ParameterType::Array, "类目").required(),
        ];

        let value = compiler
            .compile_value(&template, &params(&[("categories", json!(["toys", "games"]))]))
            .unwrap();

        assert_eq!(value["target_categories"], json!(["toys", "games"]));
    }

    #[test]
    fn test_invalid_rule_body() {
        let compiler = TemplateCompiler::new();
        let mut template = create_test_template();
        template.template_json = json!({ "actions": [ { "type": "launch_rocket" } ] });

        let result = compiler.compile(&template, &HashMap::new());
        assert!(matches!(result, Err(TemplateCompileError::InvalidRule(_))));
    }
}
