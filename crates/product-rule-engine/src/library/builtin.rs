//! 内置规则模板

use super::models::{ParameterDef, ParameterOption, ParameterType, RuleTemplate, TemplateCategory};
use serde_json::json;

const VERSION: &str = "1.0.0";

/// 系统内置的起步模板
pub fn builtin_templates() -> Vec<RuleTemplate> {
    vec![
        brand_prefix(),
        low_stock_exclusion(),
        category_margin(),
        title_cleanup(),
        clearance_tag(),
    ]
}

/// 按编码查找内置模板
pub fn find_builtin(code: &str) -> Option<RuleTemplate> {
    builtin_templates().into_iter().find(|t| t.code == code)
}

fn system(
    code: &str,
    name: &str,
    description: &str,
    category: TemplateCategory,
    template_json: serde_json::Value,
    parameters: Vec<ParameterDef>,
) -> RuleTemplate {
    RuleTemplate {
        code: code.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        category,
        template_json,
        parameters,
        version: VERSION.to_string(),
        is_system: true,
        enabled: true,
    }
}

fn brand_prefix() -> RuleTemplate {
    system(
        "brand_prefix",
        "标题添加品牌前缀",
        "品牌不为空且标题中不含品牌时，在标题前加上品牌",
        TemplateCategory::Content,
        json!({
            "priority": "${priority}",
            "condition_groups": [{
                "logic": "AND",
                "conditions": [
                    { "field": "brand", "operator": "is_not_empty" },
                    { "field": "title", "operator": "not_contains", "value": "{{brand}}", "case_sensitive": false }
                ]
            }],
            "actions": [{
                "id": "prepend_brand",
                "type": "prepend_text",
                "target_field": "title",
                "template": "{{brand}}${separator}"
            }]
        }),
        vec![
            ParameterDef::new("separator", ParameterType::String, "分隔符").with_default(" - "),
            ParameterDef::new("priority", ParameterType::Number, "优先级").with_default(10),
        ],
    )
}

fn low_stock_exclusion() -> RuleTemplate {
    system(
        "low_stock_exclusion",
        "低库存排除",
        "库存低于阈值的商品不导出到渠道",
        TemplateCategory::Filtering,
        json!({
            "priority": 1,
            "condition_groups": [{
                "logic": "AND",
                "conditions": [
                    { "field": "stock", "operator": "less_than", "value": "${threshold}" }
                ]
            }],
            "actions": [{ "id": "exclude", "type": "exclude_product" }]
        }),
        vec![
            ParameterDef::new("threshold", ParameterType::Number, "库存阈值")
                .required()
                .with_default(5)
                .with_range(Some(0.0), None),
        ],
    )
}

fn category_margin() -> RuleTemplate {
    system(
        "category_margin",
        "类目利润率",
        "按成本为指定类目的商品重新定价",
        TemplateCategory::Pricing,
        json!({
            "priority": 50,
            "target_categories": ["${category}"],
            "actions": [{
                "id": "margin",
                "type": "apply_margin",
                "value": "${margin}",
                "options": { "decimals": "${decimals}" }
            }]
        }),
        vec![
            ParameterDef::new("category", ParameterType::String, "类目").required(),
            ParameterDef::new("margin", ParameterType::Number, "利润率 (%)")
                .required()
                .with_range(Some(0.0), Some(1000.0)),
            ParameterDef::new("decimals", ParameterType::Number, "小数位")
                .with_default(2)
                .with_range(Some(0.0), Some(4.0)),
        ],
    )
}

fn title_cleanup() -> RuleTemplate {
    system(
        "title_cleanup",
        "标题清理",
        "去除多余空白并统一大小写",
        TemplateCategory::Content,
        json!({
            "priority": 5,
            "condition_groups": [{
                "logic": "AND",
                "conditions": [ { "field": "title", "operator": "is_not_empty" } ]
            }],
            "actions": [
                { "id": "trim", "type": "trim", "target_field": "title" },
                { "id": "case", "type": "${case}", "target_field": "title" }
            ]
        }),
        vec![
            ParameterDef::new("case", ParameterType::Enum, "大小写")
                .with_default("capitalize")
                .with_options(vec![
                    ParameterOption::new("capitalize", "首字母大写"),
                    ParameterOption::new("uppercase", "全部大写"),
                    ParameterOption::new("lowercase", "全部小写"),
                ]),
        ],
    )
}

fn clearance_tag() -> RuleTemplate {
    system(
        "clearance_tag",
        "清仓标签",
        "库存过高时打上清仓标签",
        TemplateCategory::Content,
        json!({
            "priority": 20,
            "condition_groups": [{
                "logic": "AND",
                "conditions": [
                    { "field": "stock", "operator": "greater_than", "value": "${min_stock}" }
                ]
            }],
            "actions": [{ "id": "tag", "type": "add_tag", "value": "${tag}" }]
        }),
        vec![
            ParameterDef::new("min_stock", ParameterType::Number, "库存下限")
                .with_default(100)
                .with_range(Some(0.0), None),
            ParameterDef::new("tag", ParameterType::String, "标签").with_default("clearance"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::TemplateCompiler;
    use std::collections::HashMap;

    #[test]
    fn test_builtin_templates_compile_with_defaults() {
        let compiler = TemplateCompiler::new();
        for template in builtin_templates() {
            assert!(template.is_valid(), "{}", template.code);
            if template.parameters.iter().all(|p| !p.required || p.default.is_some()) {
                let rule = compiler.compile(&template, &HashMap::new());
                assert!(rule.is_ok(), "{}: {:?}", template.code, rule.err());
            }
        }
    }

    #[test]
    fn test_categories_covered() {
        let templates = builtin_templates();
        for category in [
            TemplateCategory::Pricing,
            TemplateCategory::Content,
            TemplateCategory::Filtering,
        ] {
            assert!(templates.iter().any(|t| t.category == category));
        }
        assert!(find_builtin("category_margin").is_some());
        assert!(find_builtin("missing").is_none());
    }
}
