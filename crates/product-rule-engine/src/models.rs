//! 规则引擎领域模型

use crate::operators::{ActionType, LogicalOperator, Operator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn default_true() -> bool {
    true
}

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 数值越小越先执行
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub root_logic: LogicalOperator,
    #[serde(default)]
    pub condition_groups: Vec<ConditionGroup>,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// 为空表示适用于所有渠道
    #[serde(default)]
    pub target_marketplaces: Vec<String>,
    /// 为空表示适用于所有类目
    #[serde(default)]
    pub target_categories: Vec<String>,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            enabled: true,
            priority: 0,
            root_logic: LogicalOperator::And,
            condition_groups: Vec::new(),
            actions: Vec::new(),
            target_marketplaces: Vec::new(),
            target_categories: Vec::new(),
            execution_count: 0,
            success_count: 0,
            last_executed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_root_logic(mut self, logic: LogicalOperator) -> Self {
        self.root_logic = logic;
        self
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.condition_groups.push(group);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn for_marketplaces<I, S>(mut self, marketplaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_marketplaces = marketplaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn for_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// 检查规则的渠道与类目范围
    pub fn applies_to(&self, marketplace: &str, category: Option<&str>) -> bool {
        let marketplace_ok = self.target_marketplaces.is_empty()
            || self.target_marketplaces.iter().any(|m| m == marketplace);

        let category_ok = self.target_categories.is_empty()
            || category.is_some_and(|c| self.target_categories.iter().any(|t| t == c));

        marketplace_ok && category_ok
    }
}

/// 条件节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    /// 仅对字符串比较生效
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            case_sensitive: true,
        }
    }

    /// 无需比较值的条件（is_empty / is_not_empty）
    pub fn unary(field: impl Into<String>, operator: Operator) -> Self {
        Self::new(field, operator, Value::Null)
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }
}

/// 条件组
///
/// 组内先求值 `conditions`，再求值嵌套的 `groups`。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub logic: LogicalOperator,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub groups: Vec<ConditionGroup>,
}

impl ConditionGroup {
    pub fn new(logic: LogicalOperator, conditions: Vec<Condition>) -> Self {
        Self {
            logic,
            conditions,
            groups: Vec::new(),
        }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Self::new(LogicalOperator::And, conditions)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::new(LogicalOperator::Or, conditions)
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// 嵌套深度，单层组为 1
    pub fn depth(&self) -> usize {
        1 + self.groups.iter().map(ConditionGroup::depth).max().unwrap_or(0)
    }
}

/// 动作定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
    /// 可选动作的规则级错误降级为跳过
    #[serde(default)]
    pub optional: bool,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            id: String::new(),
            action_type,
            target_field: None,
            value: None,
            template: None,
            options: Map::new(),
            optional: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn target(mut self, field: impl Into<String>) -> Self {
        self.target_field = Some(field.into());
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// 日志中使用的动作标识：显式 id，否则为 `类型#序号`
    pub fn label(&self, index: usize) -> String {
        if self.id.is_empty() {
            format!("{}#{}", self.action_type, index)
        } else {
            self.id.clone()
        }
    }

    /// 目标字段，未指定时回退到动作类型的默认字段
    pub fn resolved_target(&self) -> Option<&str> {
        self.target_field
            .as_deref()
            .filter(|f| !f.is_empty())
            .or_else(|| self.action_type.default_target())
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(Value::as_bool)
    }

    pub fn option_f64(&self, key: &str) -> Option<f64> {
        self.options.get(key).and_then(crate::record::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_serialization() {
        let rule = Rule::new("brand_prefix")
            .with_id("rule-001")
            .with_priority(1)
            .with_group(ConditionGroup::and(vec![
                Condition::unary("brand", Operator::IsNotEmpty),
                Condition::new("title", Operator::NotContains, "{{brand}}"),
            ]))
            .with_action(
                Action::new(ActionType::PrependText)
                    .target("title")
                    .template("{{brand}} - "),
            );

        let json = serde_json::to_string_pretty(&rule).unwrap();
        let parsed: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "rule-001");
        assert_eq!(parsed.condition_groups[0].conditions.len(), 2);
        assert_eq!(parsed.actions[0].action_type, ActionType::PrependText);
    }

    #[test]
    fn test_rule_deserialization_defaults() {
        let json = r#"
        {
            "id": "rule-002",
            "name": "low_stock",
            "priority": 5,
            "condition_groups": [
                {
                    "logic": "AND",
                    "conditions": [
                        { "field": "stock", "operator": "less_than", "value": 5 }
                    ]
                }
            ],
            "actions": [ { "id": "a1", "type": "exclude_product" } ]
        }
        "#;

        let rule: Rule = serde_json::from_str(json).unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.root_logic, LogicalOperator::And);
        assert!(rule.target_marketplaces.is_empty());
        assert!(rule.condition_groups[0].conditions[0].case_sensitive);
        assert_eq!(rule.execution_count, 0);
        assert_eq!(rule.actions[0].label(0), "a1");
    }

    #[test]
    fn test_applies_to_scope() {
        let rule = Rule::new("scoped")
            .for_marketplaces(["amazon"])
            .for_categories(["electronics"]);

        assert!(rule.applies_to("amazon", Some("electronics")));
        assert!(!rule.applies_to("google", Some("electronics")));
        assert!(!rule.applies_to("amazon", Some("toys")));
        assert!(!rule.applies_to("amazon", None));

        let global = Rule::new("global");
        assert!(global.applies_to("anything", None));
    }

    #[test]
    fn test_group_depth() {
        let group = ConditionGroup::and(vec![])
            .with_group(ConditionGroup::or(vec![]).with_group(ConditionGroup::and(vec![])))
            .with_group(ConditionGroup::or(vec![]));
        assert_eq!(group.depth(), 3);
    }

    #[test]
    fn test_action_label_and_target() {
        let action = Action::new(ActionType::AddTag).value("sale");
        assert_eq!(action.label(2), "add_tag#2");
        assert_eq!(action.resolved_target(), Some("tags"));

        let action = Action::new(ActionType::AddTag).target("labels").option("decimals", json!(2));
        assert_eq!(action.resolved_target(), Some("labels"));
        assert_eq!(action.option_f64("decimals"), Some(2.0));
    }
}
