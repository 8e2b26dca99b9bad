//! 规则编译器
//!
//! 将规则编译成内存中的执行树：条件组转换为 `Leaf | Group` 结构，
//! 正则与模板在编译期解析一次，整个快照生命周期内复用。

use crate::error::{Result, RuleError};
use crate::models::{Action, Condition, ConditionGroup, Rule};
use crate::operators::{ActionType, LogicalOperator, Operator};
use crate::renderer::Template;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::HashSet;

/// 预编译的正则；无效模式保留错误信息，求值时记录诊断而不是报错
pub type CompiledPattern = std::result::Result<Regex, String>;

/// 编译后的条件
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub condition: Condition,
    /// 条件在规则中的位置，如 `groups[0].conditions[1]`
    pub path: String,
    /// 比较值中含占位符时的模板
    pub value_template: Option<Template>,
    pub pattern: Option<CompiledPattern>,
}

/// 编译后的条件组
#[derive(Debug, Clone)]
pub struct CompiledGroup {
    pub logic: LogicalOperator,
    pub children: Vec<CompiledNode>,
}

/// 条件树节点
#[derive(Debug, Clone)]
pub enum CompiledNode {
    Leaf(CompiledCondition),
    Group(CompiledGroup),
}

/// 编译后的动作
#[derive(Debug, Clone)]
pub struct CompiledAction {
    pub action: Action,
    pub label: String,
    /// replace_text / remove_text 的匹配模式（正则或忽略大小写的字面量）
    pub pattern: Option<CompiledPattern>,
}

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// 原始规则
    pub rule: Rule,
    pub groups: Vec<CompiledGroup>,
    pub actions: Vec<CompiledAction>,
    /// 规则条件中使用的所有字段路径
    pub required_fields: HashSet<String>,
    /// 编译版本号
    pub compile_version: u64,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.rule.id
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    /// 编译期记录的无效正则
    pub fn invalid_patterns(&self) -> Vec<String> {
        fn collect(group: &CompiledGroup, out: &mut Vec<String>) {
            for child in &group.children {
                match child {
                    CompiledNode::Leaf(leaf) => {
                        if let Some(Err(e)) = &leaf.pattern {
                            out.push(format!("{}: {}", leaf.path, e));
                        }
                    }
                    CompiledNode::Group(group) => collect(group, out),
                }
            }
        }

        let mut out = Vec::new();
        for group in &self.groups {
            collect(group, &mut out);
        }
        for action in &self.actions {
            if let Some(Err(e)) = &action.pattern {
                out.push(format!("{}: {}", action.label, e));
            }
        }
        out
    }
}

/// 规则编译器
pub struct RuleCompiler {
    compile_version: u64,
    max_condition_depth: usize,
}

impl RuleCompiler {
    pub const DEFAULT_MAX_CONDITION_DEPTH: usize = 32;

    pub fn new() -> Self {
        Self::with_max_depth(Self::DEFAULT_MAX_CONDITION_DEPTH)
    }

    pub fn with_max_depth(max_condition_depth: usize) -> Self {
        Self {
            compile_version: 0,
            max_condition_depth,
        }
    }

    /// 从 JSON 字符串编译规则
    pub fn compile_from_json(&mut self, json: &str) -> Result<CompiledRule> {
        let rule: Rule = serde_json::from_str(json)?;
        self.compile(rule)
    }

    /// 编译规则
    pub fn compile(&mut self, rule: Rule) -> Result<CompiledRule> {
        self.validate_rule(&rule)?;

        let mut required_fields = HashSet::new();
        let groups = rule
            .condition_groups
            .iter()
            .enumerate()
            .map(|(i, group)| {
                Self::compile_group(group, &format!("groups[{}]", i), &mut required_fields)
            })
            .collect();

        let actions = rule
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| Self::compile_action(action, i))
            .collect();

        self.compile_version += 1;

        Ok(CompiledRule {
            rule,
            groups,
            actions,
            required_fields,
            compile_version: self.compile_version,
        })
    }

    /// 验证规则结构
    fn validate_rule(&self, rule: &Rule) -> Result<()> {
        if rule.id.trim().is_empty() {
            return Err(RuleError::CompileError("规则 ID 不能为空".to_string()));
        }

        let depth = rule
            .condition_groups
            .iter()
            .map(ConditionGroup::depth)
            .max()
            .unwrap_or(0);

        if depth > self.max_condition_depth {
            return Err(RuleError::ConditionTooDeep {
                rule_id: rule.id.clone(),
                depth,
                max: self.max_condition_depth,
            });
        }

        Ok(())
    }

    fn compile_group(
        group: &ConditionGroup,
        path: &str,
        fields: &mut HashSet<String>,
    ) -> CompiledGroup {
        let mut children = Vec::with_capacity(group.conditions.len() + group.groups.len());

        for (i, condition) in group.conditions.iter().enumerate() {
            fields.insert(condition.field.clone());
            children.push(CompiledNode::Leaf(Self::compile_condition(
                condition,
                format!("{}.conditions[{}]", path, i),
            )));
        }

        for (i, nested) in group.groups.iter().enumerate() {
            children.push(CompiledNode::Group(Self::compile_group(
                nested,
                &format!("{}.groups[{}]", path, i),
                fields,
            )));
        }

        CompiledGroup {
            logic: group.logic,
            children,
        }
    }

    fn compile_condition(condition: &Condition, path: String) -> CompiledCondition {
        let pattern = (condition.operator == Operator::MatchesRegex).then(|| {
            match condition.value.as_str() {
                Some(pattern) => build_regex(pattern, condition.case_sensitive),
                None => Err(format!(
                    "正则模式必须是字符串, 实际 {}",
                    crate::record::value_type_name(&condition.value)
                )),
            }
        });

        let value_template = match (&condition.value, condition.operator) {
            (_, Operator::MatchesRegex) => None,
            (Value::String(s), _) => Some(Template::parse(s)).filter(Template::has_variables),
            _ => None,
        };

        CompiledCondition {
            condition: condition.clone(),
            path,
            value_template,
            pattern,
        }
    }

    fn compile_action(action: &Action, index: usize) -> CompiledAction {
        let pattern = match action.action_type {
            ActionType::ReplaceText | ActionType::RemoveText => {
                let is_regex = action.option_bool("regex").unwrap_or(false);
                let case_sensitive = action.option_bool("case_sensitive").unwrap_or(true);
                let search = action.value.as_ref().and_then(Value::as_str);

                match search {
                    Some(search) if is_regex => Some(build_regex(search, case_sensitive)),
                    Some(search) if !case_sensitive => {
                        Some(build_regex(&regex::escape(search), false))
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        CompiledAction {
            action: action.clone(),
            label: action.label(index),
            pattern,
        }
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn build_regex(pattern: &str, case_sensitive: bool) -> CompiledPattern {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| format!("无效的正则表达式 '{}': {}", pattern, e))
}
