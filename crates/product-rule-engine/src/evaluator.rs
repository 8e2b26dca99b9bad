//! 条件评估器
//!
//! `ConditionEvaluator` 实现单个操作符的比较逻辑；`TreeEvaluator` 对编译后的条件树
//! 做结构递归，AND/OR 短路求值，并把求值过程中的异常收集为诊断信息。
//!
//! 所有异常都按"不匹配"处理：类型不匹配、无效正则、模板展开失败都只会让该叶子为 false。

use crate::compiler::{CompiledCondition, CompiledGroup, CompiledNode, CompiledPattern};
use crate::context::ExecutionContext;
use crate::error::ConditionError;
use crate::operators::{LogicalOperator, Operator};
use crate::record::{ProductRecord, as_f64, is_empty_value};
use crate::renderer::TemplateRenderer;
use regex::RegexBuilder;
use serde_json::{Number, Value};

type EvalResult = std::result::Result<bool, ConditionError>;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `field_value` - 从商品记录中取到的字段值，`None` 表示字段不存在
    /// * `operator` - 操作符
    /// * `expected_value` - 规则中定义的期望值（已完成模板渲染）
    /// * `case_sensitive` - 字符串比较是否区分大小写
    /// * `pattern` - 预编译的正则，`None` 时按需编译
    pub fn evaluate(
        field_value: Option<&Value>,
        operator: Operator,
        expected_value: &Value,
        case_sensitive: bool,
        pattern: Option<&CompiledPattern>,
    ) -> EvalResult {
        match operator {
            Operator::IsEmpty => return Ok(is_empty_value(field_value)),
            Operator::IsNotEmpty => return Ok(!is_empty_value(field_value)),
            _ => {}
        }

        // 字段不存在：否定形式的包含检查成立，其余操作一律不匹配
        let Some(field) = field_value else {
            return Ok(matches!(operator, Operator::NotContains | Operator::NotInList));
        };

        match operator {
            Operator::Equals => Ok(Self::eq(field, expected_value, case_sensitive)),
            Operator::NotEquals => Ok(!Self::eq(field, expected_value, case_sensitive)),
            Operator::Contains => Self::contains(field, expected_value, case_sensitive),
            Operator::NotContains => {
                Self::contains(field, expected_value, case_sensitive).map(|r| !r)
            }
            Operator::InList => Self::in_list(field, expected_value, case_sensitive),
            Operator::NotInList => Self::in_list(field, expected_value, case_sensitive).map(|r| !r),
            Operator::StartsWith => Self::affix(field, expected_value, case_sensitive, |s, p| {
                s.starts_with(p)
            }),
            Operator::EndsWith => Self::affix(field, expected_value, case_sensitive, |s, p| {
                s.ends_with(p)
            }),
            Operator::MatchesRegex => {
                Self::regex_match(field, expected_value, case_sensitive, pattern)
            }
            Operator::GreaterThan => Self::compare(field, expected_value, |a, b| a > b),
            Operator::LessThan => Self::compare(field, expected_value, |a, b| a < b),
            Operator::GreaterOrEqual => Self::compare(field, expected_value, |a, b| a >= b),
            Operator::LessOrEqual => Self::compare(field, expected_value, |a, b| a <= b),
            Operator::LengthGreaterThan => Self::length(field, expected_value, |a, b| a > b),
            Operator::LengthLessThan => Self::length(field, expected_value, |a, b| a < b),
            Operator::IsEmpty | Operator::IsNotEmpty => Ok(false),
        }
    }

    /// 相等比较
    fn eq(field: &Value, expected: &Value, case_sensitive: bool) -> bool {
        // 任一侧是数字时按数值比较（100 == 100.0 == "100"）
        if (field.is_number() || expected.is_number())
            && let (Some(a), Some(b)) = (Self::as_number(field), Self::as_number(expected))
        {
            return Self::numbers_equal(&a, &b);
        }

        match (field, expected) {
            (Value::String(a), Value::String(b)) if !case_sensitive => {
                a.to_lowercase() == b.to_lowercase()
            }
            _ => field == expected,
        }
    }

    fn as_number(value: &Value) -> Option<Number> {
        match value {
            Value::Number(n) => Some(n.clone()),
            Value::String(s) => serde_json::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// 两侧都是整数时精确比较，否则按 f64 `==` 比较
    fn numbers_equal(a: &Number, b: &Number) -> bool {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return x == y;
        }
        if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
            return x == y;
        }
        let integral = |n: &Number| n.is_i64() || n.is_u64();
        if integral(a) && integral(b) {
            return false;
        }
        matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
    }

    /// 字符串子串检查 / 数组成员检查
    fn contains(field: &Value, expected: &Value, case_sensitive: bool) -> EvalResult {
        match field {
            Value::String(s) => {
                let needle =
                    Self::scalar_text(expected).ok_or_else(|| ConditionError::mismatch("string", expected))?;
                Ok(if case_sensitive {
                    s.contains(needle.as_str())
                } else {
                    s.to_lowercase().contains(&needle.to_lowercase())
                })
            }
            Value::Array(items) => Ok(items
                .iter()
                .any(|item| Self::eq(item, expected, case_sensitive))),
            _ => Err(ConditionError::mismatch("string or array", field)),
        }
    }

    /// 列表包含检查
    fn in_list(field: &Value, expected: &Value, case_sensitive: bool) -> EvalResult {
        let items = expected
            .as_array()
            .ok_or_else(|| ConditionError::mismatch("array", expected))?;

        Ok(items
            .iter()
            .any(|item| Self::eq(field, item, case_sensitive)))
    }

    /// 前缀/后缀检查
    fn affix<F>(field: &Value, expected: &Value, case_sensitive: bool, check: F) -> EvalResult
    where
        F: Fn(&str, &str) -> bool,
    {
        let s = field
            .as_str()
            .ok_or_else(|| ConditionError::mismatch("string", field))?;
        let affix =
            Self::scalar_text(expected).ok_or_else(|| ConditionError::mismatch("string", expected))?;

        Ok(if case_sensitive {
            check(s, &affix)
        } else {
            check(&s.to_lowercase(), &affix.to_lowercase())
        })
    }

    /// 正则表达式匹配
    fn regex_match(
        field: &Value,
        expected: &Value,
        case_sensitive: bool,
        pattern: Option<&CompiledPattern>,
    ) -> EvalResult {
        let text =
            Self::scalar_text(field).ok_or_else(|| ConditionError::mismatch("string", field))?;

        let matched = match pattern {
            Some(Ok(regex)) => regex.is_match(&text),
            Some(Err(e)) => return Err(ConditionError::InvalidPattern(e.clone())),
            None => {
                let source = expected
                    .as_str()
                    .ok_or_else(|| ConditionError::mismatch("string (regex pattern)", expected))?;
                RegexBuilder::new(source)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| {
                        ConditionError::InvalidPattern(format!(
                            "无效的正则表达式 '{}': {}",
                            source, e
                        ))
                    })?
                    .is_match(&text)
            }
        };

        Ok(matched)
    }

    /// 数值比较，两侧都会尝试把数字字符串转换为数字
    fn compare<F>(field: &Value, expected: &Value, cmp: F) -> EvalResult
    where
        F: Fn(f64, f64) -> bool,
    {
        let a = as_f64(field).ok_or_else(|| ConditionError::mismatch("number", field))?;
        let b = as_f64(expected).ok_or_else(|| ConditionError::mismatch("number", expected))?;
        Ok(cmp(a, b))
    }

    /// 字符长度（字符串）或元素个数（数组）比较
    fn length<F>(field: &Value, expected: &Value, cmp: F) -> EvalResult
    where
        F: Fn(f64, f64) -> bool,
    {
        let len = match field {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            _ => return Err(ConditionError::mismatch("string or array", field)),
        };
        let limit = as_f64(expected).ok_or_else(|| ConditionError::mismatch("number", expected))?;
        Ok(cmp(len as f64, limit))
    }

    fn scalar_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// 条件树求值器
///
/// 生命周期绑定到一次规则求值，诊断信息在求值结束后通过 `into_diagnostics` 取出。
pub struct TreeEvaluator<'a> {
    record: &'a ProductRecord,
    context: &'a ExecutionContext,
    renderer: &'a TemplateRenderer,
    diagnostics: Vec<String>,
}

impl<'a> TreeEvaluator<'a> {
    pub fn new(
        record: &'a ProductRecord,
        context: &'a ExecutionContext,
        renderer: &'a TemplateRenderer,
    ) -> Self {
        Self {
            record,
            context,
            renderer,
            diagnostics: Vec::new(),
        }
    }

    /// 规则顶层：多个条件组按 `root_logic` 组合
    pub fn evaluate_root(&mut self, groups: &[CompiledGroup], logic: LogicalOperator) -> bool {
        fold(logic, groups.iter(), |group| self.evaluate_group(group))
    }

    pub fn evaluate_group(&mut self, group: &CompiledGroup) -> bool {
        fold(group.logic, group.children.iter(), |node| match node {
            CompiledNode::Leaf(leaf) => self.evaluate_leaf(leaf),
            CompiledNode::Group(nested) => self.evaluate_group(nested),
        })
    }

    fn evaluate_leaf(&mut self, leaf: &CompiledCondition) -> bool {
        let condition = &leaf.condition;

        let rendered;
        let expected = match &leaf.value_template {
            Some(template) => match self.renderer.render(template, self.record, self.context) {
                Ok(out) => {
                    if !out.unresolved.is_empty() {
                        self.diagnostics.push(format!(
                            "{}: 比较值中的变量未解析: {}",
                            leaf.path,
                            out.unresolved.join(", ")
                        ));
                    }
                    rendered = Value::String(out.text);
                    &rendered
                }
                Err(e) => {
                    self.diagnostics.push(format!("{}: {}", leaf.path, e));
                    return false;
                }
            },
            None => &condition.value,
        };

        let result = ConditionEvaluator::evaluate(
            self.record.get_field(&condition.field),
            condition.operator,
            expected,
            condition.case_sensitive,
            leaf.pattern.as_ref(),
        );

        match result {
            Ok(matched) => matched,
            Err(e) => {
                self.diagnostics.push(format!(
                    "{} ({} {}): {}",
                    leaf.path, condition.field, condition.operator, e
                ));
                false
            }
        }
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<String> {
        self.diagnostics
    }
}

/// AND 遇到 false 短路，OR 遇到 true 短路；空集合分别为 true / false
fn fold<T, F>(logic: LogicalOperator, mut items: impl Iterator<Item = T>, mut eval: F) -> bool
where
    F: FnMut(T) -> bool,
{
    match logic {
        LogicalOperator::And => items.all(|item| eval(item)),
        LogicalOperator::Or => items.any(|item| eval(item)),
    }
}
