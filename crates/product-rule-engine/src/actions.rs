//! 动作执行器
//!
//! 每个动作作用在规则的工作副本上。返回值区分三种结果：
//! - `Ok(ActionOutcome)`：动作已执行，`changed` 表示记录是否真的变化
//! - `Err(ActionError::Skipped)`：动作被跳过，工作副本保持不变
//! - `Err(ActionError::Fatal)`：规则级错误，调用方丢弃整个工作副本

use crate::compiler::CompiledAction;
use crate::context::ExecutionContext;
use crate::error::{ActionError, TemplateError};
use crate::models::Action;
use crate::operators::ActionType;
use crate::record::{ProductRecord, as_f64, number_value};
use crate::renderer::{Template, TemplateRenderer, format_value};
use serde_json::Value;

type ActionResult<T> = std::result::Result<T, ActionError>;

const DEFAULT_DECIMALS: f64 = 2.0;
const MAX_DECIMALS: f64 = 10.0;

/// 动作执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    pub changed: bool,
    /// 渲染时未解析到值的变量
    pub unresolved: Vec<String>,
}

/// 动作执行器
#[derive(Debug, Clone, Default)]
pub struct ActionExecutor {
    renderer: TemplateRenderer,
}

impl ActionExecutor {
    pub fn new(renderer: TemplateRenderer) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// 对工作副本执行一个动作
    pub fn apply(
        &self,
        compiled: &CompiledAction,
        record: &mut ProductRecord,
        context: &ExecutionContext,
    ) -> ActionResult<ActionOutcome> {
        let action = &compiled.action;
        let mut unresolved = Vec::new();

        let target = action
            .resolved_target()
            .map(str::to_string)
            .ok_or_else(|| ActionError::skipped("未指定目标字段"))?;

        let changed = match action.action_type {
            ActionType::SetField | ActionType::TransformTemplate => {
                let value = self
                    .payload(action, record, context, &mut unresolved)?
                    .ok_or_else(|| ActionError::skipped("缺少 value 或 template"))?;
                write(record, &target, value)?
            }

            ActionType::AppendText | ActionType::PrependText => {
                let text = self
                    .payload(action, record, context, &mut unresolved)?
                    .as_ref()
                    .and_then(format_value)
                    .ok_or_else(|| ActionError::skipped("缺少追加文本"))?;
                let current = optional_text(record, &target)?;

                let updated = if action.action_type == ActionType::AppendText {
                    format!("{}{}", current, text)
                } else {
                    format!("{}{}", text, current)
                };
                write(record, &target, Value::String(updated))?
            }

            ActionType::ReplaceText | ActionType::RemoveText => {
                let replacement = if action.action_type == ActionType::RemoveText {
                    String::new()
                } else {
                    self.replacement(action, record, context, &mut unresolved)?
                };
                let current = required_text(record, &target)?;
                let updated = Self::replace(compiled, &current, &replacement)?;
                write(record, &target, Value::String(updated))?
            }

            ActionType::Uppercase
            | ActionType::Lowercase
            | ActionType::Capitalize
            | ActionType::Trim => {
                let current = required_text(record, &target)?;
                let updated = match action.action_type {
                    ActionType::Uppercase => current.to_uppercase(),
                    ActionType::Lowercase => current.to_lowercase(),
                    ActionType::Capitalize => capitalize(&current),
                    _ => current.split_whitespace().collect::<Vec<_>>().join(" "),
                };
                write(record, &target, Value::String(updated))?
            }

            ActionType::CopyFrom => {
                let source = action
                    .option_str("source_field")
                    .or_else(|| action.value.as_ref().and_then(Value::as_str))
                    .ok_or_else(|| ActionError::skipped("未指定来源字段"))?;
                let value = record
                    .get_field(source)
                    .filter(|v| !v.is_null())
                    .cloned()
                    .ok_or_else(|| ActionError::skipped(format!("来源字段不存在: {}", source)))?;
                write(record, &target, value)?
            }

            ActionType::AddTag | ActionType::RemoveTag => {
                let tags = self.tags(action, record, context, &mut unresolved)?;
                Self::update_tags(record, &target, &tags, action.action_type == ActionType::AddTag)?
            }

            ActionType::SetCategory => {
                let category = self
                    .payload(action, record, context, &mut unresolved)?
                    .as_ref()
                    .and_then(format_value)
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| ActionError::skipped("缺少目标类目"))?;

                if !context.is_known_category(&category) {
                    return Err(ActionError::skipped(format!(
                        "类目不在渠道类目体系中: {}",
                        category
                    )));
                }
                write(record, &target, Value::String(category))?
            }

            ActionType::ApplyMargin => {
                let margin = self
                    .numeric_payload(action, record, context, &mut unresolved)?
                    .or_else(|| action.option_f64("margin"))
                    .ok_or_else(|| ActionError::skipped("缺少利润率"))?;

                let cost_field = action.option_str("cost_field").unwrap_or("cost");
                let cost = record
                    .get_field(cost_field)
                    .and_then(as_f64)
                    .filter(|c| *c > 0.0)
                    .ok_or_else(|| {
                        ActionError::skipped(format!("成本缺失或不大于 0: {}", cost_field))
                    })?;

                let mut price = round_to(cost * (1.0 + margin / 100.0), decimals(action, None));
                if let Some(max_price) = action.option_f64("max_price") {
                    price = price.min(max_price);
                }
                if price < 0.0 {
                    return Err(ActionError::skipped("计算结果为负价格"));
                }
                write_number(record, &target, price)?
            }

            ActionType::SetPrice => {
                let price = self
                    .numeric_payload(action, record, context, &mut unresolved)?
                    .ok_or_else(|| ActionError::skipped("缺少价格"))?;
                let price = round_to(price.max(0.0), decimals(action, None));
                write_number(record, &target, price)?
            }

            ActionType::Multiply | ActionType::Add => {
                let current = required_number(record, &target)?;
                let operand = self
                    .numeric_payload(action, record, context, &mut unresolved)?
                    .ok_or_else(|| ActionError::skipped("缺少数值参数"))?;

                let result = if action.action_type == ActionType::Multiply {
                    current * operand
                } else {
                    current + operand
                };
                let result = round_to(result, decimals(action, None));
                if result.is_nan() || result < 0.0 {
                    return Err(ActionError::skipped(format!("计算结果无效: {}", result)));
                }
                write_number(record, &target, result)?
            }

            ActionType::Round => {
                let current = required_number(record, &target)?;
                let places = self.numeric_payload(action, record, context, &mut unresolved)?;
                write_number(record, &target, round_to(current, decimals(action, places)))?
            }

            ActionType::ExcludeProduct => write(record, &target, Value::Bool(false))?,
            ActionType::IncludeProduct => write(record, &target, Value::Bool(true))?,
        };

        Ok(ActionOutcome {
            changed,
            unresolved,
        })
    }

    /// 动作的取值：`template` 优先，其次是 `value`（字符串值同样会渲染）
    fn payload(
        &self,
        action: &Action,
        record: &ProductRecord,
        context: &ExecutionContext,
        unresolved: &mut Vec<String>,
    ) -> ActionResult<Option<Value>> {
        if let Some(template) = &action.template {
            let text = self.render(action, template, record, context, unresolved)?;
            return Ok(Some(Value::String(text)));
        }

        match &action.value {
            Some(Value::String(s)) => {
                let text = self.render(action, s, record, context, unresolved)?;
                Ok(Some(Value::String(text)))
            }
            Some(Value::Null) | None => Ok(None),
            Some(other) => Ok(Some(other.clone())),
        }
    }

    fn numeric_payload(
        &self,
        action: &Action,
        record: &ProductRecord,
        context: &ExecutionContext,
        unresolved: &mut Vec<String>,
    ) -> ActionResult<Option<f64>> {
        match self.payload(action, record, context, unresolved)? {
            None => Ok(None),
            Some(value) => as_f64(&value)
                .filter(|n| n.is_finite())
                .map(Some)
                .ok_or_else(|| ActionError::skipped(format!("不是有效数字: {}", value))),
        }
    }

    /// replace_text 的替换文本：`template` 优先，其次 `options.replacement`
    fn replacement(
        &self,
        action: &Action,
        record: &ProductRecord,
        context: &ExecutionContext,
        unresolved: &mut Vec<String>,
    ) -> ActionResult<String> {
        let source = action
            .template
            .as_deref()
            .or_else(|| action.option_str("replacement"))
            .unwrap_or_default();
        self.render(action, source, record, context, unresolved)
    }

    /// 标签列表：数组值中的每个元素，或单个字符串
    fn tags(
        &self,
        action: &Action,
        record: &ProductRecord,
        context: &ExecutionContext,
        unresolved: &mut Vec<String>,
    ) -> ActionResult<Vec<String>> {
        let tags: Vec<String> = match self.payload(action, record, context, unresolved)? {
            Some(Value::Array(items)) => items.iter().filter_map(format_value).collect(),
            Some(value) => format_value(&value).into_iter().collect(),
            None => Vec::new(),
        };

        let tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if tags.is_empty() {
            return Err(ActionError::skipped("缺少标签"));
        }
        Ok(tags)
    }

    /// 集合语义的标签增删，已处于目标状态时不做修改
    fn update_tags(
        record: &mut ProductRecord,
        target: &str,
        tags: &[String],
        add: bool,
    ) -> ActionResult<bool> {
        let mut current = match record.get_field(target) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(ActionError::skipped(format!("标签字段不是数组: {}", target)));
            }
        };

        let before = current.len();
        if add {
            for tag in tags {
                if !current.iter().any(|v| v.as_str() == Some(tag.as_str())) {
                    current.push(Value::String(tag.clone()));
                }
            }
        } else {
            current.retain(|v| !v.as_str().is_some_and(|s| tags.iter().any(|t| t == s)));
        }

        if current.len() == before {
            return Ok(false);
        }
        write(record, target, Value::Array(current))
    }

    fn replace(compiled: &CompiledAction, current: &str, replacement: &str) -> ActionResult<String> {
        let action = &compiled.action;
        match &compiled.pattern {
            Some(Ok(regex)) => {
                if action.option_bool("regex").unwrap_or(false) {
                    Ok(regex.replace_all(current, replacement).into_owned())
                } else {
                    Ok(regex
                        .replace_all(current, regex::NoExpand(replacement))
                        .into_owned())
                }
            }
            Some(Err(e)) => Err(ActionError::skipped(e.clone())),
            None => {
                let search = action
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ActionError::skipped("缺少查找文本"))?;
                Ok(current.replace(search, replacement))
            }
        }
    }

    fn render(
        &self,
        action: &Action,
        source: &str,
        record: &ProductRecord,
        context: &ExecutionContext,
        unresolved: &mut Vec<String>,
    ) -> ActionResult<String> {
        let template = Template::parse(source);
        if !template.has_variables() {
            return Ok(source.to_string());
        }

        match self.renderer.render(&template, record, context) {
            Ok(rendered) => {
                for name in rendered.unresolved {
                    if !unresolved.contains(&name) {
                        unresolved.push(name);
                    }
                }
                Ok(rendered.text)
            }
            Err(e @ TemplateError::DepthExceeded { .. }) if action.optional => {
                Err(ActionError::Skipped(e.to_string()))
            }
            Err(e) => Err(ActionError::Fatal(e.to_string())),
        }
    }
}

fn write(record: &mut ProductRecord, target: &str, value: Value) -> ActionResult<bool> {
    record
        .set_field(target, value)
        .map_err(|e| ActionError::skipped(e.to_string()))
}

fn write_number(record: &mut ProductRecord, target: &str, value: f64) -> ActionResult<bool> {
    let value = number_value(value)
        .ok_or_else(|| ActionError::skipped(format!("数值结果无效: {}", value)))?;
    write(record, target, value)
}

/// 缺失或 null 视为空字符串
fn optional_text(record: &ProductRecord, target: &str) -> ActionResult<String> {
    match record.get_field(target) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ActionError::skipped(format!("目标字段不是字符串: {}", target))),
    }
}

fn required_text(record: &ProductRecord, target: &str) -> ActionResult<String> {
    match record.get_field(target) {
        Some(Value::String(s)) => Ok(s.clone()),
        None | Some(Value::Null) => {
            Err(ActionError::skipped(format!("目标字段不存在: {}", target)))
        }
        Some(_) => Err(ActionError::skipped(format!("目标字段不是字符串: {}", target))),
    }
}

fn required_number(record: &ProductRecord, target: &str) -> ActionResult<f64> {
    record
        .get_field(target)
        .and_then(as_f64)
        .filter(|n| n.is_finite())
        .ok_or_else(|| ActionError::skipped(format!("目标字段不是数字: {}", target)))
}

/// 小数位：显式参数优先，其次 `options.decimals`，默认 2
fn decimals(action: &Action, explicit: Option<f64>) -> u32 {
    explicit
        .or_else(|| action.option_f64("decimals"))
        .unwrap_or(DEFAULT_DECIMALS)
        .clamp(0.0, MAX_DECIMALS) as u32
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
