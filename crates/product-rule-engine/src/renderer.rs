//! 文本模板渲染
//!
//! 将 `{{field}}` 形式的占位符解析为字面量片段与变量片段，
//! 变量通过与条件相同的点号路径从当前商品记录中取值。
//!
//! 字段值按字面插入，商品文本中的 `{{...}}` 不会被当作模板。
//! 只有显式引用 `{{> path}}` 会把字段内容作为模板继续展开，展开深度受 `max_depth` 限制。

use crate::context::ExecutionContext;
use crate::error::TemplateError;
use crate::record::ProductRecord;
use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const INCLUDE: char = '>';

/// 模板片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable(String),
    /// `{{> path}}`：字段内容作为模板展开
    Include(String),
}

/// 解析后的模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// 切分模板；未闭合的 `{{` 以及空变量名按字面量处理
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(start) = rest.find(OPEN) {
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                break;
            };

            let name = after_open[..end].trim();
            if name.is_empty() {
                literal.push_str(&rest[..start + OPEN.len() + end + CLOSE.len()]);
            } else {
                literal.push_str(&rest[..start]);
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(match name.strip_prefix(INCLUDE) {
                    Some(path) if !path.trim().is_empty() => {
                        Segment::Include(path.trim().to_string())
                    }
                    _ => Segment::Variable(name.to_string()),
                });
            }
            rest = &after_open[end + CLOSE.len()..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_variables(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) | Segment::Include(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

/// 渲染结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// 未解析到值的变量（按出现顺序，去重）
    pub unresolved: Vec<String>,
}

impl Rendered {
    fn unresolve(&mut self, name: &str) {
        if !self.unresolved.iter().any(|u| u == name) {
            self.unresolved.push(name.to_string());
        }
    }
}

/// 模板渲染器
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    max_depth: usize,
}

impl TemplateRenderer {
    pub const DEFAULT_MAX_DEPTH: usize = 5;

    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn render_str(
        &self,
        source: &str,
        record: &ProductRecord,
        context: &ExecutionContext,
    ) -> Result<Rendered, TemplateError> {
        self.render(&Template::parse(source), record, context)
    }

    pub fn render(
        &self,
        template: &Template,
        record: &ProductRecord,
        context: &ExecutionContext,
    ) -> Result<Rendered, TemplateError> {
        let mut rendered = Rendered::default();
        self.render_into(template, record, context, 1, &mut rendered)?;
        Ok(rendered)
    }

    fn render_into(
        &self,
        template: &Template,
        record: &ProductRecord,
        context: &ExecutionContext,
        depth: usize,
        out: &mut Rendered,
    ) -> Result<(), TemplateError> {
        if depth > self.max_depth {
            return Err(TemplateError::DepthExceeded {
                max: self.max_depth,
                template: template.source().to_string(),
            });
        }

        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => out.text.push_str(text),
                Segment::Variable(name) => {
                    if let Some(builtin) = Self::builtin(name, context) {
                        out.text.push_str(&builtin);
                        continue;
                    }

                    match record.get_field(name).and_then(format_value) {
                        Some(text) => out.text.push_str(&text),
                        None => out.unresolve(name),
                    }
                }
                Segment::Include(name) => match record.get_field(name).and_then(format_value) {
                    Some(text) => {
                        let nested = Template::parse(&text);
                        self.render_into(&nested, record, context, depth + 1, out)?;
                    }
                    None => out.unresolve(name),
                },
            }
        }

        Ok(())
    }

    /// 内置变量，取值来自调用方注入的上下文
    fn builtin(name: &str, context: &ExecutionContext) -> Option<String> {
        match name {
            "$now" => Some(context.now().to_rfc3339()),
            "$today" => Some(context.now().format("%Y-%m-%d").to_string()),
            "$marketplace" => Some(context.marketplace().to_string()),
            _ => None,
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DEPTH)
    }
}

/// 将字段值格式化为文本；null 视为未解析
pub fn format_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        }),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(format_value)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}
