//! 商品记录
//!
//! 规则引擎处理的是规范化后的商品 JSON 对象，字段通过点号路径访问
//! （如 `attributes.color` 或 `images.0.url`）。

use crate::error::{Result, RuleError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// 导出资格标记字段，缺失视为可导出
pub const ELIGIBILITY_FIELD: &str = "syndication_eligible";

/// 商品记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecord {
    data: Value,
}

impl ProductRecord {
    /// 从 JSON 值创建，必须是对象
    pub fn new(data: Value) -> Result<Self> {
        let record = Self { data };
        record.ensure_object()?;
        Ok(record)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(json)?;
        Self::new(data)
    }

    /// 反序列化得到的记录可能不是对象，进入引擎前再次检查
    pub(crate) fn ensure_object(&self) -> Result<()> {
        if self.data.is_object() {
            Ok(())
        } else {
            Err(RuleError::InvalidRecord(format!(
                "期望 JSON 对象, 实际 {}",
                value_type_name(&self.data)
            )))
        }
    }

    /// 获取字段值（支持点号分隔的路径与数组下标）
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.data;

        for part in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    /// 写入字段值，中间路径不存在时自动创建对象
    ///
    /// 返回值表示字段是否真的发生了变化。
    pub fn set_field(&mut self, path: &str, value: Value) -> Result<bool> {
        let parts: Vec<&str> = path.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(RuleError::FieldNotWritable(path.to_string()));
        }

        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| RuleError::FieldNotWritable(path.to_string()))?;

        let mut current = &mut self.data;
        for part in parents {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            current = match current {
                Value::Object(map) => map
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(arr) => {
                    let index: usize = part
                        .parse()
                        .map_err(|_| RuleError::FieldNotWritable(path.to_string()))?;
                    arr.get_mut(index)
                        .ok_or_else(|| RuleError::FieldNotWritable(path.to_string()))?
                }
                _ => return Err(RuleError::FieldNotWritable(path.to_string())),
            };
        }

        if current.is_null() {
            *current = Value::Object(Map::new());
        }

        match current {
            Value::Object(map) => {
                let changed = map.get(*last) != Some(&value);
                if changed {
                    map.insert(last.to_string(), value);
                }
                Ok(changed)
            }
            Value::Array(arr) => {
                let slot = last
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| arr.get_mut(index))
                    .ok_or_else(|| RuleError::FieldNotWritable(path.to_string()))?;
                let changed = *slot != value;
                *slot = value;
                Ok(changed)
            }
            _ => Err(RuleError::FieldNotWritable(path.to_string())),
        }
    }

    /// 商品 ID（字符串或数字形式的 `id` 字段）
    pub fn product_id(&self) -> String {
        match self.data.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn category(&self) -> Option<&str> {
        self.data.get("category").and_then(Value::as_str)
    }

    /// 是否允许导出到渠道
    pub fn is_syndication_eligible(&self) -> bool {
        self.data
            .get(ELIGIBILITY_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_inner(self) -> Value {
        self.data
    }
}

impl TryFrom<Value> for ProductRecord {
    type Error = RuleError;

    fn try_from(data: Value) -> Result<Self> {
        Self::new(data)
    }
}

/// 尝试将 Value 转换为 f64（数字或数字字符串）
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 将数值结果写回 JSON：整数值保存为整数，非有限值返回 None
pub fn number_value(value: f64) -> Option<Value> {
    if !value.is_finite() {
        return None;
    }

    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        return Some(Value::from(value as i64));
    }

    Number::from_f64(value).map(Value::Number)
}

/// 判断值是否为空：缺失、null、空字符串、空数组、空对象
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(arr)) => arr.is_empty(),
        Some(Value::Object(obj)) => obj.is_empty(),
        _ => false,
    }
}

/// 获取值的类型名称
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
