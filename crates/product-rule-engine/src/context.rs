//! 执行上下文
//!
//! 调用方在调用引擎之前解析好的外部输入：目标渠道、时钟与可选的类目体系。
//! 引擎内部从不读取系统时间，保证同一输入可重复得到相同输出。

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    marketplace: String,
    now: DateTime<Utc>,
    taxonomy: Option<Arc<BTreeSet<String>>>,
}

impl ExecutionContext {
    pub fn new(marketplace: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            marketplace: marketplace.into(),
            now,
            taxonomy: None,
        }
    }

    /// 提供渠道类目体系后，`set_category` 会校验目标类目
    pub fn with_taxonomy<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.taxonomy = Some(Arc::new(categories.into_iter().map(Into::into).collect()));
        self
    }

    pub fn marketplace(&self) -> &str {
        &self.marketplace
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn taxonomy(&self) -> Option<&BTreeSet<String>> {
        self.taxonomy.as_deref()
    }

    /// 无类目体系时视为全部有效
    pub fn is_known_category(&self, category: &str) -> bool {
        self.taxonomy
            .as_ref()
            .is_none_or(|taxonomy| taxonomy.contains(category))
    }
}
