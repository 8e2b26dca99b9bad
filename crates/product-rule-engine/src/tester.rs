//! 规则试运行
//!
//! 在保存规则之前，用样本商品预览单条规则的效果：哪些商品会匹配、哪些字段会变化。
//! 预览不会回写任何计数。

use crate::context::ExecutionContext;
use crate::engine::{EngineConfig, RuleEngine};
use crate::error::Result;
use crate::log::ExecutionLog;
use crate::models::Rule;
use crate::record::ProductRecord;
use crate::snapshot::RuleSnapshot;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// 顶层字段的变化
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewItem {
    pub product_id: String,
    pub matched: bool,
    pub changes: Vec<FieldChange>,
    pub log: Option<ExecutionLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewReport {
    pub rule_id: String,
    pub total: usize,
    pub matched_count: usize,
    pub items: Vec<PreviewItem>,
}

pub struct RuleTester {
    engine: RuleEngine,
    config: EngineConfig,
}

impl RuleTester {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let engine = RuleEngine::new(EngineConfig {
            batch_workers: None,
            ..config.clone()
        })?;
        Ok(Self { engine, config })
    }

    /// 对样本商品预览单条规则；草稿规则即使未启用也会被执行
    #[instrument(skip(self, rule, products, context), fields(rule_id = %rule.id, products = products.len()))]
    pub fn preview(
        &self,
        mut rule: Rule,
        products: Vec<ProductRecord>,
        context: &ExecutionContext,
    ) -> Result<PreviewReport> {
        rule.enabled = true;
        let rule_id = rule.id.clone();
        let snapshot = RuleSnapshot::build(vec![rule], &self.config)?;

        let mut items = Vec::with_capacity(products.len());
        for product in products {
            let before = product.clone();
            let outcome = self.engine.evaluate_product(product, context, &snapshot)?;
            let log = outcome.logs.into_iter().next();
            let matched = log.as_ref().is_some_and(|l| l.conditions_matched);

            items.push(PreviewItem {
                product_id: outcome.product_id,
                matched,
                changes: diff(&before, &outcome.record),
                log,
            });
        }

        let matched_count = items.iter().filter(|i| i.matched).count();
        debug!(matched_count, "规则预览完成");

        Ok(PreviewReport {
            rule_id,
            total: items.len(),
            matched_count,
            items,
        })
    }
}

/// 比较两条记录的顶层字段
pub fn diff(before: &ProductRecord, after: &ProductRecord) -> Vec<FieldChange> {
    let (Some(old), Some(new)) = (before.data().as_object(), after.data().as_object()) else {
        return Vec::new();
    };

    let mut fields: Vec<&String> = old.keys().chain(new.keys()).collect();
    fields.sort();
    fields.dedup();

    fields
        .into_iter()
        .filter_map(|field| {
            let a = old.get(field);
            let b = new.get(field);
            (a != b).then(|| FieldChange {
                field: field.clone(),
                before: a.cloned(),
                after: b.cloned(),
            })
        })
        .collect()
}
