//! 规则快照
//!
//! 一次调用（单个商品或一个批次）使用的不可变规则集合：
//! 规则已编译、按 `(priority, id)` 排序，并通过 `Arc` 在工作线程之间共享。

use crate::compiler::{CompiledRule, RuleCompiler};
use crate::engine::EngineConfig;
use crate::error::{Result, RuleError};
use crate::models::Rule;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    version: u64,
    rules: Arc<[CompiledRule]>,
}

impl RuleSnapshot {
    /// 编译并冻结规则集合
    pub fn build(rules: Vec<Rule>, config: &EngineConfig) -> Result<Self> {
        let mut compiler = RuleCompiler::with_max_depth(config.max_condition_depth);
        let compiled = rules
            .into_iter()
            .map(|rule| compiler.compile(rule))
            .collect::<Result<Vec<_>>>()?;

        Self::from_compiled(compiled, 0)
    }

    /// 从已编译的规则构建，拒绝重复 ID
    pub fn from_compiled(mut rules: Vec<CompiledRule>, version: u64) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if !seen.insert(rule.id()) {
                return Err(RuleError::DuplicateRule(rule.id().to_string()));
            }
            for invalid in rule.invalid_patterns() {
                warn!(rule_id = %rule.id(), "规则包含无效正则: {}", invalid);
            }
        }

        rules.sort_by(|a, b| {
            a.rule
                .priority
                .cmp(&b.rule.priority)
                .then_with(|| a.id().cmp(b.id()))
        });

        Ok(Self {
            version,
            rules: rules.into(),
        })
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 按执行顺序排列的规则
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn get(&self, rule_id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.id() == rule_id)
    }
}

impl Default for RuleSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            rules: Arc::from(Vec::new()),
        }
    }
}
