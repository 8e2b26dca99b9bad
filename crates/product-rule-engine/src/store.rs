//! 规则存储管理
//!
//! 使用 DashMap 提供线程安全的规则缓存，支持规则的加载、更新、删除和批量操作。
//! 引擎只消费 `snapshot()` 产出的不可变快照，快照之后的修改不会影响已经交出的快照。

use crate::compiler::{CompiledRule, RuleCompiler};
use crate::engine::RuleCounters;
use crate::error::{Result, RuleError};
use crate::models::Rule;
use crate::snapshot::RuleSnapshot;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument, warn};

/// 规则存储
#[derive(Clone)]
pub struct RuleStore {
    /// 编译后的规则缓存
    rules: Arc<DashMap<String, CompiledRule>>,
    /// 规则编译器
    compiler: Arc<Mutex<RuleCompiler>>,
    /// 每次修改递增，作为快照版本号
    version: Arc<AtomicU64>,
    /// 修改持读锁、生成快照持写锁，保证快照内容与版本号一致
    gate: Arc<RwLock<()>>,
}

impl RuleStore {
    /// 创建新的规则存储
    pub fn new() -> Self {
        Self::with_compiler(RuleCompiler::new())
    }

    pub fn with_compiler(compiler: RuleCompiler) -> Self {
        Self {
            rules: Arc::new(DashMap::new()),
            compiler: Arc::new(Mutex::new(compiler)),
            version: Arc::new(AtomicU64::new(0)),
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    fn insert(&self, compiled: CompiledRule) -> String {
        let rule_id = compiled.id().to_string();
        let _gate = self.gate.read();
        self.rules.insert(rule_id.clone(), compiled);
        self.bump();
        rule_id
    }

    /// 加载规则（从 Rule 对象）
    #[instrument(skip(self, rule), fields(rule_id = %rule.id, rule_name = %rule.name))]
    pub fn load(&self, rule: Rule) -> Result<()> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile(rule)?
        };

        let rule_id = self.insert(compiled);
        info!("规则已加载: {}", rule_id);
        Ok(())
    }

    /// 加载规则（从 JSON 字符串）
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, json: &str) -> Result<String> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile_from_json(json)?
        };

        let rule_id = self.insert(compiled);

        info!("规则已加载: {}", rule_id);
        Ok(rule_id)
    }

    /// 更新规则
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn update(&self, rule: Rule) -> Result<()> {
        let rule_id = rule.id.clone();
        if !self.contains(&rule_id) {
            warn!("更新不存在的规则: {}", rule_id);
            return Err(RuleError::RuleNotFound(rule_id));
        }

        let mut compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile(rule)?
        };

        let _gate = self.gate.read();
        // 计数由引擎维护，在条目锁内从当前值复制，避免覆盖并发的计数回写
        let Some(mut entry) = self.rules.get_mut(&rule_id) else {
            warn!("规则在更新期间被删除: {}", rule_id);
            return Err(RuleError::RuleNotFound(rule_id));
        };
        let live = &entry.rule;
        compiled.rule.execution_count = live.execution_count;
        compiled.rule.success_count = live.success_count;
        compiled.rule.last_executed_at = live.last_executed_at;
        compiled.rule.created_at = live.created_at;
        *entry = compiled;
        drop(entry);
        self.bump();

        info!("规则已更新: {}", rule_id);
        Ok(())
    }

    /// 删除规则
    #[instrument(skip(self))]
    pub fn delete(&self, rule_id: &str) -> Result<()> {
        let _gate = self.gate.read();
        if self.rules.remove(rule_id).is_some() {
            self.bump();
            info!("规则已删除: {}", rule_id);
            Ok(())
        } else {
            warn!("删除不存在的规则: {}", rule_id);
            Err(RuleError::RuleNotFound(rule_id.to_string()))
        }
    }

    /// 获取规则
    pub fn get(&self, rule_id: &str) -> Option<CompiledRule> {
        self.rules.get(rule_id).map(|r| r.clone())
    }

    /// 检查规则是否存在
    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.contains_key(rule_id)
    }

    /// 获取所有规则 ID
    pub fn list_ids(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.key().clone()).collect()
    }

    /// 获取所有规则
    pub fn list_all(&self) -> Vec<CompiledRule> {
        self.rules.iter().map(|r| r.value().clone()).collect()
    }

    /// 批量加载规则
    #[instrument(skip(self, rules))]
    pub fn load_batch(&self, rules: Vec<Rule>) -> Result<Vec<String>> {
        let mut loaded_ids = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for rule in rules {
            let rule_id = rule.id.clone();
            match self.load(rule) {
                Ok(()) => loaded_ids.push(rule_id),
                Err(e) => errors.push((rule_id, e)),
            }
        }

        if !errors.is_empty() {
            warn!("批量加载部分失败: {:?}", errors);
        }

        info!("批量加载完成: {} 成功, {} 失败", loaded_ids.len(), errors.len());
        Ok(loaded_ids)
    }

    /// 清空所有规则
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let _gate = self.gate.read();
        let count = self.rules.len();
        self.rules.clear();
        self.bump();
        info!("已清空 {} 条规则", count);
    }

    /// 生成当前规则的不可变快照
    #[instrument(skip(self))]
    pub fn snapshot(&self) -> Result<RuleSnapshot> {
        let (rules, version) = {
            let _gate = self.gate.write();
            (self.list_all(), self.version())
        };
        let snapshot = RuleSnapshot::from_compiled(rules, version)?;
        info!(version, rules = snapshot.len(), "规则快照已生成");
        Ok(snapshot)
    }

    /// 将引擎返回的计数增量合并回规则
    ///
    /// 返回合并成功的规则数；已删除的规则会被忽略。
    #[instrument(skip(self, counters))]
    pub fn record_counters(&self, counters: &BTreeMap<String, RuleCounters>) -> usize {
        let mut updated = 0;

        for (rule_id, delta) in counters {
            match self.rules.get_mut(rule_id) {
                Some(mut entry) => {
                    let rule = &mut entry.rule;
                    rule.execution_count += delta.execution_count;
                    rule.success_count += delta.success_count;
                    rule.last_executed_at = rule.last_executed_at.max(delta.last_executed_at);
                    updated += 1;
                }
                None => warn!("计数对应的规则已不存在: {}", rule_id),
            }
        }

        updated
    }

    /// 获取规则统计信息
    pub fn stats(&self) -> RuleStoreStats {
        let rules_count = self.rules.len();
        let enabled_count = self.rules.iter().filter(|r| r.rule.enabled).count();
        let total_fields: usize = self
            .rules
            .iter()
            .map(|r| r.required_fields.len())
            .sum();

        RuleStoreStats {
            rules_count,
            enabled_count,
            total_fields,
            avg_fields_per_rule: if rules_count > 0 {
                total_fields as f64 / rules_count as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 规则存储统计信息
#[derive(Debug, Clone)]
pub struct RuleStoreStats {
    /// 规则总数
    pub rules_count: usize,
    /// 启用的规则数
    pub enabled_count: usize,
    /// 所有规则使用的字段总数
    pub total_fields: usize,
    /// 平均每条规则使用的字段数
    pub avg_fields_per_rule: f64,
}
