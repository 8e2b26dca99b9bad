//! 规则引擎
//!
//! 负责规则筛选、排序、条件求值与动作应用，并保证每条规则的隔离语义：
//! 规则的动作作用在记录副本上，只有没有规则级错误时才整体提交。
//!
//! 批处理时商品之间互不影响，使用有界的 rayon 线程池并保持输入顺序。

use crate::actions::ActionExecutor;
use crate::compiler::CompiledRule;
use crate::context::ExecutionContext;
use crate::error::{ActionError, Result, RuleError};
use crate::evaluator::TreeEvaluator;
use crate::log::{ExecutionLog, ExecutionLogSink, SkippedAction};
use crate::record::ProductRecord;
use crate::renderer::TemplateRenderer;
use crate::snapshot::RuleSnapshot;
use catalog_shared::config::EngineSettings;
use catalog_shared::observability::metrics;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_template_depth: usize,
    pub max_condition_depth: usize,
    /// 批处理线程数，`None` 使用 rayon 全局线程池
    pub batch_workers: Option<usize>,
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_template_depth: TemplateRenderer::DEFAULT_MAX_DEPTH,
            max_condition_depth: crate::compiler::RuleCompiler::DEFAULT_MAX_CONDITION_DEPTH,
            batch_workers: None,
            parallel_threshold: 64,
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        let config = Self {
            max_template_depth: settings.max_template_depth,
            max_condition_depth: settings.max_condition_depth,
            batch_workers: settings.batch_workers,
            parallel_threshold: settings.parallel_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_template_depth == 0 {
            return Err(RuleError::InvalidConfig(
                "max_template_depth 必须大于 0".to_string(),
            ));
        }
        if self.max_condition_depth == 0 {
            return Err(RuleError::InvalidConfig(
                "max_condition_depth 必须大于 0".to_string(),
            ));
        }
        if self.batch_workers == Some(0) {
            return Err(RuleError::InvalidConfig("batch_workers 不能为 0".to_string()));
        }
        Ok(())
    }
}

/// 单条规则的计数增量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCounters {
    pub execution_count: u64,
    pub success_count: u64,
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl RuleCounters {
    pub fn merge(&mut self, other: &RuleCounters) {
        self.execution_count += other.execution_count;
        self.success_count += other.success_count;
        self.last_executed_at = self.last_executed_at.max(other.last_executed_at);
    }
}

/// 单个商品的评估结果
#[derive(Debug, Clone)]
pub struct ProductOutcome {
    pub product_id: String,
    /// 提交了所有规则后的最终记录
    pub record: ProductRecord,
    /// 按执行顺序排列
    pub logs: Vec<ExecutionLog>,
    pub counters: BTreeMap<String, RuleCounters>,
}

impl ProductOutcome {
    pub fn applied_rules(&self) -> impl Iterator<Item = &str> {
        self.logs
            .iter()
            .filter(|log| log.is_applied())
            .map(|log| log.rule_id.as_str())
    }

    pub fn is_syndication_eligible(&self) -> bool {
        self.record.is_syndication_eligible()
    }
}

/// 批处理结果，`results` 与输入顺序一致
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<Result<ProductOutcome>>,
    pub counters: BTreeMap<String, RuleCounters>,
    pub cancelled: usize,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> impl Iterator<Item = &ProductOutcome> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count() - self.cancelled
    }
}

/// 规则引擎
pub struct RuleEngine {
    config: EngineConfig,
    executor: ActionExecutor,
    sink: Option<Arc<dyn ExecutionLogSink>>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RuleEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let pool = match config.batch_workers {
            Some(workers) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("rule-engine-{}", i))
                    .build()
                    .map_err(|e| RuleError::InvalidConfig(format!("无法创建线程池: {}", e)))?,
            )),
            None => None,
        };

        info!(
            max_template_depth = config.max_template_depth,
            batch_workers = ?config.batch_workers,
            "规则引擎已创建"
        );

        Ok(Self {
            executor: ActionExecutor::new(TemplateRenderer::new(config.max_template_depth)),
            config,
            sink: None,
            pool,
        })
    }

    /// 日志下游（持久化、监控）
    pub fn with_sink(mut self, sink: Arc<dyn ExecutionLogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 按快照顺序对单个商品执行所有适用规则
    #[instrument(
        skip(self, record, context, snapshot),
        fields(
            product_id = %record.product_id(),
            marketplace = %context.marketplace(),
            snapshot_version = snapshot.version()
        )
    )]
    pub fn evaluate_product(
        &self,
        record: ProductRecord,
        context: &ExecutionContext,
        snapshot: &RuleSnapshot,
    ) -> Result<ProductOutcome> {
        record.ensure_object()?;

        let start = Instant::now();
        let product_id = record.product_id();
        let mut current = record;
        let mut logs = Vec::new();
        let mut counters: BTreeMap<String, RuleCounters> = BTreeMap::new();

        for compiled in snapshot.rules() {
            let rule = &compiled.rule;
            if !rule.enabled || !rule.applies_to(context.marketplace(), current.category()) {
                continue;
            }

            let log = self.apply_rule(compiled, &mut current, context);

            let counter = counters.entry(rule.id.clone()).or_default();
            counter.execution_count += 1;
            if log.is_applied() {
                counter.success_count += 1;
            }
            counter.last_executed_at = Some(context.now());

            metrics::record_rule_evaluation(&rule.id, log.status.as_str());
            if let Some(sink) = &self.sink {
                sink.record(&log);
            }
            logs.push(log);
        }

        metrics::record_product_evaluation(context.marketplace(), start.elapsed().as_secs_f64());
        debug!(rules_evaluated = logs.len(), "商品规则评估完成");

        Ok(ProductOutcome {
            product_id,
            record: current,
            logs,
            counters,
        })
    }

    /// 单条规则：求值条件，在副本上执行动作，成功则提交
    fn apply_rule(
        &self,
        compiled: &CompiledRule,
        current: &mut ProductRecord,
        context: &ExecutionContext,
    ) -> ExecutionLog {
        let rule = &compiled.rule;
        let now = context.now();
        let marketplace = context.marketplace();

        let mut evaluator = TreeEvaluator::new(current, context, self.executor.renderer());
        let matched = evaluator.evaluate_root(&compiled.groups, rule.root_logic);
        let mut diagnostics = evaluator.into_diagnostics();

        if !matched {
            return ExecutionLog::not_matched(&rule.id, &rule.name, current, marketplace, now)
                .with_diagnostics(diagnostics);
        }

        let mut working = current.clone();
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for action in &compiled.actions {
            match self.executor.apply(action, &mut working, context) {
                Ok(outcome) => {
                    if outcome.changed {
                        applied.push(action.label.clone());
                    }
                    if !outcome.unresolved.is_empty() {
                        diagnostics.push(format!(
                            "{}: 变量未解析: {}",
                            action.label,
                            outcome.unresolved.join(", ")
                        ));
                    }
                }
                Err(ActionError::Skipped(reason)) => {
                    debug!(rule_id = %rule.id, action = %action.label, %reason, "动作已跳过");
                    metrics::record_action_skipped(action.action.action_type.as_str());
                    skipped.push(SkippedAction {
                        action_id: action.label.clone(),
                        reason,
                    });
                }
                Err(ActionError::Fatal(reason)) => {
                    warn!(rule_id = %rule.id, action = %action.label, %reason, "规则执行失败, 丢弃工作副本");
                    let mut log = ExecutionLog::failed(
                        &rule.id,
                        &rule.name,
                        current,
                        marketplace,
                        now,
                        format!("{}: {}", action.label, reason),
                    )
                    .with_diagnostics(diagnostics);
                    log.actions_skipped = skipped;
                    return log;
                }
            }
        }

        let mut log =
            ExecutionLog::applied(&rule.id, &rule.name, current, &working, marketplace, now)
                .with_diagnostics(diagnostics);
        log.actions_applied = applied;
        log.actions_skipped = skipped;

        *current = working;
        log
    }

    /// 批量评估
    pub fn evaluate_batch(
        &self,
        records: Vec<ProductRecord>,
        context: &ExecutionContext,
        snapshot: &RuleSnapshot,
    ) -> BatchOutcome {
        self.evaluate_batch_with_cancel(records, context, snapshot, &CancellationToken::new())
    }

    /// 可取消的批量评估：每个商品开始前检查取消标记，已开始的商品总是完整处理
    #[instrument(
        skip(self, records, context, snapshot, cancel),
        fields(records = records.len(), marketplace = %context.marketplace())
    )]
    pub fn evaluate_batch_with_cancel(
        &self,
        records: Vec<ProductRecord>,
        context: &ExecutionContext,
        snapshot: &RuleSnapshot,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let total = records.len();

        let run = |record: ProductRecord| -> Result<ProductOutcome> {
            if cancel.is_cancelled() {
                return Err(RuleError::Cancelled);
            }
            self.evaluate_product(record, context, snapshot)
        };

        let results: Vec<Result<ProductOutcome>> = if total < self.config.parallel_threshold {
            records.into_iter().map(run).collect()
        } else {
            let parallel = || records.into_par_iter().map(run).collect::<Vec<_>>();
            match &self.pool {
                Some(pool) => pool.install(parallel),
                None => parallel(),
            }
        };

        let mut counters: BTreeMap<String, RuleCounters> = BTreeMap::new();
        let mut cancelled = 0;
        for result in &results {
            match result {
                Ok(outcome) => {
                    for (rule_id, delta) in &outcome.counters {
                        counters.entry(rule_id.clone()).or_default().merge(delta);
                    }
                }
                Err(RuleError::Cancelled) => cancelled += 1,
                Err(e) => warn!(error = %e, "商品记录无效, 已跳过"),
            }
        }

        metrics::record_batch(context.marketplace(), total, cancelled);
        info!(total, cancelled, rules = counters.len(), "批处理完成");

        BatchOutcome {
            results,
            counters,
            cancelled,
        }
    }
}
