//! 规则执行日志
//!
//! 每次 (规则, 商品) 尝试都会产生一条 `ExecutionLog`，无论是否匹配。
//! 日志按执行顺序返回给调用方，同时转发给可选的 `ExecutionLogSink`。

use crate::record::ProductRecord;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// 执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotMatched,
    Applied,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotMatched => "not_matched",
            Self::Applied => "applied",
            Self::Failed => "failed",
        }
    }
}

/// 被跳过的动作及原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAction {
    pub action_id: String,
    pub reason: String,
}

/// 执行日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub rule_id: String,
    pub rule_name: String,
    pub product_id: String,
    pub marketplace: String,
    pub executed_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub conditions_matched: bool,
    /// 实际修改了记录的动作
    pub actions_applied: Vec<String>,
    pub actions_skipped: Vec<SkippedAction>,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub error: Option<String>,
    pub diagnostics: Vec<String>,
}

impl ExecutionLog {
    fn base(
        rule_id: &str,
        rule_name: &str,
        record: &ProductRecord,
        marketplace: &str,
        executed_at: DateTime<Utc>,
        status: ExecutionStatus,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            rule_name: rule_name.to_string(),
            product_id: record.product_id(),
            marketplace: marketplace.to_string(),
            executed_at,
            status,
            conditions_matched: status != ExecutionStatus::NotMatched,
            actions_applied: Vec::new(),
            actions_skipped: Vec::new(),
            before: None,
            after: None,
            error: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn not_matched(
        rule_id: &str,
        rule_name: &str,
        record: &ProductRecord,
        marketplace: &str,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self::base(
            rule_id,
            rule_name,
            record,
            marketplace,
            executed_at,
            ExecutionStatus::NotMatched,
        )
    }

    pub fn applied(
        rule_id: &str,
        rule_name: &str,
        before: &ProductRecord,
        after: &ProductRecord,
        marketplace: &str,
        executed_at: DateTime<Utc>,
    ) -> Self {
        let mut log = Self::base(
            rule_id,
            rule_name,
            before,
            marketplace,
            executed_at,
            ExecutionStatus::Applied,
        );
        log.before = Some(before.data().clone());
        log.after = Some(after.data().clone());
        log
    }

    /// 规则级失败：工作副本已丢弃，只保留执行前快照
    pub fn failed(
        rule_id: &str,
        rule_name: &str,
        record: &ProductRecord,
        marketplace: &str,
        executed_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        let mut log = Self::base(
            rule_id,
            rule_name,
            record,
            marketplace,
            executed_at,
            ExecutionStatus::Failed,
        );
        log.before = Some(record.data().clone());
        log.error = Some(error.into());
        log
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    pub fn is_applied(&self) -> bool {
        self.status == ExecutionStatus::Applied
    }
}

/// 执行日志的下游消费者（持久化、监控等）
#[cfg_attr(test, mockall::automock)]
pub trait ExecutionLogSink: Send + Sync {
    fn record(&self, log: &ExecutionLog);
}

/// 以结构化 tracing 事件输出日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl ExecutionLogSink for TracingLogSink {
    fn record(&self, log: &ExecutionLog) {
        match log.status {
            ExecutionStatus::NotMatched => debug!(
                rule_id = %log.rule_id,
                product_id = %log.product_id,
                marketplace = %log.marketplace,
                diagnostics = log.diagnostics.len(),
                "规则未匹配"
            ),
            ExecutionStatus::Applied => info!(
                rule_id = %log.rule_id,
                product_id = %log.product_id,
                marketplace = %log.marketplace,
                actions_applied = ?log.actions_applied,
                actions_skipped = log.actions_skipped.len(),
                "规则已应用"
            ),
            ExecutionStatus::Failed => warn!(
                rule_id = %log.rule_id,
                product_id = %log.product_id,
                marketplace = %log.marketplace,
                error = log.error.as_deref().unwrap_or_default(),
                "规则执行失败"
            ),
        }
    }
}

/// 内存缓冲，供测试与预览使用
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<ExecutionLog>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ExecutionLog> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn drain(&self) -> Vec<ExecutionLog> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl ExecutionLogSink for MemoryLogSink {
    fn record(&self, log: &ExecutionLog) {
        self.entries.lock().push(log.clone());
    }
}
