//! 商品规则引擎
//!
//! 在商品发布到外部销售渠道之前，按声明式的条件/动作规则改写商品记录：
//! - JSON 规则定义，条件组支持 AND/OR 嵌套
//! - 规则编译与不可变快照，正则和模板只解析一次
//! - `{{field}}` 文本模板渲染
//! - 规则级隔离：动作作用于副本，成功才提交
//! - 有界线程池批处理，支持协作式取消
//! - 参数化规则模板库与规则试运行

pub mod actions;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod library;
pub mod log;
pub mod models;
pub mod operators;
pub mod record;
pub mod renderer;
pub mod snapshot;
pub mod store;
pub mod tester;

pub use actions::{ActionExecutor, ActionOutcome};
pub use compiler::{CompiledRule, RuleCompiler};
pub use context::ExecutionContext;
pub use engine::{BatchOutcome, EngineConfig, ProductOutcome, RuleCounters, RuleEngine};
pub use error::{ActionError, ConditionError, Result, RuleError, TemplateError};
pub use evaluator::{ConditionEvaluator, TreeEvaluator};
pub use log::{
    ExecutionLog, ExecutionLogSink, ExecutionStatus, MemoryLogSink, SkippedAction, TracingLogSink,
};
pub use models::{Action, Condition, ConditionGroup, Rule};
pub use operators::{ActionType, LogicalOperator, Operator};
pub use record::ProductRecord;
pub use renderer::{Template, TemplateRenderer};
pub use snapshot::RuleSnapshot;
pub use store::{RuleStore, RuleStoreStats};
pub use tester::{PreviewReport, RuleTester};

/// 批处理取消标记
pub use tokio_util::sync::CancellationToken;
