//! 引擎指标模块
//!
//! 基于 metrics facade 记录规则评估相关指标。
//! 未安装 recorder 时所有记录均为空操作。

/// 注册规则引擎指标描述
pub fn describe_engine_metrics(service_name: &str) {
    metrics::describe_counter!("rule_evaluations_total", "Total number of rule evaluations");
    metrics::describe_histogram!(
        "rule_evaluation_duration_seconds",
        "Per-product rule evaluation duration in seconds"
    );
    metrics::describe_counter!(
        "rule_actions_skipped_total",
        "Total number of actions skipped during rule application"
    );
    metrics::describe_counter!("rule_batches_total", "Total number of rule batches");
    metrics::describe_counter!(
        "rule_batch_records_total",
        "Total number of records processed by rule batches"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 记录单条规则评估
#[inline]
pub fn record_rule_evaluation(rule_id: &str, status: &str) {
    metrics::counter!(
        "rule_evaluations_total",
        "rule_id" => rule_id.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录单个商品的整体评估耗时
#[inline]
pub fn record_product_evaluation(marketplace: &str, duration_secs: f64) {
    metrics::histogram!(
        "rule_evaluation_duration_seconds",
        "marketplace" => marketplace.to_string()
    )
    .record(duration_secs);
}

/// 记录被跳过的动作
#[inline]
pub fn record_action_skipped(action_type: &str) {
    metrics::counter!(
        "rule_actions_skipped_total",
        "action_type" => action_type.to_string()
    )
    .increment(1);
}

/// 记录批处理
#[inline]
pub fn record_batch(marketplace: &str, records: usize, cancelled: usize) {
    metrics::counter!("rule_batches_total", "marketplace" => marketplace.to_string())
        .increment(1);
    metrics::counter!(
        "rule_batch_records_total",
        "marketplace" => marketplace.to_string(),
        "status" => "processed"
    )
    .increment(records.saturating_sub(cancelled) as u64);
    metrics::counter!(
        "rule_batch_records_total",
        "marketplace" => marketplace.to_string(),
        "status" => "cancelled"
    )
    .increment(cancelled as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        describe_engine_metrics("test-service");
        record_rule_evaluation("rule-001", "applied");
        record_product_evaluation("amazon", 0.001);
        record_action_skipped("apply_margin");
        record_batch("amazon", 10, 2);
    }
}
