//! 规则引擎性能基准测试
//!
//! 测试覆盖：
//! - 单个商品在不同规则数量下的评估性能
//! - 嵌套条件组的评估性能
//! - 串行与线程池批处理的吞吐对比
//! - 快照构建（规则编译）开销

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rule_engine::{
    Action, ActionType, Condition, ConditionGroup, EngineConfig, ExecutionContext, Operator,
    ProductRecord, Rule, RuleEngine, RuleSnapshot,
};
use serde_json::json;
use std::hint::black_box;

fn context() -> ExecutionContext {
    ExecutionContext::new("google", Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
}

fn product(i: usize) -> ProductRecord {
    ProductRecord::new(json!({
        "id": format!("p-{}", i),
        "title": format!("  wireless mouse model {}  ", i),
        "brand": if i % 3 == 0 { "" } else { "Acme" },
        "category": if i % 2 == 0 { "electronics" } else { "accessories" },
        "stock": i % 20,
        "cost": 10 + i % 50,
        "price": 0,
        "sku": format!("SKU-{:06}", i),
        "tags": ["new"]
    }))
    .unwrap()
}

/// 覆盖各类动作的典型规则集
fn realistic_rules(count: usize) -> Vec<Rule> {
    (0..count)
        .map(|i| {
            let rule = Rule::new(format!("rule {}", i))
                .with_id(format!("rule-{:03}", i))
                .with_priority(i as i32);
            match i % 5 {
                0 => rule
                    .with_group(ConditionGroup::and(vec![
                        Condition::unary("brand", Operator::IsNotEmpty),
                        Condition::new("title", Operator::NotContains, "{{brand}}"),
                    ]))
                    .with_action(
                        Action::new(ActionType::PrependText)
                            .target("title")
                            .template("{{brand}} - "),
                    ),
                1 => rule
                    .with_group(ConditionGroup::and(vec![Condition::new(
                        "stock",
                        Operator::LessThan,
                        3,
                    )]))
                    .with_action(Action::new(ActionType::ExcludeProduct)),
                2 => rule
                    .for_categories(["electronics"])
                    .with_action(Action::new(ActionType::ApplyMargin).value(35)),
                3 => rule
                    .with_group(ConditionGroup::or(vec![
                        Condition::new("sku", Operator::MatchesRegex, r"^SKU-\d{5}0$"),
                        Condition::new("stock", Operator::GreaterThan, 15),
                    ]))
                    .with_action(Action::new(ActionType::AddTag).value(format!("tag-{}", i))),
                _ => rule
                    .with_action(Action::new(ActionType::Trim).target("title"))
                    .with_action(Action::new(ActionType::Capitalize).target("title")),
            }
        })
        .collect()
}

fn nested_group(depth: usize, breadth: usize) -> ConditionGroup {
    let conditions = (0..breadth)
        .map(|i| Condition::new("stock", Operator::GreaterThan, (i * 100) as i64))
        .collect();
    let group = if depth % 2 == 0 {
        ConditionGroup::and(conditions)
    } else {
        ConditionGroup::or(conditions)
    };
    if depth == 0 {
        group
    } else {
        (0..breadth).fold(group, |g, _| g.with_group(nested_group(depth - 1, breadth)))
    }
}

fn snapshot(rules: Vec<Rule>) -> RuleSnapshot {
    RuleSnapshot::build(rules, &EngineConfig::default()).unwrap()
}

/// 单个商品，规则数量变化
fn bench_single_product(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_product");
    let engine = RuleEngine::new(EngineConfig::default()).unwrap();
    let ctx = context();

    for count in [5, 25, 100] {
        let snapshot = snapshot(realistic_rules(count));
        group.bench_with_input(BenchmarkId::new("rules", count), &snapshot, |b, snapshot| {
            b.iter(|| engine.evaluate_product(black_box(product(7)), &ctx, snapshot))
        });
    }

    group.finish();
}

/// 嵌套条件组
fn bench_nested_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_conditions");
    let engine = RuleEngine::new(EngineConfig::default()).unwrap();
    let ctx = context();

    for depth in [1, 3, 5] {
        let rule = Rule::new("nested")
            .with_id("nested")
            .with_group(nested_group(depth, 3))
            .with_action(Action::new(ActionType::AddTag).value("deep"));
        let snapshot = snapshot(vec![rule]);
        group.bench_with_input(BenchmarkId::new("depth", depth), &snapshot, |b, snapshot| {
            b.iter(|| engine.evaluate_product(black_box(product(11)), &ctx, snapshot))
        });
    }

    group.finish();
}

/// 批处理吞吐：串行与线程池
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    group.sample_size(20);
    let ctx = context();
    let snapshot = snapshot(realistic_rules(20));

    let serial = RuleEngine::new(EngineConfig {
        parallel_threshold: usize::MAX,
        ..EngineConfig::default()
    })
    .unwrap();
    let pooled = RuleEngine::new(EngineConfig {
        batch_workers: Some(4),
        parallel_threshold: 1,
        ..EngineConfig::default()
    })
    .unwrap();

    for size in [100, 1000, 5000] {
        let records: Vec<ProductRecord> = (0..size).map(product).collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("serial", size), &records, |b, records| {
            b.iter(|| serial.evaluate_batch(records.clone(), &ctx, &snapshot))
        });
        group.bench_with_input(BenchmarkId::new("pool_4", size), &records, |b, records| {
            b.iter(|| pooled.evaluate_batch(records.clone(), &ctx, &snapshot))
        });
    }

    group.finish();
}

/// 快照构建（含正则、模板预编译）
fn bench_snapshot_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_build");
    let config = EngineConfig::default();

    for count in [10, 100, 500] {
        let rules = realistic_rules(count);
        group.bench_with_input(BenchmarkId::new("rules", count), &rules, |b, rules| {
            b.iter(|| RuleSnapshot::build(black_box(rules.clone()), &config))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_product,
    bench_nested_conditions,
    bench_batch,
    bench_snapshot_build,
);
criterion_main!(benches);
