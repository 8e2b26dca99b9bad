//! 条件评估器性能基准测试
//!
//! 针对 ConditionEvaluator 与模板渲染的细粒度性能测试。

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use regex::Regex;
use rule_engine::{
    ConditionEvaluator, ExecutionContext, Operator, ProductRecord, Template, TemplateRenderer,
};
use serde_json::{Value, json};
use std::hint::black_box;

fn eval(field: &Value, op: Operator, expected: &Value) -> bool {
    ConditionEvaluator::evaluate(Some(field), op, expected, true, None).unwrap_or(false)
}

/// 数值比较操作基准
fn bench_numeric_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("numeric_operations");
    let field = json!(1000);
    let expected = json!(500);

    for op in [
        Operator::Equals,
        Operator::GreaterThan,
        Operator::LessOrEqual,
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(op), &op, |b, op| {
            b.iter(|| eval(black_box(&field), *op, black_box(&expected)))
        });
    }

    group.finish();
}

/// 字符串操作基准
fn bench_string_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_operations");
    let field = json!("Acme Wireless Mouse with USB receiver");

    group.bench_function("contains", |b| {
        let expected = json!("USB");
        b.iter(|| eval(black_box(&field), Operator::Contains, black_box(&expected)))
    });

    group.bench_function("contains_case_insensitive", |b| {
        let expected = json!("usb");
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(Some(&field)),
                Operator::Contains,
                black_box(&expected),
                false,
                None,
            )
        })
    });

    group.bench_function("starts_with", |b| {
        let expected = json!("Acme");
        b.iter(|| eval(black_box(&field), Operator::StartsWith, black_box(&expected)))
    });

    group.bench_function("length_greater_than", |b| {
        let expected = json!(20);
        b.iter(|| eval(black_box(&field), Operator::LengthGreaterThan, black_box(&expected)))
    });

    group.finish();
}

/// 预编译正则与按需编译的对比
fn bench_regex(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex");
    let field = json!("SKU-2024-000123");
    let expected = json!(r"^SKU-\d{4}-\d{6}$");
    let compiled = Regex::new(r"^SKU-\d{4}-\d{6}$").map_err(|e| e.to_string());

    group.bench_function("precompiled", |b| {
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(Some(&field)),
                Operator::MatchesRegex,
                black_box(&expected),
                true,
                Some(&compiled),
            )
        })
    });

    group.bench_function("on_demand", |b| {
        b.iter(|| eval(black_box(&field), Operator::MatchesRegex, black_box(&expected)))
    });

    group.finish();
}

/// 列表操作，不同列表长度
fn bench_list_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_operations");
    let field = json!("category_42");

    for size in [10, 100, 1000] {
        let list: Value = (0..size).map(|i| json!(format!("category_{}", i))).collect();
        group.bench_with_input(BenchmarkId::new("in_list", size), &list, |b, list| {
            b.iter(|| eval(black_box(&field), Operator::InList, black_box(list)))
        });
    }

    group.finish();
}

/// 模板渲染
fn bench_template_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_render");
    let renderer = TemplateRenderer::default();
    let context = ExecutionContext::new(
        "google",
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    );
    let record = ProductRecord::new(json!({
        "title": "Wireless Mouse",
        "brand": "Acme",
        "attributes": { "color": "black" }
    }))
    .unwrap();
    let template = Template::parse("{{brand}} {{title}} ({{attributes.color}}) - {{$marketplace}}");

    group.bench_function("parsed", |b| {
        b.iter(|| renderer.render(black_box(&template), black_box(&record), &context))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_numeric_operations,
    bench_string_operations,
    bench_regex,
    bench_list_operations,
    bench_template_render,
);
criterion_main!(benches);
