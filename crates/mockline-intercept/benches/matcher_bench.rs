use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mockline_intercept::config::{MatchType, MockRule};
use mockline_intercept::matcher::{find_matching_rule, CompiledRule, MockState};
use mockline_intercept::response::synthesize;
use serde_json::json;

fn create_test_rule(id: usize, url: &str, match_type: MatchType) -> MockRule {
    MockRule {
        id: format!("rule-{id}"),
        url: url.to_string(),
        method: "GET".to_string(),
        match_type,
        status: 200,
        delay: 0,
        response: json!({"id": id, "ok": true}),
        enabled: true,
    }
}

fn contains_state(count: usize) -> MockState {
    let rules = (0..count)
        .map(|i| create_test_rule(i, &format!("/api/v1/endpoint{i}/"), MatchType::Contains))
        .collect();
    MockState::new(rules, true)
}

fn regex_state(count: usize) -> MockState {
    let rules = (0..count)
        .map(|i| create_test_rule(i, &format!(r"/api/v\d+/endpoint{i}/"), MatchType::Regex))
        .collect();
    MockState::new(rules, true)
}

fn bench_rule_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_matching");

    for rule_count in [10, 50, 100, 500, 1000].iter() {
        let state = contains_state(*rule_count);
        group.throughput(Throughput::Elements(1));

        let cases = [
            ("match_first", "https://localhost/api/v1/endpoint0/".to_string()),
            (
                "match_middle",
                format!("https://localhost/api/v1/endpoint{}/", rule_count / 2),
            ),
            (
                "match_last",
                format!("https://localhost/api/v1/endpoint{}/", rule_count - 1),
            ),
            ("match_none", "https://localhost/not/found".to_string()),
        ];

        for (name, url) in cases.iter() {
            group.bench_with_input(BenchmarkId::new(*name, rule_count), rule_count, |b, _| {
                b.iter(|| find_matching_rule(black_box(url), black_box("GET"), black_box(&state)));
            });
        }
    }

    group.finish();
}

fn bench_regex_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_matching");

    for rule_count in [10, 50, 100].iter() {
        let state = regex_state(*rule_count);
        let url = format!("https://localhost/api/v1/endpoint{}/", rule_count / 2);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("regex_match", rule_count),
            rule_count,
            |b, _| {
                b.iter(|| find_matching_rule(black_box(&url), black_box("GET"), black_box(&state)));
            },
        );
    }

    group.finish();
}

fn bench_single_rule_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_rule_eval");

    let compiled = CompiledRule::compile(create_test_rule(0, "/api/v1/test", MatchType::Contains));

    group.throughput(Throughput::Elements(1));
    group.bench_function("single_match", |b| {
        b.iter(|| {
            compiled.matches(
                black_box("https://localhost/api/v1/test"),
                black_box("GET"),
            )
        });
    });

    group.finish();
}

fn bench_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis");

    let plain = create_test_rule(0, "/users", MatchType::Contains);
    let mut templated = plain.clone();
    templated.response = json!({
        "list|10": [{"id|+1": 1, "name": "@name", "email": "@email", "active|1": true}]
    });

    group.bench_function("plain", |b| b.iter(|| synthesize(black_box(&plain))));
    group.bench_function("template", |b| b.iter(|| synthesize(black_box(&templated))));

    group.finish();
}

criterion_group!(
    benches,
    bench_rule_matching,
    bench_regex_matching,
    bench_single_rule_evaluation,
    bench_synthesis
);
criterion_main!(benches);
