//! Routing and post-processing benchmarks
//!
//! Measures the pure, per-request CPU work (no provider calls).
//!
//! ## Expected Performance Characteristics
//!
//! - Classification: low microseconds (ordered regex table, first match wins)
//! - Complexity estimation: sub-microsecond to low microseconds
//! - Post-processing: tens of microseconds for a typical answer (the pipeline
//!   re-runs until the text stops changing)
//! - Config parsing: single-digit microseconds (one-time startup cost)
//!
//! Run with: `cargo bench`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use promptroute::{
    Intent, Router,
    config::Config,
    postprocess::post_process,
    router::{classify, estimate},
};
use std::hint::black_box;
use std::str::FromStr;

const PROMPTS: &[(&str, &str)] = &[
    ("factual", "What is the capital of France?"),
    (
        "debug",
        "I'm getting a TypeError: cannot read property 'map' of undefined in my React component, how do I fix it?",
    ),
    ("product", "What are the best noise cancelling headphones under $300?"),
    (
        "live",
        "What's the latest news on the election results today?",
    ),
    (
        "reasoning",
        "Compare the trade-offs between microservices and a modular monolith for a team of five engineers, step by step.",
    ),
];

/// Benchmark intent classification across prompt families
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for (name, prompt) in PROMPTS {
        group.bench_with_input(BenchmarkId::from_parameter(name), prompt, |b, p| {
            b.iter(|| classify(black_box(p), false, false));
        });
    }

    group.finish();
}

/// Benchmark complexity estimation
fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("complexity_estimate");

    for (name, prompt) in PROMPTS {
        let intent = classify(prompt, false, false);
        group.bench_with_input(BenchmarkId::from_parameter(name), prompt, |b, p| {
            b.iter(|| estimate(black_box(p), intent, false));
        });
    }

    group.finish();
}

/// Benchmark the full routing decision
fn bench_route(c: &mut Criterion) {
    let router = Router::new();
    c.bench_function("route_debug_prompt", |b| {
        b.iter(|| router.route(black_box(PROMPTS[1].1), false, false));
    });
}

/// Benchmark output cleanup on a chatty answer
fn bench_post_process(c: &mut Criterion) {
    let raw = "Sure! Great question!\n\n\
        The capital of France is Paris. It has been the capital for centuries \
        and is home to the Louvre.\n\n\n\n\
        ```\nprint('bonjour')\n```\n\n\
        The capital of France is Paris. It has been the capital for centuries \
        and is home to the Louvre.\n\n\
        Would you like to know more about French history?\n\n\
        I hope this helps!\n\n---";

    c.bench_function("post_process_general", |b| {
        b.iter(|| post_process(black_box(raw), Intent::General));
    });
}

/// Benchmark configuration parsing and validation
///
/// Runs once at startup, so anything under a millisecond is fine.
fn bench_config_parsing(c: &mut Criterion) {
    let toml_str = r#"
[models.standard]
name = "flash-model"
base_url = "http://localhost:1234/v1"
max_output_tokens = 8192

[models.extended]
name = "pro-model"
base_url = "http://localhost:1234/v1"
max_output_tokens = 32768

[routing]
extended_tier_threshold = 0.6
"#;

    c.bench_function("config_parsing", |b| {
        b.iter(|| Config::from_str(black_box(toml_str)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_estimate,
    bench_route,
    bench_post_process,
    bench_config_parsing,
);
criterion_main!(benches);
