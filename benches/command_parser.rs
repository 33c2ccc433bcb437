//! Benchmarks for command parsing, ranking, and color mixing.
//!
//! Benchmark targets:
//! - Command classification: <10us
//! - Ranking 100 hits: <100us
//! - Color fade: <1us

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use lorebot::models::{AnswerRecord, MessageRef, SearchHit};
use lorebot::rendering::color::{ANSWER_BASE, WHITE};
use lorebot::services::{CommandParser, RankingEngine};

/// Sample mentions of varying shape.
const TEACH_TEXT: &str = "\"run cargo doc --open\" is the answer to \"how do I browse the api docs locally?\"";
const QUERY_TEXT: &str = "how do I browse the api docs locally?";
const DEBUG_QUERY_TEXT: &str = "how do I browse the api docs locally? DEBUG";
const RESET_TEXT: &str = "forget everything you've ever learnt. yes I'm sure";
const LONG_TEXT: &str = "this paragraph rambles on about deployment pipelines, staging \
    environments, feature flags, database migrations and incident reviews without \
    ever quite asking a question that the grammar could pick up on";

fn bench_command_parsing(c: &mut Criterion) {
    let parser = CommandParser::default();
    let mut group = c.benchmark_group("command_parsing");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("teach", |b| {
        b.iter(|| parser.parse(black_box(TEACH_TEXT)));
    });

    group.bench_function("query", |b| {
        b.iter(|| parser.parse(black_box(QUERY_TEXT)));
    });

    group.bench_function("query_debug", |b| {
        b.iter(|| parser.parse(black_box(DEBUG_QUERY_TEXT)));
    });

    group.bench_function("reset", |b| {
        b.iter(|| parser.parse(black_box(RESET_TEXT)));
    });

    group.bench_function("long_no_match_shape", |b| {
        b.iter(|| parser.parse(black_box(LONG_TEXT)));
    });

    group.finish();
}

fn sample_hits(n: usize, now: u64) -> Vec<SearchHit> {
    (0..n)
        .map(|i| {
            let question = format!("question number {i}?");
            let answer_secs = now - (i as u64 * 3600);
            let record = AnswerRecord::new(
                MessageRef::literal(&question, "C1", "1700000000.000100", &question),
                MessageRef::message("answer", "C1", format!("{answer_secs}.000100"), "src"),
                answer_secs,
            );
            SearchHit {
                record,
                relevance: 1.0 / (i + 1) as f64,
            }
        })
        .collect()
}

fn bench_ranking(c: &mut Criterion) {
    let engine = RankingEngine::new();
    let now = 1_800_000_000u64;
    let mut group = c.benchmark_group("ranking");

    for size in [1usize, 10, 100] {
        let hits = sample_hits(size, now);
        group.bench_with_input(BenchmarkId::from_parameter(size), &hits, |b, hits| {
            b.iter(|| engine.rank(black_box(hits.clone()), now));
        });
    }

    group.finish();
}

fn bench_color_fade(c: &mut Criterion) {
    let mut group = c.benchmark_group("color");

    group.bench_function("mix_and_format", |b| {
        b.iter(|| black_box(ANSWER_BASE).mix(WHITE, black_box(0.37)).to_hex());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_command_parsing,
    bench_ranking,
    bench_color_fade
);
criterion_main!(benches);
