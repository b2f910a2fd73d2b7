use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use lesim::{Script, SilentReporter, SimulationConfig};

const SCRIPT: &str = "
mechanism: ga
stimulus_elements: lever, reward, background
behaviors: press, other
u: reward:10, default:0
alpha_v: 0.1
alpha_w: 0.1
random_seed: 1
n_subjects: 4

@phase training stop: lever=500
LEVER lever | press: REWARD(0.8), NO_REWARD | NO_REWARD
REWARD reward | LEVER
NO_REWARD background | LEVER

@run training
";

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile script", |b| {
        b.iter(|| Script::compile(SCRIPT).expect("script compiles"))
    });
}

fn bench_run(c: &mut Criterion) {
    let script = Script::compile(SCRIPT).expect("script compiles");
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let config = SimulationConfig::default();
    c.bench_function("run script", |b| {
        b.iter(|| {
            runtime
                .block_on(script.run(&config, Arc::new(SilentReporter::new())))
                .expect("script runs")
        })
    });
}

// ベンチマークグループの定義
criterion_group!(benches, bench_compile, bench_run);
criterion_main!(benches);
