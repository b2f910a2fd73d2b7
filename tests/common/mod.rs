use std::sync::Arc;

use lesim::{Script, ScriptOutput, SilentReporter, SimulationConfig};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    // テストの前に一度だけ実行したい処理
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

pub fn compile(text: &str) -> Script {
    Script::compile(text).unwrap_or_else(|e| panic!("{}", e))
}

pub async fn run(script: &Script, config: &SimulationConfig) -> ScriptOutput {
    script
        .run(config, Arc::new(SilentReporter::new()))
        .await
        .unwrap_or_else(|e| panic!("{}", e))
}

pub fn serial() -> SimulationConfig {
    SimulationConfig {
        parallel: false,
        ..SimulationConfig::default()
    }
}

#[allow(dead_code)]
pub fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{:?} vs {:?}", actual, expected);
    }
}
