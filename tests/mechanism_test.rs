mod common;

use common::{compile, run, serial};
use lesim::{EvalKind, MechanismKind, Script, Series};
use pretty_assertions::assert_eq;

fn lever_script(mechanism: &str, extra: &str) -> Script {
    compile(&format!(
        "
mechanism: {}
stimulus_elements: lever, reward, background
behaviors: press, other
u: reward:10, default:0
alpha_v: 0.1
alpha_w: 0.1
discount: 0.9
random_seed: 7
{}
@phase training stop: lever=200
LEVER lever | press: REWARD | NO_REWARD
REWARD reward | LEVER
NO_REWARD background | LEVER

@run training
",
        mechanism, extra
    ))
}

fn one(series: Series) -> Vec<f64> {
    match series {
        Series::One(values) => values,
        Series::PerSubject(_) => panic!("expected one series"),
    }
}

#[tokio::test]
async fn test_every_mechanism_learns_to_press() {
    for mechanism in ["sr", "es", "ql", "ac", "ga", "cm"] {
        let script = lever_script(mechanism, "");
        let output = run(&script, &serial()).await;
        let p = one(
            output
                .vwpn_eval(EvalKind::P, "lever->press", &script.parameters)
                .unwrap(),
        );
        let first = p[0];
        let last = p[p.len() - 1];
        assert!((first - 0.5).abs() < 1e-12, "{}: {}", mechanism, first);
        assert!(last > 0.7, "{}: p(press) ended at {}", mechanism, last);
    }
}

#[tokio::test]
async fn test_value_series_lengths() {
    let script = lever_script("ga", "");
    let output = run(&script, &serial()).await;
    let subject = &output.runs[0].subjects[0];
    let steps = subject.n_steps();
    assert_eq!(subject.history.len(), 2 * steps);

    let v = one(
        output
            .vwpn_eval(EvalKind::V, "lever->press", &script.parameters)
            .unwrap(),
    );
    let w = one(
        output
            .vwpn_eval(EvalKind::W, "reward", &script.parameters)
            .unwrap(),
    );
    assert_eq!(v.len(), steps + 1);
    assert_eq!(w.len(), steps + 1);
    assert_eq!(v[0], 0.0);
    assert!(v[steps] > 0.0);
}

#[tokio::test]
async fn test_trace_variant_runs() {
    let script = lever_script("ga", "trace: 0.5");
    assert_eq!(script.runs[0].parameters.trace, 0.5);
    let output = run(&script, &serial()).await;
    let v = one(
        output
            .vwpn_eval(EvalKind::V, "lever->press", &script.parameters)
            .unwrap(),
    );
    assert!(v[v.len() - 1] > 0.0);
}

#[tokio::test]
async fn test_capabilities() {
    let script = lever_script("sr", "");
    assert_eq!(script.runs[0].parameters.mechanism, MechanismKind::StimulusResponse);
    let output = run(&script, &serial()).await;
    for (kind, name) in [(EvalKind::W, "w"), (EvalKind::Vss, "vss")] {
        let error = output
            .vwpn_eval(kind, "lever", &script.parameters)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            format!("Mechanism error: Used mechanism does not have variable '{}'.", name)
        );
    }
}

#[test]
fn test_missing_mechanism() {
    let error = Script::compile(
        "
stimulus_elements: s
behaviors: b
@phase P stop: s=2
L s | L
@run P
",
    )
    .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Error on line 6: Parameter 'mechanism' is not specified."
    );
}
