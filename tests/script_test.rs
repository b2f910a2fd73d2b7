mod common;

use common::{compile, run, serial};
use lesim::script::CommandKind;
use lesim::{Script, Series};
use pretty_assertions::assert_eq;

fn error(text: &str) -> String {
    Script::compile(text).unwrap_err().to_string()
}

#[test]
fn test_comments_and_continuations() {
    let script = compile(
        "
###
written by hand
###
mechanism: sr   # stimulus-response
stimulus_elements: s1,
                   s2
behaviors: b
start_v: s1->b: 1,
         default: 0
@phase P stop: s1 = 3
L s1 | M
M s2 | L
@run P
",
    );
    let params = &script.runs[0].parameters;
    assert_eq!(params.elements.names(), &["s1".to_string(), "s2".to_string()]);
    assert_eq!(params.start_v.get(0, 0), Some(1.0));
    assert_eq!(params.start_v.get(1, 0), Some(0.0));
    assert_eq!(script.phases[0].number, 11);
}

#[test]
fn test_parameter_errors_carry_line() {
    assert_eq!(
        error("stimulus_elements: s\nbehaviors: b, c\nstart_v: s->b:1"),
        "Error on line 3: Missing default value for parameter 'start_v'."
    );
    assert_eq!(
        error("stimulus_elements: s\nbehaviors: s"),
        "Error on line 2: The behavior name 's' is invalid, since it is a stimulus element."
    );
    assert_eq!(
        error("mechanism: nonsense"),
        "Error on line 1: Invalid mechanism name 'nonsense'. Mechanism name must be one of the following: ac, cm, es, ga, ql, rw, sr."
    );
    assert_eq!(
        error("n_subjects = 0"),
        "Error on line 1: Parameter n_subjects must be a positive integer."
    );
}

#[test]
fn test_phase_errors() {
    let header = "mechanism: sr\nstimulus_elements: s\nbehaviors: b\n";
    let unknown = error(&format!("{}@phase P stop: s=2\nL s | M", header));
    assert!(unknown.starts_with("Error on line 5: "), "{}", unknown);
    assert!(unknown.contains("Unknown line label 'M'."), "{}", unknown);
    assert_eq!(
        error(&format!("{}@phase 1P stop: s=2\nL s | L", header)),
        "Error on line 4: Phase label '1P' is not a valid identifier."
    );
    assert_eq!(
        error(&format!("{}@phase P s=2\nL s | L", header)),
        "Error on line 4: Phase stop condition must have the form 'stop:condition'."
    );
}

#[tokio::test]
async fn test_commands_evaluate_against_output() {
    let script = compile(
        "
mechanism: sr
stimulus_elements: s
behaviors: b, c
@phase P stop: s=4
L s | L
@run first P
@run second P
runlabel: first
@nplot s
runlabel: second
@vexport s->b; s->c values.csv
",
    );
    assert_eq!(script.commands.len(), 2);
    assert_eq!(script.commands[0].run_label.as_deref(), Some("first"));
    assert_eq!(script.commands[1].run_label.as_deref(), Some("second"));
    assert_eq!(script.commands[1].kind, CommandKind::VExport);
    assert_eq!(script.commands[1].filename(), Some("values.csv"));

    let output = run(&script, &serial()).await;
    let n = script.commands[0].evaluate(&output).unwrap();
    assert_eq!(
        n,
        vec![(
            "s".to_string(),
            Series::One(vec![0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0])
        )]
    );
    let v = script.commands[1].evaluate(&output).unwrap();
    assert_eq!(v.len(), 2);
    assert_eq!(v[1].0, "s->c");
}
