//! # Script Compiler
//!
//! Turns script text into a [`Script`]: the final parameters and variables,
//! the compiled phases, the declared runs and the postprocessing commands.
//!
//! ```text
//! text ─▶ clean_script ─▶ merge_continuations ─▶ classify each line
//!                                                   ├─ parameter   ─▶ Parameters::set
//!                                                   ├─ @variables  ─▶ Variables::define
//!                                                   ├─ @phase      ─▶ Phase::compile (body = following lines)
//!                                                   ├─ @run        ─▶ Run (parameter snapshot)
//!                                                   └─ @plot, ...  ─▶ PostCommand
//! ```
//!
//! Compilation stops at the first error, which carries the line number of
//! the original text.

pub mod command;
pub mod text;

use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::SimulationConfig;
use crate::error::InternalResult;
use crate::eval::EvalError;
use crate::mechanism::check_compatibility;
use crate::output::ScriptOutput;
use crate::parameters::{ParameterEnv, ParameterName, Parameters, RunParameters};
use crate::phase::{Phase, PhaseDefinition};
use crate::progress::ProgressReporter;
use crate::run::Run;
use crate::tokenizer::token::is_identifier;
use crate::variables::Variables;
use crate::world::PhaseSlot;

pub use command::{CommandKind, PostCommand};
use text::{clean_script, merge_continuations, split_first_word, split_list, SourceLine};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Error on line {line}: {message}")]
pub struct CompileError {
    pub line: usize,
    pub message: String,
}

impl CompileError {
    pub fn new<S: Into<String>>(line: usize, message: S) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// Attributes an evaluation error to `line` unless it already has one.
    pub fn from_eval(line: usize, error: EvalError) -> Self {
        match error {
            EvalError::AtLine { line, message } => Self::new(line, message),
            other => Self::new(line, other.to_string()),
        }
    }
}

/// What a logical line is.
#[derive(Debug, Clone, PartialEq)]
enum Statement<'a> {
    Parameter(ParameterName, &'a str),
    Variables(&'a str),
    /// `name = expr` for an existing global variable.
    Reassign(&'a str, &'a str),
    Phase(&'a str),
    Run(&'a str),
    Command(CommandKind, &'a str),
}

/// `name` and value of `name: value` or `name = value`, split at whichever
/// separator comes first.
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let pos = text.find(|c: char| c == ':' || c == '=')?;
    let value = text[pos + 1..].trim();
    Some((text[..pos].trim(), value))
}

/// Splits on whitespace and commas outside parentheses.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && (c.is_whitespace() || c == ',') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `stop:condition` → `condition`.
fn parse_stop(text: &str) -> Result<&str, String> {
    match text.split_once(':') {
        Some((stop, condition)) if stop.trim() == "stop" && !condition.trim().is_empty() => {
            Ok(condition.trim())
        }
        _ => Err("Phase stop condition must have the form 'stop:condition'.".to_string()),
    }
}

/// `label` or `label(stop:condition)`.
fn parse_phase_with_stop(text: &str) -> Result<(&str, Option<&str>), String> {
    let invalid = || format!("Invalid parenthesis in phase label with stop condition: {}.", text);
    match (text.matches('(').count(), text.matches(')').count()) {
        (0, 0) => Ok((text, None)),
        (1, 1) => {
            let (left, right) = match (text.find('('), text.find(')')) {
                (Some(left), Some(right)) if left < right => (left, right),
                _ => return Err(invalid()),
            };
            if right == left + 1 {
                return Err("Empty condition in phase label with stop condition.".to_string());
            }
            if right != text.len() - 1 {
                return Err(format!(
                    "Malformed phase label with stop condition: {}.",
                    text
                ));
            }
            if left == 0 {
                return Err(format!(
                    "Empty phase label in phase with stop condition: {}.",
                    text
                ));
            }
            let condition = parse_stop(&text[left + 1..right])?;
            Ok((text[..left].trim(), Some(condition)))
        }
        _ => Err(invalid()),
    }
}

/// Position of every `runlabel:` on a `@run` line.
fn find_runlabels(text: &str) -> Vec<(usize, usize)> {
    let lower = text.to_ascii_lowercase();
    lower
        .match_indices("runlabel")
        .filter(|(pos, _)| *pos == 0 || lower[..*pos].ends_with(char::is_whitespace))
        .filter_map(|(pos, word)| {
            let after = &lower[pos + word.len()..];
            let colon = after.len() - after.trim_start().len();
            after
                .trim_start()
                .starts_with(':')
                .then_some((pos, pos + word.len() + colon + 1))
        })
        .collect()
}

/// A compiled script.
#[derive(Debug, Clone)]
pub struct Script {
    /// Parameters as they stand after the last line.
    pub parameters: Parameters,
    pub variables: Variables,
    pub phases: Vec<Arc<Phase>>,
    pub runs: Vec<Run>,
    pub commands: Vec<PostCommand>,
}

impl Script {
    #[tracing::instrument(level = "debug", skip(text))]
    pub fn compile(text: &str) -> Result<Script, CompileError> {
        ScriptCompiler::new().compile(text).inspect_err(|e| error!("{}", e))
    }

    pub fn phase(&self, label: &str) -> Option<&Arc<Phase>> {
        self.phases.iter().find(|p| p.label == label)
    }

    pub fn run_labels(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.label.as_str()).collect()
    }

    /// Executes every run in declaration order.
    pub async fn run(
        &self,
        config: &SimulationConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> InternalResult<ScriptOutput> {
        let mut output = ScriptOutput::default();
        for run in &self.runs {
            match run.execute(config, Arc::clone(&reporter)).await {
                Ok(run_output) => output.runs.push(run_output),
                Err(e) if e.is_interrupted() => {
                    info!("simulation interrupted in run '{}'", run.label);
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(output)
    }
}

struct ScriptCompiler {
    parameters: Parameters,
    variables: Variables,
    phases: Vec<Arc<Phase>>,
    runs: Vec<Run>,
    commands: Vec<PostCommand>,
    unnamed_runs: usize,
    rng: StdRng,
}

impl ScriptCompiler {
    fn new() -> Self {
        Self {
            parameters: Parameters::new(),
            variables: Variables::new(),
            phases: Vec::new(),
            runs: Vec::new(),
            commands: Vec::new(),
            unnamed_runs: 1,
            rng: StdRng::from_entropy(),
        }
    }

    fn compile(mut self, text: &str) -> Result<Script, CompileError> {
        let lines = merge_continuations(clean_script(text)?);
        let mut index = 0;
        while index < lines.len() {
            let line = &lines[index];
            index += 1;
            let Some(statement) = self.classify(&line.text) else {
                return Err(CompileError::new(
                    line.number,
                    format!("Invalid expression '{}'.", line.text),
                ));
            };

            // @phase and @run take the unclassified lines that follow
            let mut tail: Vec<SourceLine> = Vec::new();
            if matches!(statement, Statement::Phase(_) | Statement::Run(_)) {
                while let Some(next) = lines.get(index) {
                    if self.classify(&next.text).is_some() {
                        break;
                    }
                    tail.push(next.clone());
                    index += 1;
                }
            }

            match statement {
                Statement::Parameter(name, value) => self.parameter(line.number, name, value)?,
                Statement::Variables(list) => self.declare_variables(line.number, list)?,
                Statement::Reassign(name, value) => self
                    .variables
                    .define(name, value, &mut self.rng)
                    .map_err(|e| CompileError::from_eval(line.number, e))?,
                Statement::Phase(header) => self.phase(line.number, header, &tail)?,
                Statement::Run(rest) => self.run(line.number, rest, &tail)?,
                Statement::Command(kind, arguments) => {
                    let run_labels: Vec<String> = self.runs.iter().map(|r| r.label.clone()).collect();
                    let (phase_labels, line_labels) = self.labels();
                    let env = ParameterEnv {
                        variables: &self.variables,
                        phase_labels: &phase_labels,
                        line_labels: &line_labels,
                    };
                    let command = PostCommand::new(
                        kind,
                        line.number,
                        arguments,
                        &self.parameters,
                        &run_labels,
                        &env,
                        &mut self.rng,
                    )?;
                    self.commands.push(command);
                }
            }
        }

        debug!(
            "compiled {} phase(s), {} run(s), {} command(s)",
            self.phases.len(),
            self.runs.len(),
            self.commands.len()
        );
        Ok(Script {
            parameters: self.parameters,
            variables: self.variables,
            phases: self.phases,
            runs: self.runs,
            commands: self.commands,
        })
    }

    fn classify<'a>(&self, text: &'a str) -> Option<Statement<'a>> {
        let (word, rest) = split_first_word(text);
        if word.starts_with('@') {
            return match word.to_ascii_lowercase().as_str() {
                "@variables" => Some(Statement::Variables(rest)),
                "@phase" => Some(Statement::Phase(rest)),
                "@run" => Some(Statement::Run(rest)),
                _ => CommandKind::parse(word).map(|kind| Statement::Command(kind, rest)),
            };
        }
        let (name, value) = split_assignment(text)?;
        if let Ok(parameter) = name.to_ascii_lowercase().parse::<ParameterName>() {
            return Some(Statement::Parameter(parameter, value));
        }
        self.variables
            .contains(name)
            .then_some(Statement::Reassign(name, value))
    }

    /// Phase labels and every line label of every phase.
    fn labels(&self) -> (Vec<String>, Vec<String>) {
        let phase_labels = self.phases.iter().map(|p| p.label.clone()).collect();
        let line_labels = self.phases.iter().flat_map(|p| p.labels()).collect();
        (phase_labels, line_labels)
    }

    fn parameter(&mut self, number: usize, name: ParameterName, value: &str) -> Result<(), CompileError> {
        if value.is_empty() {
            return Err(CompileError::new(
                number,
                format!("Parameter '{}' is not specified.", name),
            ));
        }
        let (phase_labels, line_labels) = self.labels();
        let env = ParameterEnv {
            variables: &self.variables,
            phase_labels: &phase_labels,
            line_labels: &line_labels,
        };
        self.parameters
            .set(name, value, &env, &mut self.rng)
            .map_err(|e| CompileError::new(number, e.0))?;

        if name == ParameterName::RandomSeed {
            if let Some(seed) = self.parameters.random_seed() {
                debug!("compile-time generator seeded with {}", seed);
                self.rng = StdRng::seed_from_u64(seed);
            }
        }
        Ok(())
    }

    fn declare_variables(&mut self, number: usize, list: &str) -> Result<(), CompileError> {
        if list.is_empty() {
            return Err(CompileError::new(number, "@VARIABLES not specified."));
        }
        for item in split_list(list, ',') {
            let (name, value) = split_assignment(&item).ok_or_else(|| {
                CompileError::new(
                    number,
                    format!("A variable value must be given as 'name:value', got '{}'.", item),
                )
            })?;
            if !is_identifier(name) {
                return Err(CompileError::new(
                    number,
                    format!("Variable name '{}' is not a valid identifier.", name),
                ));
            }
            if self.parameters.behaviors().iter().any(|b| b == name) {
                return Err(CompileError::new(
                    number,
                    format!("The variable name '{}' is invalid, since it is a behavior name.", name),
                ));
            }
            if self.parameters.stimulus_elements().iter().any(|e| e == name) {
                return Err(CompileError::new(
                    number,
                    format!(
                        "The variable name '{}' is invalid, since it is a stimulus element.",
                        name
                    ),
                ));
            }
            if self.variables.contains(name) {
                return Err(CompileError::new(
                    number,
                    format!("Duplicate of variable '{}'.", name),
                ));
            }
            if value.is_empty() {
                return Err(CompileError::new(
                    number,
                    format!("Variable '{}' has no value.", name),
                ));
            }
            self.variables
                .define(name, value, &mut self.rng)
                .map_err(|e| CompileError::from_eval(number, e))?;
        }
        Ok(())
    }

    /// `@phase label[(parent)] [stop:condition]` followed by its body.
    fn phase(&mut self, number: usize, header: &str, body: &[SourceLine]) -> Result<(), CompileError> {
        if header.is_empty() {
            return Err(CompileError::new(
                number,
                "@PHASE line must have the form '@PHASE label stop:condition'.",
            ));
        }
        let (mut label, stop) = split_first_word(header);
        let mut parent = None;
        if let (Some(open), true) = (label.find('('), label.ends_with(')')) {
            let parent_label = &label[open + 1..label.len() - 1];
            parent = Some(
                self.phases
                    .iter()
                    .find(|p| p.label == parent_label)
                    .cloned()
                    .ok_or_else(|| {
                        CompileError::new(number, format!("Invalid phase label '{}'.", parent_label))
                    })?,
            );
            label = &label[..open];
        }
        if self.phases.iter().any(|p| p.label == label) {
            return Err(CompileError::new(
                number,
                format!("Redefinition of phase '{}'.", label),
            ));
        }
        if !is_identifier(label) {
            return Err(CompileError::new(
                number,
                format!("Phase label '{}' is not a valid identifier.", label),
            ));
        }
        let stop = match stop {
            "" => None,
            text => Some(parse_stop(text).map_err(|m| CompileError::new(number, m))?),
        };

        let phase = Phase::compile(
            PhaseDefinition {
                label,
                number,
                stop,
                parent: parent.as_deref(),
                body,
            },
            self.parameters.stimulus_elements(),
            self.parameters.behaviors(),
            &self.variables,
            &mut self.rng,
        )?;
        debug!("phase '{}' compiled with {} line(s)", phase.label, phase.lines.len());
        self.phases.push(Arc::new(phase));
        Ok(())
    }

    /// `@run [label] phase, phase(stop:condition) ... [runlabel:label]`,
    /// continued on the following lines.
    fn run(&mut self, number: usize, rest: &str, continuation: &[SourceLine]) -> Result<(), CompileError> {
        let mut label: Option<String> = None;
        let mut first = rest;

        if let Some(word) = split_words(rest).first() {
            let (phase_label, _) =
                parse_phase_with_stop(word).map_err(|m| CompileError::new(number, m))?;
            if !self.phases.iter().any(|p| p.label == phase_label) && !word.contains(':') {
                label = Some(word.clone());
                first = rest[word.len()..].trim();
            }
        }

        let mut items: Vec<(String, usize)> = Vec::new();
        let lines = std::iter::once((first, number))
            .chain(continuation.iter().map(|l| (l.text.as_str(), l.number)));
        for (text, line) in lines {
            let found = find_runlabels(text);
            let phases = match found.as_slice() {
                [] => text,
                [(start, end)] => {
                    let named = text[*end..].trim().to_string();
                    if let Some(previous) = &label {
                        return Err(CompileError::new(
                            line,
                            format!("Duplicate run labels {} and {} on a @run line.", previous, named),
                        ));
                    }
                    label = Some(named);
                    text[..*start].trim()
                }
                _ => {
                    return Err(CompileError::new(
                        line,
                        "Maximum one instance of 'runlabel:' on a @run line.",
                    ))
                }
            };
            items.extend(split_words(phases).into_iter().map(|w| (w, line)));
        }
        if items.is_empty() {
            return Err(CompileError::new(number, "No phase label given in @run."));
        }

        let label = match label {
            Some(label) => label,
            None => {
                let label = format!("run{}", self.unnamed_runs);
                self.unnamed_runs += 1;
                label
            }
        };
        if label.is_empty() {
            return Err(CompileError::new(number, "Empty run label."));
        }
        if self.runs.iter().any(|r| r.label == label) {
            return Err(CompileError::new(
                number,
                format!("Duplication of run label '{}'.", label),
            ));
        }

        let mut slots = Vec::with_capacity(items.len());
        for (item, line) in &items {
            let (phase_label, stop) =
                parse_phase_with_stop(item).map_err(|m| CompileError::new(*line, m))?;
            let phase = self
                .phases
                .iter()
                .find(|p| p.label == phase_label)
                .ok_or_else(|| CompileError::new(*line, format!("Phase {} undefined.", phase_label)))?;
            let stop = stop
                .map(|text| phase.compile_stop(text, *line, &self.variables))
                .transpose()?;
            slots.push(PhaseSlot::new(Arc::clone(phase), stop, *line));
        }

        let parameters =
            RunParameters::build(&self.parameters).map_err(|e| CompileError::new(number, e.0))?;
        check_compatibility(parameters.mechanism, &slots)?;

        info!(
            "run '{}' declared: mechanism {}, {} phase(s), {} subject(s)",
            label,
            parameters.mechanism,
            slots.len(),
            parameters.n_subjects
        );
        self.runs.push(Run {
            label,
            index: self.runs.len(),
            parameters: Arc::new(parameters),
            slots: Arc::new(slots),
            variables: self.variables.clone(),
            random_seed: self.parameters.random_seed(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::MechanismKind;
    use crate::progress::SilentReporter;
    use pretty_assertions::assert_eq;

    const SCRIPT: &str = "
mechanism: sr
stimulus_elements: s, us
behaviors: b, c
alpha_v: 0.1
@variables x:1, y:rand(1,3)

@phase training stop: s=5
L1 s  | b: L2 | L1
L2 us | L1

@run training
";

    fn compile_err(text: &str) -> String {
        Script::compile(text).unwrap_err().to_string()
    }

    #[test]
    fn test_compile_script() {
        let script = Script::compile(SCRIPT).unwrap();
        assert_eq!(script.phases.len(), 1);
        assert_eq!(script.phases[0].labels(), vec!["L1", "L2"]);
        assert_eq!(script.run_labels(), vec!["run1"]);
        let run = &script.runs[0];
        assert_eq!(run.parameters.mechanism, MechanismKind::StimulusResponse);
        assert_eq!(run.parameters.alpha_v.get(0, 1), Some(0.1));
        assert!(script.variables.contains("y"));
    }

    #[test]
    fn test_run_snapshot_is_not_affected_by_later_lines() {
        let text = format!("{}\nalpha_v: 0.5\n@run second training\n", SCRIPT);
        let script = Script::compile(&text).unwrap();
        assert_eq!(script.run_labels(), vec!["run1", "second"]);
        assert_eq!(script.runs[0].parameters.alpha_v.get(0, 0), Some(0.1));
        assert_eq!(script.runs[1].parameters.alpha_v.get(0, 0), Some(0.5));
    }

    #[test]
    fn test_run_forms() {
        let text = "
mechanism: sr
stimulus_elements: s
behaviors: b
@phase A stop: s=2
L s | L
@phase B stop: s=3
L s | L
@run A(stop: s = 4),
     B runlabel: both
@run A
B
";
        let script = Script::compile(text).unwrap();
        assert_eq!(script.run_labels(), vec!["both", "run1"]);
        let both = &script.runs[0];
        assert_eq!(both.slots.len(), 2);
        assert!(both.slots[0].stop.is_some());
        assert!(both.slots[1].stop.is_none());
        assert_eq!(script.runs[1].slots.len(), 2);
        assert_eq!(script.runs[1].slots[1].line, 12);
    }

    #[test]
    fn test_run_errors() {
        assert_eq!(
            compile_err(&format!("{}@run run1 training", SCRIPT)),
            "Error on line 13: Duplication of run label 'run1'."
        );
        assert_eq!(
            compile_err(&format!("{}@run mine training runlabel: other", SCRIPT)),
            "Error on line 13: Duplicate run labels mine and other on a @run line."
        );
        assert_eq!(
            compile_err(&format!("{}@run training, missing", SCRIPT)),
            "Error on line 13: Phase missing undefined."
        );
        assert_eq!(
            compile_err(&format!("{}@run training(s=2)", SCRIPT)),
            "Error on line 13: Phase stop condition must have the form 'stop:condition'."
        );
        assert_eq!(
            compile_err(&format!("{}@run label", SCRIPT)),
            "Error on line 13: No phase label given in @run."
        );
    }

    #[test]
    fn test_phase_inheritance() {
        let text = format!("{}@phase extended(training) stop: s=10\nL2 us | L2\n", SCRIPT);
        let script = Script::compile(&text).unwrap();
        let extended = script.phase("extended").unwrap();
        assert_eq!(extended.labels(), vec!["L1", "L2"]);
        assert_eq!(extended.lines[1].number, 14);

        assert_eq!(
            compile_err(&format!("{}@phase C(nothing) stop: s=1\nL s | L", SCRIPT)),
            "Error on line 13: Invalid phase label 'nothing'."
        );
        assert_eq!(
            compile_err(&format!("{}@phase training stop: s=1\nL s | L", SCRIPT)),
            "Error on line 13: Redefinition of phase 'training'."
        );
    }

    #[test]
    fn test_variables() {
        let text = format!("{}x = x + 1\n@phase P stop: s=x\nL s | L\n", SCRIPT);
        let script = Script::compile(&text).unwrap();
        assert_eq!(script.variables.get("x").and_then(|v| v.as_f64()), Some(2.0));

        assert_eq!(
            compile_err("stimulus_elements: s\n@variables s:1"),
            "Error on line 2: The variable name 's' is invalid, since it is a stimulus element."
        );
        assert_eq!(
            compile_err("@variables a:1, a:2"),
            "Error on line 1: Duplicate of variable 'a'."
        );
        assert_eq!(
            compile_err(&format!("{}@phase P stop: s=2\nL s | x:2, L", SCRIPT)),
            "Error on line 14: Cannot modify global variable inside a phase."
        );
    }

    #[test]
    fn test_statement_errors() {
        assert_eq!(
            compile_err("mechanism: sr\nthis is nothing"),
            "Error on line 2: Invalid expression 'this is nothing'."
        );
        assert_eq!(compile_err("beta:"), "Error on line 1: Parameter 'beta' is not specified.");
        assert_eq!(
            compile_err("random_seed: 1\nrandom_seed: 2"),
            "Error on line 2: The parameter 'random_seed' can only be set once."
        );
        assert_eq!(compile_err("\n# only a comment\n"), "Error on line 1: Script is empty.");
    }

    #[test]
    fn test_rw_rejects_behavior_dependent_stop() {
        let text = "
mechanism: rw
stimulus_elements: cs, us
behaviors: b
@phase A stop: b=2
L cs | L
@run A
";
        assert_eq!(
            compile_err(text),
            "Error on line 5: Stop condition cannot depend on behavior in mechanism 'rw'."
        );
    }

    #[test]
    fn test_commands_refer_to_runs() {
        let text = format!("{}@vplot s->b\n@figure(1,2) title\n", SCRIPT);
        let script = Script::compile(&text).unwrap();
        assert_eq!(script.commands.len(), 2);
        assert_eq!(script.commands[0].kind, CommandKind::VPlot);
        assert_eq!(script.commands[0].run_label.as_deref(), Some("run1"));
        assert_eq!(script.commands[1].kind, CommandKind::Figure);

        assert_eq!(
            compile_err(&format!("{}runlabel: other\n@nplot s", SCRIPT)),
            "Error on line 14: Unknown run label 'other'."
        );
    }

    #[tokio::test]
    async fn test_run_script() {
        let text = format!("random_seed: 3\nn_subjects: 2\n{}", SCRIPT);
        let script = Script::compile(&text).unwrap();
        let config = SimulationConfig {
            parallel: false,
            ..SimulationConfig::default()
        };
        let output = script
            .run(&config, Arc::new(SilentReporter::new()))
            .await
            .unwrap();
        assert_eq!(output.runs.len(), 1);
        assert_eq!(output.runs[0].subjects.len(), 2);
        // s=5 stops before a sixth s
        let n_s = output.runs[0].subjects[0]
            .history
            .iter()
            .step_by(2)
            .filter(|item| item.iter().any(|e| e == "s"))
            .count();
        assert_eq!(n_s, 5);
    }

    #[tokio::test]
    async fn test_interrupted_run() {
        let script = Script::compile(SCRIPT).unwrap();
        let reporter = Arc::new(SilentReporter::new());
        reporter.request_stop();
        let result = script.run(&SimulationConfig::default(), reporter).await;
        assert!(result.unwrap_err().is_interrupted());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(
            split_words("A(stop: s = 2), B  C"),
            vec!["A(stop: s = 2)", "B", "C"]
        );
        assert_eq!(parse_phase_with_stop("A(stop:s=1)"), Ok(("A", Some("s=1"))));
        assert_eq!(find_runlabels("A, B runlabel : x").len(), 1);
        assert!(find_runlabels("A, myrunlabel: x").is_empty());
        assert_eq!(split_assignment("u = a:1"), Some(("u", "a:1")));
    }
}
