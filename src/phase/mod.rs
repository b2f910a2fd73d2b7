//! # Phases
//!
//! A phase is a set of labelled lines. Each line presents a stimulus (or,
//! on a help line, nothing) and lists conditions choosing the next line from
//! the subject's response, variables and event counts.
//!
//! ```text
//! @phase training stop: reward = 100
//! START  lever | RESPONSE
//! RESPONSE lever | press: REWARD(0.8), NO_REWARD | START
//! REWARD reward  | START
//! NO_REWARD bg   | START
//! ```
//!
//! Compilation runs in passes over the body: labels first, so that
//! conditions may name lines defined further down, then the lines, then a
//! check of every name used by guards and the stop condition. A phase
//! declared as `child(parent)` starts from the parent's body; child lines
//! replace parent lines with the same label and append the others.

pub mod counter;
pub mod line;
pub mod state;

use std::collections::BTreeSet;

use rand::Rng;
use tracing::debug;

use crate::ast::Expression;
use crate::script::text::{split_first_word, SourceLine};
use crate::script::CompileError;
use crate::tokenizer::token::is_identifier;
use crate::variables::Variables;

pub use counter::EventCounter;
pub use line::{Action, Amount, Condition, Destination, Guard, PhaseLine};
pub use state::{PhaseState, PhaseStep};

const FUNCTIONS: [&str; 4] = ["rand", "choice", "count", "count_line"];

/// Names visible while a phase is compiled.
pub struct PhaseScope<'a> {
    pub elements: &'a [String],
    pub behaviors: &'a [String],
    pub variables: &'a Variables,
    pub labels: &'a [String],
}

impl PhaseScope<'_> {
    pub fn is_element(&self, name: &str) -> bool {
        self.elements.iter().any(|e| e == name)
    }

    pub fn is_behavior(&self, name: &str) -> bool {
        self.behaviors.iter().any(|b| b == name)
    }

    pub fn is_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }

    /// Something `count(...)` can count.
    pub fn is_event(&self, name: &str) -> bool {
        self.is_element(name) || self.is_behavior(name) || self.is_label(name)
    }
}

#[derive(Debug, Clone)]
pub struct Phase {
    pub label: String,
    /// Line of the `@phase` header.
    pub number: usize,
    pub stop: Guard,
    pub lines: Vec<PhaseLine>,
    pub local_names: BTreeSet<String>,
    pub elements: Vec<String>,
    pub behaviors: Vec<String>,
    source: Vec<SourceLine>,
}

/// Header and body of a phase as collected by the script compiler.
#[derive(Debug, Clone)]
pub struct PhaseDefinition<'a> {
    pub label: &'a str,
    pub number: usize,
    pub stop: Option<&'a str>,
    pub parent: Option<&'a Phase>,
    pub body: &'a [SourceLine],
}

impl Phase {
    pub fn compile<R: Rng + ?Sized>(
        definition: PhaseDefinition,
        elements: &[String],
        behaviors: &[String],
        variables: &Variables,
        rng: &mut R,
    ) -> Result<Phase, CompileError> {
        let PhaseDefinition {
            label,
            number,
            stop,
            parent,
            body,
        } = definition;
        debug!("compiling phase '{}' ({} lines)", label, body.len());

        let source = Self::merge(parent, body)?;
        if source.is_empty() {
            return Err(CompileError::new(
                number,
                format!("Phase '{}' has no lines.", label),
            ));
        }

        // Labels
        let mut labels: Vec<String> = Vec::with_capacity(source.len());
        let mut rests: Vec<&str> = Vec::with_capacity(source.len());
        for line in &source {
            let (line_label, rest) = split_first_word(&line.text);
            if rest.is_empty() {
                return Err(CompileError::new(
                    line.number,
                    "Phase line contains only label.",
                ));
            }
            let coincide = format!(
                "The phase line label '{}' coincides with the name of a ",
                line_label
            );
            if elements.iter().any(|e| e == line_label) {
                return Err(CompileError::new(line.number, coincide + "stimulus element."));
            }
            if behaviors.iter().any(|b| b == line_label) {
                return Err(CompileError::new(line.number, coincide + "behavior."));
            }
            if !is_identifier(line_label) {
                return Err(CompileError::new(
                    line.number,
                    format!("Invalid phase line label '{}'.", line_label),
                ));
            }
            labels.push(line_label.to_string());
            rests.push(rest);
        }

        // Lines
        let scope = PhaseScope {
            elements,
            behaviors,
            variables,
            labels: &labels,
        };
        let mut lines = Vec::with_capacity(source.len());
        for ((line, line_label), rest) in source.iter().zip(&labels).zip(&rests) {
            lines.push(line::parse_line(line_label, rest, line.number, &scope, rng)?);
        }

        let local_names: BTreeSet<String> = lines
            .iter()
            .flat_map(|l| l.assigned_names())
            .map(str::to_string)
            .collect();

        let stop = match (stop, parent) {
            (Some(text), _) => Guard::parse(text).map_err(|e| CompileError::new(number, e.to_string()))?,
            (None, Some(parent)) => parent.stop.clone(),
            (None, None) => {
                return Err(CompileError::new(
                    number,
                    format!("Phase '{}' has no stop condition.", label),
                ))
            }
        };

        let phase = Phase {
            label: label.to_string(),
            number,
            stop,
            lines,
            local_names,
            elements: elements.to_vec(),
            behaviors: behaviors.to_vec(),
            source,
        };
        phase.check_names(variables, &labels)?;
        Ok(phase)
    }

    fn merge(parent: Option<&Phase>, body: &[SourceLine]) -> Result<Vec<SourceLine>, CompileError> {
        let mut merged: Vec<SourceLine> = parent.map(|p| p.source.clone()).unwrap_or_default();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for line in body {
            let (line_label, _) = split_first_word(&line.text);
            if !seen.insert(line_label) {
                return Err(CompileError::new(
                    line.number,
                    format!("Duplicate of phase line label '{}'.", line_label),
                ));
            }
            match merged
                .iter_mut()
                .find(|m| split_first_word(&m.text).0 == line_label)
            {
                Some(existing) => *existing = line.clone(),
                None => merged.push(line.clone()),
            }
        }
        Ok(merged)
    }

    fn check_names(&self, variables: &Variables, labels: &[String]) -> Result<(), CompileError> {
        let scope = PhaseScope {
            elements: &self.elements,
            behaviors: &self.behaviors,
            variables,
            labels,
        };
        self.check_expression(&self.stop.expression, &scope)
            .map_err(|m| CompileError::new(self.number, m))?;
        for line in &self.lines {
            let actions = line
                .help_actions
                .iter()
                .chain(line.conditions.iter().flat_map(|c| c.actions.iter()));
            for action in actions {
                if let Action::Assign { expression, .. } = action {
                    self.check_expression(expression, &scope)
                        .map_err(|m| CompileError::new(line.number, m))?;
                }
            }
            for guard in line.guards() {
                self.check_expression(&guard.expression, &scope)
                    .map_err(|m| CompileError::new(line.number, m))?;
            }
        }
        Ok(())
    }

    fn check_expression(&self, expression: &Expression, scope: &PhaseScope) -> Result<(), String> {
        if let Some(function) = expression
            .functions()
            .into_iter()
            .find(|f| !FUNCTIONS.contains(&f.as_str()))
        {
            return Err(format!("Unknown function '{}'.", function));
        }
        match expression.names().into_iter().find(|name| {
            !(scope.variables.contains(name)
                || self.local_names.contains(name)
                || scope.is_event(name))
        }) {
            Some(name) => Err(format!("Unknown variable '{}'.", name)),
            None => Ok(()),
        }
    }

    /// Compiles a stop condition given for this phase in `@run`.
    pub fn compile_stop(
        &self,
        text: &str,
        number: usize,
        variables: &Variables,
    ) -> Result<Guard, CompileError> {
        let guard = Guard::parse(text).map_err(|e| CompileError::new(number, e.to_string()))?;
        let labels = self.labels();
        let scope = PhaseScope {
            elements: &self.elements,
            behaviors: &self.behaviors,
            variables,
            labels: &labels,
        };
        self.check_expression(&guard.expression, &scope)
            .map_err(|m| CompileError::new(number, m))?;
        Ok(guard)
    }

    pub fn labels(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.label.clone()).collect()
    }

    pub fn line(&self, index: usize) -> Option<&PhaseLine> {
        self.lines.get(index)
    }

    pub fn is_element(&self, name: &str) -> bool {
        self.elements.iter().any(|e| e == name)
    }

    pub fn is_behavior(&self, name: &str) -> bool {
        self.behaviors.iter().any(|b| b == name)
    }

    pub fn is_label(&self, name: &str) -> bool {
        self.lines.iter().any(|l| l.label == name)
    }

    /// Whether a guard of any line reads the response.
    pub fn lines_depend_on_behavior(&self) -> bool {
        self.lines
            .iter()
            .flat_map(|l| l.guards())
            .any(|g| g.depends_on(&self.behaviors))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    pub(crate) fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    pub(crate) fn body(lines: &[&str]) -> Vec<SourceLine> {
        lines
            .iter()
            .enumerate()
            .map(|(i, text)| SourceLine::new(i + 2, *text))
            .collect()
    }

    pub(crate) fn compile_phase(
        label: &str,
        stop: Option<&str>,
        parent: Option<&Phase>,
        lines: &[&str],
    ) -> Result<Phase, CompileError> {
        let mut rng = StdRng::seed_from_u64(0);
        let variables = Variables::new();
        let source = body(lines);
        Phase::compile(
            PhaseDefinition {
                label,
                number: 1,
                stop,
                parent,
                body: &source,
            },
            &strings(&["s", "us"]),
            &strings(&["b", "c"]),
            &variables,
            &mut rng,
        )
    }

    #[test]
    fn test_compile_phase() {
        let phase = compile_phase(
            "A",
            Some("s=10"),
            None,
            &["L1 s | b: L2 | L1", "L2 us | x:x+1, L1"],
        )
        .unwrap();
        assert_eq!(phase.labels(), strings(&["L1", "L2"]));
        assert_eq!(phase.local_names.len(), 1);
        assert!(phase.lines_depend_on_behavior());
    }

    #[test]
    fn test_inheritance() {
        let parent = compile_phase("A", Some("s=10"), None, &["L1 s | L2", "L2 us | L1"]).unwrap();
        let child = compile_phase("B", None, Some(&parent), &["L2 s | L3", "L3 us | L1"]).unwrap();
        assert_eq!(child.labels(), strings(&["L1", "L2", "L3"]));
        assert_eq!(child.lines[1].stimulus[0].0, "s");
        assert_eq!(child.stop.source, "s=10");

        let same = compile_phase("C", None, Some(&parent), &[]).unwrap();
        assert_eq!(same.lines, parent.lines);
    }

    #[test]
    fn test_phase_errors() {
        let message = |stop: Option<&str>, lines: &[&str]| {
            compile_phase("A", stop, None, lines).unwrap_err().to_string()
        };
        assert_eq!(
            message(Some("s=1"), &["L1"]),
            "Error on line 2: Phase line contains only label."
        );
        assert_eq!(
            message(Some("s=1"), &["s s | L1"]),
            "Error on line 2: The phase line label 's' coincides with the name of a stimulus element."
        );
        assert_eq!(
            message(Some("s=1"), &["L1 s | L1", "L1 us | L1"]),
            "Error on line 3: Duplicate of phase line label 'L1'."
        );
        assert_eq!(
            message(None, &["L1 s | L1"]),
            "Error on line 1: Phase 'A' has no stop condition."
        );
        assert_eq!(
            message(Some("q=1"), &["L1 s | L1"]),
            "Error on line 1: Unknown variable 'q'."
        );
        assert_eq!(
            message(Some("s=1"), &["L1 s | sqrt(s)>1: L1 | L1"]),
            "Error on line 2: Unknown function 'sqrt'."
        );
    }

    #[test]
    fn test_stop_override() {
        let phase = compile_phase("A", Some("s=10"), None, &["L1 s | L1"]).unwrap();
        let variables = Variables::new();
        assert!(phase.compile_stop("count(L1)=3", 9, &variables).is_ok());
        assert_eq!(
            phase.compile_stop("z=3", 9, &variables).unwrap_err().to_string(),
            "Error on line 9: Unknown variable 'z'."
        );
    }
}
