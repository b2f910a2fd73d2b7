use std::sync::Arc;

use rand::Rng;
use tracing::trace;

use super::line::intensity_error;
use super::{Action, Amount, EventCounter, Guard, Phase};
use crate::eval::{EvalContext, EvalError, EvalResult, ExpressionEvaluator, Value};
use crate::variables::{LocalVariables, Variables};

/// Help lines passed in one step before the phase is considered stuck.
const MAX_HELP_LINES: usize = 10_000;

/// The stimulus a phase presents next.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStep {
    pub line_label: String,
    pub stimulus: Vec<(String, f64)>,
    /// Help lines passed on the way, in order.
    pub help_lines: Vec<String>,
    /// Set when a taken condition carried `@omit_learn`.
    pub omit_learn: bool,
}

/// One subject's visit of a phase.
#[derive(Debug, Clone)]
pub struct PhaseState {
    phase: Arc<Phase>,
    stop: Guard,
    counter: EventCounter,
    locals: LocalVariables,
    current: Option<usize>,
}

struct LineContext<'a> {
    phase: &'a Phase,
    globals: &'a Variables,
    locals: &'a LocalVariables,
    counter: &'a EventCounter,
    response: Option<&'a str>,
    is_stop: bool,
}

impl EvalContext for LineContext<'_> {
    fn resolve(&self, name: &str) -> EvalResult<Value> {
        if let Some(value) = self.locals.get(name).or_else(|| self.globals.get(name)) {
            return Ok(value.clone());
        }
        if self.phase.is_behavior(name) {
            return Ok(if self.is_stop {
                Value::Integer(self.counter.count(name))
            } else {
                Value::Boolean(self.response == Some(name))
            });
        }
        if self.phase.is_element(name) || self.phase.is_label(name) {
            return Ok(Value::Integer(if self.is_stop {
                self.counter.count(name)
            } else {
                self.counter.count_line(name)
            }));
        }
        Err(EvalError::UnknownVariable(name.to_string()))
    }

    fn count(&self, event: &str) -> EvalResult<i64> {
        Ok(self.counter.count(event))
    }

    fn count_line(&self, event: Option<&str>) -> EvalResult<i64> {
        let event = event.or(self.counter.line_label()).unwrap_or_default();
        Ok(self.counter.count_line(event))
    }
}

impl PhaseState {
    /// Enters `phase`; counters and local variables start from zero.
    pub fn new(phase: Arc<Phase>, stop: Option<Guard>) -> Self {
        let stop = stop.unwrap_or_else(|| phase.stop.clone());
        let locals = LocalVariables::new(phase.local_names.clone());
        Self {
            phase,
            stop,
            counter: EventCounter::new(),
            locals,
            current: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn counter(&self) -> &EventCounter {
        &self.counter
    }

    fn context<'a>(
        &'a self,
        globals: &'a Variables,
        response: Option<&'a str>,
        is_stop: bool,
    ) -> LineContext<'a> {
        LineContext {
            phase: &self.phase,
            globals,
            locals: &self.locals,
            counter: &self.counter,
            response,
            is_stop,
        }
    }

    fn stop_met<R: Rng + ?Sized>(&self, globals: &Variables, rng: &mut R) -> EvalResult<bool> {
        let context = self.context(globals, None, true);
        self.stop
            .is_met(&context, rng)
            .map_err(|e| e.at_line(self.phase.number))
    }

    /// The next stimulus given the response to the previous one, or `None`
    /// once the stop condition holds.
    pub fn next_stimulus<R: Rng + ?Sized>(
        &mut self,
        response: Option<&str>,
        globals: &Variables,
        rng: &mut R,
    ) -> EvalResult<Option<PhaseStep>> {
        if let Some(response) = response {
            self.counter.increment(response);
        }

        let phase = Arc::clone(&self.phase);
        let mut help_lines = Vec::new();
        let mut omit_learn = false;
        loop {
            if self.stop_met(globals, rng)? {
                trace!("phase '{}' stop condition met", phase.label);
                return Ok(None);
            }

            let next = match self.current {
                None => 0,
                Some(current) => {
                    let (next, omit) = self.choose(current, response, globals, rng)?;
                    omit_learn |= omit;
                    next
                }
            };
            self.current = Some(next);
            let Some(line) = phase.line(next) else {
                return Err(EvalError::eval(format!(
                    "Internal error: line {} missing in phase '{}'.",
                    next, phase.label
                )));
            };
            self.counter.enter_line(&line.label);
            self.counter.increment(&line.label);

            if line.is_help() {
                for action in &line.help_actions {
                    self.perform(action, globals, response, rng)
                        .map_err(|e| e.at_line(line.number))?;
                }
                help_lines.push(line.label.clone());
                if help_lines.len() > MAX_HELP_LINES {
                    return Err(EvalError::eval(format!(
                        "Phase '{}' passed {} help lines without presenting a stimulus.",
                        phase.label, MAX_HELP_LINES
                    )));
                }
                continue;
            }

            let stimulus = self
                .intensities(&line.stimulus, globals, response, rng)
                .map_err(|e| e.at_line(line.number))?;
            for (element, _) in &stimulus {
                self.counter.increment(element);
            }
            return Ok(Some(PhaseStep {
                line_label: line.label.clone(),
                stimulus,
                help_lines,
                omit_learn,
            }));
        }
    }

    /// Takes the first condition of line `current` whose guard holds and
    /// whose destination draw succeeds.
    fn choose<R: Rng + ?Sized>(
        &mut self,
        current: usize,
        response: Option<&str>,
        globals: &Variables,
        rng: &mut R,
    ) -> EvalResult<(usize, bool)> {
        let phase = Arc::clone(&self.phase);
        let Some(line) = phase.line(current) else {
            return Err(EvalError::eval("Internal error: no current phase line."));
        };
        for condition in &line.conditions {
            let met = match &condition.guard {
                Some(guard) => guard
                    .is_met(&self.context(globals, response, false), rng)
                    .map_err(|e| e.at_line(line.number))?,
                None => true,
            };
            if !met {
                continue;
            }
            let drawn = condition
                .draw(&self.context(globals, response, false), rng)
                .map_err(|e| e.at_line(line.number))?;
            if let Some(next) = drawn {
                for action in &condition.actions {
                    self.perform(action, globals, response, rng)
                        .map_err(|e| e.at_line(line.number))?;
                }
                return Ok((next, condition.omit_learn));
            }
        }
        let conditions: Vec<&str> = line.conditions.iter().map(|c| c.source.as_str()).collect();
        Err(EvalError::eval(format!(
            "No condition in '{}' was met for response '{}'.",
            conditions.join(" | "),
            response.unwrap_or("None")
        ))
        .at_line(line.number))
    }

    fn intensities<R: Rng + ?Sized>(
        &self,
        stimulus: &[(String, Amount)],
        globals: &Variables,
        response: Option<&str>,
        rng: &mut R,
    ) -> EvalResult<Vec<(String, f64)>> {
        let context = self.context(globals, response, false);
        stimulus
            .iter()
            .map(|(element, amount)| {
                let intensity = amount.resolve(&context, rng)?;
                if intensity < 0.0 {
                    return Err(EvalError::eval(intensity_error(element)));
                }
                Ok((element.clone(), intensity))
            })
            .collect()
    }

    fn perform<R: Rng + ?Sized>(
        &mut self,
        action: &Action,
        globals: &Variables,
        response: Option<&str>,
        rng: &mut R,
    ) -> EvalResult<()> {
        match action {
            Action::Assign {
                name,
                expression,
                source,
            } => {
                let value = ExpressionEvaluator::new().evaluate(
                    expression,
                    source,
                    &self.context(globals, response, false),
                    rng,
                )?;
                self.locals.set(name, value);
            }
            Action::CountReset(event) => self.counter.reset(event),
        }
        Ok(())
    }
}
