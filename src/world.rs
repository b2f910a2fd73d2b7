//! Phase sequence of a run, walked one stimulus at a time.

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::eval::EvalResult;
use crate::phase::{Guard, Phase, PhaseState};
use crate::variables::Variables;

/// A phase as placed in `@run`, with an optional stop condition override.
#[derive(Debug, Clone)]
pub struct PhaseSlot {
    pub phase: Arc<Phase>,
    pub stop: Option<Guard>,
    /// Line of the `@run` statement that placed the phase.
    pub line: usize,
}

impl PhaseSlot {
    pub fn new(phase: Arc<Phase>, stop: Option<Guard>, line: usize) -> Self {
        Self { phase, stop, line }
    }

    pub fn label(&self) -> &str {
        &self.phase.label
    }
}

/// A stimulus ready to be presented.
#[derive(Debug, Clone, PartialEq)]
pub struct Stimulus {
    pub stimulus: Vec<(String, f64)>,
    pub phase_label: String,
    pub line_label: String,
    pub help_lines_traversed: Vec<String>,
    pub suppress_learning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Stimulus(Stimulus),
    /// The current phase stopped and another one follows.
    PhaseAdvance,
    RunComplete,
}

/// One subject's position in the phase sequence.
#[derive(Debug, Clone)]
pub struct World {
    slots: Arc<Vec<PhaseSlot>>,
    current: usize,
    state: Option<PhaseState>,
}

impl World {
    pub fn new(slots: Arc<Vec<PhaseSlot>>) -> Self {
        Self {
            slots,
            current: 0,
            state: None,
        }
    }

    /// Back to the first line of the first phase.
    pub fn reset_for_subject(&mut self) {
        self.current = 0;
        self.state = None;
    }

    pub fn slots(&self) -> &[PhaseSlot] {
        &self.slots
    }

    pub fn phase_index(&self) -> usize {
        self.current
    }

    pub fn step<R: Rng + ?Sized>(
        &mut self,
        response: Option<&str>,
        globals: &Variables,
        rng: &mut R,
    ) -> EvalResult<StepResult> {
        let Some(slot) = self.slots.get(self.current) else {
            return Ok(StepResult::RunComplete);
        };
        let state = self
            .state
            .get_or_insert_with(|| PhaseState::new(Arc::clone(&slot.phase), slot.stop.clone()));

        match state.next_stimulus(response, globals, rng)? {
            Some(step) => Ok(StepResult::Stimulus(Stimulus {
                stimulus: step.stimulus,
                phase_label: slot.phase.label.clone(),
                line_label: step.line_label,
                help_lines_traversed: step.help_lines,
                suppress_learning: step.omit_learn,
            })),
            None => {
                debug!("phase '{}' finished", slot.phase.label);
                self.current += 1;
                self.state = None;
                if self.current < self.slots.len() {
                    Ok(StepResult::PhaseAdvance)
                } else {
                    Ok(StepResult::RunComplete)
                }
            }
        }
    }

    /// Steps until a stimulus is produced; `None` once every phase is done.
    ///
    /// A phase entered on the way starts without a previous response.
    pub fn next_stimulus<R: Rng + ?Sized>(
        &mut self,
        response: Option<&str>,
        globals: &Variables,
        rng: &mut R,
    ) -> EvalResult<Option<Stimulus>> {
        let mut response = response;
        loop {
            match self.step(response, globals, rng)? {
                StepResult::Stimulus(stimulus) => return Ok(Some(stimulus)),
                StepResult::PhaseAdvance => response = None,
                StepResult::RunComplete => return Ok(None),
            }
        }
    }
}
