//! # Mechanism Engine
//!
//! Learning rules of a simulated subject. Every [`Mechanism`] owns its value
//! tables and is reset to the configured start values for each subject.
//!
//! * [`kind`]: the closed set of mechanism variants and their capabilities
//! * [`support`]: softmax response selection shared by every variant with `v`
//! * [`rules`]: the update equation of each variant
//! * [`cognitive`]: transition predictions and path planning for `cm`
//!
//! A step is `learn` (using the previous stimulus, the previous response and
//! the current stimulus) followed by `respond` to the current stimulus:
//!
//! ```text
//! stimulus ──▶ intensities ──▶ rules::learn ──▶ respond ──▶ behavior
//!                  ▲                                  │
//!                  └──────── previous stimulus ◀──────┘
//! ```

pub mod cognitive;
pub mod kind;
pub mod rules;
pub mod support;

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::trace;

use crate::parameters::{Matrix, RunParameters};
use crate::script::CompileError;
use crate::world::PhaseSlot;

pub use cognitive::CognitiveMap;
pub use kind::MechanismKind;
pub use support::{probability_of_response, support_vector};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MechanismError {
    #[error("Parameter '{table}' has no value for '{key}'.")]
    MissingEntry { table: &'static str, key: String },
    #[error("Behavior '{behavior}' is not a possible response to '{stimulus}'.")]
    NotPossible { behavior: String, stimulus: String },
    #[error("No behavior is a possible response to '{0}'.")]
    NoFeasibleResponse(String),
    #[error("Used mechanism does not have variable '{0}'.")]
    MissingVariable(String),
    #[error("Unknown stimulus element '{0}'.")]
    UnknownElement(String),
    #[error("Unknown behavior '{0}'.")]
    UnknownBehavior(String),
}

/// Learning state of one subject.
#[derive(Debug, Clone)]
pub struct Mechanism {
    params: Arc<RunParameters>,
    v: Matrix,
    w: Vec<f64>,
    vss: Matrix,
    map: Option<CognitiveMap>,
    intensities: Vec<f64>,
    previous: Vec<f64>,
    has_previous: bool,
    response: Option<usize>,
}

impl Mechanism {
    pub fn new(params: Arc<RunParameters>) -> Self {
        let elements = params.elements.len();
        let map = (params.mechanism == MechanismKind::CognitiveMap)
            .then(|| CognitiveMap::new(elements, params.behaviors.len()));
        Self {
            v: params.start_v.clone(),
            w: params.start_w.clone(),
            vss: params.start_vss.clone(),
            map,
            intensities: vec![0.0; elements],
            previous: vec![0.0; elements],
            has_previous: false,
            response: None,
            params,
        }
    }

    /// Back to the start values; nothing of the previous subject survives.
    pub fn reset_for_subject(&mut self) {
        *self = Mechanism::new(Arc::clone(&self.params));
    }

    pub fn kind(&self) -> MechanismKind {
        self.params.mechanism
    }

    pub fn parameters(&self) -> &RunParameters {
        &self.params
    }

    pub fn v(&self) -> &Matrix {
        &self.v
    }

    pub fn w(&self) -> &[f64] {
        &self.w
    }

    pub fn vss(&self) -> &Matrix {
        &self.vss
    }

    pub fn cognitive_map(&self) -> Option<&CognitiveMap> {
        self.map.as_ref()
    }

    /// The response to the last stimulus, `None` before the first one and
    /// always for `rw`.
    pub fn response(&self) -> Option<usize> {
        self.response
    }

    fn uses_trace(&self) -> bool {
        self.params.trace > 0.0 && self.params.mechanism.supports_trace()
    }

    fn update_intensities(&mut self, stimulus: &[(usize, f64)]) {
        if self.uses_trace() {
            let trace = self.params.trace;
            self.intensities.iter_mut().for_each(|x| *x *= trace);
        } else {
            self.intensities.iter_mut().for_each(|x| *x = 0.0);
        }
        for &(e, intensity) in stimulus {
            if let Some(x) = self.intensities.get_mut(e) {
                *x = intensity;
            }
        }
    }

    fn active(intensities: &[f64]) -> Vec<(usize, f64)> {
        intensities
            .iter()
            .enumerate()
            .filter(|(_, x)| **x != 0.0)
            .map(|(e, x)| (e, *x))
            .collect()
    }

    /// Updates the value tables from the transition previous stimulus →
    /// `stimulus`. Nothing is learned on the first stimulus of a subject.
    pub fn learn(
        &mut self,
        stimulus: &[(usize, f64)],
        suppress: bool,
    ) -> Result<(), MechanismError> {
        self.update_intensities(stimulus);
        let kind = self.params.mechanism;
        let suppress = suppress && kind != MechanismKind::RescorlaWagner;

        if self.has_previous && !suppress {
            let previous = Self::active(&self.previous);
            let current: Vec<(usize, f64)> = stimulus
                .iter()
                .copied()
                .filter(|(_, x)| *x != 0.0)
                .collect();
            trace!(
                "{} learning {:?} -> {:?} (response {:?})",
                kind,
                previous,
                current,
                self.response
            );
            rules::learn(self, &previous, &current)?;
        }
        if let Some(map) = self.map.as_mut() {
            map.mark_seen(stimulus);
        }

        self.previous.clone_from(&self.intensities);
        self.has_previous = true;
        Ok(())
    }

    /// Draws the response to `stimulus`.
    pub fn respond<R: Rng + ?Sized>(
        &mut self,
        stimulus: &[(usize, f64)],
        rng: &mut R,
    ) -> Result<Option<usize>, MechanismError> {
        self.response = match self.params.mechanism {
            MechanismKind::RescorlaWagner => None,
            MechanismKind::CognitiveMap => {
                let present: Vec<usize> = stimulus.iter().map(|(e, _)| *e).collect();
                let planned = self
                    .map
                    .as_ref()
                    .and_then(|map| map.plan(&self.params, &present));
                match planned {
                    Some(behavior) => Some(behavior),
                    None => Some(self.softmax_response(stimulus, rng)?),
                }
            }
            _ => Some(self.softmax_response(stimulus, rng)?),
        };
        Ok(self.response)
    }

    fn softmax_response<R: Rng + ?Sized>(
        &self,
        stimulus: &[(usize, f64)],
        rng: &mut R,
    ) -> Result<usize, MechanismError> {
        let (support, feasible) = support_vector(&self.params, &self.v, stimulus)?;
        Ok(support::draw_response(&support, &feasible, rng))
    }

    pub fn learn_and_respond<R: Rng + ?Sized>(
        &mut self,
        stimulus: &[(usize, f64)],
        suppress: bool,
        rng: &mut R,
    ) -> Result<Option<usize>, MechanismError> {
        self.learn(stimulus, suppress)?;
        self.respond(stimulus, rng)
    }
}

/// Rejects phase sequences a mechanism cannot drive.
///
/// `rw` never responds, so neither stop conditions nor line guards may read
/// a behavior.
pub fn check_compatibility(kind: MechanismKind, slots: &[PhaseSlot]) -> Result<(), CompileError> {
    if kind.has_v() {
        return Ok(());
    }
    for slot in slots {
        let phase = &slot.phase;
        let (stop, line) = match &slot.stop {
            Some(stop) => (stop, slot.line),
            None => (&phase.stop, phase.number),
        };
        if stop.depends_on(&phase.behaviors) {
            return Err(CompileError::new(
                line,
                format!("Stop condition cannot depend on behavior in mechanism '{}'.", kind),
            ));
        }
    }
    for slot in slots {
        let phase = &slot.phase;
        if let Some(line) = phase
            .lines
            .iter()
            .find(|l| l.guards().any(|g| g.depends_on(&phase.behaviors)))
        {
            return Err(CompileError::new(
                line.number,
                format!("Phase line logic cannot depend on behavior in mechanism '{}'.", kind),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parameters::{ParameterEnv, Parameters};
    use crate::phase::tests::compile_phase;
    use crate::variables::Variables;
    use rand::{rngs::StdRng, SeedableRng};

    /// Elements `s1, s2`, behaviors `b1, b2`, then `extra` in order.
    pub(crate) fn run_parameters(extra: &[(&str, &str)]) -> RunParameters {
        let variables = Variables::new();
        let env = ParameterEnv {
            variables: &variables,
            phase_labels: &[],
            line_labels: &[],
        };
        let mut rng = StdRng::seed_from_u64(0);
        let mut params = Parameters::new();
        let settings = [("stimulus_elements", "s1, s2"), ("behaviors", "b1, b2")];
        for (name, text) in settings.iter().chain(extra) {
            params
                .set(name.parse().unwrap(), text, &env, &mut rng)
                .unwrap();
        }
        RunParameters::build(&params).unwrap()
    }

    #[test]
    fn test_first_step_does_not_learn() {
        let params = Arc::new(run_parameters(&[("mechanism", "sr"), ("u", "s2:1, default:0")]));
        let mut mechanism = Mechanism::new(params);
        let mut rng = StdRng::seed_from_u64(3);
        mechanism.learn_and_respond(&[(1, 1.0)], false, &mut rng).unwrap();
        assert_eq!(mechanism.v(), &mechanism.parameters().start_v);
        assert!(mechanism.response().is_some());
    }

    #[test]
    fn test_suppress_and_reset() {
        let params = Arc::new(run_parameters(&[
            ("mechanism", "sr"),
            ("u", "s2:1, default:0"),
            ("alpha_v", "0.5"),
        ]));
        let mut mechanism = Mechanism::new(params);
        let mut rng = StdRng::seed_from_u64(3);
        mechanism.learn_and_respond(&[(0, 1.0)], false, &mut rng).unwrap();
        mechanism.learn_and_respond(&[(1, 1.0)], true, &mut rng).unwrap();
        assert_eq!(mechanism.v(), &mechanism.parameters().start_v);

        mechanism.learn_and_respond(&[(1, 1.0)], false, &mut rng).unwrap();
        assert_ne!(mechanism.v(), &mechanism.parameters().start_v);
        mechanism.reset_for_subject();
        assert_eq!(mechanism.v(), &mechanism.parameters().start_v);
        assert_eq!(mechanism.response(), None);
    }

    #[test]
    fn test_rw_never_responds() {
        let params = Arc::new(run_parameters(&[("mechanism", "rw")]));
        let mut mechanism = Mechanism::new(params);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            mechanism.learn_and_respond(&[(0, 1.0)], false, &mut rng).unwrap(),
            None
        );
    }

    #[test]
    fn test_trace_decays_intensities() {
        let params = Arc::new(run_parameters(&[("mechanism", "sr"), ("trace", "0.5")]));
        let mut mechanism = Mechanism::new(params);
        mechanism.learn(&[(0, 1.0)], false).unwrap();
        mechanism.learn(&[(1, 1.0)], false).unwrap();
        assert_eq!(mechanism.intensities, vec![0.5, 1.0]);
        mechanism.learn(&[(1, 1.0)], false).unwrap();
        assert_eq!(mechanism.intensities, vec![0.25, 1.0]);
    }

    #[test]
    fn test_rw_rejects_behavior_dependent_phases() {
        let stop = compile_phase("A", Some("b=2"), None, &["L1 s | L1"]).unwrap();
        let slots = vec![PhaseSlot::new(Arc::new(stop), None, 0)];
        assert_eq!(
            check_compatibility(MechanismKind::RescorlaWagner, &slots)
                .unwrap_err()
                .to_string(),
            "Error on line 1: Stop condition cannot depend on behavior in mechanism 'rw'."
        );
        assert!(check_compatibility(MechanismKind::StimulusResponse, &slots).is_ok());

        let guard = compile_phase("A", Some("s=2"), None, &["L1 s | b: L1 | L1"]).unwrap();
        let slots = vec![PhaseSlot::new(Arc::new(guard), None, 0)];
        assert_eq!(
            check_compatibility(MechanismKind::RescorlaWagner, &slots)
                .unwrap_err()
                .to_string(),
            "Error on line 2: Phase line logic cannot depend on behavior in mechanism 'rw'."
        );
    }
}
