use super::{Alphabet, Matrix, ParameterError, ParameterName, Parameters, TableKind};
use crate::mechanism::MechanismKind;

/// Validated parameters of one run, indexed by element and behavior ids.
///
/// Built once when `@run` is compiled; later parameter lines do not affect
/// it.
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub mechanism: MechanismKind,
    pub elements: Alphabet,
    pub behaviors: Alphabet,
    /// element × behavior
    pub start_v: Matrix,
    pub alpha_v: Matrix,
    pub beta: Matrix,
    pub mu: Matrix,
    /// per element
    pub start_w: Vec<f64>,
    pub alpha_w: Vec<f64>,
    pub u: Vec<f64>,
    pub lambda: Vec<f64>,
    /// element × element
    pub start_vss: Matrix,
    pub alpha_vss: Matrix,
    pub behavior_cost: Vec<f64>,
    pub discount: f64,
    pub trace: f64,
    /// For each behavior, the elements of which one must be present for the
    /// behavior to be possible; `None` when unrestricted.
    pub requirements: Vec<Option<Vec<usize>>>,
    pub bind_trials: bool,
    pub n_subjects: usize,
}

impl RunParameters {
    pub fn build(params: &Parameters) -> Result<Self, ParameterError> {
        let mechanism = params
            .mechanism()
            .ok_or_else(|| ParameterError::new("Parameter 'mechanism' is not specified."))?;
        if params.stimulus_elements().is_empty() {
            return Err(ParameterError::new(
                "Parameter 'stimulus_elements' is not specified.",
            ));
        }
        if mechanism.has_v() && params.behaviors().is_empty() {
            return Err(ParameterError::new("Parameter 'behaviors' is not specified."));
        }

        let elements = Alphabet::new(params.stimulus_elements().to_vec());
        let behaviors = Alphabet::new(params.behaviors().to_vec());

        let eb = |name: ParameterName| {
            params.table(name).to_matrix(
                name.as_ref(),
                TableKind::ElementBehavior,
                &elements,
                &behaviors,
            )
        };
        let ee = |name: ParameterName| {
            params.table(name).to_matrix(
                name.as_ref(),
                TableKind::ElementElement,
                &elements,
                &elements,
            )
        };
        let e = |name: ParameterName| {
            params
                .table(name)
                .to_vector(name.as_ref(), TableKind::Element, &elements)
        };

        let requirements = behaviors
            .names()
            .iter()
            .map(|b| {
                params
                    .response_requirements()
                    .get(b)
                    .map(|required| required.iter().filter_map(|e| elements.id(e)).collect())
            })
            .collect();

        Ok(Self {
            mechanism,
            start_v: eb(ParameterName::StartV)?,
            alpha_v: eb(ParameterName::AlphaV)?,
            beta: eb(ParameterName::Beta)?,
            mu: eb(ParameterName::Mu)?,
            start_w: e(ParameterName::StartW)?,
            alpha_w: e(ParameterName::AlphaW)?,
            u: e(ParameterName::U)?,
            lambda: e(ParameterName::Lambda)?,
            start_vss: ee(ParameterName::StartVss)?,
            alpha_vss: ee(ParameterName::AlphaVss)?,
            behavior_cost: params.table(ParameterName::BehaviorCost).to_vector(
                ParameterName::BehaviorCost.as_ref(),
                TableKind::Behavior,
                &behaviors,
            )?,
            discount: params.discount(),
            trace: params.trace(),
            requirements,
            bind_trials: params.bind_trials(),
            n_subjects: params.n_subjects(),
            elements,
            behaviors,
        })
    }

    /// Whether `behavior` may be the response to a stimulus with the given
    /// elements present.
    pub fn is_feasible(&self, behavior: usize, present: &[usize]) -> bool {
        match self.requirements.get(behavior) {
            Some(Some(required)) => required.iter().any(|e| present.contains(e)),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterEnv;
    use crate::variables::Variables;
    use rand::{rngs::StdRng, SeedableRng};

    fn parameters(lines: &[(&str, &str)]) -> Parameters {
        let variables = Variables::new();
        let env = ParameterEnv {
            variables: &variables,
            phase_labels: &[],
            line_labels: &[],
        };
        let mut rng = StdRng::seed_from_u64(0);
        let mut params = Parameters::new();
        for (name, text) in lines {
            params
                .set(name.parse().unwrap(), text, &env, &mut rng)
                .unwrap();
        }
        params
    }

    #[test]
    fn test_build() {
        let params = parameters(&[
            ("mechanism", "sr"),
            ("stimulus_elements", "s1, s2"),
            ("behaviors", "b1, b2"),
            ("start_v", "s1->b2: 3, default: 1"),
            ("u", "s2: 10, default: 0"),
            ("response_requirements", "b1: s1"),
        ]);
        let run = RunParameters::build(&params).unwrap();
        assert_eq!(run.start_v.get(0, 1), Some(3.0));
        assert_eq!(run.start_v.get(1, 0), Some(1.0));
        assert_eq!(run.u, vec![0.0, 10.0]);
        assert_eq!(run.alpha_v.get(1, 1), Some(1.0));
        assert!(run.is_feasible(0, &[0]));
        assert!(!run.is_feasible(0, &[1]));
        assert!(run.is_feasible(1, &[1]));
    }

    #[test]
    fn test_mechanism_required() {
        let params = parameters(&[("stimulus_elements", "s"), ("behaviors", "b")]);
        assert_eq!(
            RunParameters::build(&params).unwrap_err().to_string(),
            "Parameter 'mechanism' is not specified."
        );
    }

    #[test]
    fn test_alphabet_changed_after_table() {
        let params = parameters(&[
            ("mechanism", "sr"),
            ("stimulus_elements", "s1"),
            ("behaviors", "b1"),
            ("u", "s1: 1"),
            ("stimulus_elements", "s1, s2"),
        ]);
        assert_eq!(
            RunParameters::build(&params).unwrap_err().to_string(),
            "The parameter 'u' does not match 'stimulus_elements'."
        );
    }
}
