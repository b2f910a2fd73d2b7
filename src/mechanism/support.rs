use rand::Rng;

use super::MechanismError;
use crate::parameters::{Matrix, RunParameters};

/// Exponents above this are shifted down before `exp`.
const MAX_EXPONENT: f64 = 500.0;

/// Softmax support of every feasible behavior for a stimulus.
///
/// Returns the unnormalised support values together with the behavior ids
/// they belong to.
pub fn support_vector(
    params: &RunParameters,
    v: &Matrix,
    stimulus: &[(usize, f64)],
) -> Result<(Vec<f64>, Vec<usize>), MechanismError> {
    let present: Vec<usize> = stimulus.iter().map(|(e, _)| *e).collect();
    let feasible: Vec<usize> = (0..params.behaviors.len())
        .filter(|b| params.is_feasible(*b, &present))
        .collect();
    if feasible.is_empty() {
        return Err(MechanismError::NoFeasibleResponse(stimulus_name(
            params, stimulus,
        )));
    }

    let mut exponents = Vec::with_capacity(feasible.len());
    for &b in &feasible {
        let mut exponent = 0.0;
        for &(e, intensity) in stimulus {
            let beta = lookup(&params.beta, "beta", params, e, b)?;
            let value = lookup(v, "v", params, e, b)?;
            let mu = lookup(&params.mu, "mu", params, e, b)?;
            exponent += beta * value * intensity + mu;
        }
        exponents.push(exponent);
    }

    let max = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let shift = if max > MAX_EXPONENT { max } else { 0.0 };
    let support = exponents.into_iter().map(|x| (x - shift).exp()).collect();
    Ok((support, feasible))
}

/// Probability that `behavior` is the response to `stimulus`.
pub fn probability_of_response(
    params: &RunParameters,
    v: &Matrix,
    stimulus: &[(usize, f64)],
    behavior: usize,
) -> Result<f64, MechanismError> {
    let (support, feasible) = support_vector(params, v, stimulus)?;
    let index = feasible.iter().position(|b| *b == behavior).ok_or_else(|| {
        MechanismError::NotPossible {
            behavior: params.behaviors.name(behavior).to_string(),
            stimulus: stimulus_name(params, stimulus),
        }
    })?;
    Ok(support[index] / support.iter().sum::<f64>())
}

/// Cumulative draw over unnormalised weights.
pub fn draw_response<R: Rng + ?Sized>(support: &[f64], feasible: &[usize], rng: &mut R) -> usize {
    let total: f64 = support.iter().sum();
    let q = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (x, b) in support.iter().zip(feasible) {
        cumulative += x;
        if q <= cumulative {
            return *b;
        }
    }
    feasible.last().copied().unwrap_or_default()
}

pub(crate) fn lookup(
    table: &Matrix,
    name: &'static str,
    params: &RunParameters,
    row: usize,
    col: usize,
) -> Result<f64, MechanismError> {
    table.get(row, col).ok_or_else(|| MechanismError::MissingEntry {
        table: name,
        key: format!(
            "{}->{}",
            params.elements.names().get(row).map_or("?", |s| s.as_str()),
            params.behaviors.names().get(col).map_or("?", |s| s.as_str())
        ),
    })
}

/// Comma-separated element names.
pub fn stimulus_name(params: &RunParameters, stimulus: &[(usize, f64)]) -> String {
    stimulus
        .iter()
        .map(|(e, _)| params.elements.name(*e))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::tests::run_parameters;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_uniform_support() {
        let params = run_parameters(&[("mechanism", "sr")]);
        let (support, feasible) = support_vector(&params, &params.start_v, &[(0, 1.0)]).unwrap();
        assert_eq!(feasible, vec![0, 1]);
        assert_eq!(support, vec![1.0, 1.0]);
        let p = probability_of_response(&params, &params.start_v, &[(0, 1.0)], 1).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_large_exponents_are_shifted() {
        let params = run_parameters(&[("mechanism", "sr"), ("start_v", "s1->b1:1000, default:0")]);
        let (support, _) = support_vector(&params, &params.start_v, &[(0, 1.0)]).unwrap();
        assert!(support.iter().all(|x| x.is_finite()));
        assert_eq!(support[0], 1.0);
    }

    #[test]
    fn test_infeasible_behavior() {
        let params = run_parameters(&[("mechanism", "sr"), ("response_requirements", "b1:s1")]);
        let err = probability_of_response(&params, &params.start_v, &[(1, 1.0)], 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Behavior 'b1' is not a possible response to 's2'."
        );
    }

    #[test]
    fn test_draw_follows_weights() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut counts = [0usize; 2];
        for _ in 0..2000 {
            counts[draw_response(&[3.0, 1.0], &[0, 1], &mut rng)] += 1;
        }
        assert!(counts[0] > 1350 && counts[0] < 1650);
    }
}
