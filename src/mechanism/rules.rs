//! Update equations.
//!
//! `previous` holds `(element, intensity)` for every element with non-zero
//! intensity before the transition; with trace this includes the decayed
//! elements of earlier steps. `current` is the presented stimulus only, so
//! rewards and future values are never taken from the past.

use std::sync::Arc;

use super::support::{lookup, probability_of_response, support_vector};
use super::{Mechanism, MechanismError, MechanismKind};
use crate::parameters::{Matrix, RunParameters};

type Stimulus<'a> = &'a [(usize, f64)];

pub(super) fn learn(
    mechanism: &mut Mechanism,
    previous: Stimulus,
    current: Stimulus,
) -> Result<(), MechanismError> {
    let params = Arc::clone(&mechanism.params);
    if params.mechanism == MechanismKind::RescorlaWagner {
        return rescorla_wagner(&params, &mut mechanism.vss, previous, current);
    }
    let Some(response) = mechanism.response else {
        return Ok(());
    };

    match params.mechanism {
        MechanismKind::StimulusResponse => {
            update_v(&params, &mut mechanism.v, previous, current, response, 0.0)
        }
        MechanismKind::ExpectedSarsa => {
            let future = params.discount * expected_value(&params, &mechanism.v, current)?;
            update_v(&params, &mut mechanism.v, previous, current, response, future)
        }
        MechanismKind::QLearning => {
            let future = params.discount * max_value(&params, &mechanism.v, current)?;
            update_v(&params, &mut mechanism.v, previous, current, response, future)
        }
        MechanismKind::ActorCritic => actor_critic(mechanism, &params, previous, current, response),
        MechanismKind::Enquist => enquist(mechanism, &params, previous, current, response),
        MechanismKind::CognitiveMap => {
            update_v(&params, &mut mechanism.v, previous, current, response, 0.0)?;
            if let Some(map) = mechanism.map.as_mut() {
                let from: Vec<usize> = previous.iter().map(|(e, _)| *e).collect();
                let to: Vec<usize> = current.iter().map(|(e, _)| *e).collect();
                map.learn(&from, response, &to, &params.alpha_w);
            }
            Ok(())
        }
        MechanismKind::RescorlaWagner => Ok(()),
    }
}

fn element_value(
    values: &[f64],
    table: &'static str,
    params: &RunParameters,
    e: usize,
) -> Result<f64, MechanismError> {
    values
        .get(e)
        .copied()
        .ok_or_else(|| MechanismError::MissingEntry {
            table,
            key: params.elements.names().get(e).cloned().unwrap_or_default(),
        })
}

fn cost(params: &RunParameters, response: usize) -> Result<f64, MechanismError> {
    params
        .behavior_cost
        .get(response)
        .copied()
        .ok_or_else(|| MechanismError::MissingEntry {
            table: "behavior_cost",
            key: params.behaviors.names().get(response).cloned().unwrap_or_default(),
        })
}

/// Σ u·I over the current stimulus.
fn u_sum(params: &RunParameters, current: Stimulus) -> Result<f64, MechanismError> {
    current.iter().try_fold(0.0, |sum, &(e, i)| -> Result<f64, MechanismError> {
        Ok(sum + element_value(&params.u, "u", params, e)? * i)
    })
}

fn w_sum(params: &RunParameters, w: &[f64], stimulus: Stimulus) -> Result<f64, MechanismError> {
    stimulus.iter().try_fold(0.0, |sum, &(e, i)| -> Result<f64, MechanismError> {
        Ok(sum + element_value(w, "w", params, e)? * i)
    })
}

fn v_sum(
    params: &RunParameters,
    v: &Matrix,
    stimulus: Stimulus,
    response: usize,
) -> Result<f64, MechanismError> {
    stimulus.iter().try_fold(0.0, |sum, &(e, i)| -> Result<f64, MechanismError> {
        Ok(sum + lookup(v, "v", params, e, response)? * i)
    })
}

/// Delta rule on `v[e, response]` for the previous elements with target
/// `Σu − c + future`.
fn update_v(
    params: &RunParameters,
    v: &mut Matrix,
    previous: Stimulus,
    current: Stimulus,
    response: usize,
    future: f64,
) -> Result<(), MechanismError> {
    let delta = u_sum(params, current)? + future
        - cost(params, response)?
        - v_sum(params, v, previous, response)?;
    for &(e, intensity) in previous {
        let alpha = lookup(&params.alpha_v, "alpha_v", params, e, response)?;
        if let Some(value) = v.get_mut(e, response) {
            *value += alpha * delta * intensity;
        }
    }
    Ok(())
}

/// Σ over current elements of the expected `v` under the softmax response
/// to that element alone.
fn expected_value(params: &RunParameters, v: &Matrix, current: Stimulus) -> Result<f64, MechanismError> {
    let mut total = 0.0;
    for &(e, intensity) in current {
        let (support, feasible) = support_vector(params, v, &[(e, 1.0)])?;
        let sum: f64 = support.iter().sum();
        let mut expected = 0.0;
        for (x, &b) in support.iter().zip(&feasible) {
            expected += x / sum * lookup(v, "v", params, e, b)?;
        }
        total += expected * intensity;
    }
    Ok(total)
}

/// Largest Σ_b v[e, b]·I over current elements, feasible behaviors only.
fn max_value(params: &RunParameters, v: &Matrix, current: Stimulus) -> Result<f64, MechanismError> {
    let mut best: Option<f64> = None;
    for &(e, intensity) in current {
        let mut sum = 0.0;
        for b in (0..params.behaviors.len()).filter(|b| params.is_feasible(*b, &[e])) {
            sum += lookup(v, "v", params, e, b)? * intensity;
        }
        best = Some(best.map_or(sum, |x: f64| x.max(sum)));
    }
    Ok(best.unwrap_or(0.0))
}

fn actor_critic(
    mechanism: &mut Mechanism,
    params: &RunParameters,
    previous: Stimulus,
    current: Stimulus,
    response: usize,
) -> Result<(), MechanismError> {
    let delta = u_sum(params, current)? + params.discount * w_sum(params, &mechanism.w, current)?
        - cost(params, response)?
        - w_sum(params, &mechanism.w, previous)?;
    let p = probability_of_response(params, &mechanism.v, previous, response)?;

    for &(e, intensity) in previous {
        let alpha = lookup(&params.alpha_v, "alpha_v", params, e, response)?;
        let beta = lookup(&params.beta, "beta", params, e, response)?;
        if let Some(value) = mechanism.v.get_mut(e, response) {
            *value += alpha * delta * beta * (1.0 - p) * intensity;
        }
    }
    for &(e, intensity) in previous {
        let alpha = element_value(&params.alpha_w, "alpha_w", params, e)?;
        if let Some(value) = mechanism.w.get_mut(e) {
            *value += alpha * delta * intensity;
        }
    }
    Ok(())
}

fn enquist(
    mechanism: &mut Mechanism,
    params: &RunParameters,
    previous: Stimulus,
    current: Stimulus,
    response: usize,
) -> Result<(), MechanismError> {
    let target = u_sum(params, current)? + params.discount * w_sum(params, &mechanism.w, current)?
        - cost(params, response)?;
    let v_delta = target - v_sum(params, &mechanism.v, previous, response)?;
    let w_delta = target - w_sum(params, &mechanism.w, previous)?;

    for &(e, intensity) in previous {
        let alpha = lookup(&params.alpha_v, "alpha_v", params, e, response)?;
        if let Some(value) = mechanism.v.get_mut(e, response) {
            *value += alpha * v_delta * intensity;
        }
    }
    for &(e, intensity) in previous {
        let alpha = element_value(&params.alpha_w, "alpha_w", params, e)?;
        if let Some(value) = mechanism.w.get_mut(e) {
            *value += alpha * w_delta * intensity;
        }
    }
    Ok(())
}

/// `vss[p, s]` moves towards `λ[s]` for presented `s` and decays otherwise.
fn rescorla_wagner(
    params: &RunParameters,
    vss: &mut Matrix,
    previous: Stimulus,
    current: Stimulus,
) -> Result<(), MechanismError> {
    let elements = params.elements.len();
    for &(p, _) in previous {
        for s in 0..elements {
            let alpha = lookup_pair(&params.alpha_vss, "alpha_vss", params, p, s)?;
            let target = match current.iter().find(|(e, _)| *e == s) {
                Some(&(_, intensity)) => element_value(&params.lambda, "lambda", params, s)? * intensity,
                None => 0.0,
            };
            if let Some(value) = vss.get_mut(p, s) {
                *value += alpha * (target - *value);
            }
        }
    }
    Ok(())
}

fn lookup_pair(
    table: &Matrix,
    name: &'static str,
    params: &RunParameters,
    first: usize,
    second: usize,
) -> Result<f64, MechanismError> {
    table.get(first, second).ok_or_else(|| MechanismError::MissingEntry {
        table: name,
        key: format!(
            "{}->{}",
            params.elements.names().get(first).map_or("?", |s| s.as_str()),
            params.elements.names().get(second).map_or("?", |s| s.as_str())
        ),
    })
}
