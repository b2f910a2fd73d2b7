//! # Recorded Output
//!
//! What a run leaves behind for postprocessing: per subject, the
//! stimulus/response history and the time series of every tracked value.
//! [`ScriptOutput::vwpn_eval`] is the read-only entry point that turns a
//! recording into a series of `v`, `w`, `vss`, response probability `p` or
//! event count `n`.
//!
//! Value series are indexed by learning step. Index 0 is the start value;
//! index `k` is the value once the `k`-th stimulus has been presented, and
//! the last index (the number of presented stimuli) closes the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Error, InternalResult};
use crate::eval::EvalError;
use crate::mechanism::{probability_of_response, Mechanism, MechanismError};
use crate::parameters::{Parameters, RunParameters};
use crate::script::text::split_list;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum SubjectSelection {
    #[default]
    Average,
    All,
    /// Zero-based subject index.
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Subset,
    Exact,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum XScale {
    #[default]
    All,
    /// A history pattern such as `s->b`.
    Pattern(String),
    LineLabel(String),
}

/// Options read by [`RunOutput::vwpn_eval`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalOptions {
    pub subject: SubjectSelection,
    pub xscale: XScale,
    pub xscale_match: MatchMode,
    pub match_mode: MatchMode,
    /// `None` for all phases of the run.
    pub phases: Option<Vec<String>>,
    pub cumulative: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            subject: SubjectSelection::default(),
            xscale: XScale::default(),
            xscale_match: MatchMode::default(),
            match_mode: MatchMode::default(),
            phases: None,
            cumulative: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EvalKind {
    V,
    W,
    Vss,
    P,
    N,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Series {
    One(Vec<f64>),
    PerSubject(Vec<Vec<f64>>),
}

/// Piecewise-constant series: `values[i]` holds from `steps[i]` on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Val {
    values: Vec<f64>,
    steps: Vec<usize>,
}

impl Val {
    pub fn write(&mut self, value: f64, step: usize) {
        match self.steps.last() {
            Some(last) if *last == step => {
                if let Some(v) = self.values.last_mut() {
                    *v = value;
                }
            }
            _ => {
                self.values.push(value);
                self.steps.push(step);
            }
        }
    }

    pub fn evaluate(&self) -> Vec<f64> {
        let Some(&max_step) = self.steps.last() else {
            return Vec::new();
        };
        let mut out = vec![0.0; max_step + 1];
        for (i, (&start, &value)) in self.steps.iter().zip(&self.values).enumerate() {
            let stop = self.steps.get(i + 1).copied().unwrap_or(max_step + 1);
            out[start..stop].iter_mut().for_each(|x| *x = value);
        }
        out
    }
}

/// One history item: the elements of a stimulus, or a single behavior.
/// A missing response is an empty item.
pub type HistoryItem = Vec<String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutputSubject {
    pub v: BTreeMap<String, Val>,
    pub w: BTreeMap<String, Val>,
    pub vss: BTreeMap<String, Val>,
    /// Stimulus, response, stimulus, response, ...
    pub history: Vec<HistoryItem>,
    /// Each phase label with the index of its first stimulus.
    pub phase_first_steps: Vec<(String, usize)>,
    /// Phase line labels in visiting order (help lines included) with the
    /// index of the stimulus they lead to.
    pub line_labels: Vec<(String, usize)>,
}

fn pair_key(first: &str, second: &str) -> String {
    format!("{}->{}", first, second)
}

impl RunOutputSubject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of presented stimuli.
    pub fn n_steps(&self) -> usize {
        self.history.len() / 2
    }

    /// Snapshot of every tracked value.
    pub fn write_all(&mut self, mechanism: &Mechanism, step: usize) {
        let elements: Vec<usize> = (0..mechanism.parameters().elements.len()).collect();
        let behaviors: Vec<usize> = (0..mechanism.parameters().behaviors.len()).collect();
        for b in behaviors {
            self.write_values(mechanism, &elements, Some(b), step);
        }
        if mechanism.parameters().behaviors.is_empty() {
            self.write_values(mechanism, &elements, None, step);
        }
    }

    /// Snapshot of the values a learning step from `elements` after
    /// `response` can change.
    pub fn write_values(
        &mut self,
        mechanism: &Mechanism,
        elements: &[usize],
        response: Option<usize>,
        step: usize,
    ) {
        let params = mechanism.parameters();
        let kind = mechanism.kind();
        for &e in elements {
            let element = params.elements.name(e);
            if let (true, Some(b)) = (kind.has_v(), response) {
                if let Some(value) = mechanism.v().get(e, b) {
                    self.v
                        .entry(pair_key(element, params.behaviors.name(b)))
                        .or_default()
                        .write(value, step);
                }
            }
            if kind.has_w() {
                if let Some(value) = mechanism.w().get(e) {
                    self.w.entry(element.to_string()).or_default().write(*value, step);
                }
            }
            if kind.has_vss() {
                for s in 0..params.elements.len() {
                    if let Some(value) = mechanism.vss().get(e, s) {
                        self.vss
                            .entry(pair_key(element, params.elements.name(s)))
                            .or_default()
                            .write(value, step);
                    }
                }
            }
        }
    }

    pub fn write_history(&mut self, stimulus: &[(String, f64)], response: Option<&str>) {
        self.history.push(
            stimulus
                .iter()
                .filter(|(_, intensity)| *intensity != 0.0)
                .map(|(e, _)| e.clone())
                .collect(),
        );
        self.history.push(response.map(str::to_string).into_iter().collect());
    }

    pub fn write_phase(&mut self, phase_label: &str, step: usize) {
        if !self.phase_first_steps.iter().any(|(l, _)| l == phase_label) {
            self.phase_first_steps.push((phase_label.to_string(), step));
        }
    }

    pub fn write_line_labels(&mut self, help_lines: &[String], line_label: &str, step: usize) {
        for label in help_lines {
            self.line_labels.push((label.clone(), step));
        }
        self.line_labels.push((line_label.to_string(), step));
    }

    fn series(map: &BTreeMap<String, Val>, key: &str) -> InternalResult<Vec<f64>> {
        map.get(key)
            .map(Val::evaluate)
            .ok_or_else(|| Error::internal(format!("no recorded value for '{}'", key)))
    }

    /// Probability of `behavior` to `stimulus` at every learning step.
    fn p_series(
        &self,
        params: &RunParameters,
        stimulus: &[(usize, f64)],
        behavior: usize,
    ) -> InternalResult<Vec<f64>> {
        let mut columns = Vec::new();
        for &(e, _) in stimulus {
            for b in 0..params.behaviors.len() {
                let key = pair_key(params.elements.name(e), params.behaviors.name(b));
                columns.push((e, b, Self::series(&self.v, &key)?));
            }
        }
        let length = columns.iter().map(|(_, _, s)| s.len()).min().unwrap_or(0);
        let mut v = params.start_v.clone();
        let mut out = Vec::with_capacity(length);
        for i in 0..length {
            for (e, b, series) in &columns {
                v.set(*e, *b, series[i]);
            }
            out.push(probability_of_response(params, &v, stimulus, behavior)?);
        }
        Ok(out)
    }

    pub fn vwpn_eval(
        &self,
        kind: EvalKind,
        expr: &str,
        params: &RunParameters,
        options: &EvalOptions,
    ) -> InternalResult<Vec<f64>> {
        let values = match kind {
            EvalKind::N => None,
            EvalKind::V => {
                let (e, b) = split_pair(expr)?;
                element_id(params, e)?;
                behavior_id(params, b)?;
                Some(Self::series(&self.v, &pair_key(e, b))?)
            }
            EvalKind::W => {
                element_id(params, expr.trim())?;
                Some(Self::series(&self.w, expr.trim())?)
            }
            EvalKind::Vss => {
                let (e1, e2) = split_pair(expr)?;
                element_id(params, e1)?;
                element_id(params, e2)?;
                Some(Self::series(&self.vss, &pair_key(e1, e2))?)
            }
            EvalKind::P => {
                let (elements, b) = split_pair(expr)?;
                let stimulus = split_list(elements, ',')
                    .iter()
                    .map(|e| element_id(params, e).map(|id| (id, 1.0)))
                    .collect::<Result<Vec<_>, _>>()?;
                let behavior = behavior_id(params, b)?;
                Some(self.p_series(params, &stimulus, behavior)?)
            }
        };

        let filtered = self.phase_filter(values, options)?;
        match filtered.values {
            Some(values) => Ok(xscale_filter(
                values,
                &filtered.history,
                &filtered.line_labels,
                options,
            )),
            None => n_eval(expr, &filtered.history, options),
        }
    }

    fn phase_filter(&self, values: Option<Vec<f64>>, options: &EvalOptions) -> InternalResult<Filtered> {
        let unfiltered = || Filtered {
            values: values.clone(),
            history: self.history.clone(),
            line_labels: self.line_labels.clone(),
        };
        let Some(selected) = &options.phases else {
            return Ok(unfiltered());
        };
        let run_phases: Vec<&str> = self.phase_first_steps.iter().map(|(l, _)| l.as_str()).collect();
        if selected.iter().map(String::as_str).eq(run_phases.iter().copied()) {
            return Ok(unfiltered());
        }

        let mut ranges = Vec::with_capacity(selected.len());
        for label in selected {
            let index = run_phases.iter().position(|l| l == label).ok_or_else(|| {
                EvalError::eval(format!(
                    "Invalid phase label {}. Must be in [{}].",
                    label,
                    run_phases.join(", ")
                ))
            })?;
            let start = self.phase_first_steps[index].1;
            let end = self
                .phase_first_steps
                .get(index + 1)
                .map_or(self.n_steps(), |(_, s)| *s);
            ranges.push((start, end));
        }

        let mut out = Filtered {
            values: values.as_ref().map(|v| {
                let start = ranges.first().map_or(0, |(s, _)| *s);
                v.get(start).copied().into_iter().collect()
            }),
            history: Vec::new(),
            line_labels: Vec::new(),
        };
        let mut offset = 0;
        for &(start, end) in &ranges {
            if let (Some(out_values), Some(values)) = (out.values.as_mut(), values.as_ref()) {
                out_values.extend(values.iter().skip(start + 1).take(end - start));
            }
            out.history
                .extend(self.history.iter().skip(2 * start).take(2 * (end - start)).cloned());
            out.line_labels.extend(
                self.line_labels
                    .iter()
                    .filter(|(_, s)| (start..end).contains(s))
                    .map(|(l, s)| (l.clone(), s - start + offset)),
            );
            offset += end - start;
        }
        Ok(out)
    }
}

struct Filtered {
    values: Option<Vec<f64>>,
    history: Vec<HistoryItem>,
    line_labels: Vec<(String, usize)>,
}

fn split_pair(expr: &str) -> InternalResult<(&str, &str)> {
    expr.split_once("->")
        .map(|(a, b)| (a.trim(), b.trim()))
        .ok_or_else(|| EvalError::eval(format!("Expected 'x->y', got '{}'.", expr.trim())).into())
}

fn element_id(params: &RunParameters, name: &str) -> InternalResult<usize> {
    params
        .elements
        .id(name)
        .ok_or_else(|| MechanismError::UnknownElement(name.to_string()).into())
}

fn behavior_id(params: &RunParameters, name: &str) -> InternalResult<usize> {
    params
        .behaviors
        .id(name)
        .ok_or_else(|| MechanismError::UnknownBehavior(name.to_string()).into())
}

/// `s1,s2->b->s3` as a sequence of items.
fn parse_pattern(text: &str) -> Vec<HistoryItem> {
    text.split("->").map(|item| split_list(item, ',')).collect()
}

fn item_matches(item: &HistoryItem, pattern: &HistoryItem, mode: MatchMode) -> bool {
    match (pattern.len() > 1, item.len() > 1) {
        (true, true) => match mode {
            MatchMode::Exact => {
                pattern.len() == item.len() && pattern.iter().all(|p| item.contains(p))
            }
            MatchMode::Subset => pattern.iter().all(|p| item.contains(p)),
        },
        (true, false) => false,
        (false, true) => mode == MatchMode::Subset && pattern.iter().all(|p| item.contains(p)),
        (false, false) => item == pattern,
    }
}

/// 1 where `pattern` starts in `history`, 0 elsewhere.
fn find_pattern(history: &[HistoryItem], pattern: &[HistoryItem], mode: MatchMode) -> Vec<u32> {
    (0..history.len())
        .map(|i| {
            let matched = history.len() >= i + pattern.len()
                && history[i..i + pattern.len()]
                    .iter()
                    .zip(pattern)
                    .all(|(item, p)| item_matches(item, p, mode));
            u32::from(matched)
        })
        .collect()
}

fn cumulate(counts: impl IntoIterator<Item = u32>, cumulative: bool) -> Vec<f64> {
    let mut total = 0;
    std::iter::once(0.0)
        .chain(counts.into_iter().map(|c| {
            total += c;
            f64::from(if cumulative { total } else { c })
        }))
        .collect()
}

fn n_eval(expr: &str, history: &[HistoryItem], options: &EvalOptions) -> InternalResult<Vec<f64>> {
    let found = find_pattern(history, &parse_pattern(expr), options.match_mode);
    match &options.xscale {
        XScale::All => Ok(cumulate(found, options.cumulative)),
        XScale::LineLabel(_) => Err(EvalError::eval(
            "xscale cannot be a phase line label in @nplot/@nexport.",
        )
        .into()),
        XScale::Pattern(interval) => {
            let marks = find_pattern(history, &parse_pattern(interval), options.xscale_match);
            let mut counts = Vec::new();
            let mut count = 0;
            for (hit, mark) in found.into_iter().zip(marks) {
                count += hit;
                if mark == 1 {
                    counts.push(count);
                    count = 0;
                }
            }
            Ok(cumulate(counts, options.cumulative))
        }
    }
}

fn xscale_filter(
    values: Vec<f64>,
    history: &[HistoryItem],
    line_labels: &[(String, usize)],
    options: &EvalOptions,
) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return values;
    };
    let mut out = vec![first];
    match &options.xscale {
        XScale::All => return values,
        XScale::LineLabel(label) => {
            for (i, (l, step)) in line_labels.iter().enumerate() {
                if i >= 1 && l == label {
                    out.extend(values.get(*step));
                }
            }
        }
        XScale::Pattern(pattern) => {
            let pattern = parse_pattern(pattern);
            let found = find_pattern(history, &pattern, options.xscale_match);
            for (h, hit) in found.into_iter().enumerate() {
                if hit == 1 && h >= 2 {
                    out.extend(values.get((h + pattern.len() - 1) / 2));
                }
            }
        }
    }
    out
}

/// Mean over subjects, point by point; shorter series stop contributing
/// where they end.
fn average(series: &[Vec<f64>]) -> Vec<f64> {
    let length = series.iter().map(Vec::len).max().unwrap_or(0);
    (0..length)
        .map(|i| {
            let points: Vec<f64> = series.iter().filter_map(|s| s.get(i).copied()).collect();
            points.iter().sum::<f64>() / points.len() as f64
        })
        .collect()
}

/// All subjects of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub label: String,
    #[serde(skip)]
    pub parameters: Arc<RunParameters>,
    pub subjects: Vec<RunOutputSubject>,
}

impl RunOutput {
    pub fn vwpn_eval(&self, kind: EvalKind, expr: &str, options: &EvalOptions) -> InternalResult<Series> {
        let mechanism = self.parameters.mechanism;
        let missing = match kind {
            EvalKind::V | EvalKind::P if !mechanism.has_v() => Some("v"),
            EvalKind::W if !mechanism.has_w() => Some("w"),
            EvalKind::Vss if !mechanism.has_vss() => Some("vss"),
            _ => None,
        };
        if let Some(name) = missing {
            return Err(MechanismError::MissingVariable(name.to_string()).into());
        }

        let eval = |subject: &RunOutputSubject| {
            subject.vwpn_eval(kind, expr, &self.parameters, options)
        };
        match options.subject {
            SubjectSelection::Index(i) => {
                let subject = self.subjects.get(i).ok_or_else(|| {
                    EvalError::eval(format!(
                        "The value ({}) for the parameter 'subject' exceeds the number of subjects ({}).",
                        i + 1,
                        self.subjects.len()
                    ))
                })?;
                Ok(Series::One(eval(subject)?))
            }
            SubjectSelection::Average => {
                let all = self.subjects.iter().map(eval).collect::<InternalResult<Vec<_>>>()?;
                Ok(Series::One(average(&all)))
            }
            SubjectSelection::All => Ok(Series::PerSubject(
                self.subjects.iter().map(eval).collect::<InternalResult<Vec<_>>>()?,
            )),
        }
    }
}

/// Output of every run of a script, in declaration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptOutput {
    pub runs: Vec<RunOutput>,
}

impl ScriptOutput {
    pub fn get(&self, label: &str) -> Option<&RunOutput> {
        self.runs.iter().find(|r| r.label == label)
    }

    /// Evaluates against the run named by `runlabel`; the last run when
    /// `runlabel` is unset.
    pub fn vwpn_eval(&self, kind: EvalKind, expr: &str, parameters: &Parameters) -> InternalResult<Series> {
        let label = parameters.runlabel();
        let run = if label.is_empty() {
            self.runs.last()
        } else {
            self.get(label)
        };
        let run = run.ok_or_else(|| EvalError::eval(format!("Unknown run label '{}'.", label)))?;
        run.vwpn_eval(kind, expr, parameters.eval_options())
    }
}
