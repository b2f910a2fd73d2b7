//! # Parameters
//!
//! The named configuration a script builds up line by line: alphabets,
//! mechanism choice, learning-rate and start-value tables, and the options
//! read by [`crate::output::vwpn_eval`].
//!
//! * [`Parameters`]: the mutable store the script compiler writes to
//! * [`table`]: parsing of `key:value, default:value` tables
//! * [`RunParameters`]: the validated, indexed snapshot a run owns
//!
//! A table parameter may be given as one scalar, which is expanded to every
//! key when a run is declared, or as a map which must then cover exactly the
//! expected key set.

pub mod alphabet;
pub mod resolved;
pub mod table;

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use crate::mechanism::MechanismKind;
use crate::output::{EvalOptions, MatchMode, SubjectSelection, XScale};
use crate::script::text::{split_key_value, split_list};
use crate::tokenizer::token::is_identifier;
use crate::variables::Variables;

pub use alphabet::{Alphabet, Matrix};
pub use resolved::RunParameters;
pub use table::{TableKey, TableKind, TableValue};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ParameterError(pub String);

impl ParameterError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        ParameterError(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ParameterName {
    Behaviors,
    StimulusElements,
    Mechanism,
    StartV,
    AlphaV,
    StartW,
    AlphaW,
    StartVss,
    AlphaVss,
    Beta,
    Mu,
    U,
    Lambda,
    BehaviorCost,
    Discount,
    Trace,
    ResponseRequirements,
    BindTrials,
    #[strum(serialize = "n_subjects")]
    NSubjects,
    RandomSeed,
    Title,
    Subplottitle,
    Runlabel,
    Subject,
    Xscale,
    XscaleMatch,
    Phases,
    Cumulative,
    Match,
    Filename,
}

impl ParameterName {
    pub fn table_kind(&self) -> Option<TableKind> {
        match self {
            ParameterName::StartV
            | ParameterName::AlphaV
            | ParameterName::Beta
            | ParameterName::Mu => Some(TableKind::ElementBehavior),
            ParameterName::StartW
            | ParameterName::AlphaW
            | ParameterName::U
            | ParameterName::Lambda => Some(TableKind::Element),
            ParameterName::StartVss | ParameterName::AlphaVss => Some(TableKind::ElementElement),
            ParameterName::BehaviorCost => Some(TableKind::Behavior),
            _ => None,
        }
    }

    fn default_table_value(&self) -> f64 {
        match self {
            ParameterName::AlphaV
            | ParameterName::AlphaW
            | ParameterName::AlphaVss
            | ParameterName::Beta => 1.0,
            _ => 0.0,
        }
    }
}

/// What the script knows when a parameter line is compiled.
pub struct ParameterEnv<'a> {
    pub variables: &'a Variables,
    pub phase_labels: &'a [String],
    pub line_labels: &'a [String],
}

/// Parameter values in effect at a point of the script.
#[derive(Debug, Clone)]
pub struct Parameters {
    behaviors: Vec<String>,
    stimulus_elements: Vec<String>,
    mechanism: Option<MechanismKind>,
    tables: HashMap<ParameterName, TableValue>,
    discount: f64,
    trace: f64,
    response_requirements: BTreeMap<String, Vec<String>>,
    bind_trials: bool,
    n_subjects: usize,
    random_seed: Option<u64>,
    title: String,
    subplottitle: String,
    runlabel: String,
    filename: String,
    eval_options: EvalOptions,
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            behaviors: Vec::new(),
            stimulus_elements: Vec::new(),
            mechanism: None,
            tables: HashMap::new(),
            discount: 1.0,
            trace: 0.0,
            response_requirements: BTreeMap::new(),
            bind_trials: false,
            n_subjects: 1,
            random_seed: None,
            title: String::new(),
            subplottitle: String::new(),
            runlabel: String::new(),
            filename: String::new(),
            eval_options: EvalOptions::default(),
        }
    }

    pub fn behaviors(&self) -> &[String] {
        &self.behaviors
    }

    pub fn stimulus_elements(&self) -> &[String] {
        &self.stimulus_elements
    }

    pub fn mechanism(&self) -> Option<MechanismKind> {
        self.mechanism
    }

    pub fn bind_trials(&self) -> bool {
        self.bind_trials
    }

    pub fn n_subjects(&self) -> usize {
        self.n_subjects
    }

    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }

    pub fn runlabel(&self) -> &str {
        &self.runlabel
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subplottitle(&self) -> &str {
        &self.subplottitle
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn eval_options(&self) -> &EvalOptions {
        &self.eval_options
    }

    /// Value of a table parameter, scalar default if never set.
    pub fn table(&self, name: ParameterName) -> TableValue {
        self.tables
            .get(&name)
            .cloned()
            .unwrap_or_else(|| TableValue::Scalar(name.default_table_value()))
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    pub fn trace(&self) -> f64 {
        self.trace
    }

    pub fn response_requirements(&self) -> &BTreeMap<String, Vec<String>> {
        &self.response_requirements
    }

    /// Parses `text` as the value of `name`.
    pub fn set<R: Rng + ?Sized>(
        &mut self,
        name: ParameterName,
        text: &str,
        env: &ParameterEnv,
        rng: &mut R,
    ) -> Result<(), ParameterError> {
        let text = text.trim();
        let text = text.strip_suffix(',').unwrap_or(text).trim();
        if text.is_empty() {
            return Err(ParameterError::new(format!(
                "Parameter '{}' has no value.",
                name
            )));
        }

        if let Some(kind) = name.table_kind() {
            let value = table::parse_table(
                name.as_ref(),
                kind,
                text,
                &self.stimulus_elements,
                &self.behaviors,
                |source| {
                    env.variables
                        .evaluate_number(source, rng)
                        .map_err(|e| e.to_string())
                },
            )?;
            self.tables.insert(name, value);
            return Ok(());
        }

        match name {
            ParameterName::Behaviors => {
                self.behaviors = self.parse_names(text, "behavior", env)?;
            }
            ParameterName::StimulusElements => {
                self.stimulus_elements = self.parse_names(text, "stimulus element", env)?;
            }
            ParameterName::Mechanism => {
                self.mechanism = Some(MechanismKind::parse(text).map_err(ParameterError::new)?);
            }
            ParameterName::Discount => {
                self.discount = Self::number(name, text, env, rng)?;
            }
            ParameterName::Trace => {
                let trace = Self::number(name, text, env, rng)?;
                if !(0.0..1.0).contains(&trace) {
                    return Err(ParameterError::new(
                        "Parameter trace must be a number >=0 and <1.",
                    ));
                }
                self.trace = trace;
            }
            ParameterName::ResponseRequirements => {
                self.response_requirements = self.parse_response_requirements(text)?;
            }
            ParameterName::BindTrials => self.bind_trials = Self::on_off(name, text)?,
            ParameterName::Cumulative => self.eval_options.cumulative = Self::on_off(name, text)?,
            ParameterName::NSubjects => {
                self.n_subjects = Self::positive_integer(text, env, rng).ok_or_else(|| {
                    ParameterError::new("Parameter n_subjects must be a positive integer.")
                })?;
            }
            ParameterName::RandomSeed => {
                if self.random_seed.is_some() {
                    return Err(ParameterError::new(
                        "The parameter 'random_seed' can only be set once.",
                    ));
                }
                let seed = env
                    .variables
                    .evaluate_number(text, rng)
                    .ok()
                    .filter(|x| x.fract() == 0.0 && *x >= 0.0)
                    .ok_or_else(|| {
                        ParameterError::new("Parameter random_seed must be a non-negative integer.")
                    })?;
                self.random_seed = Some(seed as u64);
            }
            ParameterName::Title => self.title = text.to_string(),
            ParameterName::Subplottitle => self.subplottitle = text.to_string(),
            ParameterName::Runlabel => self.runlabel = text.to_string(),
            ParameterName::Filename => self.filename = text.to_string(),
            ParameterName::Subject => {
                self.eval_options.subject = match text.to_lowercase().as_str() {
                    "average" => SubjectSelection::Average,
                    "all" => SubjectSelection::All,
                    _ => {
                        let index = Self::positive_integer(text, env, rng).ok_or_else(|| {
                            ParameterError::new(
                                "Parameter subject must be 'average', 'all', or a positive integer.",
                            )
                        })?;
                        SubjectSelection::Index(index - 1)
                    }
                };
            }
            ParameterName::Xscale => self.eval_options.xscale = self.parse_xscale(text, env)?,
            ParameterName::XscaleMatch => {
                self.eval_options.xscale_match = Self::match_mode(name, text)?
            }
            ParameterName::Match => self.eval_options.match_mode = Self::match_mode(name, text)?,
            ParameterName::Phases => {
                self.eval_options.phases = if text == "all" {
                    None
                } else {
                    let labels = split_list(text, ',');
                    for label in &labels {
                        if !env.phase_labels.contains(label) {
                            return Err(ParameterError::new(format!(
                                "Undefined phase label '{}'.",
                                label
                            )));
                        }
                    }
                    Some(labels)
                };
            }
            _ => {
                return Err(ParameterError::new(format!(
                    "Internal error: Invalid parameter name '{}'.",
                    name
                )))
            }
        }
        Ok(())
    }

    fn parse_names(
        &self,
        text: &str,
        what: &str,
        env: &ParameterEnv,
    ) -> Result<Vec<String>, ParameterError> {
        let (other, other_what) = if what == "behavior" {
            (&self.stimulus_elements, "a stimulus element")
        } else {
            (&self.behaviors, "a behavior name")
        };
        let mut names: Vec<String> = Vec::new();
        for name in split_list(text, ',') {
            if name.is_empty() {
                return Err(ParameterError::new(format!("Found empty {} name.", what)));
            }
            if names.contains(&name) {
                return Err(ParameterError::new(format!(
                    "The {} name '{}' occurs more than once.",
                    what, name
                )));
            }
            if other.contains(&name) {
                return Err(ParameterError::new(format!(
                    "The {} name '{}' is invalid, since it is {}.",
                    what, name, other_what
                )));
            }
            if env.variables.contains(&name) {
                return Err(ParameterError::new(format!(
                    "The {} name '{}' is invalid, since it is a variable name.",
                    what, name
                )));
            }
            if !is_identifier(&name) {
                return Err(ParameterError::new(format!(
                    "The {} name '{}' is not a valid identifier.",
                    what, name
                )));
            }
            names.push(name);
        }
        Ok(names)
    }

    fn parse_response_requirements(
        &self,
        text: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, ParameterError> {
        if self.stimulus_elements.is_empty() {
            return Err(ParameterError::new(
                "The parameter 'stimulus_elements' must be assigned before the parameter 'response_requirements'.",
            ));
        }
        if self.behaviors.is_empty() {
            return Err(ParameterError::new(
                "The parameter 'behaviors' must be assigned before the parameter 'response_requirements'.",
            ));
        }

        let mut requirements = BTreeMap::new();
        for item in split_list(text, ',') {
            let (behavior, required) = split_key_value(&item).ok_or_else(|| {
                ParameterError::new(format!(
                    "Expected 'behavior:stimulus_element', got '{}'.",
                    item
                ))
            })?;
            if !self.behaviors.iter().any(|b| b == behavior) {
                return Err(ParameterError::new(format!(
                    "Unknown behavior name '{}'.",
                    behavior
                )));
            }
            if requirements.contains_key(behavior) {
                return Err(ParameterError::new(format!(
                    "Duplication of behavior '{}' in response_requirements.",
                    behavior
                )));
            }
            let elements = match required
                .strip_prefix('[')
                .and_then(|inner| inner.strip_suffix(']'))
            {
                Some(inner) => split_list(inner, ','),
                None => vec![required.to_string()],
            };
            for element in &elements {
                if !self.stimulus_elements.contains(element) {
                    return Err(ParameterError::new(format!(
                        "Unknown stimulus element '{}'.",
                        element
                    )));
                }
            }
            requirements.insert(behavior.to_string(), elements);
        }
        Ok(requirements)
    }

    fn parse_xscale(&self, text: &str, env: &ParameterEnv) -> Result<XScale, ParameterError> {
        if text == "all" {
            return Ok(XScale::All);
        }
        let known = |name: &str| {
            self.stimulus_elements.iter().any(|e| e == name)
                || self.behaviors.iter().any(|b| b == name)
        };
        let is_pattern = text
            .split("->")
            .flat_map(|part| part.split(','))
            .all(|name| known(name.trim()));
        if is_pattern {
            Ok(XScale::Pattern(text.to_string()))
        } else if env.line_labels.iter().any(|l| l == text) {
            Ok(XScale::LineLabel(text.to_string()))
        } else {
            Err(ParameterError::new(format!(
                "Invalid value '{}' for parameter 'xscale'.",
                text
            )))
        }
    }

    fn number<R: Rng + ?Sized>(
        name: ParameterName,
        text: &str,
        env: &ParameterEnv,
        rng: &mut R,
    ) -> Result<f64, ParameterError> {
        env.variables.evaluate_number(text, rng).map_err(|_| {
            ParameterError::new(format!(
                "Invalid value '{}' for parameter '{}'.",
                text, name
            ))
        })
    }

    fn positive_integer<R: Rng + ?Sized>(
        text: &str,
        env: &ParameterEnv,
        rng: &mut R,
    ) -> Option<usize> {
        env.variables
            .evaluate_number(text, rng)
            .ok()
            .filter(|x| x.fract() == 0.0 && *x >= 1.0)
            .map(|x| x as usize)
    }

    fn on_off(name: ParameterName, text: &str) -> Result<bool, ParameterError> {
        match text.to_lowercase().as_str() {
            "on" => Ok(true),
            "off" => Ok(false),
            _ => Err(ParameterError::new(format!(
                "Parameter '{}' must be 'on' or 'off'.",
                name
            ))),
        }
    }

    fn match_mode(name: ParameterName, text: &str) -> Result<MatchMode, ParameterError> {
        text.to_lowercase().parse().map_err(|_| {
            ParameterError::new(format!(
                "Parameter {} must be 'subset' or 'exact'.",
                name
            ))
        })
    }
}
