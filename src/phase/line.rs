//! Phase lines: `label stimulus | guard: actions, destinations | ...`.

use std::collections::BTreeSet;

use rand::Rng;

use super::PhaseScope;
use crate::ast::Expression;
use crate::eval::{EvalContext, EvalError, EvalResult, ExpressionEvaluator, VariableContext};
use crate::script::text::{count_top_level_colons, split_bars, split_key_value, split_list};
use crate::script::CompileError;
use crate::tokenizer::token::is_identifier;
use crate::variables::parse_expression;

const OMIT_LEARN: &str = "@omit_learn";
const COUNT_RESET: &str = "count_reset";
const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// A boolean expression as written in the script.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub expression: Expression,
    pub source: String,
}

impl Guard {
    pub fn parse(source: &str) -> EvalResult<Self> {
        Ok(Self {
            expression: parse_expression(source)?,
            source: source.to_string(),
        })
    }

    pub fn is_met<R: Rng + ?Sized>(&self, context: &dyn EvalContext, rng: &mut R) -> EvalResult<bool> {
        ExpressionEvaluator::new().evaluate_condition(&self.expression, &self.source, context, rng)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.expression.names()
    }

    pub fn depends_on(&self, names: &[String]) -> bool {
        self.names().iter().any(|n| names.contains(n))
    }
}

/// A number written in the script. Constants are folded at compile time;
/// anything that names a variable or draws a random number is evaluated
/// again each time it is used.
#[derive(Debug, Clone, PartialEq)]
pub struct Amount {
    /// Value against the globals at compile time.
    pub value: f64,
    pub source: String,
    expression: Option<Expression>,
}

impl Amount {
    pub fn fixed(value: f64) -> Self {
        Self {
            value,
            source: value.to_string(),
            expression: None,
        }
    }

    fn compile<R: Rng + ?Sized>(source: &str, scope: &PhaseScope, rng: &mut R) -> EvalResult<Self> {
        let expression = parse_expression(source)?;
        let value = ExpressionEvaluator::new().evaluate_number(
            &expression,
            source,
            &VariableContext::new(scope.variables.values()),
            rng,
        )?;
        let varies = expression.is_random() || !expression.names().is_empty();
        Ok(Self {
            value,
            source: source.to_string(),
            expression: varies.then_some(expression),
        })
    }

    pub fn is_fixed(&self) -> bool {
        self.expression.is_none()
    }

    /// The value for the subject whose variables `context` resolves.
    pub fn resolve<R: Rng + ?Sized>(&self, context: &dyn EvalContext, rng: &mut R) -> EvalResult<f64> {
        match &self.expression {
            None => Ok(self.value),
            Some(expression) => {
                ExpressionEvaluator::new().evaluate_number(expression, &self.source, context, rng)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Assign {
        name: String,
        expression: Expression,
        source: String,
    },
    CountReset(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub label: String,
    pub line: usize,
    pub probability: Amount,
}

/// One `|`-separated alternative of a phase line.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub guard: Option<Guard>,
    pub actions: Vec<Action>,
    pub destinations: Vec<Destination>,
    pub omit_learn: bool,
    pub source: String,
}

impl Condition {
    /// Draws a destination line; `None` when the drawn value falls beyond
    /// the listed probabilities.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        context: &dyn EvalContext,
        rng: &mut R,
    ) -> EvalResult<Option<usize>> {
        let mut probabilities = Vec::with_capacity(self.destinations.len());
        for destination in &self.destinations {
            let p = destination.probability.resolve(context, rng)?;
            if !(0.0..=1.0).contains(&p) {
                return Err(EvalError::eval(format!(
                    "Invalid condition '{}'. Expected a probability, got '{}'.",
                    self.source, destination.probability.source
                )));
            }
            probabilities.push(p);
        }
        let sum: f64 = probabilities.iter().sum();
        if sum > 1.0 + PROBABILITY_TOLERANCE {
            return Err(EvalError::eval(format!(
                "Invalid condition '{}'. Sum of probabilities is {}>1.",
                self.source, sum
            )));
        }

        if let ([only], [p]) = (self.destinations.as_slice(), probabilities.as_slice()) {
            if *p >= 1.0 {
                return Ok(Some(only.line));
            }
        }
        let r: f64 = rng.gen();
        let mut cumulative = 0.0;
        for (destination, p) in self.destinations.iter().zip(&probabilities) {
            cumulative += p;
            if r < cumulative {
                return Ok(Some(destination.line));
            }
        }
        Ok(None)
    }

    /// Taken whenever its guard holds, whatever the subject's variables.
    fn always_taken(&self) -> bool {
        self.guard.is_none()
            && self.destinations.iter().all(|d| d.probability.is_fixed())
            && self.destinations.iter().map(|d| d.probability.value).sum::<f64>() >= 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseLine {
    pub label: String,
    pub number: usize,
    /// Presented elements with intensities; empty on a help line.
    pub stimulus: Vec<(String, Amount)>,
    /// Executed when a help line is entered.
    pub help_actions: Vec<Action>,
    pub conditions: Vec<Condition>,
}

impl PhaseLine {
    pub fn is_help(&self) -> bool {
        self.stimulus.is_empty()
    }

    pub fn guards(&self) -> impl Iterator<Item = &Guard> {
        self.conditions.iter().filter_map(|c| c.guard.as_ref())
    }

    pub fn assigned_names(&self) -> impl Iterator<Item = &str> {
        self.help_actions
            .iter()
            .chain(self.conditions.iter().flat_map(|c| c.actions.iter()))
            .filter_map(|a| match a {
                Action::Assign { name, .. } => Some(name.as_str()),
                Action::CountReset(_) => None,
            })
    }
}

/// Compiles the text following the label of a phase line.
pub fn parse_line<R: Rng + ?Sized>(
    label: &str,
    rest: &str,
    number: usize,
    scope: &PhaseScope,
    rng: &mut R,
) -> Result<PhaseLine, CompileError> {
    let err = |message: String| CompileError::new(number, message);
    let parts = split_bars(rest);
    let Some((stimulus_part, condition_parts)) = parts.split_first() else {
        return Err(err("Missing separator '|' on phase line.".to_string()));
    };
    if condition_parts.is_empty() {
        return Err(err("Missing separator '|' on phase line.".to_string()));
    }
    if condition_parts.iter().all(|c| c.is_empty()) {
        return Err(err(format!("Line with label '{}' has no conditions.", label)));
    }

    let items = split_list(stimulus_part, ',');
    let is_stimulus = items
        .iter()
        .any(|item| scope.is_element(element_name(item)));
    let mut stimulus = Vec::new();
    let mut help_actions = Vec::new();
    if is_stimulus {
        for item in &items {
            let (name, intensity) = parse_element(item, scope, rng).map_err(err)?;
            if stimulus.iter().any(|(e, _)| e == &name) {
                return Err(err(format!(
                    "Stimulus element '{}' occurs more than once.",
                    name
                )));
            }
            stimulus.push((name, intensity));
        }
    } else {
        for item in items.iter().filter(|i| !i.is_empty()) {
            let action = parse_action(item, scope)
                .map_err(err)?
                .ok_or_else(|| err(format!("Unknown stimulus element or action '{}'.", item)))?;
            help_actions.push(action);
        }
    }

    let is_help = !is_stimulus;
    let mut conditions = Vec::new();
    for part in condition_parts {
        conditions.push(parse_condition(part, is_help, scope, rng).map_err(err)?);
    }

    // An always-taken condition hides the ones after it.
    if let Some(pos) = conditions
        .iter()
        .position(Condition::always_taken)
    {
        if pos + 1 < conditions.len() {
            return Err(err(format!(
                "Unconditional condition '{}' must be last.",
                conditions[pos].source
            )));
        }
    }

    Ok(PhaseLine {
        label: label.to_string(),
        number,
        stimulus,
        help_actions,
        conditions,
    })
}

fn element_name(item: &str) -> &str {
    match item.find('[') {
        Some(pos) => item[..pos].trim(),
        None => item.trim(),
    }
}

fn parse_element<R: Rng + ?Sized>(
    item: &str,
    scope: &PhaseScope,
    rng: &mut R,
) -> Result<(String, Amount), String> {
    let name = element_name(item);
    if !scope.is_element(name) {
        return Err(format!("Expected a stimulus element, got '{}'.", item));
    }
    let intensity = match item.find('[') {
        None => Amount::fixed(1.0),
        Some(pos) => {
            let inner = item[pos + 1..]
                .strip_suffix(']')
                .ok_or_else(|| format!("Invalid intensity in '{}'.", item))?;
            let amount = Amount::compile(inner, scope, rng).map_err(|e| e.to_string())?;
            if amount.value < 0.0 {
                return Err(intensity_error(name));
            }
            amount
        }
    };
    Ok((name.to_string(), intensity))
}

pub(super) fn intensity_error(element: &str) -> String {
    format!("Intensity of '{}' must be non-negative.", element)
}

/// `Ok(None)` when `item` is not written as an action.
fn parse_action(item: &str, scope: &PhaseScope) -> Result<Option<Action>, String> {
    if let Some(event) = item
        .strip_prefix(COUNT_RESET)
        .map(str::trim)
        .and_then(|r| r.strip_prefix('('))
        .and_then(|r| r.strip_suffix(')'))
    {
        let event = event.trim();
        if !scope.is_event(event) {
            return Err(format!("Unknown event '{}' in count_reset.", event));
        }
        return Ok(Some(Action::CountReset(event.to_string())));
    }

    if count_top_level_colons(item) != 1 {
        return Ok(None);
    }
    let Some((name, source)) = split_key_value(item) else {
        return Ok(None);
    };
    if scope.variables.contains(name) {
        return Err("Cannot modify global variable inside a phase.".to_string());
    }
    if !is_identifier(name) || scope.is_event(name) {
        return Err(format!("Invalid variable name '{}'.", name));
    }
    let expression = parse_expression(source).map_err(|e| e.to_string())?;
    Ok(Some(Action::Assign {
        name: name.to_string(),
        expression,
        source: source.to_string(),
    }))
}

/// `label` or `label(...)` with `label` a line of the phase.
fn destination_label<'a>(item: &'a str, scope: &PhaseScope) -> Option<&'a str> {
    let name = match item.find('(') {
        Some(pos) if item.ends_with(')') => item[..pos].trim(),
        Some(_) => return None,
        None => item.trim(),
    };
    scope.labels.iter().any(|l| l == name).then_some(name)
}

fn parse_condition<R: Rng + ?Sized>(
    text: &str,
    is_help: bool,
    scope: &PhaseScope,
    rng: &mut R,
) -> Result<Condition, String> {
    if text.is_empty() {
        return Err("Empty condition on phase line.".to_string());
    }
    let mut items = split_list(text, ',');
    let invalid = |detail: &str| format!("Invalid condition '{}'. {}", text, detail);

    let mut guard = None;
    match count_top_level_colons(&items[0]) {
        0 => {}
        1 => {
            if let Some((left, right)) = split_key_value(&items[0]) {
                let right_is_target = right.starts_with(OMIT_LEARN)
                    || right.starts_with(COUNT_RESET)
                    || destination_label(right, scope).is_some();
                let left_is_guard = !is_identifier(left) || scope.is_event(left);
                if right_is_target || left_is_guard {
                    guard = Some(left.to_string());
                    items[0] = right.to_string();
                }
            }
        }
        2 => {
            if let Some((left, right)) = split_key_value(&items[0]) {
                guard = Some(left.to_string());
                items[0] = right.to_string();
            }
        }
        _ => return Err(format!("Condition '{}' has too many colons.", text)),
    }

    let guard = match guard {
        Some(source) => {
            let guard = Guard::parse(&source).map_err(|e| e.to_string())?;
            if is_help && guard.depends_on(scope.behaviors) {
                return Err("Condition on help line cannot depend on response.".to_string());
            }
            Some(guard)
        }
        None => None,
    };

    let mut actions = Vec::new();
    let mut destinations: Vec<Destination> = Vec::new();
    let mut omit_learn = false;
    let mut bare_label = false;
    for item in &items {
        let mut item = item.as_str();
        if let Some(after) = item.strip_prefix(OMIT_LEARN) {
            omit_learn = true;
            item = after.trim();
            if item.is_empty() {
                continue;
            }
        }

        if let Some(label) = destination_label(item, scope) {
            if destinations.iter().any(|d| d.label == label) {
                return Err(invalid(&format!("Label '{}' duplicated.", label)));
            }
            let line = scope
                .labels
                .iter()
                .position(|l| l == label)
                .unwrap_or_default();
            let probability = match item.find('(') {
                None => {
                    bare_label = true;
                    Amount::fixed(1.0)
                }
                Some(pos) => {
                    let inner = &item[pos + 1..item.len() - 1];
                    Amount::compile(inner, scope, rng)
                        .ok()
                        .filter(|p| (0.0..=1.0).contains(&p.value))
                        .ok_or_else(|| {
                            invalid(&format!("Expected a probability, got '{}'.", inner))
                        })?
                }
            };
            destinations.push(Destination {
                label: label.to_string(),
                line,
                probability,
            });
            continue;
        }

        if !destinations.is_empty() {
            return Err(invalid("Line labels must come last."));
        }
        match parse_action(item, scope)? {
            Some(action) => actions.push(action),
            None => {
                let name = item.split('(').next().unwrap_or(item).trim();
                return Err(invalid(&format!("Unknown line label '{}'.", name)));
            }
        }
    }

    if destinations.is_empty() {
        return Err(format!("Condition '{}' has no line label.", text));
    }
    if bare_label && destinations.len() > 1 {
        return Err(format!("Invalid condition '{}'.", text));
    }
    let sum: f64 = destinations.iter().map(|d| d.probability.value).sum();
    if sum > 1.0 + PROBABILITY_TOLERANCE {
        return Err(invalid(&format!("Sum of probabilities is {}>1.", sum)));
    }

    Ok(Condition {
        guard,
        actions,
        destinations,
        omit_learn,
        source: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Value;
    use crate::variables::Variables;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn compile(label: &str, rest: &str) -> Result<PhaseLine, CompileError> {
        let mut rng = StdRng::seed_from_u64(0);
        let mut variables = Variables::new();
        variables.define("g", "0.5", &mut rng).unwrap();
        let elements = strings(&["s1", "s2", "us"]);
        let behaviors = strings(&["b1", "b2"]);
        let labels = strings(&["A", "B", "C", "H"]);
        let scope = PhaseScope {
            elements: &elements,
            behaviors: &behaviors,
            variables: &variables,
            labels: &labels,
        };
        parse_line(label, rest, 7, &scope, &mut rng)
    }

    fn message(label: &str, rest: &str) -> String {
        compile(label, rest).unwrap_err().to_string()
    }

    #[test]
    fn test_stimulus_line() {
        let line = compile("A", "s1, s2[0.5] | b1: B | A").unwrap();
        let stimulus: Vec<(&str, f64)> = line
            .stimulus
            .iter()
            .map(|(e, a)| (e.as_str(), a.value))
            .collect();
        assert_eq!(stimulus, vec![("s1", 1.0), ("s2", 0.5)]);
        assert!(line.stimulus.iter().all(|(_, a)| a.is_fixed()));
        assert!(!line.is_help());
        assert_eq!(line.conditions.len(), 2);
        assert_eq!(line.conditions[0].guard.as_ref().unwrap().source, "b1");
        assert_eq!(line.conditions[0].destinations[0].line, 1);
        assert!(line.conditions[1].guard.is_none());
    }

    #[test]
    fn test_probabilistic_destinations() {
        let line = compile("A", "s1 | B(0.2), C(g)").unwrap();
        let condition = &line.conditions[0];
        assert_eq!(condition.destinations.len(), 2);
        assert_eq!(condition.destinations[1].probability.value, 0.5);
        assert!(condition.destinations[0].probability.is_fixed());
        assert!(!condition.destinations[1].probability.is_fixed());
    }

    #[test]
    fn test_help_line_actions() {
        let line = compile("H", "x:0, count_reset(s1) | x=0: A | B").unwrap();
        assert!(line.is_help());
        assert_eq!(line.help_actions.len(), 2);
        assert_eq!(line.assigned_names().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn test_guard_with_assignment_and_omit_learn() {
        let line = compile("A", "s1 | b1: n:n+1, @omit_learn B | @omit_learn A").unwrap();
        let first = &line.conditions[0];
        assert_eq!(first.actions.len(), 1);
        assert!(first.omit_learn);
        assert!(line.conditions[1].omit_learn);

        let line = compile("A", "s1 | count(s1)>2: x:1, B | A").unwrap();
        assert!(line.conditions[0].guard.is_some());
        let line = compile("A", "s1 | x:1, A").unwrap();
        assert!(line.conditions[0].guard.is_none());
        assert_eq!(line.conditions[0].actions.len(), 1);
        let line = compile("A", "s1 | b1=1: x:2, B | A").unwrap();
        assert_eq!(line.conditions[0].guard.as_ref().unwrap().source, "b1=1");
    }

    #[test]
    fn test_line_errors() {
        assert_eq!(
            message("A", "s1 | B(0.7), C(0.6)"),
            "Error on line 7: Invalid condition 'B(0.7), C(0.6)'. Sum of probabilities is 1.2999999999999998>1."
        );
        assert_eq!(
            message("H", "| b1: A | B"),
            "Error on line 7: Condition on help line cannot depend on response."
        );
        assert_eq!(
            message("A", "s1 | g:1, B"),
            "Error on line 7: Cannot modify global variable inside a phase."
        );
        assert_eq!(
            message("A", "s1 | A | B"),
            "Error on line 7: Unconditional condition 'A' must be last."
        );
        assert_eq!(message("A", "s1"), "Error on line 7: Missing separator '|' on phase line.");
        assert_eq!(
            message("A", "s1 |"),
            "Error on line 7: Line with label 'A' has no conditions."
        );
        assert_eq!(
            message("A", "s1 | Z"),
            "Error on line 7: Invalid condition 'Z'. Unknown line label 'Z'."
        );
        assert_eq!(
            message("A", "s1, foo | A"),
            "Error on line 7: Expected a stimulus element, got 'foo'."
        );
        assert_eq!(
            message("A", "s1 | B, C(0.5)"),
            "Error on line 7: Invalid condition 'B, C(0.5)'."
        );
        assert_eq!(
            message("A", "s1 | B(0.5), x:1"),
            "Error on line 7: Invalid condition 'B(0.5), x:1'. Line labels must come last."
        );
    }

    #[test]
    fn test_draw_respects_probabilities() {
        let line = compile("A", "s1 | B(0.25), C(0.25) | A").unwrap();
        let condition = &line.conditions[0];
        let values = HashMap::new();
        let context = VariableContext::new(&values);
        let mut rng = StdRng::seed_from_u64(3);
        let mut hits = [0usize; 3];
        for _ in 0..4000 {
            match condition.draw(&context, &mut rng).unwrap() {
                Some(1) => hits[0] += 1,
                Some(2) => hits[1] += 1,
                _ => hits[2] += 1,
            }
        }
        assert!(hits[2] > 1700 && hits[2] < 2300);
    }

    #[test]
    fn test_amounts_follow_subject_variables() {
        let line = compile("A", "s1[g*2] | B(g), C(1-g)").unwrap();
        let (_, intensity) = &line.stimulus[0];
        assert_eq!(intensity.value, 1.0);
        let condition = &line.conditions[0];

        let mut rng = StdRng::seed_from_u64(5);
        let mut values = HashMap::new();
        values.insert("g".to_string(), Value::Integer(1));
        let context = VariableContext::new(&values);
        assert_eq!(intensity.resolve(&context, &mut rng).unwrap(), 2.0);
        for _ in 0..50 {
            assert_eq!(condition.draw(&context, &mut rng).unwrap(), Some(1));
        }
        values.insert("g".to_string(), Value::Integer(0));
        let context = VariableContext::new(&values);
        for _ in 0..50 {
            assert_eq!(condition.draw(&context, &mut rng).unwrap(), Some(2));
        }

        values.insert("g".to_string(), Value::Float(0.8));
        let line = compile("A", "s1 | B(g), C(g) | A").unwrap();
        let context = VariableContext::new(&values);
        assert_eq!(
            line.conditions[0].draw(&context, &mut rng).unwrap_err().to_string(),
            "Invalid condition 'B(g), C(g)'. Sum of probabilities is 1.6>1."
        );
    }

    proptest! {
        #[test]
        fn destination_probabilities_over_one_are_rejected(
            p in 0.0f64..1.0,
            q in 0.0f64..1.0,
        ) {
            let result = compile("A", &format!("s1 | B({}), C({}) | A", p, q));
            if p + q > 1.0 + 1e-6 {
                let message = result.unwrap_err().to_string();
                prop_assert!(message.contains("Sum of probabilities"), "{}", message);
            } else if p + q < 1.0 {
                prop_assert!(result.is_ok());
            }
        }
    }
}
