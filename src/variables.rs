//! Global and phase-local variables.
//!
//! Global variables are declared with `@variables` and keep their definition
//! so that definitions calling `rand` or `choice` can be drawn anew for each
//! subject. Phase-local variables are the names assigned inside a phase;
//! they start at 0 every time a subject enters the phase.

use std::collections::{BTreeSet, HashMap};

use rand::Rng;
use tracing::debug;

use crate::analyzer::parsers::parse_expression_text;
use crate::ast::Expression;
use crate::eval::{EvalError, EvalResult, ExpressionEvaluator, Value, VariableContext};

/// Parses expression text, reporting failures the way the script does.
pub fn parse_expression(source: &str) -> EvalResult<Expression> {
    parse_expression_text(source).map_err(|e| {
        debug!("parse of '{}' failed: {}", source, e);
        EvalError::eval(format!("Error in expression '{}'.", source))
    })
}

#[derive(Debug, Clone)]
struct Definition {
    name: String,
    source: String,
    expression: Expression,
}

/// Script-global variables in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    definitions: Vec<Definition>,
    values: HashMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.values.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Declares `name` or, if it exists, replaces its definition.
    pub fn define<R: Rng + ?Sized>(
        &mut self,
        name: &str,
        source: &str,
        rng: &mut R,
    ) -> EvalResult<()> {
        let expression = parse_expression(source)?;
        let value = self.evaluate_parsed(&expression, source, rng)?;
        let definition = Definition {
            name: name.to_string(),
            source: source.to_string(),
            expression,
        };
        match self.definitions.iter_mut().find(|d| d.name == name) {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Evaluates expression text against the current values.
    pub fn evaluate<R: Rng + ?Sized>(&self, source: &str, rng: &mut R) -> EvalResult<Value> {
        let expression = parse_expression(source)?;
        self.evaluate_parsed(&expression, source, rng)
    }

    pub fn evaluate_number<R: Rng + ?Sized>(&self, source: &str, rng: &mut R) -> EvalResult<f64> {
        let expression = parse_expression(source)?;
        ExpressionEvaluator::new().evaluate_number(
            &expression,
            source,
            &VariableContext::new(&self.values),
            rng,
        )
    }

    fn evaluate_parsed<R: Rng + ?Sized>(
        &self,
        expression: &Expression,
        source: &str,
        rng: &mut R,
    ) -> EvalResult<Value> {
        ExpressionEvaluator::new().evaluate(
            expression,
            source,
            &VariableContext::new(&self.values),
            rng,
        )
    }

    /// A copy for one subject: definitions that draw random numbers, or
    /// read a variable drawn anew, are evaluated again in declaration order
    /// with the subject's generator.
    pub fn instantiate<R: Rng + ?Sized>(&self, rng: &mut R) -> EvalResult<Variables> {
        let mut copy = self.clone();
        let mut redrawn: BTreeSet<&str> = BTreeSet::new();
        for definition in &self.definitions {
            let depends = definition
                .expression
                .names()
                .iter()
                .any(|name| redrawn.contains(name.as_str()));
            if definition.expression.is_random() || depends {
                let value = copy.evaluate_parsed(&definition.expression, &definition.source, rng)?;
                copy.values.insert(definition.name.clone(), value);
                redrawn.insert(&definition.name);
            }
        }
        Ok(copy)
    }
}

/// Phase-local variables of one subject.
#[derive(Debug, Clone, Default)]
pub struct LocalVariables {
    names: BTreeSet<String>,
    values: HashMap<String, Value>,
}

impl LocalVariables {
    pub fn new(names: BTreeSet<String>) -> Self {
        let mut locals = Self {
            names,
            values: HashMap::new(),
        };
        locals.reset();
        locals
    }

    /// Sets every local variable back to 0.
    pub fn reset(&mut self) {
        self.values = self
            .names
            .iter()
            .map(|name| (name.clone(), Value::Integer(0)))
            .collect();
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_define_and_evaluate() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut vars = Variables::new();
        vars.define("a", "2", &mut rng).unwrap();
        vars.define("b", "a*3+1", &mut rng).unwrap();
        assert_eq!(vars.get("b"), Some(&Value::Integer(7)));
        assert_eq!(vars.evaluate_number("b/2", &mut rng).unwrap(), 3.5);
        assert!(vars.evaluate("c+1", &mut rng).is_err());
    }

    #[test]
    fn test_redefine_keeps_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut vars = Variables::new();
        vars.define("a", "1", &mut rng).unwrap();
        vars.define("a", "5", &mut rng).unwrap();
        assert_eq!(vars.get("a"), Some(&Value::Integer(5)));
        assert_eq!(vars.names().len(), 1);
    }

    #[test]
    fn test_instantiate_redraws_random_definitions() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut vars = Variables::new();
        vars.define("fixed", "10", &mut rng).unwrap();
        vars.define("r", "rand(1,1000000)", &mut rng).unwrap();

        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let first = vars.instantiate(&mut a).unwrap();
        let second = vars.instantiate(&mut b).unwrap();
        assert_eq!(first.get("r"), second.get("r"));
        assert_eq!(first.get("fixed"), Some(&Value::Integer(10)));
    }

    #[test]
    fn test_instantiate_follows_redrawn_variables() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut vars = Variables::new();
        vars.define("x", "1", &mut rng).unwrap();
        vars.define("fixed", "x*2", &mut rng).unwrap();
        vars.define("p", "choice(0,1)", &mut rng).unwrap();
        vars.define("q", "p", &mut rng).unwrap();
        vars.define("r", "q+10", &mut rng).unwrap();
        vars.define("x", "5", &mut rng).unwrap();

        for seed in 0..20 {
            let subject = vars.instantiate(&mut StdRng::seed_from_u64(seed)).unwrap();
            let p = subject.get("p").and_then(Value::as_f64).unwrap();
            assert_eq!(subject.get("q").and_then(Value::as_f64), Some(p));
            assert_eq!(subject.get("r").and_then(Value::as_f64), Some(p + 10.0));
            // reassigning x later does not reach definitions made before
            assert_eq!(subject.get("fixed"), Some(&Value::Integer(2)));
        }
    }

    #[test]
    fn test_malformed_expression() {
        let mut rng = StdRng::seed_from_u64(1);
        let vars = Variables::new();
        assert_eq!(
            vars.evaluate("1 +", &mut rng),
            Err(EvalError::eval("Error in expression '1 +'."))
        );
    }

    #[test]
    fn test_local_reset() {
        let names: BTreeSet<String> = ["x".to_string()].into_iter().collect();
        let mut locals = LocalVariables::new(names);
        assert_eq!(locals.get("x"), Some(&Value::Integer(0)));
        locals.set("x", Value::Integer(4));
        locals.reset();
        assert_eq!(locals.get("x"), Some(&Value::Integer(0)));
    }
}
