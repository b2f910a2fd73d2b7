use std::collections::HashMap;

use super::{EvalError, EvalResult, Value};

/// Resolves the names and counters an expression refers to.
///
/// The three evaluation sites of a script differ only in this: variable
/// definitions see global variables, stop conditions additionally see event
/// counts, and line guards see the last response and per-line counts.
pub trait EvalContext {
    /// Value of a bare name.
    fn resolve(&self, name: &str) -> EvalResult<Value>;

    /// `count(event)`: occurrences of the event since the phase started.
    fn count(&self, event: &str) -> EvalResult<i64> {
        Err(EvalError::eval(format!(
            "'count({})' is not available here.",
            event
        )))
    }

    /// `count_line(event)`, or `count_line()` for the current line label.
    fn count_line(&self, event: Option<&str>) -> EvalResult<i64> {
        Err(EvalError::eval(format!(
            "'count_line({})' is not available here.",
            event.unwrap_or_default()
        )))
    }
}

/// Context over a plain set of variables.
pub struct VariableContext<'a> {
    values: &'a HashMap<String, Value>,
}

impl<'a> VariableContext<'a> {
    pub fn new(values: &'a HashMap<String, Value>) -> Self {
        Self { values }
    }
}

impl EvalContext for VariableContext<'_> {
    fn resolve(&self, name: &str) -> EvalResult<Value> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_context() {
        let mut values = HashMap::new();
        values.insert("x".to_string(), Value::Integer(3));
        let context = VariableContext::new(&values);
        assert_eq!(context.resolve("x"), Ok(Value::Integer(3)));
        assert_eq!(
            context.resolve("y"),
            Err(EvalError::UnknownVariable("y".to_string()))
        );
        assert!(context.count("s").is_err());
        assert!(context.count_line(None).is_err());
    }
}
