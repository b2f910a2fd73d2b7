use core::fmt;

use rand::{distributions::WeightedIndex, prelude::Distribution, seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::context::EvalContext;
use super::{EvalError, EvalResult};
use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};

// 値の型システム
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Integer(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(true) => write!(f, "True"),
            Value::Boolean(false) => write!(f, "False"),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::List(_) => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Boolean(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates a complete expression written as `source` in the script.
    ///
    /// The result is a number or a boolean; runtime failures are reported
    /// with the source text.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        expr: &Expression,
        source: &str,
        context: &dyn EvalContext,
        rng: &mut R,
    ) -> EvalResult<Value> {
        let value = self
            .eval_expression(expr, context, rng)
            .map_err(|e| match e {
                EvalError::Eval(message) => EvalError::Eval(format!(
                    "Cannot evaluate expression '{}': {}",
                    source,
                    terminate(&message)
                )),
                other => other,
            })?;
        match value {
            Value::List(_) => Err(EvalError::eval(format!(
                "Error in expression '{}'.",
                source
            ))),
            value => Ok(value),
        }
    }

    /// Evaluates an expression that must produce a boolean.
    pub fn evaluate_condition<R: Rng + ?Sized>(
        &self,
        expr: &Expression,
        source: &str,
        context: &dyn EvalContext,
        rng: &mut R,
    ) -> EvalResult<bool> {
        match self.evaluate(expr, source, context, rng)? {
            Value::Boolean(b) => Ok(b),
            other => {
                debug!("condition '{}' evaluated to {}", source, other);
                Err(EvalError::eval(format!(
                    "Condition '{}' is not a boolean expression.",
                    source
                )))
            }
        }
    }

    /// Evaluates an expression that must produce a number.
    pub fn evaluate_number<R: Rng + ?Sized>(
        &self,
        expr: &Expression,
        source: &str,
        context: &dyn EvalContext,
        rng: &mut R,
    ) -> EvalResult<f64> {
        match self.evaluate(expr, source, context, rng)? {
            value @ (Value::Integer(_) | Value::Float(_)) => value
                .as_f64()
                .ok_or_else(|| EvalError::eval(format!("'{}' is not a number.", source))),
            _ => Err(EvalError::eval(format!(
                "Expression '{}' does not evaluate to a number.",
                source
            ))),
        }
    }

    pub fn eval_expression<R: Rng + ?Sized>(
        &self,
        expr: &Expression,
        context: &dyn EvalContext,
        rng: &mut R,
    ) -> EvalResult<Value> {
        match expr {
            Expression::Literal(lit) => Ok(Self::eval_literal(lit)),
            Expression::Variable(name) => context.resolve(name),
            Expression::List(items) => items
                .iter()
                .map(|item| self.eval_expression(item, context, rng))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::List),
            Expression::FunctionCall {
                function,
                arguments,
            } => self.eval_function_call(function, arguments, context, rng),
            Expression::BinaryOp { op, left, right } => {
                self.eval_binary_op(op, left, right, context, rng)
            }
            Expression::UnaryOp { op, operand } => {
                let value = self.eval_expression(operand, context, rng)?;
                match op {
                    UnaryOperator::Not => Ok(Value::Boolean(!value.is_truthy())),
                    UnaryOperator::Minus => match value {
                        Value::Float(x) => Ok(Value::Float(-x)),
                        other => other
                            .as_i64()
                            .map(|i| Value::Integer(-i))
                            .ok_or_else(|| EvalError::eval(format!("bad operand for -: {}", other))),
                    },
                }
            }
        }
    }

    fn eval_literal(lit: &Literal) -> Value {
        match lit {
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(x) => Value::Float(*x),
            Literal::Boolean(b) => Value::Boolean(*b),
        }
    }

    fn eval_function_call<R: Rng + ?Sized>(
        &self,
        function: &str,
        arguments: &[Expression],
        context: &dyn EvalContext,
        rng: &mut R,
    ) -> EvalResult<Value> {
        match function {
            "count" => match arguments {
                [Expression::Variable(event)] => context.count(event).map(Value::Integer),
                _ => Err(EvalError::eval(
                    "The function 'count' takes one event name.",
                )),
            },
            "count_line" => match arguments {
                [] => context.count_line(None).map(Value::Integer),
                [Expression::Variable(event)] => {
                    context.count_line(Some(event)).map(Value::Integer)
                }
                _ => Err(EvalError::eval(
                    "The function 'count_line' takes at most one event name.",
                )),
            },
            "rand" | "choice" => {
                let args = arguments
                    .iter()
                    .map(|arg| self.eval_expression(arg, context, rng))
                    .collect::<EvalResult<Vec<_>>>()?;
                if function == "rand" {
                    self.eval_rand_function(&args, rng)
                } else {
                    self.eval_choice_function(&args, rng)
                }
            }
            _ => Err(EvalError::eval(format!("Unknown function '{}'", function))),
        }
    }

    // 以下、組み込み関数の実装

    fn eval_rand_function<R: Rng + ?Sized>(&self, args: &[Value], rng: &mut R) -> EvalResult<Value> {
        let (start, stop) = match args {
            [Value::Integer(start), Value::Integer(stop)] => (*start, *stop),
            [Value::Integer(_), _] => {
                return Err(EvalError::eval(
                    "Second argument to 'rand' must be integer.",
                ))
            }
            [_, _] => {
                return Err(EvalError::eval(
                    "First argument to 'rand' must be integer.",
                ))
            }
            _ => {
                return Err(EvalError::eval(
                    "The function 'rand' takes two arguments.",
                ))
            }
        };
        if start > stop {
            return Err(EvalError::eval(
                "The first argument to 'rand' must be less than or equal to the second argument.",
            ));
        }
        Ok(Value::Integer(rng.gen_range(start..=stop)))
    }

    fn eval_choice_function<R: Rng + ?Sized>(&self, args: &[Value], rng: &mut R) -> EvalResult<Value> {
        match args {
            [] => Err(EvalError::eval(
                "The function 'choice' must have at least one argument.",
            )),
            [Value::List(population)] => Self::choose(population, None, rng),
            [_] => Err(EvalError::eval("Single input to 'choice' must be a list.")),
            [Value::List(population), Value::List(weights)] => {
                Self::choose(population, Some(weights), rng)
            }
            population => Self::choose(population, None, rng),
        }
    }

    fn choose<R: Rng + ?Sized>(
        population: &[Value],
        weights: Option<&[Value]>,
        rng: &mut R,
    ) -> EvalResult<Value> {
        const NON_NUMBER: &str = "Found non-number in 'choice'.";
        if !population.iter().all(Value::is_number) {
            return Err(EvalError::eval(NON_NUMBER));
        }
        match weights {
            None => population
                .choose(rng)
                .cloned()
                .ok_or_else(|| EvalError::eval("Cannot choose from an empty list.")),
            Some(weights) => {
                if weights.len() != population.len() {
                    return Err(EvalError::eval(
                        "The number of weights does not match the population.",
                    ));
                }
                let weights = weights
                    .iter()
                    .map(|w| match w {
                        Value::Integer(_) | Value::Float(_) => w.as_f64().ok_or(NON_NUMBER),
                        _ => Err(NON_NUMBER),
                    })
                    .collect::<Result<Vec<f64>, _>>()
                    .map_err(EvalError::eval)?;
                let index = WeightedIndex::new(&weights)
                    .map_err(|e| EvalError::eval(format!("Invalid weights in 'choice': {}", e)))?;
                Ok(population[index.sample(rng)].clone())
            }
        }
    }

    fn eval_binary_op<R: Rng + ?Sized>(
        &self,
        op: &BinaryOperator,
        left: &Expression,
        right: &Expression,
        context: &dyn EvalContext,
        rng: &mut R,
    ) -> EvalResult<Value> {
        let left_val = self.eval_expression(left, context, rng)?;

        // 短絡評価
        match op {
            BinaryOperator::And if !left_val.is_truthy() => return Ok(Value::Boolean(false)),
            BinaryOperator::Or if left_val.is_truthy() => return Ok(Value::Boolean(true)),
            _ => {}
        }

        let right_val = self.eval_expression(right, context, rng)?;

        match op {
            BinaryOperator::Add => self.eval_add(&left_val, &right_val),
            BinaryOperator::Subtract => self.eval_subtract(&left_val, &right_val),
            BinaryOperator::Multiply => self.eval_multiply(&left_val, &right_val),
            BinaryOperator::Divide => self.eval_divide(&left_val, &right_val),
            BinaryOperator::Equal => Ok(Value::Boolean(self.values_equal(&left_val, &right_val))),
            BinaryOperator::NotEqual => {
                Ok(Value::Boolean(!self.values_equal(&left_val, &right_val)))
            }
            BinaryOperator::LessThan => self.compare_values(&left_val, &right_val, |o| o.is_lt()),
            BinaryOperator::GreaterThan => {
                self.compare_values(&left_val, &right_val, |o| o.is_gt())
            }
            BinaryOperator::LessThanEqual => {
                self.compare_values(&left_val, &right_val, |o| o.is_le())
            }
            BinaryOperator::GreaterThanEqual => {
                self.compare_values(&left_val, &right_val, |o| o.is_ge())
            }
            BinaryOperator::And | BinaryOperator::Or => Ok(Value::Boolean(right_val.is_truthy())),
        }
    }

    fn eval_arithmetic(
        &self,
        symbol: &str,
        left: &Value,
        right: &Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> EvalResult<Value> {
        let unsupported =
            || EvalError::eval(format!("unsupported operands {} {} {}", left, symbol, right));
        match (left.as_i64(), right.as_i64()) {
            (Some(l), Some(r)) => int_op(l, r).map(Value::Integer).ok_or_else(unsupported),
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(l), Some(r)) => Ok(Value::Float(float_op(l, r))),
                _ => Err(unsupported()),
            },
        }
    }

    fn eval_add(&self, left: &Value, right: &Value) -> EvalResult<Value> {
        self.eval_arithmetic("+", left, right, i64::checked_add, |l, r| l + r)
    }

    fn eval_subtract(&self, left: &Value, right: &Value) -> EvalResult<Value> {
        self.eval_arithmetic("-", left, right, i64::checked_sub, |l, r| l - r)
    }

    fn eval_multiply(&self, left: &Value, right: &Value) -> EvalResult<Value> {
        self.eval_arithmetic("*", left, right, i64::checked_mul, |l, r| l * r)
    }

    fn eval_divide(&self, left: &Value, right: &Value) -> EvalResult<Value> {
        match (left.as_f64(), right.as_f64()) {
            (Some(_), Some(r)) if r == 0.0 => Err(EvalError::eval("division by zero")),
            (Some(l), Some(r)) => Ok(Value::Float(l / r)),
            _ => Err(EvalError::eval(format!(
                "unsupported operands {} / {}",
                left, right
            ))),
        }
    }

    // ヘルパーメソッド

    fn values_equal(&self, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::List(l), Value::List(r)) => {
                l.len() == r.len() && l.iter().zip(r).all(|(a, b)| self.values_equal(a, b))
            }
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            },
        }
    }

    fn compare_values<F>(&self, left: &Value, right: &Value, compare: F) -> EvalResult<Value>
    where
        F: Fn(std::cmp::Ordering) -> bool,
    {
        match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => l
                .partial_cmp(&r)
                .map(|ordering| Value::Boolean(compare(ordering)))
                .ok_or_else(|| EvalError::eval(format!("cannot compare {} and {}", left, right))),
            _ => Err(EvalError::eval(format!(
                "cannot compare {} and {}",
                left, right
            ))),
        }
    }
}

fn terminate(message: &str) -> String {
    if message.ends_with('.') {
        message.to_string()
    } else {
        format!("{}.", message)
    }
}
