//! Abstract syntax of script expressions.
//!
//! Expressions appear in stop conditions, line guards, local variable
//! assignments, `@variables` definitions and probability weights. They are
//! parsed once at compile time and evaluated against an
//! [`EvalContext`](crate::eval::EvalContext) at run time.

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Variable(String),
    List(Vec<Expression>),
    FunctionCall {
        function: String,
        arguments: Vec<Expression>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
}

impl BinaryOperator {
    pub fn is_boolean(&self) -> bool {
        !matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum UnaryOperator {
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "-")]
    Minus,
}

impl Expression {
    pub fn integer(value: i64) -> Self {
        Expression::Literal(Literal::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Expression::Literal(Literal::Float(value))
    }

    pub fn variable<S: Into<String>>(name: S) -> Self {
        Expression::Variable(name.into())
    }

    pub fn call<S: Into<String>>(function: S, arguments: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            function: function.into(),
            arguments,
        }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Every bare name referenced by the expression, including names passed
    /// to `count(...)` and `count_line(...)`.
    pub fn names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Variable(name) => {
                names.insert(name.clone());
            }
            Expression::List(items) => items.iter().for_each(|e| e.collect_names(names)),
            Expression::FunctionCall { arguments, .. } => {
                arguments.iter().for_each(|e| e.collect_names(names))
            }
            Expression::BinaryOp { left, right, .. } => {
                left.collect_names(names);
                right.collect_names(names);
            }
            Expression::UnaryOp { operand, .. } => operand.collect_names(names),
        }
    }

    /// Names of every function called by the expression.
    pub fn functions(&self) -> BTreeSet<String> {
        let mut functions = BTreeSet::new();
        self.collect_functions(&mut functions);
        functions
    }

    fn collect_functions(&self, functions: &mut BTreeSet<String>) {
        match self {
            Expression::Literal(_) | Expression::Variable(_) => {}
            Expression::List(items) => items.iter().for_each(|e| e.collect_functions(functions)),
            Expression::FunctionCall {
                function,
                arguments,
            } => {
                functions.insert(function.clone());
                arguments.iter().for_each(|e| e.collect_functions(functions));
            }
            Expression::BinaryOp { left, right, .. } => {
                left.collect_functions(functions);
                right.collect_functions(functions);
            }
            Expression::UnaryOp { operand, .. } => operand.collect_functions(functions),
        }
    }

    /// True when the expression draws random numbers.
    pub fn is_random(&self) -> bool {
        let functions = self.functions();
        functions.contains("rand") || functions.contains("choice")
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(Literal::Integer(i)) => write!(f, "{}", i),
            Expression::Literal(Literal::Float(x)) => write!(f, "{}", x),
            Expression::Literal(Literal::Boolean(true)) => write!(f, "True"),
            Expression::Literal(Literal::Boolean(false)) => write!(f, "False"),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::List(items) => {
                let items: Vec<String> = items.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", items.join(","))
            }
            Expression::FunctionCall {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|e| e.to_string()).collect();
                write!(f, "{}({})", function, args.join(","))
            }
            Expression::BinaryOp { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expression::UnaryOp {
                op: UnaryOperator::Not,
                operand,
            } => write!(f, "not {}", operand),
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                operand,
            } => write!(f, "-{}", operand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_functions() {
        let expr = Expression::binary(
            BinaryOperator::And,
            Expression::binary(
                BinaryOperator::GreaterThanEqual,
                Expression::call("count_line", vec![Expression::variable("s")]),
                Expression::integer(2),
            ),
            Expression::variable("b1"),
        );
        assert_eq!(
            expr.names().into_iter().collect::<Vec<_>>(),
            vec!["b1".to_string(), "s".to_string()]
        );
        assert!(expr.functions().contains("count_line"));
        assert!(!expr.is_random());
        assert_eq!(expr.to_string(), "((count_line(s) >= 2) and b1)");
    }

    #[test]
    fn test_random_expression() {
        let expr = Expression::call(
            "rand",
            vec![Expression::integer(1), Expression::integer(3)],
        );
        assert!(expr.is_random());
    }
}
