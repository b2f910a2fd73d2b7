use super::{
    super::{core::*, prelude::*},
    common::*,
};
use crate::ast;
use crate::tokenizer::{keyword::Keyword, symbol::Operator, token::Token};

pub fn parse_expression() -> impl Parser<Token, ast::Expression> {
    with_context(lazy(parse_binary_expression), "expression")
}

pub fn parse_binary_expression() -> impl Parser<Token, ast::Expression> {
    with_context(parse_logical_or(), "binary expression")
}

fn fold_binary(
    (first, rest): (ast::Expression, Vec<(ast::BinaryOperator, ast::Expression)>),
) -> ast::Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| ast::Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
}

fn parse_logical_or() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_and(),
                many(tuple2(parse_operator_or(), parse_logical_and())),
            ),
            fold_binary,
        ),
        "logical or",
    )
}

fn parse_logical_and() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_not(),
                many(tuple2(parse_operator_and(), parse_logical_not())),
            ),
            fold_binary,
        ),
        "logical and",
    )
}

// 否定は比較より弱く結合する (not x = 1 は not (x = 1))
fn parse_logical_not() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(many(parse_operator_not()), parse_comparison()),
            |(nots, operand)| wrap_unary(ast::UnaryOperator::Not, nots.len(), operand),
        ),
        "logical not",
    )
}

fn wrap_unary(op: ast::UnaryOperator, count: usize, operand: ast::Expression) -> ast::Expression {
    (0..count).fold(operand, |operand, _| ast::Expression::UnaryOp {
        op,
        operand: Box::new(operand),
    })
}

fn parse_comparison() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_additive(),
                many(tuple2(parse_operator_comparison(), parse_additive())),
            ),
            fold_binary,
        ),
        "comparison",
    )
}

fn parse_operator_comparison() -> impl Parser<Token, ast::BinaryOperator> {
    with_context(
        choice(vec![
            Box::new(parse_comparison_equal()),
            Box::new(parse_comparison_not_equal()),
            Box::new(parse_comparison_greater()),
            Box::new(parse_comparison_greater_equal()),
            Box::new(parse_comparison_less()),
            Box::new(parse_comparison_less_equal()),
        ]),
        "comparison operator",
    )
}

fn parse_operator_or() -> impl Parser<Token, ast::BinaryOperator> {
    satisfy(|token| match token {
        Token::Operator(Operator::Or) | Token::Keyword(Keyword::Or) => {
            Some(ast::BinaryOperator::Or)
        }
        _ => None,
    })
}

fn parse_operator_and() -> impl Parser<Token, ast::BinaryOperator> {
    satisfy(|token| match token {
        Token::Operator(Operator::And) | Token::Keyword(Keyword::And) => {
            Some(ast::BinaryOperator::And)
        }
        _ => None,
    })
}

fn parse_operator_not() -> impl Parser<Token, Token> {
    with_context(
        satisfy(|token| match token {
            Token::Operator(Operator::Not) | Token::Keyword(Keyword::Not) => Some(token.clone()),
            _ => None,
        }),
        "not operator",
    )
}

fn parse_comparison_equal() -> impl Parser<Token, ast::BinaryOperator> {
    satisfy(|token| match token {
        Token::Operator(Operator::EqualEqual) | Token::Operator(Operator::Equal) => {
            Some(ast::BinaryOperator::Equal)
        }
        _ => None,
    })
}

fn parse_comparison_not_equal() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::NotEqual)), |_| {
        ast::BinaryOperator::NotEqual
    })
}

fn parse_comparison_greater() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::Greater)), |_| {
        ast::BinaryOperator::GreaterThan
    })
}

fn parse_comparison_greater_equal() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::GreaterEqual)), |_| {
        ast::BinaryOperator::GreaterThanEqual
    })
}

fn parse_comparison_less() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::Less)), |_| {
        ast::BinaryOperator::LessThan
    })
}

fn parse_comparison_less_equal() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::LessEqual)), |_| {
        ast::BinaryOperator::LessThanEqual
    })
}

fn parse_additive() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_multiplicative(),
                many(tuple2(
                    choice(vec![
                        Box::new(parse_operator_add()),
                        Box::new(parse_operator_subtract()),
                    ]),
                    parse_multiplicative(),
                )),
            ),
            fold_binary,
        ),
        "additive",
    )
}

fn parse_operator_add() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::Plus)), |_| {
        ast::BinaryOperator::Add
    })
}

fn parse_operator_subtract() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::Minus)), |_| {
        ast::BinaryOperator::Subtract
    })
}

// 乗除算 (*, /)
fn parse_multiplicative() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_unary(),
                many(tuple2(
                    choice(vec![
                        Box::new(parse_operator_multiply()),
                        Box::new(parse_operator_divide()),
                    ]),
                    parse_unary(),
                )),
            ),
            fold_binary,
        ),
        "multiplicative",
    )
}

fn parse_operator_multiply() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::Multiply)), |_| {
        ast::BinaryOperator::Multiply
    })
}

fn parse_operator_divide() -> impl Parser<Token, ast::BinaryOperator> {
    map(equal(Token::Operator(Operator::Divide)), |_| {
        ast::BinaryOperator::Divide
    })
}

fn parse_unary() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(many(parse_operator_minus()), parse_primary()),
            |(minuses, operand)| wrap_unary(ast::UnaryOperator::Minus, minuses.len(), operand),
        ),
        "unary",
    )
}

fn parse_operator_minus() -> impl Parser<Token, Token> {
    with_context(equal(Token::Operator(Operator::Minus)), "minus operator")
}

fn parse_primary() -> impl Parser<Token, ast::Expression> {
    with_context(
        choice(vec![
            Box::new(parse_function_call()),
            Box::new(map(parse_literal(), ast::Expression::Literal)),
            Box::new(map(parse_identifier(), ast::Expression::Variable)),
            Box::new(parse_list()),
            Box::new(parse_parenthesized()),
        ]),
        "primary",
    )
}

fn parse_function_call() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_identifier(),
                delimited(
                    as_unit(parse_open_paren()),
                    separated_list(parse_expression(), as_unit(parse_comma())),
                    as_unit(parse_close_paren()),
                ),
            ),
            |(function, arguments)| ast::Expression::FunctionCall {
                function,
                arguments,
            },
        ),
        "function call",
    )
}

fn parse_list() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            delimited(
                as_unit(parse_open_bracket()),
                separated_list(parse_expression(), as_unit(parse_comma())),
                as_unit(parse_close_bracket()),
            ),
            ast::Expression::List,
        ),
        "list",
    )
}

fn parse_parenthesized() -> impl Parser<Token, ast::Expression> {
    with_context(
        delimited(
            as_unit(parse_open_paren()),
            parse_expression(),
            as_unit(parse_close_paren()),
        ),
        "parenthesized expression",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parsers::parse_expression_text;
    use ast::{BinaryOperator, Expression, UnaryOperator};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_precedence() {
        let expr = parse_expression_text("1 + 2 * x").unwrap();
        assert_eq!(
            expr,
            Expression::binary(
                BinaryOperator::Add,
                Expression::integer(1),
                Expression::binary(
                    BinaryOperator::Multiply,
                    Expression::integer(2),
                    Expression::variable("x"),
                ),
            )
        );
    }

    #[test]
    fn test_single_equal_is_comparison() {
        let expr = parse_expression_text("s=2").unwrap();
        assert_eq!(
            expr,
            Expression::binary(
                BinaryOperator::Equal,
                Expression::variable("s"),
                Expression::integer(2),
            )
        );
    }

    #[test]
    fn test_not_binds_weaker_than_comparison() {
        let expr = parse_expression_text("not x = 1").unwrap();
        assert_eq!(
            expr,
            Expression::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(Expression::binary(
                    BinaryOperator::Equal,
                    Expression::variable("x"),
                    Expression::integer(1),
                )),
            }
        );
    }

    #[test]
    fn test_word_and_symbol_connectives() {
        let words = parse_expression_text("a and b or c").unwrap();
        let symbols = parse_expression_text("a && b || c").unwrap();
        assert_eq!(words, symbols);
    }

    #[test]
    fn test_function_calls_and_lists() {
        let expr = parse_expression_text("choice([1, 2], [0.5, 0.5])").unwrap();
        assert_eq!(
            expr,
            Expression::call(
                "choice",
                vec![
                    Expression::List(vec![Expression::integer(1), Expression::integer(2)]),
                    Expression::List(vec![Expression::float(0.5), Expression::float(0.5)]),
                ],
            )
        );

        let expr = parse_expression_text("count_line()").unwrap();
        assert_eq!(expr, Expression::call("count_line", vec![]));
    }

    #[test]
    fn test_unary_minus_and_parentheses() {
        let expr = parse_expression_text("-(a - 1)").unwrap();
        assert_eq!(
            expr,
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                operand: Box::new(Expression::binary(
                    BinaryOperator::Subtract,
                    Expression::variable("a"),
                    Expression::integer(1),
                )),
            }
        );
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        assert!(parse_expression_text("a b").is_err());
        assert!(parse_expression_text("(a").is_err());
        assert!(parse_expression_text("").is_err());
        assert!(parse_expression_text("rand(1,)").is_err());
    }
}
