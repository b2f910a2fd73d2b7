//! # Parser Combinators
//!
//! Building blocks of the expression parser.
//!
//! ## Combinator Types
//!
//! * **Basic Combinators**: `Equal`, `Satisfy`
//! * **Sequential Combinators**: `Delimited`, `Tuple2`
//! * **Alternative Combinators**: `Choice`
//! * **Repetition Combinators**: `Many`, `SeparatedList`
//! * **Transformation Combinators**: `Map`, `AsUnit`
//! * **Error Handling Combinators**: `WithContext`
//! * **Recursion**: `Lazy`

use super::core::ParseError;
use super::core::ParseResult;
use super::core::Parser;
use std::fmt;
use std::marker::PhantomData;

/// Equal: Matches a specific value in the input
///
/// Succeeds if the current input token equals the specified value and
/// consumes one token.
#[derive(Clone)]
pub struct Equal<I> {
    value: I,
}

impl<I> Equal<I> {
    pub fn new(value: I) -> Self {
        Self { value }
    }
}

impl<I: Clone + PartialEq + fmt::Display> Parser<I, I> for Equal<I> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<I> {
        match input.get(pos) {
            Some(found) if *found == self.value => Ok((pos + 1, found.clone())),
            Some(found) => Err(ParseError::Unexpected {
                found: found.to_string(),
                position: pos,
            }),
            None => Err(ParseError::UnexpectedEOF { position: pos }),
        }
    }
}

/// Satisfy: Consumes one token if the closure maps it to a value
#[derive(Clone)]
pub struct Satisfy<I, O, F> {
    f: F,
    _phantom: PhantomData<(I, O)>,
}

impl<I, O, F> Satisfy<I, O, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Parser<I, O> for Satisfy<I, O, F>
where
    I: fmt::Display,
    F: Fn(&I) -> Option<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        match input.get(pos) {
            Some(x) => match (self.f)(x) {
                Some(result) => Ok((pos + 1, result)),
                None => Err(ParseError::Unexpected {
                    found: x.to_string(),
                    position: pos,
                }),
            },
            None => Err(ParseError::UnexpectedEOF { position: pos }),
        }
    }
}

/// Choice: Tries multiple parsers and succeeds with the first successful one
///
/// When every alternative fails, the error that got furthest into the input
/// is returned so that the reported token is the offending one.
pub struct Choice<I, O> {
    parsers: Vec<Box<dyn Parser<I, O>>>,
}

impl<I, O> Choice<I, O> {
    pub fn new(parsers: Vec<Box<dyn Parser<I, O>>>) -> Self {
        Self { parsers }
    }
}

impl<I, O> Parser<I, O> for Choice<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let mut furthest: Option<ParseError> = None;
        for parser in &self.parsers {
            match parser.parse(input, pos) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let replace = furthest
                        .as_ref()
                        .map_or(true, |f| e.get_position() > f.get_position());
                    if replace {
                        furthest = Some(e);
                    }
                }
            }
        }
        Err(furthest.unwrap_or(ParseError::NoAlternative { position: pos }))
    }
}

/// Map: Transforms the output of a parser using a function
#[derive(Clone)]
pub struct Map<P, F, A, B> {
    parser: P,
    f: F,
    _phantom: PhantomData<(A, B)>,
}

impl<P, F, A, B> Map<P, F, A, B> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for Map<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        self.parser
            .parse(input, pos)
            .map(|(pos, value)| (pos, (self.f)(value)))
    }
}

#[derive(Clone)]
pub struct AsUnit<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> AsUnit<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, P, O> Parser<I, ()> for AsUnit<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<()> {
        self.parser.parse(input, pos).map(|(pos, _)| (pos, ()))
    }
}

/// Many: Applies a parser zero or more times
///
/// Always succeeds, collecting results until the inner parser fails.
#[derive(Clone)]
pub struct Many<P, I, O> {
    parser: P,
    _phantom: PhantomData<(I, O)>,
}

impl<P, I, O> Many<P, I, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Vec<O>> for Many<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = pos;

        loop {
            match self.parser.parse(input, current_pos) {
                Ok((new_pos, value)) => {
                    results.push(value);
                    current_pos = new_pos;
                }
                Err(e) => {
                    tracing::trace!(
                        target: "parser::many",
                        error = ?e,
                        position = current_pos,
                        items_collected = results.len(),
                        "Many parser stopped collection"
                    );
                    break;
                }
            }
        }

        Ok((current_pos, results))
    }
}

/// SeparatedList: Parses a possibly empty list of items separated by a delimiter
pub struct SeparatedList<P, S, I, O> {
    item_parser: P,
    separator_parser: S,
    _phantom: PhantomData<(I, O)>,
}

impl<P, S, I, O> SeparatedList<P, S, I, O> {
    pub fn new(item_parser: P, separator_parser: S) -> Self {
        Self {
            item_parser,
            separator_parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P, S> Parser<I, Vec<O>> for SeparatedList<P, S, I, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = pos;

        // 最初の要素をパース（失敗したら空のリストを返す）
        if let Ok((new_pos, value)) = self.item_parser.parse(input, current_pos) {
            results.push(value);
            current_pos = new_pos;

            // 残りの要素を繰り返しパース
            while let Ok((sep_pos, _)) = self.separator_parser.parse(input, current_pos) {
                // カンマの後の要素は必須
                let (new_pos, value) = self.item_parser.parse(input, sep_pos)?;
                results.push(value);
                current_pos = new_pos;
            }
        }

        Ok((current_pos, results))
    }
}

#[derive(Clone)]
pub struct Tuple2<P1, P2, I, O1, O2> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<(I, O1, O2)>,
}

impl<P1, P2, I, O1, O2> Tuple2<P1, P2, I, O1, O2> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, I, O1, O2> Parser<I, (O1, O2)> for Tuple2<P1, P2, I, O1, O2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2)> {
        let (pos, result1) = self.parser1.parse(input, pos)?;
        let (pos, result2) = self.parser2.parse(input, pos)?;
        Ok((pos, (result1, result2)))
    }
}

/// Delimited: Parses content between left and right delimiters
#[derive(Clone)]
pub struct Delimited<L, P, R, I, O> {
    left: L,
    parser: P,
    right: R,
    _phantom: PhantomData<(I, O)>,
}

impl<L, P, R, I, O> Delimited<L, P, R, I, O> {
    pub fn new(left: L, parser: P, right: R) -> Self {
        Self {
            left,
            parser,
            right,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, L, P, R> Parser<I, O> for Delimited<L, P, R, I, O>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, _) = self.left.parse(input, pos)?;
        let (pos, value) = self.parser.parse(input, pos)?;
        let (pos, _) = self.right.parse(input, pos)?;
        Ok((pos, value))
    }
}

#[derive(Clone)]
pub struct WithContext<P, C> {
    parser: P,
    context: C,
}

impl<P, C> WithContext<P, C> {
    pub fn new(parser: P, context: C) -> Self {
        Self { parser, context }
    }
}

impl<I, O, P, C: ToString> Parser<I, O> for WithContext<P, C>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.parser
            .parse(input, pos)
            .map_err(|e| ParseError::WithContext {
                message: self.context.to_string(),
                inner: Box::new(e),
            })
    }
}

#[derive(Clone)]
pub struct Lazy<F> {
    f: F,
}

impl<F> Lazy<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<I, O, F, P> Parser<I, O> for Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (self.f)().parse(input, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit(d: i32) -> Satisfy<i32, i32, impl Fn(&i32) -> Option<i32> + Clone> {
        Satisfy::new(move |x: &i32| if *x == d { Some(*x) } else { None })
    }

    #[test]
    fn test_equal() {
        let input = vec![1, 2, 3];

        // 成功するケース
        assert_eq!(Equal::new(2).parse(&input, 1), Ok((2, 2)));

        // 失敗するケース
        assert_eq!(
            Equal::new(2).parse(&input, 0),
            Err(ParseError::Unexpected {
                found: "1".to_string(),
                position: 0
            })
        );
        assert_eq!(
            Equal::new(2).parse(&input, 3),
            Err(ParseError::UnexpectedEOF { position: 3 })
        );
    }

    #[test]
    fn test_satisfy() {
        let input = vec![1, 2, 3, 4, 5];

        let parser = Satisfy::new(|x: &i32| if *x % 2 == 0 { Some(*x) } else { None });
        assert_eq!(parser.parse(&input, 1), Ok((2, 2)));
        assert!(parser.parse(&input, 0).is_err());
        assert_eq!(
            parser.parse(&input, 5),
            Err(ParseError::UnexpectedEOF { position: 5 })
        );
    }

    #[test]
    fn test_choice() {
        let input = vec![1, 2, 3];

        // 成功するケース (2番目のパーサーが成功)
        let choice_parser: Choice<i32, i32> = Choice::new(vec![
            Box::new(digit(2)),
            Box::new(digit(1)),
        ]);
        assert_eq!(choice_parser.parse(&input, 0), Ok((1, 1)));

        // 失敗するケース (すべてのパーサーが失敗)
        let choice_parser: Choice<i32, i32> = Choice::new(vec![]);
        assert_eq!(
            choice_parser.parse(&input, 0),
            Err(ParseError::NoAlternative { position: 0 })
        );
    }

    #[test]
    fn test_choice_reports_furthest_error() {
        let input = vec![1, 2, 9];
        let pair = Map::new(Tuple2::new(digit(1), Tuple2::new(digit(2), digit(3))), |(a, (b, c))| a + b + c);
        let choice_parser: Choice<i32, i32> =
            Choice::new(vec![Box::new(digit(5)), Box::new(pair)]);
        assert_eq!(choice_parser.parse(&input, 0).unwrap_err().get_position(), 2);
    }

    #[test]
    fn test_many_and_separated_list() {
        let input = vec![1, 1, 1, 2];
        assert_eq!(Many::new(digit(1)).parse(&input, 0), Ok((3, vec![1, 1, 1])));
        assert_eq!(Many::new(digit(2)).parse(&input, 0), Ok((0, vec![])));

        let input = vec![1, 0, 1, 0, 1];
        let list = SeparatedList::new(digit(1), AsUnit::new(digit(0)));
        assert_eq!(list.parse(&input, 0), Ok((5, vec![1, 1, 1])));

        // 区切り文字の後に要素がない
        let input = vec![1, 0];
        assert!(list.parse(&input, 0).is_err());
    }

    #[test]
    fn test_delimited() {
        let input = vec![7, 1, 8];
        let parser = Delimited::new(AsUnit::new(digit(7)), digit(1), AsUnit::new(digit(8)));
        assert_eq!(parser.parse(&input, 0), Ok((3, 1)));
        assert!(parser.parse(&input, 1).is_err());
    }

    #[test]
    fn test_with_context() {
        let input = vec![1];
        let parser = WithContext::new(digit(2), "two");
        let err = parser.parse(&input, 0).unwrap_err();
        assert!(matches!(err, ParseError::WithContext { ref message, .. } if message == "two"));
        assert!(matches!(err.root_cause(), ParseError::Unexpected { .. }));
    }
}
