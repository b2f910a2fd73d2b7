use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::satisfy,
    combinator::{map, not, value},
    error::context,
    sequence::terminated,
};

use super::token::{ParserResult, Token};

/// Reserved words of the expression language.
///
/// These cannot be used as names of stimulus elements, behaviors, variables
/// or phase line labels.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Keyword {
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "True")]
    True,
    #[strum(serialize = "False")]
    False,
}

impl Keyword {
    pub fn is_reserved(word: &str) -> bool {
        Keyword::try_from(word).is_ok()
    }
}

fn word_end(input: &str) -> ParserResult<()> {
    not(satisfy(|c: char| c.is_alphanumeric() || c == '_'))(input)
}

// Parser for keywords
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_keyword(input: &str) -> ParserResult<Token> {
    context(
        "keyword",
        map(
            terminated(
                alt((
                    value(Keyword::And, tag("and")),
                    value(Keyword::Or, tag("or")),
                    value(Keyword::Not, tag("not")),
                    value(Keyword::True, tag("True")),
                    value(Keyword::False, tag("False")),
                )),
                word_end,
            ),
            Token::Keyword,
        ),
    )(input)
}
