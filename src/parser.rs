use crate::{
    ast::{Node, Operator},
    error::ParserError,
    lexer::{Lexer, Token},
};
use lalrpop_util::{lalrpop_mod, ParseError};

lalrpop_mod!(grammar);

use self::grammar::TreeParser;

pub type ConstraintParseError<'a> = ParseError<usize, Token<'a>, ParserError>;

#[inline]
pub fn parse(input: &str) -> Result<Operator, ConstraintParseError<'_>> {
    let lexer = Lexer::new(input);
    TreeParser::new().parse(lexer)
}

pub(crate) fn into_operator<'a>(node: Node) -> Result<Operator, ConstraintParseError<'a>> {
    match node {
        Node::Operator(operator) => Ok(operator),
        Node::Field(name) => Err(ParseError::User {
            error: ParserError::BareField(name),
        }),
    }
}
