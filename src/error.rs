use crate::{lexer::LexicalError, values::FieldKind};
use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum ParserError {
    #[error("failed to lex the expression with {0:?}")]
    Lexical(LexicalError),
    #[error("a constraint must combine fields with `and` or `or`, found the bare field '{0}'")]
    BareField(String),
}

/// Errors raised while declaring a [`crate::FormSchema`].
#[derive(Debug, PartialEq, Error)]
pub enum SchemaError {
    #[error("field {0} has already been defined")]
    AlreadyPresent(String),
    #[error("configuration refers to non-existing field '{0}'")]
    UnknownField(String),
    #[error("field '{0}' appears twice among the operands of the same constraint")]
    DuplicateOperand(String),
    #[error("a constraint needs at least one operand")]
    EmptyOperator,
    #[error("failed to parse the constraint '{expression}': {reason}")]
    Parse { expression: String, reason: String },
    #[error("invalid default for field '{field}': {reason}")]
    InvalidDefault { field: String, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised while building a [`crate::CleanedInput`].
#[derive(Error, PartialEq, Debug)]
pub enum InputError {
    #[error("input refers to non-existing field '{0}'")]
    NonExistingField(String),
    #[error("{name:?}: wrong types => expected: {expected:?}, found: {actual:?}")]
    WrongType {
        name: String,
        expected: FieldKind,
        actual: Option<FieldKind>,
    },
}

/// Failure reported by a multi-field combinator; its message is reported verbatim.
#[derive(Error, PartialEq, Debug, Clone)]
#[error("{0}")]
pub struct CombinatorError(pub String);

impl CombinatorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
