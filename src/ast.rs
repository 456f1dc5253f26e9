use crate::{error::SchemaError, parser};
use itertools::Itertools;
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum OperatorKind {
    And,
    Or,
}

impl Display for OperatorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => formatter.write_str("AND"),
            Self::Or => formatter.write_str("OR"),
        }
    }
}

/// One operand of a declared constraint: a field name or a nested operator.
#[derive(PartialEq, Clone, Debug)]
pub enum Node {
    Field(String),
    Operator(Operator),
}

impl Node {
    /// Number of field leaves under the node.
    pub fn len(&self) -> usize {
        match self {
            Self::Field(_) => 1,
            Self::Operator(operator) => operator.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Node {
    fn from(name: &str) -> Self {
        Self::Field(name.to_owned())
    }
}

impl From<String> for Node {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

impl From<Operator> for Node {
    fn from(operator: Operator) -> Self {
        Self::Operator(operator)
    }
}

impl Display for Node {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => formatter.write_str(name),
            Self::Operator(operator) => write!(formatter, "{operator}"),
        }
    }
}

/// A declared AND/OR constraint over field presence.
///
/// Operators can be built with [`and`] and [`or`] or parsed from their textual form:
///
/// ```rust
/// use query_logic::{and, or, Node, Operator};
///
/// let parsed: Operator = "c and (d or e) and a".parse().unwrap();
/// let built = and([Node::from("c"), or(["d", "e"]).into(), "a".into()]);
///
/// assert_eq!(built, parsed);
/// assert_eq!("( c AND ( d OR e ) AND a )", parsed.to_string());
/// ```
#[derive(PartialEq, Clone, Debug, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct Operator {
    kind: OperatorKind,
    operands: Vec<Node>,
    required: Option<bool>,
}

impl Operator {
    pub fn new(kind: OperatorKind, operands: Vec<Node>) -> Self {
        Self {
            kind,
            operands,
            required: None,
        }
    }

    /// Override whether the constraint is mandatory.
    ///
    /// Without an override, an AND is mandatory when any of its operands is and an OR never is.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    #[inline]
    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    #[inline]
    pub fn operands(&self) -> &[Node] {
        &self.operands
    }

    #[inline]
    pub fn required_override(&self) -> Option<bool> {
        self.required
    }

    /// Number of field leaves under the operator.
    pub fn len(&self) -> usize {
        self.operands.iter().map(Node::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for Operator {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let separator = format!(" {} ", self.kind);
        write!(
            formatter,
            "( {} )",
            self.operands.iter().map(Node::to_string).join(&separator)
        )
    }
}

impl FromStr for Operator {
    type Err = SchemaError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        parser::parse(expression).map_err(|error| SchemaError::Parse {
            expression: expression.to_owned(),
            reason: error.to_string(),
        })
    }
}

impl TryFrom<String> for Operator {
    type Error = SchemaError;

    fn try_from(expression: String) -> Result<Self, Self::Error> {
        expression.parse()
    }
}

/// Build an AND constraint: all operands or none of them.
pub fn and<I, N>(operands: I) -> Operator
where
    I: IntoIterator<Item = N>,
    N: Into<Node>,
{
    Operator::new(
        OperatorKind::And,
        operands.into_iter().map(Into::into).collect(),
    )
}

/// Build an OR constraint: the first present operand wins.
pub fn or<I, N>(operands: I) -> Operator
where
    I: IntoIterator<Item = N>,
    N: Into<Node>,
{
    Operator::new(
        OperatorKind::Or,
        operands.into_iter().map(Into::into).collect(),
    )
}
