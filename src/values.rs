use itertools::Itertools;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{ser::SerializeSeq, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Error, PartialEq, Debug)]
pub enum ValueError {
    #[error("null is not a field value")]
    Null,
    #[error("number {0} cannot be represented")]
    Number(String),
    #[error("lists must contain only integers or only strings")]
    MixedList,
    #[error("objects are not field values")]
    Object,
}

/// A cleaned, already type-checked field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(Decimal),
    String(String),
    IntegerList(Vec<i64>),
    StringList(Vec<String>),
    /// Compound value produced by a multi-field combinator (e.g. a range).
    Tuple(Vec<Value>),
}

impl Value {
    /// Whether the value counts as "not submitted".
    ///
    /// Only empty strings, lists and tuples are empty; `0` and `false` are real values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(value) => value.is_empty(),
            Self::IntegerList(values) => values.is_empty(),
            Self::StringList(values) => values.is_empty(),
            Self::Tuple(values) => values.is_empty(),
            Self::Boolean(_) | Self::Integer(_) | Self::Float(_) => false,
        }
    }

    /// The [`FieldKind`] of the value, if a field can hold it.
    #[inline]
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Boolean(_) => Some(FieldKind::Boolean),
            Self::Integer(_) => Some(FieldKind::Integer),
            Self::Float(_) => Some(FieldKind::Float),
            Self::String(_) => Some(FieldKind::String),
            Self::IntegerList(_) => Some(FieldKind::IntegerList),
            Self::StringList(_) => Some(FieldKind::StringList),
            Self::Tuple(_) => None,
        }
    }

    #[inline]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(value) => write!(formatter, "{value}"),
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
            Self::String(value) => write!(formatter, "{value:?}"),
            Self::IntegerList(values) => write!(formatter, "[{}]", values.iter().join(", ")),
            Self::StringList(values) => write!(
                formatter,
                "[{}]",
                values.iter().map(|value| format!("{value:?}")).join(", ")
            ),
            Self::Tuple(values) => write!(formatter, "({})", values.iter().join(", ")),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<i64>> for Value {
    fn from(values: Vec<i64>) -> Self {
        Self::IntegerList(values)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Self::StringList(values)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Boolean(value) => serializer.serialize_bool(*value),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Float(value) => match value.to_f64() {
                Some(float) => serializer.serialize_f64(float),
                None => serializer.serialize_str(&value.to_string()),
            },
            Self::String(value) => serializer.serialize_str(value),
            Self::IntegerList(values) => values.serialize(serializer),
            Self::StringList(values) => values.serialize(serializer),
            Self::Tuple(values) => {
                let mut sequence = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    sequence.serialize_element(value)?;
                }
                sequence.end()
            }
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;

        match value {
            Json::Null => Err(ValueError::Null),
            Json::Bool(value) => Ok(Self::Boolean(value)),
            Json::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    return Ok(Self::Integer(integer));
                }
                number
                    .as_f64()
                    .and_then(Decimal::from_f64_retain)
                    .map(Self::Float)
                    .ok_or_else(|| ValueError::Number(number.to_string()))
            }
            Json::String(value) => Ok(Self::String(value)),
            Json::Array(values) => {
                if values.iter().all(|value| value.is_i64()) {
                    Ok(Self::IntegerList(
                        values.iter().filter_map(serde_json::Value::as_i64).collect(),
                    ))
                } else if values.iter().all(|value| value.is_string()) {
                    Ok(Self::StringList(
                        values
                            .into_iter()
                            .filter_map(|value| match value {
                                Json::String(value) => Some(value),
                                _ => None,
                            })
                            .collect(),
                    ))
                } else {
                    Err(ValueError::MixedList)
                }
            }
            Json::Object(_) => Err(ValueError::Object),
        }
    }
}

/// The declared type of a field.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Boolean,
    Integer,
    Float,
    String,
    IntegerList,
    StringList,
}
