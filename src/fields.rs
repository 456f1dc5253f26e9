use crate::{
    error::{InputError, SchemaError},
    values::{FieldKind, Value},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{
    collections::HashMap,
    fmt::{Debug, Display, Formatter},
    ops::Index,
    sync::Arc,
};

/// A field default, either a fixed value or a function called at evaluation time.
#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    Lazy(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl FieldDefault {
    #[inline]
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Lazy(function) => function(),
        }
    }
}

impl Debug for FieldDefault {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => formatter.debug_tuple("Value").field(value).finish(),
            Self::Lazy(_) => formatter.write_str("Lazy(..)"),
        }
    }
}

/// The definition of one named input slot of a form
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawFieldDefinition")]
pub struct FieldDefinition {
    name: String,
    kind: FieldKind,
    required: bool,
    default: Option<FieldDefault>,
}

impl FieldDefinition {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            required: false,
            default: None,
        }
    }

    /// Create a boolean field definition.
    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Create an integer field definition.
    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Create a float field definition.
    pub fn float(name: &str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    /// Create a string field definition.
    pub fn string(name: &str) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// Create a list of integers field definition.
    pub fn integer_list(name: &str) -> Self {
        Self::new(name, FieldKind::IntegerList)
    }

    /// Create a list of strings field definition.
    pub fn string_list(name: &str) -> Self {
        Self::new(name, FieldKind::StringList)
    }

    /// Mark the field as mandatory.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Use `value` when the field is not submitted.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Compute the default each time the field is not submitted.
    pub fn with_lazy_default<F>(mut self, function: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::Lazy(Arc::new(function)));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[inline]
    pub fn default(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFieldDefinition {
    name: String,
    kind: FieldKind,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
}

impl TryFrom<RawFieldDefinition> for FieldDefinition {
    type Error = SchemaError;

    fn try_from(raw: RawFieldDefinition) -> Result<Self, Self::Error> {
        let default = raw
            .default
            .map(|value| {
                Value::try_from(value).map_err(|error| SchemaError::InvalidDefault {
                    field: raw.name.clone(),
                    reason: error.to_string(),
                })
            })
            .transpose()?;
        if let Some(value) = &default {
            if value.kind() != Some(raw.kind) {
                return Err(SchemaError::InvalidDefault {
                    field: raw.name,
                    reason: format!("expected {:?}, found {value}", raw.kind),
                });
            }
        }

        Ok(Self {
            name: raw.name,
            kind: raw.kind,
            required: raw.required,
            default: default.map(FieldDefault::Value),
        })
    }
}

#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Debug, Hash)]
pub struct FieldId(pub(crate) usize);

impl Display for FieldId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "field({})", self.0)
    }
}

/// The declared fields of a form, in declaration order.
#[derive(Clone, Debug)]
pub struct FieldTable {
    by_names: HashMap<String, FieldId>,
    by_ids: Vec<FieldDefinition>,
}

impl FieldTable {
    pub fn new(definitions: &[FieldDefinition]) -> Result<Self, SchemaError> {
        let size = definitions.len();
        let mut by_names = HashMap::with_capacity(size);
        let mut by_ids = Vec::with_capacity(size);
        for (i, definition) in definitions.iter().enumerate() {
            let name = definition.name.to_owned();
            if by_names.contains_key(&name) {
                return Err(SchemaError::AlreadyPresent(name));
            }
            if let Some(FieldDefault::Value(value)) = &definition.default {
                if value.kind() != Some(definition.kind) {
                    return Err(SchemaError::InvalidDefault {
                        field: name,
                        reason: format!("expected {:?}, found {value}", definition.kind),
                    });
                }
            }

            by_names.insert(name, FieldId(i));
            by_ids.push(definition.clone());
        }

        Ok(Self { by_names, by_ids })
    }

    #[inline]
    pub fn by_name(&self, name: &str) -> Option<FieldId> {
        self.by_names.get(name).copied()
    }

    #[inline]
    pub fn resolve(&self, name: &str) -> Result<FieldId, SchemaError> {
        self.by_name(name)
            .ok_or_else(|| SchemaError::UnknownField(name.to_owned()))
    }

    #[inline]
    pub fn by_id(&self, id: FieldId) -> &FieldDefinition {
        &self.by_ids[id.0]
    }

    #[inline]
    pub fn name(&self, id: FieldId) -> &str {
        &self.by_ids[id.0].name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldDefinition)> {
        self.by_ids
            .iter()
            .enumerate()
            .map(|(i, definition)| (FieldId(i), definition))
    }
}

/// A [`CleanedInput`] builder
///
/// Every field starts out absent; fields that are never assigned stay absent.
#[derive(Debug)]
pub struct InputBuilder<'schema> {
    by_ids: Vec<Option<Value>>,
    fields: &'schema FieldTable,
}

impl<'schema> InputBuilder<'schema> {
    pub(crate) fn new(fields: &'schema FieldTable) -> Self {
        Self {
            fields,
            by_ids: vec![None; fields.len()],
        }
    }

    /// Build the corresponding [`CleanedInput`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use query_logic::{FieldDefinition, FormSchema, MetaConfig};
    ///
    /// let schema = FormSchema::declare(
    ///     &[FieldDefinition::integer("year"), FieldDefinition::string("title")],
    ///     MetaConfig::default(),
    /// )
    /// .unwrap();
    ///
    /// let mut builder = schema.make_input();
    /// builder.with_integer("year", 2000).unwrap();
    ///
    /// // `title` stays absent since it was not set by the builder
    /// let input = builder.build();
    /// ```
    pub fn build(self) -> CleanedInput {
        CleanedInput(self.by_ids)
    }

    /// Set the specified boolean field.
    pub fn with_boolean(&mut self, name: &str, value: bool) -> Result<(), InputError> {
        self.with_value(name, Value::Boolean(value))
    }

    /// Set the specified integer field.
    pub fn with_integer(&mut self, name: &str, value: i64) -> Result<(), InputError> {
        self.with_value(name, Value::Integer(value))
    }

    /// Set the specified float field.
    pub fn with_float(&mut self, name: &str, number: i64, scale: u32) -> Result<(), InputError> {
        self.with_value(name, Value::Float(Decimal::new(number, scale)))
    }

    /// Set the specified string field.
    pub fn with_string(&mut self, name: &str, value: &str) -> Result<(), InputError> {
        self.with_value(name, Value::String(value.to_owned()))
    }

    /// Set the specified list of integers field.
    pub fn with_integer_list(&mut self, name: &str, values: &[i64]) -> Result<(), InputError> {
        self.with_value(name, Value::IntegerList(values.to_vec()))
    }

    /// Set the specified list of strings field.
    pub fn with_string_list(&mut self, name: &str, values: &[&str]) -> Result<(), InputError> {
        let values = values.iter().map(|value| (*value).to_owned()).collect();
        self.with_value(name, Value::StringList(values))
    }

    /// Mark the specified field as not submitted.
    pub fn with_absent(&mut self, name: &str) -> Result<(), InputError> {
        let index = self
            .fields
            .by_name(name)
            .ok_or_else(|| InputError::NonExistingField(name.to_owned()))?;
        self.by_ids[index.0] = None;
        Ok(())
    }

    /// Set the specified field to an already-typed value.
    ///
    /// The field must exist and its declared kind must match the value.
    pub fn with_value(&mut self, name: &str, value: Value) -> Result<(), InputError> {
        let index = self
            .fields
            .by_name(name)
            .ok_or_else(|| InputError::NonExistingField(name.to_owned()))?;
        let expected = self.fields.by_id(index).kind();
        match value.kind() {
            Some(actual) if actual == expected => {
                self.by_ids[index.0] = Some(value);
                Ok(())
            }
            actual => Err(InputError::WrongType {
                name: name.to_owned(),
                expected,
                actual,
            }),
        }
    }
}

/// The type-checked values submitted for one request, indexed by field.
#[derive(Clone, Debug, PartialEq)]
pub struct CleanedInput(Vec<Option<Value>>);

impl CleanedInput {
    /// The submitted value of a field, `None` when it was not submitted.
    #[inline]
    pub fn get(&self, id: FieldId) -> Option<&Value> {
        self.0.get(id.0).and_then(Option::as_ref)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<FieldId> for CleanedInput {
    type Output = Option<Value>;

    #[inline]
    fn index(&self, index: FieldId) -> &Self::Output {
        &self.0[index.0]
    }
}
