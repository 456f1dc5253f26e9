use crate::{
    ast::Operator,
    error::{CombinatorError, SchemaError},
    evaluation::Parameters,
    fields::FieldDefinition,
    values::Value,
};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter},
    sync::Arc,
};

/// Merge the values of several fields into derived parameters.
///
/// The values are passed in the declared field order.
pub type Combinator =
    Arc<dyn Fn(&[&Value]) -> Result<Parameters, CombinatorError> + Send + Sync>;

/// The output keys of one field: a single key or several.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LookupKeys {
    One(String),
    Many(Vec<String>),
}

impl LookupKeys {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(key) => vec![key],
            Self::Many(keys) => keys,
        }
    }
}

impl From<&str> for LookupKeys {
    fn from(key: &str) -> Self {
        Self::One(key.to_owned())
    }
}

impl From<Vec<&str>> for LookupKeys {
    fn from(keys: Vec<&str>) -> Self {
        Self::Many(keys.into_iter().map(str::to_owned).collect())
    }
}

#[derive(Clone)]
pub struct MultifieldLookup {
    pub(crate) fields: Vec<String>,
    pub(crate) combinator: Combinator,
}

impl Debug for MultifieldLookup {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MultifieldLookup")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// The options of a query form.
///
/// Every option has a builder method; all of them except `multifield_lookups` can also be read
/// from JSON:
///
/// ```rust
/// use query_logic::MetaConfig;
///
/// let meta: MetaConfig = serde_json::from_str(r#"{
///     "lookups": {"year": "publication_date__year", "title": ["title__icontains", "slug"]},
///     "ignore": ["page"],
///     "extralogic": ["genre and (author or title)", "range and year"]
/// }"#).unwrap();
///
/// assert_eq!(2, meta.extralogic().len());
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaConfig {
    lookups: BTreeMap<String, LookupKeys>,
    #[serde(skip)]
    multifield_lookups: Vec<MultifieldLookup>,
    required: Option<Vec<String>>,
    ignore: Vec<String>,
    no_defaults: bool,
    extralogic: Vec<Operator>,
}

impl MetaConfig {
    /// Send the value of `field` to the given output key(s) instead of its own name.
    pub fn with_lookup(mut self, field: &str, keys: impl Into<LookupKeys>) -> Self {
        self.lookups.insert(field.to_owned(), keys.into());
        self
    }

    /// Replace the individual lookups of `fields` by `combinator` when all of them are present.
    pub fn with_multifield<F>(mut self, fields: &[&str], combinator: F) -> Self
    where
        F: Fn(&[&Value]) -> Result<Parameters, CombinatorError> + Send + Sync + 'static,
    {
        self.multifield_lookups.push(MultifieldLookup {
            fields: fields.iter().map(|field| (*field).to_owned()).collect(),
            combinator: Arc::new(combinator),
        });
        self
    }

    /// Make exactly the listed fields required, ignoring the field-level flags.
    pub fn with_required(mut self, fields: &[&str]) -> Self {
        self.required = Some(fields.iter().map(|field| (*field).to_owned()).collect());
        self
    }

    /// Keep `field` out of the derived parameters.
    pub fn with_ignore(mut self, field: &str) -> Self {
        self.ignore.push(field.to_owned());
        self
    }

    /// Never fill absent fields from their defaults.
    pub fn with_no_defaults(mut self, no_defaults: bool) -> Self {
        self.no_defaults = no_defaults;
        self
    }

    /// Add a cross-field constraint.
    pub fn with_constraint(mut self, operator: Operator) -> Self {
        self.extralogic.push(operator);
        self
    }

    /// Add a cross-field constraint written in its textual form (`genre and (author or title)`).
    pub fn with_extralogic(self, expression: &str) -> Result<Self, SchemaError> {
        Ok(self.with_constraint(expression.parse()?))
    }

    #[inline]
    pub fn lookups(&self) -> &BTreeMap<String, LookupKeys> {
        &self.lookups
    }

    #[inline]
    pub fn required(&self) -> Option<&[String]> {
        self.required.as_deref()
    }

    #[inline]
    pub fn ignore(&self) -> &[String] {
        &self.ignore
    }

    #[inline]
    pub fn no_defaults(&self) -> bool {
        self.no_defaults
    }

    #[inline]
    pub fn extralogic(&self) -> &[Operator] {
        &self.extralogic
    }

    #[inline]
    pub(crate) fn multifield_lookups(&self) -> &[MultifieldLookup] {
        &self.multifield_lookups
    }
}

/// A complete form declaration: its fields and its options.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormConfig {
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub meta: MetaConfig,
}

impl FormConfig {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|error| SchemaError::InvalidConfig(error.to_string()))
    }
}
