use crate::{fields::FieldId, values::Value};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{
    collections::{btree_map, BTreeMap},
    fmt::{Display, Formatter},
};

/// Key under which errors that concern no single field are grouped.
pub const NON_FIELD_ERRORS: &str = "__all__";

#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedEntry {
    value: Value,
    is_default: bool,
}

impl ValidatedEntry {
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether the value was filled in rather than submitted.
    #[inline]
    pub fn is_default(&self) -> bool {
        self.is_default
    }
}

/// The values that survived validation, in field declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedData {
    names: Vec<String>,
    entries: Vec<Option<ValidatedEntry>>,
}

impl ValidatedData {
    pub(crate) fn new(names: Vec<String>) -> Self {
        let entries = vec![None; names.len()];
        Self { names, entries }
    }

    #[inline]
    pub(crate) fn insert(&mut self, id: FieldId, value: Value, is_default: bool) {
        self.entries[id.0] = Some(ValidatedEntry { value, is_default });
    }

    #[inline]
    pub(crate) fn remove(&mut self, id: FieldId) -> Option<ValidatedEntry> {
        self.entries[id.0].take()
    }

    #[inline]
    pub(crate) fn entry(&self, id: FieldId) -> Option<&ValidatedEntry> {
        self.entries[id.0].as_ref()
    }

    #[inline]
    pub(crate) fn contains_id(&self, id: FieldId) -> bool {
        self.entries[id.0].is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.get_entry(name).map(ValidatedEntry::value)
    }

    pub fn get_entry(&self, name: &str) -> Option<&ValidatedEntry> {
        self.position(name)
            .and_then(|index| self.entries[index].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_entry(name).is_some()
    }

    /// Whether the field holds a filled-in value; `None` when the field is absent.
    pub fn is_default(&self, name: &str) -> Option<bool> {
        self.get_entry(name).map(ValidatedEntry::is_default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.iter_entries()
            .map(|(_, name, entry)| (name, entry.value()))
    }

    pub(crate) fn iter_entries(&self) -> impl Iterator<Item = (FieldId, &str, &ValidatedEntry)> {
        self.names
            .iter()
            .zip(&self.entries)
            .enumerate()
            .filter_map(|(i, (name, entry))| {
                entry.as_ref().map(|entry| (FieldId(i), name.as_str(), entry))
            })
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for ValidatedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The derived backend query parameters, sorted by key.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, Value)> for Parameters {
    fn extend<I: IntoIterator<Item = (String, Value)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Parameters {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationKind {
    /// A required field or constraint had no value and no usable default.
    MissingRequiredField,
    /// An AND constraint was only partially satisfied.
    IncompleteGroup,
    /// A multi-field combinator failed.
    InvalidMultifieldCombination,
}

/// One validation failure, attributed to a field or to the whole form (`field == None`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    pub field: Option<String>,
    pub kind: ViolationKind,
    pub message: String,
}

impl Display for FieldError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let field = self.field.as_deref().unwrap_or(NON_FIELD_ERRORS);
        write!(formatter, "{field}: {}", self.message)
    }
}

/// Append-only collection of the errors raised while evaluating one input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorSink(Vec<FieldError>);

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: Option<&str>, kind: ViolationKind, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.map(str::to_owned),
            kind,
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }
}

/// The outcome of evaluating one input against a [`crate::FormSchema`].
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    validated: ValidatedData,
    parameters: Parameters,
    errors: Vec<FieldError>,
}

impl Evaluation {
    pub(crate) fn new(validated: ValidatedData, parameters: Parameters, errors: ErrorSink) -> Self {
        Self {
            validated,
            parameters,
            errors: errors.into_vec(),
        }
    }

    #[inline]
    pub fn validated(&self) -> &ValidatedData {
        &self.validated
    }

    #[inline]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[inline]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether no error was recorded.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error messages grouped per field; non-field errors are under [`NON_FIELD_ERRORS`].
    pub fn errors_by_field(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            let field = error.field.as_deref().unwrap_or(NON_FIELD_ERRORS);
            grouped
                .entry(field.to_owned())
                .or_default()
                .push(error.message.clone());
        }
        grouped
    }

    pub fn into_parts(self) -> (ValidatedData, Parameters, Vec<FieldError>) {
        (self.validated, self.parameters, self.errors)
    }
}
