use crate::{
    evaluation::Evaluation,
    fields::CleanedInput,
    schema::FormSchema,
    values::Value,
};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// An existing object whose attributes seed the initial values of a form.
pub trait Record {
    /// The current value of `field`, if the record has one.
    fn value(&self, field: &str) -> Option<Value>;
}

impl Record for HashMap<String, Value> {
    fn value(&self, field: &str) -> Option<Value> {
        self.get(field).cloned()
    }
}

impl Record for BTreeMap<String, Value> {
    fn value(&self, field: &str) -> Option<Value> {
        self.get(field).cloned()
    }
}

/// One request-scoped use of a [`FormSchema`].
///
/// Values taken from a bound record stand in for absent fields the same way declared defaults
/// do, and take precedence over them.
///
/// ```rust
/// use query_logic::{FieldDefinition, FormSchema, MetaConfig, QueryForm, Value};
/// use std::collections::HashMap;
///
/// let schema = FormSchema::declare(
///     &[FieldDefinition::string("title"), FieldDefinition::integer("page").with_default(1)],
///     MetaConfig::default(),
/// )
/// .unwrap();
/// let record = HashMap::from([("page".to_owned(), Value::Integer(4))]);
///
/// let evaluation = QueryForm::new(&schema)
///     .with_record(&record)
///     .evaluate(&schema.make_input().build());
///
/// assert_eq!(Some(&Value::Integer(4)), evaluation.parameters().get("page"));
/// ```
#[derive(Clone, Debug)]
pub struct QueryForm<'schema> {
    schema: &'schema FormSchema,
    initial: Vec<Option<Value>>,
}

impl<'schema> QueryForm<'schema> {
    pub fn new(schema: &'schema FormSchema) -> Self {
        Self {
            schema,
            initial: vec![None; schema.fields().len()],
        }
    }

    /// Seed the initial values from `record`.
    ///
    /// Record values whose kind does not match the declared field are skipped.
    pub fn with_record<R: Record + ?Sized>(mut self, record: &R) -> Self {
        for (id, definition) in self.schema.fields().iter() {
            let Some(value) = record.value(definition.name()) else {
                continue;
            };
            if value.kind() == Some(definition.kind()) {
                self.initial[id.0] = Some(value);
            } else {
                warn!(
                    field = definition.name(),
                    expected = ?definition.kind(),
                    %value,
                    "ignored record value of the wrong kind"
                );
            }
        }
        self
    }

    /// The value seeded for `field`, if any.
    pub fn initial(&self, field: &str) -> Option<&Value> {
        self.schema
            .fields()
            .by_name(field)
            .and_then(|id| self.initial[id.0].as_ref())
    }

    #[inline]
    pub fn schema(&self) -> &'schema FormSchema {
        self.schema
    }

    /// Validate `input` and derive its parameters.
    pub fn evaluate(&self, input: &CleanedInput) -> Evaluation {
        self.schema.run(input, &self.initial)
    }
}
