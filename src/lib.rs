//! Cross-field validation and query-parameter derivation for search forms.
//!
//! A [`FormSchema`] declares the fields of a search form, how each field maps to the parameters
//! of a backend query and which combinations of fields make sense together. Each request is then
//! validated against the schema, which produces the validated values, the derived query
//! parameters and the errors to report back to the user.
//!
//! # Examples
//!
//! Declaring a book search form and evaluating a request:
//!
//! ```
//! use query_logic::{FieldDefinition, FormSchema, MetaConfig, Parameters, Value};
//!
//! let fields = [
//!     FieldDefinition::integer("year"),
//!     FieldDefinition::integer("range").with_default(1),
//!     FieldDefinition::string("title"),
//!     FieldDefinition::integer("author"),
//! ];
//! let meta = MetaConfig::default()
//!     .with_lookup("title", "title__icontains")
//!     .with_lookup("author", "author_id")
//!     .with_multifield(&["year", "range"], |values: &[&Value]| {
//!         let year = values[0].as_integer().unwrap_or_default();
//!         let range = values[1].as_integer().unwrap_or_default();
//!         Ok(Parameters::from_iter([(
//!             "publication_date__year__range".to_owned(),
//!             Value::Tuple(vec![(year - range).into(), (year + range).into()]),
//!         )]))
//!     })
//!     .with_extralogic("author or title")
//!     .and_then(|meta| meta.with_extralogic("range and year"))
//!     .unwrap();
//! let schema = FormSchema::declare(&fields, meta).unwrap();
//!
//! let mut builder = schema.make_input();
//! builder.with_integer("year", 2000).unwrap();
//! builder.with_string("title", "Dune").unwrap();
//! let evaluation = schema.evaluate(&builder.build());
//!
//! assert!(evaluation.is_valid());
//! assert_eq!(
//!     r#"{"publication_date__year__range":[1999,2001],"title__icontains":"Dune"}"#,
//!     serde_json::to_string(evaluation.parameters()).unwrap()
//! );
//! ```
//!
//! # Constraint language
//!
//! Cross-field constraints are written as boolean expressions over field presence:
//!
//! * `and` (`&&`) requires either every operand or none of them;
//! * `or` (`||`) keeps the first present operand and drops the others;
//! * `required(...)` makes a constraint mandatory and `optional(...)` makes it optional;
//! * parentheses group sub-expressions; `and` binds tighter than `or`.
//!
//! ```text
//! genre and (author or title)
//! required(year or decade or century)
//! optional(latitude and longitude)
//! ```
//!
//! # Defaults
//!
//! A field that is not submitted falls back to its record value (see [`QueryForm::with_record`])
//! or to its declared default. Such values take part in the constraints like submitted ones, but
//! they are silently dropped when they would break a constraint on their own.
mod ast;
mod config;
mod constraints;
mod error;
mod evaluation;
mod fields;
mod form;
mod lexer;
mod parser;
mod schema;
#[cfg(test)]
mod test_utils;
mod values;

pub use crate::{
    ast::{and, or, Node, Operator, OperatorKind},
    config::{Combinator, FormConfig, LookupKeys, MetaConfig},
    constraints::{ConstraintNode, ConstraintViolation, Constraints, FieldRef, NodeId, Operand},
    error::{CombinatorError, InputError, ParserError, SchemaError},
    evaluation::{
        ErrorSink, Evaluation, FieldError, Parameters, ValidatedData, ValidatedEntry,
        ViolationKind, NON_FIELD_ERRORS,
    },
    fields::{
        CleanedInput, FieldDefault, FieldDefinition, FieldId, FieldTable, InputBuilder,
    },
    form::{QueryForm, Record},
    schema::FormSchema,
    lexer::LexicalError,
    values::{FieldKind, Value, ValueError},
};
