use crate::{
    ast::OperatorKind,
    config::{Combinator, FormConfig, MetaConfig},
    constraints::{ConstraintNode, ConstraintViolation, Constraints, NodeId},
    error::SchemaError,
    evaluation::{ErrorSink, Evaluation, Parameters, ValidatedData, ValidatedEntry, ViolationKind},
    fields::{CleanedInput, FieldDefault, FieldDefinition, FieldId, FieldTable, InputBuilder},
    form::QueryForm,
    values::Value,
};
use std::fmt::{Debug, Formatter};
use tracing::{debug, warn};

const REQUIRED_MESSAGE: &str = "This field is required.";

#[derive(Clone)]
struct DeclaredMultifield {
    fields: Vec<FieldId>,
    combinator: Combinator,
}

impl Debug for DeclaredMultifield {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DeclaredMultifield")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// The immutable description of a query form: its fields, lookups and constraints.
///
/// A schema is declared once and evaluated against any number of inputs, from any number of
/// threads.
///
/// # Examples
///
/// ```rust
/// use query_logic::{FieldDefinition, FormSchema, MetaConfig, Value};
///
/// let fields = [
///     FieldDefinition::integer("year"),
///     FieldDefinition::integer("range").with_default(1),
/// ];
/// let meta = MetaConfig::default()
///     .with_lookup("year", "publication_date__year")
///     .with_extralogic("range and year")
///     .unwrap();
/// let schema = FormSchema::declare(&fields, meta).unwrap();
///
/// let mut builder = schema.make_input();
/// builder.with_integer("year", 2000).unwrap();
/// let evaluation = schema.evaluate(&builder.build());
///
/// assert!(evaluation.is_valid());
/// assert_eq!(
///     Some(&Value::Integer(2000)),
///     evaluation.parameters().get("publication_date__year")
/// );
/// assert_eq!(Some(&Value::Integer(1)), evaluation.parameters().get("range"));
/// ```
#[derive(Clone, Debug)]
pub struct FormSchema {
    fields: FieldTable,
    required: Vec<bool>,
    lookups: Vec<Vec<String>>,
    ignored: Vec<bool>,
    multifield: Vec<DeclaredMultifield>,
    no_defaults: bool,
    constraints: Constraints,
}

impl FormSchema {
    /// Declare a form from its fields and options.
    ///
    /// Every field named by the options must be declared, and field names must be unique.
    ///
    /// ```rust
    /// use query_logic::{FieldDefinition, FormSchema, MetaConfig};
    ///
    /// let meta = MetaConfig::default().with_extralogic("year and month").unwrap();
    /// let result = FormSchema::declare(&[FieldDefinition::integer("year")], meta);
    /// assert!(result.is_err());
    /// ```
    pub fn declare(definitions: &[FieldDefinition], meta: MetaConfig) -> Result<Self, SchemaError> {
        let fields = FieldTable::new(definitions)?;

        let required = match meta.required() {
            None => fields
                .iter()
                .map(|(_, definition)| definition.is_required())
                .collect(),
            Some(names) => {
                let mut required = vec![false; fields.len()];
                for name in names {
                    required[fields.resolve(name)?.0] = true;
                }
                required
            }
        };

        let mut lookups: Vec<Vec<String>> = fields
            .iter()
            .map(|(_, definition)| vec![definition.name().to_owned()])
            .collect();
        for (name, keys) in meta.lookups() {
            lookups[fields.resolve(name)?.0] = keys.clone().into_vec();
        }

        let mut ignored = vec![false; fields.len()];
        for name in meta.ignore() {
            ignored[fields.resolve(name)?.0] = true;
        }

        let multifield = meta
            .multifield_lookups()
            .iter()
            .map(|lookup| {
                if lookup.fields.is_empty() {
                    return Err(SchemaError::InvalidConfig(
                        "a multi-field lookup needs at least one field".to_owned(),
                    ));
                }
                let ids = lookup
                    .fields
                    .iter()
                    .map(|name| fields.resolve(name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DeclaredMultifield {
                    fields: ids,
                    combinator: lookup.combinator.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let constraints = Constraints::new(meta.extralogic(), &fields, &required)?;
        debug!(
            fields = fields.len(),
            constraints = constraints.len(),
            "declared form schema"
        );

        Ok(Self {
            fields,
            required,
            lookups,
            ignored,
            multifield,
            no_defaults: meta.no_defaults(),
            constraints,
        })
    }

    /// Declare a form from a [`FormConfig`].
    pub fn from_config(config: FormConfig) -> Result<Self, SchemaError> {
        Self::declare(&config.fields, config.meta)
    }

    /// Declare a form from its JSON description.
    ///
    /// ```rust
    /// use query_logic::FormSchema;
    ///
    /// let schema = FormSchema::from_json(r#"{
    ///     "fields": [
    ///         {"name": "genre", "kind": "string"},
    ///         {"name": "author", "kind": "integer"},
    ///         {"name": "title", "kind": "string"}
    ///     ],
    ///     "meta": {
    ///         "lookups": {"author": "author_id"},
    ///         "extralogic": ["genre and (author or title)"]
    ///     }
    /// }"#).unwrap();
    ///
    /// assert_eq!("( genre AND ( author OR title ) )", schema.constraint(0).unwrap().to_string());
    /// ```
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Self::from_config(FormConfig::from_json(json)?)
    }

    /// Create a new [`InputBuilder`] for the fields of this form.
    #[inline]
    pub fn make_input(&self) -> InputBuilder<'_> {
        InputBuilder::new(&self.fields)
    }

    /// Validate one input and derive its parameters.
    #[inline]
    pub fn evaluate(&self, input: &CleanedInput) -> Evaluation {
        QueryForm::new(self).evaluate(input)
    }

    #[inline]
    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    /// Whether the field is mandatory once the `required` option is applied.
    pub fn is_required(&self, name: &str) -> Option<bool> {
        self.fields.by_name(name).map(|id| self.required[id.0])
    }

    #[inline]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// The `index`-th declared constraint.
    pub fn constraint(&self, index: usize) -> Option<&ConstraintNode> {
        self.constraints
            .roots()
            .get(index)
            .and_then(|id| self.constraints.get(*id))
    }

    pub(crate) fn run(&self, input: &CleanedInput, initial: &[Option<Value>]) -> Evaluation {
        let mut errors = ErrorSink::new();
        let mut validated = self.validate_fields(input, initial, &mut errors);
        self.clean_extralogic(&mut validated, &mut errors);
        let parameters = self.derive_parameters(&validated, &mut errors);
        Evaluation::new(validated, parameters, errors)
    }

    fn validate_fields(
        &self,
        input: &CleanedInput,
        initial: &[Option<Value>],
        errors: &mut ErrorSink,
    ) -> ValidatedData {
        let names = self
            .fields
            .iter()
            .map(|(_, definition)| definition.name().to_owned())
            .collect();
        let mut validated = ValidatedData::new(names);

        for (id, definition) in self.fields.iter() {
            if let Some(value) = input.get(id).filter(|value| !value.is_empty()) {
                validated.insert(id, value.clone(), false);
                continue;
            }

            if !self.no_defaults {
                let fallback = initial
                    .get(id.0)
                    .cloned()
                    .flatten()
                    .or_else(|| definition.default().map(FieldDefault::resolve))
                    .filter(|value| !value.is_empty());
                if let Some(value) = fallback {
                    debug!(field = definition.name(), %value, "filled in default");
                    validated.insert(id, value, true);
                    continue;
                }
            }

            if self.required[id.0] {
                errors.push(
                    Some(definition.name()),
                    ViolationKind::MissingRequiredField,
                    REQUIRED_MESSAGE,
                );
            }
        }

        validated
    }

    fn clean_extralogic(&self, validated: &mut ValidatedData, errors: &mut ErrorSink) {
        for root in self.constraints.roots() {
            match self.constraints.evaluate(*root, validated) {
                Ok(Some(winner)) => {
                    if let Some(node) = self.constraints.get(*root) {
                        if node.kind() == OperatorKind::Or {
                            let kept = self.constraints.fields_under(winner);
                            self.prune(*root, &kept, validated);
                        }
                    }
                }
                Ok(None) => {}
                Err(violation) => self.recover(*root, violation, validated, errors),
            }
        }
    }

    /// Drop the alternatives an OR did not choose.
    fn prune(&self, root: NodeId, kept: &[FieldId], validated: &mut ValidatedData) {
        for field in self.constraints.iter_all_operands(root) {
            if !kept.contains(&field.id()) && validated.remove(field.id()).is_some() {
                debug!(field = field.attrname(), "pruned alternative");
            }
        }
    }

    /// Roll back every default under a failed constraint and report the first submitted field.
    ///
    /// A failure involving defaults only is dropped silently.
    fn recover(
        &self,
        root: NodeId,
        violation: ConstraintViolation,
        validated: &mut ValidatedData,
        errors: &mut ErrorSink,
    ) {
        let operands = self.constraints.iter_all_operands(root);
        let any_default = operands.iter().any(|field| {
            validated
                .entry(field.id())
                .is_some_and(ValidatedEntry::is_default)
        });
        if !any_default {
            debug!(error = %violation, subject = ?violation.subject.attrname(), "constraint failed");
            errors.push(
                violation.subject.attrname(),
                violation.kind,
                violation.message,
            );
            return;
        }

        let mut offender = None;
        for field in operands {
            match validated.entry(field.id()).map(ValidatedEntry::is_default) {
                Some(true) => {
                    validated.remove(field.id());
                    debug!(field = field.attrname(), "dropped default of a failed constraint");
                }
                Some(false) if offender.is_none() => offender = Some(field.attrname()),
                _ => {}
            }
        }

        match offender {
            Some(attrname) => {
                debug!(error = %violation, subject = attrname, "constraint failed");
                errors.push(Some(attrname), violation.kind, violation.message);
            }
            None => debug!(error = %violation, "constraint failed on defaults only"),
        }
    }

    fn derive_parameters(&self, validated: &ValidatedData, errors: &mut ErrorSink) -> Parameters {
        let mut parameters = Parameters::new();
        for (id, _, entry) in validated.iter_entries() {
            if self.ignored[id.0] {
                continue;
            }
            for key in &self.lookups[id.0] {
                parameters.insert(key.clone(), entry.value().clone());
            }
        }

        for multifield in &self.multifield {
            let values: Option<Vec<&Value>> = multifield
                .fields
                .iter()
                .map(|id| validated.entry(*id).map(ValidatedEntry::value))
                .collect();
            let Some(values) = values else {
                continue;
            };

            match (multifield.combinator)(values.as_slice()) {
                Ok(derived) => {
                    for id in &multifield.fields {
                        for key in &self.lookups[id.0] {
                            parameters.remove(key);
                        }
                    }
                    debug!(keys = ?derived.keys().collect::<Vec<_>>(), "combined fields");
                    parameters.extend(derived);
                }
                Err(error) => {
                    warn!(%error, "multi-field combinator failed");
                    errors.push(
                        None,
                        ViolationKind::InvalidMultifieldCombination,
                        error.to_string(),
                    );
                }
            }
        }

        parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::CombinatorError,
        evaluation::{FieldError, NON_FIELD_ERRORS},
        test_utils::forms::{book_schema, letters_schema},
    };
    use proptest::prelude::*;

    fn is_sync_and_send<T: Send + Sync>() {}

    fn letters(schema: &FormSchema, present: &[&str]) -> CleanedInput {
        let mut builder = schema.make_input();
        for name in present {
            builder.with_string(name, name).unwrap();
        }
        builder.build()
    }

    fn single_constraint(expression: &str, fields: &[FieldDefinition]) -> FormSchema {
        let meta = MetaConfig::default().with_extralogic(expression).unwrap();
        FormSchema::declare(fields, meta).unwrap()
    }

    fn xyz() -> Vec<FieldDefinition> {
        ["x", "y", "z"].map(FieldDefinition::string).to_vec()
    }

    #[test]
    fn support_sync_and_send_traits() {
        is_sync_and_send::<FormSchema>();
    }

    #[test]
    fn can_declare_a_schema() {
        let schema = letters_schema();

        assert_eq!(4, schema.constraints().len());
        assert_eq!(
            "( c AND ( d OR e ) AND a )",
            schema.constraint(2).unwrap().to_string()
        );
        assert!(schema.constraint(4).is_none());
    }

    #[test]
    fn return_an_error_on_duplicate_definitions() {
        let fields = [FieldDefinition::string("a"), FieldDefinition::integer("a")];

        let result = FormSchema::declare(&fields, MetaConfig::default());

        assert!(matches!(result, Err(SchemaError::AlreadyPresent(_))));
    }

    #[test]
    fn return_an_error_on_options_naming_unknown_fields() {
        let fields = [FieldDefinition::string("a")];
        let metas = [
            MetaConfig::default().with_lookup("b", "b__exact"),
            MetaConfig::default().with_ignore("b"),
            MetaConfig::default().with_required(&["b"]),
            MetaConfig::default().with_multifield(&["a", "b"], |_| Ok(Parameters::new())),
        ];

        for meta in metas {
            assert_eq!(
                Some(SchemaError::UnknownField("b".to_owned())),
                FormSchema::declare(&fields, meta).err()
            );
        }
    }

    #[test]
    fn return_an_error_on_an_empty_multifield_lookup() {
        let fields = [FieldDefinition::string("a")];
        let meta = MetaConfig::default().with_multifield(&[], |_| Ok(Parameters::new()));

        let result = FormSchema::declare(&fields, meta);

        assert!(matches!(result, Err(SchemaError::InvalidConfig(_))));
    }

    #[test]
    fn an_optional_or_with_nothing_present_emits_nothing() {
        let schema = single_constraint("x or y or z", &xyz());

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert!(evaluation.is_valid());
        assert!(evaluation.parameters().is_empty());
    }

    #[test]
    fn a_required_or_with_nothing_present_is_a_missing_field() {
        let schema = single_constraint("required(x or y or z)", &xyz());

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert_eq!(
            vec![FieldError {
                field: Some("z".to_owned()),
                kind: ViolationKind::MissingRequiredField,
                message: "Expected logic: ( x OR y OR z )".to_owned(),
            }],
            evaluation.errors()
        );
    }

    #[test]
    fn or_keeps_only_the_first_satisfied_operand() {
        let schema = single_constraint("required(x or y or z)", &xyz());

        let evaluation = schema.evaluate(&letters(&schema, &["z", "y"]));

        assert!(evaluation.is_valid());
        assert_eq!(vec!["y"], evaluation.parameters().keys().collect::<Vec<_>>());
        assert!(!evaluation.validated().contains("z"));
    }

    #[test]
    fn or_prunes_the_losing_alternatives_of_a_nested_winner() {
        let schema = single_constraint("(x and y) or z", &xyz());

        let evaluation = schema.evaluate(&letters(&schema, &["x", "y", "z"]));

        assert!(evaluation.is_valid());
        assert_eq!(
            vec!["x", "y"],
            evaluation.parameters().keys().collect::<Vec<_>>()
        );
        assert!(!evaluation.validated().contains("z"));
    }

    #[test]
    fn an_optional_nested_or_counts_as_satisfied_when_empty() {
        let schema = single_constraint("x and (y or z)", &xyz());

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert_eq!(
            vec![FieldError {
                field: None,
                kind: ViolationKind::IncompleteGroup,
                message: "Expected logic: ( x AND ( y OR z ) )".to_owned(),
            }],
            evaluation.errors()
        );
    }

    #[test]
    fn or_keeps_the_winning_field_when_it_also_appears_in_a_losing_alternative() {
        let schema = single_constraint("x or (x and y)", &xyz());

        let evaluation = schema.evaluate(&letters(&schema, &["x", "y"]));

        assert_eq!(
            vec!["x"],
            evaluation.parameters().keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn and_with_nothing_present_emits_nothing() {
        let schema = single_constraint("x and y and z", &xyz());

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert!(evaluation.is_valid());
        assert!(evaluation.parameters().is_empty());
    }

    #[test]
    fn and_with_everything_present_emits_everything() {
        let schema = single_constraint("x and y and z", &xyz());

        let evaluation = schema.evaluate(&letters(&schema, &["x", "y", "z"]));

        assert!(evaluation.is_valid());
        assert_eq!(
            vec!["x", "y", "z"],
            evaluation.parameters().keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn a_partial_and_is_an_incomplete_group() {
        let schema = single_constraint("x and y and z", &xyz());

        let evaluation = schema.evaluate(&letters(&schema, &["z", "y"]));

        assert_eq!(
            vec![FieldError {
                field: Some("y".to_owned()),
                kind: ViolationKind::IncompleteGroup,
                message: "Expected logic: ( x AND y AND z )".to_owned(),
            }],
            evaluation.errors()
        );
    }

    #[test]
    fn a_partial_and_of_defaults_is_dropped_silently() {
        let fields = [
            FieldDefinition::integer("x").with_default(1),
            FieldDefinition::integer("y").with_default(2),
            FieldDefinition::integer("z"),
        ];
        let schema = single_constraint("x and y and z", &fields);

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert!(evaluation.is_valid());
        assert!(evaluation.validated().is_empty());
        assert!(evaluation.parameters().is_empty());
    }

    #[test]
    fn a_submitted_value_next_to_a_dropped_default_is_reported() {
        let fields = [
            FieldDefinition::integer("x").with_default(1),
            FieldDefinition::integer("y"),
            FieldDefinition::integer("z"),
        ];
        let schema = single_constraint("x and y and z", &fields);
        let mut builder = schema.make_input();
        builder.with_integer("y", 2).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(
            vec![Some("y".to_owned())],
            evaluation
                .errors()
                .iter()
                .map(|error| error.field.clone())
                .collect::<Vec<_>>()
        );
        assert!(!evaluation.validated().contains("x"));
    }

    #[test]
    fn a_default_declared_after_the_reported_field_is_dropped() {
        let fields = [
            FieldDefinition::integer("x"),
            FieldDefinition::integer("y").with_default(1),
            FieldDefinition::integer("z"),
        ];
        let schema = single_constraint("x and y and z", &fields);
        let mut builder = schema.make_input();
        builder.with_integer("x", 5).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(
            vec![Some("x".to_owned())],
            evaluation
                .errors()
                .iter()
                .map(|error| error.field.clone())
                .collect::<Vec<_>>()
        );
        assert!(!evaluation.validated().contains("y"));
        assert_eq!(vec!["x"], evaluation.parameters().keys().collect::<Vec<_>>());
    }

    #[test]
    fn every_default_of_a_failed_constraint_is_dropped() {
        let fields = [
            FieldDefinition::integer("w").with_default(1),
            FieldDefinition::integer("x"),
            FieldDefinition::integer("y").with_default(2),
            FieldDefinition::integer("z"),
        ];
        let schema = single_constraint("w and x and y and z", &fields);
        let mut builder = schema.make_input();
        builder.with_integer("x", 5).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(1, evaluation.errors().len());
        assert_eq!(Some("x"), evaluation.errors()[0].field.as_deref());
        assert!(!evaluation.validated().contains("w"));
        assert!(!evaluation.validated().contains("y"));
    }

    #[test]
    fn an_empty_nested_alternative_does_not_win_an_or() {
        let schema = single_constraint("(x and y) or z", &xyz());

        let evaluation = schema.evaluate(&letters(&schema, &["z"]));

        assert!(evaluation.is_valid());
        assert!(evaluation.validated().contains("z"));
        assert_eq!(vec!["z"], evaluation.parameters().keys().collect::<Vec<_>>());
    }

    #[test]
    fn a_required_or_with_only_an_empty_nested_alternative_is_missing() {
        let schema = single_constraint("required((x and y) or z)", &xyz());

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert_eq!(1, evaluation.errors().len());
        assert_eq!(ViolationKind::MissingRequiredField, evaluation.errors()[0].kind);
    }

    #[test]
    fn a_defaulted_field_is_dropped_when_its_companion_is_missing() {
        let schema = book_schema();

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert!(evaluation.is_valid());
        assert!(!evaluation.validated().contains("range"));
        assert!(evaluation.parameters().is_empty());
    }

    #[test]
    fn a_submitted_field_is_reported_when_its_companion_is_missing() {
        let schema = book_schema();
        let mut builder = schema.make_input();
        builder.with_integer("range", 5).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(
            vec!["Expected logic: ( range AND year )".to_owned()],
            evaluation.errors_by_field()["range"]
        );
    }

    #[test]
    fn a_default_participates_when_its_constraint_holds() {
        let fields = [
            FieldDefinition::integer("year"),
            FieldDefinition::integer("page").with_default(1),
        ];
        let schema = FormSchema::declare(&fields, MetaConfig::default()).unwrap();

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert_eq!(Some(&Value::Integer(1)), evaluation.parameters().get("page"));
        assert_eq!(Some(true), evaluation.validated().is_default("page"));
    }

    #[test]
    fn lookups_rename_the_parameters() {
        let fields = [FieldDefinition::integer("year")];
        let meta = MetaConfig::default().with_lookup("year", "publication_date__year");
        let schema = FormSchema::declare(&fields, meta).unwrap();
        let mut builder = schema.make_input();
        builder.with_integer("year", 2000).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(
            Parameters::from_iter([("publication_date__year".to_owned(), Value::Integer(2000))]),
            *evaluation.parameters()
        );
    }

    #[test]
    fn a_lookup_can_emit_several_keys() {
        let fields = [FieldDefinition::string("q")];
        let meta = MetaConfig::default().with_lookup("q", vec!["title__icontains", "summary"]);
        let schema = FormSchema::declare(&fields, meta).unwrap();
        let mut builder = schema.make_input();
        builder.with_string("q", "dune").unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(
            vec!["summary", "title__icontains"],
            evaluation.parameters().keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn a_multifield_lookup_replaces_the_individual_lookups() {
        let schema = book_schema();
        let mut builder = schema.make_input();
        builder.with_integer("year", 2000).unwrap();
        builder.with_integer("range", 5).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert!(evaluation.is_valid());
        assert_eq!(
            Parameters::from_iter([(
                "publication_date__year__range".to_owned(),
                Value::Tuple(vec![Value::Integer(1995), Value::Integer(2005)])
            )]),
            *evaluation.parameters()
        );
    }

    #[test]
    fn a_multifield_lookup_combines_a_default() {
        let schema = book_schema();
        let mut builder = schema.make_input();
        builder.with_integer("year", 2000).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(
            Some(&Value::Tuple(vec![Value::Integer(1999), Value::Integer(2001)])),
            evaluation.parameters().get("publication_date__year__range")
        );
        assert!(!evaluation.parameters().contains_key("publication_date__year"));
        assert!(!evaluation.parameters().contains_key("range"));
    }

    #[test]
    fn a_multifield_lookup_is_skipped_when_a_field_is_absent() {
        let fields = [FieldDefinition::integer("year"), FieldDefinition::integer("range")];
        let meta = MetaConfig::default()
            .with_lookup("year", "publication_date__year")
            .with_multifield(&["year", "range"], |_| {
                Err(CombinatorError::new("must not be called"))
            });
        let schema = FormSchema::declare(&fields, meta).unwrap();
        let mut builder = schema.make_input();
        builder.with_integer("year", 2000).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert!(evaluation.is_valid());
        assert_eq!(
            Some(&Value::Integer(2000)),
            evaluation.parameters().get("publication_date__year")
        );
    }

    #[test]
    fn a_failing_combinator_is_reported_and_keeps_the_individual_lookups() {
        let fields = [FieldDefinition::integer("year"), FieldDefinition::integer("range")];
        let meta = MetaConfig::default().with_multifield(&["year", "range"], |values| {
            match values[1].as_integer() {
                Some(range) if range < 0 => Err(CombinatorError::new("range must be positive")),
                _ => Ok(Parameters::new()),
            }
        });
        let schema = FormSchema::declare(&fields, meta).unwrap();
        let mut builder = schema.make_input();
        builder.with_integer("year", 2000).unwrap();
        builder.with_integer("range", -1).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(
            vec![FieldError {
                field: None,
                kind: ViolationKind::InvalidMultifieldCombination,
                message: "range must be positive".to_owned(),
            }],
            evaluation.errors()
        );
        assert_eq!(2, evaluation.parameters().len());
        assert!(evaluation.errors_by_field().contains_key(NON_FIELD_ERRORS));
    }

    #[test]
    fn ignored_fields_are_validated_but_not_emitted() {
        let fields = [FieldDefinition::integer("year"), FieldDefinition::integer("page")];
        let meta = MetaConfig::default().with_ignore("page");
        let schema = FormSchema::declare(&fields, meta).unwrap();
        let mut builder = schema.make_input();
        builder.with_integer("year", 2000).unwrap();
        builder.with_integer("page", 3).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(Some(&Value::Integer(3)), evaluation.validated().get("page"));
        assert!(!evaluation.parameters().contains_key("page"));
        assert!(evaluation.parameters().contains_key("year"));
    }

    #[test]
    fn no_defaults_keeps_absent_fields_out() {
        let fields = [FieldDefinition::integer("page").with_default(1)];
        let meta = MetaConfig::default().with_no_defaults(true);
        let schema = FormSchema::declare(&fields, meta).unwrap();

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert!(evaluation.validated().is_empty());
        assert!(evaluation.parameters().is_empty());
    }

    #[test]
    fn empty_submissions_count_as_absent() {
        let fields = [
            FieldDefinition::string("title").with_default("any"),
            FieldDefinition::integer_list("ids"),
            FieldDefinition::integer("page"),
        ];
        let schema = FormSchema::declare(&fields, MetaConfig::default()).unwrap();
        let mut builder = schema.make_input();
        builder.with_string("title", "").unwrap();
        builder.with_integer_list("ids", &[]).unwrap();
        builder.with_integer("page", 0).unwrap();

        let evaluation = schema.evaluate(&builder.build());

        assert_eq!(Some(true), evaluation.validated().is_default("title"));
        assert!(!evaluation.validated().contains("ids"));
        assert_eq!(Some(&Value::Integer(0)), evaluation.validated().get("page"));
    }

    #[test]
    fn lazy_defaults_are_computed_at_evaluation_time() {
        let fields = [FieldDefinition::integer("year").with_lazy_default(|| Value::Integer(2024))];
        let schema = FormSchema::declare(&fields, MetaConfig::default()).unwrap();

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert_eq!(Some(&Value::Integer(2024)), evaluation.parameters().get("year"));
    }

    #[test]
    fn a_missing_required_field_is_reported() {
        let fields = [FieldDefinition::string("title").required(), FieldDefinition::string("q")];
        let schema = FormSchema::declare(&fields, MetaConfig::default()).unwrap();

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert_eq!(
            vec![FieldError {
                field: Some("title".to_owned()),
                kind: ViolationKind::MissingRequiredField,
                message: "This field is required.".to_owned(),
            }],
            evaluation.errors()
        );
    }

    #[test]
    fn a_required_field_with_a_default_is_satisfied() {
        let fields = [FieldDefinition::integer("page").required().with_default(1)];
        let schema = FormSchema::declare(&fields, MetaConfig::default()).unwrap();

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert!(evaluation.is_valid());
    }

    #[test]
    fn the_required_option_replaces_the_field_flags() {
        let fields = [FieldDefinition::string("title").required(), FieldDefinition::string("q")];
        let meta = MetaConfig::default().with_required(&["q"]);
        let schema = FormSchema::declare(&fields, meta).unwrap();

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert_eq!(Some(false), schema.is_required("title"));
        assert_eq!(Some(true), schema.is_required("q"));
        assert_eq!(
            vec![Some("q".to_owned())],
            evaluation
                .errors()
                .iter()
                .map(|error| error.field.clone())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn a_required_field_makes_its_and_mandatory() {
        let fields = [FieldDefinition::string("x").required(), FieldDefinition::string("y")];
        let schema = single_constraint("x and y", &fields);

        let evaluation = schema.evaluate(&schema.make_input().build());

        assert_eq!(
            vec![
                ("x".to_owned(), ViolationKind::MissingRequiredField),
                ("x".to_owned(), ViolationKind::MissingRequiredField),
            ],
            evaluation
                .errors()
                .iter()
                .map(|error| (error.field.clone().unwrap_or_default(), error.kind))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn independent_constraints_all_report() {
        let schema = letters_schema();

        // `b` alone breaks `( b AND c AND d )`; `( c AND ( d OR e ) AND a )` is broken by `c`.
        let evaluation = schema.evaluate(&letters(&schema, &["b", "c"]));

        let fields: Vec<_> = evaluation
            .errors()
            .iter()
            .map(|error| error.field.clone())
            .collect();
        assert_eq!(
            vec![Some("b".to_owned()), Some("c".to_owned())],
            fields
        );
    }

    #[test]
    fn a_nested_subject_is_reported_as_a_non_field_error() {
        let schema = single_constraint("(x and y) and z", &xyz());

        let evaluation = schema.evaluate(&letters(&schema, &["x", "y"]));

        assert_eq!(
            vec!["Expected logic: ( ( x AND y ) AND z )".to_owned()],
            evaluation.errors_by_field()[NON_FIELD_ERRORS]
        );
    }

    #[test]
    fn evaluation_does_not_mutate_the_schema() {
        let schema = book_schema();
        let mut builder = schema.make_input();
        builder.with_integer("range", 5).unwrap();
        let failing = builder.build();

        let _ = schema.evaluate(&failing);
        let evaluation = schema.evaluate(&schema.make_input().build());

        assert!(evaluation.is_valid());
    }

    proptest! {
        #[test]
        #[cfg_attr(miri, ignore)]
        fn evaluation_is_idempotent(present in prop::collection::vec(any::<bool>(), 5)) {
            let schema = letters_schema();
            let names = ["a", "b", "c", "d", "e"];
            let chosen: Vec<_> = names
                .iter()
                .zip(&present)
                .filter(|(_, present)| **present)
                .map(|(name, _)| *name)
                .collect();
            let input = letters(&schema, &chosen);

            let first = schema.evaluate(&input);
            let second = schema.evaluate(&input);

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(
                serde_json::to_string(first.parameters()).unwrap(),
                serde_json::to_string(second.parameters()).unwrap()
            );
        }

        #[test]
        #[cfg_attr(miri, ignore)]
        fn a_required_or_keeps_exactly_the_first_present_operand(present in prop::collection::vec(any::<bool>(), 3)) {
            let schema = single_constraint("required(x or y or z)", &xyz());
            let names = ["x", "y", "z"];
            let chosen: Vec<_> = names
                .iter()
                .zip(&present)
                .filter(|(_, present)| **present)
                .map(|(name, _)| *name)
                .collect();

            let evaluation = schema.evaluate(&letters(&schema, &chosen));

            match chosen.first() {
                Some(first) => {
                    prop_assert!(evaluation.is_valid());
                    prop_assert_eq!(vec![*first], evaluation.parameters().keys().collect::<Vec<_>>());
                }
                None => {
                    prop_assert_eq!(1, evaluation.errors().len());
                    prop_assert!(evaluation.parameters().is_empty());
                }
            }
        }

        #[test]
        #[cfg_attr(miri, ignore)]
        fn an_and_is_all_or_nothing(present in prop::collection::vec(any::<bool>(), 3)) {
            let schema = single_constraint("x and y and z", &xyz());
            let names = ["x", "y", "z"];
            let chosen: Vec<_> = names
                .iter()
                .zip(&present)
                .filter(|(_, present)| **present)
                .map(|(name, _)| *name)
                .collect();

            let evaluation = schema.evaluate(&letters(&schema, &chosen));

            if chosen.is_empty() || chosen.len() == names.len() {
                prop_assert!(evaluation.is_valid());
                prop_assert_eq!(chosen.len(), evaluation.parameters().len());
            } else {
                prop_assert_eq!(1, evaluation.errors().len());
                prop_assert_eq!(ViolationKind::IncompleteGroup, evaluation.errors()[0].kind);
            }
        }
    }
}
