use query_logic::{FormSchema, InputBuilder, QueryForm, Value};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

const BOOK_FORM: &str = r#"{
    "fields": [
        {"name": "genre", "kind": "string"},
        {"name": "author", "kind": "integer"},
        {"name": "title", "kind": "string"},
        {"name": "year", "kind": "integer"},
        {"name": "range", "kind": "integer", "default": 1},
        {"name": "page", "kind": "integer", "default": 1}
    ],
    "meta": {
        "lookups": {
            "genre": "genres",
            "author": "author_id",
            "title": "title__icontains",
            "year": "publication_date__year"
        },
        "ignore": ["page"],
        "extralogic": ["author or title", "range and year"]
    }
}"#;

fn main() {
    // Set RUST_LOG=query_logic=debug to follow the evaluation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Declare the form once
    let schema = FormSchema::from_json(BOOK_FORM).unwrap();

    // Both alternatives are given: only the author is kept
    let mut builder = schema.make_input();
    builder.with_integer("author", 7).unwrap();
    builder.with_string("title", "Dune").unwrap();
    builder.with_integer("year", 1965).unwrap();
    print_evaluation("author and title", &schema, QueryForm::new(&schema), builder);

    // A range without a year is reported
    let mut builder = schema.make_input();
    builder.with_string("genre", "science-fiction").unwrap();
    builder.with_integer("range", 5).unwrap();
    print_evaluation("range without year", &schema, QueryForm::new(&schema), builder);

    // The range of a saved search stands in for the default
    let saved = HashMap::from([("range".to_owned(), Value::Integer(10))]);
    let mut builder = schema.make_input();
    builder.with_integer("year", 1965).unwrap();
    let form = QueryForm::new(&schema).with_record(&saved);
    print_evaluation("saved search", &schema, form, builder);
}

fn print_evaluation(
    label: &str,
    schema: &FormSchema,
    form: QueryForm<'_>,
    builder: InputBuilder<'_>,
) {
    let evaluation = form.evaluate(&builder.build());
    println!("{label} ({} constraints)", schema.constraints().len());
    println!(
        "  parameters: {}",
        serde_json::to_string(evaluation.parameters()).unwrap()
    );
    for (field, messages) in evaluation.errors_by_field() {
        println!("  {field}: {}", messages.join(" "));
    }
}
