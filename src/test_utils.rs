pub mod ast {
    macro_rules! and {
        ($($operand:expr),+ $(,)?) => {
            $crate::ast::Operator::new($crate::ast::OperatorKind::And, vec![$($operand),+])
        };
    }

    macro_rules! or {
        ($($operand:expr),+ $(,)?) => {
            $crate::ast::Operator::new($crate::ast::OperatorKind::Or, vec![$($operand),+])
        };
    }

    macro_rules! field {
        ($name:expr) => {
            $crate::ast::Node::Field(($name).to_owned())
        };
    }

    macro_rules! nested {
        ($operator:expr) => {
            $crate::ast::Node::Operator($operator)
        };
    }

    pub(crate) use and;
    pub(crate) use field;
    pub(crate) use nested;
    pub(crate) use or;
}

pub mod forms {
    use crate::{
        config::MetaConfig,
        evaluation::Parameters,
        fields::FieldDefinition,
        schema::FormSchema,
        values::Value,
    };

    /// Five plain fields `a` to `e` with the four constraints of the classic example form.
    pub fn letters_schema() -> FormSchema {
        let fields = ["a", "b", "c", "d", "e"].map(FieldDefinition::string);
        let meta = MetaConfig::default()
            .with_extralogic("b and c and d")
            .and_then(|meta| meta.with_extralogic("e or a or b"))
            .and_then(|meta| meta.with_extralogic("c and (d or e) and a"))
            .and_then(|meta| meta.with_extralogic("(b and c and d) or e"))
            .unwrap();
        FormSchema::declare(&fields, meta).unwrap()
    }

    /// The book search form: a year with a defaulted range, free text and foreign keys.
    pub fn book_schema() -> FormSchema {
        let fields = [
            FieldDefinition::integer("year"),
            FieldDefinition::integer("range").with_default(1),
            FieldDefinition::string("title"),
            FieldDefinition::string("genre"),
            FieldDefinition::integer("author"),
        ];
        let meta = MetaConfig::default()
            .with_lookup("year", "publication_date__year")
            .with_lookup("title", "title__icontains")
            .with_lookup("genre", "genres")
            .with_lookup("author", "author_id")
            .with_multifield(&["year", "range"], |values: &[&Value]| {
                let year = values[0].as_integer().unwrap_or_default();
                let range = values[1].as_integer().unwrap_or_default();
                Ok(Parameters::from_iter([(
                    "publication_date__year__range".to_owned(),
                    Value::Tuple(vec![Value::Integer(year - range), Value::Integer(year + range)]),
                )]))
            })
            .with_extralogic("author or title")
            .and_then(|meta| meta.with_extralogic("range and year"))
            .unwrap();
        FormSchema::declare(&fields, meta).unwrap()
    }
}
