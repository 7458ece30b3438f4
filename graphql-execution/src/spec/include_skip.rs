use apollo_compiler::executable;

use crate::json_ext::Object;

/// The `@include` and `@skip` conditions of one selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct IncludeSkip {
    include: Condition,
    skip: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Condition {
    Yes,
    No,
    Variable(String),
}

impl IncludeSkip {
    pub(crate) fn parse(directives: &executable::DirectiveList) -> Self {
        let include = directives
            .get("include")
            .and_then(|directive| Condition::parse(directive))
            .unwrap_or(Condition::Yes);
        let skip = directives
            .get("skip")
            .and_then(|directive| Condition::parse(directive))
            .unwrap_or(Condition::No);
        Self { include, skip }
    }

    pub(crate) fn should_skip(&self, variables: &Object) -> bool {
        // Using .unwrap_or is legit here because
        // validation should have already checked that
        // the variable is present and it is of the correct type
        self.skip.eval(variables).unwrap_or(false) || !self.include.eval(variables).unwrap_or(true)
    }
}

impl Condition {
    pub(crate) fn parse(directive: &executable::Directive) -> Option<Self> {
        match directive.specified_argument_by_name("if")?.as_ref() {
            executable::Value::Boolean(true) => Some(Condition::Yes),
            executable::Value::Boolean(false) => Some(Condition::No),
            executable::Value::Variable(variable) => {
                Some(Condition::Variable(variable.as_str().to_owned()))
            }
            _ => None,
        }
    }

    pub(crate) fn eval(&self, variables: &Object) -> Option<bool> {
        match self {
            Condition::Yes => Some(true),
            Condition::No => Some(false),
            Condition::Variable(variable_name) => variables
                .get(variable_name.as_str())
                .and_then(|v| v.as_bool()),
        }
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ExecutableDocument;
    use apollo_compiler::Schema;
    use apollo_compiler::executable::Selection;
    use serde_json_bytes::json;

    use super::*;

    fn conditions(query: &str) -> IncludeSkip {
        let schema = Schema::parse_and_validate("type Query { a: Int }", "schema.graphql").unwrap();
        let document =
            ExecutableDocument::parse_and_validate(&schema, query, "query.graphql").unwrap();
        let operation = document.operations.get(None).unwrap();
        match &operation.selection_set.selections[0] {
            Selection::Field(field) => IncludeSkip::parse(&field.directives),
            _ => panic!("expected a field"),
        }
    }

    #[test]
    fn literal_conditions() {
        assert!(!conditions("{ a }").should_skip(&Object::new()));
        assert!(conditions("{ a @skip(if: true) }").should_skip(&Object::new()));
        assert!(!conditions("{ a @skip(if: false) }").should_skip(&Object::new()));
        assert!(conditions("{ a @include(if: false) }").should_skip(&Object::new()));
        assert!(conditions("{ a @include(if: true) @skip(if: true) }").should_skip(&Object::new()));
    }

    #[test]
    fn variable_conditions() {
        let include_skip = conditions("query($show: Boolean!) { a @include(if: $show) }");
        let mut variables = Object::new();
        variables.insert("show", json!(false));
        assert!(include_skip.should_skip(&variables));
        variables.insert("show", json!(true));
        assert!(!include_skip.should_skip(&variables));
    }
}
