use apollo_compiler::Node;
use apollo_compiler::ast;
use serde_json_bytes::ByteString;

use crate::json_ext::Object;
use crate::json_ext::Value;

/// Converts an argument literal to JSON, substituting variables.
///
/// Returns `None` for a variable that was not provided.
pub(crate) fn literal_to_json(value: &ast::Value, variables: &Object) -> Option<Value> {
    Some(match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => Value::String(name.as_str().into()),
        ast::Value::Variable(name) => return variables.get(name.as_str()).cloned(),
        ast::Value::String(s) => Value::String(s.as_str().into()),
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::Int(i) => match i.as_str().parse::<i64>() {
            Ok(i) => Value::from(i),
            Err(_) => float(i.as_str())?,
        },
        ast::Value::Float(f) => float(f.as_str())?,
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| literal_to_json(item, variables).unwrap_or(Value::Null))
                .collect(),
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter_map(|(name, value)| {
                    literal_to_json(value, variables)
                        .map(|value| (ByteString::from(name.as_str()), value))
                })
                .collect(),
        ),
    })
}

fn float(literal: &str) -> Option<Value> {
    let f = literal.parse::<f64>().ok()?;
    serde_json::Number::from_f64(f).map(Value::Number)
}

/// Builds the argument map of one field invocation.
///
/// Starts from the declared defaults and overlays the literals of the query. A literal that
/// refers to a missing variable keeps the default.
pub(crate) fn coerce(
    defaults: &Object,
    literals: &[Node<ast::Argument>],
    variables: &Object,
) -> Object {
    let mut arguments = defaults.clone();
    for argument in literals {
        if let Some(value) = literal_to_json(&argument.value, variables) {
            arguments.insert(argument.name.as_str(), value);
        }
    }
    arguments
}
