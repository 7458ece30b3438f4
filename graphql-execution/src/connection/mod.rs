//! Connection shaping: paginated edges over an arbitrary backing sequence.

mod operations;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json_bytes::Value;

pub use self::operations::decode_cursor;
pub use self::operations::encode_cursor;
use crate::context::ExecutionContext;
use crate::error::FieldError;
use crate::field::Collection;
use crate::field::Element;
use crate::field::FieldValue;
use crate::field::JsonObject;
use crate::field::Resolvable;
use crate::json_ext::Object;
use crate::schema::ConnectionShape;

/// An element of the backing sequence with its position in that sequence.
#[derive(Clone, Debug)]
pub struct Item {
    pub position: usize,
    pub element: Element,
}

/// A declared operation: transforms the items given the value of its argument.
pub type Operation = Arc<
    dyn Fn(Vec<Item>, &Value, &ExecutionContext) -> Result<Vec<Item>, FieldError> + Send + Sync,
>;

/// The argument-driven operations of a connection field, applied in declaration order.
#[derive(Clone, Default)]
pub struct ConnectionDefinition {
    operations: Vec<(String, Operation)>,
}

impl ConnectionDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// `after`, `before`, `first` then `last`.
    pub fn relay() -> Self {
        Self::new().after().before().first().last()
    }

    /// Declares an operation applied when the field receives a non-null `argument`.
    pub fn operation<F>(mut self, argument: impl Into<String>, operation: F) -> Self
    where
        F: Fn(Vec<Item>, &Value, &ExecutionContext) -> Result<Vec<Item>, FieldError>
            + Send
            + Sync
            + 'static,
    {
        self.operations.push((argument.into(), Arc::new(operation)));
        self
    }

    pub fn first(self) -> Self {
        self.operation("first", operations::first)
    }

    pub fn last(self) -> Self {
        self.operation("last", operations::last)
    }

    pub fn after(self) -> Self {
        self.operation("after", operations::after)
    }

    pub fn before(self) -> Self {
        self.operation("before", operations::before)
    }

    /// Argument names of the declared operations, in application order.
    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|(argument, _)| argument.as_str())
    }

    fn apply(
        &self,
        items: &dyn Collection,
        arguments: &Object,
        context: &ExecutionContext,
        max_page_size: Option<usize>,
    ) -> Result<Vec<Item>, FieldError> {
        let mut current: Vec<Item> = items
            .elements()
            .enumerate()
            .map(|(position, element)| Item { position, element })
            .collect();
        for (argument, operation) in &self.operations {
            match arguments.get(argument.as_str()) {
                None | Some(Value::Null) => {}
                Some(value) => current = operation(current, value, context)?,
            }
        }
        if let Some(max_page_size) = max_page_size {
            current.truncate(max_page_size);
        }
        Ok(current)
    }
}

impl fmt::Debug for ConnectionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.arguments()).finish()
    }
}

/// A connection field's value for one execution.
///
/// The declared operations run once, the first time an accessor needs the filtered items.
/// Anything that is not an accessor is forwarded to the backing sequence.
pub struct ConnectionState {
    type_name: String,
    shape: ConnectionShape,
    items: Arc<dyn Collection>,
    definition: Arc<ConnectionDefinition>,
    arguments: Object,
    max_page_size: Option<usize>,
    filtered: OnceCell<Result<Vec<Item>, FieldError>>,
}

impl ConnectionState {
    pub(crate) fn new(
        type_name: &str,
        shape: ConnectionShape,
        items: Arc<dyn Collection>,
        definition: Arc<ConnectionDefinition>,
        arguments: Object,
        max_page_size: Option<usize>,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            shape,
            items,
            definition,
            arguments,
            max_page_size,
            filtered: OnceCell::new(),
        }
    }

    /// The backing sequence.
    pub fn items(&self) -> &Arc<dyn Collection> {
        &self.items
    }

    pub fn arguments(&self) -> &Object {
        &self.arguments
    }

    /// The backing items after the declared operations.
    pub fn filtered(&self, context: &ExecutionContext) -> Result<&[Item], FieldError> {
        self.filtered
            .get_or_init(|| {
                tracing::trace!("applying connection operations for {}", self.type_name);
                self.definition.apply(
                    self.items.as_ref(),
                    &self.arguments,
                    context,
                    self.max_page_size,
                )
            })
            .as_deref()
            .map_err(Clone::clone)
    }

    fn edges(&self, context: &ExecutionContext) -> Result<FieldValue, FieldError> {
        let edge_type = self
            .shape
            .edge_type
            .as_ref()
            .map(|name| name.to_string())
            .unwrap_or_default();
        Ok(FieldValue::list(self.filtered(context)?.iter().map(
            |item| {
                FieldValue::object(Edge {
                    type_name: edge_type.clone(),
                    item: item.clone(),
                })
            },
        )))
    }

    fn nodes(&self, context: &ExecutionContext) -> Result<FieldValue, FieldError> {
        Ok(FieldValue::list(
            self.filtered(context)?
                .iter()
                .map(|item| FieldValue::from(item.element.clone())),
        ))
    }

    fn page_info(&self, context: &ExecutionContext) -> Result<FieldValue, FieldError> {
        let filtered = self.filtered(context)?;
        let first = filtered.first().map(|item| item.position);
        let last = filtered.last().map(|item| item.position);
        let mut fields = Object::new();
        fields.insert(
            "hasPreviousPage",
            Value::Bool(first.is_some_and(|first| first > 0)),
        );
        fields.insert(
            "hasNextPage",
            Value::Bool(last.is_some_and(|last| last + 1 < self.items.len())),
        );
        fields.insert(
            "startCursor",
            first.map(encode_cursor).map(Value::from).unwrap_or(Value::Null),
        );
        fields.insert(
            "endCursor",
            last.map(encode_cursor).map(Value::from).unwrap_or(Value::Null),
        );
        let type_name = self
            .shape
            .page_info_type
            .as_ref()
            .map(|name| name.to_string())
            .unwrap_or_default();
        Ok(FieldValue::object(JsonObject::new(type_name, fields)))
    }
}

impl Resolvable for ConnectionState {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn call(
        &self,
        method: &str,
        arguments: &Object,
        context: &ExecutionContext,
    ) -> Option<Result<FieldValue, FieldError>> {
        match method {
            "edges" => Some(self.edges(context)),
            "nodes" => Some(self.nodes(context)),
            "totalCount" => Some(
                self.filtered(context)
                    .map(|items| FieldValue::Value(Value::from(items.len() as u64))),
            ),
            "pageInfo" => Some(self.page_info(context)),
            _ => self.items.call(method, arguments, context),
        }
    }
}

impl Collection for ConnectionState {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<Element> {
        self.items.get(index)
    }

    fn elements(&self) -> Box<dyn Iterator<Item = Element> + '_> {
        self.items.elements()
    }

    fn call(
        &self,
        method: &str,
        arguments: &Object,
        context: &ExecutionContext,
    ) -> Option<Result<FieldValue, FieldError>> {
        self.items.call(method, arguments, context)
    }
}

/// Edge adapter around one filtered item.
///
/// Edge-level fields resolve against the adapter, see [`Edge::node`] and [`Edge::cursor`].
pub struct Edge {
    type_name: String,
    item: Item,
}

impl Edge {
    pub fn node(&self) -> &Element {
        &self.item.element
    }

    pub fn position(&self) -> usize {
        self.item.position
    }

    pub fn cursor(&self) -> String {
        encode_cursor(self.item.position)
    }
}

impl Resolvable for Edge {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn call(
        &self,
        method: &str,
        _arguments: &Object,
        _context: &ExecutionContext,
    ) -> Option<Result<FieldValue, FieldError>> {
        match method {
            "node" => Some(Ok(self.item.element.clone().into())),
            "cursor" => Some(Ok(FieldValue::from(self.cursor()))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use apollo_compiler::name;
    use serde_json_bytes::json;

    use super::*;

    struct Letters;

    impl Collection for Letters {
        fn len(&self) -> usize {
            4
        }

        fn get(&self, index: usize) -> Option<Element> {
            ["a", "b", "c", "d"]
                .get(index)
                .map(|letter| Element::Value(json!(letter)))
        }

        fn call(
            &self,
            method: &str,
            _arguments: &Object,
            _context: &ExecutionContext,
        ) -> Option<Result<FieldValue, FieldError>> {
            (method == "alphabet").then(|| Ok(FieldValue::from("latin")))
        }
    }

    fn state(definition: ConnectionDefinition, arguments: Value) -> ConnectionState {
        let arguments = match arguments {
            Value::Object(arguments) => arguments,
            _ => Object::new(),
        };
        ConnectionState::new(
            "LetterConnection",
            ConnectionShape {
                edge_type: Some(name!("LetterEdge")),
                page_info_type: Some(name!("PageInfo")),
            },
            Arc::new(Letters),
            Arc::new(definition),
            arguments,
            None,
        )
    }

    fn json(value: FieldValue) -> Value {
        match value {
            FieldValue::Value(value) => value,
            FieldValue::Object(object) => object
                .downcast_ref::<JsonObject>()
                .map(|object| Value::Object(object.fields().clone()))
                .unwrap_or(Value::Null),
            FieldValue::List(items) => Value::Array(items.into_iter().map(json).collect()),
            other => panic!("unexpected {other:?}"),
        }
    }

    fn accessor(
        state: &ConnectionState,
        method: &str,
        context: &ExecutionContext,
    ) -> Result<FieldValue, FieldError> {
        Resolvable::call(state, method, &Object::new(), context).expect("connection accessor")
    }

    #[test]
    fn operations_run_once_in_declaration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let definition = {
            let calls = calls.clone();
            ConnectionDefinition::new()
                .operation("reverse", move |mut items: Vec<Item>, _: &Value, _: &ExecutionContext| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    items.reverse();
                    Ok(items)
                })
                .first()
        };
        let state = state(definition, json!({ "first": 2, "reverse": true }));
        let context = ExecutionContext::default();

        let nodes = json(accessor(&state, "nodes", &context).unwrap());
        assert_eq!(nodes, json!(["d", "c"]));
        let total = json(accessor(&state, "totalCount", &context).unwrap());
        assert_eq!(total, json!(2));
        accessor(&state, "edges", &context).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn null_arguments_skip_their_operation() {
        let state = state(ConnectionDefinition::relay(), json!({ "first": null }));
        let context = ExecutionContext::default();
        assert_eq!(state.filtered(&context).unwrap().len(), 4);
    }

    #[test]
    fn page_info_reflects_backing_bounds() {
        let state = state(
            ConnectionDefinition::relay(),
            json!({ "after": encode_cursor(0), "first": 2 }),
        );
        let context = ExecutionContext::default();
        let page_info = json(accessor(&state, "pageInfo", &context).unwrap());
        assert_eq!(
            page_info,
            json!({
                "hasPreviousPage": true,
                "hasNextPage": true,
                "startCursor": encode_cursor(1),
                "endCursor": encode_cursor(2),
            })
        );
    }

    #[test]
    fn edges_carry_cursor_and_node() {
        let state = state(ConnectionDefinition::relay(), json!({ "last": 1 }));
        let context = ExecutionContext::default();
        let FieldValue::List(edges) = accessor(&state, "edges", &context).unwrap() else {
            panic!("edges should be a list");
        };
        let [FieldValue::Object(edge)] = edges.as_slice() else {
            panic!("expected one edge");
        };
        assert_eq!(edge.type_name(), "LetterEdge");
        let edge = edge.downcast_ref::<Edge>().unwrap();
        assert_eq!(edge.position(), 3);
        assert_eq!(edge.cursor(), encode_cursor(3));
        assert!(edge.call("weight", &Object::new(), &context).is_none());
    }

    #[test]
    fn unknown_operations_are_delegated() {
        let state = state(ConnectionDefinition::relay(), json!({}));
        let context = ExecutionContext::default();
        let alphabet = json(accessor(&state, "alphabet", &context).unwrap());
        assert_eq!(alphabet, json!("latin"));
        assert!(Resolvable::call(&state, "vowels", &Object::new(), &context).is_none());
        assert_eq!(Collection::len(&state), 4);
        assert!(matches!(Collection::get(&state, 1), Some(Element::Value(v)) if v == json!("b")));
    }

    #[test]
    fn invalid_cursor_fails_every_accessor() {
        let state = state(ConnectionDefinition::relay(), json!({ "after": "garbage" }));
        let context = ExecutionContext::default();
        assert!(accessor(&state, "edges", &context).is_err());
        assert!(accessor(&state, "totalCount", &context).is_err());
    }
}
