//! Two-phase resolution of a [`SelectionTree`] against a root object.
//!
//! Every included field is first resolved synchronously, level after level. Values that are
//! not ready yet ([`LazyValue`]s) are queued with the slot of the response they belong to.
//! Once no synchronous work is left, the queue is drained as one batch and the values it
//! produces are completed the same way, until the queue is empty.

use std::collections::VecDeque;
use std::sync::Arc;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Name;
use apollo_compiler::ast;
use apollo_compiler::validation::Valid;
use futures::future;
use futures::future::BoxFuture;
use futures::future::Either;
use tokio_util::sync::CancellationToken;

use crate::configuration::DrainMode;
use crate::connection::ConnectionDefinition;
use crate::connection::ConnectionState;
use crate::context::ExecutionContext;
use crate::error::DEFERRED_RESOLUTION_ERROR;
use crate::error::ExecutionError;
use crate::error::FIELD_RESOLUTION_ERROR;
use crate::error::FieldError;
use crate::error::INVALID_VALUE;
use crate::error::NULL_VALUE;
use crate::field::Collection;
use crate::field::Element;
use crate::field::FieldDescriptor;
use crate::field::FieldValue;
use crate::field::JsonObject;
use crate::field::LazyValue;
use crate::field::Resolvable;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::schema::ExecutableSchema;
use crate::spec::SelectionNode;
use crate::spec::SelectionTree;
use crate::spec::TYPENAME;

type Forced = Result<FieldValue, FieldError>;

/// Executes `tree` against `root`, an object of the operation's root type.
///
/// The response always carries the data built so far. Field errors are reported with the
/// path of the field. Cancellation and drain limits stop the execution between two drain
/// steps and are reported as errors without a path.
#[tracing::instrument(skip_all, level = "trace", fields(execution = context.id()))]
pub async fn execute(
    schema: &ExecutableSchema,
    tree: &SelectionTree,
    root: Arc<dyn Resolvable>,
    context: &ExecutionContext,
) -> graphql::Response {
    let mut execution = Execution {
        schema,
        context,
        data: Value::Object(Object::new()),
        errors: Vec::new(),
        frontier: VecDeque::new(),
        pending: Vec::new(),
    };
    execution.frontier.push_back(Frame {
        path: Path::empty(),
        object: root,
        concrete: tree.root_type().clone(),
        node: tree.root(),
    });
    if let Err(error) = execution.run().await {
        execution.errors.push(error.to_graphql_error());
    }
    graphql::Response {
        data: Some(execution.data),
        errors: execution.errors,
        extensions: Object::new(),
    }
}

/// Builds the selection tree of `operation_name` and executes it.
///
/// Operation errors produce a response without data.
pub async fn execute_request(
    schema: &ExecutableSchema,
    document: &Valid<ExecutableDocument>,
    operation_name: Option<&str>,
    root: Arc<dyn Resolvable>,
    context: &ExecutionContext,
) -> graphql::Response {
    match SelectionTree::build(schema, document, operation_name) {
        Ok(tree) => execute(schema, &tree, root, context).await,
        Err(error) => {
            tracing::debug!("cannot execute operation: {error}");
            graphql::Response {
                data: None,
                errors: vec![error.to_graphql_error()],
                extensions: Object::new(),
            }
        }
    }
}

/// An object whose selected fields remain to be resolved.
struct Frame<'a> {
    path: Path,
    object: Arc<dyn Resolvable>,
    concrete: Name,
    node: &'a SelectionNode,
}

/// What a field was resolved with. Deferred markers and connections need it.
struct Invocation {
    descriptor: Arc<FieldDescriptor>,
    arguments: Object,
}

/// A lazy value waiting for the next drain step, with the slot it completes.
struct Pending<'a> {
    path: Path,
    node: &'a SelectionNode,
    ty: ast::Type,
    invocation: Arc<Invocation>,
    lazy: LazyValue,
}

struct Target<'a> {
    path: Path,
    node: &'a SelectionNode,
    ty: ast::Type,
    invocation: Arc<Invocation>,
}

struct Execution<'a> {
    schema: &'a ExecutableSchema,
    context: &'a ExecutionContext,
    data: Value,
    errors: Vec<graphql::Error>,
    frontier: VecDeque<Frame<'a>>,
    pending: Vec<Pending<'a>>,
}

impl<'a> Execution<'a> {
    async fn run(&mut self) -> Result<(), ExecutionError> {
        let schema = self.schema;
        let execution = &schema.configuration().execution;
        let mut steps = 0;
        loop {
            while let Some(frame) = self.frontier.pop_front() {
                self.resolve_frame(frame);
            }
            if self.pending.is_empty() {
                tracing::trace!("execution completed after {steps} drain steps");
                return Ok(());
            }
            if self.context.is_cancelled() {
                tracing::warn!(
                    "execution cancelled with {} deferred values pending",
                    self.pending.len()
                );
                return Err(ExecutionError::Cancelled);
            }
            if let Some(max_drain_steps) = execution.max_drain_steps {
                if steps >= max_drain_steps {
                    tracing::warn!("execution exceeded {max_drain_steps} drain steps");
                    return Err(ExecutionError::DrainLimitExceeded(max_drain_steps));
                }
            }
            steps += 1;

            let (targets, futures): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
                .into_iter()
                .map(|pending| {
                    let Pending {
                        path,
                        node,
                        ty,
                        invocation,
                        lazy,
                    } = pending;
                    (
                        Target {
                            path,
                            node,
                            ty,
                            invocation,
                        },
                        lazy.force(),
                    )
                })
                .unzip();
            tracing::debug!("drain step {steps}: forcing {} deferred values", futures.len());

            let Some(results) = drain(
                execution.drain_mode,
                futures,
                self.context.cancellation_token().clone(),
            )
            .await
            else {
                tracing::warn!("execution cancelled during drain step {steps}");
                return Err(ExecutionError::Cancelled);
            };
            for (target, result) in targets.into_iter().zip(results) {
                // the slot is gone when an enclosing field was nulled in the meantime
                if self.data.get_path(&target.path).is_none() {
                    continue;
                }
                match result {
                    Ok(value) => self.complete(
                        target.path,
                        target.node,
                        &target.ty,
                        value,
                        &target.invocation,
                    ),
                    Err(error) => self.field_error(target.path, error, DEFERRED_RESOLUTION_ERROR),
                }
            }
        }
    }

    fn resolve_frame(&mut self, frame: Frame<'a>) {
        let Some(children) = frame.node.children(&frame.concrete) else {
            return;
        };
        let included: Vec<(&Name, &'a SelectionNode)> = children
            .iter()
            .filter(|(_, child)| child.included(self.context))
            .collect();
        let Some(Value::Object(placeholders)) = self.data.get_path_mut(&frame.path) else {
            return;
        };
        for (key, _) in &included {
            placeholders.insert(key.as_str(), Value::Null);
        }
        tracing::trace!(
            "resolving {} fields of {} at {}",
            included.len(),
            frame.concrete,
            frame.path
        );

        let connection = frame.object.downcast_ref::<ConnectionState>();
        for (key, child) in included {
            let path = frame.path.join(key.as_str());
            if child.is_typename() {
                self.write(&path, Value::String(frame.concrete.as_str().into()));
                continue;
            }
            let Some(descriptor) = child.descriptor() else {
                failfast_debug!("no descriptor for field {}", child.field_name());
                self.field_error(
                    path,
                    FieldError::new(format!(
                        "cannot resolve field '{}' on '{}'",
                        child.field_name(),
                        frame.concrete
                    )),
                    FIELD_RESOLUTION_ERROR,
                );
                continue;
            };
            let arguments =
                descriptor.coerce_arguments(child.arguments(), self.context.variables());
            match descriptor.resolve(&*frame.object, &arguments, self.context) {
                Ok(value) => {
                    let invocation = Arc::new(Invocation {
                        descriptor: descriptor.clone(),
                        arguments,
                    });
                    self.complete(path, child, child.return_type(), value, &invocation);
                }
                Err(error)
                    if connection.is_some_and(|state| {
                        error.is_missing_capability() || state.filtered(self.context).is_err()
                    }) =>
                {
                    // unsupported fields and a failing pipeline fail the whole connection
                    self.write(&frame.path, Value::Null);
                    self.field_error(frame.path, error, FIELD_RESOLUTION_ERROR);
                    return;
                }
                Err(error) => self.field_error(path, error, FIELD_RESOLUTION_ERROR),
            }
        }
    }

    /// Places `value`, the value of the field `node` typed `ty`, at `path`.
    fn complete(
        &mut self,
        path: Path,
        node: &'a SelectionNode,
        ty: &ast::Type,
        value: FieldValue,
        invocation: &Arc<Invocation>,
    ) {
        let value = match (invocation.descriptor.connection(), item_type(ty), value) {
            (Some(definition), None, FieldValue::Collection(items)) => {
                self.connection(ty, definition, items, invocation)
            }
            (Some(definition), None, FieldValue::Value(Value::Array(values))) => {
                let items: Vec<Element> = values.into_iter().map(Element::Value).collect();
                self.connection(ty, definition, Arc::new(items), invocation)
            }
            (_, _, value) => value,
        };

        match value {
            FieldValue::Lazy(lazy) => self.enqueue(path, node, ty, lazy, invocation),
            FieldValue::Deferred(marker) => {
                match self.schema.lazy_resolver(&invocation.descriptor, &marker) {
                    Ok(resolver) => {
                        let lazy = resolver(marker, &invocation.arguments, self.context);
                        self.enqueue(path, node, ty, lazy, invocation);
                    }
                    Err(error) => self.field_error(path, error, FIELD_RESOLUTION_ERROR),
                }
            }
            FieldValue::Value(Value::Null) => self.null(path, ty),
            FieldValue::Value(Value::Array(values)) if item_type(ty).is_some() => {
                self.complete_list(path, node, ty, values.into_iter().map(FieldValue::Value), invocation)
            }
            FieldValue::Value(Value::Object(fields)) if node.is_composite() => {
                let type_name = fields
                    .get(TYPENAME)
                    .and_then(|type_name| type_name.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| single_type(node, ty));
                self.complete_object(path, node, ty, Arc::new(JsonObject::new(type_name, fields)))
            }
            FieldValue::Value(value) => {
                self.write(&path, value);
            }
            FieldValue::List(items) if item_type(ty).is_some() => {
                self.complete_list(path, node, ty, items.into_iter(), invocation)
            }
            FieldValue::Collection(items) if item_type(ty).is_some() => {
                let items: Vec<FieldValue> = items.elements().map(FieldValue::from).collect();
                self.complete_list(path, node, ty, items.into_iter(), invocation)
            }
            FieldValue::Object(object) if item_type(ty).is_none() => {
                self.complete_object(path, node, ty, object)
            }
            other => {
                let error = FieldError::new(format!(
                    "expected a value of type '{ty}' for field '{}', got {other:?}",
                    node.field_name()
                ))
                .with_code(INVALID_VALUE);
                self.write(&path, Value::Null);
                self.field_error(path, error, INVALID_VALUE);
            }
        }
    }

    fn complete_list(
        &mut self,
        path: Path,
        node: &'a SelectionNode,
        ty: &ast::Type,
        items: impl ExactSizeIterator<Item = FieldValue>,
        invocation: &Arc<Invocation>,
    ) {
        let Some(item_type) = item_type(ty) else {
            failfast_error!("field {} completed as a list with type '{ty}'", node.field_name());
            return;
        };
        if !self.write(&path, Value::Array(vec![Value::Null; items.len()])) {
            return;
        }
        for (index, item) in items.enumerate() {
            self.complete(path.join(index), node, item_type, item, invocation);
        }
    }

    fn complete_object(
        &mut self,
        path: Path,
        node: &'a SelectionNode,
        ty: &ast::Type,
        object: Arc<dyn Resolvable>,
    ) {
        if !node.is_composite() {
            let error = FieldError::new(format!(
                "field '{}' of type '{ty}' has no sub-selection for object '{}'",
                node.field_name(),
                object.type_name()
            ))
            .with_code(INVALID_VALUE);
            self.write(&path, Value::Null);
            return self.field_error(path, error, INVALID_VALUE);
        }
        let Some((concrete, _)) = node.typed_children().get_key_value(object.type_name()) else {
            let error = FieldError::new(format!(
                "'{}' is not a possible type of field '{}'",
                object.type_name(),
                node.field_name()
            ))
            .with_code(INVALID_VALUE);
            self.write(&path, Value::Null);
            return self.field_error(path, error, INVALID_VALUE);
        };
        let concrete = concrete.clone();
        if self.write(&path, Value::Object(Object::new())) {
            self.frontier.push_back(Frame {
                path,
                object,
                concrete,
                node,
            });
        }
    }

    fn connection(
        &self,
        ty: &ast::Type,
        definition: &Arc<ConnectionDefinition>,
        items: Arc<dyn Collection>,
        invocation: &Invocation,
    ) -> FieldValue {
        let type_name = ty.inner_named_type();
        FieldValue::Object(Arc::new(ConnectionState::new(
            type_name,
            self.schema.connection_shape(type_name),
            items,
            definition.clone(),
            invocation.arguments.clone(),
            self.schema.configuration().connections.max_page_size,
        )))
    }

    fn enqueue(
        &mut self,
        path: Path,
        node: &'a SelectionNode,
        ty: &ast::Type,
        lazy: LazyValue,
        invocation: &Arc<Invocation>,
    ) {
        self.pending.push(Pending {
            path,
            node,
            ty: ty.clone(),
            invocation: invocation.clone(),
            lazy,
        });
    }

    fn null(&mut self, path: Path, ty: &ast::Type) {
        self.write(&path, Value::Null);
        if ty.is_non_null() {
            let error = FieldError::new(format!("cannot return null for non-nullable type '{ty}'"));
            self.field_error(path, error, NULL_VALUE);
        }
    }

    /// Returns `false` when the slot at `path` no longer exists.
    fn write(&mut self, path: &Path, value: Value) -> bool {
        match self.data.get_path_mut(path) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn field_error(&mut self, path: Path, error: FieldError, default_code: &str) {
        tracing::debug!("field {path} failed: {}", error.message());
        self.errors.push(error.into_graphql_error(path, default_code));
    }
}

/// Forces one batch of lazy values. Returns `None` when cancelled before the batch completed.
async fn drain(
    mode: DrainMode,
    futures: Vec<BoxFuture<'static, Forced>>,
    cancellation: CancellationToken,
) -> Option<Vec<Forced>> {
    let batch = async move {
        match mode {
            DrainMode::Concurrent => future::join_all(futures).await,
            DrainMode::Sequential => {
                let mut results = Vec::with_capacity(futures.len());
                for future in futures {
                    results.push(future.await);
                }
                results
            }
        }
    };
    let cancelled = cancellation.cancelled();
    match future::select(std::pin::pin!(batch), std::pin::pin!(cancelled)).await {
        Either::Left((results, _)) => Some(results),
        Either::Right(_) => None,
    }
}

fn item_type(ty: &ast::Type) -> Option<&ast::Type> {
    match ty {
        ast::Type::List(inner) | ast::Type::NonNullList(inner) => Some(&**inner),
        ast::Type::Named(_) | ast::Type::NonNullNamed(_) => None,
    }
}

fn single_type(node: &SelectionNode, ty: &ast::Type) -> String {
    match node.typed_children().keys().collect::<Vec<_>>().as_slice() {
        [concrete] => concrete.to_string(),
        _ => ty.inner_named_type().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json_bytes::json;

    use super::*;
    use crate::configuration::Configuration;
    use crate::configuration::Execution as ExecutionConfiguration;
    use crate::field::DeferredMarker;

    const SCHEMA: &str = r#"
        interface Animal { name: String! }
        type Dog implements Animal { name: String! barks: Boolean }
        type Cat implements Animal { name: String! meows: Boolean }
        type Query { pets: [Animal] favorite: Animal count: Int! greeting(name: String = "world"): String }
    "#;

    struct Pet {
        type_name: &'static str,
        name: &'static str,
    }

    impl Resolvable for Pet {
        fn type_name(&self) -> &str {
            self.type_name
        }

        fn call(
            &self,
            method: &str,
            _arguments: &Object,
            _context: &ExecutionContext,
        ) -> Option<Result<FieldValue, FieldError>> {
            match method {
                "name" => Some(Ok(FieldValue::from(self.name))),
                "barks" => Some(Ok(FieldValue::from(true))),
                "meows" => Some(Ok(FieldValue::from(false))),
                _ => None,
            }
        }
    }

    struct Query;

    impl Resolvable for Query {
        fn type_name(&self) -> &str {
            "Query"
        }

        fn call(
            &self,
            method: &str,
            arguments: &Object,
            _context: &ExecutionContext,
        ) -> Option<Result<FieldValue, FieldError>> {
            match method {
                "pets" => Some(Ok(FieldValue::list([
                    FieldValue::object(Pet {
                        type_name: "Dog",
                        name: "Rex",
                    }),
                    FieldValue::object(Pet {
                        type_name: "Cat",
                        name: "Tom",
                    }),
                ]))),
                "greeting" => Some(Ok(FieldValue::Value(Value::from(format!(
                    "hello {}",
                    arguments.get("name").and_then(|v| v.as_str()).unwrap_or_default()
                ))))),
                "count" => Some(Ok(FieldValue::null())),
                _ => None,
            }
        }
    }

    fn schema() -> ExecutableSchema {
        ExecutableSchema::parse(SCHEMA).unwrap()
    }

    async fn run(schema: &ExecutableSchema, query: &str) -> graphql::Response {
        run_with(schema, query, ExecutionContext::default()).await
    }

    async fn run_with(
        schema: &ExecutableSchema,
        query: &str,
        context: ExecutionContext,
    ) -> graphql::Response {
        let document =
            ExecutableDocument::parse_and_validate(schema.definitions(), query, "query.graphql")
                .unwrap();
        execute_request(schema, &document, None, Arc::new(Query), &context).await
    }

    #[tokio::test]
    async fn polymorphic_lists_pick_the_bucket_of_each_item() {
        let response = run(
            &schema(),
            "{ pets { __typename name ... on Dog { barks } ... on Cat { meows } } }",
        )
        .await;
        assert!(response.errors.is_empty());
        assert_eq!(
            response.data,
            Some(json!({
                "pets": [
                    { "__typename": "Dog", "name": "Rex", "barks": true },
                    { "__typename": "Cat", "name": "Tom", "meows": false }
                ]
            }))
        );
    }

    #[tokio::test]
    async fn excluded_fields_contribute_no_key() {
        let response = run(&schema(), "{ greeting pets @skip(if: true) { name } }").await;
        assert_eq!(response.data, Some(json!({ "greeting": "hello world" })));
    }

    #[tokio::test]
    async fn declared_defaults_fill_missing_arguments() {
        let response = run(&schema(), r#"{ a: greeting b: greeting(name: "you") }"#).await;
        assert_eq!(
            response.data,
            Some(json!({ "a": "hello world", "b": "hello you" }))
        );
    }

    #[tokio::test]
    async fn null_for_non_null_field_is_reported() {
        let response = run(&schema(), "{ count greeting }").await;
        assert_eq!(
            response.data,
            Some(json!({ "count": null, "greeting": "hello world" }))
        );
        let error = response.errors_with_code(NULL_VALUE).next().unwrap();
        assert_eq!(error.path, Some(Path::from("count")));
    }

    #[tokio::test]
    async fn missing_getter_is_a_capability_error() {
        let response = run(&schema(), "{ favorite { name } }").await;
        assert_eq!(response.data, Some(json!({ "favorite": null })));
        insta::assert_snapshot!(response.errors[0].message, @"'Query' does not support 'favorite'");
        assert_eq!(response.errors[0].extension_code(), Some("MISSING_CAPABILITY"));
    }

    #[tokio::test]
    async fn chained_lazy_values_are_unwound() {
        let mut schema = schema();
        schema
            .register(
                "Query",
                "greeting",
                FieldDescriptor::new().with_resolver(|_, _, _| {
                    Ok(FieldValue::lazy(LazyValue::from_fn(|| {
                        Ok(FieldValue::lazy(LazyValue::new(async {
                            Ok(FieldValue::from("late"))
                        })))
                    })))
                }),
            )
            .unwrap();
        let response = run(&schema, "{ greeting }").await;
        assert_eq!(response.data, Some(json!({ "greeting": "late" })));
    }

    #[tokio::test]
    async fn deferred_markers_use_the_registered_resolver() {
        struct Reference(&'static str);

        let mut schema = schema();
        schema.register_deferred::<Reference, _>(|marker, _, _| {
            let name = marker.downcast_ref::<Reference>().map(|reference| reference.0);
            let value = FieldValue::from(name.unwrap_or_default());
            LazyValue::from_fn(move || Ok(value))
        });
        schema
            .register(
                "Query",
                "greeting",
                FieldDescriptor::new()
                    .with_resolver(|_, _, _| Ok(FieldValue::deferred(Reference("ref")))),
            )
            .unwrap();
        let response = run(&schema, "{ greeting }").await;
        assert_eq!(response.data, Some(json!({ "greeting": "ref" })));

        schema
            .register(
                "Query",
                "greeting",
                FieldDescriptor::new()
                    .with_resolver(|_, _, _| Ok(FieldValue::Deferred(DeferredMarker::new(1u32)))),
            )
            .unwrap();
        let response = run(&schema, "{ greeting }").await;
        assert_eq!(response.data, Some(json!({ "greeting": null })));
        assert_eq!(response.errors.len(), 1);
    }

    #[tokio::test]
    async fn deferred_errors_are_attributed_to_their_field() {
        let mut schema = schema();
        schema
            .register(
                "Query",
                "greeting",
                FieldDescriptor::new().with_resolver(|_, _, _| {
                    Ok(FieldValue::lazy(LazyValue::from_fn(|| {
                        Err(FieldError::new("backend unavailable"))
                    })))
                }),
            )
            .unwrap();
        let response = run(&schema, "{ pets { name } greeting }").await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, Some(Path::from("greeting")));
        assert_eq!(response.errors[0].extension_code(), Some(DEFERRED_RESOLUTION_ERROR));
        assert_eq!(
            response.data.unwrap().get_path(&Path::from("pets/1")),
            Some(&json!({ "name": "Tom" }))
        );
    }

    #[tokio::test]
    async fn sequential_drain_mode_completes_lazy_values() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut schema = schema()
            .with_configuration(
                Configuration::builder()
                    .execution(
                        ExecutionConfiguration::builder()
                            .drain_mode(DrainMode::Sequential)
                            .build(),
                    )
                    .build(),
            )
            .unwrap();
        let recorded = order.clone();
        schema
            .register(
                "Dog",
                "name",
                FieldDescriptor::new().with_resolver(move |object, _, _| {
                    let name = object.call("name", &Object::new(), &ExecutionContext::default());
                    let recorded = recorded.clone();
                    Ok(FieldValue::lazy(LazyValue::from_fn(move || {
                        recorded.lock().unwrap().push("dog");
                        name.unwrap_or_else(|| Ok(FieldValue::null()))
                    })))
                }),
            )
            .unwrap();
        let response = run(&schema, "{ pets { name } }").await;
        assert_eq!(
            response.data,
            Some(json!({ "pets": [{ "name": "Rex" }, { "name": "Tom" }] }))
        );
        assert_eq!(*order.lock().unwrap(), vec!["dog"]);
    }

    #[tokio::test]
    async fn type_mismatch_is_invalid_value() {
        let mut schema = schema();
        schema
            .register(
                "Query",
                "favorite",
                FieldDescriptor::new().with_resolver(|_, _, _| {
                    Ok(FieldValue::object(Pet {
                        type_name: "Bird",
                        name: "Tweety",
                    }))
                }),
            )
            .unwrap();
        let response = run(&schema, "{ favorite { name } }").await;
        assert_eq!(response.data, Some(json!({ "favorite": null })));
        assert_eq!(response.errors_with_code(INVALID_VALUE).count(), 1);
    }

    #[tokio::test]
    async fn json_objects_are_resolved_by_key() {
        let mut schema = schema();
        schema
            .register(
                "Query",
                "favorite",
                FieldDescriptor::new().with_resolver(|_, _, _| {
                    Ok(FieldValue::Value(json!({ "__typename": "Cat", "name": "Felix" })))
                }),
            )
            .unwrap();
        let response = run(&schema, "{ favorite { name ... on Cat { meows } } }").await;
        assert_eq!(
            response.data,
            Some(json!({ "favorite": { "name": "Felix", "meows": null } }))
        );
    }

    #[tokio::test]
    async fn drain_limit_keeps_partial_data() {
        let mut schema = schema()
            .with_configuration(
                Configuration::builder()
                    .execution(ExecutionConfiguration::builder().max_drain_steps(1).build())
                    .build(),
            )
            .unwrap();
        schema
            .register(
                "Query",
                "greeting",
                FieldDescriptor::new().with_resolver(|_, _, _| {
                    Ok(FieldValue::lazy(LazyValue::from_fn(|| {
                        Ok(FieldValue::lazy(LazyValue::from_fn(|| Ok(FieldValue::from("never")))))
                    })))
                }),
            )
            .unwrap();
        let response = run(&schema, "{ greeting pets { name } }").await;
        let data = response.data.as_ref().unwrap();
        assert_eq!(data.get_path(&Path::from("greeting")), Some(&Value::Null));
        assert_eq!(data.get_path(&Path::from("pets/0/name")), Some(&json!("Rex")));
        let error = response.errors.last().unwrap();
        assert_eq!(error.extension_code(), Some("DRAIN_LIMIT_EXCEEDED"));
        assert_eq!(error.path, None);
    }

    #[tokio::test]
    async fn unknown_operation_has_no_data() {
        let schema = schema();
        let document = ExecutableDocument::parse_and_validate(
            schema.definitions(),
            "query A { count }",
            "query.graphql",
        )
        .unwrap();
        let response = execute_request(
            &schema,
            &document,
            Some("B"),
            Arc::new(Query),
            &ExecutionContext::default(),
        )
        .await;
        assert_eq!(response.data, None);
        assert_eq!(
            response.errors[0].extension_code(),
            Some("GRAPHQL_UNKNOWN_OPERATION_NAME")
        );
    }
}
