//! Field descriptors: how one schema field is resolved.

mod arguments;
mod binding;
mod lazy;
mod value;

use std::fmt;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;

pub(crate) use self::arguments::literal_to_json;
pub use self::binding::TypeBinding;
pub use self::lazy::LazyValue;
pub use self::value::Collection;
pub use self::value::DeferredMarker;
pub use self::value::Element;
pub use self::value::FieldValue;
pub use self::value::JsonObject;
pub use self::value::Resolvable;
use crate::connection::ConnectionDefinition;
use crate::context::ExecutionContext;
use crate::cost::Cost;
use crate::error::ConfigurationError;
use crate::error::FieldError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A custom synchronous resolution strategy.
pub type Resolver = Arc<
    dyn Fn(&dyn Resolvable, &Object, &ExecutionContext) -> Result<FieldValue, FieldError>
        + Send
        + Sync,
>;

/// A deferred resolution strategy, invoked with the payload of a [`DeferredMarker`].
pub type LazyResolver =
    Arc<dyn Fn(DeferredMarker, &Object, &ExecutionContext) -> LazyValue + Send + Sync>;

#[derive(Clone)]
enum Strategy {
    Default {
        lookup_key: Option<String>,
        method: Option<String>,
    },
    Custom(Resolver),
}

/// A declared argument of a field.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgumentDeclaration {
    pub ty: ast::Type,
    pub default_value: Option<Value>,
}

/// Definition of one schema field: resolution strategies, cost and arguments.
///
/// Descriptors hold configuration only. They are shared by every execution.
pub struct FieldDescriptor {
    name: OnceCell<Name>,
    return_type: TypeBinding,
    strategy: Strategy,
    lazy_resolver: Option<LazyResolver>,
    cost: Cost,
    arguments: IndexMap<Name, ArgumentDeclaration>,
    default_arguments: OnceCell<Object>,
    connection: Option<Arc<ConnectionDefinition>>,
}

impl Default for FieldDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldDescriptor {
    /// An unnamed descriptor using the default resolution strategy.
    ///
    /// [`ExecutableSchema::register`](crate::ExecutableSchema::register) names it after the
    /// field it is registered for.
    pub fn new() -> Self {
        Self {
            name: OnceCell::new(),
            return_type: TypeBinding::unbound(),
            strategy: Strategy::Default {
                lookup_key: None,
                method: None,
            },
            lazy_resolver: None,
            cost: Cost::default(),
            arguments: IndexMap::new(),
            default_arguments: OnceCell::new(),
            connection: None,
        }
    }

    pub fn named(name: Name) -> Self {
        let descriptor = Self::new();
        let _ = descriptor.name.set(name);
        descriptor
    }

    pub fn name(&self) -> Option<&Name> {
        self.name.get()
    }

    /// Sets the response name. Setting it again to a different value fails.
    pub fn set_name(&self, name: Name) -> Result<(), ConfigurationError> {
        let current = self.name.get_or_init(|| name.clone());
        if *current == name {
            Ok(())
        } else {
            Err(ConfigurationError::FieldRenamed {
                current: current.to_string(),
                requested: name.to_string(),
            })
        }
    }

    /// Resolves the field by indexing the object with `key`.
    pub fn with_lookup_key(mut self, key: impl Into<String>) -> Self {
        let method = self.configured_method();
        self.strategy = Strategy::Default {
            lookup_key: Some(key.into()),
            method,
        };
        self
    }

    /// Resolves the field by calling the getter `method` on the object.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        let lookup_key = self.configured_lookup_key();
        self.strategy = Strategy::Default {
            lookup_key,
            method: Some(method.into()),
        };
        self
    }

    /// Replaces the default strategy, and any lookup key or method, by `resolver`.
    pub fn with_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&dyn Resolvable, &Object, &ExecutionContext) -> Result<FieldValue, FieldError>
            + Send
            + Sync
            + 'static,
    {
        self.strategy = Strategy::Custom(Arc::new(resolver));
        self
    }

    pub fn with_lazy_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(DeferredMarker, &Object, &ExecutionContext) -> LazyValue + Send + Sync + 'static,
    {
        self.lazy_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_cost(mut self, cost: Cost) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_return_type(mut self, return_type: TypeBinding) -> Self {
        self.return_type = return_type;
        self
    }

    /// Declares an argument. Redeclaring an argument replaces it.
    pub fn with_argument(mut self, name: Name, ty: ast::Type, default_value: Option<Value>) -> Self {
        self.declare_argument(name, ty, default_value);
        self
    }

    pub fn with_connection(mut self, connection: ConnectionDefinition) -> Self {
        self.connection = Some(Arc::new(connection));
        self
    }

    pub(crate) fn declare_argument(
        &mut self,
        name: Name,
        ty: ast::Type,
        default_value: Option<Value>,
    ) {
        self.arguments.insert(name, ArgumentDeclaration { ty, default_value });
        self.default_arguments = OnceCell::new();
    }

    pub fn return_type(&self) -> &TypeBinding {
        &self.return_type
    }

    pub fn cost(&self) -> &Cost {
        &self.cost
    }

    pub fn arguments(&self) -> &IndexMap<Name, ArgumentDeclaration> {
        &self.arguments
    }

    pub fn connection(&self) -> Option<&Arc<ConnectionDefinition>> {
        self.connection.as_ref()
    }

    pub fn lazy_resolver(&self) -> Option<&LazyResolver> {
        self.lazy_resolver.as_ref()
    }

    pub fn has_custom_resolver(&self) -> bool {
        matches!(self.strategy, Strategy::Custom(_))
    }

    pub fn lookup_key(&self) -> Option<&str> {
        match &self.strategy {
            Strategy::Default { lookup_key, .. } => lookup_key.as_deref(),
            Strategy::Custom(_) => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match &self.strategy {
            Strategy::Default { method, .. } => method.as_deref(),
            Strategy::Custom(_) => None,
        }
    }

    fn configured_method(&self) -> Option<String> {
        self.method().map(str::to_string)
    }

    fn configured_lookup_key(&self) -> Option<String> {
        self.lookup_key().map(str::to_string)
    }

    /// Arguments with a declared default, computed once.
    pub fn default_arguments(&self) -> &Object {
        self.default_arguments.get_or_init(|| {
            self.arguments
                .iter()
                .filter_map(|(name, declaration)| {
                    declaration
                        .default_value
                        .clone()
                        .map(|value| (name.as_str().into(), value))
                })
                .collect()
        })
    }

    /// Argument map of one invocation: declared defaults overlaid with the query literals.
    pub fn coerce_arguments(
        &self,
        literals: &[Node<ast::Argument>],
        variables: &Object,
    ) -> Object {
        arguments::coerce(self.default_arguments(), literals, variables)
    }

    /// Synchronous resolution.
    ///
    /// The default strategy indexes the object by the lookup key if one is configured, then
    /// calls the configured method, then calls the getter named after the field.
    pub fn resolve(
        &self,
        object: &dyn Resolvable,
        arguments: &Object,
        context: &ExecutionContext,
    ) -> Result<FieldValue, FieldError> {
        match &self.strategy {
            Strategy::Custom(resolver) => resolver(object, arguments, context),
            Strategy::Default {
                lookup_key: Some(key),
                ..
            } => Ok(object.lookup(key).unwrap_or_else(FieldValue::null)),
            Strategy::Default {
                lookup_key: None,
                method,
            } => {
                let method = match method.as_deref().or(self.name().map(Name::as_str)) {
                    Some(method) => method,
                    None => return Err(FieldError::new("field descriptor has no name")),
                };
                object
                    .call(method, arguments, context)
                    .unwrap_or_else(|| {
                        Err(FieldError::missing_capability(object.type_name(), method))
                    })
            }
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name.get())
            .field("return_type", &self.return_type)
            .field("lookup_key", &self.lookup_key())
            .field("method", &self.method())
            .field("custom_resolver", &self.has_custom_resolver())
            .field("arguments", &self.arguments)
            .finish()
    }
}
