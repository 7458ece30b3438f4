//! GraphQL schema with field descriptors attached.

use std::any::Any;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::NamedType;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::validation::Valid;
use dashmap::DashMap;
use indexmap::IndexMap;

use crate::configuration::Configuration;
use crate::context::ExecutionContext;
use crate::error::ConfigurationError;
use crate::error::FieldError;
use crate::field::DeferredMarker;
use crate::field::FieldDescriptor;
use crate::field::LazyResolver;
use crate::field::LazyValue;
use crate::field::literal_to_json;
use crate::json_ext::Object;

/// Type names a connection type refers to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ConnectionShape {
    pub(crate) edge_type: Option<NamedType>,
    pub(crate) page_info_type: Option<NamedType>,
}

/// A validated schema with the [`FieldDescriptor`]s used to resolve its fields.
pub struct ExecutableSchema {
    definitions: Valid<Schema>,
    descriptors: IndexMap<NamedType, IndexMap<Name, Arc<FieldDescriptor>>>,
    defaults: DashMap<(NamedType, Name), Arc<FieldDescriptor>>,
    deferred: HashMap<TypeId, Option<LazyResolver>>,
    configuration: Configuration,
}

impl ExecutableSchema {
    pub fn new(definitions: Valid<Schema>) -> Self {
        Self {
            definitions,
            descriptors: IndexMap::new(),
            defaults: DashMap::new(),
            deferred: HashMap::new(),
            configuration: Configuration::default(),
        }
    }

    /// Parses and validates `sdl`.
    pub fn parse(sdl: &str) -> Result<Self, ConfigurationError> {
        let definitions = Schema::parse_and_validate(sdl, "schema.graphql").map_err(|e| {
            ConfigurationError::InvalidConfiguration {
                message: "invalid schema",
                error: e.errors.to_string(),
            }
        })?;
        Ok(Self::new(definitions))
    }

    pub fn with_configuration(
        mut self,
        configuration: Configuration,
    ) -> Result<Self, ConfigurationError> {
        configuration.validate()?;
        self.configuration = configuration;
        Ok(self)
    }

    pub fn definitions(&self) -> &Valid<Schema> {
        &self.definitions
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Attaches `descriptor` to the field `type_name.field_name`.
    ///
    /// The descriptor is named after the field, its return type is bound to the declared one
    /// and the declared arguments it does not override are imported.
    pub fn register(
        &mut self,
        type_name: &str,
        field_name: &str,
        mut descriptor: FieldDescriptor,
    ) -> Result<(), ConfigurationError> {
        let (type_key, definition) = self.field_definition(type_name, field_name)?;
        import_definition(&mut descriptor, definition)?;
        let field_key = definition.name.clone();
        tracing::trace!("registered field descriptor for {type_name}.{field_name}");
        self.descriptors
            .entry(type_key)
            .or_default()
            .insert(field_key, Arc::new(descriptor));
        Ok(())
    }

    /// Marks values of type `T` as deferred. Fields returning them need a lazy resolver.
    pub fn register_deferred_type<T>(&mut self)
    where
        T: Any + Send + Sync,
    {
        self.deferred.insert(TypeId::of::<T>(), None);
    }

    /// Marks values of type `T` as deferred, resolved by `resolver` unless the field
    /// declares its own lazy resolver.
    pub fn register_deferred<T, F>(&mut self, resolver: F)
    where
        T: Any + Send + Sync,
        F: Fn(DeferredMarker, &Object, &ExecutionContext) -> LazyValue + Send + Sync + 'static,
    {
        self.deferred
            .insert(TypeId::of::<T>(), Some(Arc::new(resolver)));
    }

    /// The descriptor resolving `field_name` on objects of the concrete type `type_name`.
    ///
    /// Looks at the type itself, then at the interfaces it implements, and falls back to a
    /// default descriptor resolving the field by its own name.
    pub fn descriptor(&self, type_name: &str, field_name: &str) -> Option<Arc<FieldDescriptor>> {
        if let Some(descriptor) = self.registered(type_name, field_name) {
            return Some(descriptor.clone());
        }
        if let Some(ExtendedType::Object(object)) = self.definitions.types.get(type_name) {
            for interface in &object.implements_interfaces {
                if let Some(descriptor) = self.registered(interface.name.as_str(), field_name) {
                    return Some(descriptor.clone());
                }
            }
        }
        let (type_key, definition) = self.field_definition(type_name, field_name).ok()?;
        let key = (type_key, definition.name.clone());
        if let Some(descriptor) = self.defaults.get(&key) {
            return Some(descriptor.value().clone());
        }
        let mut descriptor = FieldDescriptor::new();
        if let Err(error) = import_definition(&mut descriptor, definition) {
            failfast_debug!("cannot build default descriptor for {type_name}.{field_name}: {error}");
            return None;
        }
        Some(
            self.defaults
                .entry(key)
                .or_insert_with(|| Arc::new(descriptor))
                .value()
                .clone(),
        )
    }

    fn registered(&self, type_name: &str, field_name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.descriptors.get(type_name)?.get(field_name)
    }

    fn field_definition(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Result<(NamedType, &FieldDefinition), ConfigurationError> {
        let (type_key, _) = self
            .definitions
            .types
            .get_key_value(type_name)
            .ok_or_else(|| ConfigurationError::UnknownType(type_name.to_string()))?;
        let definition: &FieldDefinition = self
            .definitions
            .type_field(type_name, field_name)
            .map_err(|_| ConfigurationError::UnknownField {
                type_name: type_name.to_string(),
                field: field_name.to_string(),
            })?;
        Ok((type_key.clone(), definition))
    }

    /// The lazy resolver for a deferred marker returned by a field.
    pub(crate) fn lazy_resolver(
        &self,
        descriptor: &FieldDescriptor,
        marker: &DeferredMarker,
    ) -> Result<LazyResolver, FieldError> {
        match self.deferred.get(&marker.payload_type_id()) {
            None => Err(FieldError::new(format!(
                "'{}' is not a registered deferred type",
                marker.payload_type_name()
            ))),
            Some(default) => descriptor
                .lazy_resolver()
                .or(default.as_ref())
                .cloned()
                .ok_or_else(|| {
                    FieldError::new(format!(
                        "no lazy resolver for deferred type '{}'",
                        marker.payload_type_name()
                    ))
                }),
        }
    }

    /// Concrete object types an object of static type `type_name` can have at runtime, in
    /// schema order. Empty for leaf types.
    pub(crate) fn possible_types(&self, type_name: &str) -> Vec<NamedType> {
        match self.definitions.types.get_key_value(type_name) {
            Some((name, ExtendedType::Object(_))) => vec![name.clone()],
            Some((_, ExtendedType::Interface(_) | ExtendedType::Union(_))) => self
                .definitions
                .types
                .iter()
                .filter(|(name, ty)| {
                    matches!(ty, ExtendedType::Object(_))
                        && self.definitions.is_subtype(type_name, name)
                })
                .map(|(name, _)| name.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether an object of concrete type `concrete` satisfies the type condition `condition`.
    pub(crate) fn satisfies(&self, concrete: &str, condition: &str) -> bool {
        concrete == condition || self.definitions.is_subtype(condition, concrete)
    }

    pub(crate) fn connection_shape(&self, connection_type: &str) -> ConnectionShape {
        let inner = |field: &str| {
            self.definitions
                .type_field(connection_type, field)
                .ok()
                .map(|definition| definition.ty.inner_named_type().clone())
        };
        ConnectionShape {
            edge_type: inner("edges"),
            page_info_type: inner("pageInfo"),
        }
    }
}

fn import_definition(
    descriptor: &mut FieldDescriptor,
    definition: &FieldDefinition,
) -> Result<(), ConfigurationError> {
    descriptor.set_name(definition.name.clone())?;
    descriptor.return_type().bind(definition.ty.clone())?;
    for argument in &definition.arguments {
        if descriptor.arguments().contains_key(&argument.name) {
            continue;
        }
        let default_value = argument
            .default_value
            .as_ref()
            .and_then(|value| literal_to_json(value, &Object::new()));
        descriptor.declare_argument(argument.name.clone(), (*argument.ty).clone(), default_value);
    }
    Ok(())
}
