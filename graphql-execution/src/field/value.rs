use std::any::Any;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::FieldError;
use crate::field::LazyValue;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A runtime object that fields are resolved against.
///
/// This is the attribute accessor capability used by the default resolution strategy:
/// [`lookup`](Resolvable::lookup) indexes the object by key and [`call`](Resolvable::call)
/// invokes a named getter.
pub trait Resolvable: Any + Send + Sync {
    /// Name of the concrete schema type of this object.
    fn type_name(&self) -> &str;

    /// Indexes the object by `key`. A missing key resolves to `null`.
    fn lookup(&self, _key: &str) -> Option<FieldValue> {
        None
    }

    /// Invokes the getter named `method`.
    ///
    /// Returns `None` when the object has no such getter.
    fn call(
        &self,
        _method: &str,
        _arguments: &Object,
        _context: &ExecutionContext,
    ) -> Option<Result<FieldValue, FieldError>> {
        None
    }
}

impl dyn Resolvable {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref::<T>()
    }
}

/// The backing sequence of a connection.
///
/// A connection forwards exactly these operations to the sequence it wraps.
pub trait Collection: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<Element>;

    fn elements(&self) -> Box<dyn Iterator<Item = Element> + '_> {
        Box::new((0..self.len()).filter_map(move |index| self.get(index)))
    }

    /// Named capability of the sequence, such as an aggregate.
    ///
    /// Returns `None` when the sequence does not support `method`.
    fn call(
        &self,
        _method: &str,
        _arguments: &Object,
        _context: &ExecutionContext,
    ) -> Option<Result<FieldValue, FieldError>> {
        None
    }
}

impl Collection for Vec<Element> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<Element> {
        self.as_slice().get(index).cloned()
    }

    fn elements(&self) -> Box<dyn Iterator<Item = Element> + '_> {
        Box::new(self.iter().cloned())
    }
}

/// One element of a [`Collection`].
#[derive(Clone)]
pub enum Element {
    Value(Value),
    Object(Arc<dyn Resolvable>),
}

impl Element {
    pub fn object(object: impl Resolvable) -> Self {
        Element::Object(Arc::new(object))
    }
}

impl From<Element> for FieldValue {
    fn from(element: Element) -> Self {
        match element {
            Element::Value(value) => FieldValue::Value(value),
            Element::Object(object) => FieldValue::Object(object),
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Element::Object(object) => f.debug_tuple("Object").field(&object.type_name()).finish(),
        }
    }
}

/// A deferred payload returned by a resolver.
///
/// When the payload's Rust type was registered on the schema with
/// [`ExecutableSchema::register_deferred`](crate::ExecutableSchema::register_deferred), the
/// engine resolves it later through the field's lazy resolver.
#[derive(Clone)]
pub struct DeferredMarker {
    type_id: TypeId,
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl DeferredMarker {
    pub fn new<T>(payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            payload: Arc::new(payload),
        }
    }

    pub fn payload_type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn payload_type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for DeferredMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeferredMarker").field(&self.type_name).finish()
    }
}

/// What a resolution strategy produces for a field.
pub enum FieldValue {
    /// A JSON value. Objects are completed against the field's sub-selection.
    Value(Value),
    Object(Arc<dyn Resolvable>),
    List(Vec<FieldValue>),
    /// The backing sequence of a connection field, or of a plain list field.
    Collection(Arc<dyn Collection>),
    Lazy(LazyValue),
    Deferred(DeferredMarker),
}

impl FieldValue {
    pub fn null() -> Self {
        FieldValue::Value(Value::Null)
    }

    pub fn object(object: impl Resolvable) -> Self {
        FieldValue::Object(Arc::new(object))
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FieldValue>,
    {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn collection(collection: impl Collection + 'static) -> Self {
        FieldValue::Collection(Arc::new(collection))
    }

    pub fn lazy(lazy: LazyValue) -> Self {
        FieldValue::Lazy(lazy)
    }

    pub fn deferred<T>(payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        FieldValue::Deferred(DeferredMarker::new(payload))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Value(Value::Null))
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldValue::Object(object) => f.debug_tuple("Object").field(&object.type_name()).finish(),
            FieldValue::List(items) => f.debug_tuple("List").field(items).finish(),
            FieldValue::Collection(collection) => {
                f.debug_tuple("Collection").field(&collection.len()).finish()
            }
            FieldValue::Lazy(lazy) => lazy.fmt(f),
            FieldValue::Deferred(marker) => marker.fmt(f),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Value(Value::Bool(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

impl From<LazyValue> for FieldValue {
    fn from(lazy: LazyValue) -> Self {
        FieldValue::Lazy(lazy)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(FieldValue::null)
    }
}

/// A plain JSON object exposed as a [`Resolvable`].
///
/// Every key is both a lookup key and a getter, missing keys resolve to `null`.
#[derive(Clone, Debug)]
pub struct JsonObject {
    type_name: String,
    fields: Object,
}

impl JsonObject {
    pub fn new(type_name: impl Into<String>, fields: Object) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    pub fn fields(&self) -> &Object {
        &self.fields
    }
}

impl Resolvable for JsonObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn lookup(&self, key: &str) -> Option<FieldValue> {
        self.fields.get(key).cloned().map(FieldValue::Value)
    }

    fn call(
        &self,
        method: &str,
        _arguments: &Object,
        _context: &ExecutionContext,
    ) -> Option<Result<FieldValue, FieldError>> {
        Some(Ok(self.lookup(method).unwrap_or_else(FieldValue::null)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    struct Counter(u32);

    impl Resolvable for Counter {
        fn type_name(&self) -> &str {
            "Counter"
        }
    }

    #[test]
    fn downcast_resolvable() {
        let object: Arc<dyn Resolvable> = Arc::new(Counter(3));
        assert_eq!(object.downcast_ref::<Counter>().map(|c| c.0), Some(3));
        assert!(object.downcast_ref::<JsonObject>().is_none());
    }

    #[test]
    fn deferred_marker_matches_by_type() {
        let marker = DeferredMarker::new(42u32);
        assert!(marker.is::<u32>());
        assert!(!marker.is::<u64>());
        assert_eq!(marker.downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn json_object_missing_key_is_null() {
        let mut fields = Object::new();
        fields.insert("name", json!("Ada"));
        let object = JsonObject::new("User", fields);
        let context = ExecutionContext::default();
        assert!(matches!(
            object.call("name", &Object::new(), &context),
            Some(Ok(FieldValue::Value(v))) if v == json!("Ada")
        ));
        assert!(matches!(
            object.call("age", &Object::new(), &context),
            Some(Ok(value)) if value.is_null()
        ));
    }

    #[test]
    fn vec_collection_iterates_in_order() {
        let items = vec![Element::Value(json!(1)), Element::Value(json!(2))];
        let collected: Vec<_> = items
            .elements()
            .map(|element| match element {
                Element::Value(value) => value,
                Element::Object(_) => Value::Null,
            })
            .collect();
        assert_eq!(collected, vec![json!(1), json!(2)]);
        assert_eq!(Collection::len(&items), 2);
    }
}
