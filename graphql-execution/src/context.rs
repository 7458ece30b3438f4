//! Provide an [`ExecutionContext`] shared by every resolver of one query execution.
//!
//! The context carries the request variables, a cancellation signal observed between drain
//! steps, and a DashMap which allows resolvers to pass data to each other during the execution.

use std::any::Any;
use std::any::TypeId;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use derivative::Derivative;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::error::FieldError;
use crate::json_ext::Object;
use crate::json_ext::Value;

static NEXT_EXECUTION_ID: AtomicU64 = AtomicU64::new(1);

/// Holds [`ExecutionContext`] entries.
pub type Entries = Arc<DashMap<String, Value>>;

/// Context for one query execution.
///
/// Cloning is cheap and every clone refers to the same execution.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Inner {
    id: u64,
    variables: Object,
    entries: Entries,
    #[derivative(Debug = "ignore")]
    extensions: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    cancellation: CancellationToken,
}

#[buildstructor::buildstructor]
impl ExecutionContext {
    /// Returns a builder for an [`ExecutionContext`].
    ///
    /// Builder methods:
    ///
    /// * `.variables(impl Into<`[`serde_json_bytes::Map`]`>)` / `.variable(key, value)`
    ///   Optional. The request variables, already coerced.
    ///
    /// * `.cancellation(`[`CancellationToken`]`)`
    ///   Optional. Cancelling the token aborts the execution at the next drain step.
    #[builder(visibility = "pub")]
    fn new(
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        variables: JsonMap<ByteString, Value>,
        cancellation: Option<CancellationToken>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_EXECUTION_ID.fetch_add(1, Ordering::Relaxed),
                variables,
                entries: Default::default(),
                extensions: DashMap::new(),
                cancellation: cancellation.unwrap_or_default(),
            }),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext::builder().build()
    }
}

impl ExecutionContext {
    /// Unique identifier of this execution within the process.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn variables(&self) -> &Object {
        &self.inner.variables
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Requests the execution to stop at the next drain step.
    pub fn cancel(&self) {
        self.inner.cancellation.cancel()
    }

    pub fn get<K, V>(&self, key: K) -> Result<Option<V>, FieldError>
    where
        K: Into<String>,
        V: for<'de> serde::Deserialize<'de>,
    {
        self.inner
            .entries
            .get(&key.into())
            .map(|v| serde_json_bytes::from_value(v.value().clone()))
            .transpose()
            .map_err(FieldError::from)
    }

    pub fn insert<K, V>(&self, key: K, value: V) -> Result<Option<V>, FieldError>
    where
        K: Into<String>,
        V: for<'de> serde::Deserialize<'de> + Serialize,
    {
        let value = serde_json_bytes::to_value(value).map_err(FieldError::from)?;
        self.inner
            .entries
            .insert(key.into(), value)
            .map(serde_json_bytes::from_value)
            .transpose()
            .map_err(FieldError::from)
    }

    /// Stores typed state, replacing any previous value of the same type.
    pub fn insert_extension<T>(&self, value: T)
    where
        T: Any + Send + Sync,
    {
        self.inner
            .extensions
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn extension<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.inner.extensions.get(&TypeId::of::<T>())?.value().clone();
        value.downcast::<T>().ok()
    }

    /// Returns the extension of type `T`, inserting the default one if missing.
    pub fn extension_or_default<T>(&self) -> Arc<T>
    where
        T: Any + Send + Sync + Default,
    {
        let value = self
            .inner
            .extensions
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(T::default()))
            .value()
            .clone();
        match value.downcast::<T>() {
            Ok(value) => value,
            // the map is keyed by the type id, so this cannot be another type
            Err(_) => Arc::new(T::default()),
        }
    }
}

/// Batching and memoization cache.
///
/// Each key is computed at most once: the first caller runs the initializer and any
/// concurrent caller for the same key waits for it to complete.
pub struct Memo<K, V> {
    cells: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> Default for Memo<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_try_init<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // the shard lock must be released before awaiting
        let cell = self.cells.entry(key).or_default().value().clone();
        cell.get_or_try_init(init).await.cloned()
    }

    pub async fn get_or_init<F, Fut>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self.cells.entry(key).or_default().value().clone();
        cell.get_or_init(init).await.clone()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.cells.get(key)?.value().get().cloned()
    }

    /// Number of keys that were requested, including the ones still being computed.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn test_context_insert() {
        let c = ExecutionContext::default();
        assert!(c.insert("key1", 1).is_ok());
        assert_eq!(c.get("key1").unwrap(), Some(1));
    }

    #[test]
    fn test_context_overwrite() {
        let c = ExecutionContext::default();
        assert!(c.insert("overwrite", 2).is_ok());
        assert_eq!(c.insert("overwrite", 3).unwrap(), Some(2));
        assert_eq!(c.get("overwrite").unwrap(), Some(3));
    }

    #[test]
    fn test_context_marshall_errors() {
        let c = ExecutionContext::default();
        assert!(c.insert("string", "Some value".to_string()).is_ok());
        assert!(c.get::<_, u32>("string").is_err());
    }

    #[test]
    fn executions_have_distinct_ids() {
        let a = ExecutionContext::default();
        let b = ExecutionContext::default();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn variables_and_cancellation() {
        let token = CancellationToken::new();
        let mut variables = Object::new();
        variables.insert("flag", json!(true));
        let c = ExecutionContext::builder()
            .variables(variables)
            .cancellation(token.clone())
            .build();
        assert_eq!(c.variables().get("flag"), Some(&json!(true)));
        assert!(!c.is_cancelled());
        token.cancel();
        assert!(c.is_cancelled());
    }

    #[test]
    fn typed_extensions() {
        #[derive(Default)]
        struct Counter(AtomicUsize);

        let c = ExecutionContext::default();
        assert!(c.extension::<Counter>().is_none());
        c.extension_or_default::<Counter>()
            .0
            .fetch_add(1, Ordering::SeqCst);
        c.extension_or_default::<Counter>()
            .0
            .fetch_add(1, Ordering::SeqCst);
        assert_eq!(c.extension::<Counter>().unwrap().0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn memo_computes_each_key_once() {
        let memo: Arc<Memo<u32, String>> = Arc::new(Memo::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let lookups = (0..8).map(|i| {
            let memo = memo.clone();
            let calls = calls.clone();
            async move {
                memo.get_or_init(i % 2, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    format!("value {}", i % 2)
                })
                .await
            }
        });
        let values = futures::future::join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(values[0], "value 0");
        assert_eq!(values[1], "value 1");
        assert_eq!(memo.get(&0).as_deref(), Some("value 0"));
        assert_eq!(memo.len(), 2);
    }

    #[tokio::test]
    async fn memo_retries_after_error() {
        let memo: Memo<&str, u32> = Memo::new();
        let failed: Result<u32, &str> = memo.get_or_try_init("k", || async { Err("boom") }).await;
        assert_eq!(failed, Err("boom"));
        let value: Result<u32, &str> = memo.get_or_try_init("k", || async { Ok(7) }).await;
        assert_eq!(value, Ok(7));
    }
}
