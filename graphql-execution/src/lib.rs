//! Execution core of a GraphQL server: merges the selections of an operation into a tree,
//! resolves it in two phases against runtime objects, and shapes paginated connections.

#![cfg_attr(feature = "failfast", allow(unreachable_code))]

macro_rules! failfast_debug {
    ($($tokens:tt)+) => {{
        tracing::debug!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

macro_rules! failfast_error {
    ($($tokens:tt)+) => {{
        tracing::error!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

mod configuration;
pub mod connection;
mod context;
mod cost;
pub mod error;
mod execution;
mod field;
pub mod graphql;
pub mod json_ext;
mod schema;
mod spec;

pub use configuration::Configuration;
pub use configuration::Connections;
pub use configuration::DrainMode;
pub use configuration::Execution;
pub use context::Entries;
pub use context::ExecutionContext;
pub use context::Memo;
pub use cost::Cost;
pub use cost::estimate_cost;
pub use execution::execute;
pub use execution::execute_request;
pub use field::ArgumentDeclaration;
pub use field::Collection;
pub use field::DeferredMarker;
pub use field::Element;
pub use field::FieldDescriptor;
pub use field::FieldValue;
pub use field::JsonObject;
pub use field::LazyResolver;
pub use field::LazyValue;
pub use field::Resolvable;
pub use field::Resolver;
pub use field::TypeBinding;
pub use schema::ExecutableSchema;
pub use spec::Guard;
pub use spec::Occurrence;
pub use spec::SelectionNode;
pub use spec::SelectionTree;
pub use spec::SpecError;
pub use spec::TypedChildren;
