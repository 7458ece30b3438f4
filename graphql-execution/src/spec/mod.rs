//! Selection tree building from a validated GraphQL operation.

#![cfg_attr(
    not(test),
    deny(
        clippy::exit,
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::indexing_slicing,
        clippy::unimplemented,
        clippy::todo
    )
)]

mod include_skip;
mod selection;

use displaydoc::Display;
use thiserror::Error;

pub(crate) use self::include_skip::IncludeSkip;
pub use self::selection::Guard;
pub use self::selection::Occurrence;
pub use self::selection::SelectionNode;
pub use self::selection::SelectionTree;
pub use self::selection::TypedChildren;
use crate::graphql::ErrorExtension;

pub(crate) const TYPENAME: &str = "__typename";

/// GraphQL operation errors.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpecError {
    /// selection processing recursion limit exceeded
    RecursionLimitExceeded,
    /// Unknown operation named "{0}"
    UnknownOperation(String),
    /// the schema has no root type for {0} operations
    MissingRootType(String),
}

impl ErrorExtension for SpecError {
    fn extension_code(&self) -> String {
        match self {
            SpecError::RecursionLimitExceeded => "RECURSION_LIMIT_EXCEEDED",
            SpecError::UnknownOperation(_) => "GRAPHQL_UNKNOWN_OPERATION_NAME",
            SpecError::MissingRootType(_) => "GRAPHQL_VALIDATION_FAILED",
        }
        .to_string()
    }
}

impl SpecError {
    pub(crate) fn to_graphql_error(&self) -> crate::graphql::Error {
        ErrorExtension::to_graphql_error(self, None)
    }
}
