use std::fmt;

use apollo_compiler::ast;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::ConfigurationError;

type Thunk = Box<dyn FnOnce() -> ast::Type + Send>;

/// Write-once cell holding a field's return type.
///
/// The type is either known upfront or produced by a thunk, which lets fields refer to
/// types declared later. The thunk runs at most once, on first read.
pub struct TypeBinding {
    resolved: OnceCell<ast::Type>,
    thunk: Mutex<Option<Thunk>>,
}

impl TypeBinding {
    pub fn unbound() -> Self {
        Self {
            resolved: OnceCell::new(),
            thunk: Mutex::new(None),
        }
    }

    pub fn concrete(ty: ast::Type) -> Self {
        Self {
            resolved: OnceCell::with_value(ty),
            thunk: Mutex::new(None),
        }
    }

    pub fn deferred<F>(thunk: F) -> Self
    where
        F: FnOnce() -> ast::Type + Send + 'static,
    {
        Self {
            resolved: OnceCell::new(),
            thunk: Mutex::new(Some(Box::new(thunk))),
        }
    }

    /// Returns the bound type, forcing the thunk if needed.
    pub fn get(&self) -> Option<&ast::Type> {
        self.resolved
            .get_or_try_init(|| match self.thunk.lock().take() {
                Some(thunk) => Ok(thunk()),
                None => Err(()),
            })
            .ok()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Binds the cell to `ty`.
    ///
    /// Binding an unbound cell stores `ty`, binding to the value already held is a no-op and
    /// binding to anything else is an error.
    pub fn bind(&self, ty: ast::Type) -> Result<&ast::Type, ConfigurationError> {
        let bound = match self.get() {
            Some(bound) => bound,
            None => self.resolved.get_or_init(|| ty.clone()),
        };
        if *bound == ty {
            Ok(bound)
        } else {
            Err(ConfigurationError::TypeRebound {
                bound: bound.to_string(),
                requested: ty.to_string(),
            })
        }
    }
}

impl Default for TypeBinding {
    fn default() -> Self {
        Self::unbound()
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolved.get() {
            Some(ty) => write!(f, "TypeBinding({ty})"),
            None => f.write_str("TypeBinding(<pending>)"),
        }
    }
}
