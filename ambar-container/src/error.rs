//! Error types for container operations.
//!
//! Every failure names the types involved and, where it helps, how to fix
//! the registration. Failing to find a registration is not an error for
//! [`get_service`](crate::container::Container::get_service); only the
//! `*_required` helpers turn absence into [`AmbarError::NotRegistered`].

use std::fmt;

use ambar_support::rendering::{render_chain, shorten_type_name};

use crate::key::TypeKey;
use crate::lifetime::Lifetime;

/// Boxed error accepted from user constructors and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Ambar operations.
#[derive(Debug, thiserror::Error)]
pub enum AmbarError {
    /// A required argument was missing or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A resolved instance did not have the requested type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The container (or the root it belongs to) was disposed.
    #[error("Cannot resolve from {container}: it has been disposed")]
    Disposed { container: String },

    /// A scoped service was requested from the root container.
    #[error("{}", .0)]
    ScopedFromRoot(ScopedFromRootError),

    /// A registration cannot produce instances.
    #[error("{}", .0)]
    InvalidRegistration(InvalidRegistrationError),

    /// A constructor or factory failed with a foreign error.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: TypeKey,
        #[source]
        source: BoxError,
    },

    /// A service (indirectly) depends on itself.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A singleton tried to capture a scoped service.
    #[error("{}", .0)]
    ScopeMismatch(ScopeMismatchError),

    /// A required service has no registration.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),
}

/// Coarse classification of [`AmbarError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    InvalidRegistration,
    Construction,
    NotFound,
}

impl AmbarError {
    /// Wraps a foreign error raised while constructing `T`.
    ///
    /// ```
    /// use ambar_container::error::{AmbarError, ErrorKind};
    ///
    /// struct Config;
    /// let err = AmbarError::construction_failed::<Config>("missing DATABASE_URL");
    /// assert_eq!(err.kind(), ErrorKind::Construction);
    /// ```
    pub fn construction_failed<T: ?Sized + 'static>(source: impl Into<BoxError>) -> Self {
        AmbarError::ConstructionFailed {
            key: TypeKey::of::<T>(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AmbarError::InvalidArgument(_) | AmbarError::TypeMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            AmbarError::Disposed { .. }
            | AmbarError::ScopedFromRoot(_)
            | AmbarError::CircularDependency(_)
            | AmbarError::ScopeMismatch(_) => ErrorKind::InvalidState,
            AmbarError::InvalidRegistration(_) => ErrorKind::InvalidRegistration,
            AmbarError::ConstructionFailed { .. } => ErrorKind::Construction,
            AmbarError::NotRegistered(_) => ErrorKind::NotFound,
        }
    }
}

/// Scoped services only exist inside scopes.
#[derive(Debug)]
pub struct ScopedFromRootError {
    pub key: TypeKey,
}

impl fmt::Display for ScopedFromRootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot resolve scoped service {} from the root container", self.key)?;
        write!(f, "\n  Hint: Resolve it from a scope created with .create_scope()")
    }
}

/// Why a registration cannot be activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The effective implementation is a trait object, slice or `str`.
    Abstract,
    /// The effective implementation declares no constructors.
    NoConstructors,
    /// An open generic registration has no closing for the requested
    /// type arguments.
    NoClosing,
}

#[derive(Debug)]
pub struct InvalidRegistrationError {
    /// The type that was to be constructed
    pub key: TypeKey,
    pub reason: InvalidReason,
}

impl fmt::Display for InvalidRegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            InvalidReason::Abstract => {
                write!(f, "Cannot instantiate abstract type {}", self.key)?;
                write!(f, "\n  Hint: Register an implementation, a factory or an instance for it")
            }
            InvalidReason::NoConstructors => {
                write!(f, "Type {} has no constructors", self.key)?;
                write!(f, "\n  Hint: Implement Injectable and return at least one Constructor")
            }
            InvalidReason::NoClosing => {
                write!(f, "Open generic registration cannot be closed as {}", self.key)?;
                write!(f, "\n  Hint: Add a closing for these type arguments to the OpenGeneric table")
            }
        }
    }
}

/// A cycle found while resolving.
///
/// The chain starts and ends with the same type.
#[derive(Debug)]
pub struct CircularDependencyError {
    pub chain: Vec<TypeKey>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .chain
            .iter()
            .map(|k| shorten_type_name(k.type_name()))
            .collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(f, "\n  Hint: Break the cycle with a factory that resolves lazily")
    }
}

/// A longer-lived service depending on a shorter-lived one it would
/// keep alive past its scope.
#[derive(Debug)]
pub struct ScopeMismatchError {
    pub dependency: TypeKey,
    pub dependency_lifetime: Lifetime,
    pub consumer: TypeKey,
    pub consumer_lifetime: Lifetime,
}

impl fmt::Display for ScopeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scope mismatch: cannot inject {} ({}) into {} ({})",
            self.dependency, self.dependency_lifetime, self.consumer, self.consumer_lifetime,
        )?;
        write!(
            f,
            "\n  Hint: Make {} {} or make {} {}",
            self.dependency, self.consumer_lifetime, self.consumer, self.dependency_lifetime,
        )
    }
}

#[derive(Debug)]
pub struct NotRegisteredError {
    pub requested: TypeKey,
    /// Registered type names that look similar to the requested one
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not registered: {}", self.requested)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }
        Ok(())
    }
}

/// Convenient Result type for Ambar operations.
pub type Result<T> = std::result::Result<T, AmbarError>;
