//! Container errors and the error-factory capability

use std::{
    error::Error as StdError,
    fmt,
    sync::Arc
};

/// A boxed, thread-safe error produced by an [`ErrorFactory`] or by user code
pub type BoxError = Box<
    dyn StdError
    + Send
    + Sync
>;

/// Describes what went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested service id is not reachable from the container
    NotFound,
    /// Registration was refused or a container invariant was violated
    Container,
    /// A service definition failed while producing its value
    Factory,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => f.write_str("not found"),
            ErrorKind::Container => f.write_str("container error"),
            ErrorKind::Factory => f.write_str("factory error"),
        }
    }
}

/// Generic DI error
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    id: Option<String>,
    inner: BoxError
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl From<serde_json::Error> for Error {
    #[inline]
    fn from(err: serde_json::Error) -> Self {
        Self::factory(err)
    }
}

impl Error {
    /// Creates a "not found" error for `id` wrapping a domain-specific error
    pub fn not_found(id: impl Into<String>, err: impl Into<BoxError>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            id: Some(id.into()),
            inner: err.into()
        }
    }

    /// Creates a generic container error
    pub fn container(err: impl Into<BoxError>) -> Self {
        Self {
            kind: ErrorKind::Container,
            id: None,
            inner: err.into()
        }
    }

    /// Wraps an error returned by a service definition
    pub fn factory(err: impl Into<BoxError>) -> Self {
        Self {
            kind: ErrorKind::Factory,
            id: None,
            inner: err.into()
        }
    }

    /// Attaches the service id this error relates to
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns the kind of this error
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the service id this error relates to, if any
    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns `true` if the requested service was not found
    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Returns `true` if this is a container error
    #[inline]
    pub fn is_container(&self) -> bool {
        self.kind == ErrorKind::Container
    }

    /// Returns a reference to the wrapped error if it is of type `E`
    #[inline]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Unwraps the inner error
    #[inline]
    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}

/// Builds the domain-appropriate errors a container reports.
///
/// Containers never construct their error payloads directly: they ask the
/// configured factory and wrap the result into an [`Error`] of the
/// matching [`ErrorKind`]. This lets an application surface its own error types
/// and later recover them with [`Error::downcast_ref`].
///
/// # Example
/// ```
/// use strata_di::{ContainerBuilder, error::{BoxError, ErrorFactory}};
///
/// #[derive(Debug)]
/// struct MissingService(String);
///
/// impl std::fmt::Display for MissingService {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "app: {}", self.0)
///     }
/// }
///
/// impl std::error::Error for MissingService {}
///
/// struct AppErrors;
///
/// impl ErrorFactory for AppErrors {
///     fn create_not_found_error(&self, message: String) -> BoxError {
///         Box::new(MissingService(message))
///     }
///
///     fn create_container_error(&self, message: String) -> BoxError {
///         message.into()
///     }
/// }
///
/// let container = ContainerBuilder::new()
///     .with_error_factory(AppErrors)
///     .build();
///
/// let err = container.get("db").unwrap_err();
/// assert!(err.downcast_ref::<MissingService>().is_some());
/// ```
pub trait ErrorFactory: Send + Sync {
    /// Creates the payload of a "not found" error
    fn create_not_found_error(&self, message: String) -> BoxError;

    /// Creates the payload of a generic container error
    fn create_container_error(&self, message: String) -> BoxError;
}

/// An [`ErrorFactory`] that produces plain message errors
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorFactory;

impl ErrorFactory for DefaultErrorFactory {
    #[inline]
    fn create_not_found_error(&self, message: String) -> BoxError {
        message.into()
    }

    #[inline]
    fn create_container_error(&self, message: String) -> BoxError {
        message.into()
    }
}

/// Shared handle to an [`ErrorFactory`]
pub(crate) type SharedErrorFactory = Arc<dyn ErrorFactory>;

/// Helpers that build [`Error`] values through an [`ErrorFactory`]
pub(crate) trait ErrorFactoryExt {
    fn not_found(&self, id: &str) -> Error;
    fn container_error(&self, message: String) -> Error;
}

impl<F: ErrorFactory + ?Sized> ErrorFactoryExt for F {
    #[inline]
    fn not_found(&self, id: &str) -> Error {
        let message = format!("DI Error: service not found: {id}");
        Error::not_found(id, self.create_not_found_error(message))
    }

    #[inline]
    fn container_error(&self, message: String) -> Error {
        Error::container(self.create_container_error(message))
    }
}
