//! Service definitions, extensions and factory arguments

use crate::{
    error::{BoxError, Error},
    node::ContainerNode
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::{
    any::Any,
    fmt::{self, Debug},
    sync::Arc
};

/// A resolved, type-erased service instance
pub type Service = Arc<
    dyn Any
    + Send
    + Sync
>;

type DefinitionFn = Arc<
    dyn Fn(&dyn ContainerNode, Option<Service>, &Args) -> Result<Service, Error>
    + Send
    + Sync
>;

type ExtensionFn = Arc<
    dyn Fn(&dyn ContainerNode, Service, &Args) -> Result<Service, Error>
    + Send
    + Sync
>;

/// Extra arguments passed to a service definition by [`make`](crate::Container::make)
///
/// # Example
/// ```
/// use strata_di::Args;
///
/// let args = Args::new()
///     .with("tz", "Europe/Malta")?
///     .with("offset", 1)?;
///
/// assert_eq!(args.get::<String>("tz").unwrap(), Some("Europe/Malta".to_string()));
/// assert_eq!(args.get::<i32>("offset").unwrap(), Some(1));
/// assert_eq!(args.get::<i32>("missing").unwrap(), None);
/// # Ok::<(), strata_di::Error>(())
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Args(Map<String, Value>);

impl Args {
    /// Creates an empty set of arguments
    #[inline]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Adds an argument
    ///
    /// # Errors
    /// A factory error if `value` cannot be represented as JSON
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Result<Self, Error> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Inserts an argument, replacing a previous one with the same key
    ///
    /// # Errors
    /// A factory error if `value` cannot be represented as JSON.
    /// The arguments are left unchanged.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<(), Error> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|err| Error::from(err).with_id(&key))?;
        self.0.insert(key, value);
        Ok(())
    }

    /// Reads and deserializes an argument
    ///
    /// Returns `Ok(None)` if there is no argument with this key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.0
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(|err| Error::from(err).with_id(key))
    }

    /// Returns the raw JSON value of an argument
    #[inline]
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` if there is an argument with this key
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns `true` if there are no arguments
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Args {
    #[inline]
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Describes what a [`Definition`] resolves to
#[derive(Clone)]
pub enum DefinitionKind {
    /// An ordinary service
    Plain,
    /// A child container registered in a [`CompositeContainer`](crate::CompositeContainer)
    Child(Arc<dyn ContainerNode>),
}

impl Debug for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionKind::Plain => f.write_str("Plain"),
            DefinitionKind::Child(_) => f.write_str("Child(..)"),
        }
    }
}

/// A service definition: a factory that produces a service value.
///
/// The factory receives the container to resolve dependencies from
/// (the root of the parent chain, see [`ParentAware`](crate::ParentAware)),
/// the value produced by the definition it extends, if any, and the extra
/// arguments passed to [`make`](crate::Container::make).
///
/// # Example
/// ```
/// use strata_di::{ContainerBuilder, ContainerExt, Definition};
///
/// struct Config { url: String }
/// struct Db { url: String }
///
/// let container = ContainerBuilder::new()
///     .with_definition("config", Definition::value_of(|| Config { url: "db://".into() }))
///     .unwrap()
///     .with_definition("db", Definition::new(|c, _, _| {
///         let config = c.get_as::<Config>("config")?;
///         Ok(Db { url: config.url.clone() })
///     }))
///     .unwrap()
///     .build();
///
/// let db = container.get_as::<Db>("db").unwrap();
/// assert_eq!(db.url, "db://");
/// ```
#[derive(Clone)]
pub struct Definition {
    factory: DefinitionFn,
    kind: DefinitionKind
}

impl Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Definition {
    /// Creates a definition from a typed factory
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn ContainerNode, Option<Service>, &Args) -> Result<T, Error> + Send + Sync + 'static
    {
        Self::from_fn(move |c, previous, args| {
            factory(c, previous, args).map(|t| Arc::new(t) as Service)
        })
    }

    /// Creates a definition from a factory that returns an already type-erased [`Service`]
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn(&dyn ContainerNode, Option<Service>, &Args) -> Result<Service, Error> + Send + Sync + 'static
    {
        Self {
            factory: Arc::new(factory),
            kind: DefinitionKind::Plain
        }
    }

    /// Creates a definition from a factory that may fail with any error type
    pub fn try_new<T, E, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn(&dyn ContainerNode, Option<Service>, &Args) -> Result<T, E> + Send + Sync + 'static
    {
        Self::new(move |c, previous, args| factory(c, previous, args).map_err(Error::factory))
    }

    /// Creates a definition that produces a clone of `value` on every call
    pub fn value<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        Self::new(move |_, _, _| Ok(value.clone()))
    }

    /// Creates a definition from a factory that needs no container access
    pub fn value_of<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static
    {
        Self::new(move |_, _, _| Ok(factory()))
    }

    /// Creates a definition that always returns the given instance.
    ///
    /// Every resolution hands out the same [`Arc`].
    pub fn instance(service: Service) -> Self {
        Self::from_fn(move |_, _, _| Ok(service.clone()))
    }

    /// Creates the definition of a child container service
    pub(crate) fn child(container: Arc<dyn ContainerNode>) -> Self {
        let service = container.clone();
        let definition = Self::from_fn(move |_, _, _| Ok(Arc::new(service.clone()) as Service));
        Self {
            kind: DefinitionKind::Child(container),
            ..definition
        }
    }

    /// Returns what this definition resolves to
    #[inline]
    pub fn kind(&self) -> &DefinitionKind {
        &self.kind
    }

    /// Returns the child container if this is a child container definition
    #[inline]
    pub fn as_child(&self) -> Option<&Arc<dyn ContainerNode>> {
        match &self.kind {
            DefinitionKind::Child(container) => Some(container),
            DefinitionKind::Plain => None,
        }
    }

    /// Invokes the factory
    #[inline]
    pub fn resolve(
        &self,
        container: &dyn ContainerNode,
        previous: Option<Service>,
        args: &Args
    ) -> Result<Service, Error> {
        (self.factory)(container, previous, args)
    }

    /// Returns `true` if both values refer to the same factory
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.factory, &other.factory)
    }

    /// Wraps the definition of `id` with an extension.
    ///
    /// The resulting definition resolves `self` first and passes its value
    /// to `extension` as the previous instance. Errors raised by the
    /// extension without an id are tagged with `id`. The kind is kept.
    pub(crate) fn extended_by(self, id: &str, extension: Extension) -> Self {
        let Self { factory: base, kind } = self;
        let id = id.to_string();
        let definition = Self::from_fn(move |c, previous, args| {
            let previous = base(c, previous, args)?;
            extension.apply(c, previous, args).map_err(|err| match err.id() {
                Some(_) => err,
                None => err.with_id(&id),
            })
        });
        Self { kind, ..definition }
    }
}

/// Modifies the value produced by a previously registered definition
///
/// # Example
/// ```
/// use strata_di::{ContainerBuilder, ContainerExt, Definition, Extension};
///
/// let container = ContainerBuilder::new()
///     .with_definition("greeting", Definition::value(String::from("hello")))
///     .unwrap()
///     .build();
///
/// container.extend("greeting", Extension::new(|_, previous: std::sync::Arc<String>, _| {
///     Ok(format!("{previous}, world"))
/// })).unwrap();
///
/// assert_eq!(*container.get_as::<String>("greeting").unwrap(), "hello, world");
/// ```
#[derive(Clone)]
pub struct Extension(ExtensionFn);

impl Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Extension(..)")
    }
}

impl Extension {
    /// Creates a typed extension.
    ///
    /// Fails with a container error if the previous value is not a `P`.
    /// No [`ErrorFactory`](crate::error::ErrorFactory) is reachable from an
    /// extension, so this error is always a plain message; the container
    /// tags it with the id of the extended service.
    pub fn new<P, T, F>(extension: F) -> Self
    where
        P: Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&dyn ContainerNode, Arc<P>, &Args) -> Result<T, Error> + Send + Sync + 'static
    {
        Self::from_fn(move |c, previous, args| {
            let previous = previous
                .downcast::<P>()
                .map_err(|_| Error::container(format!(
                    "DI Error: unable to extend a service that is not a {}",
                    std::any::type_name::<P>()
                )))?;
            extension(c, previous, args).map(|t| Arc::new(t) as Service)
        })
    }

    /// Creates an extension working on type-erased services
    pub fn from_fn<F>(extension: F) -> Self
    where
        F: Fn(&dyn ContainerNode, Service, &Args) -> Result<Service, Error> + Send + Sync + 'static
    {
        Self(Arc::new(extension))
    }

    /// Applies the extension to a previous value
    #[inline]
    pub fn apply(&self, container: &dyn ContainerNode, previous: Service, args: &Args) -> Result<Service, Error> {
        (self.0)(container, previous, args)
    }
}
