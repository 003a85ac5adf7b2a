//! Service providers: bundles of definitions imported into a container

use crate::{
    definition::{Definition, Extension},
    error::{DefaultErrorFactory, Error, ErrorFactory, ErrorFactoryExt},
    registry::validate_id
};
use indexmap::IndexMap;
use std::sync::Arc;

/// Something that supplies service definitions in bulk.
///
/// See [`Container::set_from_provider`](crate::Container::set_from_provider).
pub trait ServiceProvider {
    /// Returns the service definitions keyed by id, in the order they should be registered
    fn services(&self) -> IndexMap<String, Definition>;

    /// Returns the extensions of previously registered services, keyed by id
    #[inline]
    fn extensions(&self) -> IndexMap<String, Extension> {
        IndexMap::new()
    }
}

/// A ready-to-use [`ServiceProvider`]
///
/// # Example
/// ```
/// use strata_di::{ContainerBuilder, ContainerExt, Definition, Services};
///
/// let mut services = Services::new();
/// services
///     .add("ratio", Definition::value(1.5_f64)).unwrap()
///     .add("name", Definition::value(String::from("circle"))).unwrap();
///
/// let container = ContainerBuilder::new()
///     .with_provider(&services)
///     .unwrap()
///     .build();
///
/// assert_eq!(*container.get_as::<f64>("ratio").unwrap(), 1.5);
/// ```
#[derive(Clone)]
pub struct Services {
    definitions: IndexMap<String, Definition>,
    extensions: IndexMap<String, Extension>,
    errors: Arc<dyn ErrorFactory>
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("definitions", &self.definitions)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl Default for Services {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Services {
    /// Creates an empty provider
    #[inline]
    pub fn new() -> Self {
        Self::with_error_factory(DefaultErrorFactory)
    }

    /// Creates an empty provider that reports errors through `errors`
    pub fn with_error_factory(errors: impl ErrorFactory + 'static) -> Self {
        Self {
            definitions: IndexMap::new(),
            extensions: IndexMap::new(),
            errors: Arc::new(errors)
        }
    }

    /// Adds a service definition
    ///
    /// # Errors
    /// A container error if `id` is empty or reserved
    pub fn add(&mut self, id: impl Into<String>, definition: Definition) -> Result<&mut Self, Error> {
        let id = id.into();
        validate_id(&id).map_err(|msg| self.errors.container_error(msg).with_id(&id))?;
        self.definitions.insert(id, definition);
        Ok(self)
    }

    /// Adds an extension of a service, composing with an extension already added for the same id
    ///
    /// # Errors
    /// A container error if `id` is empty or reserved
    pub fn extend(&mut self, id: impl Into<String>, extension: Extension) -> Result<&mut Self, Error> {
        let id = id.into();
        validate_id(&id).map_err(|msg| self.errors.container_error(msg).with_id(&id))?;
        let extension = match self.extensions.shift_remove(&id) {
            Some(first) => Extension::from_fn(move |c, previous, args| {
                let previous = first.apply(c, previous, args)?;
                extension.apply(c, previous, args)
            }),
            None => extension,
        };
        self.extensions.insert(id, extension);
        Ok(self)
    }

    /// Returns the number of definitions
    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if there are no definitions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns `true` if there is a definition for `id`
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }
}

impl ServiceProvider for Services {
    #[inline]
    fn services(&self) -> IndexMap<String, Definition> {
        self.definitions.clone()
    }

    #[inline]
    fn extensions(&self) -> IndexMap<String, Extension> {
        self.extensions.clone()
    }
}

impl ServiceProvider for IndexMap<String, Definition> {
    #[inline]
    fn services(&self) -> IndexMap<String, Definition> {
        self.clone()
    }
}

impl<K: Into<String>> FromIterator<(K, Definition)> for Services {
    /// Collects definitions without validating ids;
    /// invalid ids are refused later by the container.
    fn from_iter<I: IntoIterator<Item = (K, Definition)>>(iter: I) -> Self {
        let mut services = Self::new();
        services.definitions.extend(iter.into_iter().map(|(id, def)| (id.into(), def)));
        services
    }
}
