//! Dependency Injection container and its builder

use crate::{
    cache::InstanceCache,
    definition::{Args, Definition, Extension, Service},
    error::{DefaultErrorFactory, Error, ErrorFactory, ErrorFactoryExt, SharedErrorFactory},
    node::{ContainerNode, ParentAware, creates_cycle, downcast},
    provider::ServiceProvider,
    registry::{DefinitionRegistry, validate_id}
};
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak}
};

/// Represents a DI container builder
///
/// # Example
/// ```
/// use strata_di::{ContainerBuilder, ContainerExt, Definition};
///
/// let app = ContainerBuilder::new()
///     .with_definition("name", Definition::value(String::from("app")))
///     .unwrap()
///     .build();
///
/// let module = ContainerBuilder::new()
///     .with_parent(app.clone())
///     .with_definition("greeting", Definition::new(|c, _, _| {
///         let name = c.get_as::<String>("name")?;
///         Ok(format!("hello from {name}"))
///     }))
///     .unwrap()
///     .build();
///
/// assert_eq!(*module.get_as::<String>("greeting").unwrap(), "hello from app");
/// ```
pub struct ContainerBuilder {
    definitions: DefinitionRegistry,
    parent: Option<Arc<dyn ContainerNode>>,
    errors: SharedErrorFactory
}

impl Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("definitions", &self.definitions)
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ContainerBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    /// Creates a new DI container builder
    #[inline]
    pub fn new() -> Self {
        Self {
            definitions: DefinitionRegistry::new(),
            parent: None,
            errors: Arc::new(DefaultErrorFactory)
        }
    }

    /// Uses `errors` to build the errors reported by the container
    ///
    /// Default: [`DefaultErrorFactory`]
    pub fn with_error_factory(mut self, errors: impl ErrorFactory + 'static) -> Self {
        self.errors = Arc::new(errors);
        self
    }

    /// Links the container to a parent.
    ///
    /// The container does not keep the parent alive.
    pub fn with_parent(mut self, parent: Arc<dyn ContainerNode>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Registers a service definition
    ///
    /// # Errors
    /// A container error if `id` is empty or reserved
    pub fn with_definition(mut self, id: impl Into<String>, definition: Definition) -> Result<Self, Error> {
        let id = id.into();
        validate_id(&id).map_err(|msg| self.errors.container_error(msg).with_id(&id))?;
        self.definitions.set(id, definition);
        Ok(self)
    }

    /// Registers all definitions and extensions of a provider
    ///
    /// # Errors
    /// See [`Container::set_from_provider`]
    pub fn with_provider<P: ServiceProvider + ?Sized>(mut self, provider: &P) -> Result<Self, Error> {
        let (services, extensions) = (provider.services(), provider.extensions());
        merge_provider(&mut self.definitions, self.errors.as_ref(), services, extensions)?;
        Ok(self)
    }

    /// Builds the container
    pub fn build(self) -> Arc<Container> {
        Arc::new(self.build_unshared())
    }

    /// Builds the container without wrapping it into an [`Arc`]
    pub(crate) fn build_unshared(self) -> Container {
        Container {
            definitions: RwLock::new(self.definitions),
            cache: RwLock::new(InstanceCache::new()),
            parent: RwLock::new(self.parent.as_ref().map(Arc::downgrade)),
            errors: self.errors
        }
    }
}

/// Represents a DI container that resolves services by id.
///
/// Services are produced by their [`Definition`]s:
/// - [`get`](Self::get) resolves a service once and keeps returning the same instance
/// - [`make`](Self::make) runs the definition again on every call
///
/// If the container has a parent, definitions are resolved against the root
/// of the parent chain, so every definition sees the whole application no
/// matter how deep its container is nested.
pub struct Container {
    definitions: RwLock<DefinitionRegistry>,
    cache: RwLock<InstanceCache>,
    parent: RwLock<Option<Weak<dyn ContainerNode>>>,
    errors: SharedErrorFactory
}

impl Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &*self.registry())
            .field("cache", &*self.cache())
            .field("has_parent", &self.has_parent_container())
            .finish_non_exhaustive()
    }
}

impl Default for Container {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates an empty container
    #[inline]
    pub fn new() -> Self {
        ContainerBuilder::new().build_unshared()
    }

    /// Creates a new DI container builder
    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Registers a service definition, replacing a previous one with the same id.
    ///
    /// An instance already cached for `id` stays cached.
    ///
    /// # Errors
    /// A container error if `id` is empty or reserved
    pub fn set_definition(&self, id: impl Into<String>, definition: Definition) -> Result<(), Error> {
        let id = id.into();
        validate_id(&id).map_err(|msg| self.errors.container_error(msg).with_id(&id))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(id = %id, "registering service definition");

        self.registry_mut().set(id, definition);
        Ok(())
    }

    /// Registers all definitions of a provider, then applies its extensions.
    ///
    /// Definitions with ids already present are replaced. Nothing is registered
    /// if any of the provider's entries is refused.
    ///
    /// # Errors
    /// - A container error if an id is empty or reserved
    /// - A "not found" error if an extension targets an unknown service
    pub fn set_from_provider<P: ServiceProvider + ?Sized>(&self, provider: &P) -> Result<(), Error> {
        // the provider may query this container
        let (services, extensions) = (provider.services(), provider.extensions());
        let mut definitions = self.registry_mut();
        merge_provider(&mut definitions, self.errors.as_ref(), services, extensions)
    }

    /// Extends the definition of `id`.
    ///
    /// The current definition runs first and its value is passed to
    /// `extension` as the previous instance.
    ///
    /// # Errors
    /// - A container error if `id` is empty or reserved
    /// - A "not found" error if there is no definition for `id`
    /// - A container error if the service is already cached
    pub fn extend(&self, id: &str, extension: Extension) -> Result<(), Error> {
        validate_id(id).map_err(|msg| self.errors.container_error(msg).with_id(id))?;
        if self.is_cached(id) {
            let msg = format!("DI Error: service `{id}` is already resolved and cannot be extended");
            return Err(self.errors.container_error(msg).with_id(id));
        }

        let mut definitions = self.registry_mut();
        let definition = definitions
            .get(id)
            .cloned()
            .ok_or_else(|| self.errors.not_found(id))?;
        definitions.set(id, definition.extended_by(id, extension));
        Ok(())
    }

    /// Returns `true` if there is a definition for `id`
    #[inline]
    pub fn has_definition(&self, id: &str) -> bool {
        self.registry().contains(id)
    }

    /// Returns the definition registered for `id`
    #[inline]
    pub fn get_definition(&self, id: &str) -> Option<Definition> {
        self.registry().get(id).cloned()
    }

    /// Returns all definitions in registration order
    #[inline]
    pub fn definitions(&self) -> IndexMap<String, Definition> {
        self.registry().to_map()
    }

    /// Returns the ids of all definitions in registration order
    pub fn definition_ids(&self) -> Vec<String> {
        self.registry()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Caches a pre-built service instance under `id`.
    ///
    /// The next [`get`](Self::get) returns it without running any definition.
    pub fn cache_service(&self, id: impl Into<String>, service: Service) {
        self.cache_mut().insert(id, service);
    }

    /// Returns the cached instance of `id`
    #[inline]
    pub fn get_cached(&self, id: &str) -> Option<Service> {
        self.cache().get(id)
    }

    /// Returns `true` if an instance of `id` is cached
    #[inline]
    pub fn is_cached(&self, id: &str) -> bool {
        self.cache().contains(id)
    }

    /// Returns `true` if there is a definition for `id`
    #[inline]
    pub fn has(&self, id: &str) -> bool {
        self.has_definition(id)
    }

    /// Resolves the service `id` once and returns the cached instance afterwards
    ///
    /// # Errors
    /// - A "not found" error if there is no definition for `id`
    /// - Any error returned by the definition
    #[inline]
    pub fn get(&self, id: &str) -> Result<Service, Error> {
        self.get_within(id, self)
    }

    /// Resolves a new instance of the service `id` with no extra arguments.
    ///
    /// Neither reads nor populates the cache.
    ///
    /// # Errors
    /// See [`make_with`](Self::make_with)
    #[inline]
    pub fn make(&self, id: &str) -> Result<Service, Error> {
        self.make_with(id, &Args::new())
    }

    /// Resolves a new instance of the service `id` passing `args` to its definition.
    ///
    /// Neither reads nor populates the cache.
    ///
    /// # Errors
    /// - A "not found" error if there is no definition for `id`
    /// - Any error returned by the definition
    #[inline]
    pub fn make_with(&self, id: &str, args: &Args) -> Result<Service, Error> {
        self.make_within(id, args, self)
    }

    /// Resolves a new instance of the service `id` and downcasts it to `T`
    ///
    /// # Errors
    /// See [`make_with`](Self::make_with); a container error if the service is not a `T`
    pub fn make_as<T: Send + Sync + 'static>(&self, id: &str, args: &Args) -> Result<Arc<T>, Error> {
        self.make_with(id, args).and_then(|service| downcast(self.errors(), id, service))
    }

    /// Links this container to a parent, replacing the previous one.
    ///
    /// The container does not keep the parent alive: once the parent is
    /// dropped, the container behaves as if it had none.
    ///
    /// # Errors
    /// A container error if this container is `parent` itself or one of its ancestors
    pub fn set_parent_container(&self, parent: Arc<dyn ContainerNode>) -> Result<(), Error> {
        self.link_parent(self as *const Self as *const (), parent)
    }

    /// Removes the link to the parent container
    pub fn clear_parent_container(&self) {
        *self.parent_mut() = None;
    }

    /// Returns the container passed to definitions: the root of the parent chain if any
    pub fn resolution_container(&self) -> Option<Arc<dyn ContainerNode>> {
        self.root_container()
    }

    /// Links `this` to a parent after checking the chain stays acyclic
    pub(crate) fn link_parent(&self, this: *const (), parent: Arc<dyn ContainerNode>) -> Result<(), Error> {
        if creates_cycle(this, &parent) {
            let msg = "DI Error: the parent container is this container or one of its descendants".to_string();
            return Err(self.errors.container_error(msg));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("linking container to a parent container");

        *self.parent_mut() = Some(Arc::downgrade(&parent));
        Ok(())
    }

    /// Cached resolution on behalf of `this`.
    ///
    /// `this` is the container handed to definitions when there is no parent.
    pub(crate) fn get_within(&self, id: &str, this: &dyn ContainerNode) -> Result<Service, Error> {
        if let Some(service) = self.get_cached(id) {
            #[cfg(feature = "tracing")]
            tracing::trace!(id, "service resolved from cache");
            return Ok(service);
        }

        let definition = self.lookup(id)?;
        let service = self.resolve_definition(id, &definition, &Args::new(), this)?;

        // another caller may have cached the service while the definition ran
        Ok(self.cache_mut().get_or_insert(id, service))
    }

    /// Fresh resolution on behalf of `this`
    pub(crate) fn make_within(&self, id: &str, args: &Args, this: &dyn ContainerNode) -> Result<Service, Error> {
        let definition = self.lookup(id)?;
        self.resolve_definition(id, &definition, args, this)
    }

    #[inline]
    pub(crate) fn errors(&self) -> &dyn ErrorFactory {
        self.errors.as_ref()
    }

    #[inline]
    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, DefinitionRegistry> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub(crate) fn registry_mut(&self) -> RwLockWriteGuard<'_, DefinitionRegistry> {
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn cache(&self) -> RwLockReadGuard<'_, InstanceCache> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn cache_mut(&self) -> RwLockWriteGuard<'_, InstanceCache> {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn parent_mut(&self) -> RwLockWriteGuard<'_, Option<Weak<dyn ContainerNode>>> {
        self.parent
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the definition or return an error if not registered.
    #[inline]
    fn lookup(&self, id: &str) -> Result<Definition, Error> {
        self.get_definition(id)
            .ok_or_else(|| self.errors.not_found(id))
    }

    /// Runs a definition against the root container, or `this` if there is no parent
    fn resolve_definition(
        &self,
        _id: &str,
        definition: &Definition,
        args: &Args,
        this: &dyn ContainerNode
    ) -> Result<Service, Error> {
        #[cfg(feature = "tracing")]
        tracing::trace!(id = _id, "resolving service definition");

        let root = self.root_container();
        let container = root.as_deref().unwrap_or(this);
        definition.resolve(container, None, args)
    }
}

impl ContainerNode for Container {
    #[inline]
    fn has(&self, id: &str) -> bool {
        Container::has(self, id)
    }

    #[inline]
    fn get(&self, id: &str) -> Result<Service, Error> {
        Container::get(self, id)
    }

    #[inline]
    fn as_parent_aware(&self) -> Option<&dyn ParentAware> {
        Some(self)
    }
}

impl ParentAware for Container {
    fn parent_container(&self) -> Option<Arc<dyn ContainerNode>> {
        let parent = self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let weak = parent.as_ref()?;
        let upgraded = weak.upgrade();

        #[cfg(feature = "tracing")]
        if upgraded.is_none() {
            tracing::warn!("parent container has been dropped; resolving without it");
        }

        upgraded
    }
}

/// Validates a provider and merges it into `definitions`.
///
/// Nothing is merged if any entry is refused.
fn merge_provider(
    definitions: &mut DefinitionRegistry,
    errors: &dyn ErrorFactory,
    services: IndexMap<String, Definition>,
    extensions: IndexMap<String, Extension>
) -> Result<(), Error> {
    for id in services.keys().chain(extensions.keys()) {
        validate_id(id).map_err(|msg| errors.container_error(msg).with_id(id))?;
    }
    if let Some(id) = extensions.keys().find(|id| !services.contains_key(*id) && !definitions.contains(id)) {
        return Err(errors.not_found(id));
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        services = services.len(),
        extensions = extensions.len(),
        "registering services from provider"
    );

    definitions.merge(services);
    for (id, extension) in extensions {
        if let Some(definition) = definitions.get(&id).cloned() {
            let extended = definition.extended_by(&id, extension);
            definitions.set(id, extended);
        }
    }
    Ok(())
}
