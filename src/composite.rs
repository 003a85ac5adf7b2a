//! A container that delegates lookups to child containers

use crate::{
    container::{Container, ContainerBuilder},
    definition::{Args, Definition, Extension, Service},
    error::{Error, ErrorFactory, ErrorFactoryExt},
    node::{ContainerNode, ParentAware, downcast, node_addr, reaches_child},
    provider::ServiceProvider,
    registry::CHILD_ID_PREFIX
};
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug},
    sync::Arc
};

/// Represents a [`CompositeContainer`] builder
#[derive(Debug, Default)]
pub struct CompositeContainerBuilder {
    inner: ContainerBuilder,
    children: Vec<ChildEntry>
}

struct ChildEntry(Arc<dyn ContainerNode>);

impl Debug for ChildEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&CompositeContainer::container_id(&self.0))
    }
}

impl CompositeContainerBuilder {
    /// Creates a new composite container builder
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `errors` to build the errors reported by the container
    pub fn with_error_factory(mut self, errors: impl ErrorFactory + 'static) -> Self {
        self.inner = self.inner.with_error_factory(errors);
        self
    }

    /// Links the container to a parent.
    ///
    /// The container does not keep the parent alive.
    pub fn with_parent(mut self, parent: Arc<dyn ContainerNode>) -> Self {
        self.inner = self.inner.with_parent(parent);
        self
    }

    /// Registers a local service definition
    ///
    /// # Errors
    /// A container error if `id` is empty or reserved
    pub fn with_definition(mut self, id: impl Into<String>, definition: Definition) -> Result<Self, Error> {
        self.inner = self.inner.with_definition(id, definition)?;
        Ok(self)
    }

    /// Registers all definitions and extensions of a provider as local services
    ///
    /// # Errors
    /// See [`Container::set_from_provider`]
    pub fn with_provider<P: ServiceProvider + ?Sized>(mut self, provider: &P) -> Result<Self, Error> {
        self.inner = self.inner.with_provider(provider)?;
        Ok(self)
    }

    /// Adds a child container.
    ///
    /// Children are probed in the order they were added.
    pub fn with_child(mut self, child: Arc<dyn ContainerNode>) -> Self {
        self.children.push(ChildEntry(child));
        self
    }

    /// Builds the composite container
    pub fn build(self) -> Arc<CompositeContainer> {
        let composite = CompositeContainer {
            container: self.inner.build_unshared()
        };
        // a container that does not exist yet cannot be reached from its children
        for ChildEntry(child) in self.children {
            composite.register_child(child);
        }
        Arc::new(composite)
    }
}

/// A container that owns child containers and falls back to them
/// when it has no local definition for a service.
///
/// Each child is registered as a service of its own, under an id derived
/// from the child's identity, so [`get`](Self::get) with that id returns
/// the child itself. On a local miss, children are probed in the order they
/// were added and the first one that has the service provides it.
///
/// # Example
/// ```
/// use strata_di::{CompositeContainer, ContainerBuilder, ContainerExt, Definition};
///
/// let users = ContainerBuilder::new()
///     .with_definition("users.table", Definition::value(String::from("users")))
///     .unwrap()
///     .build();
///
/// let app = CompositeContainer::builder()
///     .with_definition("app.name", Definition::value(String::from("demo")))
///     .unwrap()
///     .with_child(users)
///     .build();
///
/// assert!(app.has("users.table"));
/// assert_eq!(*app.get_as::<String>("users.table").unwrap(), "users");
/// assert!(app.has_delegated("app.name").is_none());
/// ```
pub struct CompositeContainer {
    container: Container
}

impl Debug for CompositeContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeContainer")
            .field("container", &self.container)
            .finish()
    }
}

impl Default for CompositeContainer {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeContainer {
    /// Creates an empty composite container
    #[inline]
    pub fn new() -> Self {
        Self { container: Container::new() }
    }

    /// Creates a new composite container builder
    #[inline]
    pub fn builder() -> CompositeContainerBuilder {
        CompositeContainerBuilder::new()
    }

    /// Returns the service id a child container is registered under.
    ///
    /// The id is derived from the child's address: it is the same for every
    /// clone of the same [`Arc`] and only meaningful within this process.
    pub fn container_id(child: &Arc<dyn ContainerNode>) -> String {
        format!("{CHILD_ID_PREFIX}{:p}", node_addr(child))
    }

    /// Adds a child container and returns the id it is registered under.
    ///
    /// Adding the same child again keeps its id and position.
    ///
    /// Children are followed through [`ContainerNode::child_containers`], so
    /// loops going through foreign containers that do not report their
    /// children cannot be detected.
    ///
    /// # Errors
    /// A container error if `child` is this container or delegates to it
    pub fn add_child_container(&self, child: Arc<dyn ContainerNode>) -> Result<String, Error> {
        if reaches_child(&child, self as *const Self as *const ()) {
            let msg = "DI Error: the child container is this container or delegates to it".to_string();
            return Err(self.container.errors().container_error(msg));
        }
        Ok(self.register_child(child))
    }

    /// Returns the child containers in the order they were added
    pub fn get_containers(&self) -> Vec<Arc<dyn ContainerNode>> {
        self.container
            .registry()
            .children()
            .filter_map(|(_, definition)| definition.as_child().cloned())
            .collect()
    }

    /// Returns the first child container, in the order they were added,
    /// that has the service `id`.
    ///
    /// Local definitions are never considered.
    pub fn has_delegated(&self, id: &str) -> Option<Arc<dyn ContainerNode>> {
        self.get_containers()
            .into_iter()
            .find(|child| child.has(id))
    }

    /// Returns the service `id` from the first child container that has it,
    /// or `None` if no child has it.
    ///
    /// # Errors
    /// Any error returned by the child container
    pub fn get_delegated(&self, id: &str) -> Result<Option<Service>, Error> {
        let Some(child) = self.has_delegated(id) else {
            return Ok(None);
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(id, "service delegated to a child container");

        child.get(id).map(Some)
    }

    /// Returns `true` if the service `id` is defined locally or by a child container
    pub fn has(&self, id: &str) -> bool {
        self.container.has(id) || self.has_delegated(id).is_some()
    }

    /// Resolves the service `id`.
    ///
    /// Local services are resolved once and cached, otherwise the service is
    /// taken from the first child container that has it.
    ///
    /// # Errors
    /// - A "not found" error if neither this container nor its children have the service
    /// - Any error returned by the definition or the child container
    pub fn get(&self, id: &str) -> Result<Service, Error> {
        if self.is_local(id) {
            return self.container.get_within(id, self);
        }
        self.get_delegated(id)?
            .ok_or_else(|| self.container.errors().not_found(id))
    }

    /// Resolves a new instance of the local service `id` with no extra arguments
    ///
    /// # Errors
    /// See [`make_with`](Self::make_with)
    #[inline]
    pub fn make(&self, id: &str) -> Result<Service, Error> {
        self.make_with(id, &Args::new())
    }

    /// Resolves a new instance of the local service `id` passing `args` to its definition.
    ///
    /// Child containers can only hand out their own instances, so services
    /// they provide cannot be made.
    ///
    /// # Errors
    /// - A "not found" error if neither this container nor its children have the service
    /// - A container error if only a child container has the service
    /// - Any error returned by the definition
    pub fn make_with(&self, id: &str, args: &Args) -> Result<Service, Error> {
        if self.container.has(id) {
            return self.container.make_within(id, args, self);
        }
        if self.has_delegated(id).is_some() {
            let msg = format!("DI Error: service `{id}` is provided by a child container and cannot be made");
            return Err(self.container.errors().container_error(msg).with_id(id));
        }
        Err(self.container.errors().not_found(id))
    }

    /// Resolves a new instance of the local service `id` and downcasts it to `T`
    ///
    /// # Errors
    /// See [`make_with`](Self::make_with); a container error if the service is not a `T`
    pub fn make_as<T: Send + Sync + 'static>(&self, id: &str, args: &Args) -> Result<Arc<T>, Error> {
        self.make_with(id, args).and_then(|service| downcast(self.container.errors(), id, service))
    }

    /// Registers a local service definition
    ///
    /// # Errors
    /// See [`Container::set_definition`]
    #[inline]
    pub fn set_definition(&self, id: impl Into<String>, definition: Definition) -> Result<(), Error> {
        self.container.set_definition(id, definition)
    }

    /// Registers all definitions of a provider as local services
    ///
    /// # Errors
    /// See [`Container::set_from_provider`]
    #[inline]
    pub fn set_from_provider<P: ServiceProvider + ?Sized>(&self, provider: &P) -> Result<(), Error> {
        self.container.set_from_provider(provider)
    }

    /// Extends a local service definition
    ///
    /// # Errors
    /// See [`Container::extend`]
    #[inline]
    pub fn extend(&self, id: &str, extension: Extension) -> Result<(), Error> {
        self.container.extend(id, extension)
    }

    /// Returns `true` if there is a local definition for `id`, child containers included
    #[inline]
    pub fn has_definition(&self, id: &str) -> bool {
        self.container.has_definition(id)
    }

    /// Returns the local definition registered for `id`
    #[inline]
    pub fn get_definition(&self, id: &str) -> Option<Definition> {
        self.container.get_definition(id)
    }

    /// Returns all local definitions in registration order, child containers included
    #[inline]
    pub fn definitions(&self) -> IndexMap<String, Definition> {
        self.container.definitions()
    }

    /// Caches a pre-built service instance under `id`
    #[inline]
    pub fn cache_service(&self, id: impl Into<String>, service: Service) {
        self.container.cache_service(id, service);
    }

    /// Returns the cached instance of `id`
    #[inline]
    pub fn get_cached(&self, id: &str) -> Option<Service> {
        self.container.get_cached(id)
    }

    /// Returns `true` if an instance of `id` is cached
    #[inline]
    pub fn is_cached(&self, id: &str) -> bool {
        self.container.is_cached(id)
    }

    /// Links this container to a parent, replacing the previous one
    ///
    /// # Errors
    /// A container error if this container is `parent` itself or one of its ancestors
    pub fn set_parent_container(&self, parent: Arc<dyn ContainerNode>) -> Result<(), Error> {
        self.container.link_parent(self as *const Self as *const (), parent)
    }

    /// Removes the link to the parent container
    #[inline]
    pub fn clear_parent_container(&self) {
        self.container.clear_parent_container();
    }

    fn register_child(&self, child: Arc<dyn ContainerNode>) -> String {
        let id = Self::container_id(&child);

        #[cfg(feature = "tracing")]
        tracing::debug!(id = %id, "adding child container");

        self.container
            .registry_mut()
            .set(id.clone(), Definition::child(child));
        id
    }

    #[inline]
    fn is_local(&self, id: &str) -> bool {
        self.container.has(id) || self.container.is_cached(id)
    }
}

impl ContainerNode for CompositeContainer {
    #[inline]
    fn has(&self, id: &str) -> bool {
        CompositeContainer::has(self, id)
    }

    #[inline]
    fn get(&self, id: &str) -> Result<Service, Error> {
        CompositeContainer::get(self, id)
    }

    #[inline]
    fn as_parent_aware(&self) -> Option<&dyn ParentAware> {
        Some(self)
    }

    #[inline]
    fn child_containers(&self) -> Vec<Arc<dyn ContainerNode>> {
        self.get_containers()
    }
}

impl ParentAware for CompositeContainer {
    #[inline]
    fn parent_container(&self) -> Option<Arc<dyn ContainerNode>> {
        self.container.parent_container()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContainerExt;
    use std::collections::HashMap;

    /// A foreign container backed by a map of constant values
    struct MapContainer(HashMap<&'static str, Service>);

    impl MapContainer {
        fn new(values: &[(&'static str, Service)]) -> Arc<Self> {
            Arc::new(Self(values.iter().cloned().collect()))
        }
    }

    impl ContainerNode for MapContainer {
        fn has(&self, id: &str) -> bool {
            self.0.contains_key(id)
        }

        fn get(&self, id: &str) -> Result<Service, Error> {
            self.0
                .get(id)
                .cloned()
                .ok_or_else(|| Error::not_found(id, "missing"))
        }
    }

    fn text(value: &str) -> Service {
        Arc::new(value.to_string())
    }

    fn number(value: i32) -> Service {
        Arc::new(value)
    }

    fn as_text(service: Service) -> String {
        service.downcast::<String>().unwrap().as_ref().clone()
    }

    #[test]
    fn it_creates_distinct_container_ids() {
        let child1: Arc<dyn ContainerNode> = MapContainer::new(&[]);
        let child2: Arc<dyn ContainerNode> = MapContainer::new(&[]);

        let id1 = CompositeContainer::container_id(&child1);
        let id2 = CompositeContainer::container_id(&child2);

        assert_ne!(id1, id2);
        assert_eq!(id1, CompositeContainer::container_id(&child1.clone()));
        assert!(id1.starts_with(CHILD_ID_PREFIX));
    }

    #[test]
    fn it_adds_child() {
        let subject = CompositeContainer::new();
        let child: Arc<dyn ContainerNode> = MapContainer::new(&[]);

        let id = subject.add_child_container(child.clone()).unwrap();

        assert_eq!(subject.definitions().len(), 1);
        assert_eq!(subject.container.definition_ids(), [id.clone()]);

        let resolved = subject.get_as::<Arc<dyn ContainerNode>>(&id).unwrap();
        assert!(Arc::ptr_eq(&*resolved, &child));
        assert!(subject.is_cached(&id));
    }

    #[test]
    fn it_adds_same_child_once() {
        let subject = CompositeContainer::new();
        let child: Arc<dyn ContainerNode> = MapContainer::new(&[]);

        let first = subject.add_child_container(child.clone()).unwrap();
        let second = subject.add_child_container(child).unwrap();

        assert_eq!(first, second);
        assert_eq!(subject.get_containers().len(), 1);
    }

    #[test]
    fn it_gets_containers_only() {
        let subject = CompositeContainer::new();
        let child1: Arc<dyn ContainerNode> = MapContainer::new(&[]);
        let child2: Arc<dyn ContainerNode> = MapContainer::new(&[]);

        subject.add_child_container(child1.clone()).unwrap();
        subject.set_definition("test", Definition::value(String::from("random"))).unwrap();
        subject.add_child_container(child2.clone()).unwrap();

        let containers = subject.get_containers();

        assert_eq!(containers.len(), 2);
        assert!(Arc::ptr_eq(&containers[0], &child1));
        assert!(Arc::ptr_eq(&containers[1], &child2));
    }

    #[test]
    fn it_has_delegated() {
        let subject = CompositeContainer::new();
        subject.set_definition("mine", Definition::value(String::from("service in self"))).unwrap();

        let child1: Arc<dyn ContainerNode> = MapContainer::new(&[
            ("dupe", text("duplicate from 1")),
        ]);
        let child2: Arc<dyn ContainerNode> = MapContainer::new(&[
            ("test", number(123456)),
            ("dupe", text("duplicate from 2")),
        ]);
        subject.add_child_container(child1.clone()).unwrap();
        subject.add_child_container(child2.clone()).unwrap();

        assert!(subject.has_delegated("foobar").is_none());
        assert!(subject.has_delegated("mine").is_none());
        assert!(Arc::ptr_eq(&subject.has_delegated("test").unwrap(), &child2));
        assert!(Arc::ptr_eq(&subject.has_delegated("dupe").unwrap(), &child1));
    }

    #[test]
    fn it_gets_delegated() {
        let subject = CompositeContainer::new();
        subject.add_child_container(MapContainer::new(&[
            ("dupe", text("duplicate from 1")),
        ])).unwrap();
        subject.add_child_container(MapContainer::new(&[
            ("test", number(123456)),
            ("dupe", text("duplicate from 2")),
        ])).unwrap();

        let test = subject.get_delegated("test").unwrap().unwrap();
        assert_eq!(*test.downcast::<i32>().unwrap(), 123456);

        let dupe = subject.get_delegated("dupe").unwrap().unwrap();
        assert_eq!(as_text(dupe), "duplicate from 1");

        assert!(subject.get_delegated("foobar").unwrap().is_none());
    }

    #[test]
    fn it_prefers_local_services() {
        let subject = CompositeContainer::new();
        subject.set_definition("shared", Definition::value(String::from("local"))).unwrap();
        subject.add_child_container(MapContainer::new(&[
            ("shared", text("child")),
        ])).unwrap();

        assert_eq!(as_text(subject.get("shared").unwrap()), "local");
        assert!(subject.has_delegated("shared").is_some());
    }

    #[test]
    fn it_does_not_delegate_local_only_ids() {
        let subject = CompositeContainer::new();
        subject.set_definition("local", Definition::value(1)).unwrap();
        subject.add_child_container(MapContainer::new(&[])).unwrap();

        assert!(subject.has("local"));
        assert!(subject.has_delegated("local").is_none());
    }

    #[test]
    fn it_fails_when_nobody_has_service() {
        let subject = CompositeContainer::new();
        subject.add_child_container(MapContainer::new(&[])).unwrap();

        assert!(!subject.has("foobar"));

        let err = subject.get("foobar").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.id(), Some("foobar"));

        let err = subject.make("foobar").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn it_does_not_make_delegated_services() {
        let subject = CompositeContainer::new();
        subject.add_child_container(MapContainer::new(&[
            ("child", text("child")),
        ])).unwrap();

        let err = subject.make("child").unwrap_err();

        assert!(err.is_container());
        assert_eq!(err.id(), Some("child"));
    }

    #[test]
    fn it_does_not_cache_delegated_services() {
        let subject = CompositeContainer::new();
        subject.add_child_container(MapContainer::new(&[
            ("child", text("child")),
        ])).unwrap();

        subject.get("child").unwrap();

        assert!(!subject.is_cached("child"));
    }

    #[test]
    fn it_passes_composite_to_local_definitions() {
        let subject = CompositeContainer::builder()
            .with_child(MapContainer::new(&[("name", text("child"))]))
            .with_definition("greeting", Definition::new(|c, _, _| {
                let name = c.get_as::<String>("name")?;
                Ok(format!("hello {name}"))
            }))
            .unwrap()
            .build();

        assert_eq!(*subject.get_as::<String>("greeting").unwrap(), "hello child");
    }

    #[test]
    fn it_propagates_child_errors() {
        struct Failing;

        impl ContainerNode for Failing {
            fn has(&self, _: &str) -> bool {
                true
            }

            fn get(&self, _: &str) -> Result<Service, Error> {
                Err(Error::factory("child failed"))
            }
        }

        let subject = CompositeContainer::builder()
            .with_child(Arc::new(Failing))
            .build();

        let err = subject.get_delegated("any").unwrap_err();

        assert_eq!(err.to_string(), "child failed");
    }

    #[test]
    fn it_refuses_itself_as_child() {
        let subject = Arc::new(CompositeContainer::new());

        let err = subject.add_child_container(subject.clone()).unwrap_err();

        assert!(err.is_container());
        assert!(subject.get_containers().is_empty());
        assert!(!subject.has("missing"));
    }

    #[test]
    fn it_refuses_delegation_loops() {
        let first = Arc::new(CompositeContainer::new());
        let second = Arc::new(CompositeContainer::new());
        let third = Arc::new(CompositeContainer::new());

        first.add_child_container(second.clone()).unwrap();
        second.add_child_container(third.clone()).unwrap();

        assert!(third.add_child_container(first.clone()).unwrap_err().is_container());
        assert!(second.add_child_container(first.clone()).unwrap_err().is_container());
        assert!(third.get_containers().is_empty());
        assert!(!first.has("missing"));
    }

    #[test]
    fn it_allows_shared_children() {
        let left = Arc::new(CompositeContainer::new());
        let right = Arc::new(CompositeContainer::new());
        let shared: Arc<dyn ContainerNode> = MapContainer::new(&[("x", number(1))]);

        left.add_child_container(shared.clone()).unwrap();
        right.add_child_container(shared).unwrap();
        left.add_child_container(right.clone()).unwrap();

        assert!(left.has("x"));
        assert!(right.has("x"));
    }

    #[test]
    fn it_keeps_children_when_extending_their_ids() {
        let subject = CompositeContainer::new();
        let id = subject
            .add_child_container(MapContainer::new(&[("x", number(1))]))
            .unwrap();

        let err = subject
            .extend(&id, Extension::from_fn(|_, previous, _| Ok(previous)))
            .unwrap_err();

        assert!(err.is_container());
        assert_eq!(subject.get_containers().len(), 1);
        assert!(subject.has("x"));
    }
}
