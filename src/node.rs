//! Capabilities shared by every container

use crate::{
    definition::Service,
    error::{DefaultErrorFactory, Error, ErrorFactory, ErrorFactoryExt}
};
use smallvec::SmallVec;
use std::sync::Arc;

/// A container that can be queried for services by id.
///
/// Every container of this crate implements it, and any foreign container
/// can be plugged in as a child or a parent by implementing it too.
pub trait ContainerNode: Send + Sync {
    /// Returns `true` if the container can provide the service `id`
    fn has(&self, id: &str) -> bool;

    /// Returns the service `id`
    ///
    /// # Errors
    /// A "not found" error if the container cannot provide the service
    fn get(&self, id: &str) -> Result<Service, Error>;

    /// Returns the parent-aware view of this container, if it has one.
    ///
    /// Used when walking up a chain of containers. Containers that do not
    /// track a parent keep the default.
    #[inline]
    fn as_parent_aware(&self) -> Option<&dyn ParentAware> {
        None
    }

    /// Returns the containers this container delegates lookups to.
    ///
    /// Used to refuse child links that would make delegation loop.
    /// Containers without children keep the default.
    #[inline]
    fn child_containers(&self) -> Vec<Arc<dyn ContainerNode>> {
        Vec::new()
    }
}

/// A container that knows its logical parent.
pub trait ParentAware {
    /// Returns the parent container, if it is set and still alive
    fn parent_container(&self) -> Option<Arc<dyn ContainerNode>>;

    /// Returns `true` if the container has a live parent
    #[inline]
    fn has_parent_container(&self) -> bool {
        self.parent_container().is_some()
    }

    /// Returns the top-most ancestor of this container.
    ///
    /// The walk starts at the parent and keeps moving up while the current
    /// container is parent-aware and has a parent of its own.
    /// Returns `None` if this container has no parent.
    fn root_container(&self) -> Option<Arc<dyn ContainerNode>> {
        let mut current = self.parent_container()?;
        let mut visited: SmallVec<[*const (); 8]> = SmallVec::new();
        visited.push(node_addr(&current));

        loop {
            let next = current
                .as_parent_aware()
                .and_then(|node| node.parent_container());
            let Some(next) = next else {
                return Some(current);
            };

            let addr = node_addr(&next);
            if visited.contains(&addr) {
                #[cfg(feature = "tracing")]
                tracing::warn!("parent chain loops back on itself; stopping at the last distinct container");
                return Some(current);
            }

            visited.push(addr);
            current = next;
        }
    }
}

/// Typed access to services
pub trait ContainerExt: ContainerNode {
    /// Returns the service `id` downcast to `T`
    ///
    /// A [`ContainerNode`] does not expose its [`ErrorFactory`], so a type
    /// mismatch is reported with the [`DefaultErrorFactory`].
    ///
    /// # Errors
    /// A "not found" error if the service is missing or a container error
    /// if it is not a `T`
    fn get_as<T: Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>, Error> {
        self.get(id).and_then(|service| downcast(&DefaultErrorFactory, id, service))
    }
}

impl<C: ContainerNode + ?Sized> ContainerExt for C {}

/// Downcasts a resolved service to `T`
pub(crate) fn downcast<T: Send + Sync + 'static>(
    errors: &dyn ErrorFactory,
    id: &str,
    service: Service
) -> Result<Arc<T>, Error> {
    service.downcast::<T>().map_err(|_| {
        let msg = format!("DI Error: service `{id}` is not a {}", std::any::type_name::<T>());
        errors.container_error(msg).with_id(id)
    })
}

/// Returns the address identifying a container, ignoring trait object metadata
#[inline]
pub(crate) fn node_addr<T: ?Sized>(node: &Arc<T>) -> *const () {
    Arc::as_ptr(node) as *const ()
}

/// Checks whether linking `this` under `parent` would create a cycle,
/// i.e. `this` is already `parent` or one of its ancestors.
pub(crate) fn creates_cycle(this: *const (), parent: &Arc<dyn ContainerNode>) -> bool {
    let mut current = parent.clone();
    let mut visited: SmallVec<[*const (); 8]> = SmallVec::new();

    loop {
        let addr = node_addr(&current);
        if addr == this {
            return true;
        }
        if visited.contains(&addr) {
            // an existing loop above us that does not involve `this`
            return false;
        }
        visited.push(addr);

        let next = current
            .as_parent_aware()
            .and_then(|node| node.parent_container());
        match next {
            Some(next) => current = next,
            None => return false,
        }
    }
}

/// Checks whether `target` can be reached from `node` by following child containers
pub(crate) fn reaches_child(node: &Arc<dyn ContainerNode>, target: *const ()) -> bool {
    let mut pending = vec![node.clone()];
    let mut visited: SmallVec<[*const (); 8]> = SmallVec::new();

    while let Some(current) = pending.pop() {
        let addr = node_addr(&current);
        if addr == target {
            return true;
        }
        if visited.contains(&addr) {
            continue;
        }
        visited.push(addr);
        pending.extend(current.child_containers());
    }
    false
}
