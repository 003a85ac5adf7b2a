//! # Strata DI
//!
//! > String-keyed dependency injection containers that can be nested and composed.
//!
//! ## Features
//! * Services resolved once and cached with [`Container::get`], or built fresh with [`Container::make`]
//! * Definitions resolved against the root of the parent chain
//! * Composite containers delegating to child containers in insertion order
//! * Bulk registration from [`ServiceProvider`]s with definition extensions
//! * Pluggable error construction through [`ErrorFactory`](error::ErrorFactory)
//! * Optional [`tracing`](https://docs.rs/tracing) instrumentation
//!
//! ## Example
//! ```
//! use strata_di::{CompositeContainer, ContainerBuilder, ContainerExt, Definition};
//!
//! let app = CompositeContainer::builder()
//!     .with_definition("db.url", Definition::value(String::from("postgres://localhost")))
//!     .unwrap()
//!     .build();
//!
//! let users = ContainerBuilder::new()
//!     .with_parent(app.clone())
//!     .with_definition("users.repo", Definition::new(|c, _, _| {
//!         let url = c.get_as::<String>("db.url")?;
//!         Ok(format!("users@{url}"))
//!     }))
//!     .unwrap()
//!     .build();
//!
//! app.add_child_container(users.clone()).unwrap();
//!
//! let repo = app.get_as::<String>("users.repo").unwrap();
//! assert_eq!(*repo, "users@postgres://localhost");
//! ```

#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

pub use crate::{
    cache::InstanceCache,
    composite::{CompositeContainer, CompositeContainerBuilder},
    container::{Container, ContainerBuilder},
    definition::{Args, Definition, DefinitionKind, Extension, Service},
    error::Error,
    node::{ContainerExt, ContainerNode, ParentAware},
    provider::{ServiceProvider, Services},
    registry::{CHILD_ID_PREFIX, DefinitionRegistry},
};

pub mod error;
pub mod cache;
pub mod composite;
pub mod container;
pub mod definition;
pub mod node;
pub mod provider;
pub mod registry;
