//! Ordered storage of service definitions

use crate::definition::Definition;
use indexmap::IndexMap;

/// Prefix of the ids generated for child containers.
///
/// Ids starting with it are reserved and refused on registration.
pub const CHILD_ID_PREFIX: &str = "container#";

/// Ordered mapping of service ids to their definitions
#[derive(Debug, Default, Clone)]
pub struct DefinitionRegistry {
    definitions: IndexMap<String, Definition>
}

impl DefinitionRegistry {
    /// Creates an empty registry
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `definition` under `id`, replacing any previous one.
    ///
    /// A replaced id keeps its original position.
    #[inline]
    pub fn set(&mut self, id: impl Into<String>, definition: Definition) {
        self.definitions.insert(id.into(), definition);
    }

    /// Merges a batch of definitions, later ids win
    pub fn merge(&mut self, definitions: impl IntoIterator<Item = (String, Definition)>) {
        self.definitions.extend(definitions);
    }

    /// Returns the definition stored under `id`
    #[inline]
    pub fn get(&self, id: &str) -> Option<&Definition> {
        self.definitions.get(id)
    }

    /// Returns `true` if there is a definition for `id`
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Iterates definitions in registration order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Definition)> {
        self.definitions.iter()
    }

    /// Iterates the child container definitions in registration order
    pub fn children(&self) -> impl Iterator<Item = (&String, &Definition)> {
        self.iter().filter(|(_, definition)| definition.as_child().is_some())
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

    /// Returns a snapshot of all definitions
    #[inline]
    pub fn to_map(&self) -> IndexMap<String, Definition> {
        self.definitions.clone()
    }
}

/// Checks that `id` can be used for a user registration
pub(crate) fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        Err("DI Error: service id must not be empty".into())
    } else if id.starts_with(CHILD_ID_PREFIX) {
        Err(format!("DI Error: service id `{id}` uses the reserved `{CHILD_ID_PREFIX}` prefix"))
    } else {
        Ok(())
    }
}
