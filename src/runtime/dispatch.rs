use std::collections::HashMap;

use super::error::RuntimeError;
use super::variant::VariantTag;

/// one implementation of an operation per variant.
#[derive(Debug, Clone)]
pub struct DispatchTable<T> {
    entries: HashMap<VariantTag, T>,
}

impl<T> Default for DispatchTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> DispatchTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: VariantTag, implementation: T) -> Self {
        self.insert(tag, implementation);
        self
    }

    pub fn insert(&mut self, tag: VariantTag, implementation: T) -> Option<T> {
        self.entries.insert(tag, implementation)
    }

    /// the implementation for `tag`.  A missing entry is a programming
    /// error and reported as [RuntimeError::NoImplementation].
    pub fn get(&self, tag: VariantTag) -> Result<&T, RuntimeError> {
        self.entries
            .get(&tag)
            .ok_or(RuntimeError::NoImplementation(tag))
    }

    pub fn tags(&self) -> impl Iterator<Item = VariantTag> + '_ {
        self.entries.keys().copied()
    }
}

impl<T> FromIterator<(VariantTag, T)> for DispatchTable<T> {
    fn from_iter<I: IntoIterator<Item = (VariantTag, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
