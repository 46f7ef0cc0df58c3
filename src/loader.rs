//! The loader collaborator: turns a resource identifier and a current
//! directory into definition data. Reading files or registries is left to the
//! host; [`MemoryLoader`] serves definitions registered in memory.

use crate::error::ResourceError;
use crate::value::Value;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// A fetched definition together with where it was found.
#[derive(Debug, Clone)]
pub struct LoadedDefinition {
    /// Unique location, used for caching and cycle detection.
    pub location: String,
    /// Directory that relative identifiers inside the definition resolve against.
    pub directory: Option<PathBuf>,
    pub definition: Value,
}

pub trait Loader {
    /// Fetches the definition named by `identifier`.
    ///
    /// # Errors
    /// Returns `ResourceError::LoadFailed` when nothing can be found.
    fn fetch(
        &self,
        identifier: &str,
        directory: Option<&Path>,
    ) -> Result<LoadedDefinition, ResourceError>;
}

/// A loader that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLoader;

impl Loader for NoLoader {
    fn fetch(
        &self,
        identifier: &str,
        _directory: Option<&Path>,
    ) -> Result<LoadedDefinition, ResourceError> {
        Err(ResourceError::LoadFailed {
            identifier: identifier.to_string(),
            reason: "no loader is configured".to_string(),
        })
    }
}

/// Serves definitions registered under absolute paths.
///
/// Identifiers are joined to the current directory (or `/`) and normalized,
/// so `../shared/base` from `/app/tools` finds `/app/shared/base`.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    definitions: HashMap<PathBuf, Value>,
}

impl MemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: impl AsRef<Path>, definition: impl Into<Value>) {
        let location = normalize(Path::new("/"), location.as_ref());
        self.definitions.insert(location, definition.into());
    }

    #[must_use]
    pub fn with(mut self, location: impl AsRef<Path>, definition: impl Into<Value>) -> Self {
        self.insert(location, definition);
        self
    }
}

impl Loader for MemoryLoader {
    fn fetch(
        &self,
        identifier: &str,
        directory: Option<&Path>,
    ) -> Result<LoadedDefinition, ResourceError> {
        let location = normalize(directory.unwrap_or_else(|| Path::new("/")), Path::new(identifier));
        let definition = self
            .definitions
            .get(&location)
            .ok_or_else(|| ResourceError::LoadFailed {
                identifier: identifier.to_string(),
                reason: format!("nothing is registered at {}", location.display()),
            })?;
        Ok(LoadedDefinition {
            location: location.to_string_lossy().to_string(),
            directory: location.parent().map(Path::to_path_buf),
            definition: definition.clone(),
        })
    }
}

fn normalize(directory: &Path, identifier: &Path) -> PathBuf {
    let joined = if identifier.is_absolute() {
        identifier.to_path_buf()
    } else {
        Path::new("/").join(directory).join(identifier)
    };
    let mut normalized = PathBuf::from("/");
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    normalized
}
