use super::{absolute, module_candidates, Module, ModuleLoader, ModuleProbe};
use crate::error::LoadError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// In-memory module table.
///
/// The embedding application registers its handlers and authorizers under
/// the paths the API description references, the same way generated
/// services register handlers with the dispatcher at startup. Registered
/// paths are made absolute against the current directory.
#[derive(Clone)]
pub struct ModuleRegistry<T> {
    modules: HashMap<PathBuf, Module<T>>,
}

impl<T> Default for ModuleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ModuleRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        ModuleRegistry {
            modules: HashMap::new(),
        }
    }

    /// Register `module` at `path`, replacing any previous entry.
    pub fn register(&mut self, path: impl AsRef<Path>, module: Module<T>) -> &mut Self {
        let key = absolute(Path::new(""), path.as_ref());
        self.modules.insert(key, module);
        self
    }

    /// Register a module that is itself invocable.
    pub fn register_callable(&mut self, path: impl AsRef<Path>, value: T) -> &mut Self {
        self.register(path, Module::Callable(value))
    }

    /// Register a module exporting one value per verb.
    pub fn register_exports<K: AsRef<str>>(
        &mut self,
        path: impl AsRef<Path>,
        exports: impl IntoIterator<Item = (K, T)>,
    ) -> &mut Self {
        self.register(path, Module::exports(exports))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn find(&self, path: &Path) -> Option<&Module<T>> {
        module_candidates(path)
            .iter()
            .find_map(|candidate| self.modules.get(candidate))
    }
}

impl<T: Clone> ModuleLoader<T> for ModuleRegistry<T> {
    fn load(&self, path: &Path) -> Result<Module<T>, LoadError> {
        self.find(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
    }
}

impl<T> ModuleProbe for ModuleRegistry<T> {
    fn exists(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }
}
