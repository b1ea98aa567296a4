//! # Resolve Module
//!
//! Turns handler and authorizer references into invocable values.
//!
//! A [`Reference`] is either already bound to a value or names a module by
//! path. Module paths are resolved against a base directory and loaded
//! through an injected [`ModuleLoader`]; a separate [`ModuleProbe`] answers
//! whether a module file exists. Both capabilities are traits so that the
//! compiler can run against an in-memory [`ModuleRegistry`] as easily as
//! against declarative module files on disk ([`ManifestLoader`], [`FsProbe`]).
//!
//! ## Resolution rules
//!
//! 1. A bound reference is returned unchanged.
//! 2. A module path is made absolute against `basedir` and loaded.
//! 3. A callable module is returned as is, whatever the method.
//! 4. A module of exports yields the export keyed by the lowercase verb when
//!    a method is given, and nothing otherwise.
//! 5. Load failures are logged at debug level and reported as `None`.

use crate::error::LoadError;
use http::Method;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

mod manifest;
mod registry;
mod tree;

pub use manifest::{FsProbe, ManifestLoader};
pub use registry::ModuleRegistry;
pub use tree::HandlerTree;

/// File extensions tried, in order, when a module path has none.
pub const MODULE_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// A reference to a handler or authorizer.
#[derive(Clone)]
pub enum Reference<T> {
    /// Already invocable; passed through untouched.
    Bound(T),
    /// Module path, relative to the base directory unless absolute.
    Module(PathBuf),
}

impl<T> Reference<T> {
    pub fn module(path: impl Into<PathBuf>) -> Self {
        Reference::Module(path.into())
    }
}

impl<T> std::fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Bound(_) => f.write_str("Bound(..)"),
            Reference::Module(path) => f.debug_tuple("Module").field(path).finish(),
        }
    }
}

/// Documents can only name modules; bound references are built in code.
impl<'de, T> Deserialize<'de> for Reference<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Ok(Reference::Module(PathBuf::from(path)))
    }
}

/// The shape of a loaded module.
#[derive(Clone)]
pub enum Module<T> {
    /// The module itself is invocable.
    Callable(T),
    /// The module exports one value per lowercase HTTP verb.
    Exports(IndexMap<String, T>),
}

impl<T> Module<T> {
    /// Build an exports module; keys are lowercased.
    pub fn exports<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, T)>) -> Self {
        Module::Exports(
            entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v))
                .collect(),
        )
    }
}

impl<T> std::fmt::Debug for Module<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Module::Callable(_) => f.write_str("Callable(..)"),
            Module::Exports(map) => f
                .debug_tuple("Exports")
                .field(&map.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Loads modules by absolute path.
pub trait ModuleLoader<T> {
    fn load(&self, path: &Path) -> Result<Module<T>, LoadError>;
}

/// Answers whether a module exists at a path.
pub trait ModuleProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Paths a module reference may live at: the path itself, then the path
/// with each of [`MODULE_EXTENSIONS`] appended.
#[must_use]
pub fn module_candidates(path: &Path) -> Vec<PathBuf> {
    let mut out = vec![path.to_path_buf()];
    let has_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MODULE_EXTENSIONS.contains(&e));
    if !has_ext {
        for ext in MODULE_EXTENSIONS {
            let mut s = path.as_os_str().to_owned();
            s.push(".");
            s.push(ext);
            out.push(PathBuf::from(s));
        }
    }
    out
}

/// Resolve `path` against `base` into an absolute, lexically normalised path.
///
/// A relative `base` is taken from the current directory. `..` never climbs
/// above the root.
#[must_use]
pub fn absolute(base: &Path, path: &Path) -> PathBuf {
    let joined = base.join(path);
    let joined = if joined.is_absolute() {
        joined
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(joined),
            Err(_) => joined,
        }
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve a reference into an invocable value.
///
/// Never fails loudly: every problem is logged and reported as `None` so the
/// caller can apply its own fallback.
pub fn resolve<T: Clone>(
    loader: &dyn ModuleLoader<T>,
    basedir: &Path,
    reference: &Reference<T>,
    method: Option<&Method>,
) -> Option<T> {
    let path = match reference {
        Reference::Bound(value) => return Some(value.clone()),
        Reference::Module(path) => absolute(basedir, path),
    };

    let module = match loader.load(&path) {
        Ok(module) => module,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Could not load module");
            return None;
        }
    };

    match module {
        Module::Callable(value) => Some(value),
        Module::Exports(mut exports) => {
            let method = method?;
            let key = method.as_str().to_ascii_lowercase();
            let export = exports.swap_remove(&key);
            if export.is_none() {
                debug!(
                    path = %path.display(),
                    method = %method,
                    exports = ?exports.keys().collect::<Vec<_>>(),
                    "Module has no export for method"
                );
            }
            export
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(&'static str);

    struct FixedLoader(Option<Module<Tag>>);

    impl ModuleLoader<Tag> for FixedLoader {
        fn load(&self, path: &Path) -> Result<Module<Tag>, LoadError> {
            self.0
                .clone()
                .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
        }
    }

    #[test]
    fn test_bound_reference_passes_through() {
        let loader = FixedLoader(None);
        let got = resolve(&loader, Path::new("/api"), &Reference::Bound(Tag("fn")), None);
        assert_eq!(got, Some(Tag("fn")));
    }

    #[test]
    fn test_callable_module_ignores_method() {
        let loader = FixedLoader(Some(Module::Callable(Tag("whole"))));
        let reference = Reference::module("handlers/pets");
        assert_eq!(
            resolve(&loader, Path::new("/api"), &reference, Some(&Method::DELETE)),
            Some(Tag("whole"))
        );
        assert_eq!(
            resolve(&loader, Path::new("/api"), &reference, None),
            Some(Tag("whole"))
        );
    }

    #[test]
    fn test_exports_select_by_method() {
        let loader = FixedLoader(Some(Module::exports([("GET", Tag("fn1")), ("post", Tag("fn2"))])));
        let reference = Reference::module("handlers/pets");
        let base = Path::new("/api");
        assert_eq!(resolve(&loader, base, &reference, Some(&Method::GET)), Some(Tag("fn1")));
        assert_eq!(resolve(&loader, base, &reference, Some(&Method::POST)), Some(Tag("fn2")));
        assert_eq!(resolve(&loader, base, &reference, Some(&Method::DELETE)), None);
        assert_eq!(resolve(&loader, base, &reference, None), None);
    }

    #[test]
    fn test_load_failure_is_unresolved() {
        let loader = FixedLoader(None);
        assert_eq!(
            resolve(&loader, Path::new("/api"), &Reference::module("missing"), Some(&Method::GET)),
            None
        );
    }

    #[test]
    fn test_absolute_normalises() {
        assert_eq!(
            absolute(Path::new("/srv/api"), Path::new("./handlers/../mocks/pets")),
            PathBuf::from("/srv/api/mocks/pets")
        );
        assert_eq!(
            absolute(Path::new("/srv/api"), Path::new("/etc/handlers")),
            PathBuf::from("/etc/handlers")
        );
        assert!(absolute(Path::new("relative"), Path::new("x")).is_absolute());
    }

    #[test]
    fn test_module_candidates() {
        let c = module_candidates(Path::new("/m/pets"));
        assert_eq!(c.len(), 4);
        assert_eq!(c[1], PathBuf::from("/m/pets.yaml"));
        assert_eq!(c[3], PathBuf::from("/m/pets.json"));

        let c = module_candidates(Path::new("/m/pets.json"));
        assert_eq!(c, vec![PathBuf::from("/m/pets.json")]);
    }
}
