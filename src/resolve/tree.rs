use super::{Module, ModuleLoader, MODULE_EXTENSIONS};
use crate::handler::Handler;
use anyhow::Context;
use http::Method;
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, warn};

/// Nested lookup of handlers by path segment, then by verb.
///
/// Built from a directory of handler modules: `handlers/pets.yaml` serves
/// `/pets`, `handlers/pets/{id}.yaml` serves `/pets/{id}`. A module exporting
/// per-verb handlers fills [`HandlerTree::lookup`] by verb; a callable module
/// serves every verb of its path.
#[derive(Clone, Default)]
pub struct HandlerTree {
    children: IndexMap<String, HandlerTree>,
    verbs: IndexMap<String, Handler>,
    any: Option<Handler>,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl HandlerTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn node_mut(&mut self, path: &str) -> &mut HandlerTree {
        segments(path).fold(self, |node, seg| node.children.entry(seg.to_string()).or_default())
    }

    fn node(&self, path: &str) -> Option<&HandlerTree> {
        segments(path).try_fold(self, |node, seg| node.children.get(seg))
    }

    /// Register `handler` for `method` on `path`.
    pub fn insert(&mut self, path: &str, method: &Method, handler: Handler) -> &mut Self {
        self.node_mut(path)
            .verbs
            .insert(method.as_str().to_ascii_lowercase(), handler);
        self
    }

    /// Register `handler` for every verb on `path`. Verb-specific entries
    /// take precedence.
    pub fn insert_any(&mut self, path: &str, handler: Handler) -> &mut Self {
        self.node_mut(path).any = Some(handler);
        self
    }

    fn mount(&mut self, path: &str, module: Module<Handler>) {
        let node = self.node_mut(path);
        match module {
            Module::Callable(handler) => node.any = Some(handler),
            Module::Exports(exports) => node.verbs.extend(exports),
        }
    }

    /// Exact lookup: every segment of `path` must match a tree segment
    /// literally, `{param}` placeholders included.
    #[must_use]
    pub fn lookup(&self, path: &str, method: &Method) -> Option<Handler> {
        let node = self.node(path)?;
        let verb = method.as_str().to_ascii_lowercase();
        node.verbs.get(&verb).or(node.any.as_ref()).cloned()
    }

    /// Number of (path, verb) entries, counting a catch-all as one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.verbs.len()
            + usize::from(self.any.is_some())
            + self.children.values().map(HandlerTree::len).sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a tree from the module files under `root`.
    ///
    /// Entries are visited in name order. A file stem names a segment;
    /// subdirectories nest. Files that fail to load are skipped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be listed.
    pub fn read_dir(root: &Path, loader: &dyn ModuleLoader<Handler>) -> anyhow::Result<Self> {
        let mut tree = HandlerTree::new();
        tree.read_into(root, "", loader)?;
        debug!(root = %root.display(), entries = tree.len(), "Loaded handler tree");
        Ok(tree)
    }

    fn read_into(
        &mut self,
        dir: &Path,
        prefix: &str,
        loader: &dyn ModuleLoader<Handler>,
    ) -> anyhow::Result<()> {
        let mut entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read handler directory {}", dir.display()))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to list handler directory {}", dir.display()))?;
        entries.sort_by_key(std::fs::DirEntry::file_name);

        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                    continue;
                };
                self.read_into(&path, &format!("{prefix}/{name}"), loader)?;
                continue;
            }

            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let route = format!("{prefix}/{name}");

            let is_module = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| MODULE_EXTENSIONS.contains(&e));
            if !is_module {
                continue;
            }

            match loader.load(&path) {
                Ok(module) => self.mount(&route, module),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping handler module");
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HandlerTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTree")
            .field("verbs", &self.verbs.keys().collect::<Vec<_>>())
            .field("any", &self.any.is_some())
            .field("children", &self.children)
            .finish()
    }
}
