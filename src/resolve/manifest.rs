use super::{module_candidates, Module, ModuleLoader, ModuleProbe};
use crate::error::LoadError;
use crate::handler::{Handler, HandlerRequest, HandlerResponse, RequestHandler};
use crate::security::{Authorizer, PolicyManifest};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::debug;

/// Filesystem [`ModuleProbe`]: a module exists when one of its candidate
/// paths is a regular file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl ModuleProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        module_candidates(path).iter().any(|p| p.is_file())
    }
}

/// Loads declarative module files (`.yaml`, `.yml`, `.json`) from disk.
///
/// Handler manifests describe canned responses, either one response for
/// every verb:
///
/// ```yaml
/// status: 200
/// body: { ok: true }
/// ```
///
/// or one response per verb:
///
/// ```yaml
/// get:  { status: 200, body: [] }
/// post: { status: 201, body: { id: 1 } }
/// ```
///
/// Authorizer manifests describe a [`PolicyManifest`].
///
/// Parsed modules are cached for the life of the process, keyed by file
/// path. An edited file (new modification time or size) is parsed again.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestLoader;

/// A fixed response served by a mock handler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CannedResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HandlerManifest {
    Response(CannedResponse),
    Exports(IndexMap<String, CannedResponse>),
}

/// Handler that always answers with the same response.
#[derive(Debug, Clone)]
pub struct MockHandler {
    response: CannedResponse,
}

impl MockHandler {
    #[must_use]
    pub fn new(response: CannedResponse) -> Self {
        MockHandler { response }
    }
}

impl RequestHandler for MockHandler {
    fn handle(&self, _req: HandlerRequest) -> HandlerResponse {
        let mut resp = HandlerResponse::json(self.response.status, self.response.body.clone());
        for (name, value) in &self.response.headers {
            resp.set_header(name, value.clone());
        }
        resp
    }
}

/// Identifies one version of a module file.
type Stamp = (Option<SystemTime>, u64);

/// Loaded modules keyed by file path.
///
/// A file is parsed once per version, so loading the same module twice
/// yields the same handler or authorizer values.
struct ModuleCache<T> {
    entries: RwLock<HashMap<PathBuf, (Stamp, Module<T>)>>,
}

impl<T: Clone> ModuleCache<T> {
    fn new() -> Self {
        ModuleCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_load(
        &self,
        path: &Path,
        build: impl FnOnce(&Path) -> Result<Module<T>, LoadError>,
    ) -> Result<Module<T>, LoadError> {
        let file = locate(path)?;
        let stamp = stamp(&file);

        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((cached, module)) = entries.get(&file) {
                if *cached == stamp {
                    return Ok(module.clone());
                }
            }
        }

        let module = build(&file)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // another thread may have loaded the same version meanwhile
        if let Some((cached, existing)) = entries.get(&file) {
            if *cached == stamp {
                return Ok(existing.clone());
            }
        }
        entries.insert(file.clone(), (stamp, module.clone()));
        debug!(file = %file.display(), cached = entries.len(), "Loaded module");
        Ok(module)
    }
}

fn handler_cache() -> &'static ModuleCache<Handler> {
    static CACHE: OnceLock<ModuleCache<Handler>> = OnceLock::new();
    CACHE.get_or_init(ModuleCache::new)
}

fn authorizer_cache() -> &'static ModuleCache<Authorizer> {
    static CACHE: OnceLock<ModuleCache<Authorizer>> = OnceLock::new();
    CACHE.get_or_init(ModuleCache::new)
}

fn locate(path: &Path) -> Result<PathBuf, LoadError> {
    module_candidates(path)
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
}

fn stamp(file: &Path) -> Stamp {
    match std::fs::metadata(file) {
        Ok(meta) => (meta.modified().ok(), meta.len()),
        Err(_) => (None, 0),
    }
}

fn read_manifest<M: DeserializeOwned>(file: &Path) -> Result<M, LoadError> {
    let content = std::fs::read_to_string(file).map_err(|source| LoadError::Io {
        path: file.to_path_buf(),
        source,
    })?;

    let is_json = file.extension().and_then(|e| e.to_str()) == Some("json");
    let parsed = if is_json {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| LoadError::Malformed {
        path: file.to_path_buf(),
        message,
    })
}

impl ModuleLoader<Handler> for ManifestLoader {
    fn load(&self, path: &Path) -> Result<Module<Handler>, LoadError> {
        handler_cache().get_or_load(path, |file| {
            let to_handler = |r: CannedResponse| -> Handler { Arc::new(MockHandler::new(r)) };
            Ok(match read_manifest::<HandlerManifest>(file)? {
                HandlerManifest::Response(r) => Module::Callable(to_handler(r)),
                HandlerManifest::Exports(map) => {
                    Module::exports(map.into_iter().map(|(verb, r)| (verb, to_handler(r))))
                }
            })
        })
    }
}

impl ModuleLoader<Authorizer> for ManifestLoader {
    fn load(&self, path: &Path) -> Result<Module<Authorizer>, LoadError> {
        authorizer_cache().get_or_load(path, |file| {
            let manifest = read_manifest::<PolicyManifest>(file)?;
            Ok(Module::Callable(manifest.into_authorizer()))
        })
    }
}
