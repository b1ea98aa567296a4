use super::{flatten_requirements, Authorizer, SecurityEntry, SecurityMap};
use crate::error::CompileError;
use crate::resolve::{resolve, ModuleLoader, Reference};
use crate::spec::{SecurityDecl, SecuritySchemeDef};
use http::Method;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Compiles route security requirements into [`SecurityMap`]s.
pub struct SecurityCompiler<'a> {
    loader: &'a dyn ModuleLoader<Authorizer>,
    basedir: &'a Path,
    security_root: Option<&'a Path>,
}

impl<'a> SecurityCompiler<'a> {
    pub fn new(
        loader: &'a dyn ModuleLoader<Authorizer>,
        basedir: &'a Path,
        security_root: Option<&'a Path>,
    ) -> Self {
        SecurityCompiler {
            loader,
            basedir,
            security_root,
        }
    }

    /// Compile a route's requirement objects, one [`SecurityMap`] per object
    /// in declaration order. Schemes inside one object are all required;
    /// the objects are alternatives.
    ///
    /// Returns `Ok(None)` when there are no global definitions, no
    /// requirement, or the requirement is not a list of requirement objects.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnknownSecurityScheme`] and
    /// [`CompileError::UnknownScope`].
    pub fn requirements(
        &self,
        definitions: Option<&IndexMap<String, SecuritySchemeDef>>,
        requirement: Option<&SecurityDecl>,
        path: &str,
        method: &Method,
    ) -> Result<Option<Vec<SecurityMap>>, CompileError> {
        let (Some(definitions), Some(requirements)) =
            (definitions, requirement.and_then(SecurityDecl::requirements))
        else {
            return Ok(None);
        };

        let mut compiled = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let mut group = SecurityMap::new();
            for (name, requested) in requirement {
                let def = definitions.get(name).ok_or_else(|| {
                    CompileError::UnknownSecurityScheme {
                        scheme: name.clone(),
                        path: path.to_string(),
                        method: method.clone(),
                    }
                })?;

                let scopes = requested
                    .iter()
                    .map(|scope| match scope {
                        Value::String(s) if def.has_scope(s) => Ok(s.clone()),
                        other => Err(CompileError::UnknownScope {
                            scope: other.as_str().map_or_else(|| other.to_string(), str::to_string),
                            scheme: name.clone(),
                            path: path.to_string(),
                            method: method.clone(),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let authorize = self.authorizer_for(name, def);
                debug!(
                    path = %path,
                    method = %method,
                    scheme = %name,
                    scopes = ?scopes,
                    authorize = authorize.is_some(),
                    "Compiled security requirement"
                );
                group.insert(name.clone(), SecurityEntry { scopes, authorize });
            }
            compiled.push(group);
        }
        Ok(Some(compiled))
    }

    /// Build the flat security map for one route: every requirement object
    /// merged in order, a scheme named twice keeping the last scopes given.
    ///
    /// # Errors
    ///
    /// See [`SecurityCompiler::requirements`].
    pub fn build(
        &self,
        definitions: Option<&IndexMap<String, SecuritySchemeDef>>,
        requirement: Option<&SecurityDecl>,
        path: &str,
        method: &Method,
    ) -> Result<Option<SecurityMap>, CompileError> {
        Ok(self
            .requirements(definitions, requirement, path, method)?
            .as_deref()
            .map(flatten_requirements))
    }

    /// A declared `x-authorize` is the only source for its scheme; the
    /// security root is consulted only for schemes without one.
    fn authorizer_for(&self, name: &str, def: &SecuritySchemeDef) -> Option<Authorizer> {
        if let Some(declared) = &def.authorize {
            let authorizer = resolve(self.loader, self.basedir, declared, None);
            if authorizer.is_none() {
                warn!(
                    scheme = %name,
                    reference = ?declared,
                    "x-authorize did not resolve; scheme has no authorizer"
                );
            }
            return authorizer;
        }

        let root = self.security_root?;
        resolve(self.loader, self.basedir, &Reference::Module(root.join(name)), None)
    }
}
