//! # Compiler Configuration
//!
//! Settings that decide where the route compiler looks for modules and how it
//! builds route paths. Values come from an optional YAML file and can be
//! overridden from the environment.
//!
//! ## File
//!
//! ```yaml
//! basedir: ./api
//! handler_root: handlers
//! security_root: security
//! base_path_mode: prepend-when-declared
//! ```
//!
//! Relative roots are taken from `basedir`.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BRRTR_BASEDIR` | `basedir` |
//! | `BRRTR_HANDLER_ROOT` | `handler_root` |
//! | `BRRTR_SECURITY_ROOT` | `security_root` |
//! | `BRRTR_BASE_PATH_MODE` | `base_path_mode` (`prepend-when-declared` or `never`) |
//!
//! An unparseable `BRRTR_BASE_PATH_MODE` is logged and ignored.

use crate::resolve::absolute;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Whether the global `basePath` is prepended to route paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BasePathMode {
    /// Prepend `basePath` when the description declares one.
    #[default]
    PrependWhenDeclared,
    /// Use declared paths as they are.
    Never,
}

impl BasePathMode {
    /// Effective route path for a declared path template.
    #[must_use]
    pub fn apply(self, base_path: Option<&str>, path: &str) -> String {
        match (self, base_path) {
            (BasePathMode::PrependWhenDeclared, Some(base)) => {
                format!("{}{}", base.trim_end_matches('/'), path)
            }
            _ => path.to_string(),
        }
    }
}

impl FromStr for BasePathMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepend" | "prepend-when-declared" => Ok(BasePathMode::PrependWhenDeclared),
            "never" => Ok(BasePathMode::Never),
            other => Err(format!("unknown base path mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Directory module references are resolved against.
    pub basedir: PathBuf,
    /// Where `x-handler` modules must exist; defaults to `basedir`.
    pub handler_root: Option<PathBuf>,
    /// Directory of convention-based authorizer modules, one per scheme.
    pub security_root: Option<PathBuf>,
    pub base_path_mode: BasePathMode,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            basedir: PathBuf::from("."),
            handler_root: None,
            security_root: None,
            base_path_mode: BasePathMode::default(),
        }
    }
}

impl CompilerConfig {
    #[must_use]
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        CompilerConfig {
            basedir: basedir.into(),
            ..Default::default()
        }
    }

    /// Read a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply `BRRTR_*` overrides from the process environment.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; `apply_env` uses the process
    /// environment.
    #[must_use]
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("BRRTR_BASEDIR") {
            self.basedir = PathBuf::from(v);
        }
        if let Some(v) = lookup("BRRTR_HANDLER_ROOT") {
            self.handler_root = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("BRRTR_SECURITY_ROOT") {
            self.security_root = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("BRRTR_BASE_PATH_MODE") {
            match v.parse() {
                Ok(mode) => self.base_path_mode = mode,
                Err(e) => warn!(value = %v, error = %e, "Ignoring BRRTR_BASE_PATH_MODE"),
            }
        }
        self
    }

    #[must_use]
    pub fn with_handler_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.handler_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_security_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.security_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_base_path_mode(mut self, mode: BasePathMode) -> Self {
        self.base_path_mode = mode;
        self
    }

    /// Handler root for an already absolute `basedir`: the configured root
    /// taken from `basedir`, or `basedir` itself when none is set.
    #[must_use]
    pub fn handler_root(&self, basedir: &Path) -> PathBuf {
        match &self.handler_root {
            Some(root) => absolute(basedir, root),
            None => basedir.to_path_buf(),
        }
    }
}
