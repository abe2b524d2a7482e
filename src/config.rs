//! Compile-time configuration: which sources to load, how cells resolve,
//! how permission names are derived, and whether lookups are strict.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{CompileError, CompileResult};
use crate::evaluators::ResolverChain;
use crate::matrix::PermissionKey;

/// One CSV source: an identifier (used in error messages) plus its text.
/// Reading the text is the caller's concern; [`Source::from_path`] covers
/// the common case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub text: String,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CompileError::ReadSource {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.to_string_lossy(), text))
    }
}

/// Derives a permission name from a key and its global flag.
pub type PermNameResolver = Arc<dyn Fn(&PermissionKey, bool) -> String + Send + Sync>;

/// `"<app>.<action>_<model>"` with the model lowercased, or
/// `"<app>.<action>"` when there is no model. `("library", Book, "view")`
/// becomes `"library.view_book"`.
pub fn default_permission_name(key: &PermissionKey, _is_global: bool) -> String {
    match &key.model {
        Some(model) => format!("{}.{}_{}", key.app, key.action, model.to_lowercase()),
        None => format!("{}.{}", key.app, key.action),
    }
}

/// Everything [`crate::table::compile`] needs to build a table.
pub struct CompileConfig<P, O> {
    pub(crate) sources: Vec<Source>,
    pub(crate) resolvers: ResolverChain<P, O>,
    pub(crate) strict: bool,
    pub(crate) name_resolver: PermNameResolver,
}

impl<P: 'static, O: 'static> CompileConfig<P, O> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            resolvers: ResolverChain::default(),
            strict: false,
            name_resolver: Arc::new(default_permission_name),
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_resolvers(mut self, resolvers: ResolverChain<P, O>) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Strict mode: unknown permission names and user types raise
    /// [`crate::errors::QueryError`] instead of silently denying.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Replaces the name resolver. Exactly one is active per compile.
    pub fn with_name_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&PermissionKey, bool) -> String + Send + Sync + 'static,
    {
        self.name_resolver = Arc::new(resolver);
        self
    }
}

impl<P: 'static, O: 'static> Default for CompileConfig<P, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, O> fmt::Debug for CompileConfig<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileConfig")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("resolvers", &self.resolvers)
            .field("strict", &self.strict)
            .finish()
    }
}

/// The slice of host settings this backend consumes, in the shape a host
/// keeps in its own configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// CSV files, loaded in order.
    pub permission_paths: Vec<PathBuf>,
    /// See [`CompileConfig::with_strict_mode`].
    #[serde(default)]
    pub strict_mode: bool,
}

impl BackendSettings {
    pub fn load_sources(&self) -> CompileResult<Vec<Source>> {
        self.permission_paths.iter().map(Source::from_path).collect()
    }

    pub fn into_config<P: 'static, O: 'static>(self) -> CompileResult<CompileConfig<P, O>> {
        let sources = self.load_sources()?;
        Ok(CompileConfig::new()
            .with_sources(sources)
            .with_strict_mode(self.strict_mode))
    }
}
