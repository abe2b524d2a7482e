//! The compiled permission table: built once from CSV sources, then read
//! without locks for the lifetime of the process (or until the host swaps
//! in a freshly compiled replacement).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::CompileConfig;
use crate::errors::{CompileError, CompileResult, QueryError, QueryResult};
use crate::evaluators::{Evaluator, UnresolvedEvaluator};
use crate::matrix::RawMatrix;
use crate::parse::parse_source;

/// One permission after compilation: its global flag and one evaluator
/// per user-type column it was defined for.
#[derive(Debug, Clone)]
pub struct CompiledPermission<P, O> {
    pub is_global: bool,
    pub evaluators: HashMap<String, Evaluator<P, O>>,
}

/// Immutable mapping from permission name to compiled permission.
///
/// Queries never mutate the table, so a shared reference (or an `Arc`) can
/// be read from any number of threads at once.
#[derive(Debug)]
pub struct PermissionTable<P, O> {
    permissions: HashMap<String, CompiledPermission<P, O>>,
    strict: bool,
}

impl<P, O> PermissionTable<P, O> {
    /// Whether unknown names/user types raise instead of denying.
    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.permissions.keys().map(String::as_str)
    }

    /// Looks a permission up by name.
    ///
    /// `Ok(None)` is the non-strict "no such permission" outcome; callers
    /// treat it as an unconditional deny. In strict mode absence is an
    /// error instead.
    pub fn lookup(&self, permission: &str) -> QueryResult<Option<&CompiledPermission<P, O>>> {
        match self.permissions.get(permission) {
            Some(compiled) => Ok(Some(compiled)),
            None if self.strict => Err(QueryError::unknown_permission(permission)),
            None => Ok(None),
        }
    }

    /// Whether `permission` is global, with the same absence policy as
    /// [`lookup`](Self::lookup): unknown names deny (report `false`)
    /// unless the table is strict.
    pub fn is_global(&self, permission: &str) -> QueryResult<bool> {
        Ok(self.lookup(permission)?.map(|p| p.is_global).unwrap_or(false))
    }
}

/// Compiles CSV sources into a [`PermissionTable`].
///
/// Pure function of the config: parse every source, merge them into one
/// raw matrix, derive each permission's name, and resolve every cell to
/// its evaluator exactly once. The first error aborts the whole compile;
/// there are no partial tables.
pub fn compile<P: 'static, O: 'static>(
    config: &CompileConfig<P, O>,
) -> CompileResult<PermissionTable<P, O>> {
    let parsed = config
        .sources
        .iter()
        .map(|source| parse_source(&source.name, &source.text))
        .collect::<CompileResult<Vec<_>>>()?;

    let matrix = RawMatrix::merge(&parsed)?;

    let mut permissions: HashMap<String, CompiledPermission<P, O>> =
        HashMap::with_capacity(matrix.len());

    for (key, entry) in matrix.iter() {
        let name = (config.name_resolver)(key, entry.is_global);
        if permissions.contains_key(&name) {
            return Err(CompileError::inconsistent(format!(
                "two permission keys resolve to the same name {name:?} (second was {key})",
            )));
        }

        let mut evaluators = HashMap::with_capacity(entry.cells.len());
        for (user_type, value) in &entry.cells {
            let evaluator = config.resolvers.resolve(&UnresolvedEvaluator {
                key,
                permission: &name,
                is_global: entry.is_global,
                user_type,
                value,
            })?;
            evaluators.insert(user_type.clone(), evaluator);
        }

        permissions.insert(
            name,
            CompiledPermission {
                is_global: entry.is_global,
                evaluators,
            },
        );
    }

    tracing::info!(
        sources = config.sources.len(),
        permissions = permissions.len(),
        strict = config.strict,
        "compiled permission table"
    );

    Ok(PermissionTable {
        permissions,
        strict: config.strict,
    })
}

/// A process-lifetime slot for the active table.
///
/// Readers take a cheap `Arc` clone and keep using it even if a reload
/// lands mid-request; `replace` swaps the whole table at once, so a reader
/// sees the old table or the new one, never a mixture. The host decides
/// when to recompile (a dev-mode file watcher, a SIGHUP handler); this
/// type only makes the swap safe.
#[derive(Debug)]
pub struct SharedTable<P, O> {
    inner: RwLock<Arc<PermissionTable<P, O>>>,
}

impl<P, O> SharedTable<P, O> {
    pub fn new(table: PermissionTable<P, O>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(table)),
        }
    }

    /// The currently active table.
    pub fn snapshot(&self) -> Arc<PermissionTable<P, O>> {
        Arc::clone(&self.inner.read().expect("permission table lock poisoned"))
    }

    /// Atomically replaces the active table, returning the old one.
    pub fn replace(&self, table: PermissionTable<P, O>) -> Arc<PermissionTable<P, O>> {
        let mut slot = self.inner.write().expect("permission table lock poisoned");
        std::mem::replace(&mut *slot, Arc::new(table))
    }
}
