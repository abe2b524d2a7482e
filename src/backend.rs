//! Query-time entry point.
//!
//! `has_permission` answers one check in a fixed order: resolve the
//! principal's user type, look the permission up, enforce the
//! global/per-object contract, pick the user type's evaluator, invoke it.
//! Evaluator errors propagate unmodified; the caller owns the decision of
//! what a raised error means when several backends are chained.

use std::sync::Arc;

use crate::errors::{QueryError, QueryResult};
use crate::principal::UserTyped;
use crate::table::PermissionTable;

/// Resolves a principal to the matrix user-type column that applies.
pub type UserTypeResolver<P> = Arc<dyn Fn(&P) -> Option<String> + Send + Sync>;

/// The host-facing permission checker, bound to one compiled table.
///
/// Cheap to clone; clones share the table. Reload is the host's job:
/// compile a new table (see [`crate::table::SharedTable`]) and build a
/// backend over it.
pub struct PermissionBackend<P, O> {
    table: Arc<PermissionTable<P, O>>,
    user_type_resolver: UserTypeResolver<P>,
}

impl<P, O> PermissionBackend<P, O> {
    pub fn new<F>(table: Arc<PermissionTable<P, O>>, user_type_resolver: F) -> Self
    where
        F: Fn(&P) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            table,
            user_type_resolver: Arc::new(user_type_resolver),
        }
    }

    pub fn table(&self) -> &Arc<PermissionTable<P, O>> {
        &self.table
    }

    /// Whether `permission` must be checked without an object. Callers
    /// deciding whether to pass an object ask this first.
    pub fn is_global(&self, permission: &str) -> QueryResult<bool> {
        self.table.is_global(permission)
    }

    /// Answers one permission check.
    ///
    /// Check order:
    /// 1. no resolvable user type -> deny, never an error;
    /// 2. unknown permission -> deny, or raise in strict mode;
    /// 3. global/per-object contract violation -> error, before the user
    ///    type is even considered;
    /// 4. no evaluator for the user type -> deny, or raise in strict mode;
    /// 5. otherwise the cell's evaluator decides.
    pub fn has_permission(
        &self,
        principal: &P,
        permission: &str,
        object: Option<&O>,
    ) -> QueryResult<bool> {
        let user_type = (self.user_type_resolver)(principal).filter(|ut| !ut.is_empty());
        let user_type = match user_type {
            Some(user_type) => user_type,
            None => {
                tracing::debug!(permission = %permission, "no user type; denied");
                return Ok(false);
            }
        };

        let compiled = match self.table.lookup(permission)? {
            Some(compiled) => compiled,
            None => {
                tracing::debug!(
                    permission = %permission,
                    user_type = %user_type,
                    "permission not in table; denied"
                );
                return Ok(false);
            }
        };

        if compiled.is_global && object.is_some() {
            return Err(QueryError::GlobalPermissionWithObject(permission.to_string()));
        }
        if !compiled.is_global && object.is_none() {
            return Err(QueryError::ObjectRequired(permission.to_string()));
        }

        let evaluator = match compiled.evaluators.get(&user_type) {
            Some(evaluator) => evaluator,
            None if self.table.strict() => {
                return Err(QueryError::unknown_user_type(permission, user_type));
            }
            None => {
                tracing::debug!(
                    permission = %permission,
                    user_type = %user_type,
                    "no evaluator for user type; denied"
                );
                return Ok(false);
            }
        };

        let allowed = evaluator.evaluate(principal, object)?;
        tracing::debug!(
            permission = %permission,
            user_type = %user_type,
            allowed = allowed,
            "evaluated"
        );
        Ok(allowed)
    }
}

impl<P: UserTyped, O> PermissionBackend<P, O> {
    /// Backend for principals that know their own user type.
    pub fn for_user_typed(table: Arc<PermissionTable<P, O>>) -> Self {
        Self::new(table, |principal: &P| {
            principal.user_type().map(str::to_string)
        })
    }
}

impl<P, O> Clone for PermissionBackend<P, O> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            user_type_resolver: Arc::clone(&self.user_type_resolver),
        }
    }
}
