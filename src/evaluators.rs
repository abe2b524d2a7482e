//! Evaluators and the resolver chain that produces them.
//!
//! Every matrix cell is resolved exactly once at compile time: resolvers
//! are tried in order and the first match wins, the same first-match-wins
//! walk the backend's query path uses. Resolvers are pure functions of the
//! cell they are given and carry no cross-cell state.

use std::fmt;
use std::sync::Arc;

use crate::errors::{CompileError, CompileResult, QueryError, QueryResult};
use crate::matrix::PermissionKey;

/// A matrix cell that has been merged but not yet resolved to an
/// [`Evaluator`].
#[derive(Debug, Clone, Copy)]
pub struct UnresolvedEvaluator<'a> {
    pub key: &'a PermissionKey,
    /// The derived permission name, for error messages.
    pub permission: &'a str,
    pub is_global: bool,
    pub user_type: &'a str,
    /// Trimmed raw cell value; may be empty.
    pub value: &'a str,
}

/// Host-supplied decision function, the one open extension point.
pub type CustomEvaluator<P, O> = Arc<dyn Fn(&P, Option<&O>) -> QueryResult<bool> + Send + Sync>;

/// The compiled decision for one (permission, user type) cell.
pub enum Evaluator<P, O> {
    /// `all`: any object passes; an object is required.
    AllObjects,
    /// `yes`: passes; only valid without an object.
    GlobalYes,
    /// `no` or an empty cell: always denied.
    Deny,
    /// Compiled via the fallback resolver; fails with
    /// [`QueryError::NotImplemented`] only if actually invoked.
    Deferred(String),
    Custom(CustomEvaluator<P, O>),
}

impl<P, O> Evaluator<P, O> {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&P, Option<&O>) -> QueryResult<bool> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Answers the cell's decision for one principal/object pair.
    pub fn evaluate(&self, principal: &P, object: Option<&O>) -> QueryResult<bool> {
        match self {
            Self::AllObjects => match object {
                Some(_) => Ok(true),
                None => Err(QueryError::MissingObject),
            },
            Self::GlobalYes => match object {
                Some(_) => Err(QueryError::UnexpectedObject),
                None => Ok(true),
            },
            Self::Deny => Ok(false),
            Self::Deferred(message) => Err(QueryError::not_implemented(message.clone())),
            Self::Custom(f) => f(principal, object),
        }
    }
}

impl<P, O> Clone for Evaluator<P, O> {
    fn clone(&self) -> Self {
        match self {
            Self::AllObjects => Self::AllObjects,
            Self::GlobalYes => Self::GlobalYes,
            Self::Deny => Self::Deny,
            Self::Deferred(message) => Self::Deferred(message.clone()),
            Self::Custom(f) => Self::Custom(Arc::clone(f)),
        }
    }
}

impl<P, O> fmt::Debug for Evaluator<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllObjects => f.write_str("AllObjects"),
            Self::GlobalYes => f.write_str("GlobalYes"),
            Self::Deny => f.write_str("Deny"),
            Self::Deferred(message) => f.debug_tuple("Deferred").field(message).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One step of the chain: `Ok(None)` means "no match, try the next one";
/// an error aborts the whole compile.
pub type Resolver<P, O> =
    Arc<dyn Fn(&UnresolvedEvaluator<'_>) -> CompileResult<Option<Evaluator<P, O>>> + Send + Sync>;

/// Ordered list of resolvers, tried first to last per cell.
pub struct ResolverChain<P, O> {
    resolvers: Vec<Resolver<P, O>>,
}

impl<P: 'static, O: 'static> ResolverChain<P, O> {
    pub fn empty() -> Self {
        Self { resolvers: Vec::new() }
    }

    /// Validation first, then the `all` / `yes` / `no`-or-empty rules.
    /// No fallback: a cell nothing recognizes fails the compile.
    pub fn standard() -> Self {
        Self::empty()
            .with_resolver(resolve_validate_model)
            .with_resolver(resolve_all)
            .with_resolver(resolve_yes)
            .with_resolver(resolve_no_or_empty)
    }

    pub fn with_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&UnresolvedEvaluator<'_>) -> CompileResult<Option<Evaluator<P, O>>>
            + Send
            + Sync
            + 'static,
    {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Appends the deferred fallback so unrecognized cells compile and
    /// only fail if invoked. Keep it last; it matches everything.
    pub fn with_fallback(self) -> Self {
        self.with_resolver(resolve_fallback)
    }

    /// Resolves one cell: first matching resolver wins.
    pub fn resolve(&self, cell: &UnresolvedEvaluator<'_>) -> CompileResult<Evaluator<P, O>> {
        for resolver in &self.resolvers {
            if let Some(evaluator) = resolver(cell)? {
                return Ok(evaluator);
            }
        }
        Err(CompileError::UnresolvedEvaluator {
            permission: cell.permission.to_string(),
            user_type: cell.user_type.to_string(),
            value: cell.value.to_string(),
        })
    }
}

impl<P: 'static, O: 'static> Default for ResolverChain<P, O> {
    /// The standard rules plus the fallback, mirroring a fresh project
    /// where not every cell has a real rule yet.
    fn default() -> Self {
        Self::standard().with_fallback()
    }
}

impl<P, O> Clone for ResolverChain<P, O> {
    fn clone(&self) -> Self {
        Self { resolvers: self.resolvers.clone() }
    }
}

impl<P, O> fmt::Debug for ResolverChain<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverChain")
            .field("len", &self.resolvers.len())
            .finish()
    }
}

/// Resolves nothing; rejects per-object permissions that have no Model.
pub fn resolve_validate_model<P, O>(
    cell: &UnresolvedEvaluator<'_>,
) -> CompileResult<Option<Evaluator<P, O>>> {
    if !cell.is_global && cell.key.model.is_none() {
        return Err(CompileError::invalid_definition(
            cell.permission,
            "permissions without a Model must be global",
        ));
    }
    Ok(None)
}

/// `all`: true for any object. Rejected on global permissions at compile
/// time since those are never queried with an object.
pub fn resolve_all<P, O>(cell: &UnresolvedEvaluator<'_>) -> CompileResult<Option<Evaluator<P, O>>> {
    if cell.value != "all" {
        return Ok(None);
    }
    if cell.is_global {
        return Err(CompileError::invalid_definition(
            cell.permission,
            "'all' cannot be used on a global permission",
        ));
    }
    Ok(Some(Evaluator::AllObjects))
}

/// `yes`: unconditionally true, global permissions only.
pub fn resolve_yes<P, O>(cell: &UnresolvedEvaluator<'_>) -> CompileResult<Option<Evaluator<P, O>>> {
    if cell.value != "yes" {
        return Ok(None);
    }
    if !cell.is_global {
        return Err(CompileError::invalid_definition(
            cell.permission,
            "'yes' cannot be used on a per-object permission",
        ));
    }
    Ok(Some(Evaluator::GlobalYes))
}

/// `no` or an empty cell: always denied.
pub fn resolve_no_or_empty<P, O>(
    cell: &UnresolvedEvaluator<'_>,
) -> CompileResult<Option<Evaluator<P, O>>> {
    match cell.value {
        "no" | "" => Ok(Some(Evaluator::Deny)),
        _ => Ok(None),
    }
}

/// Matches everything and defers the failure to query time, so a matrix
/// full of not-yet-implemented rules still compiles.
pub fn resolve_fallback<P, O>(
    cell: &UnresolvedEvaluator<'_>,
) -> CompileResult<Option<Evaluator<P, O>>> {
    let message = format!(
        "{:?} not implemented for {} / user type {:?}",
        cell.value, cell.permission, cell.user_type,
    );
    tracing::warn!(
        permission = %cell.permission,
        user_type = %cell.user_type,
        value = %cell.value,
        "no resolver matched; deferring failure to query time"
    );
    Ok(Some(Evaluator::Deferred(message)))
}
