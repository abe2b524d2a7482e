use std::path::PathBuf;

pub type CompileResult<T> = Result<T, CompileError>;
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while compiling CSV sources into a permission table.
///
/// Any of these aborts the compile; a table is never produced from
/// partially-loaded sources.
#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("{source_name}:{line}: malformed row: {reason}")]
    MalformedRow {
        source_name: String,
        line: usize,
        reason: String,
    },
    #[error("inconsistent permission: {0}")]
    InconsistentPermission(String),
    #[error("invalid definition for {permission}: {reason}")]
    InvalidPermissionDefinition { permission: String, reason: String },
    #[error("no resolver matched {value:?} for {permission} / user type {user_type:?}")]
    UnresolvedEvaluator {
        permission: String,
        user_type: String,
        value: String,
    },
    #[error("failed to read permission source {}", path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    pub fn malformed_row(
        source_name: impl Into<String>,
        line: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedRow {
            source_name: source_name.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentPermission(message.into())
    }

    pub fn invalid_definition(permission: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPermissionDefinition {
            permission: permission.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while answering a permission query.
///
/// None of these are caught internally; callers chaining several
/// authorization backends decide what a raised error means.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// Strict mode only: the permission name is not in the table.
    #[error("unknown permission: {0}")]
    UnknownPermission(String),
    /// Strict mode only: the permission exists but has no column for
    /// this user type.
    #[error("unknown user type {user_type:?} for permission {permission}")]
    UnknownUserType {
        permission: String,
        user_type: String,
    },
    /// A global permission was queried with a target object.
    #[error("global permission {0} cannot be checked against an object")]
    GlobalPermissionWithObject(String),
    /// A per-object permission was queried without a target object.
    #[error("per-object permission {0} requires an object")]
    ObjectRequired(String),
    /// An `all` evaluator was invoked without an object.
    #[error("'all' requires a target object")]
    MissingObject,
    /// A `yes` evaluator was invoked with an object.
    #[error("'yes' does not accept a target object")]
    UnexpectedObject,
    /// A cell that only compiled via the fallback resolver was invoked.
    #[error("permission check not implemented: {0}")]
    NotImplemented(String),
}

impl QueryError {
    pub fn unknown_permission(name: impl Into<String>) -> Self {
        Self::UnknownPermission(name.into())
    }

    pub fn unknown_user_type(permission: impl Into<String>, user_type: impl Into<String>) -> Self {
        Self::UnknownUserType {
            permission: permission.into(),
            user_type: user_type.into(),
        }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }
}
