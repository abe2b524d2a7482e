//! CSV-driven permission backend.
//!
//! Permissions live in one or more CSV matrices: each row names a
//! permission (`Model, App, Action, Is Global`), each remaining column is
//! a user type, and each cell holds the rule for that pair (`all`, `yes`,
//! `no`, empty, or a host-defined token). The matrices are compiled once
//! into an immutable [`table::PermissionTable`], and every runtime check
//! is answered from that table.
//!
//! ```
//! use std::sync::Arc;
//! use csv_authz::{compile, CompileConfig, PermissionBackend, Principal, Source};
//! use uuid::Uuid;
//!
//! struct Book;
//!
//! let config = CompileConfig::new().with_source(Source::new(
//!     "perms.csv",
//!     "Model, App, Action, Is Global, admin, customer\n\
//!      Book, library, view, no, all, \n",
//! ));
//! let table: Arc<_> = Arc::new(compile::<Principal, Book>(&config).unwrap());
//! let backend = PermissionBackend::for_user_typed(table);
//!
//! let admin = Principal::new(Uuid::new_v4()).with_user_type("admin");
//! assert!(backend.has_permission(&admin, "library.view_book", Some(&Book)).unwrap());
//!
//! let customer = Principal::new(Uuid::new_v4()).with_user_type("customer");
//! assert!(!backend.has_permission(&customer, "library.view_book", Some(&Book)).unwrap());
//! ```

pub mod backend;
pub mod config;
pub mod errors;
pub mod evaluators;
pub mod matrix;
pub mod parse;
pub mod principal;
pub mod table;

pub use backend::{PermissionBackend, UserTypeResolver};
pub use config::{default_permission_name, BackendSettings, CompileConfig, Source};
pub use errors::{CompileError, CompileResult, QueryError, QueryResult};
pub use evaluators::{Evaluator, Resolver, ResolverChain, UnresolvedEvaluator};
pub use matrix::PermissionKey;
pub use principal::{Principal, UserTyped};
pub use table::{compile, CompiledPermission, PermissionTable, SharedTable};
