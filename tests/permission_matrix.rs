use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use csv_authz::{
    compile, BackendSettings, CompileConfig, CompileError, Evaluator, PermissionBackend,
    Principal, QueryError, ResolverChain, SharedTable, Source, UnresolvedEvaluator,
};
use uuid::Uuid;

#[derive(Debug)]
struct Book {
    owner: Uuid,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

fn user(user_type: &str) -> Principal {
    Principal::new(Uuid::new_v4()).with_user_type(user_type)
}

fn some_book() -> Book {
    Book { owner: Uuid::new_v4() }
}

const LIBRARY_CSV: &str = "\
# library app permissions
Model, App, Action, Is Global, admin, assistant, customer
Book, library, view, no, all, all,
Book, library, change, no, all, ,
, library, report_outstanding, yes, yes, ,
";

const STORE_CSV: &str = "\
; store app permissions
Model, App, Action, Is Global, admin, customer
Order, store, view, no, all,
Book, library, view, no, all,
";

#[test]
fn compiles_multiple_sources_into_one_backend() -> Result<()> {
    init_tracing();

    let config = CompileConfig::new()
        .with_source(Source::new("library.csv", LIBRARY_CSV))
        .with_source(Source::new("store.csv", STORE_CSV));
    let table = Arc::new(compile::<Principal, Book>(&config)?);
    let backend = PermissionBackend::for_user_typed(table);

    let book = some_book();
    assert!(backend.has_permission(&user("admin"), "library.view_book", Some(&book))?);
    assert!(backend.has_permission(&user("admin"), "store.view_order", Some(&book))?);
    assert!(!backend.has_permission(&user("customer"), "library.view_book", Some(&book))?);
    assert!(backend.has_permission(&user("admin"), "library.report_outstanding", None)?);

    Ok(())
}

#[test]
fn source_order_does_not_change_the_result() -> Result<()> {
    let library = Source::new("library.csv", LIBRARY_CSV);
    let store = Source::new("store.csv", STORE_CSV);

    let forward = Arc::new(compile::<Principal, Book>(
        &CompileConfig::new().with_sources([library.clone(), store.clone()]),
    )?);
    let reverse = Arc::new(compile::<Principal, Book>(
        &CompileConfig::new().with_sources([store, library]),
    )?);

    let mut forward_names: Vec<_> = forward.names().map(str::to_string).collect();
    let mut reverse_names: Vec<_> = reverse.names().map(str::to_string).collect();
    forward_names.sort();
    reverse_names.sort();
    assert_eq!(forward_names, reverse_names);

    let forward_backend = PermissionBackend::for_user_typed(Arc::clone(&forward));
    let reverse_backend = PermissionBackend::for_user_typed(Arc::clone(&reverse));

    let book = some_book();
    for name in &forward_names {
        let is_global = forward.is_global(name)?;
        assert_eq!(is_global, reverse.is_global(name)?, "is_global differs for {name}");

        let object = (!is_global).then_some(&book);
        for user_type in ["admin", "assistant", "customer"] {
            assert_eq!(
                forward_backend.has_permission(&user(user_type), name, object)?,
                reverse_backend.has_permission(&user(user_type), name, object)?,
                "{name} / {user_type} differs by source order"
            );
        }
    }

    Ok(())
}

#[test]
fn cross_source_cell_conflicts_fail_the_compile() {
    let base = Source::new(
        "a.csv",
        "Model, App, Action, Is Global, admin\nBook, library, view, no, all\n",
    );
    let conflicting = Source::new(
        "b.csv",
        "Model, App, Action, Is Global, admin\nBook, library, view, no, no\n",
    );

    for sources in [
        [base.clone(), conflicting.clone()],
        [conflicting, base],
    ] {
        let err = compile::<Principal, Book>(&CompileConfig::new().with_sources(sources))
            .unwrap_err();
        assert!(
            matches!(err, CompileError::InconsistentPermission(_)),
            "expected a conflict, got: {err}"
        );
    }
}

#[test]
fn empty_cells_defer_to_other_sources() -> Result<()> {
    let empty = Source::new(
        "a.csv",
        "Model, App, Action, Is Global, admin\nBook, library, view, no, \n",
    );
    let value = Source::new(
        "b.csv",
        "Model, App, Action, Is Global, admin\nBook, library, view, no, all\n",
    );

    for sources in [[empty.clone(), value.clone()], [value, empty]] {
        let table = Arc::new(compile::<Principal, Book>(
            &CompileConfig::new().with_sources(sources),
        )?);
        let backend = PermissionBackend::for_user_typed(table);
        assert!(backend.has_permission(&user("admin"), "library.view_book", Some(&some_book()))?);
    }

    Ok(())
}

#[test]
fn settings_drive_file_loading() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let library_path = dir.path().join("library.csv");
    let store_path = dir.path().join("store.csv");
    std::fs::File::create(&library_path)?.write_all(LIBRARY_CSV.as_bytes())?;
    std::fs::File::create(&store_path)?.write_all(STORE_CSV.as_bytes())?;

    // The shape a host would keep in its settings file.
    let settings: BackendSettings = serde_json::from_value(serde_json::json!({
        "permission_paths": [library_path, store_path],
        "strict_mode": true,
    }))?;

    let table = Arc::new(compile(&settings.into_config::<Principal, Book>()?)?);
    assert!(table.strict());

    let backend = PermissionBackend::for_user_typed(table);
    assert!(backend.has_permission(&user("admin"), "store.view_order", Some(&some_book()))?);

    let err = backend
        .has_permission(&user("admin"), "library.delete_book", None)
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownPermission(_)), "{err}");

    Ok(())
}

#[test]
fn missing_settings_file_fails_loudly() {
    let settings = BackendSettings {
        permission_paths: vec!["/nope/perms.csv".into()],
        strict_mode: false,
    };
    let err = settings.into_config::<Principal, Book>().unwrap_err();
    assert!(matches!(err, CompileError::ReadSource { .. }), "{err}");
}

#[test]
fn host_resolver_adds_an_ownership_rule() -> Result<()> {
    // An "own" token the built-in chain does not know: true only when the
    // principal owns the target object.
    let resolvers = ResolverChain::<Principal, Book>::empty()
        .with_resolver(|cell: &UnresolvedEvaluator<'_>| {
            if cell.value != "own" {
                return Ok(None);
            }
            Ok(Some(Evaluator::custom(|principal: &Principal, object: Option<&Book>| {
                match object {
                    Some(book) => Ok(book.owner == principal.user_id),
                    None => Err(QueryError::MissingObject),
                }
            })))
        })
        .with_resolver(csv_authz::evaluators::resolve_all)
        .with_resolver(csv_authz::evaluators::resolve_no_or_empty);

    let config = CompileConfig::new()
        .with_source(Source::new(
            "perms.csv",
            "Model, App, Action, Is Global, admin, customer\n\
             Book, library, change, no, all, own\n",
        ))
        .with_resolvers(resolvers);
    let backend = PermissionBackend::for_user_typed(Arc::new(compile(&config)?));

    let owner = user("customer");
    let owned = Book { owner: owner.user_id };
    let someone_elses = some_book();

    assert!(backend.has_permission(&owner, "library.change_book", Some(&owned))?);
    assert!(!backend.has_permission(&owner, "library.change_book", Some(&someone_elses))?);
    assert!(backend.has_permission(&user("admin"), "library.change_book", Some(&owned))?);

    Ok(())
}

#[test]
fn fallback_compiles_unknown_tokens_but_fails_on_use() -> Result<()> {
    let config = CompileConfig::new().with_source(Source::new(
        "perms.csv",
        "Model, App, Action, Is Global, admin, customer\n\
         Book, library, change, no, all, own\n",
    ));
    // Default chain ends with the fallback: "own" compiles as deferred.
    let backend = PermissionBackend::for_user_typed(Arc::new(compile::<Principal, Book>(&config)?));

    let book = some_book();
    assert!(backend.has_permission(&user("admin"), "library.change_book", Some(&book))?);

    let err = backend
        .has_permission(&user("customer"), "library.change_book", Some(&book))
        .unwrap_err();
    assert!(matches!(err, QueryError::NotImplemented(_)), "{err}");

    // Without the fallback the same matrix refuses to compile.
    let strict_chain = CompileConfig::new()
        .with_source(Source::new(
            "perms.csv",
            "Model, App, Action, Is Global, admin, customer\n\
             Book, library, change, no, all, own\n",
        ))
        .with_resolvers(ResolverChain::standard());
    let err = compile::<Principal, Book>(&strict_chain).unwrap_err();
    assert!(matches!(err, CompileError::UnresolvedEvaluator { .. }), "{err}");

    Ok(())
}

#[test]
fn reload_swaps_the_whole_table() -> Result<()> {
    let initial = compile::<Principal, Book>(
        &CompileConfig::new().with_source(Source::new("perms.csv", LIBRARY_CSV)),
    )?;
    let shared = SharedTable::new(initial);

    let held = shared.snapshot();
    let backend_before = PermissionBackend::for_user_typed(shared.snapshot());

    // Reload with the assistant column revoked.
    let reloaded = compile::<Principal, Book>(&CompileConfig::new().with_source(Source::new(
        "perms.csv",
        "Model, App, Action, Is Global, admin, assistant, customer\n\
         Book, library, view, no, all, no, \n\
         , library, report_outstanding, yes, yes, ,\n",
    )))?;
    shared.replace(reloaded);

    let backend_after = PermissionBackend::for_user_typed(shared.snapshot());
    let book = some_book();

    // In-flight readers keep the table they started with.
    assert!(backend_before.has_permission(&user("assistant"), "library.view_book", Some(&book))?);
    assert!(held.lookup("library.change_book")?.is_some());

    assert!(!backend_after.has_permission(&user("assistant"), "library.view_book", Some(&book))?);
    assert!(backend_after.table().lookup("library.change_book")?.is_none());

    Ok(())
}
