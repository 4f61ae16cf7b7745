//! DB schema versions and compatibility checks.
//!
//! On startup, [`check_schema`] reads (or initializes) the schema-version
//! record, creates every registered type's table when the stored version
//! is absent or incompatible, and then verifies each column's expected
//! native definition against the live definition reported by the driver's
//! introspection. Any mismatch is logged and makes the whole check fail
//! with a schema-incompatibility error, which the embedding application
//! must treat as fatal for that connection attempt.

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use moneta_core::connection::Backend;
use moneta_core::error::{Error, Result};
use moneta_core::flags::ColumnFlags;
use moneta_core::value::Value;
use moneta_model::bo::{BoMeta, BoMetaBuilder, BusinessObject, SchemaRegistry};
use moneta_model::persistence::Persistence;
use moneta_session::Transaction;
use moneta_sql::clause::ColumnDef;

/// The schema version this build writes after an upgrade.
pub const CURRENT_DB_SCHEMA_VERSION: i64 = 1;
/// Versions this build can operate on without an upgrade.
pub const COMPATIBLE_DB_SCHEMA_VERSIONS: &[i64] = &[1];
/// Type name of the schema-version business object.
pub const SCHEMA_VERSION_TYPE: &str = "schema_version";
/// Attribute holding the stored version number.
pub const VERSION_ATTR: &str = "version_nr";

/// Register the technical schema-version type.
///
/// The version record is an ordinary (technical) business object stored
/// through the normal fetch/store path.
pub fn register_schema_version_type(registry: &SchemaRegistry) -> Result<Arc<BoMeta>> {
    Ok(BoMetaBuilder::new(SCHEMA_VERSION_TYPE)
        .int(VERSION_ATTR, ColumnFlags::NONE)?
        .build_into(registry))
}

/// Create the table of one registered type from its attribute
/// descriptions.
pub async fn create_table<B: Backend>(
    persistence: &Persistence<B>,
    cx: &Cx,
    meta: &Arc<BoMeta>,
) -> Outcome<(), Error> {
    tracing::info!(
        table = %meta.table(),
        bo_type = %meta.type_name(),
        "creating table for business class"
    );
    let mut create = persistence.sql().create_table(meta.table());
    for attr in meta.attribute_descriptions() {
        create = create.column(attr.name, attr.attr_type, attr.flags, attr.extra);
    }
    let stmt = match create.build() {
        Ok(stmt) => stmt,
        Err(e) => return Outcome::Err(e),
    };

    let mut tx = match Transaction::begin(persistence.backend(), cx).await {
        Outcome::Ok(tx) => tx,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    match tx.execute(cx, &stmt).await {
        Outcome::Ok(_) => {}
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    }
    tx.commit(cx).await
}

/// Create every registered type's table.
pub async fn create_all_tables<B: Backend>(
    persistence: &Persistence<B>,
    cx: &Cx,
) -> Outcome<(), Error> {
    for meta in persistence.registry().all() {
        match create_table(persistence, cx, &meta).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }
    Outcome::Ok(())
}

/// Drive an upgrade from the stored version to the target version.
///
/// An absent version means a cold start: every table is created.
pub async fn upgrade_db_schema<B: Backend>(
    persistence: &Persistence<B>,
    cx: &Cx,
    from_version: Option<i64>,
    to_version: i64,
) -> Outcome<(), Error> {
    tracing::debug!(?from_version, to_version, "upgrading DB schema");
    if from_version.is_none() {
        return create_all_tables(persistence, cx).await;
    }
    Outcome::Ok(())
}

/// Compare one table's live column definitions against the object model.
///
/// Each column's expected native definition is re-derived from the
/// attribute descriptions and compared textually against the definition
/// reported by the driver's introspection query.
pub async fn check_table<B: Backend>(
    persistence: &Persistence<B>,
    cx: &Cx,
    meta: &Arc<BoMeta>,
) -> Outcome<bool, Error> {
    let info = match persistence.backend().table_info(cx, meta.table()).await {
        Outcome::Ok(info) => info,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let dialect = persistence.backend().dialect();
    let mut ok = true;
    for attr in meta.attribute_descriptions() {
        let expected = match ColumnDef::new(
            attr.name.clone(),
            attr.attr_type,
            attr.flags,
            attr.extra.clone(),
        )
        .render(dialect)
        {
            Ok(expected) => expected,
            Err(e) => return Outcome::Err(e),
        };
        match info.get(&attr.name) {
            None => {
                tracing::error!(
                    table = %meta.table(),
                    column = %attr.name,
                    expected = %expected,
                    "column is undefined in the DB"
                );
                ok = false;
            }
            Some(actual) if actual.trim() != expected.trim() => {
                tracing::error!(
                    table = %meta.table(),
                    column = %attr.name,
                    actual = %actual,
                    expected = %expected,
                    "column definition differs from the object model"
                );
                ok = false;
            }
            Some(_) => {}
        }
    }
    tracing::debug!(table = %meta.table(), ok, "table check finished");
    Outcome::Ok(ok)
}

/// Check the DB schema version, upgrade if necessary, and verify the
/// compatibility of every persistence table.
pub async fn check_schema<B: Backend>(persistence: &Persistence<B>, cx: &Cx) -> Outcome<(), Error> {
    tracing::debug!("checking DB schema");
    match persistence.backend().table_list(cx).await {
        Outcome::Ok(tables) => {
            tracing::debug!(count = tables.len(), tables = %tables.join(", "), "tables found in DB");
        }
        Outcome::Err(e) => {
            tracing::debug!(error = %e, "table list unavailable (cold start)");
        }
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    }

    let version_meta = match persistence.registry().lookup(SCHEMA_VERSION_TYPE) {
        Ok(meta) => meta,
        Err(e) => return Outcome::Err(e),
    };

    let mut version_bo = BusinessObject::new(Arc::clone(&version_meta));
    let stored_version = match persistence.fetch(cx, &mut version_bo, None, true).await {
        Outcome::Ok(()) => version_bo.get(VERSION_ATTR).and_then(Value::as_int),
        Outcome::Err(e) => {
            // A missing version table reads as "no version yet".
            tracing::debug!(error = %e, "no schema version record readable");
            None
        }
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let needs_upgrade = match stored_version {
        None => true,
        Some(version) => {
            version < CURRENT_DB_SCHEMA_VERSION
                || !COMPATIBLE_DB_SCHEMA_VERSIONS.contains(&version)
        }
    };
    if needs_upgrade {
        match upgrade_db_schema(persistence, cx, stored_version, CURRENT_DB_SCHEMA_VERSION).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    let mut ok = true;
    for meta in persistence.registry().all() {
        match check_table(persistence, cx, &meta).await {
            Outcome::Ok(table_ok) => ok = table_ok && ok,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }
    if !ok {
        return Outcome::Err(Error::schema_incompatible(
            "DB schema does not match the registered object model",
        ));
    }

    if needs_upgrade {
        let mut version_bo = BusinessObject::new(version_meta);
        if let Err(e) = version_bo.set(VERSION_ATTR, Value::Int(CURRENT_DB_SCHEMA_VERSION)) {
            return Outcome::Err(e);
        }
        match persistence.store(cx, &mut version_bo).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }
    Outcome::Ok(())
}
