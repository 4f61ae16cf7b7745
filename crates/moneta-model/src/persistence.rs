//! Generic CRUD for business objects.
//!
//! [`Persistence`] bundles a backend with the schema registry, the
//! identity map, and the change hub. `fetch` materializes one row into an
//! object (snapshotting the raw row as the update-diff baseline); `store`
//! inserts new objects and diff-updates existing ones, touching only the
//! attributes whose value differs from the baseline.

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use moneta_core::connection::Backend;
use moneta_core::error::Error;
use moneta_core::value::Value;
use moneta_session::{SqlContext, Transaction};
use moneta_sql::{Expr, Sql};

use crate::bo::{BoMeta, BusinessObject, ID_ATTR, SchemaRegistry};
use crate::convert::convert_from_db;
use crate::hub::ChangeHub;
use crate::repo::Repository;

/// The persistence unit of work: backend + registry + identity map +
/// change hub.
pub struct Persistence<B: Backend> {
    backend: B,
    registry: Arc<SchemaRegistry>,
    repo: Repository,
    hub: Arc<ChangeHub>,
}

impl<B: Backend> Persistence<B> {
    /// Bundle a backend with a schema registry.
    pub fn new(backend: B, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            backend,
            registry,
            repo: Repository::new(),
            hub: Arc::new(ChangeHub::new()),
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The schema registry.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// The identity map.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// The change hub.
    pub fn hub(&self) -> &Arc<ChangeHub> {
        &self.hub
    }

    /// Statement builders bound to the backend's dialect.
    pub fn sql(&self) -> Sql {
        Sql::new(self.backend.dialect())
    }

    /// A fresh, unsaved instance of a registered type.
    pub fn new_object(&self, type_name: &str) -> Result<BusinessObject, Error> {
        let meta = self.registry.lookup(type_name)?;
        Ok(BusinessObject::new(meta))
    }

    /// An instance with a known id: the identity-mapped one when cached.
    pub fn object_with_id(&self, type_name: &str, id: i64) -> Result<BusinessObject, Error> {
        let meta = self.registry.lookup(type_name)?;
        self.repo.obtain(&meta, id)
    }

    /// Fetch the object's content from the database.
    ///
    /// With an explicit `id` (or the object's own id), the identified row
    /// is read; with `newest`, the row with the highest id. Without
    /// either, the object is returned unchanged. A fetched row is
    /// snapshotted as the update-diff baseline.
    #[tracing::instrument(level = "debug", skip_all, fields(bo_type = %bo.meta().type_name()))]
    pub async fn fetch(
        &self,
        cx: &Cx,
        bo: &mut BusinessObject,
        id: Option<i64>,
        newest: bool,
    ) -> Outcome<(), Error> {
        let id = id.or_else(|| bo.id());
        if id.is_none() && !newest {
            tracing::debug!("fetch without id or newest is a no-op");
            return Outcome::Ok(());
        }

        let table = bo.meta().table().to_string();
        let select = self.sql().select().distinct().from_(table.clone());
        let select = match id {
            Some(id) => select.where_(Expr::col("id").eq(id)),
            None => select.where_(Expr::raw(format!("id = (SELECT MAX(id) FROM {table})"))),
        };
        let stmt = match select.build() {
            Ok(stmt) => stmt,
            Err(e) => return Outcome::Err(e),
        };

        let mut ctx = SqlContext::new(&self.backend);
        let row = match ctx.query_one(cx, &stmt).await {
            Outcome::Ok(row) => row,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if let Outcome::Err(e) = ctx.close(cx).await {
            tracing::warn!(error = %e, "closing fetch context failed");
        }

        if let Some(row) = row {
            if let Err(e) = bo.load_db_row(row) {
                return Outcome::Err(e);
            }
            self.repo.register(bo);
        }
        Outcome::Ok(())
    }

    /// Store the object: insert when it has no id, diff-update otherwise.
    ///
    /// The update path re-fetches afterward regardless of the update's
    /// outcome; an update with zero changed attributes issues no UPDATE
    /// statement but still re-fetches. Afterwards the insert path notifies
    /// the creation subscribers, the update path the change and instance
    /// subscribers; the notify dispatch is awaited before `store` returns.
    #[tracing::instrument(level = "debug", skip_all, fields(bo_type = %bo.meta().type_name()))]
    pub async fn store(&self, cx: &Cx, bo: &mut BusinessObject) -> Outcome<(), Error> {
        match bo.id() {
            None => {
                let new_id = match self.insert_object(cx, bo).await {
                    Outcome::Ok(id) => id,
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                };
                if let Err(e) = bo.set_id(new_id) {
                    return Outcome::Err(e);
                }
                self.repo.register(bo);
                self.hub.notify_created(cx, bo).await;
            }
            Some(id) => {
                let update_result = self.update_object(cx, bo, id).await;
                // Re-fetch runs regardless of how the update went.
                let fetch_result = self.fetch(cx, bo, Some(id), false).await;
                match update_result {
                    Outcome::Ok(()) => {}
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
                match fetch_result {
                    Outcome::Ok(()) => {}
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
                self.hub.notify_changed(cx, bo).await;
            }
        }
        Outcome::Ok(())
    }

    async fn insert_object(&self, cx: &Cx, bo: &BusinessObject) -> Outcome<i64, Error> {
        let row: Vec<(String, Value)> = bo
            .data()
            .iter()
            .filter(|(name, value)| name.as_str() != ID_ATTR && !value.is_null())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if row.is_empty() {
            return Outcome::Err(Error::validation(format!(
                "cannot store '{}' without attribute values",
                bo.meta().type_name()
            )));
        }
        tracing::debug!(table = %bo.meta().table(), "inserting new business object");

        let table = bo.meta().table().to_string();
        let supports_returning = self.backend.dialect().supports_returning();

        let mut tx = match Transaction::begin(&self.backend, cx).await {
            Outcome::Ok(tx) => tx,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let new_id = if supports_returning {
            let stmt = match self.sql().insert(table).row(row).returning("id").build() {
                Ok(stmt) => stmt,
                Err(e) => return Outcome::Err(e),
            };
            let returned = match tx.query_one(cx, &stmt).await {
                Outcome::Ok(row) => row,
                Outcome::Err(e) => {
                    match tx.rollback(cx).await {
                        Outcome::Ok(()) | Outcome::Err(_) => {}
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                    return Outcome::Err(e);
                }
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let Some(returned) = returned else {
                return Outcome::Err(Error::operational("INSERT returned no generated id"));
            };
            match returned.get_named::<i64>(ID_ATTR) {
                Ok(id) => id,
                Err(e) => return Outcome::Err(e),
            }
        } else {
            let stmt = match self.sql().insert(table).row(row).build() {
                Ok(stmt) => stmt,
                Err(e) => return Outcome::Err(e),
            };
            let result = match tx.execute(cx, &stmt).await {
                Outcome::Ok(result) => result,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            match result.last_insert_id {
                Some(id) => id,
                None => {
                    return Outcome::Err(Error::operational(
                        "driver reported no generated id for INSERT",
                    ));
                }
            }
        };

        match tx.commit(cx).await {
            Outcome::Ok(()) => Outcome::Ok(new_id),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    async fn update_object(&self, cx: &Cx, bo: &BusinessObject, id: i64) -> Outcome<(), Error> {
        let meta = Arc::clone(bo.meta());
        let mut update = self
            .sql()
            .update(meta.table())
            .where_(Expr::col(ID_ATTR).eq(id));
        let mut changes = false;

        for (name, value) in bo.data() {
            if name == ID_ATTR {
                continue;
            }
            let Some(attr) = meta.attr(name) else {
                continue;
            };
            let baseline = match convert_from_db(bo.db_snapshot().get(name), &attr) {
                Ok(baseline) => baseline,
                Err(e) => return Outcome::Err(e),
            };
            if *value != baseline {
                changes = true;
                update = match update.assignment(&[name.as_str()], value.clone()) {
                    Ok(update) => update,
                    Err(e) => return Outcome::Err(e),
                };
            }
        }

        if !changes {
            tracing::debug!(table = %meta.table(), "no changed attributes, skipping UPDATE");
            return Outcome::Ok(());
        }

        let stmt = match update.build() {
            Ok(stmt) => stmt,
            Err(e) => return Outcome::Err(e),
        };
        let mut tx = match Transaction::begin(&self.backend, cx).await {
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

    /// Count the rows matching the conditions.
    pub async fn count_rows(
        &self,
        cx: &Cx,
        meta: &Arc<BoMeta>,
        conditions: &[(String, Option<Value>)],
    ) -> Outcome<i64, Error> {
        let mut select = self
            .sql()
            .select()
            .columns(&["count(*) as count"])
            .from_(meta.table());
        if !conditions.is_empty() {
            select = select.where_(Expr::filter(conditions.iter().cloned()));
        }
        let stmt = match select.build() {
            Ok(stmt) => stmt,
            Err(e) => return Outcome::Err(e),
        };

        let mut ctx = SqlContext::new(&self.backend);
        let row = match ctx.query_one(cx, &stmt).await {
            Outcome::Ok(row) => row,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if let Outcome::Err(e) = ctx.close(cx).await {
            tracing::warn!(error = %e, "closing count context failed");
        }
        match row {
            Some(row) => match row.get_named::<i64>("count") {
                Ok(count) => Outcome::Ok(count),
                Err(e) => Outcome::Err(e),
            },
            None => Outcome::Ok(0),
        }
    }

    /// The ids of the rows matching the conditions.
    pub async fn matching_ids(
        &self,
        cx: &Cx,
        meta: &Arc<BoMeta>,
        conditions: &[(String, Option<Value>)],
    ) -> Outcome<Vec<i64>, Error> {
        let mut select = self.sql().select().columns(&[ID_ATTR]).from_(meta.table());
        if !conditions.is_empty() {
            select = select.where_(Expr::filter(conditions.iter().cloned()));
        }
        let stmt = match select.build() {
            Ok(stmt) => stmt,
            Err(e) => return Outcome::Err(e),
        };

        let mut ctx = SqlContext::new(&self.backend);
        let rows = match ctx.query(cx, &stmt).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if let Outcome::Err(e) = ctx.close(cx).await {
            tracing::warn!(error = %e, "closing id query context failed");
        }

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            match row.get_named::<i64>(ID_ATTR) {
                Ok(id) => ids.push(id),
                Err(e) => return Outcome::Err(e),
            }
        }
        Outcome::Ok(ids)
    }
}
