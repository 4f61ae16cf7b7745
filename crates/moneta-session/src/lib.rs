//! Execution and transaction contexts.
//!
//! Three nested context types share one connection slot:
//!
//! - [`SqlContext`]: a bare statement context. Opens a connection lazily if
//!   none was given, auto-commits after a successful statement and rolls
//!   back after a failed one.
//! - [`Transaction`]: explicitly begins a transaction, commits on
//!   [`Transaction::commit`], rolls back on a failed statement or explicit
//!   [`Transaction::rollback`]. A failed commit is converted into
//!   rollback-then-[`Error::CommitFailed`].
//! - [`ConnectionContext`]: only manages the underlying physical
//!   connection's lifetime and lends statement or transaction contexts
//!   bound to it.
//!
//! Contexts are not shared between logical operations: one context serves
//! one operation at a time, in submission order. Independent contexts may
//! run concurrently against the same database, each with its own pooled or
//! direct connection.

use asupersync::{Cx, Outcome};
use moneta_core::connection::{Backend, Connection, ExecResult};
use moneta_core::error::Error;
use moneta_core::row::Row;
use moneta_sql::Statement;

/// Lifecycle of a statement context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No physical connection yet.
    Unconnected,
    /// Connected; statements may execute.
    Connected,
    /// Closed; executing is an error.
    Closed,
}

/// Either an owned (possibly not-yet-opened) connection or one borrowed
/// from an enclosing [`ConnectionContext`].
enum Slot<'a, C: Connection> {
    Owned(Option<C>),
    Borrowed(&'a mut C),
}

impl<'a, C: Connection> Slot<'a, C> {
    fn get(&mut self) -> Option<&mut C> {
        match self {
            Slot::Owned(conn) => conn.as_mut(),
            Slot::Borrowed(conn) => Some(&mut **conn),
        }
    }

    fn is_connected(&self) -> bool {
        !matches!(self, Slot::Owned(None))
    }
}

/// A bare statement context.
///
/// State machine: unconnected → connected → (executing)* → closed.
/// Re-entering `execute` after `close` is an error.
pub struct SqlContext<'a, B: Backend> {
    backend: &'a B,
    slot: Slot<'a, B::Conn>,
    state: ContextState,
}

impl<'a, B: Backend> SqlContext<'a, B> {
    /// A context that opens its own connection on first use.
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            slot: Slot::Owned(None),
            state: ContextState::Unconnected,
        }
    }

    /// A context bound to an existing connection.
    pub fn on_connection(backend: &'a B, conn: &'a mut B::Conn) -> Self {
        Self {
            backend,
            slot: Slot::Borrowed(conn),
            state: ContextState::Connected,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContextState {
        self.state
    }

    async fn connect_if_needed(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.state == ContextState::Closed {
            return Outcome::Err(Error::operational("statement context is closed"));
        }
        if !self.slot.is_connected() {
            match self.backend.connect(cx).await {
                Outcome::Ok(conn) => {
                    self.slot = Slot::Owned(Some(conn));
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        self.state = ContextState::Connected;
        Outcome::Ok(())
    }

    /// Execute a statement; commit on success, roll back on failure.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn execute(&mut self, cx: &Cx, stmt: &Statement) -> Outcome<ExecResult, Error> {
        match self.connect_if_needed(cx).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        let Some(conn) = self.slot.get() else {
            return Outcome::Err(Error::operational("connection unavailable"));
        };
        match conn.execute(cx, &stmt.query, &stmt.params).await {
            Outcome::Ok(result) => match conn.commit(cx).await {
                Outcome::Ok(()) => Outcome::Ok(result),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            },
            Outcome::Err(e) => {
                if let Outcome::Err(rb) = conn.rollback(cx).await {
                    tracing::warn!(error = %rb, "rollback after failed statement also failed");
                }
                Outcome::Err(e)
            }
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Run a query and materialize its rows; the implicit transaction is
    /// committed afterwards.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn query(&mut self, cx: &Cx, stmt: &Statement) -> Outcome<Vec<Row>, Error> {
        match self.connect_if_needed(cx).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        let Some(conn) = self.slot.get() else {
            return Outcome::Err(Error::operational("connection unavailable"));
        };
        match conn.query(cx, &stmt.query, &stmt.params).await {
            Outcome::Ok(rows) => match conn.commit(cx).await {
                Outcome::Ok(()) => Outcome::Ok(rows),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            },
            Outcome::Err(e) => {
                if let Outcome::Err(rb) = conn.rollback(cx).await {
                    tracing::warn!(error = %rb, "rollback after failed query also failed");
                }
                Outcome::Err(e)
            }
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Run a query expected to produce at most one row.
    pub async fn query_one(&mut self, cx: &Cx, stmt: &Statement) -> Outcome<Option<Row>, Error> {
        match self.query(cx, stmt).await {
            Outcome::Ok(mut rows) => {
                if rows.is_empty() {
                    Outcome::Ok(None)
                } else {
                    Outcome::Ok(Some(rows.remove(0)))
                }
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Close the context. An owned physical connection is closed; a
    /// borrowed one is left to its [`ConnectionContext`].
    pub async fn close(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.state == ContextState::Closed {
            return Outcome::Ok(());
        }
        self.state = ContextState::Closed;
        if let Slot::Owned(slot) = &mut self.slot {
            if let Some(mut conn) = slot.take() {
                match conn.close(cx).await {
                    Outcome::Ok(()) => {}
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        }
        Outcome::Ok(())
    }
}

/// An explicit transaction context.
///
/// Statements executed through the transaction are committed together by
/// [`Transaction::commit`]. A failed statement rolls the transaction back
/// and finishes it; a failed commit rolls back and reports
/// [`Error::CommitFailed`].
pub struct Transaction<'a, B: Backend> {
    slot: Slot<'a, B::Conn>,
    finished: bool,
}

impl<'a, B: Backend> Transaction<'a, B> {
    /// Open a connection (if needed) and begin a transaction.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn begin(backend: &'a B, cx: &Cx) -> Outcome<Transaction<'a, B>, Error> {
        let mut conn = match backend.connect(cx).await {
            Outcome::Ok(conn) => conn,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match conn.begin(cx).await {
            Outcome::Ok(()) => Outcome::Ok(Self {
                slot: Slot::Owned(Some(conn)),
                finished: false,
            }),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Begin a transaction on an existing connection.
    pub async fn begin_on(conn: &'a mut B::Conn, cx: &Cx) -> Outcome<Transaction<'a, B>, Error> {
        match conn.begin(cx).await {
            Outcome::Ok(()) => Outcome::Ok(Self {
                slot: Slot::Borrowed(conn),
                finished: false,
            }),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Execute a statement inside the transaction. A failure rolls the
    /// whole transaction back before the error is returned.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn execute(&mut self, cx: &Cx, stmt: &Statement) -> Outcome<ExecResult, Error> {
        if self.finished {
            return Outcome::Err(Error::operational("transaction is finished"));
        }
        let result = match self.slot.get() {
            Some(conn) => conn.execute(cx, &stmt.query, &stmt.params).await,
            None => return Outcome::Err(Error::operational("connection unavailable")),
        };
        match result {
            Outcome::Ok(result) => Outcome::Ok(result),
            Outcome::Err(e) => {
                self.finished = true;
                if let Some(conn) = self.slot.get() {
                    if let Outcome::Err(rb) = conn.rollback(cx).await {
                        tracing::warn!(error = %rb, "rollback after failed statement also failed");
                    }
                }
                Outcome::Err(e)
            }
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Run a query inside the transaction.
    pub async fn query(&mut self, cx: &Cx, stmt: &Statement) -> Outcome<Vec<Row>, Error> {
        if self.finished {
            return Outcome::Err(Error::operational("transaction is finished"));
        }
        match self.slot.get() {
            Some(conn) => conn.query(cx, &stmt.query, &stmt.params).await,
            None => Outcome::Err(Error::operational("connection unavailable")),
        }
    }

    /// Run a query expected to produce at most one row.
    pub async fn query_one(&mut self, cx: &Cx, stmt: &Statement) -> Outcome<Option<Row>, Error> {
        match self.query(cx, stmt).await {
            Outcome::Ok(mut rows) => {
                if rows.is_empty() {
                    Outcome::Ok(None)
                } else {
                    Outcome::Ok(Some(rows.remove(0)))
                }
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Commit the transaction.
    ///
    /// If the commit itself fails, the transaction is rolled back and the
    /// dedicated [`Error::CommitFailed`] kind is reported.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn commit(mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.finished {
            return Outcome::Err(Error::operational("transaction is finished"));
        }
        self.finished = true;
        let result = match self.slot.get() {
            Some(conn) => conn.commit(cx).await,
            None => return Outcome::Err(Error::operational("connection unavailable")),
        };
        match result {
            Outcome::Ok(()) => self.release(cx).await,
            Outcome::Err(e) => {
                if let Some(conn) = self.slot.get() {
                    if let Outcome::Err(rb) = conn.rollback(cx).await {
                        tracing::warn!(error = %rb, "rollback after failed commit also failed");
                    }
                }
                match self.release(cx).await {
                    Outcome::Ok(()) | Outcome::Err(_) => {}
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
                Outcome::Err(Error::CommitFailed(e.message().to_string()))
            }
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Roll the transaction back.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn rollback(mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.finished {
            return Outcome::Err(Error::operational("transaction is finished"));
        }
        self.finished = true;
        let result = match self.slot.get() {
            Some(conn) => conn.rollback(cx).await,
            None => return Outcome::Err(Error::operational("connection unavailable")),
        };
        match result {
            Outcome::Ok(()) => self.release(cx).await,
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    async fn release(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if let Slot::Owned(slot) = &mut self.slot {
            if let Some(mut conn) = slot.take() {
                return conn.close(cx).await;
            }
        }
        Outcome::Ok(())
    }
}

/// A context that only manages the physical connection's lifetime.
pub struct ConnectionContext<'a, B: Backend> {
    backend: &'a B,
    conn: Option<B::Conn>,
}

impl<'a, B: Backend> ConnectionContext<'a, B> {
    /// Open a physical connection.
    pub async fn open(backend: &'a B, cx: &Cx) -> Outcome<ConnectionContext<'a, B>, Error> {
        match backend.connect(cx).await {
            Outcome::Ok(conn) => Outcome::Ok(Self {
                backend,
                conn: Some(conn),
            }),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// A statement context bound to this connection.
    pub fn statement(&mut self) -> Outcome<SqlContext<'_, B>, Error> {
        let backend = self.backend;
        match self.conn.as_mut() {
            Some(conn) => Outcome::Ok(SqlContext::on_connection(backend, conn)),
            None => Outcome::Err(Error::operational("connection context is closed")),
        }
    }

    /// Begin a transaction bound to this connection.
    pub async fn transaction(&mut self, cx: &Cx) -> Outcome<Transaction<'_, B>, Error> {
        match self.conn.as_mut() {
            Some(conn) => Transaction::<B>::begin_on(conn, cx).await,
            None => Outcome::Err(Error::operational("connection context is closed")),
        }
    }

    /// Close the physical connection.
    pub async fn close(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if let Some(mut conn) = self.conn.take() {
            return conn.close(cx).await;
        }
        Outcome::Ok(())
    }
}
