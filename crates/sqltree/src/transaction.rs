//! Transaction helpers: control statements, macros and savepoints.
//!
//! A [`Connection`] runs every statement on the one session of its driver,
//! so a transaction is simply `START TRANSACTION` ... `COMMIT` on that
//! connection. For ergonomic commit/rollback handling use [`transaction!`].
//!
//! # Example
//!
//! ```ignore
//! use sqltree::{DbResult, Criteria};
//!
//! # async fn demo(conn: &sqltree::Connection<MyDriver>) -> DbResult<()> {
//! sqltree::transaction!(conn, tx, {
//!     let stmt = tx.prepare_update("accounts", 1, [("balance", 90)]).await?;
//!     tx.query(stmt, ()).await?;
//!     let stmt = tx.prepare_update("accounts", 2, [("balance", 110)]).await?;
//!     tx.query(stmt, ()).await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::DbResult;
use crate::monitor::QueryContext;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for anonymous savepoint naming.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

const TAG: &str = "transaction";

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction on `$conn` and binds it to `$tx`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `sqltree::DbResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($conn:expr, $tx:ident, $body:block) => {{
        let $tx = $conn;
        $tx.begin_transaction().await?;

        let __sqltree_tx_result: $crate::DbResult<_> = async { $body }.await;
        match __sqltree_tx_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DbError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Runs the given block inside a savepoint of the current transaction.
///
/// - Sets a savepoint on `$conn`.
/// - Releases it on `Ok(_)`.
/// - Rolls back to it on `Err(_)`, leaving the outer transaction usable.
///
/// # Example
///
/// ```ignore
/// sqltree::transaction!(conn, tx, {
///     let order = tx.query(insert_order, ()).await?;
///
///     let notified = sqltree::savepoint!(tx, "notify", {
///         tx.query(insert_notification, ()).await?;
///         Ok(())
///     });
///     if let Err(e) = notified {
///         tracing::warn!("notification failed: {e}");
///     }
///     Ok(order)
/// })?;
/// ```
#[macro_export]
macro_rules! savepoint {
    // Named savepoint
    ($conn:expr, $name:expr, $body:block) => {{
        let __sqltree_sp_conn = $conn;
        let __sqltree_sp_name: &str = $name;
        __sqltree_sp_conn.savepoint(__sqltree_sp_name).await?;

        let __sqltree_sp_result: $crate::DbResult<_> = async { $body }.await;
        match __sqltree_sp_result {
            Ok(value) => {
                __sqltree_sp_conn
                    .release_savepoint(__sqltree_sp_name)
                    .await?;
                Ok(value)
            }
            Err(error) => match __sqltree_sp_conn
                .rollback_to_savepoint(__sqltree_sp_name)
                .await
            {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DbError::Other(format!(
                    "{error} (savepoint rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
    // Anonymous savepoint
    ($conn:expr, $body:block) => {{
        let __sqltree_sp_name = $crate::transaction::__next_savepoint_name();
        $crate::savepoint!($conn, &__sqltree_sp_name, $body)
    }};
}

/// Generate a unique anonymous savepoint name.
///
/// Used by the `savepoint!` macro. Not intended for direct use.
#[doc(hidden)]
pub fn __next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("sqltree_sp_{n}")
}

impl<D: Driver> Connection<D> {
    async fn control(&self, sql: &str) -> DbResult<()> {
        self.run(QueryContext::new(sql).with_tag(TAG))
            .await
            .map(|_| ())
    }

    pub async fn begin_transaction(&self) -> DbResult<()> {
        self.control("START TRANSACTION").await
    }

    pub async fn commit(&self) -> DbResult<()> {
        self.control("COMMIT").await
    }

    pub async fn rollback(&self) -> DbResult<()> {
        self.control("ROLLBACK").await
    }

    pub async fn savepoint(&self, name: &str) -> DbResult<()> {
        let name = self.quote_identifier(name)?;
        self.control(&format!("SAVEPOINT {name}")).await
    }

    pub async fn release_savepoint(&self, name: &str) -> DbResult<()> {
        let name = self.quote_identifier(name)?;
        self.control(&format!("RELEASE SAVEPOINT {name}")).await
    }

    pub async fn rollback_to_savepoint(&self, name: &str) -> DbResult<()> {
        let name = self.quote_identifier(name)?;
        self.control(&format!("ROLLBACK TO SAVEPOINT {name}")).await
    }
}
