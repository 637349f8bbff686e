use crate::analytics;
use crate::error::{Result, ToolError};
use crate::invocation::ToolInvocation;
use crate::schema;
use chrono::Utc;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Handle to the SQLite sales database.
///
/// Cheap to clone. Every call opens its own connection on the blocking pool,
/// so nothing is shared between concurrent requests. Analytics always go
/// through a read-only connection.
#[derive(Debug, Clone)]
pub struct SalesDb {
    path: PathBuf,
}

impl SalesDb {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn open_readonly(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| {
            ToolError::ExecutionFailed(format!(
                "open sales database {}: {e}",
                self.path.display()
            ))
        })?;
        conn.busy_timeout(Duration::from_secs(1))?;
        Ok(conn)
    }

    pub fn open_readwrite(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(|e| {
            ToolError::ExecutionFailed(format!(
                "open sales database {}: {e}",
                self.path.display()
            ))
        })?;
        conn.busy_timeout(Duration::from_secs(1))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(conn)
    }

    /// Run `f` against a fresh read-only connection off the async runtime.
    pub async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.open_readonly()?;
            f(&conn)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("database task failed: {e}")))?
    }

    /// Run `f` against a fresh writable connection off the async runtime.
    pub async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.open_readwrite()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("database task failed: {e}")))?
    }

    pub async fn execute(&self, invocation: ToolInvocation) -> Result<Value> {
        let tool_name = invocation.name();
        let started = std::time::Instant::now();
        let out = self
            .read(move |conn| analytics::execute(conn, &invocation, Utc::now().naive_utc()))
            .await;
        match &out {
            Ok(_) => tracing::debug!(
                tool_name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "analytics operation finished"
            ),
            Err(e) => tracing::warn!(tool_name, error = %e, "analytics operation failed"),
        }
        out
    }

    pub async fn summary(&self) -> Result<Value> {
        self.read(analytics::data_summary).await
    }

    /// Create the database file and any missing tables.
    pub async fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ToolError::ExecutionFailed(format!("create {}: {e}", parent.display()))
            })?;
        }
        self.write(|conn| Ok(schema::apply(conn)?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::FIXTURE;
    use crate::catalog::OperationKind;
    use serde_json::json;

    async fn seeded(dir: &tempfile::TempDir) -> SalesDb {
        let db = SalesDb::new(dir.path().join("data").join("sales.db"));
        db.initialize().await.expect("initialize");
        db.write(|conn| Ok(conn.execute_batch(FIXTURE)?))
            .await
            .expect("seed");
        db
    }

    #[tokio::test]
    async fn initialize_creates_parent_dirs_and_is_repeatable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = seeded(&dir).await;
        assert!(db.exists());
        db.initialize().await.expect("second initialize");
        let summary = db.summary().await.expect("summary");
        assert_eq!(summary["summary"]["total_orders"], 5);
    }

    #[tokio::test]
    async fn read_connections_refuse_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = seeded(&dir).await;
        let err = db
            .read(|conn| Ok(conn.execute("DELETE FROM orders", [])?))
            .await
            .expect_err("read-only connection must refuse writes");
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
        let count = db
            .read(|conn| Ok(analytics::row_count(conn, crate::table::Table::Orders)?))
            .await
            .expect("count");
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn execute_runs_validated_invocation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = seeded(&dir).await;
        let inv = ToolInvocation::from_call("get_top_products", r#"{"limit": 1}"#)
            .expect("valid invocation");
        assert_eq!(inv.kind, OperationKind::TopProducts);
        let out = db.execute(inv).await.expect("execute");
        assert_eq!(
            out,
            json!([{"product": "Desk Lamp", "order_count": 3, "total_amount": 120.0}])
        );
    }

    #[tokio::test]
    async fn missing_database_is_an_execution_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = SalesDb::new(dir.path().join("absent.db"));
        assert!(!db.exists());
        let err = db.summary().await.expect_err("no database file");
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }
}
