//! SQLite storage engine implementation

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use pdugraph_core::{
    error::StorageError,
    storage::{ContextStorage, StorageEngine},
};
use pdugraph_proto::{CheckpointId, ContextId, Delivery, Destination, Origin, PduKey, PduRef};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::connection::SqliteConnectionManager;
use crate::context::SqliteContextStorage;
use crate::error::SqliteError;
use crate::schema::{create_tables, TABLES};

/// Default connection pool size
pub const DEFAULT_POOL_SIZE: u32 = 10;

pub type SqlitePool = bb8::Pool<SqliteConnectionManager>;

/// SQLite storage engine
pub struct SqliteStorageEngine {
    pool: SqlitePool,
}

impl SqliteStorageEngine {
    /// Wrap an existing pool, creating the tables if they don't exist
    pub async fn with_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        let engine = Self { pool };
        engine.connection().await?.with_connection(create_tables).await?;
        Ok(engine)
    }

    /// Open a file-based SQLite database
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = bb8::Pool::builder().max_size(DEFAULT_POOL_SIZE).build(manager).await?;
        Self::with_pool(pool).await
    }

    /// Open an in-memory SQLite database (for testing)
    pub async fn open_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        // For in-memory, we use a single connection to keep the database alive
        let pool = bb8::Pool::builder().max_size(1).build(manager).await?;
        Self::with_pool(pool).await
    }

    /// Get a reference to the connection pool (for testing/diagnostics)
    pub fn pool(&self) -> &SqlitePool { &self.pool }

    async fn connection(&self) -> Result<bb8::PooledConnection<'_, SqliteConnectionManager>, SqliteError> {
        self.pool.get().await.map_err(|e| SqliteError::Pool(e.to_string()))
    }
}

#[async_trait]
impl StorageEngine for SqliteStorageEngine {
    async fn context(&self, id: &ContextId) -> Result<Arc<dyn ContextStorage>, StorageError> {
        Ok(Arc::new(SqliteContextStorage::new(self.pool.clone(), id.clone())))
    }

    async fn record_delivery(&self, delivery: &Delivery) -> Result<bool, StorageError> {
        let conn = self.connection().await?;
        let delivery = delivery.clone();
        Ok(conn.with_transaction(move |tx| insert_delivery(tx, &delivery)).await?)
    }

    async fn deliveries_after(
        &self,
        origin: &Origin,
        checkpoint: &CheckpointId,
        destination: &Destination,
    ) -> Result<Vec<PduKey>, StorageError> {
        let conn = self.connection().await?;
        let (origin, checkpoint, destination) = (origin.clone(), checkpoint.clone(), destination.clone());
        Ok(conn.with_connection(move |c| select_deliveries_after(c, &origin, &checkpoint, &destination)).await?)
    }

    async fn delete_all(&self) -> Result<bool, StorageError> {
        let conn = self.connection().await?;
        Ok(conn
            .with_transaction(|tx| {
                let mut any = false;
                for table in TABLES {
                    any |= tx.execute(&format!(r#"DELETE FROM "{}""#, table), [])? > 0;
                }
                Ok(any)
            })
            .await?)
    }
}

fn insert_delivery(tx: &rusqlite::Transaction<'_>, delivery: &Delivery) -> Result<bool, SqliteError> {
    let inserted = tx.execute(
        r#"INSERT OR IGNORE INTO "deliveries"("origin", "checkpoint", "destination") VALUES (?1, ?2, ?3)"#,
        params![delivery.origin.as_str(), delivery.checkpoint.as_str(), delivery.destination.as_str()],
    )?;
    if inserted == 0 {
        return Ok(false);
    }

    let seq = tx.last_insert_rowid();
    let mut stmt = tx.prepare(
        r#"INSERT INTO "delivery_pdus"("delivery_seq", "position", "context", "id", "origin") VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )?;
    for (position, key) in delivery.pdus.iter().enumerate() {
        stmt.execute(params![seq, position as i64, key.context.as_str(), key.pdu.id.as_str(), key.pdu.origin.as_str()])?;
    }
    debug!("Recorded delivery {} as seq {}", delivery, seq);
    Ok(true)
}

fn select_deliveries_after(
    conn: &rusqlite::Connection,
    origin: &Origin,
    checkpoint: &CheckpointId,
    destination: &Destination,
) -> Result<Vec<PduKey>, SqliteError> {
    let start: Option<i64> = conn
        .query_row(
            r#"SELECT MIN("seq") FROM "deliveries" WHERE "origin" = ?1 AND "checkpoint" = ?2"#,
            params![origin.as_str(), checkpoint.as_str()],
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    let Some(start) = start else {
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare(
        r#"SELECT p."context", p."id", p."origin"
           FROM "delivery_pdus" p JOIN "deliveries" d ON d."seq" = p."delivery_seq"
           WHERE d."destination" = ?1 AND d."seq" > ?2 AND d."origin" = ?3
           ORDER BY d."seq", p."position""#,
    )?;
    let keys = stmt
        .query_map(params![destination.as_str(), start, origin.as_str()], |row| {
            let context: String = row.get(0)?;
            let id: String = row.get(1)?;
            let origin: String = row.get(2)?;
            Ok(PduKey::new(context, PduRef::new(id, origin)))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}
