use std::collections::BTreeSet;

use async_trait::async_trait;
use pdugraph_core::{
    error::StorageError,
    storage::{check_existing, ContextStorage, PduFilter, Registration, RegistrationOutcome},
};
use pdugraph_proto::{ContextId, Edge, Pdu, PduRef};
use rusqlite::{params, Connection, OptionalExtension};

use crate::engine::SqlitePool;
use crate::error::SqliteError;

/// The events, edges and extremities of one context. All contexts share the same tables.
pub struct SqliteContextStorage {
    pool: SqlitePool,
    context_id: ContextId,
}

impl SqliteContextStorage {
    pub fn new(pool: SqlitePool, context_id: ContextId) -> Self { Self { pool, context_id } }

    async fn read<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection, &ContextId) -> Result<T, SqliteError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await.map_err(|e| SqliteError::Pool(e.to_string()))?;
        let context = self.context_id.clone();
        Ok(conn.with_connection(move |c| f(c, &context)).await?)
    }

    async fn write<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection, &ContextId) -> Result<T, SqliteError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await.map_err(|e| SqliteError::Pool(e.to_string()))?;
        let context = self.context_id.clone();
        Ok(conn.with_transaction(move |tx| f(tx, &context)).await?)
    }
}

#[async_trait]
impl ContextStorage for SqliteContextStorage {
    fn context_id(&self) -> &ContextId { &self.context_id }

    async fn put_event(&self, pdu: &Pdu) -> Result<bool, StorageError> {
        let pdu = pdu.clone();
        self.write(move |c, context| insert_event(c, context, &pdu)).await
    }

    async fn get_event(&self, pdu_ref: &PduRef) -> Result<Option<Pdu>, StorageError> {
        let pdu_ref = pdu_ref.clone();
        self.read(move |c, context| select_event(c, context, &pdu_ref)).await
    }

    async fn list_events(&self, filter: PduFilter) -> Result<Vec<Pdu>, StorageError> {
        self.read(move |c, context| {
            let query = match filter {
                PduFilter::All => r#"SELECT "pdu" FROM "events" WHERE "context" = ?1 ORDER BY "seq""#,
                PduFilter::State => r#"SELECT "pdu" FROM "events" WHERE "context" = ?1 AND "is_state" = 1 ORDER BY "seq""#,
            };
            let mut stmt = c.prepare(query)?;
            let blobs = stmt.query_map(params![context.as_str()], |row| row.get::<_, Vec<u8>>(0))?.collect::<Result<Vec<_>, _>>()?;
            blobs.iter().map(|blob| bincode::deserialize::<Pdu>(blob).map_err(SqliteError::from)).collect()
        })
        .await
    }

    async fn add_edge(&self, edge: &Edge) -> Result<bool, StorageError> {
        let edge = edge.clone();
        self.write(move |c, context| insert_edge(c, context, &edge)).await
    }

    async fn has_successor(&self, pdu_ref: &PduRef) -> Result<bool, StorageError> {
        let pdu_ref = pdu_ref.clone();
        self.read(move |c, context| has_successor(c, context, &pdu_ref)).await
    }

    async fn successors(&self, pdu_ref: &PduRef) -> Result<Vec<PduRef>, StorageError> {
        let pdu_ref = pdu_ref.clone();
        self.read(move |c, context| {
            let mut stmt = c.prepare(
                r#"SELECT "child_id", "child_origin" FROM "edges"
                   WHERE "context" = ?1 AND "parent_id" = ?2 AND "parent_origin" = ?3
                   ORDER BY "child_id", "child_origin""#,
            )?;
            let children = stmt
                .query_map(params![context.as_str(), pdu_ref.id.as_str(), pdu_ref.origin.as_str()], |row| {
                    Ok(PduRef::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(children)
        })
        .await
    }

    async fn extremities(&self) -> Result<BTreeSet<PduRef>, StorageError> { self.read(|c, context| select_extremities(c, context)).await }

    async fn retire_extremities(&self, refs: &[PduRef]) -> Result<usize, StorageError> {
        let refs = refs.to_vec();
        self.write(move |c, context| delete_extremities(c, context, &refs)).await
    }

    async fn register(&self, registration: Registration) -> Result<RegistrationOutcome, StorageError> {
        self.write(move |c, context| {
            let Registration { pdu, retire } = registration;
            let inserted = insert_event(c, context, &pdu)?;
            for edge in pdu.edges() {
                insert_edge(c, context, &edge)?;
            }

            let pdu_ref = pdu.pdu_ref();
            let added_extremity = !has_successor(c, context, &pdu_ref)? && insert_extremity(c, context, &pdu_ref)?;
            let retired = delete_extremities(c, context, &retire)?;

            Ok(RegistrationOutcome { inserted, added_extremity, retired })
        })
        .await
    }
}

fn select_event(c: &Connection, context: &ContextId, pdu_ref: &PduRef) -> Result<Option<Pdu>, SqliteError> {
    let blob: Option<Vec<u8>> = c
        .query_row(
            r#"SELECT "pdu" FROM "events" WHERE "context" = ?1 AND "id" = ?2 AND "origin" = ?3"#,
            params![context.as_str(), pdu_ref.id.as_str(), pdu_ref.origin.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match blob {
        Some(blob) => Some(bincode::deserialize(&blob)?),
        None => None,
    })
}

fn insert_event(c: &Connection, context: &ContextId, pdu: &Pdu) -> Result<bool, SqliteError> {
    let existing = select_event(c, context, &pdu.pdu_ref())?;
    if !check_existing(existing.as_ref(), pdu)? {
        return Ok(false);
    }
    let blob = bincode::serialize(pdu)?;
    c.execute(
        r#"INSERT INTO "events"("context", "id", "origin", "is_state", "pdu") VALUES (?1, ?2, ?3, ?4, ?5)"#,
        params![context.as_str(), pdu.id.as_str(), pdu.origin.as_str(), pdu.is_state, blob],
    )?;
    Ok(true)
}

fn insert_edge(c: &Connection, context: &ContextId, edge: &Edge) -> Result<bool, SqliteError> {
    let changed = c.execute(
        r#"INSERT OR IGNORE INTO "edges"("context", "child_id", "child_origin", "parent_id", "parent_origin")
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
        params![context.as_str(), edge.child.id.as_str(), edge.child.origin.as_str(), edge.parent.id.as_str(), edge.parent.origin.as_str()],
    )?;
    Ok(changed > 0)
}

fn has_successor(c: &Connection, context: &ContextId, pdu_ref: &PduRef) -> Result<bool, SqliteError> {
    Ok(c.query_row(
        r#"SELECT EXISTS(SELECT 1 FROM "edges" WHERE "context" = ?1 AND "parent_id" = ?2 AND "parent_origin" = ?3)"#,
        params![context.as_str(), pdu_ref.id.as_str(), pdu_ref.origin.as_str()],
        |row| row.get(0),
    )?)
}

fn select_extremities(c: &Connection, context: &ContextId) -> Result<BTreeSet<PduRef>, SqliteError> {
    let mut stmt = c.prepare(r#"SELECT "id", "origin" FROM "extremities" WHERE "context" = ?1"#)?;
    let refs = stmt
        .query_map(params![context.as_str()], |row| Ok(PduRef::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(refs)
}

fn insert_extremity(c: &Connection, context: &ContextId, pdu_ref: &PduRef) -> Result<bool, SqliteError> {
    let changed = c.execute(
        r#"INSERT OR IGNORE INTO "extremities"("context", "id", "origin") VALUES (?1, ?2, ?3)"#,
        params![context.as_str(), pdu_ref.id.as_str(), pdu_ref.origin.as_str()],
    )?;
    Ok(changed > 0)
}

fn delete_extremities(c: &Connection, context: &ContextId, refs: &[PduRef]) -> Result<usize, SqliteError> {
    let mut stmt = c.prepare(r#"DELETE FROM "extremities" WHERE "context" = ?1 AND "id" = ?2 AND "origin" = ?3"#)?;
    let mut retired = 0;
    for pdu_ref in refs {
        retired += stmt.execute(params![context.as_str(), pdu_ref.id.as_str(), pdu_ref.origin.as_str()])?;
    }
    Ok(retired)
}
