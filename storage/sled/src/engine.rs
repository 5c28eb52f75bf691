use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use pdugraph_core::{
    error::StorageError,
    storage::{ContextStorage, StorageEngine},
};
use pdugraph_proto::{CheckpointId, ContextId, Delivery, Destination, Origin, PduKey};
use sled::{
    transaction::{ConflictableTransactionError, TransactionError},
    Config, Transactional,
};
use tokio::task;
use tracing::debug;

use crate::{
    context::SledContextStorage,
    database::Database,
    error::{sled_error, SledError},
    keys::{checkpoint_prefix, decode_seq, delivery_index_key, seq_key},
};

#[derive(Clone)]
pub struct SledStorageEngine {
    pub database: Arc<Database>,
}

impl SledStorageEngine {
    pub fn with_homedir_folder(folder_name: &str) -> anyhow::Result<Self> {
        let dir = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to get home directory"))?.join(folder_name);

        Self::with_path(dir)
    }

    pub fn with_path(path: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&path)?;
        let dbpath = path.join("sled");
        let db = sled::open(&dbpath)?;
        Ok(Self { database: Arc::new(Database::open(db)?) })
    }

    // Open the storage engine in the default location
    pub fn new() -> anyhow::Result<Self> { Self::with_homedir_folder(".pdugraph") }

    pub fn new_test() -> anyhow::Result<Self> {
        let db = Config::new().temporary(true).flush_every_ms(None).open()?;
        Ok(Self { database: Arc::new(Database::open(db)?) })
    }

    fn record_delivery_blocking(&self, delivery: &Delivery) -> Result<bool, SledError> {
        let value = bincode::serialize(delivery)?;
        let index_key = delivery_index_key(&delivery.origin, &delivery.checkpoint, &delivery.destination);
        let db = &self.database;

        let result = (&db.deliveries_tree, &db.delivery_index_tree).transaction(|(deliveries, index)| {
            if index.get(&index_key)?.is_some() {
                return Ok(false);
            }
            let seq = deliveries.generate_id()?;
            deliveries.insert(&seq_key(seq), value.as_slice())?;
            index.insert(index_key.as_slice(), &seq_key(seq)[..])?;
            Ok::<_, ConflictableTransactionError<SledError>>(true)
        });

        match result {
            Ok(recorded) => {
                debug!("Recorded delivery {}: {}", delivery, recorded);
                Ok(recorded)
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn deliveries_after_blocking(&self, origin: &Origin, checkpoint: &CheckpointId, destination: &Destination) -> Result<Vec<PduKey>, SledError> {
        let db = &self.database;

        // the same checkpoint may have gone to several destinations; the earliest one marks the position
        let mut start: Option<u64> = None;
        for entry in db.delivery_index_tree.scan_prefix(checkpoint_prefix(origin, checkpoint)) {
            let (_key, value) = entry?;
            let seq = decode_seq(&value, "delivery_index")?;
            start = Some(start.map_or(seq, |s| s.min(seq)));
        }
        let Some(start) = start else {
            return Ok(Vec::new());
        };

        let mut keys = Vec::new();
        for entry in db.deliveries_tree.range(seq_key(start + 1)..) {
            let (_key, value) = entry?;
            let delivery: Delivery = bincode::deserialize(&value)?;
            if delivery.origin == *origin && delivery.destination == *destination {
                keys.extend(delivery.pdus);
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl StorageEngine for SledStorageEngine {
    async fn context(&self, id: &ContextId) -> Result<Arc<dyn ContextStorage>, StorageError> {
        Ok(Arc::new(SledContextStorage::new(id.to_owned(), self.database.clone())))
    }

    async fn record_delivery(&self, delivery: &Delivery) -> Result<bool, StorageError> {
        let me = self.clone();
        let delivery = delivery.clone();
        Ok(task::spawn_blocking(move || me.record_delivery_blocking(&delivery)).await.map_err(SledError::from)??)
    }

    async fn deliveries_after(
        &self,
        origin: &Origin,
        checkpoint: &CheckpointId,
        destination: &Destination,
    ) -> Result<Vec<PduKey>, StorageError> {
        let me = self.clone();
        let (origin, checkpoint, destination) = (origin.clone(), checkpoint.clone(), destination.clone());
        Ok(task::spawn_blocking(move || me.deliveries_after_blocking(&origin, &checkpoint, &destination)).await.map_err(SledError::from)??)
    }

    async fn delete_all(&self) -> Result<bool, StorageError> {
        let mut any_deleted = false;
        for tree in self.database.trees() {
            any_deleted |= !tree.is_empty();
            tree.clear().map_err(sled_error)?;
        }
        Ok(any_deleted)
    }
}
