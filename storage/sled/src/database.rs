use sled::Db;

pub struct Database {
    pub db: Db,
    /// `context | seq` -> Pdu
    pub(crate) events_tree: sled::Tree,
    /// `context | id | origin` -> seq
    pub(crate) event_index_tree: sled::Tree,
    /// `context | child | parent` -> ()
    pub(crate) edges_tree: sled::Tree,
    /// `context | parent` -> BTreeSet of children
    pub(crate) successors_tree: sled::Tree,
    /// `context` -> BTreeSet of extremities
    pub(crate) extremities_tree: sled::Tree,
    /// `seq` -> Delivery
    pub(crate) deliveries_tree: sled::Tree,
    /// `origin | checkpoint | destination` -> seq
    pub(crate) delivery_index_tree: sled::Tree,
}

impl Database {
    pub fn open(db: Db) -> anyhow::Result<Self> {
        let events_tree = db.open_tree("events")?;
        let event_index_tree = db.open_tree("event_index")?;
        let edges_tree = db.open_tree("edges")?;
        let successors_tree = db.open_tree("successors")?;
        let extremities_tree = db.open_tree("extremities")?;
        let deliveries_tree = db.open_tree("deliveries")?;
        let delivery_index_tree = db.open_tree("delivery_index")?;

        Ok(Self {
            db,
            events_tree,
            event_index_tree,
            edges_tree,
            successors_tree,
            extremities_tree,
            deliveries_tree,
            delivery_index_tree,
        })
    }

    pub(crate) fn trees(&self) -> [&sled::Tree; 7] {
        [
            &self.events_tree,
            &self.event_index_tree,
            &self.edges_tree,
            &self.successors_tree,
            &self.extremities_tree,
            &self.deliveries_tree,
            &self.delivery_index_tree,
        ]
    }

    /// Convenience method for tests - delegates to underlying sled db
    pub fn tree_names(&self) -> Vec<sled::IVec> { self.db.tree_names() }
}
