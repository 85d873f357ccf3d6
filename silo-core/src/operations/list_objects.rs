use crate::registry::Registry;
use std::sync::Arc;

#[derive(Clone)]
pub struct ListObjectsOperation {
    registry: Arc<Registry>,
}

#[derive(Debug, Clone)]
pub struct ListObjectItem {
    pub object_id: u64,
    pub source_name: String,
}

#[derive(Debug, Clone)]
pub struct ListObjectsOperationResult {
    pub items: Vec<ListObjectItem>,
}

impl ListObjectsOperation {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Every ready object, as an unsynchronized snapshot over the
    /// registry: objects mid-put or mid-delete may or may not appear.
    pub fn run(&self) -> ListObjectsOperationResult {
        let items = self
            .registry
            .snapshot_ready()
            .into_iter()
            .map(|(object_id, source_name)| ListObjectItem {
                object_id,
                source_name,
            })
            .collect();
        ListObjectsOperationResult { items }
    }
}
