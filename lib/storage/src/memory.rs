// In-memory backend for tests and ephemeral runs
use crate::requests::{PsidRequest, RequestStore};
use crate::store::RecordStore;
use labelscan_core::{Error, Filter, HardwareRecord, RecordId, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordId, HardwareRecord>>,
    requests: RwLock<HashMap<Uuid, PsidRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn find_by_id(&self, id: RecordId) -> Result<Option<HardwareRecord>> {
        Ok(self.records.read().get(&id).cloned())
    }

    fn query(&self, filter: &dyn Filter) -> Result<Vec<HardwareRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn insert(&self, record: &HardwareRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Err(Error::Storage(format!("duplicate record id {}", record.id)));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn update(&self, record: &HardwareRecord) -> Result<()> {
        match self.records.write().get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("record {}", record.id))),
        }
    }
}

impl RequestStore for MemoryStore {
    fn get_request(&self, id: Uuid) -> Result<Option<PsidRequest>> {
        Ok(self.requests.read().get(&id).cloned())
    }

    fn put_request(&self, request: &PsidRequest) -> Result<()> {
        self.requests.write().insert(request.id, request.clone());
        Ok(())
    }

    fn list_requests(&self) -> Result<Vec<PsidRequest>> {
        Ok(self.requests.read().values().cloned().collect())
    }
}
