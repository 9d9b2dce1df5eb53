// LMDB-backed record and request storage
use crate::requests::{PsidRequest, RequestStore};
use crate::store::RecordStore;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use labelscan_core::{Error, Filter, HardwareRecord, RecordId, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const DB_RECORDS: &str = "records";
const DB_REQUESTS: &str = "psid_requests";

/// Raw key/value access to the two LMDB databases
pub struct LmdbStorage {
    env: Arc<Env>,
    records_db: Database<Str, Bytes>,
    requests_db: Database<Str, Bytes>,
}

impl LmdbStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(10 * 1024 * 1024 * 1024) // 10GB
                .max_dbs(4)
                .open(path)?
        });

        let mut wtxn = env.write_txn()?;
        let records_db = env.create_database(&mut wtxn, Some(DB_RECORDS))?;
        let requests_db = env.create_database(&mut wtxn, Some(DB_REQUESTS))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            records_db,
            requests_db,
        })
    }

    fn put(&self, db: Database<Str, Bytes>, key: &str, data: &[u8]) -> anyhow::Result<()> {
        let mut wtxn = self.env.write_txn()?;
        db.put(&mut wtxn, key, data)?;
        wtxn.commit()?;
        Ok(())
    }

    fn get(&self, db: Database<Str, Bytes>, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn()?;
        Ok(db.get(&rtxn, key)?.map(|data| data.to_vec()))
    }

    fn contains(&self, db: Database<Str, Bytes>, key: &str) -> anyhow::Result<bool> {
        let rtxn = self.env.read_txn()?;
        Ok(db.get(&rtxn, key)?.is_some())
    }

    fn values(&self, db: Database<Str, Bytes>) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for result in db.iter(&rtxn)? {
            let (key, data) = result?;
            out.push((key.to_string(), data.to_vec()));
        }
        Ok(out)
    }
}

/// [`RecordStore`] and [`RequestStore`] persisted as JSON documents in LMDB
pub struct LmdbStore {
    storage: LmdbStorage,
}

impl LmdbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let storage = LmdbStorage::new(&path).map_err(storage_err)?;
        info!("Opened LMDB store at {:?}", path.as_ref());
        Ok(Self { storage })
    }

    fn load_all<T: DeserializeOwned>(&self, db: Database<Str, Bytes>) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for (key, data) in self.storage.values(db).map_err(storage_err)? {
            match serde_json::from_slice(&data) {
                Ok(value) => out.push(value),
                Err(e) => warn!("Skipping unreadable entry {}: {}", key, e),
            }
        }
        Ok(out)
    }

    fn load<T: DeserializeOwned>(&self, db: Database<Str, Bytes>, key: &str) -> Result<Option<T>> {
        match self.storage.get(db, key).map_err(storage_err)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, db: Database<Str, Bytes>, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        self.storage.put(db, key, &data).map_err(storage_err)
    }
}

impl RecordStore for LmdbStore {
    fn find_by_id(&self, id: RecordId) -> Result<Option<HardwareRecord>> {
        self.load(self.storage.records_db, &id.to_string())
    }

    fn query(&self, filter: &dyn Filter) -> Result<Vec<HardwareRecord>> {
        let records: Vec<HardwareRecord> = self.load_all(self.storage.records_db)?;
        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    fn insert(&self, record: &HardwareRecord) -> Result<()> {
        let key = record.id.to_string();
        if self
            .storage
            .contains(self.storage.records_db, &key)
            .map_err(storage_err)?
        {
            return Err(Error::Storage(format!("duplicate record id {}", key)));
        }
        self.save(self.storage.records_db, &key, record)
    }

    fn update(&self, record: &HardwareRecord) -> Result<()> {
        let key = record.id.to_string();
        if !self
            .storage
            .contains(self.storage.records_db, &key)
            .map_err(storage_err)?
        {
            return Err(Error::NotFound(format!("record {}", key)));
        }
        self.save(self.storage.records_db, &key, record)
    }
}

impl RequestStore for LmdbStore {
    fn get_request(&self, id: Uuid) -> Result<Option<PsidRequest>> {
        self.load(self.storage.requests_db, &id.to_string())
    }

    fn put_request(&self, request: &PsidRequest) -> Result<()> {
        self.save(self.storage.requests_db, &request.id.to_string(), request)
    }

    fn list_requests(&self) -> Result<Vec<PsidRequest>> {
        self.load_all(self.storage.requests_db)
    }
}

fn storage_err(e: anyhow::Error) -> Error {
    Error::Storage(e.to_string())
}
