pub mod lmdb_storage;
pub mod manager;
pub mod memory;
pub mod requests;
pub mod store;

pub use lmdb_storage::{LmdbStorage, LmdbStore};
pub use manager::{InventoryManager, Reconciliation};
pub use memory::MemoryStore;
pub use requests::{PsidRequest, PsidRequests, RequestStore, SerialCondition};
pub use store::RecordStore;
