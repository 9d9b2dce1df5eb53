//! # labelscan
//!
//! Backend for scanning hardware labels (drives, memory modules) and keeping
//! an inventory of what was scanned.
//!
//! An external OCR service reads label photos and returns loosely keyed
//! JSON. labelscan maps those keys onto a fixed vocabulary of canonical
//! fields using embedding similarity, normalizes the values, and reconciles
//! the result against stored records identified by serial number and PSID.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! labelscan --port 8080 --data-dir ./data --ocr-api-url http://ocr:8000
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use labelscan::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> labelscan::Result<()> {
//! let index = Arc::new(EmbeddingIndex::open("vectors.json", None)?);
//! let normalizer = Normalizer::new(FieldMatcher::new(index));
//!
//! let raw = serde_json::json!({"serial_number": "WX11A", "psid": "P-1", "brand": "wd"});
//! let fields = normalizer
//!     .normalize(raw.as_object().unwrap(), SenderContext::Other)
//!     .await;
//!
//! let inventory = InventoryManager::new(Arc::new(MemoryStore::new()));
//! let record = inventory.reconcile(&fields, Vec::new(), "")?.into_record();
//! assert_eq!(record.make, "WD");
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - `labelscan-core` - error type, field vocabulary, vectors, records
//! - `labelscan-matching` - embedding index, field matcher, OCR normalizer
//! - `labelscan-storage` - record stores (memory, LMDB), reconciliation, PSID request links
//! - `labelscan-api` - REST API, OCR client, image store, auth guards

// Re-export core types
pub use labelscan_core::{
    CanonicalField, CanonicalFieldMap, RawOcrFields,
    HardwareRecord, NaturalKey, NewRecord, RecordEdit, RecordFlag, RecordId, RecordQuery,
    Filter, Vector,
    Error, Result,
};

// Re-export matching
pub use labelscan_matching::{
    EmbeddingIndex, EmbeddingProvider, FieldMatcher, Normalizer, OpenAiEmbedder, SenderContext,
};

// Re-export storage
pub use labelscan_storage::{InventoryManager, LmdbStore, MemoryStore, PsidRequests, Reconciliation};

// Re-export API
pub use labelscan_api::{AppState, RestApi, ScanService};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CanonicalField, CanonicalFieldMap, RawOcrFields,
        HardwareRecord, NaturalKey, NewRecord, RecordEdit, RecordQuery,
        Vector,
        Error, Result,
        EmbeddingIndex, FieldMatcher, Normalizer, SenderContext,
        InventoryManager, MemoryStore, LmdbStore, PsidRequests,
        RestApi,
    };
}
