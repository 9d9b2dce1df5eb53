//! # labelscan Core
//!
//! Core types for the labelscan hardware label scanner.
//!
//! - [`CanonicalField`] - the closed vocabulary scans resolve to
//! - [`Vector`] - embedding vectors with cosine similarity
//! - [`CanonicalFieldMap`] - normalized output of one scan
//! - [`HardwareRecord`] - the persisted inventory entity
//! - [`Filter`] - predicates shared by every record store
//!
//! ## Example
//!
//! ```rust
//! use labelscan_core::{CanonicalField, CanonicalFieldMap, NaturalKey, Filter, HardwareRecord};
//!
//! let mut fields = CanonicalFieldMap::new();
//! fields.insert(CanonicalField::SerialNumber, "SN1");
//! fields.insert(CanonicalField::Psid, "PSID1");
//!
//! let key = NaturalKey::new(
//!     fields.get_or_empty(CanonicalField::SerialNumber),
//!     fields.get_or_empty(CanonicalField::Psid),
//! );
//! let record = HardwareRecord::new(key.clone());
//! assert!(key.matches(&record));
//! ```

pub mod error;
pub mod fields;
pub mod filter;
pub mod record;
pub mod vector;
pub mod vocabulary;

pub use error::{Error, Result};
pub use fields::{CanonicalFieldMap, RawOcrFields};
pub use filter::{sort_by_precedence, Filter, RecordQuery};
pub use record::{HardwareRecord, NaturalKey, NewRecord, RecordEdit, RecordFlag, RecordId};
pub use vector::Vector;
pub use vocabulary::CanonicalField;
