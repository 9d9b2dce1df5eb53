use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Generated identity of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        RecordId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(RecordId)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(u: Uuid) -> Self {
        RecordId(u)
    }
}

/// Deduplication key of a physical unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub psid: String,
}

impl NaturalKey {
    pub fn new(serial_number: impl Into<String>, psid: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            psid: psid.into(),
        }
    }

    /// At least one component can be used as a lookup predicate
    #[inline]
    pub fn is_usable(&self) -> bool {
        !self.serial_number.is_empty() || !self.psid.is_empty()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        !self.serial_number.is_empty() && !self.psid.is_empty()
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "serial_number={:?} psid={:?}", self.serial_number, self.psid)
    }
}

/// A persisted hardware inventory record
///
/// JSON field names follow the wire format the scanning clients already
/// speak (`hard_type`, `wipe_accepted`, `user_edited`, `incorrect_psid`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareRecord {
    pub id: RecordId,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub psid: String,
    #[serde(default)]
    pub inventory_id: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub hard_type: String,
    #[serde(default)]
    pub eui: String,
    #[serde(default)]
    pub extra_fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Wipe/erasure confirmed by an operator
    #[serde(default, rename = "wipe_accepted")]
    pub operator_confirmed: bool,
    /// An operator has overridden fields
    #[serde(default, rename = "user_edited")]
    pub operator_edited: bool,
    /// PSID found to be wrong; the record is excluded from lookups
    #[serde(default, rename = "incorrect_psid")]
    pub invalidated_psid: bool,
    pub created_at: DateTime<Utc>,
}

impl HardwareRecord {
    /// Empty record for a natural key
    #[must_use]
    pub fn new(key: NaturalKey) -> Self {
        Self {
            id: RecordId::generate(),
            serial_number: key.serial_number,
            psid: key.psid,
            inventory_id: String::new(),
            make: String::new(),
            model: String::new(),
            part_number: String::new(),
            capacity: String::new(),
            hard_type: String::new(),
            eui: String::new(),
            extra_fields: BTreeMap::new(),
            images: Vec::new(),
            operator_confirmed: false,
            operator_edited: false,
            invalidated_psid: false,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.serial_number.clone(), self.psid.clone())
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.invalidated_psid
    }

    /// Presentation rank: confirmed first, then edited, then the rest
    #[inline]
    pub fn precedence(&self) -> u8 {
        if self.operator_confirmed {
            0
        } else if self.operator_edited {
            1
        } else {
            2
        }
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Operator-supplied fields for a manually added record
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewRecord {
    #[serde(default)]
    pub inventory_id: String,
    #[serde(default)]
    pub hard_type: String,
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub eui: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub psid: String,
}

impl NewRecord {
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.serial_number.clone(), self.psid.clone())
    }

    pub fn into_record(self, images: Vec<String>) -> HardwareRecord {
        let mut record = HardwareRecord::new(self.key());
        record.inventory_id = self.inventory_id;
        record.hard_type = self.hard_type;
        record.capacity = self.capacity;
        record.eui = self.eui;
        record.make = self.make;
        record.model = self.model;
        record.part_number = self.part_number;
        record.images = images;
        record
    }
}

/// Partial update; `None` leaves the attribute untouched
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecordEdit {
    pub inventory_id: Option<String>,
    pub hard_type: Option<String>,
    pub capacity: Option<String>,
    pub eui: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub psid: Option<String>,
}

impl RecordEdit {
    /// Apply the present fields and mark the record as operator-edited
    pub fn apply_to(&self, record: &mut HardwareRecord) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                target.clone_from(v);
            }
        }

        set(&mut record.inventory_id, &self.inventory_id);
        set(&mut record.hard_type, &self.hard_type);
        set(&mut record.capacity, &self.capacity);
        set(&mut record.eui, &self.eui);
        set(&mut record.make, &self.make);
        set(&mut record.model, &self.model);
        set(&mut record.part_number, &self.part_number);
        set(&mut record.serial_number, &self.serial_number);
        set(&mut record.psid, &self.psid);
        record.operator_edited = true;
    }

    #[inline]
    pub fn touches_key(&self) -> bool {
        self.serial_number.is_some() || self.psid.is_some()
    }
}

/// Boolean status flags settable without a full rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFlag {
    OperatorConfirmed,
    InvalidatedPsid,
}

impl RecordFlag {
    pub fn set_on(self, record: &mut HardwareRecord) {
        match self {
            RecordFlag::OperatorConfirmed => record.operator_confirmed = true,
            RecordFlag::InvalidatedPsid => record.invalidated_psid = true,
        }
    }
}
