//! Record reconciliation.
//!
//! [`InventoryManager`] is the only writer of hardware records. Scans go
//! through [`InventoryManager::reconcile`], which is idempotent per natural
//! key; operator actions (add, edit, confirm, invalidate) each carry their
//! own precedence rule.

use crate::store::RecordStore;
use labelscan_core::{
    sort_by_precedence, CanonicalField, CanonicalFieldMap, Error, HardwareRecord, NaturalKey,
    NewRecord, RecordEdit, RecordFlag, RecordId, RecordQuery, Result,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Fields captured as first-class attributes and never copied to extras
const IDENTITY_KEYS: [&str; 4] = ["make", "serial_number", "inventory_id", "hard_id"];

/// Canonical fields copied into named record attributes
const RECORD_ATTRIBUTES: [CanonicalField; 9] = [
    CanonicalField::SerialNumber,
    CanonicalField::Psid,
    CanonicalField::InventoryId,
    CanonicalField::Make,
    CanonicalField::Model,
    CanonicalField::PartNumber,
    CanonicalField::Capacity,
    CanonicalField::HardType,
    CanonicalField::Eui,
];

/// Result of reconciling one scan
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Created(HardwareRecord),
    Existing(HardwareRecord),
}

impl Reconciliation {
    pub fn record(&self) -> &HardwareRecord {
        match self {
            Reconciliation::Created(r) | Reconciliation::Existing(r) => r,
        }
    }

    pub fn into_record(self) -> HardwareRecord {
        match self {
            Reconciliation::Created(r) | Reconciliation::Existing(r) => r,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Reconciliation::Created(_))
    }
}

#[derive(Clone)]
pub struct InventoryManager {
    store: Arc<dyn RecordStore>,
}

impl InventoryManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Upsert a scan result.
    ///
    /// An existing active record for the scanned (serial number, PSID) is
    /// returned unchanged; otherwise a new record is built from `fields`.
    /// `inventory_id` from the request wins over one read off the label.
    pub fn reconcile(
        &self,
        fields: &CanonicalFieldMap,
        images: Vec<String>,
        inventory_id: &str,
    ) -> Result<Reconciliation> {
        let key = NaturalKey::new(
            fields.get_or_empty(CanonicalField::SerialNumber),
            fields.get_or_empty(CanonicalField::Psid),
        );
        if !key.is_usable() {
            return Err(Error::InvalidKey(
                "scan produced neither serial_number nor psid".to_string(),
            ));
        }

        if let Some(existing) = self.store.find_active(&key)? {
            debug!("Scan matched existing record {} ({})", existing.id, key);
            return Ok(Reconciliation::Existing(existing));
        }

        let mut record = record_from_fields(key, fields);
        if !inventory_id.is_empty() {
            record.inventory_id = inventory_id.to_string();
        }
        record.images = images;

        self.store.insert(&record)?;
        info!("Created record {} from scan ({})", record.id, record.natural_key());
        Ok(Reconciliation::Created(record))
    }

    /// Operator-created record; the natural key must be complete and free
    pub fn add(&self, new: NewRecord, images: Vec<String>) -> Result<HardwareRecord> {
        let key = new.key();
        if !key.is_complete() {
            return Err(Error::InvalidKey(
                "serial_number and psid are both required".to_string(),
            ));
        }
        if let Some(existing) = self.store.find_active(&key)? {
            return Err(Error::Conflict(format!("{} (record {})", key, existing.id)));
        }

        let record = new.into_record(images);
        self.store.insert(&record)?;
        info!("Added record {} ({})", record.id, key);
        Ok(record)
    }

    /// Partial update; marks the record as operator-edited
    pub fn edit(&self, id: RecordId, edit: &RecordEdit) -> Result<HardwareRecord> {
        let mut record = self.find_by_id(id)?;
        edit.apply_to(&mut record);

        if edit.touches_key() {
            let key = record.natural_key();
            if !key.is_usable() {
                return Err(Error::InvalidKey("edit clears serial_number and psid".to_string()));
            }
            let taken = self
                .store
                .query(&key)?
                .into_iter()
                .any(|other| other.id != id && other.natural_key() == key);
            if taken {
                return Err(Error::Conflict(key.to_string()));
            }
        }

        self.store.update(&record)?;
        info!("Edited record {}", id);
        Ok(record)
    }

    /// Mark wipe/erasure as accepted, creating a placeholder if the unit
    /// has never been scanned.
    pub fn confirm(&self, key: &NaturalKey) -> Result<HardwareRecord> {
        if !key.is_usable() {
            return Err(Error::InvalidKey("serial_number or psid must be provided".to_string()));
        }

        match self.store.find_active(key)? {
            Some(existing) => self.set_flag(existing.id, RecordFlag::OperatorConfirmed),
            None => {
                let mut record = HardwareRecord::new(key.clone());
                RecordFlag::OperatorConfirmed.set_on(&mut record);
                self.store.insert(&record)?;
                info!("Created confirmed placeholder {} ({})", record.id, key);
                Ok(record)
            }
        }
    }

    /// Soft-delete the active record for `key`
    pub fn invalidate(&self, key: &NaturalKey) -> Result<HardwareRecord> {
        let record = self.find(key)?;
        let record = self.set_flag(record.id, RecordFlag::InvalidatedPsid)?;
        info!("Invalidated PSID of record {} ({})", record.id, key);
        Ok(record)
    }

    /// Active record for a natural key
    pub fn find(&self, key: &NaturalKey) -> Result<HardwareRecord> {
        if !key.is_usable() {
            return Err(Error::InvalidKey("serial_number or psid must be provided".to_string()));
        }
        self.store
            .find_active(key)?
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    pub fn find_by_id(&self, id: RecordId) -> Result<HardwareRecord> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("record {}", id)))
    }

    /// Active records matching `query`, confirmed first, then edited
    pub fn query(&self, query: &RecordQuery) -> Result<Vec<HardwareRecord>> {
        query.validate()?;
        let mut records = self.store.query(query)?;
        sort_by_precedence(&mut records);
        Ok(records)
    }

    fn set_flag(&self, id: RecordId, flag: RecordFlag) -> Result<HardwareRecord> {
        self.store
            .set_flag(id, flag)?
            .ok_or_else(|| Error::NotFound(format!("record {}", id)))
    }
}

fn record_from_fields(key: NaturalKey, fields: &CanonicalFieldMap) -> HardwareRecord {
    let mut record = HardwareRecord::new(key);
    let get = |field| fields.get_or_empty(field).to_string();

    record.inventory_id = get(CanonicalField::InventoryId);
    record.make = get(CanonicalField::Make);
    record.model = get(CanonicalField::Model);
    record.part_number = get(CanonicalField::PartNumber);
    record.capacity = get(CanonicalField::Capacity);
    record.hard_type = get(CanonicalField::HardType);
    record.eui = get(CanonicalField::Eui);

    for (field, value) in fields.fields() {
        if !RECORD_ATTRIBUTES.contains(&field) {
            record
                .extra_fields
                .insert(field.as_str().to_string(), Value::String(value.to_string()));
        }
    }
    for (key, value) in fields.extras() {
        if IDENTITY_KEYS.contains(&key.as_str()) || CanonicalField::from_name(key).is_some() {
            continue;
        }
        record.extra_fields.insert(key.clone(), value.clone());
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn manager() -> InventoryManager {
        InventoryManager::new(Arc::new(MemoryStore::new()))
    }

    fn scan(serial: &str, psid: &str) -> CanonicalFieldMap {
        let mut fields = CanonicalFieldMap::new();
        fields.insert(CanonicalField::SerialNumber, serial);
        fields.insert(CanonicalField::Psid, psid);
        fields
    }

    fn dell(serial: &str, psid: &str) -> NewRecord {
        NewRecord {
            serial_number: serial.into(),
            psid: psid.into(),
            make: "Dell".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let manager = manager();
        let mut fields = scan("SN1", "PSID1");
        fields.insert(CanonicalField::Capacity, "512");

        let first = manager.reconcile(&fields, vec!["a.jpg".into()], "INV-1").unwrap();
        assert!(first.is_created());

        fields.insert(CanonicalField::Capacity, "1");
        let second = manager.reconcile(&fields, vec!["b.jpg".into()], "INV-2").unwrap();
        assert!(!second.is_created());
        assert_eq!(second.record(), first.record());
        assert_eq!(second.record().capacity, "512");
    }

    #[test]
    fn test_reconcile_requires_a_key() {
        let manager = manager();
        let mut fields = CanonicalFieldMap::new();
        fields.insert(CanonicalField::Make, "DELL");
        assert!(matches!(manager.reconcile(&fields, vec![], ""), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_reconcile_copies_attributes_and_extras() {
        let manager = manager();
        let mut fields = scan("SN1", "PSID1");
        fields.insert(CanonicalField::Make, "SAMSUNG");
        fields.insert(CanonicalField::HardType, "SSD");
        fields.insert(CanonicalField::Type, "SSD");
        fields.insert(CanonicalField::Unit, "GB");
        fields.insert(CanonicalField::InventoryId, "INV-LABEL");
        fields.insert_extra("firmware", json!("A01"));
        fields.insert_extra("make", json!("samsung electronics"));
        fields.insert_extra("hard_id", json!("42"));

        let record = manager.reconcile(&fields, vec![], "").unwrap().into_record();
        assert_eq!(record.make, "SAMSUNG");
        assert_eq!(record.hard_type, "SSD");
        assert_eq!(record.inventory_id, "INV-LABEL");
        assert_eq!(record.extra_fields.get("firmware"), Some(&json!("A01")));
        assert_eq!(record.extra_fields.get("type"), Some(&json!("SSD")));
        assert_eq!(record.extra_fields.get("unit"), Some(&json!("GB")));
        for excluded in ["make", "serial_number", "inventory_id", "hard_id", "psid"] {
            assert!(!record.extra_fields.contains_key(excluded), "{} leaked", excluded);
        }
    }

    #[test]
    fn test_second_add_conflicts() {
        let manager = manager();
        manager.add(dell("SN1", "PSID1"), vec![]).unwrap();
        assert!(matches!(manager.add(dell("SN1", "PSID1"), vec![]), Err(Error::Conflict(_))));
        assert!(manager.add(dell("SN1", "PSID2"), vec![]).is_ok());
    }

    #[test]
    fn test_add_requires_complete_key() {
        assert!(matches!(manager().add(dell("SN1", ""), vec![]), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_edit_only_capacity() {
        let manager = manager();
        let added = manager.add(dell("SN1", "PSID1"), vec!["x.jpg".into()]).unwrap();

        let edit = RecordEdit {
            capacity: Some("1TB".into()),
            ..Default::default()
        };
        let edited = manager.edit(added.id, &edit).unwrap();

        assert_eq!(edited.capacity, "1TB");
        assert!(edited.operator_edited);
        assert_eq!(
            HardwareRecord {
                capacity: added.capacity.clone(),
                operator_edited: false,
                ..edited.clone()
            },
            added
        );
        assert_eq!(manager.find_by_id(added.id).unwrap(), edited);
    }

    #[test]
    fn test_edit_onto_taken_key_conflicts() {
        let manager = manager();
        manager.add(dell("SN1", "PSID1"), vec![]).unwrap();
        let other = manager.add(dell("SN2", "PSID2"), vec![]).unwrap();

        let edit = RecordEdit {
            serial_number: Some("SN1".into()),
            psid: Some("PSID1".into()),
            ..Default::default()
        };
        assert!(matches!(manager.edit(other.id, &edit), Err(Error::Conflict(_))));
        assert!(matches!(
            manager.edit(RecordId::generate(), &RecordEdit::default()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_confirm_existing_or_placeholder() {
        let manager = manager();
        let added = manager.add(dell("SN1", "PSID1"), vec![]).unwrap();
        let confirmed = manager.confirm(&NaturalKey::new("SN1", "PSID1")).unwrap();
        assert_eq!(confirmed.id, added.id);
        assert!(confirmed.operator_confirmed);

        let placeholder = manager.confirm(&NaturalKey::new("SN9", "PSID9")).unwrap();
        assert!(placeholder.operator_confirmed);
        assert!(placeholder.make.is_empty());
        assert_eq!(manager.find(&NaturalKey::new("SN9", "PSID9")).unwrap().id, placeholder.id);
    }

    #[test]
    fn test_invalidate_hides_record() {
        let manager = manager();
        manager.add(dell("SN1", "PSID1"), vec![]).unwrap();
        let key = NaturalKey::new("SN1", "PSID1");

        let invalidated = manager.invalidate(&key).unwrap();
        assert!(invalidated.invalidated_psid);
        assert!(matches!(manager.find(&key), Err(Error::NotFound(_))));
        assert!(matches!(manager.invalidate(&key), Err(Error::NotFound(_))));
        assert!(manager.query(&RecordQuery::by_serial("SN1")).unwrap().is_empty());

        // the key is free again
        assert!(manager.add(dell("SN1", "PSID1"), vec![]).is_ok());
    }

    #[test]
    fn test_query_orders_by_precedence() {
        let manager = manager();
        let plain = manager.add(dell("SN1", "A"), vec![]).unwrap();
        let edited = manager.add(dell("SN1", "B"), vec![]).unwrap();
        let confirmed = manager.add(dell("SN1", "C"), vec![]).unwrap();
        manager.edit(edited.id, &RecordEdit::default()).unwrap();
        manager.confirm(&confirmed.natural_key()).unwrap();

        let ids: Vec<RecordId> = manager
            .query(&RecordQuery::by_serial("SN1"))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![confirmed.id, edited.id, plain.id]);
    }
}
