// Record predicates shared by every store backend
use crate::record::{HardwareRecord, NaturalKey};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub trait Filter {
    fn matches(&self, record: &HardwareRecord) -> bool;
}

/// Empty predicates match anything
#[inline]
fn field_matches(predicate: &str, value: &str) -> bool {
    predicate.is_empty() || predicate == value
}

impl Filter for NaturalKey {
    fn matches(&self, record: &HardwareRecord) -> bool {
        record.is_active()
            && field_matches(&self.serial_number, &record.serial_number)
            && field_matches(&self.psid, &record.psid)
    }
}

/// Listing query over active records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordQuery {
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub inventory_id: String,
}

impl RecordQuery {
    pub fn by_serial(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            ..Default::default()
        }
    }

    pub fn by_inventory(inventory_id: impl Into<String>) -> Self {
        Self {
            inventory_id: inventory_id.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial_number.is_empty() && self.make.is_empty() && self.inventory_id.is_empty() {
            return Err(Error::InvalidKey(
                "serial_number, make or inventory_id must be provided".to_string(),
            ));
        }
        Ok(())
    }
}

impl Filter for RecordQuery {
    fn matches(&self, record: &HardwareRecord) -> bool {
        record.is_active()
            && field_matches(&self.serial_number, &record.serial_number)
            && field_matches(&self.make, &record.make)
            && field_matches(&self.inventory_id, &record.inventory_id)
    }
}

/// Confirmed records first, then edited, then the rest; creation order
/// within each group.
pub fn sort_by_precedence(records: &mut [HardwareRecord]) {
    records.sort_by(|a, b| {
        a.precedence()
            .cmp(&b.precedence())
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serial: &str, psid: &str) -> HardwareRecord {
        HardwareRecord::new(NaturalKey::new(serial, psid))
    }

    #[test]
    fn test_natural_key_uses_non_empty_components() {
        let r = record("SN1", "PSID1");
        assert!(NaturalKey::new("SN1", "PSID1").matches(&r));
        assert!(NaturalKey::new("SN1", "").matches(&r));
        assert!(NaturalKey::new("", "PSID1").matches(&r));
        assert!(!NaturalKey::new("SN1", "PSID2").matches(&r));
    }

    #[test]
    fn test_invalidated_records_never_match() {
        let mut r = record("SN1", "PSID1");
        r.invalidated_psid = true;
        assert!(!NaturalKey::new("SN1", "PSID1").matches(&r));
        assert!(!RecordQuery::by_serial("SN1").matches(&r));
    }

    #[test]
    fn test_query_requires_a_predicate() {
        assert!(matches!(RecordQuery::default().validate(), Err(Error::InvalidKey(_))));
        assert!(RecordQuery::by_inventory("INV-7").validate().is_ok());
    }

    #[test]
    fn test_sort_by_precedence() {
        let plain = record("SN", "A");
        let mut edited = record("SN", "B");
        edited.operator_edited = true;
        let mut confirmed = record("SN", "C");
        confirmed.operator_confirmed = true;

        let mut records = vec![plain, edited, confirmed];
        sort_by_precedence(&mut records);
        let psids: Vec<&str> = records.iter().map(|r| r.psid.as_str()).collect();
        assert_eq!(psids, vec!["C", "B", "A"]);
    }
}
