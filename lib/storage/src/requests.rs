//! PSID request links.
//!
//! A request is a shareable link asking an operator to photograph the PSID
//! of a set of drives, identified by serial number. Each serial stays
//! pending until a PSID has been stored for it.

use chrono::{DateTime, Utc};
use labelscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialCondition {
    pub serial_number: String,
    #[serde(default)]
    pub psid_stored: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsidRequest {
    pub id: Uuid,
    pub conditions: Vec<SerialCondition>,
    pub created_at: DateTime<Utc>,
}

impl PsidRequest {
    fn new(serials: BTreeSet<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conditions: serials
                .into_iter()
                .map(|serial_number| SerialCondition {
                    serial_number,
                    psid_stored: false,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    pub fn serials(&self) -> BTreeSet<&str> {
        self.conditions.iter().map(|c| c.serial_number.as_str()).collect()
    }

    pub fn pending(&self) -> Vec<String> {
        self.conditions
            .iter()
            .filter(|c| !c.psid_stored)
            .map(|c| c.serial_number.clone())
            .collect()
    }
}

pub trait RequestStore: Send + Sync {
    fn get_request(&self, id: Uuid) -> Result<Option<PsidRequest>>;
    fn put_request(&self, request: &PsidRequest) -> Result<()>;
    fn list_requests(&self) -> Result<Vec<PsidRequest>>;
}

#[derive(Clone)]
pub struct PsidRequests {
    store: Arc<dyn RequestStore>,
}

impl PsidRequests {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self { store }
    }

    /// Create a request for `serials`, reusing one that covers exactly the
    /// same set of serial numbers.
    pub fn create(&self, serials: &[String]) -> Result<PsidRequest> {
        let wanted: BTreeSet<String> = serials
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if wanted.is_empty() {
            return Err(Error::InvalidInput("at least one serial number is required".to_string()));
        }

        let wanted_refs: BTreeSet<&str> = wanted.iter().map(String::as_str).collect();
        if let Some(existing) = self
            .store
            .list_requests()?
            .into_iter()
            .find(|r| r.serials() == wanted_refs)
        {
            return Ok(existing);
        }

        let request = PsidRequest::new(wanted);
        self.store.put_request(&request)?;
        info!(
            "Created PSID request {} for {} serials",
            request.id,
            request.conditions.len()
        );
        Ok(request)
    }

    pub fn get(&self, id: Uuid) -> Result<PsidRequest> {
        self.store
            .get_request(id)?
            .ok_or_else(|| Error::NotFound(format!("psid request {}", id)))
    }

    /// Serials of `id` whose PSID has not been stored yet
    pub fn pending_serials(&self, id: Uuid) -> Result<Vec<String>> {
        let pending = self.get(id)?.pending();
        if pending.is_empty() {
            return Err(Error::NotFound(format!("no pending serials for request {}", id)));
        }
        Ok(pending)
    }

    pub fn is_pending(&self, id: Uuid, serial_number: &str) -> Result<bool> {
        Ok(self
            .get(id)?
            .conditions
            .iter()
            .any(|c| c.serial_number == serial_number && !c.psid_stored))
    }

    pub fn mark_stored(&self, id: Uuid, serial_number: &str) -> Result<()> {
        let mut request = self.get(id)?;
        let condition = request
            .conditions
            .iter_mut()
            .find(|c| c.serial_number == serial_number)
            .ok_or_else(|| {
                Error::NotFound(format!("serial {} in psid request {}", serial_number, id))
            })?;
        condition.psid_stored = true;
        self.store.put_request(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn requests() -> PsidRequests {
        PsidRequests::new(Arc::new(MemoryStore::new()))
    }

    fn serials(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_reuses_same_serial_set() {
        let requests = requests();
        let first = requests.create(&serials(&["SN2", "SN1"])).unwrap();
        let again = requests.create(&serials(&["SN1", "SN2", "SN1"])).unwrap();
        assert_eq!(first.id, again.id);

        let other = requests.create(&serials(&["SN1"])).unwrap();
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn test_pending_until_stored() {
        let requests = requests();
        let request = requests.create(&serials(&["SN1", "SN2"])).unwrap();
        assert_eq!(requests.pending_serials(request.id).unwrap(), serials(&["SN1", "SN2"]));

        requests.mark_stored(request.id, "SN1").unwrap();
        assert_eq!(requests.pending_serials(request.id).unwrap(), serials(&["SN2"]));
        assert!(!requests.is_pending(request.id, "SN1").unwrap());

        requests.mark_stored(request.id, "SN2").unwrap();
        assert!(matches!(requests.pending_serials(request.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unknown_request_or_serial() {
        let requests = requests();
        assert!(matches!(requests.pending_serials(Uuid::new_v4()), Err(Error::NotFound(_))));

        let request = requests.create(&serials(&["SN1"])).unwrap();
        assert!(matches!(requests.mark_stored(request.id, "SN9"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_create_requires_serials() {
        assert!(matches!(
            requests().create(&serials(&["", "  "])),
            Err(Error::InvalidInput(_))
        ));
    }
}
