use labelscan_core::{
    sort_by_precedence, Filter, HardwareRecord, NaturalKey, RecordFlag, RecordId, Result,
};

/// Durable home of hardware records.
///
/// Records are never removed; invalidation is a flag. Implementations must
/// be shareable across request handlers.
pub trait RecordStore: Send + Sync {
    fn find_by_id(&self, id: RecordId) -> Result<Option<HardwareRecord>>;

    /// Every record accepted by `filter`, in no particular order
    fn query(&self, filter: &dyn Filter) -> Result<Vec<HardwareRecord>>;

    fn insert(&self, record: &HardwareRecord) -> Result<()>;

    /// Overwrite a stored record with the same id
    fn update(&self, record: &HardwareRecord) -> Result<()>;

    /// Set a status flag; `None` when no record has this id
    fn set_flag(&self, id: RecordId, flag: RecordFlag) -> Result<Option<HardwareRecord>> {
        match self.find_by_id(id)? {
            Some(mut record) => {
                flag.set_on(&mut record);
                self.update(&record)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Active record for a natural key; the highest-precedence one if
    /// several historical records match.
    fn find_active(&self, key: &NaturalKey) -> Result<Option<HardwareRecord>> {
        let mut found = self.query(key)?;
        sort_by_precedence(&mut found);
        Ok(found.into_iter().next())
    }
}
