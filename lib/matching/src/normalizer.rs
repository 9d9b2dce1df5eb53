//! OCR response normalizer.
//!
//! Turns the loosely typed map returned by the OCR provider into a
//! [`CanonicalFieldMap`]. Keys are remapped through the [`FieldMatcher`];
//! unit splitting and case folding only run for the automated scanner
//! pipeline, since other callers send values that are already clean.

use crate::matcher::{FieldMatcher, BRAND_KEY};
use labelscan_core::{CanonicalField, CanonicalFieldMap, RawOcrFields};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;

/// Sender value identifying the automated scanner pipeline
pub const AUTOMATED_SENDER: &str = "scanner";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderContext {
    /// Automated pipeline client; values get unit and case normalization
    AutomatedPipeline,
    #[default]
    Other,
}

impl SenderContext {
    pub fn from_sender(sender: Option<&str>) -> Self {
        match sender.map(str::trim) {
            Some(AUTOMATED_SENDER) => SenderContext::AutomatedPipeline,
            _ => SenderContext::Other,
        }
    }

    #[inline]
    pub fn is_automated(self) -> bool {
        self == SenderContext::AutomatedPipeline
    }
}

/// How a canonical value was obtained; higher wins a collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Source {
    Remapped,
    Exact,
    Override,
}

struct Slot {
    value: String,
    source: Source,
    raw_key: String,
    raw_value: Value,
}

#[derive(Clone)]
pub struct Normalizer {
    matcher: FieldMatcher,
}

impl Normalizer {
    pub fn new(matcher: FieldMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &FieldMatcher {
        &self.matcher
    }

    /// Canonicalize one OCR response.
    ///
    /// Raw fields are visited in sorted key order. When two raw keys land on
    /// the same canonical field, a `brand` override beats an exact canonical
    /// key, which beats a remapped key; between equals the first key wins.
    /// The losing value is kept in the extras bucket under its raw key.
    pub async fn normalize(&self, raw: &RawOcrFields, sender: SenderContext) -> CanonicalFieldMap {
        let mut entries: Vec<(&String, &Value)> = raw.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut slots: BTreeMap<CanonicalField, Slot> = BTreeMap::new();
        let mut out = CanonicalFieldMap::new();

        for (key, value) in entries {
            let text = match scalar_text(value) {
                Scalar::Absent => continue,
                Scalar::Text(text) => text,
                Scalar::Structured => {
                    out.insert_extra(key.clone(), value.clone());
                    continue;
                }
            };

            if key == BRAND_KEY {
                let slot = Slot {
                    value: text.to_uppercase(),
                    source: Source::Override,
                    raw_key: key.clone(),
                    raw_value: value.clone(),
                };
                place(&mut slots, &mut out, CanonicalField::Make, slot);
                continue;
            }

            let field = match self.matcher.match_key(key).await {
                Some(field) => field,
                None => {
                    out.insert_extra(key.clone(), value.clone());
                    continue;
                }
            };

            let source = if key == field.as_str() {
                Source::Exact
            } else {
                debug!("Remapped OCR key {:?} -> {}", key, field);
                Source::Remapped
            };
            let value_text = if sender.is_automated() && is_case_folded(field) {
                text.to_uppercase()
            } else {
                text
            };

            let slot = Slot {
                value: value_text,
                source,
                raw_key: key.clone(),
                raw_value: value.clone(),
            };
            place(&mut slots, &mut out, field, slot);
        }

        if sender.is_automated() {
            derive_fields(&mut slots, &mut out);
        }

        for (field, slot) in slots {
            out.insert(field, slot.value);
        }
        out
    }
}

fn place(
    slots: &mut BTreeMap<CanonicalField, Slot>,
    out: &mut CanonicalFieldMap,
    field: CanonicalField,
    slot: Slot,
) {
    match slots.entry(field) {
        Entry::Vacant(e) => {
            e.insert(slot);
        }
        Entry::Occupied(mut e) => {
            let loser = if slot.source > e.get().source {
                e.insert(slot)
            } else {
                slot
            };
            debug!("Displaced {:?} from {} into extras", loser.raw_key, field);
            out.insert_extra(loser.raw_key, loser.raw_value);
        }
    }
}

/// Capacity unit split and the generic `type` mirror.
fn derive_fields(slots: &mut BTreeMap<CanonicalField, Slot>, out: &mut CanonicalFieldMap) {
    let mut derived: Vec<(CanonicalField, String)> = Vec::new();

    if let Some(capacity) = slots.get_mut(&CanonicalField::Capacity) {
        let (amount, unit) = split_capacity(&capacity.value);
        capacity.value = amount;
        if let Some(unit) = unit {
            derived.push((CanonicalField::Unit, unit.to_string()));
        }
    }

    let mirrored = [CanonicalField::HardType, CanonicalField::RamType]
        .iter()
        .find_map(|f| slots.get(f).map(|s| s.value.clone()));
    if let Some(kind) = mirrored {
        derived.push((CanonicalField::Type, kind));
    }

    for (field, value) in derived {
        let slot = Slot {
            value,
            source: Source::Override,
            raw_key: String::new(),
            raw_value: Value::Null,
        };
        place(slots, out, field, slot);
    }
}

/// Split an uppercased capacity into its amount and unit.
///
/// `GB` is checked before `TB` and at most one unit is stripped.
pub fn split_capacity(value: &str) -> (String, Option<&'static str>) {
    let value = value.to_uppercase();
    for unit in ["GB", "TB"] {
        if value.contains(unit) {
            return (value.replace(unit, "").trim().to_string(), Some(unit));
        }
    }
    (value, None)
}

fn is_case_folded(field: CanonicalField) -> bool {
    matches!(
        field,
        CanonicalField::Capacity
            | CanonicalField::HardType
            | CanonicalField::RamType
            | CanonicalField::Type
    )
}

enum Scalar {
    Absent,
    Text(String),
    Structured,
}

fn scalar_text(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Absent,
        Value::String(s) => Scalar::Text(s.clone()),
        Value::Number(n) => Scalar::Text(n.to_string()),
        Value::Bool(b) => Scalar::Text(b.to_string()),
        Value::Array(_) | Value::Object(_) => Scalar::Structured,
    }
}
