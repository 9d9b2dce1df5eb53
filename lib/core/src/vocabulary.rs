//! The closed set of canonical field names a scan can resolve to.
//!
//! [`CanonicalField::ALL`] is the matching vocabulary. Its order is part of
//! the matching contract: ties in similarity are won by the field listed
//! first, so the order must never depend on hashing.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Type,
    Make,
    Model,
    CpuModel,
    CpuSeries,
    SerialNumber,
    PartNumber,
    Battery,
    Adapter,
    RamCapacitySize,
    ScreenSizeInches,
    HddCapacity,
    HddType,
    RamType,
    CpuSpeed,
    GpuModel,
    Cam,
    Capacity,
    HardType,
    Psid,
    Eui,
    Unit,
    InventoryId,
}

impl CanonicalField {
    /// Matching vocabulary in its fixed iteration order
    pub const ALL: [CanonicalField; 23] = [
        CanonicalField::Type,
        CanonicalField::Make,
        CanonicalField::Model,
        CanonicalField::CpuModel,
        CanonicalField::CpuSeries,
        CanonicalField::SerialNumber,
        CanonicalField::PartNumber,
        CanonicalField::Battery,
        CanonicalField::Adapter,
        CanonicalField::RamCapacitySize,
        CanonicalField::ScreenSizeInches,
        CanonicalField::HddCapacity,
        CanonicalField::HddType,
        CanonicalField::RamType,
        CanonicalField::CpuSpeed,
        CanonicalField::GpuModel,
        CanonicalField::Cam,
        CanonicalField::Capacity,
        CanonicalField::HardType,
        CanonicalField::Psid,
        CanonicalField::Eui,
        CanonicalField::Unit,
        CanonicalField::InventoryId,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Type => "type",
            CanonicalField::Make => "make",
            CanonicalField::Model => "model",
            CanonicalField::CpuModel => "cpu_model",
            CanonicalField::CpuSeries => "cpu_series",
            CanonicalField::SerialNumber => "serial_number",
            CanonicalField::PartNumber => "part_number",
            CanonicalField::Battery => "battery",
            CanonicalField::Adapter => "adapter",
            CanonicalField::RamCapacitySize => "ram_capacity_size",
            CanonicalField::ScreenSizeInches => "screen_size_inches",
            CanonicalField::HddCapacity => "hdd_capacity",
            CanonicalField::HddType => "hdd_type",
            CanonicalField::RamType => "ram_type",
            CanonicalField::CpuSpeed => "cpu_speed",
            CanonicalField::GpuModel => "gpu_model",
            CanonicalField::Cam => "cam",
            CanonicalField::Capacity => "capacity",
            CanonicalField::HardType => "hard_type",
            CanonicalField::Psid => "psid",
            CanonicalField::Eui => "eui",
            CanonicalField::Unit => "unit",
            CanonicalField::InventoryId => "inventory_id",
        }
    }

    /// Exact lookup by canonical name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.as_str() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
