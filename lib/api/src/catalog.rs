// Read-only catalog of device field labels and storage kinds
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEVICE_TYPES: [&str; 3] = ["laptop", "desktop", "server"];

/// Field key -> display label, shared by every device type
const DEVICE_FIELDS: [(&str, &str); 18] = [
    ("make", "Make"),
    ("model", "Model"),
    ("cpu_model", "CPU Model"),
    ("cpu_series", "CPU Series"),
    ("serial_number", "Serial Number"),
    ("part_number", "Part Number"),
    ("battery", "Battery"),
    ("adapter", "Adapter"),
    ("rams", "RAM Full"),
    ("screen_size_inches", "Screen Size Inches"),
    ("hdd_capacity_size", "HDD Capacity Size"),
    ("ram_capacity_size", "Ram Capacity Size"),
    ("hdd_type", "HDD Type"),
    ("ram_type", "Ram Type"),
    ("hdds", "HDD Full"),
    ("cpu_speed", "CPU Speed"),
    ("gpu_model", "GPU Model"),
    ("cam", "Cam"),
];

pub const RAM_KINDS: [&str; 6] = ["DDR3", "DDR4", "DDR5", "LPDDR3", "LPDDR4", "LPDDR5"];

pub const HARD_KINDS: [&str; 3] = ["SATA 2.5", "SSD 2.5", "NVME SSD"];

pub type FieldLabels = BTreeMap<&'static str, &'static str>;

#[derive(Debug, Clone, Serialize)]
pub struct Storages {
    pub rams: &'static [&'static str],
    pub hards: &'static [&'static str],
}

pub fn device_type(name: &str) -> Option<FieldLabels> {
    DEVICE_TYPES
        .contains(&name)
        .then(|| DEVICE_FIELDS.iter().copied().collect())
}

pub fn device_types() -> BTreeMap<&'static str, FieldLabels> {
    DEVICE_TYPES
        .iter()
        .map(|name| (*name, DEVICE_FIELDS.iter().copied().collect()))
        .collect()
}

pub fn storages() -> Storages {
    Storages {
        rams: &RAM_KINDS,
        hards: &HARD_KINDS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_types() {
        let all = device_types();
        assert_eq!(all.len(), 3);
        assert_eq!(all["server"]["cpu_model"], "CPU Model");
        assert_eq!(device_type("laptop").unwrap().len(), DEVICE_FIELDS.len());
        assert!(device_type("phone").is_none());
    }

    #[test]
    fn test_storages_json() {
        let json = serde_json::to_value(storages()).unwrap();
        assert_eq!(json["hards"][2], "NVME SSD");
        assert_eq!(json["rams"].as_array().unwrap().len(), 6);
    }
}
