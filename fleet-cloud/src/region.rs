//! Region catalog.

use serde::{Deserialize, Serialize};

use crate::{ProvisionError, Result};

/// A named region with the launch template used there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionProfile {
    /// Friendly name, e.g. `hangzhou`.
    pub name: String,
    /// Platform region id, e.g. `cn-hangzhou`.
    pub region_id: String,
    /// Launch template id in that region.
    pub launch_template_id: String,
}

/// Known regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionCatalog {
    regions: Vec<RegionProfile>,
}

impl RegionCatalog {
    /// Catalog over `regions`.
    pub fn new(regions: Vec<RegionProfile>) -> Self {
        Self { regions }
    }

    /// Look a region up by friendly name or platform id.
    pub fn resolve(&self, name: &str) -> Result<&RegionProfile> {
        self.regions
            .iter()
            .find(|r| r.name == name || r.region_id == name)
            .ok_or_else(|| ProvisionError::UnknownRegion(name.to_string()))
    }

    /// Friendly names in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.regions.iter().map(|r| r.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> RegionCatalog {
        RegionCatalog::new(vec![
            RegionProfile {
                name: "hangzhou".into(),
                region_id: "cn-hangzhou".into(),
                launch_template_id: "lt-hz".into(),
            },
            RegionProfile {
                name: "shanghai".into(),
                region_id: "cn-shanghai".into(),
                launch_template_id: "lt-sh".into(),
            },
        ])
    }

    #[test]
    fn resolves_by_name_or_id() {
        let c = catalog();
        assert_eq!(c.resolve("shanghai").unwrap().launch_template_id, "lt-sh");
        assert_eq!(c.resolve("cn-hangzhou").unwrap().name, "hangzhou");
        assert_eq!(c.names(), vec!["hangzhou", "shanghai"]);
    }

    #[test]
    fn unknown_region_rejected() {
        assert!(matches!(
            catalog().resolve("mars"),
            Err(ProvisionError::UnknownRegion(_))
        ));
    }
}
