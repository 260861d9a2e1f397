//! Provider selection from configuration.

use crate::config::Config;
use crate::error::{Result, RunError};
use fleet_cloud::{AliyunConfig, AliyunProvider, CloudProvider, RegionCatalog};
use std::sync::Arc;

/// Build the provider named by `cloud.provider`.
///
/// # Errors
///
/// Fails for an unknown provider, an unknown region, or missing credentials.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn CloudProvider>> {
    let cloud = &config.cloud;
    match cloud.provider.as_str() {
        "aliyun" => {
            let catalog = RegionCatalog::new(cloud.regions.clone());
            let region = catalog.resolve(&cloud.region)?;
            let provider = AliyunProvider::new(AliyunConfig {
                endpoint: cloud.endpoint.clone(),
                region_id: region.region_id.clone(),
                launch_template_id: region.launch_template_id.clone(),
                access_key_id: cloud.access_key_id.clone(),
                access_key_secret: cloud.access_key_secret.clone(),
                tag: cloud.tag.clone(),
                host_name: cloud.host_name.clone(),
                instance_name: cloud.instance_name.clone(),
                ..AliyunConfig::default()
            })?;
            Ok(Arc::new(provider))
        }
        other => Err(RunError::Configuration(format!(
            "unknown cloud provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_cloud::{ProvisionError, RegionProfile};

    fn config() -> Config {
        let mut config = Config::default();
        config.cloud.region = "hangzhou".into();
        config.cloud.regions = vec![RegionProfile {
            name: "hangzhou".into(),
            region_id: "cn-hangzhou".into(),
            launch_template_id: "lt-1".into(),
        }];
        config.cloud.access_key_id = "AKID".into();
        config.cloud.access_key_secret = "SECRET".into();
        config
    }

    #[test]
    fn aliyun_provider_builds() {
        let provider = provider_from_config(&config()).unwrap();
        assert_eq!(provider.name(), "aliyun");
    }

    #[test]
    fn unknown_region_rejected() {
        let mut config = config();
        config.cloud.region = "mars".into();
        let result = provider_from_config(&config);
        assert!(matches!(
            result,
            Err(RunError::Provision(ProvisionError::UnknownRegion(_)))
        ));
    }

    #[test]
    fn missing_credentials_rejected() {
        let mut config = config();
        config.cloud.access_key_secret.clear();
        let result = provider_from_config(&config);
        assert!(matches!(
            result,
            Err(RunError::Provision(ProvisionError::Config(_)))
        ));
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = config();
        config.cloud.provider = "other".into();
        assert!(matches!(
            provider_from_config(&config),
            Err(RunError::Configuration(_))
        ));
    }
}
