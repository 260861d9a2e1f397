//! AliyunProvider - ECS instances over the signed RPC API.
//!
//! Every call is an HTTPS POST to the ECS endpoint with the action
//! parameters in the query string and an ACS3-HMAC-SHA256 `Authorization`
//! header.

use crate::provider::{CloudProvider, InstanceStatus};
use crate::signing::Acs3Signer;
use crate::{ProvisionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_types::{InstanceId, NodeState};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// ECS API version.
pub const API_VERSION: &str = "2014-05-26";

/// Instances one `RunInstances` call may create.
pub const MAX_INSTANCES_PER_CALL: usize = 50;

/// Timestamp format of `AutoReleaseTime` and `x-acs-date`.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Settings for the Aliyun provider.
#[derive(Debug, Clone)]
pub struct AliyunConfig {
    /// API endpoint host.
    pub endpoint: String,
    /// Region id, e.g. `cn-hangzhou`.
    pub region_id: String,
    /// Launch template id.
    pub launch_template_id: String,
    /// Access key id.
    pub access_key_id: String,
    /// Access key secret.
    pub access_key_secret: String,
    /// Value of the `type` tag on created instances.
    pub tag: String,
    /// Host name prefix; the platform appends a unique suffix.
    pub host_name: String,
    /// Instance name prefix.
    pub instance_name: String,
    /// Instance description.
    pub description: String,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for AliyunConfig {
    fn default() -> Self {
        Self {
            endpoint: "ecs.aliyuncs.com".to_string(),
            region_id: String::new(),
            launch_template_id: String::new(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
            tag: "jmeter".to_string(),
            host_name: "loadfleet".to_string(),
            instance_name: "loadfleet_".to_string(),
            description: "loadfleet load generator".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Aliyun ECS provider.
#[derive(Debug)]
pub struct AliyunProvider {
    http: reqwest::Client,
    signer: Acs3Signer,
    config: AliyunConfig,
}

impl AliyunProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] when credentials or region are
    /// missing or the HTTP client cannot be built.
    pub fn new(config: AliyunConfig) -> Result<Self> {
        if config.access_key_id.is_empty() || config.access_key_secret.is_empty() {
            return Err(ProvisionError::Config("access key id and secret are required".into()));
        }
        if config.region_id.is_empty() {
            return Err(ProvisionError::Config("region id is required".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProvisionError::Config(e.to_string()))?;
        Ok(Self {
            http,
            signer: Acs3Signer::new(&config.access_key_id, &config.access_key_secret),
            config,
        })
    }

    /// Sign and send one action, decoding the JSON response.
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Vec<(String, String)>,
    ) -> Result<T> {
        let api_error = |reason: String| ProvisionError::Api {
            action: action.to_string(),
            reason,
        };

        let mut headers = BTreeMap::new();
        headers.insert("x-acs-action".to_string(), action.to_string());
        headers.insert("x-acs-version".to_string(), API_VERSION.to_string());
        headers.insert("x-acs-date".to_string(), Utc::now().format(ISO_FORMAT).to_string());
        headers.insert(
            "x-acs-signature-nonce".to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        let authorization =
            self.signer
                .sign("POST", &self.config.endpoint, &params, &mut headers, b"");

        let url = format!(
            "https://{}/?{}",
            self.config.endpoint,
            crate::signing::canonical_query(&params)
        );
        let mut request = self.http.post(&url).header("authorization", authorization);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!(action = %action, endpoint = %self.config.endpoint, "Calling cloud API");
        let response = request
            .send()
            .await
            .map_err(|e| api_error(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| api_error(e.to_string()))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => format!("{} ({}): {}", err.code, status.as_u16(), err.message),
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };
            return Err(api_error(reason));
        }
        serde_json::from_str(&body).map_err(|e| api_error(format!("invalid response: {}", e)))
    }
}

#[async_trait]
impl CloudProvider for AliyunProvider {
    fn name(&self) -> &str {
        "aliyun"
    }

    fn max_instances_per_call(&self) -> usize {
        MAX_INSTANCES_PER_CALL
    }

    async fn provision_instances(
        &self,
        count: usize,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<InstanceId>> {
        let params = run_instances_params(&self.config, count, expires_at);
        let response: RunInstancesResponse = self.call("RunInstances", params).await?;
        let ids: Vec<InstanceId> = response
            .instance_id_sets
            .instance_id_set
            .into_iter()
            .map(InstanceId::new)
            .collect();
        info!(count = ids.len(), region = %self.config.region_id, "Instances created");
        Ok(ids)
    }

    async fn query_status(&self, ids: &[InstanceId]) -> Result<Vec<InstanceStatus>> {
        let id_list: Vec<&str> = ids.iter().map(InstanceId::as_str).collect();
        let params = vec![
            ("RegionId".to_string(), self.config.region_id.clone()),
            (
                "InstanceIds".to_string(),
                serde_json::to_string(&id_list).map_err(|e| ProvisionError::Api {
                    action: "DescribeInstances".into(),
                    reason: e.to_string(),
                })?,
            ),
            ("PageSize".to_string(), "100".to_string()),
        ];
        let response: DescribeInstancesResponse = self.call("DescribeInstances", params).await?;
        Ok(response
            .instances
            .instance
            .into_iter()
            .map(Instance::into_status)
            .collect())
    }

    async fn release_instance(&self, id: &InstanceId) -> Result<()> {
        let params = vec![
            ("InstanceId".to_string(), id.to_string()),
            ("Force".to_string(), "true".to_string()),
        ];
        let _: serde_json::Value = self.call("DeleteInstance", params).await?;
        Ok(())
    }
}

/// Parameters of a `RunInstances` call.
fn run_instances_params(
    config: &AliyunConfig,
    count: usize,
    expires_at: DateTime<Utc>,
) -> Vec<(String, String)> {
    [
        ("RegionId", config.region_id.clone()),
        ("LaunchTemplateId", config.launch_template_id.clone()),
        ("Amount", count.to_string()),
        ("AutoReleaseTime", expires_at.format(ISO_FORMAT).to_string()),
        ("Tag.1.Key", "type".to_string()),
        ("Tag.1.Value", config.tag.clone()),
        ("HostName", config.host_name.clone()),
        ("UniqueSuffix", "true".to_string()),
        ("InstanceName", config.instance_name.clone()),
        ("PasswordInherit", "true".to_string()),
        ("DeletionProtection", "false".to_string()),
        ("Description", config.description.clone()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

// ===========================================
// Response bodies
// ===========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesResponse {
    instance_id_sets: InstanceIdSets,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceIdSets {
    #[serde(default)]
    instance_id_set: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    instances: Instances,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instances {
    #[serde(default)]
    instance: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    instance_id: String,
    status: String,
    #[serde(default)]
    network_interfaces: Option<NetworkInterfaces>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkInterfaces {
    #[serde(default)]
    network_interface: Vec<NetworkInterface>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkInterface {
    primary_ip_address: Option<String>,
}

impl Instance {
    fn into_status(self) -> InstanceStatus {
        let address = self
            .network_interfaces
            .and_then(|n| n.network_interface.into_iter().next())
            .and_then(|n| n.primary_ip_address)
            .filter(|a| !a.is_empty());
        InstanceStatus {
            id: InstanceId::new(self.instance_id),
            state: NodeState::from_platform(&self.status),
            address,
        }
    }
}
