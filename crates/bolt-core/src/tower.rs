//! Automation-inventory (Ansible Tower / AWX) API client.

use crate::upstream::{ClientSettings, Credentials, HttpClient, UpstreamResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNKNOWN_OS: &str = "Unknown";

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Free-form host variables: YAML or JSON text, or an object.
    #[serde(default)]
    pub variables: Value,
}

fn default_enabled() -> bool {
    true
}

impl HostDetail {
    /// `"<distribution> <version>"` from the host variables, or
    /// [`UNKNOWN_OS`] when neither is present or the blob does not parse.
    pub fn os_info(&self) -> String {
        let vars = match &self.variables {
            Value::String(text) if !text.trim().is_empty() => {
                match serde_yaml::from_str::<Value>(text) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!(host = %self.name, error = %e, "unparsable host variables");
                        Value::Null
                    }
                }
            }
            other => other.clone(),
        };
        let field = |key: &str| match vars.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let info = format!(
            "{} {}",
            field("ansible_distribution"),
            field("ansible_distribution_version")
        );
        let info = info.trim();
        if info.is_empty() {
            UNKNOWN_OS.to_string()
        } else {
            info.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// InventoryApi
// ---------------------------------------------------------------------------

/// What server resolution needs from the automation-inventory system.
pub trait InventoryApi {
    fn search_inventories(&self, query: &str) -> UpstreamResult<Vec<InventorySummary>>;
    fn groups(&self, inventory_id: u64) -> UpstreamResult<Vec<Group>>;
    fn hosts(&self, group_id: u64) -> UpstreamResult<Vec<HostSummary>>;
    fn host(&self, host_id: u64) -> UpstreamResult<HostDetail>;
    fn check(&self) -> UpstreamResult<()>;
}

pub struct TowerClient {
    http: HttpClient,
}

impl TowerClient {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        settings: ClientSettings,
    ) -> UpstreamResult<Self> {
        Ok(Self {
            http: HttpClient::new(base_url, credentials, settings)?,
        })
    }
}

impl InventoryApi for TowerClient {
    fn search_inventories(&self, query: &str) -> UpstreamResult<Vec<InventorySummary>> {
        self.http.get_paged("/api/v2/inventories/", &[("search", query)])
    }

    fn groups(&self, inventory_id: u64) -> UpstreamResult<Vec<Group>> {
        self.http
            .get_paged(&format!("/api/v2/inventories/{inventory_id}/groups/"), &[])
    }

    fn hosts(&self, group_id: u64) -> UpstreamResult<Vec<HostSummary>> {
        self.http
            .get_paged(&format!("/api/v2/groups/{group_id}/hosts/"), &[])
    }

    fn host(&self, host_id: u64) -> UpstreamResult<HostDetail> {
        self.http.get_json(&format!("/api/v2/hosts/{host_id}/"))
    }

    fn check(&self) -> UpstreamResult<()> {
        let _: Value = self.http.get_json("/api/v2/inventories/")?;
        tracing::info!("automation-inventory API reachable");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail(variables: Value) -> HostDetail {
        HostDetail {
            name: "app01".into(),
            enabled: true,
            variables,
        }
    }

    #[test]
    fn os_info_from_yaml_json_and_object_variables() {
        let yaml = detail(json!(
            "---\nansible_distribution: RedHat\nansible_distribution_version: '8.9'\n"
        ));
        assert_eq!(yaml.os_info(), "RedHat 8.9");

        let text = detail(json!(r#"{"ansible_distribution": "Ubuntu"}"#));
        assert_eq!(text.os_info(), "Ubuntu");

        let object = detail(json!({"ansible_distribution_version": "2019"}));
        assert_eq!(object.os_info(), "2019");
    }

    #[test]
    fn os_info_defaults_to_unknown() {
        assert_eq!(detail(json!("")).os_info(), UNKNOWN_OS);
        assert_eq!(detail(json!("{}")).os_info(), UNKNOWN_OS);
        assert_eq!(detail(json!("[unclosed")).os_info(), UNKNOWN_OS);
        assert_eq!(detail(Value::Null).os_info(), UNKNOWN_OS);
    }

    #[test]
    fn host_detail_defaults_enabled() {
        let d: HostDetail = serde_json::from_value(json!({"name": "db01"})).unwrap();
        assert!(d.enabled);
    }

    #[test]
    fn search_encodes_query_and_reads_results() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api/v2/inventories/?search=CODECTS_PROD")
            .with_body(r#"{"count":1,"next":null,"results":[{"id":4,"name":"CODECTS_PROD_VGPDR---BH"}]}"#)
            .create();
        let client = TowerClient::new(
            &server.url(),
            Credentials::Bearer("t".into()),
            ClientSettings::default(),
        )
        .unwrap();
        let found = client.search_inventories("CODECTS_PROD").unwrap();
        assert_eq!(found[0].name, "CODECTS_PROD_VGPDR---BH");
    }
}
