use crate::config::Config;
use crate::error::{BoltError, Result};
use crate::tower::{InventoryApi, TowerClient};
use crate::upstream::{ClientSettings, Credentials};
use crate::xlr::{ReleaseApi, XlrClient};
use serde::{Deserialize, Serialize};

/// Base URLs of the two upstream systems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub xlr_url: String,
    pub tower_url: String,
}

impl Endpoints {
    /// Explicit URLs win over the configured ones.
    pub fn resolve(config: &Config, xlr_url: Option<&str>, tower_url: Option<&str>) -> Self {
        let pick = |explicit: Option<&str>, configured: &str| {
            explicit
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .unwrap_or(configured)
                .to_string()
        };
        Self {
            xlr_url: pick(xlr_url, &config.xlr_url),
            tower_url: pick(tower_url, &config.tower_url),
        }
    }

    pub fn require(&self) -> Result<()> {
        if self.xlr_url.is_empty() || self.tower_url.is_empty() {
            return Err(BoltError::InputFormat(
                "both xlr_url and tower_url are required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub xlr_status: bool,
    pub tower_status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xlr_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_error: Option<String>,
}

impl ConnectionStatus {
    pub fn is_ok(&self) -> bool {
        self.xlr_status && self.tower_status
    }

    /// Which side failed, phrased for the user. `None` when both succeeded.
    pub fn failure_message(&self) -> Option<String> {
        match (self.xlr_status, self.tower_status) {
            (true, true) => None,
            (false, true) => Some(
                "Connected to the inventory API but the release API rejected the connection. \
                 Check the release URL and credentials."
                    .into(),
            ),
            (true, false) => Some(
                "Connected to the release API but the inventory API rejected the connection. \
                 Check the inventory URL and credentials."
                    .into(),
            ),
            (false, false) => Some(
                "Could not connect to either API. Check both URLs and the credentials.".into(),
            ),
        }
    }
}

/// Check both upstreams. Never fails; errors are folded into the status.
pub fn check_connections(
    releases: &dyn ReleaseApi,
    inventories: &dyn InventoryApi,
) -> ConnectionStatus {
    let xlr = releases.check();
    let tower = inventories.check();
    ConnectionStatus {
        xlr_status: xlr.is_ok(),
        tower_status: tower.is_ok(),
        xlr_error: xlr.err().map(|e| e.to_string()),
        tower_error: tower.err().map(|e| e.to_string()),
    }
}

/// Credentials for each upstream. Most callers use one login for both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamCredentials {
    pub releases: Credentials,
    pub inventories: Credentials,
}

impl UpstreamCredentials {
    pub fn shared(credentials: Credentials) -> Self {
        Self {
            releases: credentials.clone(),
            inventories: credentials,
        }
    }
}

/// Authenticated clients for both upstreams.
pub struct Connection {
    pub releases: XlrClient,
    pub inventories: TowerClient,
}

impl Connection {
    pub fn open(
        endpoints: &Endpoints,
        credentials: &UpstreamCredentials,
        config: &Config,
    ) -> Result<Self> {
        endpoints.require()?;
        let settings = ClientSettings::from(config);
        Ok(Self {
            releases: XlrClient::new(
                &endpoints.xlr_url,
                credentials.releases.clone(),
                settings.clone(),
            )?,
            inventories: TowerClient::new(
                &endpoints.tower_url,
                credentials.inventories.clone(),
                settings,
            )?,
        })
    }

    pub fn check(&self) -> ConnectionStatus {
        check_connections(&self.releases, &self.inventories)
    }
}
