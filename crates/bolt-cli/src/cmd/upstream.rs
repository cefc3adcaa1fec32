use anyhow::Context;
use bolt_core::config::Config;
use bolt_core::connection::{Connection, Endpoints, UpstreamCredentials};
use bolt_core::upstream::Credentials;
use clap::Args;
use std::path::Path;

/// Upstream URLs and credentials shared by `discover` and `check`.
///
/// The same credentials are sent to both APIs.
#[derive(Args, Debug, Clone)]
pub struct UpstreamArgs {
    /// Release API base URL (overrides `xlr_url` in bolt.yaml)
    #[arg(long, env = "BOLT_XLR_URL")]
    pub xlr_url: Option<String>,

    /// Inventory API base URL (overrides `tower_url` in bolt.yaml)
    #[arg(long, env = "BOLT_TOWER_URL")]
    pub tower_url: Option<String>,

    #[arg(long, env = "BOLT_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "BOLT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Bearer token; takes precedence over username/password
    #[arg(long, env = "BOLT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl UpstreamArgs {
    pub fn credentials(&self) -> anyhow::Result<Credentials> {
        Credentials::from_parts(
            self.username.clone(),
            self.password.clone(),
            self.token.clone(),
        )
        .context("credentials required: pass --username and --password, or --token")
    }

    /// Load config from `root` and open authenticated clients for both APIs.
    pub fn connect(&self, root: &Path) -> anyhow::Result<(Config, Connection)> {
        let config = Config::load(root).context("failed to load config")?;
        let credentials = UpstreamCredentials::shared(self.credentials()?);
        let endpoints = Endpoints::resolve(&config, self.xlr_url.as_deref(), self.tower_url.as_deref());
        let connection = Connection::open(&endpoints, &credentials, &config)
            .context("failed to create API clients")?;
        Ok((config, connection))
    }
}
