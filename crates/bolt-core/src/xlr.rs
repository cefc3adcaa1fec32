//! Change-management (XL Release) API client.

use crate::upstream::{
    ClientSettings, Credentials, HttpClient, UpstreamError, UpstreamResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task type of parallel groups, which often stand for one component each.
pub const PARALLEL_GROUP: &str = "xlrelease.ParallelGroup";

const CHECK_ENDPOINTS: &[&str] = &[
    "/api/v1/releases",
    "/api/v1/templates",
    "/api/v1/folders",
    "/api/v1/config/templates",
];

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Variable {
    /// The value as text; empty and null values yield `None`.
    pub fn text(&self) -> Option<String> {
        let text = match &self.value {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join(" "),
            other => other.to_string(),
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Declared variables of one release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(pub Vec<Variable>);

impl Variables {
    pub fn text(&self, key: &str) -> Option<String> {
        self.0.iter().find(|v| v.key == key).and_then(Variable::text)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<TaskNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseFolder {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variables: Variables,
    #[serde(default)]
    pub phases: Vec<PhaseNode>,
    #[serde(default)]
    pub folder: Option<ReleaseFolder>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Deserialize)]
struct TaskContainer {
    #[serde(default)]
    tasks: Vec<TaskNode>,
}

// ---------------------------------------------------------------------------
// ReleaseApi
// ---------------------------------------------------------------------------

/// What discovery needs from the change-management system.
pub trait ReleaseApi {
    fn release(&self, key: &str) -> UpstreamResult<Release>;
    fn variables(&self, key: &str) -> UpstreamResult<Variables>;
    /// Sub-tasks of a task or phase.
    fn child_tasks(&self, id: &str) -> UpstreamResult<Vec<TaskNode>>;
    fn folder(&self, id: &str) -> UpstreamResult<Folder>;
    /// Succeeds when the credentials are accepted.
    fn check(&self) -> UpstreamResult<()>;
}

/// Variables of `release`, preferring the dedicated endpoint and falling back
/// to the copy embedded in the release document.
pub fn declared_variables(
    api: &dyn ReleaseApi,
    key: &str,
    release: &Release,
) -> UpstreamResult<Variables> {
    match api.variables(key) {
        Ok(vars) if !vars.is_empty() => Ok(vars),
        Ok(_) => Ok(release.variables.clone()),
        Err(e) if e.is_timeout() => Err(e),
        Err(e) => {
            tracing::warn!(key, error = %e, "variables unavailable, using release document");
            Ok(release.variables.clone())
        }
    }
}

pub struct XlrClient {
    http: HttpClient,
}

impl XlrClient {
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

impl ReleaseApi for XlrClient {
    fn release(&self, key: &str) -> UpstreamResult<Release> {
        self.http.get_json(&format!("/api/v1/releases/{key}"))
    }

    fn variables(&self, key: &str) -> UpstreamResult<Variables> {
        match self
            .http
            .get_json::<Variables>(&format!("/api/v1/releases/{key}/variables"))
        {
            Err(e) if e.status() == Some(404) => {
                tracing::debug!(key, "variables endpoint missing, reading release document");
                Ok(self.release(key)?.variables)
            }
            other => other,
        }
    }

    fn child_tasks(&self, id: &str) -> UpstreamResult<Vec<TaskNode>> {
        let as_task = self.http.get_json::<TaskContainer>(&format!("/api/v1/tasks/{id}"));
        let container = match as_task {
            Ok(c) => c,
            Err(e) if e.is_timeout() => return Err(e),
            Err(_) => self
                .http
                .get_json::<TaskContainer>(&format!("/api/v1/phases/{id}"))?,
        };
        Ok(container.tasks)
    }

    fn folder(&self, id: &str) -> UpstreamResult<Folder> {
        self.http.get_json(&format!("/api/v1/folders/{id}"))
    }

    fn check(&self) -> UpstreamResult<()> {
        let mut last = None;
        for endpoint in CHECK_ENDPOINTS {
            let status = self.http.get_status(endpoint)?;
            if status == 200 {
                tracing::info!(endpoint, "change-management API reachable");
                return Ok(());
            }
            tracing::debug!(endpoint, status, "connectivity check rejected");
            last = Some(UpstreamError::Status {
                url: self.http.url(endpoint),
                status,
            });
        }
        Err(last.unwrap_or_else(|| UpstreamError::Transport {
            url: self.http.base_url().to_string(),
            message: "no check endpoints".into(),
        }))
    }
}
