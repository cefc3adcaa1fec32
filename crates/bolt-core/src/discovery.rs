//! Component and environment discovery for one release.

use crate::layer::{resolve_first, Layer};
use crate::upstream::UpstreamResult;
use crate::xlr::{declared_variables, Release, ReleaseApi, Variables, PARALLEL_GROUP};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Environments assumed when nothing upstream names any.
pub const DEFAULT_ENVIRONMENTS: &[&str] = &["DEV", "TEST", "PROD"];

/// Keywords recognized in sub-task titles, in match priority order.
pub const ENV_KEYWORDS: &[&str] = &[
    "DEV",
    "TEST",
    "QA",
    "UAT",
    "STAGING",
    "PROD",
    "PRODUCTION",
    "LLE",
];

static ENV_SPLIT_RE: OnceLock<Regex> = OnceLock::new();

fn env_split_re() -> &'static Regex {
    ENV_SPLIT_RE.get_or_init(|| Regex::new(r"[,;\s]+").unwrap())
}

// ---------------------------------------------------------------------------
// ComponentRecord
// ---------------------------------------------------------------------------

/// Where a component id came from. Only upstream ids can be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentId {
    Upstream(String),
    Synthetic(String),
}

impl ComponentId {
    pub fn as_str(&self) -> &str {
        match self {
            ComponentId::Upstream(id) | ComponentId::Synthetic(id) => id,
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRecord {
    pub id: Option<ComponentId>,
    pub name: String,
    pub environments: Vec<String>,
}

impl ComponentRecord {
    pub fn new(id: Option<ComponentId>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            environments: Vec::new(),
        }
    }
}

/// Release document and its variables, fetched once per lookup.
struct ReleaseView {
    release: Release,
    variables: Variables,
}

/// `None` when the release cannot be read for any reason but a timeout.
fn load_release(api: &dyn ReleaseApi, key: &str) -> UpstreamResult<Option<ReleaseView>> {
    let release = match api.release(key) {
        Ok(r) => r,
        Err(e) if e.is_timeout() => return Err(e),
        Err(e) => {
            tracing::warn!(key, error = %e, "release unavailable");
            return Ok(None);
        }
    };
    let variables = declared_variables(api, key, &release)?;
    Ok(Some(ReleaseView { release, variables }))
}

// ---------------------------------------------------------------------------
// list_components
// ---------------------------------------------------------------------------

fn strip_component_word(title: &str) -> String {
    title
        .replace("Component", "")
        .replace("component", "")
        .trim()
        .to_string()
}

fn components_from_variable(view: &ReleaseView) -> UpstreamResult<Option<Vec<ComponentRecord>>> {
    let Some(value) = view.variables.text("releaseComponents") else {
        return Ok(None);
    };
    // First token is the SPK.
    let components: Vec<ComponentRecord> = value
        .split_whitespace()
        .skip(1)
        .enumerate()
        .map(|(i, name)| {
            ComponentRecord::new(Some(ComponentId::Synthetic(format!("component_{i}"))), name)
        })
        .collect();
    Ok((!components.is_empty()).then_some(components))
}

fn components_from_phases(view: &ReleaseView) -> UpstreamResult<Option<Vec<ComponentRecord>>> {
    let mut components = Vec::new();
    for phase in &view.release.phases {
        if phase.title.to_lowercase().contains("component") {
            let name = strip_component_word(&phase.title);
            if !name.is_empty() {
                components.push(ComponentRecord::new(
                    phase.id.clone().map(ComponentId::Upstream),
                    name,
                ));
            }
        }
        for task in phase.tasks.iter().filter(|t| t.kind == PARALLEL_GROUP) {
            let looks_like_component = task.title.to_lowercase().contains("component")
                || task.title.chars().next().is_some_and(char::is_uppercase);
            if !looks_like_component {
                continue;
            }
            let name = strip_component_word(&task.title);
            if !name.is_empty() {
                components.push(ComponentRecord::new(
                    task.id.clone().map(ComponentId::Upstream),
                    name,
                ));
            }
        }
    }
    Ok((!components.is_empty()).then_some(components))
}

/// Components of the release `release_key`, in discovery order.
///
/// An unreadable release yields an empty list; timeouts are returned.
pub fn list_components(
    api: &dyn ReleaseApi,
    release_key: &str,
) -> UpstreamResult<Vec<ComponentRecord>> {
    let Some(view) = load_release(api, release_key)? else {
        return Ok(Vec::new());
    };
    let layers: [Layer<ReleaseView, Vec<ComponentRecord>>; 2] = [
        Layer {
            id: "release-components-variable",
            resolve: components_from_variable,
        },
        Layer {
            id: "phase-scan",
            resolve: components_from_phases,
        },
    ];
    let components = resolve_first(&layers, &view)?.unwrap_or_default();
    tracing::info!(count = components.len(), release_key, "components discovered");
    Ok(components)
}

// ---------------------------------------------------------------------------
// attach_environments
// ---------------------------------------------------------------------------

/// Parse an `integratedReleaseEnvironments` value: split on commas,
/// semicolons and whitespace, upper-case, drop duplicates.
pub fn parse_environment_list(value: &str) -> Vec<String> {
    let mut envs: Vec<String> = Vec::new();
    for token in env_split_re().split(value) {
        let env = token.trim().to_uppercase();
        if !env.is_empty() && !envs.contains(&env) {
            envs.push(env);
        }
    }
    envs
}

/// Environment keywords named by sub-task titles. Each title contributes
/// its first keyword not already collected.
pub fn environments_from_titles<'a>(titles: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut envs: Vec<String> = Vec::new();
    for title in titles {
        let title = title.to_uppercase();
        if let Some(kw) = ENV_KEYWORDS
            .iter()
            .find(|kw| title.contains(*kw) && !envs.iter().any(|e| e == *kw))
        {
            envs.push(kw.to_string());
        }
    }
    envs
}

fn task_environments(
    api: &dyn ReleaseApi,
    component: &ComponentRecord,
) -> UpstreamResult<Vec<String>> {
    let Some(ComponentId::Upstream(id)) = &component.id else {
        return Ok(Vec::new());
    };
    match api.child_tasks(id) {
        Ok(tasks) => Ok(environments_from_titles(tasks.iter().map(|t| t.title.as_str()))),
        Err(e) if e.is_timeout() => Err(e),
        Err(e) => {
            tracing::warn!(component = %component.name, error = %e, "sub-task lookup failed");
            Ok(Vec::new())
        }
    }
}

/// Give every component a non-empty environment list.
///
/// A release-wide `integratedReleaseEnvironments` variable wins; otherwise
/// each component's sub-task titles are scanned, and
/// [`DEFAULT_ENVIRONMENTS`] fills whatever is still empty.
pub fn attach_environments(
    api: &dyn ReleaseApi,
    mut components: Vec<ComponentRecord>,
    release_key: Option<&str>,
) -> UpstreamResult<Vec<ComponentRecord>> {
    if components.is_empty() {
        return Ok(components);
    }

    if let Some(key) = release_key {
        let shared = load_release(api, key)?
            .and_then(|view| view.variables.text("integratedReleaseEnvironments"))
            .map(|v| parse_environment_list(&v))
            .filter(|envs| !envs.is_empty());
        if let Some(envs) = shared {
            tracing::info!(environments = ?envs, "release-wide environments applied");
            for component in &mut components {
                component.environments = envs.clone();
            }
            return Ok(components);
        }
    }

    for component in &mut components {
        let mut envs = task_environments(api, component)?;
        if envs.is_empty() {
            tracing::info!(component = %component.name, "using default environments");
            envs = DEFAULT_ENVIRONMENTS.iter().map(|e| e.to_string()).collect();
        }
        component.environments = envs;
    }
    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{phase, task, Failure, FakeReleaseApi};

    fn names(components: &[ComponentRecord]) -> Vec<&str> {
        components.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn release_components_variable_drops_spk_token() {
        let api = FakeReleaseApi::new()
            .with_release("Release1", Release::default())
            .with_variables("Release1", &[("releaseComponents", "SPK99 svcA svcB")]);
        let components = list_components(&api, "Release1").unwrap();
        assert_eq!(names(&components), vec!["svcA", "svcB"]);
        assert_eq!(
            components[1].id,
            Some(ComponentId::Synthetic("component_1".into()))
        );
    }

    #[test]
    fn phase_scan_when_variable_has_only_spk() {
        let release = Release {
            phases: vec![
                phase(Some("Phase1"), "Payments Component", vec![]),
                phase(
                    Some("Phase2"),
                    "Deploy",
                    vec![
                        task(Some("Task1"), "Ledger", PARALLEL_GROUP),
                        task(Some("Task2"), "notify component", PARALLEL_GROUP),
                        task(Some("Task3"), "cleanup", PARALLEL_GROUP),
                        task(Some("Task4"), "Gate", "xlrelease.GateTask"),
                    ],
                ),
            ],
            ..Release::default()
        };
        let api = FakeReleaseApi::new()
            .with_release("Release1", release)
            .with_variables("Release1", &[("releaseComponents", "SPK99")]);
        let components = list_components(&api, "Release1").unwrap();
        assert_eq!(names(&components), vec!["Payments", "Ledger", "notify"]);
        assert_eq!(components[0].id, Some(ComponentId::Upstream("Phase1".into())));
    }

    #[test]
    fn unreadable_release_yields_no_components() {
        let api = FakeReleaseApi::new();
        assert!(list_components(&api, "table").unwrap().is_empty());

        let api = FakeReleaseApi::new().failing("release:Release1", Failure::Timeout);
        assert!(list_components(&api, "Release1").unwrap_err().is_timeout());
    }

    #[test]
    fn environment_list_parsing() {
        assert_eq!(
            parse_environment_list("dev, qa;PROD  dev"),
            vec!["DEV", "QA", "PROD"]
        );
        assert!(parse_environment_list(" ,; ").is_empty());
    }

    #[test]
    fn title_scan_takes_first_new_keyword() {
        let envs = environments_from_titles([
            "Deploy to dev",
            "Smoke test DEV",
            "Release to PRODUCTION",
            "Production sign-off",
            "Notify",
        ]);
        assert_eq!(envs, vec!["DEV", "TEST", "PROD", "PRODUCTION"]);
    }

    #[test]
    fn shared_environments_apply_to_every_component() {
        let api = FakeReleaseApi::new()
            .with_release("Release1", Release::default())
            .with_variables("Release1", &[("integratedReleaseEnvironments", "uat,prod")]);
        let components = vec![
            ComponentRecord::new(None, "a"),
            ComponentRecord::new(Some(ComponentId::Upstream("Phase1".into())), "b"),
        ];
        let out = attach_environments(&api, components, Some("Release1")).unwrap();
        for c in &out {
            assert_eq!(c.environments, vec!["UAT", "PROD"]);
        }
        assert!(!api.calls.borrow().iter().any(|c| c.starts_with("children:")));
    }

    #[test]
    fn task_scan_then_defaults() {
        let api = FakeReleaseApi::new()
            .with_release("Release1", Release::default())
            .with_children("Phase1", &["Deploy QA", "Deploy Staging"])
            .failing("children:Phase2", Failure::Status(500));
        let components = vec![
            ComponentRecord::new(Some(ComponentId::Upstream("Phase1".into())), "a"),
            ComponentRecord::new(Some(ComponentId::Upstream("Phase2".into())), "b"),
            ComponentRecord::new(Some(ComponentId::Synthetic("component_0".into())), "c"),
        ];
        let out = attach_environments(&api, components, Some("Release1")).unwrap();
        assert_eq!(out[0].environments, vec!["QA", "STAGING"]);
        assert_eq!(out[1].environments, DEFAULT_ENVIRONMENTS);
        assert_eq!(out[2].environments, DEFAULT_ENVIRONMENTS);
        assert!(!api.calls.borrow().contains(&"children:component_0".to_string()));
    }

    #[test]
    fn every_component_ends_with_environments() {
        let api = FakeReleaseApi::new();
        let components = vec![ComponentRecord::new(None, "a")];
        let out = attach_environments(&api, components, None).unwrap();
        assert!(out.iter().all(|c| !c.environments.is_empty()));
    }

    #[test]
    fn sub_task_timeout_is_returned() {
        let api = FakeReleaseApi::new().failing("children:Phase1", Failure::Timeout);
        let components = vec![ComponentRecord::new(
            Some(ComponentId::Upstream("Phase1".into())),
            "a",
        )];
        assert!(attach_environments(&api, components, None)
            .unwrap_err()
            .is_timeout());
    }
}
