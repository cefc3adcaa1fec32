//! In-memory upstreams for unit tests.

use crate::tower::{Group, HostDetail, HostSummary, InventoryApi, InventorySummary};
use crate::upstream::{UpstreamError, UpstreamResult};
use crate::xlr::{Folder, PhaseNode, Release, ReleaseApi, TaskNode, Variable, Variables};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Timeout,
    Status(u16),
    Transport,
}

impl Failure {
    fn into_error(self, op: &str) -> UpstreamError {
        let url = format!("fake://{op}");
        match self {
            Failure::Timeout => UpstreamError::Timeout { url },
            Failure::Status(status) => UpstreamError::Status { url, status },
            Failure::Transport => UpstreamError::Transport {
                url,
                message: "connection refused".into(),
            },
        }
    }
}

fn not_found(op: &str) -> UpstreamError {
    Failure::Status(404).into_error(op)
}

pub fn vars(pairs: &[(&str, &str)]) -> Variables {
    Variables(
        pairs
            .iter()
            .map(|(k, v)| Variable {
                key: k.to_string(),
                value: Value::String(v.to_string()),
            })
            .collect(),
    )
}

pub fn task(id: Option<&str>, title: &str, kind: &str) -> TaskNode {
    TaskNode {
        id: id.map(str::to_string),
        title: title.into(),
        kind: kind.into(),
    }
}

pub fn phase(id: Option<&str>, title: &str, tasks: Vec<TaskNode>) -> PhaseNode {
    PhaseNode {
        id: id.map(str::to_string),
        title: title.into(),
        tasks,
    }
}

// ---------------------------------------------------------------------------
// FakeReleaseApi
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeReleaseApi {
    releases: HashMap<String, Release>,
    variables: HashMap<String, Variables>,
    children: HashMap<String, Vec<TaskNode>>,
    folders: HashMap<String, Folder>,
    failures: HashMap<String, Failure>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeReleaseApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release(mut self, key: &str, release: Release) -> Self {
        self.releases.insert(key.into(), release);
        self
    }

    pub fn with_variables(mut self, key: &str, pairs: &[(&str, &str)]) -> Self {
        self.variables.insert(key.into(), vars(pairs));
        self
    }

    pub fn with_children(mut self, id: &str, titles: &[&str]) -> Self {
        let tasks = titles.iter().map(|t| task(None, t, "xlrelease.Task")).collect();
        self.children.insert(id.into(), tasks);
        self
    }

    pub fn with_folder(mut self, id: &str, title: &str) -> Self {
        self.folders.insert(
            id.into(),
            Folder {
                id: id.into(),
                title: title.into(),
            },
        );
        self
    }

    /// Make the operation `op` (`"release:<key>"`, `"variables:<key>"`,
    /// `"children:<id>"`, `"folder:<id>"`) fail.
    pub fn failing(mut self, op: &str, failure: Failure) -> Self {
        self.failures.insert(op.into(), failure);
        self
    }

    fn call(&self, op: String) -> UpstreamResult<()> {
        self.calls.borrow_mut().push(op.clone());
        match self.failures.get(&op) {
            Some(f) => Err(f.into_error(&op)),
            None => Ok(()),
        }
    }
}

impl ReleaseApi for FakeReleaseApi {
    fn release(&self, key: &str) -> UpstreamResult<Release> {
        let op = format!("release:{key}");
        self.call(op.clone())?;
        self.releases.get(key).cloned().ok_or_else(|| not_found(&op))
    }

    fn variables(&self, key: &str) -> UpstreamResult<Variables> {
        let op = format!("variables:{key}");
        self.call(op.clone())?;
        match self.variables.get(key) {
            Some(v) => Ok(v.clone()),
            None => self
                .releases
                .get(key)
                .map(|r| r.variables.clone())
                .ok_or_else(|| not_found(&op)),
        }
    }

    fn child_tasks(&self, id: &str) -> UpstreamResult<Vec<TaskNode>> {
        let op = format!("children:{id}");
        self.call(op.clone())?;
        self.children.get(id).cloned().ok_or_else(|| not_found(&op))
    }

    fn folder(&self, id: &str) -> UpstreamResult<Folder> {
        let op = format!("folder:{id}");
        self.call(op.clone())?;
        self.folders.get(id).cloned().ok_or_else(|| not_found(&op))
    }

    fn check(&self) -> UpstreamResult<()> {
        self.call("check".into())
    }
}

// ---------------------------------------------------------------------------
// FakeInventoryApi
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeInventoryApi {
    inventories: Vec<InventorySummary>,
    groups: HashMap<u64, Vec<Group>>,
    hosts: HashMap<u64, Vec<HostSummary>>,
    details: HashMap<u64, HostDetail>,
    failures: HashMap<String, Failure>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeInventoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(mut self, id: u64, name: &str, groups: &[(u64, &str)]) -> Self {
        self.inventories.push(InventorySummary {
            id,
            name: name.into(),
        });
        self.groups.insert(
            id,
            groups
                .iter()
                .map(|(gid, gname)| Group {
                    id: *gid,
                    name: gname.to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn with_hosts(mut self, group_id: u64, hosts: &[(u64, &str)]) -> Self {
        self.hosts.insert(
            group_id,
            hosts
                .iter()
                .map(|(id, name)| HostSummary {
                    id: *id,
                    name: name.to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn with_detail(mut self, host_id: u64, os: &str, enabled: bool) -> Self {
        let (dist, version) = os.split_once(' ').unwrap_or((os, ""));
        self.details.insert(
            host_id,
            HostDetail {
                name: String::new(),
                enabled,
                variables: Value::String(format!(
                    "ansible_distribution: {dist}\nansible_distribution_version: '{version}'\n"
                )),
            },
        );
        self
    }

    /// Make the operation `op` (`"search:<q>"`, `"groups:<id>"`,
    /// `"hosts:<id>"`, `"host:<id>"`) fail.
    pub fn failing(mut self, op: &str, failure: Failure) -> Self {
        self.failures.insert(op.into(), failure);
        self
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn call(&self, op: String) -> UpstreamResult<()> {
        self.calls.borrow_mut().push(op.clone());
        match self.failures.get(&op) {
            Some(f) => Err(f.into_error(&op)),
            None => Ok(()),
        }
    }
}

impl InventoryApi for FakeInventoryApi {
    fn search_inventories(&self, query: &str) -> UpstreamResult<Vec<InventorySummary>> {
        self.call(format!("search:{query}"))?;
        let q = query.to_lowercase();
        Ok(self
            .inventories
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&q))
            .cloned()
            .collect())
    }

    fn groups(&self, inventory_id: u64) -> UpstreamResult<Vec<Group>> {
        let op = format!("groups:{inventory_id}");
        self.call(op.clone())?;
        self.groups.get(&inventory_id).cloned().ok_or_else(|| not_found(&op))
    }

    fn hosts(&self, group_id: u64) -> UpstreamResult<Vec<HostSummary>> {
        let op = format!("hosts:{group_id}");
        self.call(op.clone())?;
        Ok(self.hosts.get(&group_id).cloned().unwrap_or_default())
    }

    fn host(&self, host_id: u64) -> UpstreamResult<HostDetail> {
        let op = format!("host:{host_id}");
        self.call(op.clone())?;
        self.details.get(&host_id).cloned().ok_or_else(|| not_found(&op))
    }

    fn check(&self) -> UpstreamResult<()> {
        self.call("check".into())
    }
}
