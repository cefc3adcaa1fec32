//! Staged discovery pipeline with streamed progress events.
//!
//! Stages run strictly in order. Each one reports `in-progress` and then
//! either `complete` or `error`; an error ends the run. Events are pushed
//! into an [`EventSink`] as they happen, and the run stops as soon as the
//! sink reports its consumer gone or the [`CancelFlag`] is raised.

use crate::cache::InventoryCache;
use crate::discovery::{attach_environments, list_components, ComponentRecord};
use crate::export::{ComponentServers, ExportedTable, TableExporter};
use crate::inventory::{find_inventories_cached, find_servers, InventoryRecord};
use crate::metadata::{extract_release_metadata, ReleaseMetadata};
use crate::reference::{decode_reference, extract_release_key};
use crate::tower::InventoryApi;
use crate::upstream::UpstreamError;
use crate::xlr::ReleaseApi;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress is reported every this many (component, environment) pairs.
const PROGRESS_EVERY: usize = 5;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractComponents,
    AttachEnvironments,
    ExtractSpkOrg,
    ResolveInventories,
    ResolveServers,
    ExportTable,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::ExtractComponents,
        Stage::AttachEnvironments,
        Stage::ExtractSpkOrg,
        Stage::ResolveInventories,
        Stage::ResolveServers,
        Stage::ExportTable,
    ];

    /// 1-based position in the run.
    pub fn step(self) -> u8 {
        match self {
            Stage::ExtractComponents => 1,
            Stage::AttachEnvironments => 2,
            Stage::ExtractSpkOrg => 3,
            Stage::ResolveInventories => 4,
            Stage::ResolveServers => 5,
            Stage::ExportTable => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ExtractComponents => "extract_components",
            Stage::AttachEnvironments => "attach_environments",
            Stage::ExtractSpkOrg => "extract_spk_org",
            Stage::ResolveInventories => "resolve_inventories",
            Stage::ResolveServers => "resolve_servers",
            Stage::ExportTable => "export_table",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    InProgress,
    Complete,
    Error,
    Warning,
}

/// Failure taxonomy attached to `error` and `warning` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputFormat,
    UpstreamUnavailable,
    NotFound,
    PartialData,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: u8,
    pub stage: Stage,
    pub status: EventStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Percentage of (component, environment) pairs processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub download_ready: bool,
}

impl ProgressEvent {
    pub fn new(stage: Stage, status: EventStatus, message: impl Into<String>) -> Self {
        Self {
            step: stage.step(),
            stage,
            status,
            message: message.into(),
            kind: None,
            progress: None,
            filename: None,
            download_ready: false,
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

// ---------------------------------------------------------------------------
// EventSink / CancelFlag
// ---------------------------------------------------------------------------

/// Consumer of progress events. `emit` returns `false` once the consumer is
/// gone, and the pipeline stops emitting from then on.
pub trait EventSink {
    fn emit(&mut self, event: ProgressEvent) -> bool;
}

impl<F: FnMut(ProgressEvent) -> bool> EventSink for F {
    fn emit(&mut self, event: ProgressEvent) -> bool {
        self(event)
    }
}

/// Cooperative cancellation, checked between stages and between
/// (component, environment) pairs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed {
        export: ExportedTable,
        table: Vec<ComponentServers>,
    },
    Failed {
        stage: Stage,
        kind: Option<ErrorKind>,
        message: String,
    },
    Cancelled,
    Disconnected,
}

enum Halt {
    Failed {
        stage: Stage,
        kind: Option<ErrorKind>,
        message: String,
    },
    Cancelled,
    Disconnected,
}

struct Emitter<'s> {
    sink: &'s mut dyn EventSink,
    cancel: CancelFlag,
}

impl Emitter<'_> {
    fn send(&mut self, event: ProgressEvent) -> Result<(), Halt> {
        if self.sink.emit(event) {
            Ok(())
        } else {
            tracing::info!("event consumer disconnected, stopping pipeline");
            Err(Halt::Disconnected)
        }
    }

    fn start(&mut self, stage: Stage, message: impl Into<String>) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        self.send(ProgressEvent::new(stage, EventStatus::InProgress, message))
    }

    fn complete(&mut self, stage: Stage, message: impl Into<String>) -> Result<(), Halt> {
        self.send(ProgressEvent::new(stage, EventStatus::Complete, message))
    }

    fn warn(&mut self, stage: Stage, message: impl Into<String>) -> Result<(), Halt> {
        let message = message.into();
        tracing::warn!(%stage, "{message}");
        self.send(
            ProgressEvent::new(stage, EventStatus::Warning, message)
                .with_kind(ErrorKind::PartialData),
        )
    }

    /// Emit the terminal error event and build the matching halt.
    fn fail(&mut self, stage: Stage, kind: Option<ErrorKind>, message: impl Into<String>) -> Halt {
        let message = message.into();
        tracing::error!(%stage, "{message}");
        let mut event = ProgressEvent::new(stage, EventStatus::Error, message.clone());
        event.kind = kind;
        if let Err(halt) = self.send(event) {
            return halt;
        }
        Halt::Failed {
            stage,
            kind,
            message,
        }
    }

    fn upstream(&mut self, stage: Stage, err: UpstreamError) -> Halt {
        self.fail(
            stage,
            Some(ErrorKind::UpstreamUnavailable),
            format!("Upstream request failed: {err}"),
        )
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    releases: &'a dyn ReleaseApi,
    inventories: &'a dyn InventoryApi,
    exporter: &'a dyn TableExporter,
    cache: Option<&'a InventoryCache>,
    cancel: CancelFlag,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        releases: &'a dyn ReleaseApi,
        inventories: &'a dyn InventoryApi,
        exporter: &'a dyn TableExporter,
    ) -> Self {
        Self {
            releases,
            inventories,
            exporter,
            cache: None,
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_cache(mut self, cache: Option<&'a InventoryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every stage for `reference`, pushing events into `sink`.
    pub fn run(&self, reference: &str, sink: &mut dyn EventSink) -> PipelineOutcome {
        let mut out = Emitter {
            sink,
            cancel: self.cancel.clone(),
        };
        match self.stages(reference, &mut out) {
            Ok((export, table)) => PipelineOutcome::Completed { export, table },
            Err(Halt::Failed {
                stage,
                kind,
                message,
            }) => PipelineOutcome::Failed {
                stage,
                kind,
                message,
            },
            Err(Halt::Cancelled) => {
                tracing::info!("pipeline cancelled");
                PipelineOutcome::Cancelled
            }
            Err(Halt::Disconnected) => PipelineOutcome::Disconnected,
        }
    }

    fn stages(
        &self,
        reference: &str,
        out: &mut Emitter<'_>,
    ) -> Result<(ExportedTable, Vec<ComponentServers>), Halt> {
        let reference = decode_reference(reference);
        if reference.is_empty() {
            return Err(out.fail(
                Stage::ExtractComponents,
                Some(ErrorKind::InputFormat),
                "A release train reference is required.",
            ));
        }
        let release_key = extract_release_key(&reference);

        let components = self.extract_components(&release_key, out)?;
        let components = self.attach_environments(components, &release_key, out)?;
        let metadata = self.extract_spk_org(&reference, out)?;
        let spk = metadata.spk.as_deref().unwrap_or_default();
        let inventories = self.resolve_inventories(spk, metadata.org_tag.as_deref(), out)?;
        let table = self.resolve_servers(&components, &inventories, out)?;
        let export = self.export_table(&table, out)?;
        Ok((export, table))
    }

    fn extract_components(
        &self,
        release_key: &str,
        out: &mut Emitter<'_>,
    ) -> Result<Vec<ComponentRecord>, Halt> {
        let stage = Stage::ExtractComponents;
        out.start(stage, "Retrieving components from the release...")?;
        let components =
            list_components(self.releases, release_key).map_err(|e| out.upstream(stage, e))?;
        if components.is_empty() {
            return Err(out.fail(
                stage,
                Some(ErrorKind::NotFound),
                format!(
                    "No components found for release {release_key}. \
                     Check the release train reference and try again."
                ),
            ));
        }
        out.complete(stage, format!("Retrieved {} components", components.len()))?;
        Ok(components)
    }

    fn attach_environments(
        &self,
        components: Vec<ComponentRecord>,
        release_key: &str,
        out: &mut Emitter<'_>,
    ) -> Result<Vec<ComponentRecord>, Halt> {
        let stage = Stage::AttachEnvironments;
        out.start(stage, "Retrieving environments for components...")?;
        let components = attach_environments(self.releases, components, Some(release_key))
            .map_err(|e| out.upstream(stage, e))?;
        if components.iter().all(|c| c.environments.is_empty()) {
            return Err(out.fail(
                stage,
                Some(ErrorKind::NotFound),
                "No environments found for any component.",
            ));
        }
        out.complete(
            stage,
            format!("Retrieved environments for {} components", components.len()),
        )?;
        Ok(components)
    }

    fn extract_spk_org(
        &self,
        reference: &str,
        out: &mut Emitter<'_>,
    ) -> Result<ReleaseMetadata, Halt> {
        let stage = Stage::ExtractSpkOrg;
        out.start(stage, "Identifying the service package key...")?;
        let metadata =
            extract_release_metadata(self.releases, reference).map_err(|e| out.upstream(stage, e))?;
        let Some(spk) = metadata.spk.as_deref() else {
            return Err(out.fail(
                stage,
                Some(ErrorKind::NotFound),
                "Could not determine the SPK from the release or its reference.",
            ));
        };
        let message = match metadata.org_tag.as_deref() {
            Some(org) => format!("Extracted SPK: {spk} (Organization: {org})"),
            None => format!("Extracted SPK: {spk}"),
        };
        out.complete(stage, message)?;
        Ok(metadata)
    }

    fn resolve_inventories(
        &self,
        spk: &str,
        org_tag: Option<&str>,
        out: &mut Emitter<'_>,
    ) -> Result<Vec<InventoryRecord>, Halt> {
        let stage = Stage::ResolveInventories;
        out.start(stage, format!("Searching inventories for SPK: {spk}..."))?;
        let inventories = find_inventories_cached(self.inventories, self.cache, spk, org_tag)
            .map_err(|e| out.upstream(stage, e))?;
        if inventories.is_empty() {
            return Err(out.fail(
                stage,
                Some(ErrorKind::NotFound),
                format!("No inventories found for SPK: {spk}."),
            ));
        }
        out.complete(
            stage,
            format!("Found {} inventories for SPK: {spk}", inventories.len()),
        )?;
        Ok(inventories)
    }

    fn resolve_servers(
        &self,
        components: &[ComponentRecord],
        inventories: &[InventoryRecord],
        out: &mut Emitter<'_>,
    ) -> Result<Vec<ComponentServers>, Halt> {
        let stage = Stage::ResolveServers;
        out.start(stage, "Resolving servers for each component and environment...")?;

        let total: usize = components.iter().map(|c| c.environments.len()).sum();
        let mut completed = 0;
        let mut table = Vec::with_capacity(components.len());
        for component in components {
            let mut servers = Vec::new();
            for env in &component.environments {
                if self.cancel.is_cancelled() {
                    return Err(Halt::Cancelled);
                }
                let found = find_servers(self.inventories, &component.name, env, inventories)
                    .map_err(|e| out.upstream(stage, e))?;
                servers.extend(found);
                completed += 1;
                if completed % PROGRESS_EVERY == 0 || completed == total {
                    let mut event = ProgressEvent::new(
                        stage,
                        EventStatus::InProgress,
                        format!("Processed {completed}/{total} component environments"),
                    );
                    event.progress = Some(completed as f64 * 100.0 / total as f64);
                    out.send(event)?;
                }
            }
            table.push(ComponentServers {
                component: component.name.clone(),
                servers,
            });
        }

        let empty: Vec<&str> = table
            .iter()
            .filter(|c| c.servers.is_empty())
            .map(|c| c.component.as_str())
            .collect();
        if empty.len() == table.len() {
            out.warn(
                stage,
                "No servers found for any component. The table will list component names only.",
            )?;
        } else if !empty.is_empty() {
            out.warn(stage, format!("No servers found for: {}", empty.join(", ")))?;
        }
        let found: usize = table.iter().map(|c| c.servers.len()).sum();
        out.complete(stage, format!("Resolved {found} servers"))?;
        Ok(table)
    }

    fn export_table(
        &self,
        table: &[ComponentServers],
        out: &mut Emitter<'_>,
    ) -> Result<ExportedTable, Halt> {
        let stage = Stage::ExportTable;
        out.start(stage, "Writing the server table...")?;
        let export = self
            .exporter
            .export(table)
            .map_err(|e| out.fail(stage, None, format!("Could not write the server table: {e}")))?;
        let mut event = ProgressEvent::new(
            stage,
            EventStatus::Complete,
            format!("Server table ready: {}", export.filename),
        );
        event.filename = Some(export.filename.clone());
        event.download_ready = true;
        out.send(event)?;
        Ok(export)
    }
}
