//! Tabular export of discovered servers.

use crate::error::Result;
use crate::inventory::ServerRecord;
use crate::io;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;

pub const HEADERS: [&str; 6] = [
    "Component",
    "Group Name",
    "Server Name",
    "Environment",
    "OS Information",
    "Enabled",
];

/// Servers found for one component across all of its environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentServers {
    pub component: String,
    pub servers: Vec<ServerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedTable {
    pub filename: String,
    pub path: PathBuf,
    /// Data rows, excluding the header.
    pub rows: usize,
}

/// Turns a discovery result into a downloadable file.
pub trait TableExporter {
    fn export(&self, table: &[ComponentServers]) -> Result<ExportedTable>;
}

/// Data rows in table order. A component without servers gets one row
/// carrying only its name.
pub fn table_rows(table: &[ComponentServers]) -> Vec<[String; 6]> {
    let mut rows = Vec::new();
    for entry in table {
        if entry.servers.is_empty() {
            rows.push([
                entry.component.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ]);
            continue;
        }
        for s in &entry.servers {
            rows.push([
                entry.component.clone(),
                s.group_name.clone(),
                s.server_name.clone(),
                s.environment.clone(),
                s.os_info.clone(),
                if s.enabled { "Yes" } else { "No" }.to_string(),
            ]);
        }
    }
    rows
}

fn csv_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

/// `server_inventory_<YYYYMMDD_HHMMSS>`. Exports landing in the same
/// second get a numeric suffix before the extension.
pub fn export_stem(at: DateTime<Local>) -> String {
    format!("server_inventory_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Writes RFC 4180 CSV files into one directory.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn render(table: &[ComponentServers]) -> String {
        let mut out = csv_line(&HEADERS);
        for row in table_rows(table) {
            out.push_str(&csv_line(&row));
        }
        out
    }
}

impl TableExporter for CsvExporter {
    fn export(&self, table: &[ComponentServers]) -> Result<ExportedTable> {
        self.export_at(table, Local::now())
    }
}

impl CsvExporter {
    fn export_at(&self, table: &[ComponentServers], at: DateTime<Local>) -> Result<ExportedTable> {
        let path = io::write_unique(
            &self.dir,
            &export_stem(at),
            "csv",
            Self::render(table).as_bytes(),
        )?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rows = table_rows(table).len();
        tracing::info!(path = %path.display(), rows, "server table exported");
        Ok(ExportedTable {
            filename,
            path,
            rows,
        })
    }
}
