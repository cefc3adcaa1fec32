use crate::cmd::upstream::UpstreamArgs;
use crate::output::{print_table, Column};
use bolt_core::export::{table_rows, CsvExporter, HEADERS};
use bolt_core::pipeline::{EventStatus, Pipeline, PipelineOutcome, ProgressEvent, Stage};
use std::path::Path;

/// OS strings wider than this are cut in the terminal table; the export keeps them whole.
const OS_COLUMN_WIDTH: usize = 32;

fn server_columns() -> [Column<'static>; 6] {
    [
        Column::left(HEADERS[0]),
        Column::left(HEADERS[1]),
        Column::left(HEADERS[2]),
        Column::left(HEADERS[3]),
        Column::left(HEADERS[4]).truncate(OS_COLUMN_WIDTH),
        Column::right(HEADERS[5]),
    ]
}

pub fn run(root: &Path, reference: &str, upstream: &UpstreamArgs, json: bool) -> anyhow::Result<()> {
    let (config, connection) = upstream.connect(root)?;
    let exporter = CsvExporter::new(config.export_dir(root));
    let pipeline = Pipeline::new(&connection.releases, &connection.inventories, &exporter);

    // JSON mode streams one event per line, the same payloads the SSE endpoint sends.
    let mut sink = |event: ProgressEvent| {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "unserializable event"),
            }
        } else {
            eprintln!("{}", render_event(&event));
        }
        true
    };

    match pipeline.run(reference, &mut sink) {
        PipelineOutcome::Completed { export, table } => {
            if !json {
                let rows: Vec<Vec<String>> = table_rows(&table)
                    .into_iter()
                    .map(|row| row.to_vec())
                    .collect();
                print_table(&server_columns(), &rows);
                println!();
                println!("Exported {} rows to {}", export.rows, export.path.display());
            }
            Ok(())
        }
        PipelineOutcome::Failed { stage, message, .. } => {
            anyhow::bail!("{stage} failed: {message}")
        }
        PipelineOutcome::Cancelled | PipelineOutcome::Disconnected => {
            anyhow::bail!("discovery stopped before completion")
        }
    }
}

fn render_event(event: &ProgressEvent) -> String {
    let marker = match event.status {
        EventStatus::InProgress => "..",
        EventStatus::Complete => "ok",
        EventStatus::Warning => "!!",
        EventStatus::Error => "XX",
    };
    let mut line = format!(
        "[{}/{}] {marker} {}",
        event.step,
        Stage::ALL.len(),
        event.message
    );
    if let Some(p) = event.progress {
        line.push_str(&format!(" ({p:.0}%)"));
    }
    line
}
