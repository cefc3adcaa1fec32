use crate::output::print_json;
use anyhow::Context;
use bolt_core::descriptor::{
    descriptor_filename, normalize_descriptor_file, write_descriptor, DescriptorRequest,
};
use bolt_core::types::Platform;
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum DescriptorSubcommand {
    /// Synthesize a release-train descriptor and write it to disk
    Create {
        /// Application inventory id
        #[arg(long)]
        ait: String,
        /// Service package key
        #[arg(long)]
        spk: String,
        /// Ops ticket number
        #[arg(long = "ops")]
        ops_number: String,
        /// Train type, e.g. Minor or Major
        #[arg(long)]
        train_type: String,
        /// Release date as YYYY.MM.DD
        #[arg(long)]
        release_date: String,
        /// Comma-separated component names
        #[arg(long)]
        components: String,
        /// Comma-separated environment names
        #[arg(long)]
        environments: String,
        /// structured or standard
        #[arg(long, default_value = "standard")]
        platform: Platform,
        /// Output directory (default: project root)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Parse an existing descriptor and rewrite it in canonical form
    Import {
        /// Descriptor JSON file
        file: PathBuf,
    },
}

pub fn run(root: &Path, subcmd: DescriptorSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DescriptorSubcommand::Create {
            ait,
            spk,
            ops_number,
            train_type,
            release_date,
            components,
            environments,
            platform,
            out,
        } => {
            let req = DescriptorRequest {
                ait,
                spk,
                ops_number,
                train_type,
                release_date,
                components: split_list(&components),
                environments: split_list(&environments),
                platform,
            };
            let dir = out.map_or_else(|| root.to_path_buf(), |d| root.join(d));
            create(&dir, &req, json)
        }
        DescriptorSubcommand::Import { file } => import(&root.join(file), json),
    }
}

/// Split on `,` keeping empty entries; synthesis decides what they mean.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}

fn create(dir: &Path, req: &DescriptorRequest, json: bool) -> anyhow::Result<()> {
    let path = write_descriptor(dir, req)
        .with_context(|| format!("failed to create {}", descriptor_filename(req)))?;
    if json {
        print_json(&serde_json::json!({
            "filename": descriptor_filename(req),
            "path": path,
        }))?;
    } else {
        println!("Descriptor written to {}", path.display());
    }
    Ok(())
}

fn import(path: &Path, json: bool) -> anyhow::Result<()> {
    let descriptor = normalize_descriptor_file(path)
        .with_context(|| format!("failed to import {}", path.display()))?;
    if json {
        print_json(&descriptor)?;
    } else {
        println!(
            "Imported {}: {} components, {} environments",
            path.display(),
            descriptor.component.release_components.len(),
            descriptor.environments.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_empty_entries() {
        assert_eq!(split_list("a,,b"), vec!["a", "", "b"]);
        assert_eq!(split_list(""), vec![""]);
    }
}
