use crate::output::print_json;
use anyhow::Context;
use bolt_core::config::{Config, ConfigWarning, WarnLevel};
use bolt_core::paths;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration (defaults filled in)
    Show,

    /// Write bolt.yaml with every key at its default
    Init {
        /// Upstream release API URL to record
        #[arg(long)]
        xlr_url: Option<String>,

        /// Upstream inventory API URL to record
        #[arg(long)]
        tower_url: Option<String>,

        /// Replace an existing bolt.yaml
        #[arg(long)]
        force: bool,
    },

    /// Check bolt.yaml for values that would fail a run
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Init {
            xlr_url,
            tower_url,
            force,
        } => init(root, xlr_url, tower_url, force, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        print_json(&config)?;
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
    }
    Ok(())
}

fn init(
    root: &Path,
    xlr_url: Option<String>,
    tower_url: Option<String>,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let path = paths::config_path(root);
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to replace it", path.display());
    }
    let config = Config {
        xlr_url: xlr_url.unwrap_or_default(),
        tower_url: tower_url.unwrap_or_default(),
        ..Config::default()
    };
    config.save(root).context("failed to write config")?;
    if json {
        print_json(&serde_json::json!({ "path": path }))?;
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Errors first, then warnings, under a one-line count.
fn render_report(warnings: &[ConfigWarning]) -> String {
    if warnings.is_empty() {
        return format!("{}: ok\n", paths::CONFIG_FILE);
    }
    let (errors, rest): (Vec<&ConfigWarning>, Vec<&ConfigWarning>) =
        warnings.iter().partition(|w| w.level == WarnLevel::Error);
    let mut out = format!(
        "{}: {}, {}\n",
        paths::CONFIG_FILE,
        plural(errors.len(), "error"),
        plural(rest.len(), "warning")
    );
    for w in errors {
        out.push_str(&format!("  error    {}\n", w.message));
    }
    for w in rest {
        out.push_str(&format!("  warning  {}\n", w.message));
    }
    out
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();
    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&serde_json::json!({
            "valid": errors == 0,
            "warnings": warnings,
        }))?;
    } else {
        print!("{}", render_report(&warnings));
    }

    if errors > 0 {
        anyhow::bail!("config validation found {}", plural(errors, "error"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(level: WarnLevel, message: &str) -> ConfigWarning {
        ConfigWarning {
            level,
            message: message.into(),
        }
    }

    #[test]
    fn report_lists_errors_before_warnings() {
        let report = render_report(&[
            warning(WarnLevel::Warning, "tower_url is not set"),
            warning(WarnLevel::Error, "timeout_secs must be greater than zero"),
        ]);
        assert_eq!(
            report,
            "bolt.yaml: 1 error, 1 warning\n\
             \x20 error    timeout_secs must be greater than zero\n\
             \x20 warning  tower_url is not set\n"
        );
    }

    #[test]
    fn clean_report_is_one_line() {
        assert_eq!(render_report(&[]), "bolt.yaml: ok\n");
    }
}
