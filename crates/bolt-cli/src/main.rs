mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, descriptor::DescriptorSubcommand, upstream::UpstreamArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bolt",
    about = "Release-train descriptors and server discovery across the release and inventory APIs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from bolt.yaml or .git/)
    #[arg(long, global = true, env = "BOLT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or normalize release-train descriptor files
    Descriptor {
        #[command(subcommand)]
        subcommand: DescriptorSubcommand,
    },

    /// Resolve every server behind a release train and export the table
    Discover {
        /// Release train URL or bare release id
        reference: String,

        #[command(flatten)]
        upstream: UpstreamArgs,
    },

    /// Verify the credentials against both APIs
    Check {
        #[command(flatten)]
        upstream: UpstreamArgs,
    },

    /// Show or validate bolt.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Serve the HTTP/SSE API
    Ui {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "3141")]
        port: u16,

        /// Don't open browser automatically
        #[arg(long)]
        no_open: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Ui { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Descriptor { subcommand } => cmd::descriptor::run(&root, subcommand, cli.json),
        Commands::Discover {
            reference,
            upstream,
        } => cmd::discover::run(&root, &reference, &upstream, cli.json),
        Commands::Check { upstream } => cmd::check::run(&root, &upstream, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Ui { port, no_open } => cmd::ui::run(&root, port, no_open),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
