use anyhow::Context;
use bolt_core::config::Config;
use std::path::Path;

pub fn run(root: &Path, port: u16, no_open: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    for w in config.validate() {
        tracing::warn!("{}", w.message);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();
    rt.block_on(bolt_server::serve(root_buf, config, port, !no_open))
        .with_context(|| format!("server on port {port} stopped"))
}
