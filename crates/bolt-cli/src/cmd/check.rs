use crate::cmd::upstream::UpstreamArgs;
use crate::output::print_json;
use std::path::Path;

pub fn run(root: &Path, upstream: &UpstreamArgs, json: bool) -> anyhow::Result<()> {
    let (_, connection) = upstream.connect(root)?;
    let status = connection.check();

    if json {
        print_json(&status)?;
    } else {
        let mark = |ok: bool| if ok { "ok" } else { "FAILED" };
        println!("release API:   {}", mark(status.xlr_status));
        if let Some(e) = &status.xlr_error {
            println!("  {e}");
        }
        println!("inventory API: {}", mark(status.tower_status));
        if let Some(e) = &status.tower_error {
            println!("  {e}");
        }
    }

    if let Some(message) = status.failure_message() {
        anyhow::bail!(message);
    }
    Ok(())
}
