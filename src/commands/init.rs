// ABOUTME: Init command implementation.
// ABOUTME: Writes kedge.yml and optional build and manifest templates.

use kedge::config::init_config;
use kedge::error::Result;
use kedge::output::Output;

pub fn init(app: Option<&str>, force: bool, scaffold: bool, output: Output) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let written = init_config(&cwd, app, force, scaffold)?;

    for path in &written {
        output.progress(&format!("  → Wrote {}", path.display()));
    }
    output.success(&format!("Initialized kedge in {}", cwd.display()));
    Ok(())
}
