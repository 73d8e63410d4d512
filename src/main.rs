//! Binary entry point: resolve configuration, start file logging, open the
//! database and hand control to the TUI.
use anyhow::Context;
use tracing::{error, info};

use rims::{logging, open_database, run_app, App, Config};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config)?;
    info!(database = %config.database_path.display(), "starting rims");

    let conn = open_database(&config.database_path).with_context(|| {
        format!(
            "failed to open inventory database {}",
            config.database_path.display()
        )
    })?;

    let mut app = App::new(conn).context("failed to load inventory")?;
    if let Err(err) = run_app(&mut app) {
        error!(error = %err, "terminal session failed");
        return Err(err);
    }
    Ok(())
}
