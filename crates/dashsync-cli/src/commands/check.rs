use std::path::Path;

use anyhow::{Context, Result, bail};
use dashsync_config::Settings;

/// Load the settings file and print every validation issue, one per line.
pub fn execute(config: &Path) -> Result<()> {
    let settings = Settings::load(config)
        .with_context(|| format!("failed to load settings from {}", config.display()))?;

    if let Err(err) = settings.validate() {
        for issue in err.issues() {
            println!("{issue}");
        }
        bail!(
            "{} has {} issue(s)",
            config.display(),
            err.issues().len()
        );
    }

    println!(
        "{}: {} account(s), settings are valid",
        config.display(),
        settings.accounts.len()
    );
    Ok(())
}
