use anyhow::Result;

use crate::core::config::{AppConfig, CliOverrides};
use crate::core::store::SqliteRequestStore;
use crate::core::terminal::{print_status, print_step, print_success, print_warn};

/// Resolve and validate configuration and open the database without serving.
pub async fn run(overrides: CliOverrides) -> Result<()> {
    print_step("Checking configuration...");
    let config = AppConfig::load(&overrides).await?;
    for (label, value) in config.summary() {
        print_status(label, &value);
    }

    let store = SqliteRequestStore::new(&config.storage_path);
    store.init().await?;
    print_success(&format!("Database ready at {}", store.path().display()));

    if config.uses_default_token() {
        print_warn("Callback token is the development default.");
    }
    print_success("Configuration is valid.");
    Ok(())
}
