use std::path::PathBuf;

use anyhow::Result;

use sleepdoc::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config_path = std::env::var("SLEEPDOC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("sleepdoc.json"));
    let settings = Settings::load_or_default(&config_path)?;
    log::info!("sleepdoc starting up (config: {})", config_path.display());

    sleepdoc::run(settings).await
}
