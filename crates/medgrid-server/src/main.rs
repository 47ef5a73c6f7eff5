use std::env;

use anyhow::Context;
use medgrid_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use medgrid_server::{ServerBuilder, apply_logging_level};

/// Exit status for configuration errors, distinct from runtime failures.
const EXIT_BAD_CONFIG: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => eprintln!("Warning: ignoring unreadable .env file: {e}"),
    }

    medgrid_server::init_tracing();

    let (config_path, origin) = config_location();
    let cfg = match load_config(Some(&config_path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error ({config_path}): {e}");
            std::process::exit(EXIT_BAD_CONFIG);
        }
    };
    apply_logging_level(&cfg.logging.level);
    tracing::info!(path = %config_path, origin, "configuration loaded");

    let server = ServerBuilder::new()
        .with_config(cfg)
        .build()
        .await
        .context("initializing server")?;
    server.run().await.context("serving requests")
}

/// Config file path and where it came from: `--config <path>`, then
/// `MEDGRID_CONFIG`, then `medgrid.toml` in the working directory.
fn config_location() -> (String, &'static str) {
    let args: Vec<String> = env::args().skip(1).collect();
    if let Some(path) = args
        .windows(2)
        .find(|pair| pair[0] == "--config")
        .map(|pair| pair[1].clone())
    {
        return (path, "--config");
    }

    match env::var("MEDGRID_CONFIG") {
        Ok(path) if !path.is_empty() => (path, "MEDGRID_CONFIG"),
        _ => (DEFAULT_CONFIG_FILE.to_string(), "default"),
    }
}
