use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config;
use crate::gateway::Gateway;
use crate::logging;
use crate::server;

pub fn run() -> Result<()> {
    logging::init();

    let options = config::LoadOptions::default();
    let config_path = config::config_path(&options);
    let cfg = config::load(options).context("load config")?;
    info!(config = %friendly_path(config_path.as_deref()), "configuration loaded");

    let gateway = Arc::new(Gateway::new(&cfg.upstream).context("build gateway")?);
    let handle = server::start(&cfg, gateway).context("start server")?;
    info!(
        upstream = %cfg.upstream.base_url,
        "RedInsight running on http://localhost:{}",
        handle.addr().port()
    );
    handle.wait();
    Ok(())
}

fn friendly_path(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return "(defaults)".to_string();
    };
    if !path.exists() {
        return format!("{} (not found, using defaults)", display_path(path));
    }
    display_path(path)
}

fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            let mut display = String::from("~");
            if !stripped.as_os_str().is_empty() {
                display.push_str(&format!("/{}", stripped.display()));
            }
            return display;
        }
    }
    path.display().to_string()
}
