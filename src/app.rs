use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::api;
use crate::clipboard::SystemClipboard;
use crate::config;
use crate::controller::{self, Controller, ResultSet};
use crate::data::{HttpQueueService, HttpSearchService, QueueService, SearchService};
use crate::logging;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    let config_path = options.config_file.or_else(config::default_path);
    let display_path = friendly_path(config_path.as_ref());

    let _log_guard = logging::init(&cfg.logging).context("initialise logging")?;
    info!(
        version = crate::VERSION,
        server = %cfg.server.base_url,
        "starting linkseek"
    );

    let client = api::Client::new(api::ClientConfig {
        base_url: cfg.server.base_url.clone(),
        user_agent: cfg.server.user_agent.clone(),
        timeout: cfg.server.timeout,
        http_client: None,
    })
    .context("create search client")?;
    let server_label = client.base_url().to_string();
    let client = Arc::new(client);

    let search_service: Arc<dyn SearchService> =
        Arc::new(HttpSearchService::new(client.clone()));
    let queue_service: Arc<dyn QueueService> = Arc::new(HttpQueueService::new(client));

    let controller = Controller::new(controller::Options {
        search_service,
        queue_service,
        clipboard: Box::new(SystemClipboard::new()),
        results: ResultSet::default(),
        timings: cfg.ui.timings(),
    });

    let mut model = ui::Model::new(ui::Options {
        controller,
        server_label,
        config_path: display_path,
    });
    model.run()?;

    info!("linkseek exiting");
    Ok(())
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
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
    } else {
        "~/.config/linkseek/config.yaml".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_path_falls_back_to_default_location() {
        assert_eq!(friendly_path(None), "~/.config/linkseek/config.yaml");
    }

    #[test]
    fn friendly_path_keeps_paths_outside_home() {
        let path = PathBuf::from("/etc/linkseek/config.yaml");
        if dirs::home_dir().map_or(true, |home| !path.starts_with(home)) {
            assert_eq!(friendly_path(Some(&path)), "/etc/linkseek/config.yaml");
        }
    }
}
