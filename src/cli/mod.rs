use crate::config::Config;
use anyhow::Result;

pub mod args;
pub mod meetings;

pub use args::{Cli, CliCommand};
pub use meetings::{
    handle_add_command, handle_list_command, handle_regenerate_command, handle_show_command,
    handle_watch_command,
};

/// Config file + env, with `--api-url` taking precedence.
pub fn resolve_config(api_url: Option<&str>) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
        config.api.base_url = url.to_string();
    }
    Ok(config)
}
