use anyhow::Result;
use clap::Parser;
use notetaker::cli::{
    handle_add_command, handle_list_command, handle_regenerate_command, handle_show_command,
    handle_watch_command, resolve_config, Cli, CliCommand,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let CliCommand::Version = cli.command {
        println!("Notetaker {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = resolve_config(cli.api_url.as_deref())?;

    match cli.command {
        CliCommand::Add(args) => handle_add_command(&config, args).await,
        CliCommand::List => handle_list_command(&config).await,
        CliCommand::Show(args) => handle_show_command(&config, args).await,
        CliCommand::Watch(args) => handle_watch_command(&config, args).await,
        CliCommand::Regenerate(args) => handle_regenerate_command(&config, args).await,
        CliCommand::Version => Ok(()),
    }
}
