use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "notetaker")]
#[command(about = "Track meeting recording, transcript and note jobs", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Meetings service root (overrides config and NOTETAKER_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Send the note-taker bot to a meeting
    Add(AddCliArgs),
    /// List meetings and their job status
    List,
    /// Show one meeting with its note (defaults to the first meeting)
    Show(ShowCliArgs),
    /// Follow active meetings until every job has finished
    Watch(WatchCliArgs),
    /// Ask the service to generate the note again
    Regenerate(RegenerateCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct AddCliArgs {
    /// Meeting join link
    #[arg(short, long)]
    pub url: String,
    /// Grant ID authorizing the bot to join
    #[arg(short, long)]
    pub grant: String,
}

#[derive(ClapArgs, Debug)]
pub struct ShowCliArgs {
    /// Meeting ID
    pub id: Option<String>,
    /// Also print the raw transcript
    #[arg(short, long)]
    pub transcript: bool,
    /// Print only summary and key points
    #[arg(long)]
    pub short: bool,
}

#[derive(ClapArgs, Debug)]
pub struct WatchCliArgs {
    /// Meeting to print in full once everything has finished
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct RegenerateCliArgs {
    /// Meeting ID
    pub id: String,
}
