use engine::Model;

/// Generate images through the gateway.
#[derive(Debug, clap::Parser)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Generate a single image and exit. Without it an interactive session starts.
    pub prompt: Option<String>,

    #[arg(short, long)]
    pub model: Option<Model>,

    #[arg(short, long)]
    pub gateway_url: Option<String>,

    /// Per-attempt timeout, at most one day
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub timeout_secs: Option<u64>,

    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// List the available models
    Models,
    /// Write the current settings to the config file
    SaveConfig,
}
