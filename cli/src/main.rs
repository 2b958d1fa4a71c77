use clap::{Parser, Subcommand};

mod commands;
mod util;

#[derive(Parser)]
#[command(
    name = "teaminsight",
    version,
    about = "TeamInsight CLI — drive a team's weekly reflection session from the terminal"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "TEAMINSIGHT_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Reflection session operations
    Reflection {
        #[command(subcommand)]
        command: ReflectionCommands,
    },
}

#[derive(Subcommand)]
pub enum ReflectionCommands {
    /// Start or resume the team's reflection session
    Start,
    /// Send one answer in the reflection conversation
    Turn {
        /// The answer text
        #[arg(long)]
        text: String,
    },
    /// Force summary generation and move to ready_to_submit
    Finish,
    /// Confirm and submit the reflection
    Confirm,
    /// Delete the team's non-terminal sessions
    Reset,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Reflection { command } => commands::reflection::run(&cli.api_url, command).await,
    };

    std::process::exit(code);
}
