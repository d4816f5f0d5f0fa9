#![forbid(unsafe_code)]

mod cli;
mod commands;
mod shutdown;
mod startup;

use anyhow::Result;

use cli::Command;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();
    let output = cli.output;

    match &cli.command {
        Command::Version => {
            commands::cmd_version();
            Ok(())
        }
        Command::Validate => commands::cmd_validate(&cli.config, output),
        Command::Match { expression, event } => commands::cmd_match(expression, event, output),
        Command::Run {
            facts,
            metrics_file,
        } => startup::run(&cli, facts, metrics_file.as_deref()).await,
    }
}
