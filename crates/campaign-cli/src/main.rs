//! hpc-campaign - Main entry point

use campaign_cli::{parse_commands, Cli};
use campaign_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;
use tracing::error;

fn main() {
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    // -v picks the level; CAMPAIGN_LOG_* variables override it
    let log_config = LogConfig::builder()
        .level(LogLevel::from_verbosity(cli.verbose))
        .output(LogOutput::Console)
        .log_file_prefix("hpc-campaign")
        .build();
    let log_config = log_config.clone().with_env().unwrap_or(log_config);
    let _ = init_logging(&log_config);

    let commands = parse_commands(&cli.commands).unwrap_or_else(|e| e.exit());
    if commands.is_empty() {
        eprintln!("Error: at least one command is required after the archive name");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    }

    if let Err(e) = campaign_cli::commands::run(&cli, &commands) {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
