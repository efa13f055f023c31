//! Build automation tasks for hpc-campaign
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for hpc-campaign", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

/// Per-command sections; the top-level parser only sees the archive and a word list
fn command_sections() -> String {
    campaign_cli::Commands::NAMES
        .iter()
        .map(|name| format!("- `hpc-campaign <archive> {}`", name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<campaign_cli::Cli>();
    let commands = clap_markdown::help_markdown::<campaign_cli::CommandLine>();

    let content = format!(
        r#"# hpc-campaign CLI Reference

This documentation is generated from the CLI source code. Last updated: {}.

## Overview

`hpc-campaign` manages campaign archives (`.aca` files): SQLite catalogs of
scientific datasets and their replicas on hosts, local directories and
archival storage. One invocation names an archive followed by one or more
commands, which run in order:

```bash
hpc-campaign demo.aca create dataset run1.bp text readme.md --store info -r
```

Available commands:

{}

## Global Options

{}

## Commands

{}

## Environment Variables

- `HPC_CAMPAIGN_STORE` - root directory for relative archive names
- `HPC_CAMPAIGN_HOSTNAME` - host name recorded for ingested replicas
- `HPC_CAMPAIGN_HOSTS` - remote hosts as `name=protocol@endpoint`, comma separated
- `HPC_CAMPAIGN_HDF5_STRIPPER` - program writing the metadata-only copy of an HDF5 file
- `CAMPAIGN_LOG_LEVEL`, `CAMPAIGN_LOG_OUTPUT`, `CAMPAIGN_LOG_FORMAT`,
  `CAMPAIGN_LOG_DIR`, `CAMPAIGN_LOG_FILTER` - logging overrides

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        command_sections(),
        markdown,
        commands
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
