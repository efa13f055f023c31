//! Campaign archive manager
//!
//! A campaign archive (`.aca`) is a single SQLite catalog of scientific
//! datasets and their replicas across hosts, local directories, and
//! archival storage.
//!
//! # Overview
//!
//! - **Catalog**: create, open and truncate archives (`create`)
//! - **Ingestion**: register datasets, text and images (`dataset`, `text`, `image`)
//! - **Archival**: record archival storage and archived replicas
//!   (`add-archival-storage`, `archived-replica`)
//! - **Lifecycle**: soft deletion and time-series grouping (`delete`, `time-series`)
//! - **Maintenance**: listing and schema upgrades (`info`, `upgrade`)
//!
//! Several commands can follow one archive name in a single invocation:
//!
//! ```text
//! hpc-campaign demo.aca create dataset run1.bp text readme.md --store info -r
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod archival;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod info;
pub mod ingest;
pub mod lifecycle;
pub mod progress;
pub mod upgrade;

pub use catalog::{Catalog, Session};
pub use error::{CampaignError, Result};

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Manage campaign archives of scientific datasets
#[derive(Parser, Debug)]
#[command(name = "hpc-campaign")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
#[command(after_help = "Commands: create, dataset, text, image, delete, info, \
    add-archival-storage, archived-replica, time-series, upgrade.\n\
    Type 'hpc-campaign x <command> --help' for help on a command.")]
pub struct Cli {
    /// Campaign archive name or path, with or without `.aca`
    #[arg(required_unless_present = "markdown_help")]
    pub archive: Option<String>,

    /// Commands with their arguments, run in order
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub commands: Vec<String>,

    /// Root directory for relative archive names
    #[arg(short = 's', long, env = config::ENV_CAMPAIGN_STORE)]
    pub campaign_store: Option<PathBuf>,

    /// Host name, unique among the hosts of a campaign
    #[arg(short = 'n', long, env = config::ENV_HOSTNAME)]
    pub hostname: Option<String>,

    /// Key file used to encrypt embedded metadata
    #[arg(short = 'k', long)]
    pub keyfile: Option<PathBuf>,

    /// Bucket on a remote S3 host
    #[arg(short = 'b', long)]
    pub s3_bucket: Option<String>,

    /// Date of the data on a remote S3 host, e.g. '2024-04-19 10:20:15 -0400'
    #[arg(short = 't', long)]
    pub s3_datetime: Option<String>,

    /// More verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print the command-line reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// One command of an invocation
#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create a new campaign archive
    Create,

    /// Add ADIOS datasets (directories) or HDF5 files
    Dataset {
        /// Dataset paths
        #[arg(required = true)]
        files: Vec<String>,

        /// Dataset name, only with a single path
        #[arg(long)]
        name: Option<String>,
    },

    /// Add text files
    Text {
        /// Text file paths
        #[arg(required = true)]
        files: Vec<String>,

        /// Dataset name, only with a single path
        #[arg(long)]
        name: Option<String>,

        /// Embed the compressed content in the archive
        #[arg(short = 'e', long)]
        store: bool,
    },

    /// Add an image, optionally with a thumbnail
    Image {
        /// Image file path
        file: String,

        /// Dataset name
        #[arg(long)]
        name: Option<String>,

        /// Embed the image in the archive
        #[arg(short = 'e', long)]
        store: bool,

        /// Also embed a thumbnail fitting WIDTH x HEIGHT
        #[arg(short = 't', long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
        thumbnail: Option<Vec<u32>>,
    },

    /// Delete datasets or replicas, or the whole archive
    Delete {
        /// Dataset names
        #[arg(long = "name", value_name = "NAME")]
        names: Vec<String>,

        /// Dataset identifiers
        #[arg(long = "uuid", value_name = "UUID")]
        uuids: Vec<String>,

        /// Replica IDs
        #[arg(long = "replica", value_name = "ID")]
        replicas: Vec<i64>,

        /// Delete the archive file itself
        #[arg(long)]
        campaign: bool,
    },

    /// Print the content of the archive
    Info {
        /// List replicas of every dataset
        #[arg(short = 'r', long)]
        list_replicas: bool,

        /// List embedded files of every replica
        #[arg(short = 'f', long)]
        list_files: bool,

        /// Include deleted items
        #[arg(short = 'd', long)]
        show_deleted: bool,

        /// Show file checksums
        #[arg(short = 'c', long)]
        show_checksum: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Register an archival storage location
    AddArchivalStorage {
        /// Kronos, HPSS, FS, HTTPS, HTTP, FTP or S3
        system: String,

        /// Host name of the storage
        host: String,

        /// Directory on the storage
        directory: String,

        /// TAR file holding the archived replicas
        #[arg(long)]
        tarfilename: Option<String>,

        /// Index of the TAR file (type, offset, data offset, size, name)
        #[arg(long, requires = "tarfilename")]
        tarfileidx: Option<PathBuf>,

        /// Notes file stored with the archive
        #[arg(long)]
        note: Option<PathBuf>,

        /// Long host name, defaults to the host name
        #[arg(long)]
        longhostname: Option<String>,
    },

    /// Record that a dataset has been copied or moved to archival storage
    ArchivedReplica {
        /// Dataset name
        name: String,

        /// Directory ID of the archival storage
        dirid: i64,

        /// Archive ID, when the directory has several archives
        #[arg(long)]
        archiveid: Option<i64>,

        /// Path of the replica inside the archive, if it changed
        #[arg(long)]
        newpath: Option<String>,

        /// Replica that was archived
        #[arg(long)]
        replica: Option<i64>,

        /// The source replica was moved and no longer exists
        #[arg(long = "move")]
        move_files: bool,
    },

    /// Group datasets into a time series
    TimeSeries {
        /// Time-series name
        name: String,

        /// Datasets in time order
        datasets: Vec<String>,

        /// Replace the current members
        #[arg(long, conflicts_with = "remove")]
        replace: bool,

        /// Remove the time series, keeping its datasets
        #[arg(long)]
        remove: bool,
    },

    /// Upgrade the archive to the next schema version
    Upgrade,
}

impl Commands {
    /// Command names as typed on the command line
    pub const NAMES: &'static [&'static str] = &[
        "create",
        "dataset",
        "text",
        "image",
        "delete",
        "info",
        "add-archival-storage",
        "archived-replica",
        "time-series",
        "upgrade",
    ];

    /// Whether this command needs an existing archive
    pub fn needs_catalog(&self) -> bool {
        !matches!(
            self,
            Commands::Create | Commands::Delete { campaign: true, .. }
        )
    }
}

/// Split the words after the archive name into one argument list per command.
///
/// Every word equal to a command name starts a new command, so a file named
/// `info` would be read as the `info` command. After a `--` no word starts a
/// command: the rest of the line belongs to the current command and the `--`
/// is passed on, so clap takes the remaining words as positional arguments.
pub fn split_command_line(words: &[String]) -> Result<Vec<Vec<String>>> {
    let mut segments: Vec<Vec<String>> = Vec::new();
    let mut literal = false;
    for word in words {
        if literal {
            if let Some(segment) = segments.last_mut() {
                segment.push(word.clone());
            }
        } else if word == "--" && !segments.is_empty() {
            literal = true;
            if let Some(segment) = segments.last_mut() {
                segment.push(word.clone());
            }
        } else if Commands::NAMES.contains(&word.as_str()) {
            segments.push(vec![word.clone()]);
        } else if let Some(segment) = segments.last_mut() {
            segment.push(word.clone());
        } else {
            return Err(CampaignError::invalid_argument(format!(
                "Unknown command '{}'. Commands: {}",
                word,
                Commands::NAMES.join(", ")
            )));
        }
    }
    Ok(segments)
}

/// Parse every command of an invocation before any of them runs
pub fn parse_commands(words: &[String]) -> std::result::Result<Vec<Commands>, clap::Error> {
    let segments = split_command_line(words)
        .map_err(|e| clap::Error::raw(clap::error::ErrorKind::InvalidSubcommand, format!("{}\n", e)))?;
    segments
        .iter()
        .map(|segment| CommandLine::try_parse_from(segment).map(|line| line.command))
        .collect()
}
