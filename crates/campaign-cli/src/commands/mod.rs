//! CLI command implementations
//!
//! One invocation may chain several commands. [`Runner`] opens the archive
//! once, hands it to each command module's `run` function, and collects the
//! statement errors of every session for the final report.

pub mod archival;
pub mod delete;
pub mod info;
pub mod ingest;
pub mod time_series;
pub mod upgrade;

use crate::archival::{ArchivalStorageRequest, PromoteRequest};
use crate::catalog::{Catalog, Session, StatementError};
use crate::config::{resolve_catalog_path, Config};
use crate::error::{CampaignError, Result};
use crate::info::InfoOptions;
use crate::ingest::{register_host, HostContext, HostIdentity, IngestKind};
use crate::lifecycle::delete_catalog_file;
use crate::{Cli, Commands};
use campaign_common::crypto::EncryptionKey;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// State shared by the commands of one invocation
pub struct Runner<'a> {
    cli: &'a Cli,
    config: Config,
    path: PathBuf,
    key: Option<EncryptionKey>,
    catalog: Option<Catalog>,
    host: Option<HostContext>,
    errors: Vec<StatementError>,
}

impl<'a> Runner<'a> {
    pub fn new(cli: &'a Cli) -> Result<Self> {
        let mut config = Config::from_env()?;
        if let Some(store) = &cli.campaign_store {
            config.set_campaign_store(store.clone());
        }
        let archive = cli
            .archive
            .as_deref()
            .ok_or_else(|| CampaignError::invalid_argument("An archive name is required"))?;
        let path = resolve_catalog_path(archive, config.campaign_store.as_deref());
        let key = cli.keyfile.as_ref().map(EncryptionKey::load).transpose()?;
        debug!(
            catalog = %path.display(),
            store = ?config.campaign_store,
            hostname = ?cli.hostname,
            keyfile = ?cli.keyfile,
            "Campaign settings"
        );
        Ok(Self {
            cli,
            config,
            path,
            key,
            catalog: None,
            host: None,
            errors: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn session(&self) -> Session {
        Session::new().with_key(self.key.clone())
    }

    fn catalog(&mut self) -> Result<&mut Catalog> {
        if self.catalog.is_none() {
            let catalog = Catalog::open(&self.path, self.session())?;
            self.catalog = Some(catalog);
        }
        self.catalog
            .as_mut()
            .ok_or_else(|| CampaignError::CatalogNotFound(self.path.display().to_string()))
    }

    fn create(&mut self) -> Result<()> {
        self.close();
        let catalog = Catalog::create(&self.path, self.session())?;
        println!("{} {}", "Created".green(), self.path.display());
        self.catalog = Some(catalog);
        Ok(())
    }

    /// Host rows for ingestion, registered on first use
    fn host(&mut self) -> Result<HostContext> {
        if let Some(host) = &self.host {
            return Ok(host.clone());
        }
        let identity = HostIdentity::resolve(
            &self.config,
            self.cli.hostname.as_deref(),
            self.cli.s3_bucket.as_deref(),
            self.cli.s3_datetime.as_deref(),
        )?;
        info!(
            host = %identity.short_name,
            long_host = %identity.long_name,
            remote = identity.is_remote(),
            "Ingesting host"
        );
        let host = register_host(self.catalog()?, &identity)?;
        self.host = Some(host.clone());
        Ok(host)
    }

    fn close(&mut self) {
        self.host = None;
        if let Some(catalog) = self.catalog.take() {
            self.errors.extend(catalog.close());
        }
    }

    /// Run one command
    pub fn execute(&mut self, command: &Commands) -> Result<()> {
        info!(command = ?command, "Run command");
        match command {
            Commands::Create => self.create(),

            Commands::Dataset { files, name } => {
                self.ingest(IngestKind::Dataset, files, name.as_deref())
            }
            Commands::Text { files, name, store } => {
                self.ingest(IngestKind::Text { store: *store }, files, name.as_deref())
            }
            Commands::Image {
                file,
                name,
                store,
                thumbnail,
            } => {
                let thumbnail = match thumbnail.as_deref() {
                    Some([width, height]) => Some((*width, *height)),
                    Some(_) => {
                        return Err(CampaignError::invalid_argument(
                            "--thumbnail takes a width and a height",
                        ))
                    }
                    None => None,
                };
                let kind = IngestKind::Image {
                    store: *store,
                    thumbnail,
                };
                self.ingest(kind, std::slice::from_ref(file), name.as_deref())
            }

            Commands::Delete { campaign: true, .. } => {
                self.close();
                delete_catalog_file(&self.path)?;
                println!("{} {}", "Deleted".red(), self.path.display());
                Ok(())
            }
            Commands::Delete {
                names,
                uuids,
                replicas,
                ..
            } => delete::run(self.catalog()?, names, uuids, replicas),

            Commands::Info {
                list_replicas,
                list_files,
                show_deleted,
                show_checksum,
                json,
            } => {
                let options = InfoOptions {
                    list_replicas: *list_replicas,
                    list_files: *list_files,
                    show_deleted: *show_deleted,
                    show_checksum: *show_checksum,
                };
                info::run(self.catalog()?, options, *json)
            }

            Commands::AddArchivalStorage {
                system,
                host,
                directory,
                tarfilename,
                tarfileidx,
                note,
                longhostname,
            } => {
                let request = ArchivalStorageRequest::new(system, host, directory)?
                    .with_long_host(longhostname.clone())
                    .with_tar(tarfilename.clone(), tarfileidx.clone())
                    .with_notes(note.clone());
                archival::add_storage(self.catalog()?, &request)
            }

            Commands::ArchivedReplica {
                name,
                dirid,
                archiveid,
                newpath,
                replica,
                move_files,
            } => {
                let request = PromoteRequest::new(
                    name.clone(),
                    *dirid,
                    *archiveid,
                    *replica,
                    newpath.clone(),
                    *move_files,
                )?;
                archival::archived_replica(self.catalog()?, &request)
            }

            Commands::TimeSeries {
                name,
                datasets,
                replace,
                remove,
            } => time_series::run(self.catalog()?, name, datasets, *replace, *remove),

            Commands::Upgrade => upgrade::run(self.catalog()?),
        }
    }

    fn ingest(&mut self, kind: IngestKind, files: &[String], name: Option<&str>) -> Result<()> {
        let host = self.host()?;
        let stripper = self.config.hdf5_stripper.clone();
        ingest::run(self.catalog()?, &host, kind, files, name, stripper)
    }

    /// Close the archive and return every statement error of the invocation
    pub fn finish(mut self) -> Vec<StatementError> {
        self.close();
        self.errors
    }
}

/// Run `commands` in order against the archive named on the command line.
///
/// The first failing command stops the run. Statement errors recorded by the
/// catalog are printed at the end and turn into
/// [`CampaignError::StatementErrors`].
pub fn run(cli: &Cli, commands: &[Commands]) -> Result<()> {
    let mut runner = Runner::new(cli)?;
    info!(catalog = %runner.path().display(), commands = commands.len(), "Campaign archive");
    let outcome = commands.iter().try_for_each(|command| runner.execute(command));
    let errors = runner.finish();

    if !errors.is_empty() {
        eprintln!("{}", "SQL statement errors:".red().bold());
        for error in &errors {
            eprintln!("  {}", error);
        }
    }
    outcome?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CampaignError::StatementErrors(errors.len()))
    }
}
