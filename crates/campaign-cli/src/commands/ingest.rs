//! `dataset`, `text` and `image` commands

use crate::catalog::Catalog;
use crate::error::Result;
use crate::ingest::{
    ingest, Collaborators, CommandStripper, HostContext, ImageCrateProcessor, IngestKind,
    IngestReport, IngestRequest,
};
use crate::progress::create_progress_bar;
use colored::Colorize;

/// Ingest `files`, one source at a time, and print a summary
pub fn run(
    catalog: &mut Catalog,
    host: &HostContext,
    kind: IngestKind,
    files: &[String],
    name: Option<&str>,
    hdf5_stripper: Option<String>,
) -> Result<()> {
    let request = IngestRequest::new(kind, files.to_vec(), name.map(String::from))?;
    let stripper = CommandStripper::new(hdf5_stripper);
    let images = ImageCrateProcessor;
    let tools = Collaborators {
        stripper: &stripper,
        images: &images,
    };

    let pb = create_progress_bar(request.files().len() as u64, "Ingesting");
    let mut total = IngestReport::default();
    for file in request.files() {
        pb.set_message(file.clone());
        let single = IngestRequest::new(request.kind(), vec![file.clone()], name.map(String::from))?;
        let report = ingest(catalog, host, &single, tools);
        pb.inc(1);
        let report = match report {
            Ok(report) => report,
            Err(err) => {
                pb.abandon();
                return Err(err);
            }
        };
        total.datasets.extend(report.datasets);
        total.replicas.extend(report.replicas);
        total.files += report.files;
        total.skipped.extend(report.skipped);
    }
    pb.finish_and_clear();

    println!(
        "{} {} dataset(s), {} replica(s), {} embedded file(s)",
        "Added".green(),
        total.datasets.len(),
        total.replicas.len(),
        total.files
    );
    for skipped in &total.skipped {
        println!("  {} {}", "skipped".yellow(), skipped);
    }
    Ok(())
}
