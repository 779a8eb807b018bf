//! Command implementations behind the `pogo` binary

use crate::config::Settings;
use crate::error::Result;
use crate::geo::{GeoLookup, MaxMindGeoLookup, NoGeoLookup};
use crate::index::{ElasticConnector, IndexConnector};
use crate::kind::ArtifactKind;
use crate::pipeline::Pipeline;
use crate::store::LocalDb;
use crate::Commands;
use tracing::{info, Span};

/// Kinds selected by an optional `--kind`
fn selected(kind: Option<ArtifactKind>) -> Vec<ArtifactKind> {
    match kind {
        Some(kind) => vec![kind],
        None => ArtifactKind::ALL.to_vec(),
    }
}

fn geo_lookup(settings: &Settings) -> Result<Box<dyn GeoLookup>> {
    Ok(match &settings.locations.geoip_db {
        Some(path) => {
            info!(path = %path.display(), "Using GeoIP database");
            Box::new(MaxMindGeoLookup::open(path)?)
        },
        None => Box::new(NoGeoLookup),
    })
}

/// Build the pipeline for a run from the effective settings
pub fn build_pipeline<'a>(settings: &Settings, db: &'a LocalDb, span: Span) -> Result<Pipeline<'a>> {
    Ok(Pipeline::new(
        db,
        settings.locations.clone(),
        settings.main.origin_host.clone(),
        span,
    )
    .with_geo(geo_lookup(settings)?))
}

/// Execute one command against the store
pub async fn execute(command: &Commands, settings: &Settings, db: &LocalDb, span: Span) -> Result<()> {
    let pipeline = build_pipeline(settings, db, span)?;
    let connector = ElasticConnector::new(settings.elasticsearch.clone());

    match command {
        Commands::Run => {
            let report = pipeline.run(&connector).await?;
            let files: usize = report.scraped.iter().map(|(_, r)| r.files_scraped).sum();
            let forwarded: usize = report.forwarded.iter().map(|(_, n)| n).sum();
            let removed: usize = report.pruned.iter().map(|(_, r)| r.rows_removed).sum();
            info!(files, forwarded, removed, "Run finished");
        },

        Commands::Scrape { kind } => {
            for kind in selected(*kind) {
                let report = pipeline.scrape(kind)?;
                println!(
                    "{:<18} {} files, {} records",
                    kind, report.files_scraped, report.records_inserted
                );
            }
        },

        Commands::Forward { kind } => {
            for kind in selected(*kind) {
                let index = connector.connect(kind).await?;
                let forwarded = pipeline.forward(kind, index.as_ref()).await?;
                println!("{:<18} {} rows", kind, forwarded);
            }
        },

        Commands::Prune { kind } => {
            for kind in selected(*kind) {
                let report = pipeline.prune(kind)?;
                println!(
                    "{:<18} {} files, {} rows",
                    kind, report.files_removed, report.rows_removed
                );
            }
        },

        Commands::Status => {
            println!(
                "{:<18} {:>8} {:>8} {:>12} {:>10}",
                "KIND", "PENDING", "DONE", "UNFORWARDED", "FORWARDED"
            );
            for status in pipeline.status()? {
                let count = |n: Option<usize>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
                println!(
                    "{:<18} {:>8} {:>8} {:>12} {:>10}",
                    status.kind,
                    count(status.pending_files),
                    count(status.done_files),
                    status.unforwarded_rows,
                    status.forwarded_rows
                );
            }
        },

        Commands::ShowConfig => show_config(settings)?,
    }
    Ok(())
}

/// Print the effective configuration as JSON
pub fn show_config(settings: &Settings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_kinds() {
        assert_eq!(selected(None), ArtifactKind::ALL.to_vec());
        assert_eq!(selected(Some(ArtifactKind::Log)), vec![ArtifactKind::Log]);
    }
}
