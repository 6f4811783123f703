//! Application layer: wires configuration, sinks and sources into a run
//!
//! Sink setup errors are fatal and surface before any request is made. Once
//! the sinks are open they are closed on every path out of the harvest,
//! including a panic inside the harvest loop.

use anyhow::{Context, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

use crate::analysis::{self, AnalysisOutcome};
use crate::crawling::{ChartSource, DualSinkPersistor, HarvestPlan, HarvestReport, Harvester, build_source};
use crate::domain::SourceKind;
use crate::infrastructure::{
    BackupWriter, DocumentSink, HarvestConfig, HttpClient, HttpClientConfig, IdentityRotator,
    RedbDocumentStore, RelationalSink, SqliteRelationalStore,
};

/// Creates the data and output directories
pub async fn prepare_directories(config: &HarvestConfig) -> Result<()> {
    for dir in [&config.storage.data_dir, &config.storage.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

/// Opens both sinks, failing fast if either cannot be set up
pub async fn open_sinks(config: &HarvestConfig) -> Result<DualSinkPersistor> {
    let relational = SqliteRelationalStore::connect(&config.storage.database_url)
        .await
        .with_context(|| format!("Failed to open relational store {}", config.storage.database_url))?;

    let document = match RedbDocumentStore::open(&config.storage.document_store_path) {
        Ok(document) => document,
        Err(e) => {
            relational.close().await;
            return Err(e).with_context(|| {
                format!(
                    "Failed to open document store {}",
                    config.storage.document_store_path.display()
                )
            });
        }
    };

    let relational: Arc<dyn RelationalSink> = Arc::new(relational);
    let document: Arc<dyn DocumentSink> = Arc::new(document);
    Ok(DualSinkPersistor::new(relational, document))
}

/// Harvests `kind` from its HTTP API
pub async fn harvest(config: &HarvestConfig, kind: SourceKind) -> Result<HarvestReport> {
    let client = HttpClient::with_config(
        &HttpClientConfig::from_harvest_config(config),
        Arc::new(IdentityRotator::new()),
    )
    .context("Failed to build HTTP client")?;
    let source = build_source(kind, config.source(kind), client);
    harvest_with_source(config, source).await
}

/// Harvests from an already built source
pub async fn harvest_with_source(
    config: &HarvestConfig,
    source: Box<dyn ChartSource>,
) -> Result<HarvestReport> {
    let kind = source.kind();
    prepare_directories(config).await?;
    let persistor = open_sinks(config).await?;

    let harvester = Harvester::new(
        source,
        persistor.clone(),
        BackupWriter::new(config.backup_path(kind)),
        HarvestPlan::from_config(config.source(kind)),
    );

    Ok(run_and_release(harvester, &persistor).await)
}

/// Runs the harvest, then closes both sinks whether it returned or panicked.
/// A panic is re-raised once the sinks are closed.
pub async fn run_and_release(harvester: Harvester, persistor: &DualSinkPersistor) -> HarvestReport {
    let outcome = AssertUnwindSafe(harvester.run()).catch_unwind().await;
    persistor.close().await;

    match outcome {
        Ok(report) => {
            info!(source = %report.source, total = report.total_accepted, "sinks released");
            report
        }
        Err(panic) => {
            error!("harvest aborted; sinks released");
            std::panic::resume_unwind(panic)
        }
    }
}

/// Quality report and cleaned exports for everything stored for `kind`
pub async fn report(config: &HarvestConfig, kind: SourceKind) -> Result<AnalysisOutcome> {
    prepare_directories(config).await?;
    let store = SqliteRelationalStore::connect(&config.storage.database_url)
        .await
        .with_context(|| format!("Failed to open relational store {}", config.storage.database_url))?;

    let outcome = analysis::analyze(kind, &store, &config.storage.data_dir).await;
    store.close().await;
    outcome
}
