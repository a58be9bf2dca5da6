//! CLI command implementations.

pub mod drop_table;
pub mod extract;
pub mod init_table;
pub mod load;
pub mod reconcile;
pub mod show;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use strata_core::{
    CatalogRefresher, HttpCrawlerClient, LoggingRefresher, ObjectStoreBackend, StorageBackend,
};

use crate::{Config, OutputFormat};

/// Opens the lake storage named by the configuration.
///
/// # Errors
///
/// Returns an error if the storage URL cannot be opened.
pub fn open_backend(config: &Config) -> Result<Arc<dyn StorageBackend>> {
    let options = config
        .storage_options
        .iter()
        .map(|(key, value)| (key.as_str(), value.expose().clone()));
    let backend = ObjectStoreBackend::from_url(&config.storage_url, options)
        .with_context(|| format!("Failed to open storage at {}", config.storage_url))?;
    Ok(Arc::new(backend))
}

/// Returns the catalog refresher for the configuration.
#[must_use]
pub fn catalog_refresher(config: &Config) -> Arc<dyn CatalogRefresher> {
    match &config.crawler_url {
        Some(url) => Arc::new(HttpCrawlerClient::new(url.clone())),
        None => Arc::new(LoggingRefresher),
    }
}

/// Prints a job outcome in the configured format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_outcome<T: Serialize>(config: &Config, text: &str, outcome: &T) -> Result<()> {
    match config.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => println!("{text}"),
    }
    Ok(())
}
