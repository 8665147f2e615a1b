use crate::models::Vehicle;
use crate::scrapers::types::RenderedPage;
use anyhow::Result;
use async_trait::async_trait;

/// A source of rendered listing pages, one page index at a time.
///
/// `Ok(None)` means the page produced no listing fragments within the wait
/// budget, which ends pagination. Errors are reserved for failures that
/// should abort the whole run.
pub trait PageFetcher {
    fn fetch_page(&self, page_index: u32) -> Result<Option<RenderedPage>>;
}

/// Common trait for vehicle inventory sources
/// Both the batch updater and the on-demand endpoint consume it
#[async_trait]
pub trait VehicleSource: Send + Sync {
    /// Scrape the source into a deduplicated, id-stamped record set
    async fn scrape(&self) -> Result<Vec<Vehicle>>;

    /// Listing URL recorded in the catalog metadata
    fn source_url(&self) -> &str;

    /// Get the name of the scraped source
    fn source_name(&self) -> &'static str;
}
