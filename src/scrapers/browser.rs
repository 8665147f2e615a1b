use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::{ExtractionRules, RenderedPage, ScrapeParams};
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Browser-based page fetcher for the StandVirtual storefront.
///
/// Listing cards are injected client-side and more arrive as the page
/// scrolls, so a plain HTTP fetch sees an empty shell. One tab is reused
/// across pages; dropping the fetcher shuts the Chrome process down.
pub struct StandVirtualBrowser {
    /// Keeps the Chrome process alive for the lifetime of the fetcher
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
    params: ScrapeParams,
    article_css: String,
    load_more_css: String,
}

impl StandVirtualBrowser {
    /// Launch headless Chrome and prepare a tab for the listing site
    pub fn launch(params: &ScrapeParams, rules: &ExtractionRules) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        let tab = browser.new_tab().context("Failed to open a tab")?;
        tab.set_default_timeout(params.nav_timeout);
        tab.set_user_agent(&params.user_agent, None, None)
            .context("Failed to set user agent")?;

        Ok(Self {
            browser,
            tab,
            params: params.clone(),
            article_css: rules.article_css.clone(),
            load_more_css: rules.load_more_css.clone(),
        })
    }

    /// Scroll until the listing fragment count stops growing, so lazily
    /// loaded cards make it into the DOM before extraction
    fn auto_scroll(&self) -> Result<()> {
        let mut previous = 0usize;
        let mut stalled = 0u32;

        for _ in 0..self.params.max_scroll_rounds {
            let current = self.count_fragments()?;
            debug!("{current} listing fragments loaded");

            if current == previous {
                stalled += 1;
                if stalled >= self.params.scroll_stall_limit {
                    break;
                }
            } else {
                stalled = 0;
            }
            previous = current;

            self.scroll_to_bottom()?;
            thread::sleep(self.params.settle);
            self.click_load_more();
        }

        // One last pass for cards still streaming in
        self.scroll_to_bottom()?;
        thread::sleep(self.params.settle + Duration::from_secs(1));

        debug!("Scroll finished with {} fragments", self.count_fragments()?);
        Ok(())
    }

    fn scroll_to_bottom(&self) -> Result<()> {
        self.tab
            .evaluate("window.scrollTo(0, document.body.scrollHeight);", false)
            .context("Failed to scroll listing page")?;
        Ok(())
    }

    fn count_fragments(&self) -> Result<usize> {
        let expression = format!("document.querySelectorAll('{}').length", self.article_css);
        let result = self
            .tab
            .evaluate(&expression, false)
            .context("Failed to count listing fragments")?;
        Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0) as usize)
    }

    /// Click a load-more control when one is present; its absence is normal
    fn click_load_more(&self) {
        let expression = format!(
            "(() => {{ const btn = document.querySelector('{}'); \
             if (btn) {{ btn.click(); return true; }} return false; }})()",
            self.load_more_css
        );
        match self.tab.evaluate(&expression, false) {
            Ok(result) => {
                if result.value.and_then(|v| v.as_bool()).unwrap_or(false) {
                    debug!("Clicked load-more control");
                    thread::sleep(self.params.settle);
                }
            }
            Err(e) => debug!("Load-more probe failed: {e}"),
        }
    }

    fn outer_html(&self) -> Result<String> {
        let result = self
            .tab
            .evaluate("document.documentElement.outerHTML", false)
            .context("Failed to capture page HTML")?;
        match result.value.as_ref().and_then(|v| v.as_str()) {
            Some(html) if !html.is_empty() => Ok(html.to_string()),
            _ => anyhow::bail!("Rendered page came back empty"),
        }
    }
}

impl PageFetcher for StandVirtualBrowser {
    fn fetch_page(&self, page_index: u32) -> Result<Option<RenderedPage>> {
        let url = page_url(&self.params.base_url, page_index)?;
        info!("Fetching page {page_index} ({url})");

        self.tab
            .navigate_to(url.as_str())
            .with_context(|| format!("Failed to navigate to {url}"))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("Page {page_index} did not finish loading"))?;

        // Cards are injected client-side; give the first one a bounded wait
        if self
            .tab
            .wait_for_element_with_custom_timeout(&self.article_css, self.params.fragment_timeout)
            .is_err()
        {
            warn!("No listing fragments on page {page_index}, treating as end of inventory");
            return Ok(None);
        }

        self.auto_scroll()?;
        let html = self.outer_html()?;
        let final_url = Url::parse(&self.tab.get_url()).unwrap_or(url);

        // Keep consecutive page loads from hammering the storefront
        thread::sleep(self.params.page_pause);

        Ok(Some(RenderedPage {
            url: final_url,
            html,
        }))
    }
}

/// Listing URL for a page index; the storefront paginates with a `page`
/// query parameter that only appears from the second page on
pub fn page_url(base: &str, page_index: u32) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid listing URL: {base}"))?;
    if page_index > 1 {
        url.query_pairs_mut()
            .append_pair("page", &page_index.to_string());
    }
    Ok(url)
}
