use std::time::Duration;

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::models::{Category, Fuel};

/// Dealer storefront the batch job and the on-demand endpoint both scrape
pub const STANDVIRTUAL_URL: &str = "https://jsfeelelectricmove.standvirtual.com/inventory";

/// The storefront serves a consent interstitial to obviously headless agents
const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Portuguese month names as the listing cards render them
pub const LISTING_MONTHS: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// Currency markers accepted after a price figure
pub const CURRENCY_MARKERS: [&str; 2] = ["EUR", "€"];

/// Lowercase substrings that mark a fully electric drivetrain
pub const ELECTRIC_KEYWORDS: [&str; 3] = ["elétrico", "eléctrico", "electric"];

/// Brand keyword to category table, checked in order
pub const BRAND_CATEGORIES: [(&str, Category); 4] = [
    ("tesla", Category::Tesla),
    ("bmw", Category::Bmw),
    ("mercedes", Category::Mercedes),
    ("hyundai", Category::Hyundai),
];

/// Tunables for one scrape run
#[derive(Debug, Clone)]
pub struct ScrapeParams {
    /// Listing URL; a `page` query parameter is appended past the first page
    pub base_url: String,
    /// Hard ceiling on listing pages fetched per run
    pub max_pages: u32,
    /// User agent presented to the storefront
    pub user_agent: String,
    /// Budget for navigation and other browser calls
    pub nav_timeout: Duration,
    /// How long to wait for the first listing fragment before treating the
    /// page as empty
    pub fragment_timeout: Duration,
    /// Settle delay after each scroll or load-more click
    pub settle: Duration,
    /// Pause between listing pages
    pub page_pause: Duration,
    /// Scroll cycles attempted before giving up on lazy content
    pub max_scroll_rounds: u32,
    /// Unchanged fragment counts tolerated before the scroll loop stops
    pub scroll_stall_limit: u32,
}

impl Default for ScrapeParams {
    fn default() -> Self {
        Self {
            base_url: STANDVIRTUAL_URL.to_string(),
            max_pages: 3,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            nav_timeout: Duration::from_secs(60),
            fragment_timeout: Duration::from_secs(10),
            settle: Duration::from_secs(2),
            page_pause: Duration::from_secs(2),
            max_scroll_rounds: 30,
            scroll_stall_limit: 5,
        }
    }
}

/// Everything that ties extraction to the current storefront markup.
///
/// The site exposes no structured data, so fields are recovered with
/// selector and pattern heuristics. Keeping them in one table means a
/// markup change touches only this file.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    /// One listing fragment per vehicle
    pub article_selector: Selector,
    /// Raw CSS for the fragment selector, reused inside injected scripts
    pub article_css: String,
    /// Primary advert anchor, keyed on the site domain so navigation chrome
    /// is never mistaken for a listing link
    pub link_selector: Selector,
    pub title_selector: Selector,
    pub image_selector: Selector,
    /// Price-styled elements, tried in order before the whole-text fallback
    pub price_selectors: Vec<Selector>,
    /// CSS for the load-more control clicked while scrolling
    pub load_more_css: String,
    pub price_re: Regex,
    pub date_re: Regex,
    pub km_re: Regex,
    pub fuel_keywords: Vec<String>,
    /// Brand keyword to category table, first match wins
    pub brand_categories: Vec<(String, Category)>,
}

impl ExtractionRules {
    /// Build a rule set from the injectable pattern lists. `Default` wires
    /// in the StandVirtual values.
    pub fn new(
        months: &[&str],
        currency_markers: &[&str],
        fuel_keywords: &[&str],
        brand_categories: &[(&str, Category)],
    ) -> Self {
        let months = months.join("|");
        let currency = currency_markers
            .iter()
            .map(|marker| regex::escape(marker))
            .collect::<Vec<_>>()
            .join("|");

        Self {
            article_selector: Selector::parse("article").unwrap(),
            article_css: "article".to_string(),
            link_selector: Selector::parse(r#"a[href*="standvirtual.com"]"#).unwrap(),
            title_selector: Selector::parse(r#"h2, h3, [data-testid="ad-title"]"#).unwrap(),
            image_selector: Selector::parse("img").unwrap(),
            price_selectors: vec![
                Selector::parse(r#"[class*="price"]"#).unwrap(),
                Selector::parse(r#"[data-testid="ad-price"]"#).unwrap(),
                Selector::parse(r#"p[class*="Price"]"#).unwrap(),
                Selector::parse(r#"span[class*="price"]"#).unwrap(),
            ],
            load_more_css: r#"button[class*="load"], button[class*="more"], [class*="loadMore"]"#
                .to_string(),
            price_re: Regex::new(&format!(r"(?i)(\d[\d\s]*)\s*(?:{currency})")).unwrap(),
            date_re: Regex::new(&format!(r"(?i)({months})\s*·?\s*(\d{{4}})")).unwrap(),
            km_re: Regex::new(r"(?i)\d{4}\s*·?\s*(\d[\d\s]*)\s*km").unwrap(),
            fuel_keywords: fuel_keywords.iter().map(|kw| kw.to_string()).collect(),
            brand_categories: brand_categories
                .iter()
                .map(|(keyword, category)| (keyword.to_string(), *category))
                .collect(),
        }
    }
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self::new(
            &LISTING_MONTHS,
            &CURRENCY_MARKERS,
            &ELECTRIC_KEYWORDS,
            &BRAND_CATEGORIES,
        )
    }
}

/// Extracted fields for one listing fragment, before dedup and ids
#[derive(Debug, Clone, PartialEq)]
pub struct RawVehicle {
    pub brand: String,
    pub model: String,
    pub full_title: String,
    pub price: String,
    pub image: String,
    pub link: String,
    pub fuel: Fuel,
    pub date: String,
    pub km: String,
}

/// A listing page after navigation and scrolling finished
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after redirects; relative references resolve against it
    pub url: Url,
    pub html: String,
}
