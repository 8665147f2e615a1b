use crate::catalog::normalize;
use crate::models::{Fuel, Vehicle};
use crate::scrapers::browser::StandVirtualBrowser;
use crate::scrapers::traits::{PageFetcher, VehicleSource};
use crate::scrapers::types::{ExtractionRules, RawVehicle, RenderedPage, ScrapeParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, info};
use url::Url;

/// StandVirtual scraper implementation
pub struct StandVirtualScraper {
    params: ScrapeParams,
    rules: ExtractionRules,
}

impl StandVirtualScraper {
    /// Create a scraper with the default storefront parameters
    pub fn new(params: ScrapeParams) -> Self {
        Self {
            params,
            rules: ExtractionRules::default(),
        }
    }

    /// Create a scraper with a custom extraction rule set
    pub fn with_rules(params: ScrapeParams, rules: ExtractionRules) -> Self {
        Self { params, rules }
    }
}

#[async_trait]
impl VehicleSource for StandVirtualScraper {
    async fn scrape(&self) -> Result<Vec<Vehicle>> {
        info!("Starting StandVirtual scrape of {}", self.params.base_url);

        let params = self.params.clone();
        let rules = self.rules.clone();

        // headless_chrome drives the tab with blocking calls, so the whole
        // sequential run stays off the async workers
        let vehicles = tokio::task::spawn_blocking(move || -> Result<Vec<Vehicle>> {
            let fetcher = StandVirtualBrowser::launch(&params, &rules)?;
            let raw = collect_vehicles(&fetcher, &rules, params.max_pages)?;
            Ok(normalize(raw, &rules))
        })
        .await
        .context("Scrape worker thread panicked")??;

        info!("✅ Scrape finished with {} unique vehicles", vehicles.len());
        Ok(vehicles)
    }

    fn source_url(&self) -> &str {
        &self.params.base_url
    }

    fn source_name(&self) -> &'static str {
        "StandVirtual"
    }
}

/// Walk the paginated listing and accumulate raw records in fetch order.
///
/// Stops at the page ceiling, on a page without fragments, or on a page
/// whose fragments yield no records; only fetch failures abort the run.
pub fn collect_vehicles(
    fetcher: &dyn PageFetcher,
    rules: &ExtractionRules,
    max_pages: u32,
) -> Result<Vec<RawVehicle>> {
    let mut all = Vec::new();

    for page_index in 1..=max_pages {
        let Some(page) = fetcher.fetch_page(page_index)? else {
            break;
        };

        let vehicles = extract_vehicles(&page, rules);
        if vehicles.is_empty() {
            info!("Page {} yielded no records, stopping pagination", page_index);
            break;
        }

        info!("Page {}: {} records extracted", page_index, vehicles.len());
        all.extend(vehicles);
    }

    Ok(all)
}

/// Pull every recognizable vehicle record out of a rendered listing page.
///
/// Fragments missing a link or a title are skipped; any other absent field
/// degrades to an empty value, since one broken card should never sink the
/// rest of the page.
pub fn extract_vehicles(page: &RenderedPage, rules: &ExtractionRules) -> Vec<RawVehicle> {
    let document = Html::parse_document(&page.html);
    let fragments: Vec<_> = document.select(&rules.article_selector).collect();
    debug!("Found {} listing fragments", fragments.len());

    let mut vehicles = Vec::new();
    for fragment in fragments {
        match extract_fragment(fragment, &page.url, rules) {
            Some(vehicle) => vehicles.push(vehicle),
            None => debug!("Skipped a fragment missing link or title"),
        }
    }

    vehicles
}

/// Extract one vehicle from a listing fragment
fn extract_fragment(
    fragment: ElementRef<'_>,
    page_url: &Url,
    rules: &ExtractionRules,
) -> Option<RawVehicle> {
    let link = fragment
        .select(&rules.link_selector)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .and_then(|href| absolutize(page_url, href))?;

    let full_title = fragment
        .select(&rules.title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())?;

    // Brand is the first word of the title, model the rest
    let mut words = full_title.split_whitespace();
    let brand = words.next().unwrap_or_default().to_string();
    let model = words.collect::<Vec<_>>().join(" ");

    let text = fragment.text().collect::<String>();

    let image = fragment
        .select(&rules.image_selector)
        .next()
        .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
        .and_then(|src| absolutize(page_url, src))
        .unwrap_or_default();

    Some(RawVehicle {
        brand,
        model,
        full_title,
        price: extract_price(fragment, &text, rules),
        image,
        link,
        fuel: classify_fuel(&text, rules),
        date: extract_date(&text, rules),
        km: extract_km(&text, rules),
    })
}

/// Price from a dedicated price-styled element when one matches, falling
/// back to the whole fragment text; digits only, no currency marker
fn extract_price(fragment: ElementRef<'_>, text: &str, rules: &ExtractionRules) -> String {
    for selector in &rules.price_selectors {
        if let Some(el) = fragment.select(selector).next() {
            let styled = el.text().collect::<String>();
            if let Some(price) = match_price(&styled, rules) {
                return price;
            }
        }
    }
    match_price(text, rules).unwrap_or_default()
}

fn match_price(text: &str, rules: &ExtractionRules) -> Option<String> {
    rules
        .price_re
        .captures(text)
        .map(|captures| digits(&captures[1]))
}

/// Month and year the advert went up, as rendered on the card
fn extract_date(text: &str, rules: &ExtractionRules) -> String {
    rules
        .date_re
        .captures(text)
        .map(|captures| format!("{} {}", &captures[1], &captures[2]))
        .unwrap_or_default()
}

/// Mileage figure. The cards always render it right after the year, which
/// keeps price digits from being misread as kilometers.
fn extract_km(text: &str, rules: &ExtractionRules) -> String {
    let Some(captures) = rules.km_re.captures(text) else {
        return String::new();
    };
    let stripped = digits(&captures[1]);
    match stripped.parse::<u64>() {
        Ok(value) => group_thousands(value),
        Err(_) => stripped,
    }
}

fn classify_fuel(text: &str, rules: &ExtractionRules) -> Fuel {
    let lowered = text.to_lowercase();
    if rules
        .fuel_keywords
        .iter()
        .any(|keyword| lowered.contains(keyword.as_str()))
    {
        Fuel::Eletrico
    } else {
        Fuel::Hibrido
    }
}

/// Keep only ASCII digits, dropping grouping spaces and currency noise
fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Render a mileage figure the way the storefront does: space-grouped
/// thousands, so 15000 becomes "15 000"
fn group_thousands(value: u64) -> String {
    let raw = value.to_string();
    let len = raw.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    grouped
}

/// Resolve an href or src against the page it came from
fn absolutize(page_url: &Url, reference: &str) -> Option<String> {
    page_url.join(reference).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use std::cell::RefCell;

    const PAGE_URL: &str = "https://dealer.standvirtual.com/inventory";

    fn rules() -> ExtractionRules {
        ExtractionRules::default()
    }

    fn rendered(html: &str) -> RenderedPage {
        RenderedPage {
            url: Url::parse(PAGE_URL).unwrap(),
            html: html.to_string(),
        }
    }

    fn advert(slug: &str, title: &str) -> String {
        format!(
            "<article>\
             <a href=\"https://dealer.standvirtual.com/anuncio/{slug}\">ver</a>\
             <h2>{title}</h2>\
             <p class=\"ad-price\">32 000 EUR</p>\
             </article>"
        )
    }

    struct ScriptedFetcher {
        pages: Vec<Option<String>>,
        requested: RefCell<Vec<u32>>,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<Option<String>>) -> Self {
            Self {
                pages,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl PageFetcher for ScriptedFetcher {
        fn fetch_page(&self, page_index: u32) -> Result<Option<RenderedPage>> {
            self.requested.borrow_mut().push(page_index);
            let html = self.pages.get(page_index as usize - 1).cloned().flatten();
            Ok(html.map(|html| rendered(&html)))
        }
    }

    #[test]
    fn extracts_every_field_from_a_complete_fragment() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/tesla-model-3">ver anúncio</a>
                <img src="https://img.standvirtual.com/tesla-model-3.webp">
                <h2>Tesla Model 3 Long Range</h2>
                <p class="ad-price">71 500 EUR</p>
                <p>Elétrico · Março · 2021 · 15 000 km</p>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records.len(), 1);

        let vehicle = &records[0];
        assert_eq!(vehicle.brand, "Tesla");
        assert_eq!(vehicle.model, "Model 3 Long Range");
        assert_eq!(vehicle.full_title, "Tesla Model 3 Long Range");
        assert_eq!(vehicle.price, "71500");
        assert_eq!(
            vehicle.link,
            "https://dealer.standvirtual.com/anuncio/tesla-model-3"
        );
        assert_eq!(vehicle.image, "https://img.standvirtual.com/tesla-model-3.webp");
        assert_eq!(vehicle.fuel, Fuel::Eletrico);
        assert_eq!(vehicle.date, "Março 2021");
        assert_eq!(vehicle.km, "15 000");
    }

    #[test]
    fn missing_details_degrade_to_empty_fields() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/kia-ev6">ver</a>
                <h3>Kia EV6 GT-Line</h3>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records.len(), 1);

        let vehicle = &records[0];
        assert_eq!(vehicle.brand, "Kia");
        assert_eq!(vehicle.model, "EV6 GT-Line");
        assert_eq!(vehicle.price, "");
        assert_eq!(vehicle.image, "");
        assert_eq!(vehicle.date, "");
        assert_eq!(vehicle.km, "");
        assert_eq!(vehicle.fuel, Fuel::Hibrido);
    }

    #[test]
    fn fragment_without_a_link_is_dropped() {
        let html = "<article><h2>Tesla Model Y</h2></article>";
        assert!(extract_vehicles(&rendered(html), &rules()).is_empty());
    }

    #[test]
    fn fragment_without_a_title_is_dropped() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/sem-titulo">ver</a>
                <p>45 000 EUR</p>
            </article>
        "#;
        assert!(extract_vehicles(&rendered(html), &rules()).is_empty());
    }

    #[test]
    fn price_prefers_the_styled_element_over_surrounding_text() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/bmw-i4">ver</a>
                <h2>BMW i4 eDrive40</h2>
                <p>financiamento desde 9 999 EUR</p>
                <span class="offer-price">58 900 EUR</span>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records[0].price, "58900");
    }

    #[test]
    fn price_falls_back_to_the_whole_fragment_text() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/mercedes-eqa">ver</a>
                <h2>Mercedes-Benz EQA 250</h2>
                <div>Por apenas 39 900 EUR este mês</div>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records[0].price, "39900");
    }

    #[test]
    fn euro_sign_counts_as_a_currency_marker() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/hyundai-kauai">ver</a>
                <h2>Hyundai Kauai EV</h2>
                <span class="ad-price">28 500 €</span>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records[0].price, "28500");
    }

    #[test]
    fn castilian_spelling_still_reads_as_electric() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/nissan-leaf">ver</a>
                <h2>Nissan Leaf</h2>
                <p>Motor 100% eléctrico</p>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records[0].fuel, Fuel::Eletrico);
    }

    #[test]
    fn mileage_needs_the_leading_year_to_match() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/sem-ano">ver</a>
                <h2>Tesla Model S</h2>
                <p>apenas 12 000 km</p>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records[0].km, "");
    }

    #[test]
    fn mileage_digits_are_regrouped_with_spaces() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/compacto">ver</a>
                <h2>BMW iX3</h2>
                <p>2022 · 41500 km</p>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records[0].km, "41 500");
    }

    #[test]
    fn relative_image_paths_resolve_against_the_page() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/foto-relativa">ver</a>
                <img src="/media/foto.webp">
                <h2>Tesla Model X</h2>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(
            records[0].image,
            "https://dealer.standvirtual.com/media/foto.webp"
        );
    }

    #[test]
    fn lazy_images_fall_back_to_data_src() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/lazy">ver</a>
                <img data-src="https://img.standvirtual.com/lazy.webp">
                <h2>Hyundai Ioniq 5</h2>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records[0].image, "https://img.standvirtual.com/lazy.webp");
    }

    #[test]
    fn titles_can_come_from_the_testid_node() {
        let html = r#"
            <article>
                <a href="https://dealer.standvirtual.com/anuncio/sem-heading">ver</a>
                <p data-testid="ad-title">Renault Megane E-Tech</p>
            </article>
        "#;

        let records = extract_vehicles(&rendered(html), &rules());
        assert_eq!(records[0].full_title, "Renault Megane E-Tech");
        assert_eq!(records[0].brand, "Renault");
    }

    #[test]
    fn pagination_stops_after_an_empty_page() {
        let fetcher = ScriptedFetcher::new(vec![
            Some(advert("um", "Tesla Model 3")),
            None,
            Some(advert("tres", "BMW i3")),
        ]);

        let records = collect_vehicles(&fetcher, &rules(), 3).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(*fetcher.requested.borrow(), vec![1, 2]);
    }

    #[test]
    fn pagination_stops_when_a_page_extracts_nothing() {
        let fetcher = ScriptedFetcher::new(vec![
            Some(advert("um", "Tesla Model 3")),
            Some("<p>sem anúncios</p>".to_string()),
            Some(advert("tres", "BMW i3")),
        ]);

        let records = collect_vehicles(&fetcher, &rules(), 3).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(*fetcher.requested.borrow(), vec![1, 2]);
    }

    #[test]
    fn pagination_honors_the_page_ceiling() {
        let fetcher = ScriptedFetcher::new(vec![
            Some(advert("um", "Tesla Model 3")),
            Some(advert("dois", "BMW i3")),
            Some(advert("tres", "Hyundai Kona")),
        ]);

        let records = collect_vehicles(&fetcher, &rules(), 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(*fetcher.requested.borrow(), vec![1, 2]);
    }

    #[test]
    fn overlapping_pages_merge_into_one_numbered_catalog() {
        let page_one = format!("{}{}", advert("a", "Tesla Model Y"), advert("b", "BMW iX1"));
        let page_two = format!(
            "{}{}",
            advert("b", "BMW iX1"),
            advert("c", "Hyundai Kauai EV")
        );
        let fetcher = ScriptedFetcher::new(vec![Some(page_one), Some(page_two)]);

        let raw = collect_vehicles(&fetcher, &rules(), 3).unwrap();
        assert_eq!(raw.len(), 4);

        let vehicles = normalize(raw, &rules());
        assert_eq!(vehicles.len(), 3);
        assert_eq!(
            vehicles.iter().map(|v| v.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(vehicles[0].link.ends_with("/anuncio/a"));
        assert!(vehicles[1].link.ends_with("/anuncio/b"));
        assert!(vehicles[2].link.ends_with("/anuncio/c"));
        assert_eq!(vehicles[0].category, Category::Tesla);
        assert_eq!(vehicles[1].category, Category::Bmw);
        assert_eq!(vehicles[2].category, Category::Hyundai);
    }
}
