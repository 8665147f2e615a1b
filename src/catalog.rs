use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::models::{Catalog, Category, Vehicle};
use crate::scrapers::types::{ExtractionRules, RawVehicle};

/// Merge raw records from all pages into the final record set.
///
/// The advert link identifies a vehicle, so the first occurrence wins and
/// later duplicates are dropped. Survivors get contiguous ids from 1 in
/// arrival order, plus a category bucket for the storefront filter.
pub fn normalize(raw: Vec<RawVehicle>, rules: &ExtractionRules) -> Vec<Vehicle> {
    let mut seen = HashSet::new();
    let mut vehicles: Vec<Vehicle> = Vec::new();

    for record in raw {
        if !seen.insert(record.link.clone()) {
            debug!("Dropping duplicate listing {}", record.link);
            continue;
        }

        let category = classify_brand(&record.brand, rules);
        vehicles.push(Vehicle {
            id: vehicles.len() as u32 + 1,
            brand: record.brand,
            model: record.model,
            full_title: record.full_title,
            price: record.price,
            image: record.image,
            link: record.link,
            fuel: record.fuel,
            date: record.date,
            km: record.km,
            category,
        });
    }

    vehicles
}

/// Bucket a brand for the client-side filter; anything unrecognized lands
/// in `outros`
fn classify_brand(brand: &str, rules: &ExtractionRules) -> Category {
    let lowered = brand.to_lowercase();
    rules
        .brand_categories
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword.as_str()))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Outros)
}

/// Replace the catalog file in one step.
///
/// The document is staged in the target directory and renamed over the old
/// file, so a crash mid-write never leaves readers a half-written catalog.
pub fn write_catalog(catalog: &Catalog, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(catalog).context("Failed to serialize catalog")?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to stage catalog in {}", dir.display()))?;
    staged
        .write_all(json.as_bytes())
        .context("Failed to write catalog contents")?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    info!(
        "💾 Saved {} vehicles to {}",
        catalog.total_vehicles,
        path.display()
    );
    Ok(())
}
