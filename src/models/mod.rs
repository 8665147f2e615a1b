use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Drivetrain shown on the listing card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Fuel {
    #[serde(rename = "Elétrico")]
    Eletrico,
    #[serde(rename = "Híbrido")]
    Hibrido,
}

/// Brand bucket consumed by the storefront's client-side filter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tesla,
    Bmw,
    Mercedes,
    Hyundai,
    Outros,
}

/// Core vehicle data model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: u32,
    pub brand: String,
    pub model: String,
    pub full_title: String,
    pub price: String,
    pub image: String,
    pub link: String,
    pub fuel: Fuel,
    pub date: String,
    pub km: String,
    pub category: Category,
}

/// Document persisted to disk and returned by the on-demand endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub last_update: DateTime<Utc>,
    pub total_vehicles: usize,
    pub source_url: String,
    pub vehicles: Vec<Vehicle>,
}

impl Catalog {
    /// Wrap a record set, stamping the generation time and total
    pub fn new(vehicles: Vec<Vehicle>, source_url: impl Into<String>) -> Self {
        Self {
            last_update: Utc::now(),
            total_vehicles: vehicles.len(),
            source_url: source_url.into(),
            vehicles,
        }
    }
}
