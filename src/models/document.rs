use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::FileSlots;

/// One compliance filing.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PulpDocument {
    pub id: Uuid,
    pub user_id: Uuid,

    // Basic details
    pub trade_name: Option<String>,
    pub commodities: Option<String>,
    pub species_names: Option<String>,
    pub quantity: Option<f64>,

    // Location info
    pub supplier_country: Option<String>,
    pub production_country: Option<String>,
    pub wood_origin_country: Option<String>,
    pub geolocation_polygon: Option<String>,
    pub harvest_dates: Option<String>,

    // Contact details
    pub supplier_details: Option<String>,
    pub producer_details: Option<String>,
    pub geolocation_owner_details: Option<String>,

    pub files: Json<FileSlots>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied fields of a new filing. The owner comes from the
/// credential, never from the body; unrecognised keys (`userId`, `_id`, ...)
/// are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPulpDocument {
    pub trade_name: Option<String>,
    pub commodities: Option<String>,
    pub species_names: Option<String>,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub quantity: Option<f64>,

    pub supplier_country: Option<String>,
    pub production_country: Option<String>,
    pub wood_origin_country: Option<String>,
    pub geolocation_polygon: Option<String>,
    pub harvest_dates: Option<String>,

    pub supplier_details: Option<String>,
    pub producer_details: Option<String>,
    pub geolocation_owner_details: Option<String>,

    pub files: Option<FileSlots>,
}

/// Accepts `10`, `"10"` and `"2.5"`; a blank string counts as absent.
fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("quantity is not a number: {text:?}")))
        }
    }
}

impl NewPulpDocument {
    fn text_fields(&self) -> [(&'static str, Option<&str>); 11] {
        [
            ("tradeName", self.trade_name.as_deref()),
            ("commodities", self.commodities.as_deref()),
            ("speciesNames", self.species_names.as_deref()),
            ("supplierCountry", self.supplier_country.as_deref()),
            ("productionCountry", self.production_country.as_deref()),
            ("woodOriginCountry", self.wood_origin_country.as_deref()),
            ("geolocationPolygon", self.geolocation_polygon.as_deref()),
            ("harvestDates", self.harvest_dates.as_deref()),
            ("supplierDetails", self.supplier_details.as_deref()),
            ("producerDetails", self.producer_details.as_deref()),
            ("geolocationOwnerDetails", self.geolocation_owner_details.as_deref()),
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        // Postgres text cannot hold NUL
        for (name, value) in self.text_fields() {
            if value.is_some_and(|v| v.contains('\0')) {
                return Err(format!("{name} must not contain NUL characters"));
            }
        }
        if let Some(quantity) = self.quantity {
            if !quantity.is_finite() || quantity < 0.0 {
                return Err("quantity must be a non-negative number".to_string());
            }
        }
        Ok(())
    }

    pub fn file_slots(&self) -> FileSlots {
        self.files.clone().unwrap_or_default()
    }
}
