//! Reference data: the pick-lists the wizard offers.
//!
//! Read-only. Built-in defaults, optionally replaced by a JSON file.

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One charger model with its rated power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargerModel {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub power_kw: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargerBrand {
    pub name: String,
    pub models: Vec<ChargerModel>,
}

/// All pick-lists served to the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCatalog {
    pub panel_locations: Vec<String>,
    pub charger_locations: Vec<String>,
    pub charger_brands: Vec<ChargerBrand>,
}

/// Source of the pick-lists.
pub trait ReferenceData: Send + Sync {
    fn catalog(&self) -> &ReferenceCatalog;
}

/// Reference data held in memory.
pub struct StaticReferenceData {
    catalog: ReferenceCatalog,
}

impl StaticReferenceData {
    pub fn new(catalog: ReferenceCatalog) -> Self {
        Self { catalog }
    }

    /// The built-in lists.
    pub fn builtin() -> Self {
        fn model(name: &str, power_kw: Decimal) -> ChargerModel {
            ChargerModel {
                name: name.to_string(),
                power_kw,
            }
        }
        fn brand(name: &str, models: Vec<ChargerModel>) -> ChargerBrand {
            ChargerBrand {
                name: name.to_string(),
                models,
            }
        }
        let locations = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self::new(ReferenceCatalog {
            panel_locations: locations(&[
                "Basement", "Garage", "Hallway", "Utility room", "Outside wall", "Other",
            ]),
            charger_locations: locations(&[
                "Garage", "Carport", "Driveway", "Outside wall", "Parking space", "Other",
            ]),
            charger_brands: vec![
                brand(
                    "ABB",
                    vec![model("Terra AC", dec!(11)), model("Terra AC 22", dec!(22))],
                ),
                brand("Easee", vec![model("One", dec!(22)), model("Charge", dec!(22))]),
                brand("Tesla", vec![model("Wall Connector", dec!(11))]),
                brand(
                    "Wallbox",
                    vec![
                        model("Pulsar Plus", dec!(7.4)),
                        model("Pulsar Plus 11", dec!(11)),
                        model("Commander 2", dec!(22)),
                    ],
                ),
                brand("Zaptec", vec![model("Go", dec!(22)), model("Pro", dec!(22))]),
            ],
        })
    }

    /// Load the catalog from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let catalog: ReferenceCatalog = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::ParseError(format!("reference data {}: {e}", path.display()))
        })?;
        Ok(Self::new(catalog))
    }
}

impl ReferenceData for StaticReferenceData {
    fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }
}

/// GET /reference
async fn get_reference(State(reference): State<Arc<dyn ReferenceData>>) -> Json<ReferenceCatalog> {
    Json(reference.catalog().clone())
}

/// Build the reference-data route.
pub fn reference_routes(reference: Arc<dyn ReferenceData>) -> Router {
    Router::new()
        .route("/reference", get(get_reference))
        .with_state(reference)
}
