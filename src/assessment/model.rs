//! Assessment document and section payload models.
//!
//! The JSON form is camelCase throughout; it is both the wire format of the
//! HTTP surface and the stored document body.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::steps::{STEP_COUNT, Step};

/// Personal contact details (step 1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// The user's electric vehicle (step 2).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleInfo {
    pub brand: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// The home's electrical panel (step 3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElectricalPanelInfo {
    pub location: String,
    /// Main breaker rating in amperes.
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub main_breaker_capacity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_open_slots: Option<i32>,
}

/// Where the charger would be mounted (step 4).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChargerLocationInfo {
    pub location: String,
    /// Cable run from the panel, in metres.
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub distance_from_panel: Option<Decimal>,
}

/// Postal address of the home.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub country: String,
    pub city: String,
    pub street: String,
    pub street_number: String,
    pub postal_code: String,
}

/// The home itself (step 5).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HomeInfo {
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_high_energy_devices: Option<i32>,
}

/// A wall charger, owned or wanted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChargerSpec {
    pub brand: String,
    pub model: String,
    /// Rated power in kW.
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub power_kw: Option<Decimal>,
}

/// EV charger ownership and purchase intent (step 6).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvChargerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_charger: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wants_to_buy: Option<bool>,
    pub charger: ChargerSpec,
}

/// Mutually exclusive charger intent buckets used in reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargerIntent {
    AlreadyHas,
    WantsToBuy,
    Neither,
}

impl EvChargerInfo {
    /// Classify the ownership/purchase flags. `None` when the flags do not
    /// form one of the three recognised combinations.
    pub fn intent(&self) -> Option<ChargerIntent> {
        match (self.has_charger, self.wants_to_buy) {
            (Some(true), _) => Some(ChargerIntent::AlreadyHas),
            (Some(false), Some(true)) => Some(ChargerIntent::WantsToBuy),
            (Some(false), Some(false)) => Some(ChargerIntent::Neither),
            _ => None,
        }
    }
}

/// One section payload, tagged by the step it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "section", content = "payload", rename_all = "snake_case")]
pub enum SectionPayload {
    Personal(PersonalInfo),
    Vehicle(VehicleInfo),
    ElectricalPanel(ElectricalPanelInfo),
    ChargerLocation(ChargerLocationInfo),
    Home(HomeInfo),
    EvCharger(EvChargerInfo),
}

impl SectionPayload {
    /// The step this payload fills in.
    pub fn step(&self) -> Step {
        match self {
            Self::Personal(_) => Step::Personal,
            Self::Vehicle(_) => Step::Vehicle,
            Self::ElectricalPanel(_) => Step::ElectricalPanel,
            Self::ChargerLocation(_) => Step::ChargerLocation,
            Self::Home(_) => Step::Home,
            Self::EvCharger(_) => Step::EvCharger,
        }
    }
}

/// Completion classification of a stored assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Completed,
    Incomplete,
    Abandoned,
}

impl Classification {
    /// The one classification rule, shared by the wizard and all reports.
    pub fn of(current_page: u32, is_complete: bool) -> Self {
        if is_complete {
            Self::Completed
        } else if current_page == 0 {
            Self::Abandoned
        } else {
            Self::Incomplete
        }
    }

    pub const ALL: [Classification; 3] = [Self::Completed, Self::Incomplete, Self::Abandoned];
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Abandoned => "abandoned",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "incomplete" => Ok(Self::Incomplete),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(format!("unknown classification: {other}")),
        }
    }
}

/// Identity of a stored assessment: the id plus its partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentKey {
    pub id: Uuid,
    pub customer_id: String,
}

/// The aggregate survey document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: Uuid,
    /// Partition key. Required on every read and update.
    pub customer_id: String,
    /// Number of steps passed; `STEP_COUNT` once finished.
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Server-assigned time of the last stored write. The store column is
    /// authoritative; older documents do not carry it in the body.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Concurrency token, bumped by the store on every replace.
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<PersonalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_info: Option<VehicleInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electrical_panel: Option<ElectricalPanelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charger_location: Option<ChargerLocationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_info: Option<HomeInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ev_charger: Option<EvChargerInfo>,
}

impl Assessment {
    /// A fresh, not-yet-started document.
    pub fn new(customer_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id: customer_id.into(),
            current_page: 0,
            is_complete: false,
            created_at: now,
            completed_at: None,
            updated_at: now,
            version: 0,
            personal_info: None,
            vehicle_info: None,
            electrical_panel: None,
            charger_location: None,
            home_info: None,
            ev_charger: None,
        }
    }

    /// Builder: attach the personal section.
    pub fn with_personal(mut self, personal: PersonalInfo) -> Self {
        self.personal_info = Some(personal);
        self
    }

    pub fn key(&self) -> AssessmentKey {
        AssessmentKey {
            id: self.id,
            customer_id: self.customer_id.clone(),
        }
    }

    pub fn classification(&self) -> Classification {
        Classification::of(self.current_page, self.is_complete)
    }

    /// Store a section payload in its slot.
    pub fn set_section(&mut self, payload: SectionPayload) {
        match payload {
            SectionPayload::Personal(p) => self.personal_info = Some(p),
            SectionPayload::Vehicle(v) => self.vehicle_info = Some(v),
            SectionPayload::ElectricalPanel(p) => self.electrical_panel = Some(p),
            SectionPayload::ChargerLocation(c) => self.charger_location = Some(c),
            SectionPayload::Home(h) => self.home_info = Some(h),
            SectionPayload::EvCharger(e) => self.ev_charger = Some(e),
        }
    }

    /// Copy all section payloads from `other`, leaving identity and progress alone.
    pub fn replace_sections_from(&mut self, other: &Assessment) {
        self.personal_info = other.personal_info.clone();
        self.vehicle_info = other.vehicle_info.clone();
        self.electrical_panel = other.electrical_panel.clone();
        self.charger_location = other.charger_location.clone();
        self.home_info = other.home_info.clone();
        self.ev_charger = other.ev_charger.clone();
    }

    /// Equality ignoring server-assigned fields (`updatedAt`, `version`).
    pub fn same_content(&self, other: &Assessment) -> bool {
        self.id == other.id
            && self.customer_id == other.customer_id
            && self.current_page == other.current_page
            && self.is_complete == other.is_complete
            && self.created_at == other.created_at
            && self.completed_at == other.completed_at
            && self.personal_info == other.personal_info
            && self.vehicle_info == other.vehicle_info
            && self.electrical_panel == other.electrical_panel
            && self.charger_location == other.charger_location
            && self.home_info == other.home_info
            && self.ev_charger == other.ev_charger
    }

    /// Check the document-level progress invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.current_page as usize > STEP_COUNT {
            return Err(format!(
                "currentPage {} exceeds step count {STEP_COUNT}",
                self.current_page
            ));
        }
        if self.is_complete && self.current_page as usize != STEP_COUNT {
            return Err("complete assessment must be on the final page".to_string());
        }
        if self.is_complete != self.completed_at.is_some() {
            return Err("completedAt must be set exactly when complete".to_string());
        }
        Ok(())
    }

    /// City from the home address, if entered.
    pub fn city(&self) -> Option<&str> {
        self.home_info
            .as_ref()
            .map(|h| h.address.city.as_str())
            .filter(|c| !c.is_empty())
    }

    /// Vehicle brand, if entered.
    pub fn vehicle_brand(&self) -> Option<&str> {
        self.vehicle_info
            .as_ref()
            .map(|v| v.brand.as_str())
            .filter(|b| !b.is_empty())
    }

    /// Charger brand, if entered.
    pub fn charger_brand(&self) -> Option<&str> {
        self.ev_charger
            .as_ref()
            .map(|e| e.charger.brand.as_str())
            .filter(|b| !b.is_empty())
    }

    pub fn charger_intent(&self) -> Option<ChargerIntent> {
        self.ev_charger.as_ref().and_then(EvChargerInfo::intent)
    }

    /// "First Last" when the personal section has a name.
    pub fn full_name(&self) -> Option<String> {
        let p = self.personal_info.as_ref()?;
        let name = format!("{} {}", p.first_name, p.last_name);
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Minutes from creation to completion, for completed documents.
    pub fn completion_minutes(&self) -> Option<f64> {
        if !self.is_complete {
            return None;
        }
        let completed = self.completed_at?;
        Some((completed - self.created_at).num_milliseconds() as f64 / 60_000.0)
    }
}
