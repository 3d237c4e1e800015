//! Step definition table: the six ordered survey sections and their
//! validity predicates.
//!
//! Pure data and pure functions. The wizard, the finish gate and the
//! reporting side all read the same table.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::model::{
    Assessment, ChargerLocationInfo, ChargerSpec, ElectricalPanelInfo, EvChargerInfo, HomeInfo,
    PersonalInfo, VehicleInfo,
};

/// Number of steps in the survey.
pub const STEP_COUNT: usize = 6;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10,15}$").expect("phone pattern compiles"));

/// The survey sections, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Personal,
    Vehicle,
    ElectricalPanel,
    ChargerLocation,
    Home,
    EvCharger,
}

impl Step {
    /// All steps in survey order.
    pub const ALL: [Step; STEP_COUNT] = [
        Step::Personal,
        Step::Vehicle,
        Step::ElectricalPanel,
        Step::ChargerLocation,
        Step::Home,
        Step::EvCharger,
    ];

    /// Zero-based position in the survey.
    pub fn index(self) -> usize {
        match self {
            Self::Personal => 0,
            Self::Vehicle => 1,
            Self::ElectricalPanel => 2,
            Self::ChargerLocation => 3,
            Self::Home => 4,
            Self::EvCharger => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Self::ALL.get(index).copied()
    }

    /// The last step; leaving it forward means finishing.
    pub fn last() -> Step {
        Self::ALL[STEP_COUNT - 1]
    }

    /// Human-readable section title.
    pub fn title(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Vehicle => "Vehicle",
            Self::ElectricalPanel => "Electrical Panel",
            Self::ChargerLocation => "Charger Location",
            Self::Home => "Home",
            Self::EvCharger => "EV Charger",
        }
    }

    /// Field-level problems with this step's payload in `doc`.
    /// Empty means the validity predicate holds.
    pub fn issues(self, doc: &Assessment) -> Vec<FieldIssue> {
        match self {
            Self::Personal => section_issues(doc.personal_info.as_ref(), personal_issues),
            Self::Vehicle => section_issues(doc.vehicle_info.as_ref(), vehicle_issues),
            Self::ElectricalPanel => section_issues(doc.electrical_panel.as_ref(), panel_issues),
            Self::ChargerLocation => {
                section_issues(doc.charger_location.as_ref(), charger_location_issues)
            }
            Self::Home => section_issues(doc.home_info.as_ref(), home_issues),
            Self::EvCharger => section_issues(doc.ev_charger.as_ref(), ev_charger_issues),
        }
    }

    /// The validity predicate.
    pub fn is_valid(self, doc: &Assessment) -> bool {
        self.issues(doc).is_empty()
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Personal => "personal",
            Self::Vehicle => "vehicle",
            Self::ElectricalPanel => "electrical_panel",
            Self::ChargerLocation => "charger_location",
            Self::Home => "home",
            Self::EvCharger => "ev_charger",
        };
        write!(f, "{s}")
    }
}

/// One failing field within a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// camelCase path within the section, e.g. `charger.brand`.
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A step whose predicate does not hold, with the reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: Step,
    pub issues: Vec<FieldIssue>,
}

/// Evaluate every step against `doc`; returns only the failing ones, in order.
pub fn validate_all(doc: &Assessment) -> Vec<StepFailure> {
    Step::ALL
        .iter()
        .filter_map(|&step| {
            let issues = step.issues(doc);
            (!issues.is_empty()).then_some(StepFailure { step, issues })
        })
        .collect()
}

/// Strip separators and a leading `+` / `00` international prefix.
pub fn normalize_phone(raw: &str) -> String {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.' | '/'))
        .collect();
    let compact = compact.strip_prefix('+').unwrap_or(&compact);
    compact.strip_prefix("00").unwrap_or(compact).to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(&normalize_phone(phone))
}

fn section_issues<T>(section: Option<&T>, check: fn(&T) -> Vec<FieldIssue>) -> Vec<FieldIssue> {
    match section {
        Some(s) => check(s),
        None => vec![FieldIssue::new("", "section has not been filled in")],
    }
}

fn require_text(issues: &mut Vec<FieldIssue>, field: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(FieldIssue::new(field, "is required"));
    }
}

fn require_non_negative(issues: &mut Vec<FieldIssue>, field: &str, value: Option<i32>) {
    match value {
        None => issues.push(FieldIssue::new(field, "is required")),
        Some(n) if n < 0 => issues.push(FieldIssue::new(field, "must not be negative")),
        Some(_) => {}
    }
}

fn personal_issues(p: &PersonalInfo) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    require_text(&mut issues, "firstName", &p.first_name);
    require_text(&mut issues, "lastName", &p.last_name);
    if !is_valid_email(&p.email) {
        issues.push(FieldIssue::new("email", "must be a valid email address"));
    }
    if !is_valid_phone(&p.phone) {
        issues.push(FieldIssue::new("phone", "must contain 10 to 15 digits"));
    }
    issues
}

fn vehicle_issues(v: &VehicleInfo) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    require_text(&mut issues, "brand", &v.brand);
    require_text(&mut issues, "model", &v.model);
    if v.year.is_none() {
        issues.push(FieldIssue::new("year", "is required"));
    }
    issues
}

fn panel_issues(p: &ElectricalPanelInfo) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    require_text(&mut issues, "location", &p.location);
    match p.main_breaker_capacity {
        Some(c) if c > Decimal::ZERO => {}
        Some(_) => issues.push(FieldIssue::new(
            "mainBreakerCapacity",
            "must be greater than zero",
        )),
        None => issues.push(FieldIssue::new("mainBreakerCapacity", "is required")),
    }
    require_non_negative(&mut issues, "numberOfOpenSlots", p.number_of_open_slots);
    issues
}

fn charger_location_issues(c: &ChargerLocationInfo) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    require_text(&mut issues, "location", &c.location);
    match c.distance_from_panel {
        Some(d) if d >= Decimal::ZERO => {}
        Some(_) => issues.push(FieldIssue::new("distanceFromPanel", "must not be negative")),
        None => issues.push(FieldIssue::new("distanceFromPanel", "is required")),
    }
    issues
}

fn home_issues(h: &HomeInfo) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    let a = &h.address;
    require_text(&mut issues, "address.country", &a.country);
    require_text(&mut issues, "address.city", &a.city);
    require_text(&mut issues, "address.street", &a.street);
    require_text(&mut issues, "address.streetNumber", &a.street_number);
    require_text(&mut issues, "address.postalCode", &a.postal_code);
    require_non_negative(
        &mut issues,
        "numberOfHighEnergyDevices",
        h.number_of_high_energy_devices,
    );
    issues
}

fn charger_spec_issues(spec: &ChargerSpec) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    require_text(&mut issues, "charger.brand", &spec.brand);
    require_text(&mut issues, "charger.model", &spec.model);
    match spec.power_kw {
        Some(p) if p > Decimal::ZERO => {}
        Some(_) => issues.push(FieldIssue::new("charger.powerKw", "must be greater than zero")),
        None => issues.push(FieldIssue::new("charger.powerKw", "is required")),
    }
    issues
}

fn ev_charger_issues(e: &EvChargerInfo) -> Vec<FieldIssue> {
    match (e.has_charger, e.wants_to_buy) {
        // Owned charger, or one the user intends to buy: specify it.
        (Some(true), _) | (Some(false), Some(true)) => charger_spec_issues(&e.charger),
        // Neither: generic recommendations, nothing else needed.
        (Some(false), Some(false)) => Vec::new(),
        _ => vec![FieldIssue::new(
            "hasCharger",
            "charger ownership and purchase intent must be answered",
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::model::Address;
    use rust_decimal_macros::dec;

    fn valid_doc() -> Assessment {
        let mut doc = Assessment::new("cust");
        doc.personal_info = Some(PersonalInfo {
            first_name: "Milica".into(),
            last_name: "Petrovic".into(),
            email: "milica@example.com".into(),
            phone: "+381 64 123 4567".into(),
        });
        doc.vehicle_info = Some(VehicleInfo {
            brand: "Tesla".into(),
            model: "Model Y".into(),
            year: Some(2023),
        });
        doc.electrical_panel = Some(ElectricalPanelInfo {
            location: "Garage".into(),
            main_breaker_capacity: Some(dec!(63)),
            number_of_open_slots: Some(2),
        });
        doc.charger_location = Some(ChargerLocationInfo {
            location: "Driveway".into(),
            distance_from_panel: Some(dec!(7.5)),
        });
        doc.home_info = Some(HomeInfo {
            address: Address {
                country: "Serbia".into(),
                city: "Novi Sad".into(),
                street: "Bulevar oslobodjenja".into(),
                street_number: "12".into(),
                postal_code: "21000".into(),
            },
            number_of_high_energy_devices: Some(0),
        });
        doc.ev_charger = Some(EvChargerInfo {
            has_charger: Some(false),
            wants_to_buy: Some(false),
            charger: ChargerSpec::default(),
        });
        doc
    }

    #[test]
    fn index_roundtrip_and_order() {
        for (i, step) in Step::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
            assert_eq!(Step::from_index(i), Some(*step));
        }
        assert_eq!(Step::from_index(STEP_COUNT), None);
        assert_eq!(Step::last(), Step::EvCharger);
    }

    #[test]
    fn display_matches_serde() {
        for step in Step::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{step}\""), json, "mismatch for {step:?}");
        }
    }

    #[test]
    fn fully_filled_document_is_valid() {
        let doc = valid_doc();
        assert!(validate_all(&doc).is_empty());
    }

    #[test]
    fn missing_sections_fail() {
        let doc = Assessment::new("cust");
        let failures = validate_all(&doc);
        assert_eq!(failures.len(), STEP_COUNT);
        assert_eq!(failures[0].step, Step::Personal);
    }

    #[test]
    fn personal_rules() {
        let mut doc = valid_doc();
        doc.personal_info = Some(PersonalInfo {
            first_name: " ".into(),
            last_name: "X".into(),
            email: "not-an-email".into(),
            phone: "12345".into(),
        });
        let fields: Vec<String> = Step::Personal
            .issues(&doc)
            .into_iter()
            .map(|i| i.field)
            .collect();
        assert_eq!(fields, vec!["firstName", "email", "phone"]);
    }

    #[test]
    fn phone_normalization() {
        assert!(is_valid_phone("+381641234567"));
        assert!(is_valid_phone("(064) 123-4567"));
        assert!(is_valid_phone("0038164123456"));
        assert!(!is_valid_phone("123456789"));
        assert!(!is_valid_phone("1234567890123456"));
        assert!(!is_valid_phone("064-abc-4567"));
        assert_eq!(normalize_phone(" +1 (555) 010-9999 "), "15550109999");
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn vehicle_requires_year() {
        let mut doc = valid_doc();
        doc.vehicle_info.as_mut().unwrap().year = None;
        assert!(!Step::Vehicle.is_valid(&doc));
    }

    #[test]
    fn panel_scenario_holds() {
        let mut doc = Assessment::new("c");
        doc.electrical_panel = Some(ElectricalPanelInfo {
            location: "Garage".into(),
            main_breaker_capacity: Some(dec!(63)),
            number_of_open_slots: Some(2),
        });
        assert!(Step::ElectricalPanel.is_valid(&doc));

        doc.electrical_panel.as_mut().unwrap().main_breaker_capacity = Some(Decimal::ZERO);
        assert!(!Step::ElectricalPanel.is_valid(&doc));
        doc.electrical_panel.as_mut().unwrap().main_breaker_capacity = Some(dec!(40));
        doc.electrical_panel.as_mut().unwrap().number_of_open_slots = Some(-1);
        assert!(!Step::ElectricalPanel.is_valid(&doc));
        doc.electrical_panel.as_mut().unwrap().number_of_open_slots = Some(0);
        assert!(Step::ElectricalPanel.is_valid(&doc));
    }

    #[test]
    fn charger_location_allows_zero_distance() {
        let mut doc = valid_doc();
        doc.charger_location.as_mut().unwrap().distance_from_panel = Some(Decimal::ZERO);
        assert!(Step::ChargerLocation.is_valid(&doc));
        doc.charger_location.as_mut().unwrap().distance_from_panel = Some(dec!(-1));
        assert!(!Step::ChargerLocation.is_valid(&doc));
    }

    #[test]
    fn home_requires_full_address() {
        let mut doc = valid_doc();
        doc.home_info.as_mut().unwrap().address.postal_code.clear();
        let issues = Step::Home.issues(&doc);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "address.postalCode");
    }

    #[test]
    fn ev_charger_neither_needs_nothing() {
        let doc = valid_doc();
        assert!(Step::EvCharger.is_valid(&doc));
    }

    #[test]
    fn ev_charger_wants_to_buy_needs_spec() {
        let mut doc = valid_doc();
        let ev = doc.ev_charger.as_mut().unwrap();
        ev.wants_to_buy = Some(true);
        ev.charger = ChargerSpec {
            brand: String::new(),
            model: "Pulsar".into(),
            power_kw: Some(dec!(11)),
        };
        let issues = Step::EvCharger.issues(&doc);
        assert_eq!(issues, vec![FieldIssue::new("charger.brand", "is required")]);
    }

    #[test]
    fn ev_charger_owned_needs_positive_power() {
        let mut doc = valid_doc();
        let ev = doc.ev_charger.as_mut().unwrap();
        ev.has_charger = Some(true);
        ev.wants_to_buy = None;
        ev.charger = ChargerSpec {
            brand: "Easee".into(),
            model: "One".into(),
            power_kw: Some(Decimal::ZERO),
        };
        assert!(!Step::EvCharger.is_valid(&doc));
        doc.ev_charger.as_mut().unwrap().charger.power_kw = Some(dec!(22));
        assert!(Step::EvCharger.is_valid(&doc));
    }

    #[test]
    fn ev_charger_unanswered_flags_invalid() {
        let mut doc = valid_doc();
        let ev = doc.ev_charger.as_mut().unwrap();
        ev.has_charger = None;
        ev.wants_to_buy = None;
        assert!(!Step::EvCharger.is_valid(&doc));

        let ev = doc.ev_charger.as_mut().unwrap();
        ev.has_charger = Some(false);
        ev.wants_to_buy = None;
        assert!(!Step::EvCharger.is_valid(&doc));
    }
}
