//! Tabular rows for export. File formatting is left to the consumer.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use super::query::AssessmentSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportColumn {
    Id,
    CustomerId,
    Name,
    Email,
    Phone,
    City,
    VehicleBrand,
    ChargerBrand,
    ChargerIntent,
    Status,
    CurrentPage,
    CreatedAt,
    CompletedAt,
}

impl ExportColumn {
    pub const ALL: [ExportColumn; 13] = [
        Self::Id,
        Self::CustomerId,
        Self::Name,
        Self::Email,
        Self::Phone,
        Self::City,
        Self::VehicleBrand,
        Self::ChargerBrand,
        Self::ChargerIntent,
        Self::Status,
        Self::CurrentPage,
        Self::CreatedAt,
        Self::CompletedAt,
    ];

    /// Columns used when the caller names none.
    pub const DEFAULT: [ExportColumn; 7] = [
        Self::Name,
        Self::Email,
        Self::City,
        Self::VehicleBrand,
        Self::ChargerBrand,
        Self::Status,
        Self::CreatedAt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CustomerId => "customerId",
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::City => "city",
            Self::VehicleBrand => "vehicleBrand",
            Self::ChargerBrand => "chargerBrand",
            Self::ChargerIntent => "chargerIntent",
            Self::Status => "status",
            Self::CurrentPage => "currentPage",
            Self::CreatedAt => "createdAt",
            Self::CompletedAt => "completedAt",
        }
    }

    /// Cell text for one row. Missing values are empty strings.
    fn cell(self, row: &AssessmentSummary) -> String {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        match self {
            Self::Id => row.id.to_string(),
            Self::CustomerId => row.customer_id.clone(),
            Self::Name => opt(&row.name),
            Self::Email => opt(&row.email),
            Self::Phone => opt(&row.phone),
            Self::City => opt(&row.city),
            Self::VehicleBrand => opt(&row.vehicle_brand),
            Self::ChargerBrand => opt(&row.charger_brand),
            Self::ChargerIntent => row
                .charger_intent
                .and_then(|i| serde_json::to_value(i).ok())
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            Self::Status => row.status.to_string(),
            Self::CurrentPage => row.current_page.to_string(),
            Self::CreatedAt => row.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::CompletedAt => row
                .completed_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for ExportColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown export column: {s}"))
    }
}

/// Parse a comma list of column names; `None` or blank gives the defaults.
pub fn parse_columns(raw: Option<&str>) -> Result<Vec<ExportColumn>, String> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(ExportColumn::DEFAULT.to_vec());
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub columns: Vec<ExportColumn>,
    pub rows: Vec<Vec<String>>,
}

pub fn build_table(rows: &[AssessmentSummary], columns: &[ExportColumn]) -> ExportTable {
    ExportTable {
        columns: columns.to_vec(),
        rows: rows
            .iter()
            .map(|row| columns.iter().map(|c| c.cell(row)).collect())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::model::{Assessment, ChargerSpec, EvChargerInfo, PersonalInfo};

    fn summary() -> AssessmentSummary {
        let mut doc = Assessment::new("cust-7").with_personal(PersonalInfo {
            first_name: "Nina".into(),
            last_name: "Kos".into(),
            email: "nina@example.com".into(),
            phone: String::new(),
        });
        doc.current_page = 4;
        doc.ev_charger = Some(EvChargerInfo {
            has_charger: Some(false),
            wants_to_buy: Some(true),
            charger: ChargerSpec {
                brand: "Easee".into(),
                ..Default::default()
            },
        });
        AssessmentSummary::from(&doc)
    }

    #[test]
    fn column_names_round_trip_through_serde() {
        for column in ExportColumn::ALL {
            let json = serde_json::to_string(&column).unwrap();
            assert_eq!(json, format!("\"{column}\""));
            assert_eq!(column.as_str().parse::<ExportColumn>().unwrap(), column);
        }
    }

    #[test]
    fn parse_column_lists() {
        assert_eq!(parse_columns(None).unwrap(), ExportColumn::DEFAULT.to_vec());
        assert_eq!(parse_columns(Some("  ")).unwrap(), ExportColumn::DEFAULT.to_vec());
        assert_eq!(
            parse_columns(Some("email, status")).unwrap(),
            vec![ExportColumn::Email, ExportColumn::Status]
        );
        let err = parse_columns(Some("email,password")).unwrap_err();
        assert!(err.contains("password"));
    }

    #[test]
    fn table_cells() {
        let columns = parse_columns(Some("name,phone,chargerBrand,chargerIntent,status,currentPage,completedAt"))
            .unwrap();
        let table = build_table(&[summary()], &columns);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(
            table.rows[0],
            vec!["Nina Kos", "", "Easee", "wants_to_buy", "incomplete", "4", ""]
        );
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["columns"][0], "name");
    }

    #[test]
    fn empty_result_set_keeps_columns() {
        let table = build_table(&[], &ExportColumn::DEFAULT);
        assert!(table.rows.is_empty());
        assert_eq!(table.columns.len(), ExportColumn::DEFAULT.len());
    }
}
