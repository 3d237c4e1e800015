//! Admin list query: filters, sort order and pagination.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessment::model::{Assessment, ChargerIntent, Classification};
use crate::config::ReportConfig;
use crate::store::DocumentFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    CompletedAt,
    CurrentPage,
    City,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query-string parameters shared by the admin list, reports and export.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminQuery {
    pub status: Option<Classification>,
    pub city: Option<String>,
    pub vehicle_brand: Option<String>,
    pub charger_brand: Option<String>,
    /// First creation day included (UTC).
    pub from: Option<NaiveDate>,
    /// Last creation day included (UTC).
    pub to: Option<NaiveDate>,
    pub partition_key: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
    /// 1-based page number.
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl AdminQuery {
    pub fn validate(&self) -> Result<(), String> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => {
                return Err(format!("'from' ({from}) is after 'to' ({to})"));
            }
            _ => {}
        }
        if self.page == Some(0) {
            return Err("'page' starts at 1".to_string());
        }
        if self.page_size == Some(0) {
            return Err("'pageSize' must be greater than zero".to_string());
        }
        Ok(())
    }

    /// The part of the query the store evaluates: partition and creation range.
    pub fn document_filter(&self) -> DocumentFilter {
        DocumentFilter {
            customer_id: non_empty(&self.partition_key).map(str::to_string),
            created_from: self.from.map(start_of_day),
            created_to: self
                .to
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .map(start_of_day),
        }
    }

    /// In-memory predicates: classification and exact categorical matches.
    pub fn matches(&self, doc: &Assessment) -> bool {
        if self.status.is_some_and(|s| doc.classification() != s) {
            return false;
        }
        matches_exact(non_empty(&self.city), doc.city())
            && matches_exact(non_empty(&self.vehicle_brand), doc.vehicle_brand())
            && matches_exact(non_empty(&self.charger_brand), doc.charger_brand())
    }

    /// `(page, page_size)` with defaults applied and the size capped.
    pub fn page_window(&self, config: &ReportConfig) -> (usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let size = self
            .page_size
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size);
        (page, size)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn matches_exact(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted {
        Some(w) => actual == Some(w),
        None => true,
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

/// One row of the admin list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSummary {
    pub id: Uuid,
    pub customer_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub vehicle_brand: Option<String>,
    pub charger_brand: Option<String>,
    pub charger_intent: Option<ChargerIntent>,
    pub status: Classification,
    pub current_page: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Assessment> for AssessmentSummary {
    fn from(doc: &Assessment) -> Self {
        let personal = doc.personal_info.as_ref();
        let text = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
        Self {
            id: doc.id,
            customer_id: doc.customer_id.clone(),
            name: doc.full_name(),
            email: personal.and_then(|p| text(&p.email)),
            phone: personal.and_then(|p| text(&p.phone)),
            city: doc.city().map(str::to_string),
            vehicle_brand: doc.vehicle_brand().map(str::to_string),
            charger_brand: doc.charger_brand().map(str::to_string),
            charger_intent: doc.charger_intent(),
            status: doc.classification(),
            current_page: doc.current_page,
            created_at: doc.created_at,
            completed_at: doc.completed_at,
        }
    }
}

/// Sort rows in place. Ties fall back to creation time, then id.
pub fn sort_summaries(rows: &mut [AssessmentSummary], field: SortField, order: SortOrder) {
    rows.sort_by(|a, b| {
        let primary = match field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::CompletedAt => a.completed_at.cmp(&b.completed_at),
            SortField::CurrentPage => a.current_page.cmp(&b.current_page),
            SortField::City => a.city.cmp(&b.city),
            SortField::Name => a.name.cmp(&b.name),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Cut page `page` (1-based) of `page_size` rows out of `rows`.
pub fn paginate<T>(rows: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let total = rows.len();
    let page = page.max(1);
    let page_size = page_size.max(1);
    let items = rows
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();
    Page {
        items,
        total,
        page,
        page_size,
        total_pages: total.div_ceil(page_size),
    }
}
