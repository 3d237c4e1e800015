//! Classification and aggregation over a set of documents.
//!
//! Pure functions. Empty input gives zeroed results; documents missing a
//! section simply do not contribute to that section's breakdown.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::assessment::model::{Assessment, ChargerIntent, Classification};
use crate::assessment::steps::{STEP_COUNT, Step};

/// A count with its share of the population, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub count: usize,
    pub percentage: f64,
}

impl Share {
    pub fn of(count: usize, total: usize) -> Self {
        Self {
            count,
            percentage: percentage(count, total),
        }
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total: usize,
    pub completed: Share,
    pub incomplete: Share,
    pub abandoned: Share,
    /// Mean minutes from creation to completion over completed documents.
    pub average_completion_minutes: f64,
}

impl StatusSummary {
    pub fn share(&self, class: Classification) -> Share {
        match class {
            Classification::Completed => self.completed,
            Classification::Incomplete => self.incomplete,
            Classification::Abandoned => self.abandoned,
        }
    }
}

pub fn status_summary(docs: &[Assessment]) -> StatusSummary {
    let mut counts: HashMap<Classification, usize> = HashMap::new();
    for doc in docs {
        *counts.entry(doc.classification()).or_default() += 1;
    }
    let total = docs.len();
    let share = |c: Classification| Share::of(counts.get(&c).copied().unwrap_or(0), total);

    StatusSummary {
        total,
        completed: share(Classification::Completed),
        incomplete: share(Classification::Incomplete),
        abandoned: share(Classification::Abandoned),
        average_completion_minutes: average_completion_minutes(docs),
    }
}

/// Mean completion time in minutes; 0.0 when nothing is complete.
pub fn average_completion_minutes(docs: &[Assessment]) -> f64 {
    let minutes: Vec<f64> = docs.iter().filter_map(Assessment::completion_minutes).collect();
    if minutes.is_empty() {
        0.0
    } else {
        minutes.iter().sum::<f64>() / minutes.len() as f64
    }
}

/// Documents whose progress stands at one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropOffBucket {
    /// `currentPage` value of the bucket.
    pub page: u32,
    /// The step that was reached but not passed.
    pub step: Step,
    pub title: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropOffReport {
    pub buckets: Vec<DropOffBucket>,
    pub completed: usize,
    pub abandoned: usize,
    pub total: usize,
}

/// Not-complete documents per reached page `1..STEP_COUNT-1`, plus completed.
///
/// Not-complete documents stored with `currentPage >= STEP_COUNT` are
/// counted in the last bucket, so the buckets plus `completed` always equal
/// `total - abandoned`.
pub fn drop_off(docs: &[Assessment]) -> DropOffReport {
    let last_page = STEP_COUNT - 1;
    let mut counts = vec![0usize; STEP_COUNT];
    let mut completed = 0;
    let mut abandoned = 0;

    for doc in docs {
        match doc.classification() {
            Classification::Completed => completed += 1,
            Classification::Abandoned => abandoned += 1,
            Classification::Incomplete => {
                let page = (doc.current_page as usize).min(last_page);
                counts[page] += 1;
            }
        }
    }

    let buckets = (1..STEP_COUNT)
        .filter_map(|page| {
            let step = Step::from_index(page)?;
            Some(DropOffBucket {
                page: page as u32,
                step,
                title: step.title(),
                count: counts[page],
            })
        })
        .collect();

    DropOffReport {
        buckets,
        completed,
        abandoned,
        total: docs.len(),
    }
}

/// One row of a top-N breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// Group exact labels, order by count desc then label asc, keep `n`.
///
/// Percentages are relative to every value seen, not only the kept ones.
pub fn top_n<'a, I>(values: I, n: usize) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0;
    for value in values {
        *counts.entry(value).or_default() += 1;
        total += 1;
    }

    let mut rows: Vec<(&str, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows.truncate(n);

    rows.into_iter()
        .map(|(label, count)| CategoryCount {
            label: label.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentDistribution {
    /// Documents with a recognised answer.
    pub total: usize,
    pub already_has: Share,
    pub wants_to_buy: Share,
    pub neither: Share,
}

pub fn charger_intent(docs: &[Assessment]) -> IntentDistribution {
    let intents: Vec<ChargerIntent> = docs.iter().filter_map(Assessment::charger_intent).collect();
    let total = intents.len();
    let count = |wanted: ChargerIntent| intents.iter().filter(|&&i| i == wanted).count();

    IntentDistribution {
        total,
        already_has: Share::of(count(ChargerIntent::AlreadyHas), total),
        wants_to_buy: Share::of(count(ChargerIntent::WantsToBuy), total),
        neither: Share::of(count(ChargerIntent::Neither), total),
    }
}

/// Documents started and completed on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: NaiveDate,
    pub started: usize,
    pub completed: usize,
}

/// Per-day started/completed counts, oldest day first.
pub fn daily_counts(docs: &[Assessment]) -> Vec<DailyCount> {
    let mut days: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for doc in docs {
        days.entry(doc.created_at.date_naive()).or_default().0 += 1;
        if let Some(completed_at) = doc.completed_at.filter(|_| doc.is_complete) {
            days.entry(completed_at.date_naive()).or_default().1 += 1;
        }
    }
    days.into_iter()
        .map(|(date, (started, completed))| DailyCount {
            date,
            started,
            completed,
        })
        .collect()
}

/// Everything the dashboard charts draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartsReport {
    pub top_cities: Vec<CategoryCount>,
    pub top_vehicle_brands: Vec<CategoryCount>,
    /// Brands among users who already own a charger.
    pub top_owned_charger_brands: Vec<CategoryCount>,
    /// Brands among users who want to buy one.
    pub top_wanted_charger_brands: Vec<CategoryCount>,
    pub charger_intent: IntentDistribution,
    pub daily: Vec<DailyCount>,
}

pub fn charts(docs: &[Assessment], n: usize) -> ChartsReport {
    let charger_brands = |intent: ChargerIntent| {
        top_n(
            docs.iter()
                .filter(|d| d.charger_intent() == Some(intent))
                .filter_map(Assessment::charger_brand),
            n,
        )
    };

    ChartsReport {
        top_cities: top_n(docs.iter().filter_map(Assessment::city), n),
        top_vehicle_brands: top_n(docs.iter().filter_map(Assessment::vehicle_brand), n),
        top_owned_charger_brands: charger_brands(ChargerIntent::AlreadyHas),
        top_wanted_charger_brands: charger_brands(ChargerIntent::WantsToBuy),
        charger_intent: charger_intent(docs),
        daily: daily_counts(docs),
    }
}
