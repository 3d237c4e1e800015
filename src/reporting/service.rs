//! Admin reporting service.
//!
//! Loads the documents matching an [`AdminQuery`] from the store and runs
//! the pure aggregations over them.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::assessment::model::Assessment;
use crate::config::ReportConfig;
use crate::error::AssessmentError;
use crate::store::AssessmentStore;

use super::export::{self, ExportColumn, ExportTable};
use super::query::{AdminQuery, AssessmentSummary, Page, paginate, sort_summaries};
use super::stats::{self, ChartsReport, DropOffReport, StatusSummary};

pub struct ReportService {
    store: Arc<dyn AssessmentStore>,
    config: ReportConfig,
}

impl ReportService {
    pub fn new(store: Arc<dyn AssessmentStore>, config: ReportConfig) -> Self {
        Self { store, config }
    }

    /// Documents matching `query`. Store bounds first, then the in-memory
    /// predicates.
    async fn matching(&self, query: &AdminQuery) -> Result<Vec<Assessment>, AssessmentError> {
        let filter = query.document_filter();
        let docs = self.store.query(&filter).await?;
        let fetched = docs.len();
        let docs: Vec<Assessment> = docs.into_iter().filter(|d| query.matches(d)).collect();
        debug!(fetched, matched = docs.len(), "Admin query evaluated");
        Ok(docs)
    }

    async fn sorted_summaries(
        &self,
        query: &AdminQuery,
    ) -> Result<Vec<AssessmentSummary>, AssessmentError> {
        let docs = self.matching(query).await?;
        let mut rows: Vec<AssessmentSummary> = docs.iter().map(AssessmentSummary::from).collect();
        sort_summaries(
            &mut rows,
            query.sort.unwrap_or_default(),
            query.order.unwrap_or_default(),
        );
        Ok(rows)
    }

    /// Filtered, sorted, paginated summaries.
    pub async fn list(
        &self,
        query: &AdminQuery,
    ) -> Result<Page<AssessmentSummary>, AssessmentError> {
        let rows = self.sorted_summaries(query).await?;
        let (page, page_size) = query.page_window(&self.config);
        let page = paginate(rows, page, page_size);
        info!(total = page.total, page = page.page, "Admin list served");
        Ok(page)
    }

    pub async fn stats(&self, query: &AdminQuery) -> Result<StatusSummary, AssessmentError> {
        let docs = self.matching(query).await?;
        let summary = stats::status_summary(&docs);
        info!(
            total = summary.total,
            completed = summary.completed.count,
            "Status summary served"
        );
        Ok(summary)
    }

    pub async fn drop_off(&self, query: &AdminQuery) -> Result<DropOffReport, AssessmentError> {
        let docs = self.matching(query).await?;
        let report = stats::drop_off(&docs);
        info!(abandoned = report.abandoned, "Drop-off report served");
        Ok(report)
    }

    pub async fn charts(&self, query: &AdminQuery) -> Result<ChartsReport, AssessmentError> {
        let docs = self.matching(query).await?;
        let report = stats::charts(&docs, self.config.top_n);
        info!(documents = docs.len(), "Charts served");
        Ok(report)
    }

    /// All matching rows, sorted like the list, without pagination.
    pub async fn export(
        &self,
        query: &AdminQuery,
        columns: &[ExportColumn],
    ) -> Result<ExportTable, AssessmentError> {
        let rows = self.sorted_summaries(query).await?;
        let table = export::build_table(&rows, columns);
        info!(rows = table.rows.len(), columns = columns.len(), "Export served");
        Ok(table)
    }

    /// Full document for the admin detail view.
    pub async fn detail(&self, id: Uuid, customer_id: &str) -> Result<Assessment, AssessmentError> {
        self.store
            .read(id, customer_id)
            .await
            .map_err(|e| AssessmentError::from_store(e, id, customer_id))?
            .ok_or_else(|| AssessmentError::NotFound {
                id,
                customer_id: customer_id.to_string(),
            })
    }
}
